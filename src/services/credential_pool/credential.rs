//! Credential records and the tolerant credential-blob parser
//!
//! The pool is stored as a hand-edited text blob: one credential per line,
//! `token,owner_id`. The parser never fails. Lines without a token are
//! skipped and missing or implausible owner ids fall back to a configured
//! default.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::mask_secret;

/// Owner ids shorter than this are treated as absent
pub const MIN_OWNER_ID_LEN: usize = 5;

// ============================================================================
// Credential Record
// ============================================================================

/// A platform bearer token and the account scope services are created under
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    token: String,
    owner_id: String,
}

impl CredentialRecord {
    pub fn new(token: impl Into<String>, owner_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            owner_id: owner_id.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    /// Redacted token suitable for logs and API responses
    pub fn masked_token(&self) -> String {
        mask_secret(&self.token)
    }
}

impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("token", &self.masked_token())
            .field("owner_id", &self.owner_id)
            .finish()
    }
}

// ============================================================================
// Parsing
// ============================================================================

/// Parse a credential blob into records, in blob order
pub fn parse_credentials(blob: &str, fallback_owner_id: &str) -> Vec<CredentialRecord> {
    blob.lines()
        .filter_map(|line| parse_line(line, fallback_owner_id))
        .collect()
}

fn parse_line(line: &str, fallback_owner_id: &str) -> Option<CredentialRecord> {
    let line = line.trim().trim_end_matches(',').trim();
    if line.is_empty() {
        return None;
    }

    let mut fields = line.split(',');
    let token = fields.next().map(str::trim).unwrap_or_default();
    if token.is_empty() {
        return None;
    }

    let owner_id = fields
        .next()
        .map(str::trim)
        .filter(|owner| owner.chars().count() >= MIN_OWNER_ID_LEN)
        .unwrap_or(fallback_owner_id);

    Some(CredentialRecord::new(token, owner_id))
}

/// Serialize records back into blob form, one `token,owner_id` line each
pub fn format_blob(records: &[CredentialRecord]) -> String {
    records
        .iter()
        .map(|r| format!("{},{}", r.token, r.owner_id))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Append one credential line to an existing blob
pub fn append_line(blob: &str, token: &str, owner_id: &str) -> String {
    let line = if owner_id.trim().is_empty() {
        token.trim().to_string()
    } else {
        format!("{},{}", token.trim(), owner_id.trim())
    };

    let existing = blob.trim_end();
    if existing.is_empty() {
        line
    } else {
        format!("{}\n{}", existing, line)
    }
}

// ============================================================================
// Tests
// ============================================================================
