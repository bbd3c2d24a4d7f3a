//! Credential Pool Implementation
//!
//! The pool is rebuilt from the configuration store on every dispatch and
//! never mutated afterwards.

use super::credential::{parse_credentials, CredentialRecord};
use rand::seq::SliceRandom;

/// The parsed credentials available to one dispatch
#[derive(Debug, Clone, Default)]
pub struct CredentialPool {
    records: Vec<CredentialRecord>,
}

impl CredentialPool {
    pub fn new(records: Vec<CredentialRecord>) -> Self {
        Self { records }
    }

    /// Parse a raw credential blob into a pool
    pub fn from_blob(blob: &str, fallback_owner_id: &str) -> Self {
        Self::new(parse_credentials(blob, fallback_owner_id))
    }

    /// Records in blob order
    pub fn ordered(&self) -> Vec<CredentialRecord> {
        self.records.clone()
    }

    /// Records in a uniformly random order
    pub fn shuffled(&self) -> Vec<CredentialRecord> {
        let mut records = self.records.clone();
        records.shuffle(&mut rand::thread_rng());
        records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CredentialRecord> {
        self.records.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================
