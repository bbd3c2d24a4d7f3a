//! Persisted configuration document
//!
//! The broker keeps a single document: the raw credential blob plus the
//! defaults an administrator can edit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The whole contents of the configuration store
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StoreDocument {
    /// Raw, hand-edited credential blob (`token,owner_id` per line)
    #[serde(default)]
    pub credentials: String,

    /// Repository deployed when a request does not name one
    #[serde(default)]
    pub default_repository: String,

    /// Owner id used for credential lines that carry none
    #[serde(default)]
    pub default_owner: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl StoreDocument {
    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }
}
