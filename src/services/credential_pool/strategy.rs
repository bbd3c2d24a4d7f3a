//! Credential selection modes
//!
//! The dispatcher either probes every credential and commits to the least
//! loaded one, or walks the pool in random order and fails over on error.

use serde::{Deserialize, Serialize};

/// How the dispatcher picks credentials from the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// Probe every credential's load and try only the least loaded one
    #[default]
    LoadBased,
    /// Skip probing; walk a shuffled pool and fail over on each error
    Blind,
}

impl DispatchMode {
    /// Parse from string (case-insensitive), defaulting to load-based
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "blind" | "shuffle" | "failover" => Self::Blind,
            "load_based" | "loadbased" | "load-based" | "least_loaded" => Self::LoadBased,
            _ => Self::LoadBased,
        }
    }

    /// Whether more than one credential may be attempted per dispatch
    pub fn allows_failover(&self) -> bool {
        matches!(self, Self::Blind)
    }
}

impl std::fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadBased => write!(f, "load_based"),
            Self::Blind => write!(f, "blind"),
        }
    }
}
