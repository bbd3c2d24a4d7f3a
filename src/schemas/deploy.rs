//! Deployment request and result types
//!
//! `ServiceRequest` is what callers send to the broker; `ProvisionResult` is
//! the single structured answer every dispatch produces.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use super::render::EnvVar;

// ============================================================================
// Request
// ============================================================================

/// Caller-supplied deployment intent
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ServiceRequest {
    /// Repository to deploy; blank means "use the configured default"
    #[serde(default, alias = "repo", alias = "repo_url")]
    pub repository_url: String,

    /// Scalar values are accepted as sent; numbers and booleans are stored
    /// in their JSON text form
    #[serde(default, alias = "env_vars", deserialize_with = "env_values_as_text")]
    pub environment_variables: BTreeMap<String, String>,
}

fn env_values_as_text<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    raw.into_iter()
        .map(|(key, value)| {
            let text = match value {
                Value::String(s) => s,
                Value::Null => String::new(),
                Value::Bool(_) | Value::Number(_) => value.to_string(),
                Value::Array(_) | Value::Object(_) => {
                    return Err(serde::de::Error::custom(format!(
                        "environment variable `{}` must be a scalar",
                        key
                    )))
                }
            };
            Ok((key, text))
        })
        .collect()
}

impl ServiceRequest {
    pub fn new(repository_url: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            environment_variables: BTreeMap::new(),
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.environment_variables.insert(key.into(), value.into());
        self
    }

    /// Environment variables in platform form.
    ///
    /// With `filter_empty` set, entries whose value is blank are left out and
    /// their keys are returned in the second element.
    pub fn env_vars_for_platform(&self, filter_empty: bool) -> (Vec<EnvVar>, Vec<String>) {
        let mut vars = Vec::with_capacity(self.environment_variables.len());
        let mut dropped = Vec::new();

        for (key, value) in &self.environment_variables {
            if filter_empty && value.trim().is_empty() {
                dropped.push(key.clone());
            } else {
                vars.push(EnvVar::new(key, value));
            }
        }

        (vars, dropped)
    }
}

// ============================================================================
// Result
// ============================================================================

/// Outcome of one dispatch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProvisionResult {
    Success(ProvisionSuccess),
    #[serde(rename = "error")]
    Failure(ProvisionFailure),
}

impl ProvisionResult {
    pub fn success(&self) -> Option<&ProvisionSuccess> {
        match self {
            ProvisionResult::Success(s) => Some(s),
            ProvisionResult::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&ProvisionFailure> {
        match self {
            ProvisionResult::Success(_) => None,
            ProvisionResult::Failure(f) => Some(f),
        }
    }
}

/// A service now exists on the platform. Its configuration may be
/// incomplete; `advisories` says what the best-effort steps reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisionSuccess {
    pub service_id: String,
    pub service_name: String,
    pub dashboard_url: String,
    pub app_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_url: Option<String>,
    pub owner_id: String,
    /// Number of create attempts made across the pool
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProvisionFailure {
    pub reason: FailureReason,
    /// Most recent error observed; serialized as `message` for existing callers
    #[serde(rename = "message")]
    pub last_error: String,
    pub attempts: u32,
}

impl ProvisionFailure {
    pub fn new(reason: FailureReason, last_error: impl Into<String>, attempts: u32) -> Self {
        Self {
            reason,
            last_error: last_error.into(),
            attempts,
        }
    }
}

/// Why a dispatch produced no service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The configuration store could not be read; the pool degraded to empty
    ConfigUnavailable,
    /// No credentials are configured
    PoolEmpty,
    /// Every candidate was tried or rejected
    PoolExhausted,
    /// Probing found no credential under the capacity ceiling
    CapacityExceeded,
    /// The platform refused the request with a non-retryable error
    ProvisionRejected,
    /// The only candidate failed at the transport level
    TransientNetworkError,
    /// The deploy request body could not be read; nothing was attempted
    InvalidRequest,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FailureReason::ConfigUnavailable => "configuration store unavailable",
            FailureReason::PoolEmpty => "no credentials configured",
            FailureReason::PoolExhausted => "all credentials exhausted",
            FailureReason::CapacityExceeded => "all credentials at capacity",
            FailureReason::ProvisionRejected => "provisioning rejected",
            FailureReason::TransientNetworkError => "transient network error",
            FailureReason::InvalidRequest => "invalid deploy request",
        };
        f.write_str(text)
    }
}
