//! Load prober and best-fit selector
//!
//! Every credential in the pool is probed in order with a read-only listing
//! call. A credential whose probe fails, or whose load has reached the
//! capacity ceiling, is not a candidate. The least-loaded candidate wins and
//! ties go to the earliest credential in pool order.

use std::sync::Arc;

use crate::services::credential_pool::{CredentialPool, CredentialRecord};
use crate::services::platform::ProvisioningPlatform;

/// A credential annotated with its probed load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub record: CredentialRecord,
    pub current_load: usize,
}

/// Everything learned from one probe pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeReport {
    /// Credentials under the ceiling, in pool order
    pub candidates: Vec<Candidate>,
    /// Credentials that answered but were at or over the ceiling
    pub at_capacity: usize,
    /// Credentials whose probe errored
    pub failed: usize,
    /// Text of the most recent probe error
    pub last_error: Option<String>,
}

impl ProbeReport {
    /// The strictly least-loaded candidate, first in pool order on ties
    pub fn best(&self) -> Option<&Candidate> {
        self.candidates.iter().min_by_key(|c| c.current_load)
    }
}

pub struct LoadProber {
    platform: Arc<dyn ProvisioningPlatform>,
    capacity_ceiling: usize,
}

impl LoadProber {
    pub fn new(platform: Arc<dyn ProvisioningPlatform>, capacity_ceiling: usize) -> Self {
        Self {
            platform,
            capacity_ceiling,
        }
    }

    pub fn capacity_ceiling(&self) -> usize {
        self.capacity_ceiling
    }

    /// Probe every credential, sequentially and without early exit
    pub async fn probe(&self, pool: &CredentialPool) -> ProbeReport {
        let mut report = ProbeReport::default();

        for record in pool.iter() {
            match self.platform.list_resources(record).await {
                Ok(load) if load >= self.capacity_ceiling => {
                    tracing::debug!(
                        credential = %record.masked_token(),
                        load,
                        ceiling = self.capacity_ceiling,
                        "Credential at capacity"
                    );
                    report.at_capacity += 1;
                }
                Ok(load) => {
                    tracing::debug!(credential = %record.masked_token(), load, "Credential probed");
                    report.candidates.push(Candidate {
                        record: record.clone(),
                        current_load: load,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        credential = %record.masked_token(),
                        error = %e,
                        "Load probe failed, dropping credential"
                    );
                    report.failed += 1;
                    report.last_error = Some(e.to_string());
                }
            }
        }

        report
    }

    /// Probe the pool and return the best candidate. When none qualifies the
    /// report is returned instead so the caller can tell capacity from
    /// probe failures.
    pub async fn select_best(&self, pool: &CredentialPool) -> Result<Candidate, ProbeReport> {
        let report = self.probe(pool).await;
        match report.best() {
            Some(best) => Ok(best.clone()),
            None => Err(report),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
