//! Dispatcher
//!
//! Drives the provisioner across the credential pool. Each dispatch reads
//! the configuration store fresh, builds the candidate order for the active
//! mode and then walks an explicit state machine:
//!
//! ```text
//! Selecting -> Attempting -> Succeeded
//!     ^            |
//!     |            +-> Retrying --+
//!     |            |              |
//!     +------------|--------------+
//!                  +-> Rejected
//! Selecting (no candidate left) -> Exhausted
//! ```
//!
//! Every outcome, including store and platform errors, is folded into a
//! single `ProvisionResult`.

use std::collections::VecDeque;
use std::sync::Arc;

use crate::config::DispatchConfig;
use crate::db::{ConfigStore, StoreDocument};
use crate::schemas::deploy::{
    FailureReason, ProvisionFailure, ProvisionResult, ProvisionSuccess, ServiceRequest,
};
use crate::services::credential_pool::{
    CredentialPool, CredentialRecord, DispatchMode, MIN_OWNER_ID_LEN,
};
use crate::services::platform::PlatformError;
use crate::services::prober::{LoadProber, ProbeReport};
use crate::services::provisioner::Provisioner;

/// Loop state. `Succeeded`, `Rejected` and `Exhausted` are terminal.
#[derive(Debug)]
enum DispatchState {
    Selecting,
    Attempting(CredentialRecord),
    Retrying(PlatformError),
    Succeeded(ProvisionSuccess),
    Rejected(PlatformError),
    Exhausted,
}

/// Inputs resolved from the store for one dispatch
struct DispatchContext {
    pool: CredentialPool,
    repository: String,
    store_failed: bool,
    store_error: Option<String>,
}

pub struct Dispatcher {
    store: Arc<dyn ConfigStore>,
    prober: LoadProber,
    provisioner: Provisioner,
    config: DispatchConfig,
    default_repository: String,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn ConfigStore>,
        provisioner: Provisioner,
        config: DispatchConfig,
        default_repository: impl Into<String>,
    ) -> Self {
        let prober = LoadProber::new(provisioner.platform().clone(), config.capacity_ceiling);
        Self {
            store,
            prober,
            provisioner,
            config,
            default_repository: default_repository.into(),
        }
    }

    pub fn mode(&self) -> DispatchMode {
        self.config.mode
    }

    /// Owner id for credential lines without one: the stored default when
    /// it is plausible, else the configured fallback
    pub fn fallback_owner<'a>(&'a self, doc: &'a StoreDocument) -> &'a str {
        let stored = doc.default_owner.trim();
        if stored.chars().count() >= MIN_OWNER_ID_LEN {
            stored
        } else {
            self.config.fallback_owner_id.as_str()
        }
    }

    /// Repository deployed when the request names none
    pub fn default_repository<'a>(&'a self, doc: &'a StoreDocument) -> &'a str {
        let stored = doc.default_repository.trim();
        if stored.is_empty() {
            self.default_repository.as_str()
        } else {
            stored
        }
    }

    /// Provision one service for `request`.
    ///
    /// Never fails: every error ends up in the returned `ProvisionResult`.
    /// A `Success` means exactly one service was created; a `Failure` means
    /// none was, except for the unparseable-create case which is reported
    /// as a rejection so the caller can check the platform by hand.
    pub async fn dispatch(&self, request: ServiceRequest) -> ProvisionResult {
        let ctx = self.resolve_context(&request).await;

        if ctx.pool.is_empty() {
            let failure = if ctx.store_failed {
                ProvisionFailure::new(
                    FailureReason::ConfigUnavailable,
                    ctx.store_error.unwrap_or_else(|| "configuration store unavailable".into()),
                    0,
                )
            } else {
                ProvisionFailure::new(FailureReason::PoolEmpty, "no credentials configured", 0)
            };
            tracing::warn!(reason = %failure.reason, "Dispatch aborted before any attempt");
            return ProvisionResult::Failure(failure);
        }

        let mut request = request;
        request.repository_url = ctx.repository;

        let candidates = match self.candidate_order(&ctx.pool).await {
            Ok(order) => order,
            Err(failure) => return ProvisionResult::Failure(failure),
        };

        tracing::info!(
            mode = %self.config.mode,
            pool_size = ctx.pool.len(),
            candidates = candidates.len(),
            repository = %request.repository_url,
            "Dispatching"
        );

        self.run(candidates, &request).await
    }

    async fn resolve_context(&self, request: &ServiceRequest) -> DispatchContext {
        let (doc, store_error) = match self.store.load().await {
            Ok(doc) => (doc, None),
            Err(e) => {
                tracing::error!(error = %e, "Configuration store unreachable, treating pool as empty");
                (StoreDocument::default(), Some(e.to_string()))
            }
        };

        let fallback_owner = self.fallback_owner(&doc);
        let repository = match request.repository_url.trim() {
            "" => self.default_repository(&doc),
            explicit => explicit,
        }
        .to_string();

        DispatchContext {
            pool: CredentialPool::from_blob(&doc.credentials, fallback_owner),
            repository,
            store_failed: store_error.is_some(),
            store_error,
        }
    }

    /// Candidates in attempt order for the active mode
    async fn candidate_order(
        &self,
        pool: &CredentialPool,
    ) -> Result<VecDeque<CredentialRecord>, ProvisionFailure> {
        match self.config.mode {
            DispatchMode::Blind => Ok(pool.shuffled().into()),
            DispatchMode::LoadBased => {
                match self.prober.select_best(pool).await {
                    Ok(best) => {
                        tracing::info!(
                            credential = %best.record.masked_token(),
                            owner_id = %best.record.owner_id(),
                            load = best.current_load,
                            "Selected least-loaded credential"
                        );
                        Ok(VecDeque::from(vec![best.record]))
                    }
                    Err(report) => Err(self.no_candidate_failure(&report)),
                }
            }
        }
    }

    fn no_candidate_failure(&self, report: &ProbeReport) -> ProvisionFailure {
        let failure = if report.at_capacity > 0 {
            ProvisionFailure::new(
                FailureReason::CapacityExceeded,
                format!(
                    "{} credential(s) at or above the ceiling of {}, {} probe(s) failed",
                    report.at_capacity,
                    self.prober.capacity_ceiling(),
                    report.failed
                ),
                0,
            )
        } else {
            ProvisionFailure::new(
                FailureReason::PoolExhausted,
                report
                    .last_error
                    .clone()
                    .unwrap_or_else(|| "no credential could be probed".into()),
                0,
            )
        };
        tracing::warn!(
            reason = %failure.reason,
            at_capacity = report.at_capacity,
            failed = report.failed,
            "No credential qualified"
        );
        failure
    }

    async fn run(
        &self,
        mut candidates: VecDeque<CredentialRecord>,
        request: &ServiceRequest,
    ) -> ProvisionResult {
        let mut attempts: u32 = 0;
        let mut last_error: Option<PlatformError> = None;
        let mut state = DispatchState::Selecting;

        let terminal = loop {
            state = match state {
                DispatchState::Selecting => match candidates.pop_front() {
                    Some(record) => DispatchState::Attempting(record),
                    None => DispatchState::Exhausted,
                },
                DispatchState::Attempting(record) => {
                    attempts += 1;
                    match self.provisioner.provision(&record, request).await {
                        Ok(success) => DispatchState::Succeeded(success),
                        Err(e) => self.classify(&record, attempts, e),
                    }
                }
                DispatchState::Retrying(e) => {
                    last_error = Some(e);
                    DispatchState::Selecting
                }
                terminal => break terminal,
            };
        };

        match terminal {
            DispatchState::Succeeded(mut success) => {
                success.attempts = attempts;
                tracing::info!(
                    service_id = %success.service_id,
                    app_url = %success.app_url,
                    attempts,
                    advisories = success.advisories.len(),
                    "Dispatch succeeded"
                );
                ProvisionResult::Success(success)
            }
            DispatchState::Rejected(e) => ProvisionResult::Failure(ProvisionFailure::new(
                FailureReason::ProvisionRejected,
                e.to_string(),
                attempts,
            )),
            _ => {
                let reason = match &last_error {
                    Some(PlatformError::Transport(_)) if attempts == 1 => {
                        FailureReason::TransientNetworkError
                    }
                    _ => FailureReason::PoolExhausted,
                };
                let message = last_error
                    .map(|e| e.to_string())
                    .unwrap_or_else(|| "no candidate attempted".into());
                tracing::warn!(reason = %reason, attempts, last_error = %message, "Dispatch exhausted");
                ProvisionResult::Failure(ProvisionFailure::new(reason, message, attempts))
            }
        }
    }

    /// Decide what a failed create means for the loop
    fn classify(&self, record: &CredentialRecord, attempt: u32, error: PlatformError) -> DispatchState {
        // A 2xx with an unreadable body may have created a service already
        if matches!(error, PlatformError::Parse(_)) {
            tracing::error!(
                credential = %record.masked_token(),
                attempt,
                error = %error,
                "Create response unreadable, stopping to avoid a duplicate service"
            );
            return DispatchState::Rejected(error);
        }

        if error.is_retryable() {
            tracing::warn!(
                credential = %record.masked_token(),
                attempt,
                status = ?error.status_code(),
                error = %error,
                "Create failed, trying next credential"
            );
            return DispatchState::Retrying(error);
        }

        let keep_going = self.config.mode.allows_failover() && !self.config.abort_on_rejection;
        tracing::warn!(
            credential = %record.masked_token(),
            attempt,
            status = ?error.status_code(),
            error = %error,
            failover = keep_going,
            "Create rejected"
        );
        if keep_going {
            DispatchState::Retrying(error)
        } else {
            DispatchState::Rejected(error)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
