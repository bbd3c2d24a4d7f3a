//! Provisioner
//!
//! Runs the ordered call sequence for one chosen credential:
//!
//! 1. create the service (no environment variables in this call)
//! 2. read back its id and computed URL
//! 3. replace its environment variable set
//! 4. register the URL with the uptime monitor and request a log link
//!
//! Only step 1 can fail the provision. Once the service exists, later
//! failures are reported as advisories and nothing is rolled back.

use chrono::Utc;
use std::sync::Arc;

use crate::config::PlatformConfig;
use crate::schemas::deploy::{ProvisionSuccess, ServiceRequest};
use crate::schemas::render::{CreateServicePayload, ServiceDetailsPayload};
use crate::services::credential_pool::CredentialRecord;
use crate::services::platform::{CreatedService, PlatformError, ProvisioningPlatform};
use crate::services::side_registration::{LogLinkIssuer, UptimeRegistrar};

/// Build a service name with a short random hex suffix, e.g. `bot-3fa91c`
pub fn generate_service_name(prefix: &str) -> String {
    let suffix: [u8; 3] = rand::random();
    let hex: String = suffix.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}", prefix, hex)
}

pub struct Provisioner {
    platform: Arc<dyn ProvisioningPlatform>,
    config: PlatformConfig,
    filter_empty_env: bool,
    uptime: Option<Arc<dyn UptimeRegistrar>>,
    log_links: Option<Arc<dyn LogLinkIssuer>>,
}

impl Provisioner {
    pub fn new(
        platform: Arc<dyn ProvisioningPlatform>,
        config: PlatformConfig,
        filter_empty_env: bool,
    ) -> Self {
        Self {
            platform,
            config,
            filter_empty_env,
            uptime: None,
            log_links: None,
        }
    }

    pub fn with_uptime_registrar(mut self, registrar: Arc<dyn UptimeRegistrar>) -> Self {
        self.uptime = Some(registrar);
        self
    }

    pub fn with_log_link_issuer(mut self, issuer: Arc<dyn LogLinkIssuer>) -> Self {
        self.log_links = Some(issuer);
        self
    }

    pub fn platform(&self) -> &Arc<dyn ProvisioningPlatform> {
        &self.platform
    }

    /// Create payload for one attempt. Environment variables are never part
    /// of it; they are pushed in a separate call once the service exists.
    pub fn build_payload(&self, credential: &CredentialRecord, repository: &str) -> CreateServicePayload {
        CreateServicePayload {
            service_type: self.config.service_type.clone(),
            name: generate_service_name(&self.config.name_prefix),
            owner_id: credential.owner_id().to_string(),
            repo: repository.to_string(),
            auto_deploy: "yes".to_string(),
            service_details: ServiceDetailsPayload {
                env: self.config.runtime.clone(),
                region: self.config.region.clone(),
                plan: self.config.plan.clone(),
            },
        }
    }

    /// Provision `request` under `credential`.
    ///
    /// `Err` means no service was created. `Ok` means exactly one service
    /// exists, whatever the advisories say.
    pub async fn provision(
        &self,
        credential: &CredentialRecord,
        request: &ServiceRequest,
    ) -> Result<ProvisionSuccess, PlatformError> {
        let payload = self.build_payload(credential, &request.repository_url);
        let created = self.platform.create_service(credential, &payload).await?;

        tracing::info!(
            service_id = %created.id,
            name = %created.name,
            owner_id = %credential.owner_id(),
            "Service created"
        );

        let mut advisories = Vec::new();
        self.configure_environment(credential, &created, request, &mut advisories)
            .await;
        let log_url = self
            .register_side_services(credential, &created, &mut advisories)
            .await;

        Ok(ProvisionSuccess {
            dashboard_url: self.platform.dashboard_url(&created.id),
            service_id: created.id,
            service_name: created.name,
            app_url: created.app_url,
            log_url,
            owner_id: credential.owner_id().to_string(),
            attempts: 1,
            created_at: Utc::now(),
            advisories,
        })
    }

    async fn configure_environment(
        &self,
        credential: &CredentialRecord,
        created: &CreatedService,
        request: &ServiceRequest,
        advisories: &mut Vec<String>,
    ) {
        let (vars, dropped) = request.env_vars_for_platform(self.filter_empty_env);

        if !dropped.is_empty() {
            tracing::debug!(service_id = %created.id, dropped = ?dropped, "Skipping empty env values");
            advisories.push(format!(
                "environment: skipped empty values for {}",
                dropped.join(", ")
            ));
        }

        if vars.is_empty() {
            return;
        }

        match self
            .platform
            .replace_environment(credential, &created.id, &vars)
            .await
        {
            Ok(()) => {
                tracing::debug!(service_id = %created.id, count = vars.len(), "Environment configured");
            }
            Err(e) => {
                tracing::warn!(
                    service_id = %created.id,
                    error = %e,
                    "Environment configuration failed; service left without its variables"
                );
                advisories.push(format!(
                    "environment: configuration failed, service needs manual fixup ({})",
                    e
                ));
            }
        }
    }

    async fn register_side_services(
        &self,
        credential: &CredentialRecord,
        created: &CreatedService,
        advisories: &mut Vec<String>,
    ) -> Option<String> {
        if let Some(uptime) = &self.uptime {
            if let Err(e) = uptime.register(&created.app_url).await {
                tracing::warn!(app_url = %created.app_url, error = %e, "Uptime registration failed");
                advisories.push(format!("uptime: registration failed ({})", e));
            }
        }

        let issuer = self.log_links.as_ref()?;
        match issuer.create_link(credential, &created.id).await {
            Ok(link) => Some(link),
            Err(e) => {
                tracing::warn!(service_id = %created.id, error = %e, "Log link request failed");
                advisories.push(format!("log_link: request failed ({})", e));
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
