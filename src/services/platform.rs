//! Provisioning platform client
//!
//! The broker only needs three platform operations: count a credential's
//! services (load probe), create a service, and replace a service's
//! environment. `ProvisioningPlatform` is the seam; `RenderPlatform` speaks
//! the REST API over reqwest.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::PlatformConfig;
use crate::schemas::render::{CreateServicePayload, CreateServiceResponse, EnvVar};
use crate::services::credential_pool::CredentialRecord;
use crate::utils::{truncate_with_ellipsis, TimeoutConfig};

/// Longest platform error body kept in an error message
const MAX_ERROR_BODY_CHARS: usize = 300;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when calling the provisioning platform
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlatformError {
    /// Connection failure, timeout, or any other transport-level problem
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("Platform returned HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// The call succeeded but the body was not understood
    #[error("Failed to parse platform response: {0}")]
    Parse(String),
}

impl PlatformError {
    /// Capacity/rate-limit signals and transport failures may succeed on
    /// another credential
    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformError::Transport(_) => true,
            PlatformError::Status { code, .. } => *code == StatusCode::TOO_MANY_REQUESTS.as_u16(),
            PlatformError::Parse(_) => false,
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            PlatformError::Status { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlatformError::Transport(format!("request timed out: {}", err))
        } else {
            PlatformError::Transport(err.to_string())
        }
    }
}

// ============================================================================
// Platform Trait
// ============================================================================

/// A freshly created service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedService {
    pub id: String,
    pub name: String,
    /// Public URL the platform computed for the service
    pub app_url: String,
}

#[async_trait]
pub trait ProvisioningPlatform: Send + Sync {
    /// Number of services currently owned by the credential
    async fn list_resources(&self, credential: &CredentialRecord) -> Result<usize, PlatformError>;

    async fn create_service(
        &self,
        credential: &CredentialRecord,
        payload: &CreateServicePayload,
    ) -> Result<CreatedService, PlatformError>;

    /// Replace the full environment variable set of a service
    async fn replace_environment(
        &self,
        credential: &CredentialRecord,
        service_id: &str,
        vars: &[EnvVar],
    ) -> Result<(), PlatformError>;

    /// Dashboard link for a service
    fn dashboard_url(&self, service_id: &str) -> String;
}

// ============================================================================
// Render Platform
// ============================================================================

/// REST client for the Render API
#[derive(Clone)]
pub struct RenderPlatform {
    client: Client,
    config: PlatformConfig,
    timeouts: TimeoutConfig,
}

impl RenderPlatform {
    pub fn new(config: PlatformConfig, timeouts: TimeoutConfig) -> Result<Self, PlatformError> {
        let client = Client::builder()
            .connect_timeout(timeouts.probe)
            .build()?;

        tracing::info!(
            api_base = %config.api_base,
            region = %config.region,
            plan = %config.plan,
            "Initialized provisioning platform client"
        );

        Ok(Self {
            client,
            config,
            timeouts,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn authorized(
        &self,
        builder: reqwest::RequestBuilder,
        credential: &CredentialRecord,
    ) -> reqwest::RequestBuilder {
        builder
            .bearer_auth(credential.token())
            .header("Accept", "application/json")
    }

    /// Fail with the status and (bounded) body on a non-success response
    async fn check_status(response: Response) -> Result<Response, PlatformError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PlatformError::Status {
            code: status.as_u16(),
            body: truncate_with_ellipsis(body.trim(), MAX_ERROR_BODY_CHARS),
        })
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, PlatformError> {
        // A body that cannot be read after a 2xx is as unusable as one that
        // cannot be decoded
        let text = response
            .text()
            .await
            .map_err(|e| PlatformError::Parse(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                error = %e,
                body = %truncate_with_ellipsis(&text, MAX_ERROR_BODY_CHARS),
                "Failed to parse platform response"
            );
            PlatformError::Parse(e.to_string())
        })
    }
}

#[async_trait]
impl ProvisioningPlatform for RenderPlatform {
    async fn list_resources(&self, credential: &CredentialRecord) -> Result<usize, PlatformError> {
        let url = self.url("/services");

        tracing::debug!(
            url = %url,
            credential = %credential.masked_token(),
            "Probing credential load"
        );

        let response = self
            .authorized(self.client.get(&url), credential)
            .query(&[("limit", self.config.list_limit)])
            .timeout(self.timeouts.probe)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        // Each element is one service; only the count matters
        let services: Vec<serde_json::Value> = Self::parse_json(response).await?;
        Ok(services.len())
    }

    async fn create_service(
        &self,
        credential: &CredentialRecord,
        payload: &CreateServicePayload,
    ) -> Result<CreatedService, PlatformError> {
        let url = self.url("/services");

        tracing::debug!(
            url = %url,
            credential = %credential.masked_token(),
            owner_id = %payload.owner_id,
            name = %payload.name,
            "Calling platform create service API"
        );

        let response = self
            .authorized(self.client.post(&url), credential)
            .json(payload)
            .timeout(self.timeouts.create)
            .send()
            .await?;

        let response = Self::check_status(response).await?;
        let service = Self::parse_json::<CreateServiceResponse>(response)
            .await?
            .into_service();

        let name = service.name.clone().unwrap_or_else(|| payload.name.clone());
        let app_url = service
            .service_details
            .and_then(|d| d.url)
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| format!("https://{}.onrender.com", name));

        Ok(CreatedService {
            id: service.id,
            name,
            app_url,
        })
    }

    async fn replace_environment(
        &self,
        credential: &CredentialRecord,
        service_id: &str,
        vars: &[EnvVar],
    ) -> Result<(), PlatformError> {
        let url = self.url(&format!("/services/{}/env-vars", service_id));

        tracing::debug!(
            url = %url,
            service_id = %service_id,
            count = vars.len(),
            "Replacing service environment"
        );

        let response = self
            .authorized(self.client.put(&url), credential)
            .json(vars)
            .timeout(self.timeouts.configure)
            .send()
            .await?;

        Self::check_status(response).await?;
        Ok(())
    }

    fn dashboard_url(&self, service_id: &str) -> String {
        format!(
            "{}/web/{}",
            self.config.dashboard_base.trim_end_matches('/'),
            service_id
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
