//! Best-effort side registrations
//!
//! After a service is created the broker tells an uptime monitor about the
//! new URL and asks a log-link issuer for a shareable log view. Both are
//! optional collaborators; their failures never affect the dispatch result.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::credential_pool::CredentialRecord;
use crate::utils::{truncate_with_ellipsis, TimeoutConfig};

#[derive(Error, Debug)]
pub enum SideRegistrationError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    #[error("Malformed response: {0}")]
    Parse(String),
}

/// Keeps a freshly deployed app awake by pinging its URL
#[async_trait]
pub trait UptimeRegistrar: Send + Sync {
    async fn register(&self, app_url: &str) -> Result<(), SideRegistrationError>;
}

/// Issues a shareable log link for a service
#[async_trait]
pub trait LogLinkIssuer: Send + Sync {
    async fn create_link(
        &self,
        credential: &CredentialRecord,
        service_id: &str,
    ) -> Result<String, SideRegistrationError>;
}

// ============================================================================
// HTTP implementations
// ============================================================================

#[derive(Serialize)]
struct UptimeRegistration<'a> {
    url: &'a str,
}

#[derive(Serialize)]
struct LogLinkRequest<'a> {
    api_key: &'a str,
    service_id: &'a str,
}

#[derive(Deserialize)]
struct LogLinkResponse {
    #[serde(alias = "url")]
    link: Option<String>,
}

fn build_client(timeouts: &TimeoutConfig) -> Result<Client, SideRegistrationError> {
    Ok(Client::builder().timeout(timeouts.side_registration).build()?)
}

async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, SideRegistrationError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SideRegistrationError::Status {
        code: status.as_u16(),
        body: truncate_with_ellipsis(body.trim(), 200),
    })
}

/// Posts `{"url": ...}` to an uptime monitor endpoint
pub struct HttpUptimeRegistrar {
    client: Client,
    endpoint: String,
}

impl HttpUptimeRegistrar {
    pub fn new(
        endpoint: impl Into<String>,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, SideRegistrationError> {
        Ok(Self {
            client: build_client(timeouts)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl UptimeRegistrar for HttpUptimeRegistrar {
    async fn register(&self, app_url: &str) -> Result<(), SideRegistrationError> {
        tracing::debug!(endpoint = %self.endpoint, app_url = %app_url, "Registering uptime ping");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&UptimeRegistration { url: app_url })
            .send()
            .await?;

        ensure_success(response).await?;
        Ok(())
    }
}

/// Posts the credential and service id to a log-link issuer and reads back
/// `{"link": ...}` (or `{"url": ...}`)
pub struct HttpLogLinkIssuer {
    client: Client,
    endpoint: String,
}

impl HttpLogLinkIssuer {
    pub fn new(
        endpoint: impl Into<String>,
        timeouts: &TimeoutConfig,
    ) -> Result<Self, SideRegistrationError> {
        Ok(Self {
            client: build_client(timeouts)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl LogLinkIssuer for HttpLogLinkIssuer {
    async fn create_link(
        &self,
        credential: &CredentialRecord,
        service_id: &str,
    ) -> Result<String, SideRegistrationError> {
        tracing::debug!(endpoint = %self.endpoint, service_id = %service_id, "Requesting log link");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&LogLinkRequest {
                api_key: credential.token(),
                service_id,
            })
            .send()
            .await?;

        let response = ensure_success(response).await?;
        let body: LogLinkResponse = response
            .json()
            .await
            .map_err(|e| SideRegistrationError::Parse(e.to_string()))?;

        body.link
            .filter(|link| !link.trim().is_empty())
            .ok_or_else(|| SideRegistrationError::Parse("response carried no link".to_string()))
    }
}
