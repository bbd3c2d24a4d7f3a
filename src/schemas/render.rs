//! Provisioning platform wire types
//!
//! Only the subset of the platform's REST API the broker touches: service
//! creation and environment variable replacement. The service listing used
//! as a load probe is only counted, never decoded.

use serde::{Deserialize, Serialize};

/// POST /services request body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateServicePayload {
    #[serde(rename = "type")]
    pub service_type: String,
    pub name: String,
    pub owner_id: String,
    pub repo: String,
    pub auto_deploy: String,
    pub service_details: ServiceDetailsPayload,
}

/// Fixed deployment parameters nested in the create payload
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDetailsPayload {
    /// Execution environment kind (e.g. `docker`)
    pub env: String,
    pub region: String,
    pub plan: String,
}

/// A service as returned by create and list calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ServiceObject {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dashboard_url: Option<String>,
    #[serde(default)]
    pub service_details: Option<ServiceDetailsObject>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceDetailsObject {
    #[serde(default)]
    pub url: Option<String>,
}

/// POST /services response; some deployments wrap the service, some do not
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CreateServiceResponse {
    Wrapped {
        service: ServiceObject,
        #[serde(default, rename = "deployId")]
        deploy_id: Option<String>,
    },
    Bare(ServiceObject),
}

impl CreateServiceResponse {
    pub fn into_service(self) -> ServiceObject {
        match self {
            CreateServiceResponse::Wrapped { service, .. } => service,
            CreateServiceResponse::Bare(service) => service,
        }
    }
}

/// One environment variable in a PUT /services/{id}/env-vars body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}
