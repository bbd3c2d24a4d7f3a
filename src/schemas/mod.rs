//! Schema module
//!
//! Request/response models for the broker API and the provisioning platform.

pub mod deploy;
pub mod render;

pub use deploy::{FailureReason, ProvisionFailure, ProvisionResult, ProvisionSuccess, ServiceRequest};
pub use render::{CreateServicePayload, EnvVar, ServiceDetailsPayload, ServiceObject};
