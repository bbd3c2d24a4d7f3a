//! Deploy broker library
//!
//! Credential-pool dispatcher for provisioning services on a hosted
//! platform, plus the HTTP service around it.

// Public modules
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod schemas;
pub mod server;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Settings;
pub use error::ApiError;
pub use schemas::{ProvisionResult, ServiceRequest};
pub use server::App;
pub use services::Dispatcher;
