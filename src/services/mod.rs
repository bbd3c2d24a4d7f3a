//! Services module
//!
//! Contains the dispatch logic and the external platform integrations.

pub mod credential_pool;
pub mod dispatcher;
pub mod platform;
pub mod prober;
pub mod provisioner;
pub mod side_registration;

pub use credential_pool::{CredentialPool, CredentialRecord, DispatchMode};
pub use dispatcher::Dispatcher;
pub use platform::{PlatformError, ProvisioningPlatform, RenderPlatform};
pub use prober::{Candidate, LoadProber, ProbeReport};
pub use provisioner::Provisioner;
pub use side_registration::{
    HttpLogLinkIssuer, HttpUptimeRegistrar, LogLinkIssuer, SideRegistrationError,
    UptimeRegistrar,
};
