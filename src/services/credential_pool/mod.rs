//! Credential Pool Module
//!
//! Parsing of the hand-edited credential blob and the per-dispatch pool
//! built from it.
//!
//! # Example
//! ```
//! use deploy_broker::services::credential_pool::CredentialPool;
//!
//! let pool = CredentialPool::from_blob("rnd_one,tea-primary\nrnd_two", "usr-fallback");
//! assert_eq!(pool.len(), 2);
//! assert_eq!(pool.ordered()[1].owner_id(), "usr-fallback");
//! ```

mod credential;
mod pool;
mod strategy;

pub use credential::{
    append_line, format_blob, parse_credentials, CredentialRecord, MIN_OWNER_ID_LEN,
};
pub use pool::CredentialPool;
pub use strategy::DispatchMode;
