//! API endpoint handlers module

pub mod credentials;
pub mod deploy;
pub mod health;
