//! Database module
//!
//! Configuration store implementations and the persisted document model.

pub mod file_store;
pub mod models;
pub mod store;

pub use file_store::FileConfigStore;
pub use models::StoreDocument;
pub use store::{ConfigStore, DocumentEdit, InMemoryConfigStore, StoreError, TimedConfigStore};
