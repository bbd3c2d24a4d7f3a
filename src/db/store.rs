//! Configuration store collaborator
//!
//! Holds the raw credential pool and the deployment defaults. The dispatcher
//! reads it fresh on every dispatch and never caches it.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::db::models::StoreDocument;
use crate::services::credential_pool::append_line;
use crate::utils::{with_timeout, TimeoutError};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store document is malformed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
}

/// A single change to the stored document
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentEdit {
    AppendCredential { token: String, owner_id: String },
    ClearCredentials,
    SetDefaultRepository(String),
    SetDefaultOwner(String),
}

impl DocumentEdit {
    pub fn apply(&self, doc: &mut StoreDocument) {
        match self {
            DocumentEdit::AppendCredential { token, owner_id } => {
                doc.credentials = append_line(&doc.credentials, token, owner_id);
            }
            DocumentEdit::ClearCredentials => doc.credentials.clear(),
            DocumentEdit::SetDefaultRepository(repo) => {
                doc.default_repository = repo.trim().to_string();
            }
            DocumentEdit::SetDefaultOwner(owner) => doc.default_owner = owner.trim().to_string(),
        }
        doc.touch();
    }
}

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Read the whole document
    async fn load(&self) -> Result<StoreDocument, StoreError>;

    /// Apply one edit atomically with respect to other edits
    async fn modify(&self, edit: DocumentEdit) -> Result<(), StoreError>;

    async fn get_raw_credentials(&self) -> Result<String, StoreError> {
        Ok(self.load().await?.credentials)
    }

    async fn get_default_repository(&self) -> Result<String, StoreError> {
        Ok(self.load().await?.default_repository)
    }

    async fn get_default_owner(&self) -> Result<String, StoreError> {
        Ok(self.load().await?.default_owner)
    }

    async fn append_credential(&self, token: &str, owner_id: &str) -> Result<(), StoreError> {
        self.modify(DocumentEdit::AppendCredential {
            token: token.to_string(),
            owner_id: owner_id.to_string(),
        })
        .await
    }

    async fn clear_credentials(&self) -> Result<(), StoreError> {
        self.modify(DocumentEdit::ClearCredentials).await
    }

    async fn set_default_repository(&self, repository: &str) -> Result<(), StoreError> {
        self.modify(DocumentEdit::SetDefaultRepository(repository.to_string()))
            .await
    }

    async fn set_default_owner(&self, owner_id: &str) -> Result<(), StoreError> {
        self.modify(DocumentEdit::SetDefaultOwner(owner_id.to_string()))
            .await
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store, seeded from the environment at startup
#[derive(Debug, Default)]
pub struct InMemoryConfigStore {
    doc: RwLock<StoreDocument>,
}

impl InMemoryConfigStore {
    pub fn new(doc: StoreDocument) -> Self {
        Self {
            doc: RwLock::new(doc),
        }
    }

    pub fn seeded(credentials: impl Into<String>, default_repository: impl Into<String>) -> Self {
        Self::new(StoreDocument {
            credentials: credentials.into(),
            default_repository: default_repository.into(),
            ..Default::default()
        })
    }
}

#[async_trait]
impl ConfigStore for InMemoryConfigStore {
    async fn load(&self) -> Result<StoreDocument, StoreError> {
        Ok(self.doc.read().await.clone())
    }

    async fn modify(&self, edit: DocumentEdit) -> Result<(), StoreError> {
        edit.apply(&mut *self.doc.write().await);
        Ok(())
    }
}

// ============================================================================
// Deadline wrapper
// ============================================================================

/// Puts every call to the inner store under a deadline
pub struct TimedConfigStore {
    inner: Arc<dyn ConfigStore>,
    timeout: Duration,
}

impl TimedConfigStore {
    pub fn new(inner: Arc<dyn ConfigStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

fn flatten(err: TimeoutError<StoreError>) -> StoreError {
    match err {
        TimeoutError::Timeout(after) => StoreError::Timeout(after),
        TimeoutError::Inner(e) => e,
    }
}

#[async_trait]
impl ConfigStore for TimedConfigStore {
    async fn load(&self) -> Result<StoreDocument, StoreError> {
        with_timeout(self.timeout, self.inner.load())
            .await
            .map_err(flatten)
    }

    async fn modify(&self, edit: DocumentEdit) -> Result<(), StoreError> {
        with_timeout(self.timeout, self.inner.modify(edit))
            .await
            .map_err(flatten)
    }
}
