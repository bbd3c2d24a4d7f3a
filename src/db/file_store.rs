//! JSON-file configuration store
//!
//! The document is re-read on every call so edits made by an administrator
//! (through the API or by hand) reach the next dispatch. Writes go to a
//! sibling temp file that is renamed over the original, so a reader sees
//! either the old document or the new one.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::sync::Mutex;

use crate::db::models::StoreDocument;
use crate::db::store::{ConfigStore, DocumentEdit, StoreError};

#[derive(Debug)]
pub struct FileConfigStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "store.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    async fn read_document(&self) -> Result<StoreDocument, StoreError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) if text.trim().is_empty() => Ok(StoreDocument::default()),
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(StoreDocument::default()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(&self, doc: &StoreDocument) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(doc)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for FileConfigStore {
    async fn load(&self) -> Result<StoreDocument, StoreError> {
        self.read_document().await
    }

    async fn modify(&self, edit: DocumentEdit) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.read_document().await?;
        edit.apply(&mut doc);
        self.write_document(&doc).await?;

        tracing::debug!(path = %self.path.display(), edit = edit_kind(&edit), "Store document updated");
        Ok(())
    }
}

/// Edit name without its payload, so tokens never reach the logs
fn edit_kind(edit: &DocumentEdit) -> &'static str {
    match edit {
        DocumentEdit::AppendCredential { .. } => "append_credential",
        DocumentEdit::ClearCredentials => "clear_credentials",
        DocumentEdit::SetDefaultRepository(_) => "set_default_repository",
        DocumentEdit::SetDefaultOwner(_) => "set_default_owner",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = FileConfigStore::new(dir.path().join("broker.json"));

        let doc = store.load().await.unwrap();
        assert_eq!(doc, StoreDocument::default());
    }

    #[tokio::test]
    async fn test_edits_persist_across_instances() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("broker.json");

        let store = FileConfigStore::new(&path);
        store.append_credential("rnd_a", "tea-alpha").await.unwrap();
        store.append_credential("rnd_b", "tea-bravo").await.unwrap();
        store.set_default_repository("https://github.com/example/bot").await.unwrap();

        let reopened = FileConfigStore::new(&path);
        assert_eq!(
            reopened.get_raw_credentials().await.unwrap(),
            "rnd_a,tea-alpha\nrnd_b,tea-bravo"
        );
        assert_eq!(
            reopened.get_default_repository().await.unwrap(),
            "https://github.com/example/bot"
        );
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_external_edit_is_picked_up() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broker.json");
        let store = FileConfigStore::new(&path);
        store.append_credential("rnd_a", "tea-alpha").await.unwrap();

        std::fs::write(&path, r#"{"credentials": "rnd_z,tea-zulu"}"#).unwrap();
        assert_eq!(store.get_raw_credentials().await.unwrap(), "rnd_z,tea-zulu");
    }

    #[tokio::test]
    async fn test_malformed_document_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("broker.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileConfigStore::new(&path);
        assert!(matches!(
            store.load().await,
            Err(StoreError::Serialization(_))
        ));
    }
}
