//! Single-file JSON catalog backend.
//!
//! The whole catalog is rewritten on every commit: the new document goes to a
//! sibling `*.tmp` file which is then renamed over the original, so a crash
//! leaves either the old or the new snapshot on disk, never a torn one.
//!
//! Each commit costs time proportional to the size of the whole catalog. This
//! suits single-user runs over a handful of epochs; a long-lived catalog
//! belongs in a store with incremental writes behind [`CatalogBackend`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pipeline::{CatalogEntity, CatalogError, Edge, EdgeSet, EntityKind, EntityRef};
use tokio::fs;
use tracing::{debug, info};

use crate::backend::{CatalogBackend, CatalogDocument, CatalogState, WriteBatch};
use crate::memory::MemoryBackend;

/// Catalog persisted as one JSON document.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    cache: MemoryBackend,
}

impl JsonFileBackend {
    /// Opens `path`, loading the existing snapshot if there is one.
    ///
    /// # Errors
    ///
    /// [`CatalogError::Backend`] when the file exists but cannot be read or
    /// parsed, or its parent directory cannot be created.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let state = match fs::read(&path).await {
            Ok(bytes) => {
                let document: CatalogDocument = serde_json::from_slice(&bytes)
                    .map_err(|e| backend_error(&path, "parse", e))?;
                info!(
                    path = %path.display(),
                    entities = document.entities.len(),
                    edges = document.edges.len(),
                    "loaded catalog snapshot"
                );
                CatalogState::from_document(document)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent)
                        .await
                        .map_err(|e| backend_error(parent, "create", e))?;
                }
                CatalogState::default()
            }
            Err(e) => return Err(backend_error(&path, "read", e)),
        };
        Ok(Self {
            path,
            cache: MemoryBackend::with_state(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn backend_error(path: &Path, action: &str, err: impl std::fmt::Display) -> CatalogError {
    CatalogError::Backend {
        message: format!("failed to {action} {}: {err}", path.display()),
    }
}

async fn write_snapshot(path: &Path, state: &CatalogState) -> Result<(), CatalogError> {
    let bytes = serde_json::to_vec(&state.to_document())
        .map_err(|e| backend_error(path, "serialise", e))?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, &bytes)
        .await
        .map_err(|e| backend_error(&tmp, "write", e))?;
    fs::rename(&tmp, path)
        .await
        .map_err(|e| backend_error(path, "replace", e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote catalog snapshot");
    Ok(())
}

#[async_trait]
impl CatalogBackend for JsonFileBackend {
    async fn get(&self, entity: EntityRef) -> Result<Option<CatalogEntity>, CatalogError> {
        self.cache.get(entity).await
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<CatalogEntity>, CatalogError> {
        self.cache.list(kind).await
    }

    async fn edges(&self, set: EdgeSet) -> Result<Vec<Edge>, CatalogError> {
        self.cache.edges(set).await
    }

    /// The new state becomes visible only after the snapshot is on disk.
    async fn commit(&self, batch: WriteBatch) -> Result<(), CatalogError> {
        let mut guard = self.cache.write().await;
        let next = guard.applied(&batch)?;
        write_snapshot(&self.path, &next).await?;
        *guard = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pipeline::Epoch;

    use super::*;
    use crate::backend::Mutation;

    fn insert(entity: &CatalogEntity) -> WriteBatch {
        let mut batch = WriteBatch::new();
        batch.push(Mutation::Insert(entity.clone()));
        batch
    }

    #[tokio::test]
    async fn commits_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("catalog.json");
        let epoch = CatalogEntity::Epoch(Epoch::new("2026-03", "march", vec!["q1".into()]));

        let backend = JsonFileBackend::open(&path).await.unwrap();
        backend.commit(insert(&epoch)).await.unwrap();
        drop(backend);

        let reopened = JsonFileBackend::open(&path).await.unwrap();
        assert_eq!(reopened.get(epoch.entity_ref()).await.unwrap(), Some(epoch));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn snapshot_is_written_compact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        let epoch = CatalogEntity::Epoch(Epoch::new("2026-04", "april", Vec::new()));

        let backend = JsonFileBackend::open(&path).await.unwrap();
        backend.commit(insert(&epoch)).await.unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(!bytes.contains(&b'\n'));
    }

    #[tokio::test]
    async fn failed_write_keeps_previous_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("catalog.json");
        let backend = JsonFileBackend::open(&path).await.unwrap();
        std::fs::remove_dir(dir.path().join("state")).unwrap();

        let epoch = CatalogEntity::Epoch(Epoch::new("2026-05", "", Vec::new()));
        assert!(matches!(
            backend.commit(insert(&epoch)).await,
            Err(CatalogError::Backend { .. })
        ));
        assert!(backend.get(epoch.entity_ref()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn corrupt_snapshot_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(matches!(
            JsonFileBackend::open(&path).await,
            Err(CatalogError::Backend { .. })
        ));
    }
}
