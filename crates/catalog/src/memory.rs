//! Process-local catalog backend.

use async_trait::async_trait;
use pipeline::{CatalogEntity, CatalogError, Edge, EdgeSet, EntityKind, EntityRef};
use tokio::sync::{RwLock, RwLockWriteGuard};

use crate::backend::{CatalogBackend, CatalogState, WriteBatch};

/// Keeps the catalog in memory. Lost on exit.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: RwLock<CatalogState>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_state(state: CatalogState) -> Self {
        Self {
            state: RwLock::new(state),
        }
    }

    /// Exclusive access for a caller that persists the next state before
    /// publishing it. Readers wait until the guard is dropped.
    pub(crate) async fn write(&self) -> RwLockWriteGuard<'_, CatalogState> {
        self.state.write().await
    }
}

#[async_trait]
impl CatalogBackend for MemoryBackend {
    async fn get(&self, entity: EntityRef) -> Result<Option<CatalogEntity>, CatalogError> {
        Ok(self.state.read().await.get(entity).cloned())
    }

    async fn list(&self, kind: EntityKind) -> Result<Vec<CatalogEntity>, CatalogError> {
        Ok(self.state.read().await.list(kind))
    }

    async fn edges(&self, set: EdgeSet) -> Result<Vec<Edge>, CatalogError> {
        Ok(self.state.read().await.edges(set))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), CatalogError> {
        let mut guard = self.write().await;
        let next = guard.applied(&batch)?;
        *guard = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pipeline::Epoch;

    use super::*;
    use crate::backend::Mutation;

    #[tokio::test]
    async fn failed_batch_leaves_state_untouched() {
        let backend = MemoryBackend::new();
        let epoch = CatalogEntity::Epoch(Epoch::new("2026-01", "", Vec::new()));
        let mut batch = WriteBatch::new();
        batch
            .push(Mutation::Insert(epoch.clone()))
            .push(Mutation::Insert(epoch.clone()));
        assert!(matches!(
            backend.commit(batch).await,
            Err(CatalogError::DuplicateId { .. })
        ));
        assert!(backend.get(epoch.entity_ref()).await.unwrap().is_none());
    }
}
