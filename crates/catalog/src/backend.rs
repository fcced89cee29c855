//! Storage seam for the lineage catalog.
//!
//! A backend stores entities and edges and applies [`WriteBatch`]es
//! atomically. It enforces nothing beyond key existence; integrity rules live
//! in [`crate::LineageCatalog`].

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use pipeline::{CatalogEntity, CatalogError, Edge, EdgeSet, EntityKind, EntityRef};
use serde::{Deserialize, Serialize};

/// One change inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Adds an entity; fails if the key already exists.
    Insert(CatalogEntity),
    /// Overwrites an existing entity; fails if the key is missing.
    Replace(CatalogEntity),
    /// Removes an entity; fails if the key is missing.
    Remove(EntityRef),
    /// Adds an edge; adding an existing edge is a no-op.
    InsertEdge(Edge),
    /// Removes an edge; removing a missing edge is a no-op.
    RemoveEdge(Edge),
}

/// An ordered group of mutations applied all-or-nothing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    mutations: Vec<Mutation>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, mutation: Mutation) -> &mut Self {
        self.mutations.push(mutation);
        self
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }
}

/// A durable (or not) store of catalog documents.
///
/// Implementations may sit in front of a networked store, so every call is
/// a suspension point.
#[async_trait]
pub trait CatalogBackend: Send + Sync {
    /// Fetches one entity.
    async fn get(&self, entity: EntityRef) -> Result<Option<CatalogEntity>, CatalogError>;

    /// Every entity of `kind`, ordered by identifier.
    async fn list(&self, kind: EntityKind) -> Result<Vec<CatalogEntity>, CatalogError>;

    /// Every edge of `set`.
    async fn edges(&self, set: EdgeSet) -> Result<Vec<Edge>, CatalogError>;

    /// Applies `batch` completely or not at all.
    ///
    /// # Errors
    ///
    /// [`CatalogError::DuplicateId`] / [`CatalogError::NotFound`] for key
    /// conflicts, [`CatalogError::Backend`] for storage failures. In every
    /// error case the stored state is unchanged.
    async fn commit(&self, batch: WriteBatch) -> Result<(), CatalogError>;

    /// Edges of `set` leaving `from`.
    async fn edges_from(&self, set: EdgeSet, from: EntityRef) -> Result<Vec<Edge>, CatalogError> {
        Ok(self
            .edges(set)
            .await?
            .into_iter()
            .filter(|e| e.from == from)
            .collect())
    }

    /// Edges of `set` arriving at `to`.
    async fn edges_to(&self, set: EdgeSet, to: EntityRef) -> Result<Vec<Edge>, CatalogError> {
        Ok(self
            .edges(set)
            .await?
            .into_iter()
            .filter(|e| e.to == to)
            .collect())
    }
}

// ---------------------------------------------------------------------------
// In-memory state shared by the bundled backends
// ---------------------------------------------------------------------------

/// Entities and edges held in memory.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogState {
    entities: BTreeMap<EntityRef, CatalogEntity>,
    edges: HashSet<Edge>,
}

impl CatalogState {
    pub fn get(&self, entity: EntityRef) -> Option<&CatalogEntity> {
        self.entities.get(&entity)
    }

    pub fn list(&self, kind: EntityKind) -> Vec<CatalogEntity> {
        self.entities
            .values()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn edges(&self, set: EdgeSet) -> Vec<Edge> {
        let mut edges: Vec<Edge> = self.edges.iter().filter(|e| e.set == set).copied().collect();
        edges.sort_by_key(|e| (e.from, e.to));
        edges
    }

    /// Returns the state that results from applying `batch` to `self`.
    pub fn applied(&self, batch: &WriteBatch) -> Result<CatalogState, CatalogError> {
        let mut next = self.clone();
        for mutation in batch.mutations() {
            match mutation {
                Mutation::Insert(entity) => {
                    let key = entity.entity_ref();
                    if next.entities.contains_key(&key) {
                        return Err(CatalogError::DuplicateId { entity: key });
                    }
                    next.entities.insert(key, entity.clone());
                }
                Mutation::Replace(entity) => {
                    let key = entity.entity_ref();
                    match next.entities.get_mut(&key) {
                        Some(slot) => *slot = entity.clone(),
                        None => return Err(CatalogError::NotFound { entity: key }),
                    }
                }
                Mutation::Remove(key) => {
                    if next.entities.remove(key).is_none() {
                        return Err(CatalogError::NotFound { entity: *key });
                    }
                }
                Mutation::InsertEdge(edge) => {
                    next.edges.insert(*edge);
                }
                Mutation::RemoveEdge(edge) => {
                    next.edges.remove(edge);
                }
            }
        }
        Ok(next)
    }

    pub fn to_document(&self) -> CatalogDocument {
        let mut edges: Vec<Edge> = self.edges.iter().copied().collect();
        edges.sort_by_key(|e| (e.set, e.from, e.to));
        CatalogDocument {
            entities: self.entities.values().cloned().collect(),
            edges,
        }
    }

    pub fn from_document(document: CatalogDocument) -> Self {
        Self {
            entities: document
                .entities
                .into_iter()
                .map(|e| (e.entity_ref(), e))
                .collect(),
            edges: document.edges.into_iter().collect(),
        }
    }
}

/// Serialised form of a [`CatalogState`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub entities: Vec<CatalogEntity>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}
