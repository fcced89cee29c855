//! Lineage catalog for Insightflow.
//!
//! Stores the provenance graph (epochs, requirements, use cases, templates,
//! executions, and the lineage and containment edges between them) and
//! answers lineage, impact and statistics queries over it.
//!
//! ## Architectural Layer
//!
//! **Repository + storage adapters.** [`LineageCatalog`] owns every integrity
//! rule; a [`CatalogBackend`] only stores documents and applies write batches
//! atomically.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`repository`] | `LineageCatalog` repository |
//! | [`backend`] | `CatalogBackend` trait, `WriteBatch`, shared in-memory state |
//! | [`memory`] | `MemoryBackend` |
//! | [`file`] | `JsonFileBackend` (atomic snapshot file) |
//! | [`stats`] | Query result shapes |

pub mod backend;
pub mod file;
pub mod memory;
pub mod repository;
pub mod stats;

pub use backend::{CatalogBackend, CatalogDocument, Mutation, WriteBatch};
pub use file::JsonFileBackend;
pub use memory::MemoryBackend;
pub use repository::{ExecutionUpdate, LineageCatalog};
pub use stats::{CatalogStatistics, EpochStatistics, ExecutionSummary, ImpactReport};
