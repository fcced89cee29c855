//! Core domain for Insightflow.
//!
//! This crate contains every domain concept, newtype identifier, shared value
//! type, port trait and cross-cutting error type used throughout the pipeline.
//! Infrastructure crates implement the traits defined here; they never add
//! domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`EpochId`, `TemplateId`, `GraphName`, etc.) |
//! | [`types`] | Shared value types (`Confidence`, `TokenCount`, `Timestamp`) |
//! | [`errors`] | Error taxonomy and retry policy |
//! | [`config`] | `ReportingConfig` |
//! | [`lineage`] | Catalog entity models, edges and query shapes |
//! | [`schema`] | Graph schema input and schema-analysis output |
//! | [`algorithms`] | Algorithm strategy table, use-case kinds, parameter tuning |
//! | [`templates`] | Template validation rules |
//! | [`insights`] | Insight records, extractor, validator, heuristics |
//! | [`stage`] | Stage names, run phases, checkpoints |
//! | [`ports`] | `ReasoningProvider`, `AnalyticsEngine`, `CheckpointStore` |

pub mod algorithms;
pub mod config;
pub mod errors;
pub mod identifiers;
pub mod insights;
pub mod lineage;
pub mod ports;
pub mod schema;
pub mod stage;
pub mod templates;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use algorithms::{AlgorithmFamily, AlgorithmKind, AlgorithmParameters, EngineSize, UseCaseKind};
pub use config::{ConfigError, ReportingConfig};
pub use errors::{
    CatalogError, CheckpointError, EngineError, PipelineError, ProviderError, RetryPolicy,
    StageError, StageFailure,
};
pub use identifiers::{
    CollectionName, EpochId, ExecutionId, GraphName, PipelineRunId, RequirementId, TemplateId,
    UseCaseId,
};
pub use insights::{
    AnalysisReport, Insight, InsightOrigin, InsightType, InsightValidator, ValidationOutcome,
};
pub use lineage::{
    CatalogEntity, Direction, Edge, EdgeSet, EntityKind, EntityRef, Epoch, EpochStatus, Execution,
    ExecutionLineage, ExecutionStatus, GraphConfig, Objective, PerformanceMetrics, Priority,
    Requirement, Template, UseCase,
};
pub use ports::{AnalyticsEngine, CheckpointStore, EngineRun, ReasoningProvider, ResultRow};
pub use schema::{CollectionSchema, GraphSchema, GraphSize, RequirementsDocument, SchemaAnalysis};
pub use stage::{Checkpoint, ExecutionOutput, RunInputs, RunPhase, StageKind};
pub use templates::{TemplateReport, TemplateValidator};
pub use types::{Confidence, Timestamp, TokenCount};
