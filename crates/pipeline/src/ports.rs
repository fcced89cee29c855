//! Port traits implemented by infrastructure crates.
//!
//! | Trait | Implemented by |
//! |-------|----------------|
//! | [`ReasoningProvider`] | `llm` (HTTP chat-completion APIs) |
//! | [`AnalyticsEngine`] | `analytics-engine` (HTTP job API) |
//! | [`CheckpointStore`] | `nodes::checkpoint` (memory, JSON files) |
//!
//! The lineage catalog's storage seam lives in the `catalog` crate because it
//! is synchronous and owned by the repository that enforces integrity.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{CheckpointError, EngineError, ProviderError};
use crate::lineage::{PerformanceMetrics, Template};
use crate::stage::Checkpoint;
use crate::PipelineRunId;

// ---------------------------------------------------------------------------
// Reasoning
// ---------------------------------------------------------------------------

/// A text-completion capability.
///
/// Implementations perform exactly one request per call. Retries, timeouts
/// around the whole call and heuristic fallback belong to the caller.
#[async_trait]
pub trait ReasoningProvider: Send + Sync {
    /// Completes `prompt`, giving up after `timeout`.
    ///
    /// # Errors
    ///
    /// Every [`ProviderError`] is treated as transient by the pipeline.
    async fn complete(&self, prompt: &str, timeout: Duration) -> Result<String, ProviderError>;

    /// Provider label for logs, e.g. `"anthropic"`.
    fn name(&self) -> &str;
}

// ---------------------------------------------------------------------------
// Analytics engine
// ---------------------------------------------------------------------------

/// One row of algorithm output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    /// Vertex key the score belongs to.
    #[serde(alias = "_key")]
    pub key: String,
    /// Score, community id, component id or distance depending on algorithm.
    pub result: f64,
    /// Any further fields the engine returned.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResultRow {
    pub fn new(key: impl Into<String>, result: f64) -> Self {
        Self {
            key: key.into(),
            result,
            extra: Map::new(),
        }
    }
}

/// A finished engine job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineRun {
    /// Engine-side job identifier.
    pub job_id: String,
    pub rows: Vec<ResultRow>,
    pub metrics: PerformanceMetrics,
}

/// A graph analytics engine that runs templates as jobs.
#[async_trait]
pub trait AnalyticsEngine: Send + Sync {
    /// Submits `template` and waits for its result rows.
    ///
    /// # Errors
    ///
    /// See [`EngineError`] for which failures are retryable.
    async fn execute(&self, template: &Template) -> Result<EngineRun, EngineError>;
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// Durable storage for orchestrator checkpoints, keyed by run.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Loads the latest checkpoint of `run_id`.
    ///
    /// # Errors
    ///
    /// [`CheckpointError::NotFound`] when the run has never been checkpointed.
    async fn load(&self, run_id: PipelineRunId) -> Result<Checkpoint, CheckpointError>;

    /// Replaces the checkpoint of `checkpoint.run_id`.
    async fn save(&self, checkpoint: &Checkpoint) -> Result<(), CheckpointError>;
}
