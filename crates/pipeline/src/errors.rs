//! Error and retry-policy types for the Insightflow pipeline domain.
//!
//! The taxonomy follows how far a failure is allowed to travel:
//!
//! - [`ProviderError`]: reasoning-capability failures. Always retried up to the
//!   unit bound, then replaced by the unit's heuristic. Never reaches the
//!   orchestrator.
//! - Malformed reasoning output and validation exhaustion are recovered inside
//!   the insight engine (see [`crate::insights`]) and have no error type.
//! - [`EngineError`]: analytics-engine failures. Surfaced as a recoverable
//!   [`StageFailure::Engine`]; the orchestrator may re-invoke the stage once.
//! - [`CatalogError`]: catalog write or integrity failures. Fatal.
//! - [`StageFailure::Dependency`]: a required upstream artefact is missing.
//!   Fatal, never retried.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::lineage::{EntityRef, ExecutionStatus};
use crate::stage::StageKind;
use crate::PipelineRunId;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by infrastructure error types to let the caller decide whether to
/// re-invoke an operation without escalating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Reasoning capability
// ---------------------------------------------------------------------------

/// Failure of a single call to the reasoning capability.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// The call did not complete within its bounded timeout.
    #[error("reasoning call timed out after {after:?}")]
    Timeout {
        /// The timeout that expired.
        after: Duration,
    },

    /// The provider throttled the request.
    #[error("reasoning provider rate limited the request")]
    RateLimited {
        /// Server-suggested delay (from `Retry-After`), if any.
        retry_after: Option<Duration>,
    },

    /// Transport failure or 5xx response.
    #[error("reasoning provider unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The provider refused the request (4xx other than 429).
    #[error("reasoning provider rejected the request ({status}): {message}")]
    Rejected {
        /// HTTP status code returned by the provider.
        status: u16,
        /// Body or reason returned by the provider.
        message: String,
    },

    /// The provider answered, but not with a usable completion.
    #[error("malformed reasoning response: {message}")]
    MalformedResponse {
        /// What was wrong with the response.
        message: String,
    },
}

impl ProviderError {
    /// Every reasoning failure is retryable up to the unit bound; only the
    /// delay differs.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            ProviderError::RateLimited { retry_after } => RetryPolicy::Retryable {
                after: *retry_after,
            },
            _ => RetryPolicy::Retryable { after: None },
        }
    }
}

// ---------------------------------------------------------------------------
// Analytics engine
// ---------------------------------------------------------------------------

/// Failure of the external graph-analytics engine.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    /// Transport failure or 5xx response.
    #[error("analytics engine unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// The job did not reach a terminal state in time.
    #[error("analytics job did not finish within {after:?}")]
    Timeout {
        /// The wait bound that expired.
        after: Duration,
    },

    /// The engine refused the job specification.
    #[error("analytics engine rejected the job ({status}): {message}")]
    Rejected {
        /// HTTP status code returned by the engine.
        status: u16,
        /// Reason returned by the engine.
        message: String,
    },

    /// The job ran and reported failure.
    #[error("analytics job {job_id} failed: {message}")]
    JobFailed {
        /// Engine-assigned job identifier.
        job_id: String,
        /// Failure reason reported by the engine.
        message: String,
    },

    /// The engine answered with a body that could not be decoded.
    #[error("malformed analytics engine response: {message}")]
    MalformedResponse {
        /// What was wrong with the response.
        message: String,
    },
}

impl EngineError {
    /// Rejections and undecodable responses will not improve on retry.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            EngineError::Rejected { .. } | EngineError::MalformedResponse { .. } => {
                RetryPolicy::NonRetryable
            }
            _ => RetryPolicy::Retryable { after: None },
        }
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Failure of a lineage catalog operation.
///
/// Any of these raised from a write means the write was rejected as a whole:
/// backends commit an entity and its edges together or not at all.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    /// The referenced entity does not exist.
    #[error("{entity} not found in catalog")]
    NotFound {
        /// The missing entity.
        entity: EntityRef,
    },

    /// An entity with this identifier already exists.
    #[error("{entity} already exists in catalog")]
    DuplicateId {
        /// The conflicting entity.
        entity: EntityRef,
    },

    /// A write would leave the foreign-key and edge representations out of
    /// agreement.
    #[error("catalog integrity violation: {message}")]
    IntegrityViolation {
        /// Description of the disagreement.
        message: String,
    },

    /// A lineage edge would close a cycle.
    #[error("lineage edge {from} -> {to} would create a cycle")]
    LineageCycle {
        /// Edge source.
        from: EntityRef,
        /// Edge target.
        to: EntityRef,
    },

    /// Deletion blocked because other entities still derive from this one.
    #[error("{entity} still has {dependents} dependent entities")]
    HasDependents {
        /// The entity whose deletion was requested.
        entity: EntityRef,
        /// Number of lineage children or epoch members.
        dependents: usize,
    },

    /// Execution status change not permitted by the lifecycle.
    #[error("execution {entity} cannot move from {from} to {to}")]
    InvalidTransition {
        /// The execution being updated.
        entity: EntityRef,
        /// Current status.
        from: ExecutionStatus,
        /// Requested status.
        to: ExecutionStatus,
    },

    /// The storage backend failed.
    #[error("catalog backend failure: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// Failure to persist or load orchestrator checkpoints.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CheckpointError {
    /// No checkpoint exists for the run.
    #[error("no checkpoint for run {run_id}")]
    NotFound {
        /// Run whose checkpoint was requested.
        run_id: PipelineRunId,
    },

    /// Reading or writing the checkpoint medium failed.
    #[error("checkpoint I/O failure: {message}")]
    Io {
        /// Description of the failure.
        message: String,
    },

    /// Checkpoint contents could not be encoded or decoded.
    #[error("checkpoint serialisation failure: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Stage errors
// ---------------------------------------------------------------------------

/// Why a capability unit failed after exhausting its own retries and fallback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageFailure {
    /// A required upstream artefact is missing.
    #[error("missing upstream artefact: {missing}")]
    Dependency {
        /// Description of the missing input.
        missing: String,
    },

    /// A catalog write failed.
    #[error("catalog write failed: {0}")]
    CatalogWrite(#[from] CatalogError),

    /// Every engine call of the stage failed.
    #[error("analytics engine failure: {0}")]
    Engine(#[from] EngineError),

    /// The stage ran but produced nothing usable (e.g. every template invalid).
    #[error("no usable output: {reason}")]
    NoUsableOutput {
        /// Why all candidate outputs were discarded.
        reason: String,
    },

    /// The blocking entry point could not drive the async implementation.
    #[error("runtime failure: {message}")]
    Runtime {
        /// Description of the failure.
        message: String,
    },
}

/// A capability-unit failure tagged with the stage that produced it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("stage {stage} failed: {cause}")]
pub struct StageError {
    /// The failing stage.
    pub stage: StageKind,
    /// Underlying cause.
    #[source]
    pub cause: StageFailure,
}

impl StageError {
    /// Creates a [`StageError`].
    pub fn new(stage: StageKind, cause: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    /// Shorthand for a [`StageFailure::Dependency`] failure.
    pub fn dependency(stage: StageKind, missing: impl Into<String>) -> Self {
        Self::new(
            stage,
            StageFailure::Dependency {
                missing: missing.into(),
            },
        )
    }

    /// Whether the orchestrator may re-invoke the stage.
    ///
    /// Only retryable engine failures qualify; dependency, catalog and
    /// empty-output failures are deterministic and fatal.
    pub fn is_recoverable(&self) -> bool {
        match &self.cause {
            StageFailure::Engine(e) => e.retry_policy().is_retryable(),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline-level errors
// ---------------------------------------------------------------------------

/// Errors that terminate a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A stage failed after unit-level and orchestrator-level retries; the run
    /// is in the `Failed(stage)` state. Catalog entries written before the
    /// failure remain inspectable.
    #[error("pipeline run {run_id} failed at {stage}: {source}")]
    StageFailed {
        /// The run that failed.
        run_id: PipelineRunId,
        /// The stage that failed.
        stage: StageKind,
        /// The stage error.
        #[source]
        source: StageError,
    },

    /// Checkpoint persistence failed.
    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    /// Catalog setup (e.g. epoch creation) failed before any stage ran.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// The run cannot be resumed because it already reached a terminal state.
    #[error("pipeline run {run_id} already finished")]
    AlreadyFinished {
        /// The finished run.
        run_id: PipelineRunId,
    },
}
