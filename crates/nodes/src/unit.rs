//! The capability-unit contract.
//!
//! A unit turns one typed input into one typed output for a single stage. It
//! may ask the [`ReasoningGateway`] for help (at most
//! [`CapabilityUnit::REASONING_ATTEMPTS`] tries) and otherwise runs a
//! deterministic heuristic. Catalog writes happen inside the unit, through
//! [`StageContext::catalog`], before it returns.

use std::sync::Arc;

use async_trait::async_trait;
use catalog::LineageCatalog;
use pipeline::{EpochId, PipelineRunId, ReportingConfig, StageError, StageFailure, StageKind};

use crate::gateway::ReasoningGateway;

/// Everything a unit needs besides its input.
#[derive(Debug, Clone)]
pub struct StageContext {
    pub run_id: PipelineRunId,
    pub epoch_id: EpochId,
    pub config: Arc<ReportingConfig>,
    pub gateway: Arc<ReasoningGateway>,
    pub catalog: Arc<LineageCatalog>,
}

/// One pipeline stage.
#[async_trait]
pub trait CapabilityUnit: Send + Sync {
    type Input: Send + Sync;
    type Output: Send;

    /// Stage tag carried by every error this unit returns.
    const STAGE: StageKind;

    /// Reasoning attempts before falling back to the heuristic.
    const REASONING_ATTEMPTS: u32 = 2;

    /// Runs the stage.
    ///
    /// # Errors
    ///
    /// A [`StageError`] tagged with [`Self::STAGE`] once reasoning retries and
    /// the heuristic fallback are exhausted.
    async fn execute_async(
        &self,
        input: &Self::Input,
        ctx: &StageContext,
    ) -> Result<Self::Output, StageError>;

    /// Blocking form of [`execute_async`](Self::execute_async).
    ///
    /// Drives the async implementation on a private current-thread runtime.
    /// Must not be called from inside an async context.
    fn execute(&self, input: &Self::Input, ctx: &StageContext) -> Result<Self::Output, StageError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                StageError::new(
                    Self::STAGE,
                    StageFailure::Runtime {
                        message: e.to_string(),
                    },
                )
            })?;
        runtime.block_on(self.execute_async(input, ctx))
    }
}

/// First line of every prompt, naming the stage.
pub(crate) fn prompt_header(stage: StageKind) -> String {
    format!("Stage: {stage}\n")
}
