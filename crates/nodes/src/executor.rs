//! The pipeline orchestrator.
//!
//! [`PipelineExecutor`] is a step function over [`RunPhase`]: run the units
//! of the current phase, store their outputs in the [`Checkpoint`], advance,
//! persist. A failure moves the run to `Failed { stage }`, persists that too,
//! and surfaces [`PipelineError::StageFailed`]. Catalog entries written before
//! the failure are left in place.
//!
//! ## Retry layering
//!
//! Units retry reasoning calls themselves and fall back to heuristics. On top
//! of that the executor re-invokes a unit **once** when its error is
//! recoverable ([`StageError::is_recoverable`]). In the fan-out phase only the
//! failing member is re-invoked; its sibling is not restarted. A fatal error
//! from either member drops the other's pending future.

use std::sync::Arc;

use catalog::LineageCatalog;
use futures::future::try_join;
use pipeline::{
    AnalysisReport, AnalyticsEngine, Checkpoint, CheckpointStore, EpochId, ExecutionOutput,
    PipelineError, PipelineRunId, ReportingConfig, RunInputs, RunPhase, StageError, StageKind,
    Timestamp,
};
use serde::Serialize;
use tracing::{error, info, info_span, warn, Instrument};

use crate::gateway::{GatewayStats, ReasoningGateway};
use crate::unit::{CapabilityUnit, StageContext};
use crate::units::{
    ExecutionUnit, ReportingUnit, RequirementsUnit, SchemaAnalysisUnit, TemplateInput,
    TemplateUnit, UseCaseInput, UseCaseUnit,
};

/// What a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunOutcome {
    pub run_id: PipelineRunId,
    pub epoch_id: EpochId,
    pub executions: Vec<ExecutionOutput>,
    pub reports: Vec<AnalysisReport>,
}

/// Drives runs from inputs to reports.
pub struct PipelineExecutor {
    config: Arc<ReportingConfig>,
    gateway: Arc<ReasoningGateway>,
    catalog: Arc<LineageCatalog>,
    checkpoints: Arc<dyn CheckpointStore>,
    templates: TemplateUnit,
    execution: ExecutionUnit,
}

impl std::fmt::Debug for PipelineExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineExecutor")
            .field("config", &self.config)
            .field("gateway", &self.gateway)
            .finish_non_exhaustive()
    }
}

/// The phase that runs `stage`.
fn phase_of(stage: StageKind) -> RunPhase {
    match stage {
        StageKind::SchemaAnalysis | StageKind::RequirementsExtraction => {
            RunPhase::SchemaAndRequirements
        }
        StageKind::UseCaseGeneration => RunPhase::UseCaseGeneration,
        StageKind::TemplateGeneration => RunPhase::TemplateGeneration,
        StageKind::Execution => RunPhase::Execution,
        StageKind::Reporting => RunPhase::Reporting,
    }
}

fn required<'a, T>(
    value: &'a Option<T>,
    stage: StageKind,
    what: &str,
) -> Result<&'a T, StageError> {
    value
        .as_ref()
        .ok_or_else(|| StageError::dependency(stage, what))
}

impl PipelineExecutor {
    pub fn new(
        config: ReportingConfig,
        gateway: ReasoningGateway,
        catalog: Arc<LineageCatalog>,
        engine: Arc<dyn AnalyticsEngine>,
        checkpoints: Arc<dyn CheckpointStore>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            gateway: Arc::new(gateway),
            catalog,
            checkpoints,
            templates: TemplateUnit::default(),
            execution: ExecutionUnit::new(engine),
        }
    }

    /// Treat template validation warnings as errors.
    pub fn with_strict_templates(mut self, strict: bool) -> Self {
        self.templates = TemplateUnit::new(strict);
        self
    }

    pub fn catalog(&self) -> &Arc<LineageCatalog> {
        &self.catalog
    }

    pub fn reasoning_stats(&self) -> GatewayStats {
        self.gateway.stats()
    }

    /// Starts a new run in `epoch_id`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Catalog`] if the epoch does not exist,
    /// [`PipelineError::StageFailed`] if a stage fails,
    /// [`PipelineError::Checkpoint`] if the checkpoint cannot be written.
    pub async fn run(
        &self,
        epoch_id: EpochId,
        inputs: RunInputs,
    ) -> Result<RunOutcome, PipelineError> {
        self.catalog.epoch(epoch_id).await?;
        let checkpoint = Checkpoint::new(PipelineRunId::new_random(), epoch_id, inputs);
        info!(run_id = %checkpoint.run_id, %epoch_id, "starting pipeline run");
        self.drive(checkpoint).await
    }

    /// Continues `run_id` from its last checkpoint.
    ///
    /// A failed run restarts at the phase that failed; outputs of earlier
    /// phases are reused.
    ///
    /// # Errors
    ///
    /// [`PipelineError::AlreadyFinished`] for a completed run, otherwise as
    /// for [`run`](Self::run).
    pub async fn resume(&self, run_id: PipelineRunId) -> Result<RunOutcome, PipelineError> {
        let mut checkpoint = self.checkpoints.load(run_id).await?;
        match checkpoint.phase {
            RunPhase::Completed => return Err(PipelineError::AlreadyFinished { run_id }),
            RunPhase::Failed { stage } => {
                checkpoint.phase = phase_of(stage);
                warn!(%run_id, %stage, "resuming failed run");
            }
            phase => info!(%run_id, %phase, "resuming run"),
        }
        self.drive(checkpoint).await
    }

    /// The persisted phase of `run_id`.
    ///
    /// # Errors
    ///
    /// [`PipelineError::Checkpoint`] when the run is unknown.
    pub async fn phase(&self, run_id: PipelineRunId) -> Result<RunPhase, PipelineError> {
        Ok(self.checkpoints.load(run_id).await?.phase)
    }

    async fn save(&self, checkpoint: &mut Checkpoint) -> Result<(), PipelineError> {
        checkpoint.updated_at = Timestamp::now();
        self.checkpoints.save(checkpoint).await?;
        Ok(())
    }

    async fn drive(&self, mut checkpoint: Checkpoint) -> Result<RunOutcome, PipelineError> {
        let run_id = checkpoint.run_id;
        let ctx = StageContext {
            run_id,
            epoch_id: checkpoint.epoch_id,
            config: Arc::clone(&self.config),
            gateway: Arc::clone(&self.gateway),
            catalog: Arc::clone(&self.catalog),
        };
        let span = info_span!("pipeline_run", %run_id, epoch_id = %checkpoint.epoch_id);

        async {
            self.save(&mut checkpoint).await?;
            while let Some(next) = checkpoint.phase.next() {
                let phase = checkpoint.phase;
                let outcome = self
                    .run_phase(phase, &mut checkpoint, &ctx)
                    .instrument(info_span!("phase", %phase))
                    .await;
                if let Err(source) = outcome {
                    let stage = source.stage;
                    checkpoint.phase = RunPhase::Failed { stage };
                    self.save(&mut checkpoint).await?;
                    error!(%stage, error = %source, "pipeline run failed");
                    return Err(PipelineError::StageFailed {
                        run_id,
                        stage,
                        source,
                    });
                }
                checkpoint.phase = next;
                self.save(&mut checkpoint).await?;
            }

            let stats = self.gateway.stats();
            info!(
                reports = checkpoint.reports.as_ref().map_or(0, Vec::len),
                reasoning_calls = stats.calls,
                reasoning_fallbacks = stats.fallbacks,
                "pipeline run completed"
            );
            Ok(RunOutcome {
                run_id,
                epoch_id: checkpoint.epoch_id,
                executions: checkpoint.executions.take().unwrap_or_default(),
                reports: checkpoint.reports.take().unwrap_or_default(),
            })
        }
        .instrument(span)
        .await
    }

    async fn run_phase(
        &self,
        phase: RunPhase,
        checkpoint: &mut Checkpoint,
        ctx: &StageContext,
    ) -> Result<(), StageError> {
        match phase {
            RunPhase::NotStarted | RunPhase::Completed | RunPhase::Failed { .. } => {}
            RunPhase::SchemaAndRequirements => {
                let inputs = &checkpoint.inputs;
                let (analysis, requirement) = try_join(
                    self.invoke(&SchemaAnalysisUnit, &inputs.schema, ctx),
                    self.invoke(&RequirementsUnit, &inputs.documents, ctx),
                )
                .await?;
                checkpoint.schema_analysis = Some(analysis);
                checkpoint.requirement = Some(requirement);
            }
            RunPhase::UseCaseGeneration => {
                let stage = StageKind::UseCaseGeneration;
                let input = UseCaseInput {
                    analysis: required(&checkpoint.schema_analysis, stage, "schema analysis")?
                        .clone(),
                    requirement: required(&checkpoint.requirement, stage, "requirement")?.clone(),
                };
                checkpoint.use_cases = Some(self.invoke(&UseCaseUnit, &input, ctx).await?);
            }
            RunPhase::TemplateGeneration => {
                let stage = StageKind::TemplateGeneration;
                let input = TemplateInput {
                    analysis: required(&checkpoint.schema_analysis, stage, "schema analysis")?
                        .clone(),
                    use_cases: required(&checkpoint.use_cases, stage, "use cases")?.clone(),
                };
                checkpoint.templates = Some(self.invoke(&self.templates, &input, ctx).await?);
            }
            RunPhase::Execution => {
                let templates = required(&checkpoint.templates, StageKind::Execution, "templates")?;
                let executions = self.invoke(&self.execution, templates, ctx).await?;
                checkpoint.executions = Some(executions);
            }
            RunPhase::Reporting => {
                let executions =
                    required(&checkpoint.executions, StageKind::Reporting, "executions")?;
                let reports = self.invoke(&ReportingUnit, executions, ctx).await?;
                checkpoint.reports = Some(reports);
            }
        }
        Ok(())
    }

    /// Runs `unit`, re-invoking it once after a recoverable failure.
    async fn invoke<U: CapabilityUnit>(
        &self,
        unit: &U,
        input: &U::Input,
        ctx: &StageContext,
    ) -> Result<U::Output, StageError> {
        match unit.execute_async(input, ctx).await {
            Err(e) if e.is_recoverable() => {
                warn!(stage = %U::STAGE, error = %e, "stage failed; retrying once");
                unit.execute_async(input, ctx).await
            }
            outcome => outcome,
        }
    }
}
