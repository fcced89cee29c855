//! Job execution on the external analytics engine.
//!
//! Each template gets its own execution record, created `pending` before the
//! engine is called and moved through `running` to `completed` or `failed`.
//! Templates run concurrently. The stage fails only when no execution
//! completes; individual failures stay visible in the catalog.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::join_all;
use pipeline::{
    AnalyticsEngine, CatalogError, EngineError, Execution, ExecutionOutput, ExecutionStatus,
    StageError, StageKind, Template,
};
use tracing::{info, info_span, warn, Instrument};

use catalog::ExecutionUpdate;

use crate::unit::{CapabilityUnit, StageContext};

/// Runs templates through an [`AnalyticsEngine`].
pub struct ExecutionUnit {
    engine: Arc<dyn AnalyticsEngine>,
}

impl std::fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionUnit").finish_non_exhaustive()
    }
}

impl ExecutionUnit {
    pub fn new(engine: Arc<dyn AnalyticsEngine>) -> Self {
        Self { engine }
    }

    /// Runs one template. Catalog failures abort the stage; engine failures
    /// are recorded on the execution and returned alongside it.
    async fn run_one(
        &self,
        template: &Template,
        ctx: &StageContext,
    ) -> Result<(ExecutionOutput, Option<EngineError>), StageError> {
        let stage_error = |e: CatalogError| StageError::new(StageKind::Execution, e);
        let catalog = &ctx.catalog;

        let pending = Execution::pending_for(template);
        let id = catalog
            .track_execution(pending)
            .await
            .map_err(stage_error)?;
        catalog
            .update_execution_status(id, ExecutionStatus::Running, ExecutionUpdate::default())
            .await
            .map_err(stage_error)?;

        match self.engine.execute(template).await {
            Ok(run) => {
                let execution = catalog
                    .update_execution_status(
                        id,
                        ExecutionStatus::Completed,
                        ExecutionUpdate {
                            result_count: Some(run.rows.len() as u64),
                            performance_metrics: Some(run.metrics),
                            error: None,
                        },
                    )
                    .await
                    .map_err(stage_error)?;
                info!(
                    execution_id = %id,
                    job_id = %run.job_id,
                    rows = run.rows.len(),
                    "execution completed"
                );
                Ok((
                    ExecutionOutput {
                        execution,
                        rows: run.rows,
                    },
                    None,
                ))
            }
            Err(e) => {
                warn!(execution_id = %id, error = %e, "execution failed");
                let execution = catalog
                    .update_execution_status(
                        id,
                        ExecutionStatus::Failed,
                        ExecutionUpdate {
                            error: Some(e.to_string()),
                            ..ExecutionUpdate::default()
                        },
                    )
                    .await
                    .map_err(stage_error)?;
                Ok((
                    ExecutionOutput {
                        execution,
                        rows: Vec::new(),
                    },
                    Some(e),
                ))
            }
        }
    }
}

#[async_trait]
impl CapabilityUnit for ExecutionUnit {
    type Input = Vec<Template>;
    type Output = Vec<ExecutionOutput>;

    const STAGE: StageKind = StageKind::Execution;

    async fn execute_async(
        &self,
        templates: &Vec<Template>,
        ctx: &StageContext,
    ) -> Result<Vec<ExecutionOutput>, StageError> {
        let span = info_span!(
            "stage",
            run_id = %ctx.run_id,
            epoch_id = %ctx.epoch_id,
            stage = %Self::STAGE,
            templates = templates.len()
        );
        async {
            if templates.is_empty() {
                return Err(StageError::dependency(Self::STAGE, "at least one template"));
            }

            let results = join_all(templates.iter().map(|t| {
                let span = info_span!("template", template_id = %t.id, algorithm = %t.algorithm);
                self.run_one(t, ctx).instrument(span)
            }))
            .await;

            let mut outputs = Vec::with_capacity(results.len());
            let mut last_error = None;
            for result in results {
                let (output, error) = result?;
                if error.is_some() {
                    last_error = error;
                }
                outputs.push(output);
            }

            let completed = outputs.iter().filter(|o| o.is_completed()).count();
            if completed == 0 {
                if let Some(error) = last_error {
                    return Err(StageError::new(Self::STAGE, error));
                }
            }
            info!(completed, failed = outputs.len() - completed, "executions finished");
            Ok(outputs)
        }
        .instrument(span)
        .await
    }
}
