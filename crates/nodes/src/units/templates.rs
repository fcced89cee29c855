//! Template generation.
//!
//! Fully deterministic: defaults from the strategy table, tuned to the graph
//! size, with a runtime estimate, then checked by [`TemplateValidator`].
//! Templates that fail validation are logged and skipped.

use async_trait::async_trait;
use pipeline::algorithms::{estimate_runtime_seconds, optimize_parameters};
use pipeline::{
    GraphConfig, SchemaAnalysis, StageError, StageFailure, StageKind, Template, TemplateId,
    TemplateValidator, Timestamp, UseCase,
};
use tracing::{info, instrument, warn};

use crate::unit::{CapabilityUnit, StageContext};

/// What template generation depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateInput {
    pub analysis: SchemaAnalysis,
    pub use_cases: Vec<UseCase>,
}

/// Builds one engine job specification per use case.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateUnit {
    validator: TemplateValidator,
}

impl TemplateUnit {
    /// A unit whose validator treats warnings as errors when `strict`.
    pub fn new(strict: bool) -> Self {
        Self {
            validator: TemplateValidator::new(strict),
        }
    }

    fn draft(
        analysis: &SchemaAnalysis,
        use_case: &UseCase,
        ctx: &StageContext,
    ) -> Option<Template> {
        let requirement_id = *use_case.requirement_ids.first()?;
        let algorithm = use_case.algorithm;
        let size = Some(analysis.size);
        Some(Template {
            id: TemplateId::new_random(),
            epoch_id: ctx.epoch_id,
            use_case_id: use_case.id,
            requirement_id,
            name: format!("{}_{}", algorithm.name(), analysis.graph_name),
            description: format!("{} for use case '{}'", algorithm, use_case.title),
            algorithm,
            parameters: optimize_parameters(algorithm, algorithm.default_parameters(), size),
            graph_config: GraphConfig {
                graph_name: analysis.graph_name.clone(),
                vertex_collections: analysis.key_entities.clone(),
                edge_collections: analysis.key_relationships.clone(),
                engine_size: analysis.recommended_engine_size,
                store_results: false,
                result_collection: None,
            },
            estimated_runtime_seconds: estimate_runtime_seconds(algorithm, size),
            created_at: Timestamp::now(),
        })
    }
}

#[async_trait]
impl CapabilityUnit for TemplateUnit {
    type Input = TemplateInput;
    type Output = Vec<Template>;

    const STAGE: StageKind = StageKind::TemplateGeneration;

    #[instrument(skip_all, fields(run_id = %ctx.run_id, epoch_id = %ctx.epoch_id, stage = %Self::STAGE))]
    async fn execute_async(
        &self,
        input: &TemplateInput,
        ctx: &StageContext,
    ) -> Result<Vec<Template>, StageError> {
        if input.use_cases.is_empty() {
            return Err(StageError::dependency(Self::STAGE, "at least one use case"));
        }

        let mut templates = Vec::with_capacity(input.use_cases.len());
        for use_case in &input.use_cases {
            let Some(template) = Self::draft(&input.analysis, use_case, ctx) else {
                return Err(StageError::dependency(
                    Self::STAGE,
                    format!("requirement of use case {}", use_case.id),
                ));
            };
            let report = self.validator.validate(&template);
            for issue in report.warnings() {
                warn!(template = %template.name, %issue, "template warning");
            }
            if !report.is_valid() {
                let errors: Vec<String> = report.errors().map(ToString::to_string).collect();
                warn!(
                    template = %template.name,
                    use_case_id = %use_case.id,
                    errors = %errors.join("; "),
                    "skipping invalid template"
                );
                continue;
            }
            ctx.catalog
                .track_template(template.clone())
                .await
                .map_err(|e| StageError::new(Self::STAGE, e))?;
            templates.push(template);
        }

        if templates.is_empty() {
            return Err(StageError::new(
                Self::STAGE,
                StageFailure::NoUsableOutput {
                    reason: format!("all {} templates failed validation", input.use_cases.len()),
                },
            ));
        }
        info!(templates = templates.len(), "templates generated");
        Ok(templates)
    }
}
