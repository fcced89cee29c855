//! Report generation: interpretation, extraction and validation per execution.
//!
//! For every completed execution:
//!
//! 1. Summarise the result rows.
//! 2. With `use_reasoning_chain`, ask for a preliminary reading of the
//!    statistics and feed it into the next prompt.
//! 3. Ask for tagged insights and run them through the extractor. When
//!    reasoning is disabled or exhausted, use the algorithm's heuristic
//!    strategy instead.
//! 4. Validate. The validator never returns an empty list for non-empty
//!    input, so every report carries at least one insight.

use async_trait::async_trait;
use futures::future::join_all;
use pipeline::insights::extract_insights;
use pipeline::insights::heuristics::ResultSummary;
use pipeline::{
    AnalysisReport, ExecutionOutput, Insight, InsightValidator, StageError, StageFailure,
    StageKind, Timestamp,
};
use tracing::{debug, info, info_span, warn, Instrument};

use crate::unit::{prompt_header, CapabilityUnit, StageContext};

/// Builds one [`AnalysisReport`] per completed execution.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportingUnit;

fn chain_prompt(output: &ExecutionOutput, summary: &ResultSummary) -> String {
    format!(
        "{}Algorithm: {}\nResult statistics: {}\n\nDescribe the notable statistical properties of \
         these results in a few sentences. Do not draw business conclusions yet.\n",
        prompt_header(StageKind::Reporting),
        output.execution.algorithm,
        summary.describe()
    )
}

fn insight_prompt(
    output: &ExecutionOutput,
    summary: &ResultSummary,
    preliminary: Option<&str>,
    max_insights: usize,
) -> String {
    let context = preliminary
        .map(|text| format!("\nPreliminary analysis:\n{}\n", text.trim()))
        .unwrap_or_default();
    format!(
        "{}Algorithm: {}\nResult statistics: {}\n{}\nReport up to {} business insights. For each, \
         write `Title:`, `Description:` (quote the figures), `Business Impact:` and \
         `Confidence:` (0-1) lines.\n",
        prompt_header(StageKind::Reporting),
        output.execution.algorithm,
        summary.describe(),
        context,
        max_insights
    )
}

/// Business impacts in insight order, without blanks or repeats.
fn recommendations(insights: &[Insight]) -> Vec<String> {
    let mut seen = Vec::<String>::new();
    for insight in insights {
        let impact = insight.business_impact.trim();
        if !impact.is_empty() && !seen.iter().any(|s| s == impact) {
            seen.push(impact.to_string());
        }
    }
    seen
}

impl ReportingUnit {
    async fn candidates(
        &self,
        output: &ExecutionOutput,
        summary: &ResultSummary,
        ctx: &StageContext,
    ) -> Vec<Insight> {
        let gateway = &ctx.gateway;
        if gateway.is_enabled() {
            let preliminary = if ctx.config.use_reasoning_chain {
                gateway
                    .reason(
                        Self::STAGE,
                        &chain_prompt(output, summary),
                        Self::REASONING_ATTEMPTS,
                    )
                    .await
            } else {
                None
            };
            let prompt = insight_prompt(
                output,
                summary,
                preliminary.as_deref(),
                ctx.config.max_insights_per_report,
            );
            if let Some(answer) = gateway
                .reason(Self::STAGE, &prompt, Self::REASONING_ATTEMPTS)
                .await
            {
                return extract_insights(&answer);
            }
        }
        debug!("using heuristic insights");
        output.execution.algorithm.heuristic_insights(summary)
    }

    async fn report(&self, output: &ExecutionOutput, ctx: &StageContext) -> AnalysisReport {
        let execution = &output.execution;
        let summary = ResultSummary::from_rows(&output.rows);
        let candidates = self.candidates(output, &summary, ctx).await;
        let outcome = InsightValidator::new(&ctx.config).validate(candidates);
        if outcome.exhausted {
            warn!(execution_id = %execution.id, "insight validation exhausted");
        }
        AnalysisReport {
            execution_id: execution.id,
            algorithm: execution.algorithm,
            title: format!("{} analysis of execution {}", execution.algorithm, execution.id),
            summary: format!(
                "{} returned {} rows: {}.",
                execution.algorithm,
                execution.result_count,
                summary.describe()
            ),
            recommendations: recommendations(&outcome.insights),
            insights: outcome.insights,
            validation_exhausted: outcome.exhausted,
            generated_at: Timestamp::now(),
        }
    }
}

#[async_trait]
impl CapabilityUnit for ReportingUnit {
    type Input = Vec<ExecutionOutput>;
    type Output = Vec<AnalysisReport>;

    const STAGE: StageKind = StageKind::Reporting;

    async fn execute_async(
        &self,
        outputs: &Vec<ExecutionOutput>,
        ctx: &StageContext,
    ) -> Result<Vec<AnalysisReport>, StageError> {
        let span = info_span!(
            "stage",
            run_id = %ctx.run_id,
            epoch_id = %ctx.epoch_id,
            stage = %Self::STAGE
        );
        async {
            let completed: Vec<&ExecutionOutput> =
                outputs.iter().filter(|o| o.is_completed()).collect();
            if completed.is_empty() {
                return Err(StageError::dependency(
                    Self::STAGE,
                    "at least one completed execution",
                ));
            }

            let reports = join_all(completed.into_iter().map(|output| {
                let span = info_span!("report", execution_id = %output.execution.id);
                self.report(output, ctx).instrument(span)
            }))
            .await;

            if let Some(empty) = reports.iter().find(|r| r.insights.is_empty()) {
                return Err(StageError::new(
                    Self::STAGE,
                    StageFailure::NoUsableOutput {
                        reason: format!("report for execution {} has no insights", empty.execution_id),
                    },
                ));
            }
            info!(
                reports = reports.len(),
                insights = reports.iter().map(|r| r.insights.len()).sum::<usize>(),
                "reports generated"
            );
            Ok(reports)
        }
        .instrument(span)
        .await
    }
}
