//! Stage names, run phases and the checkpoint record.
//!
//! A run moves through the phases in a fixed order:
//!
//! ```text
//! NotStarted → SchemaAndRequirements → UseCaseGeneration → TemplateGeneration
//!            → Execution → Reporting → Completed
//! ```
//!
//! `Failed { stage }` is reachable from any non-terminal phase. Only
//! `SchemaAndRequirements` runs two units at once.
//!
//! A [`Checkpoint`] names the phase that runs *next* together with every
//! output accumulated so far, so a resumed run starts exactly where the
//! previous attempt stopped.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::insights::AnalysisReport;
use crate::lineage::{Execution, ExecutionStatus, Requirement, Template, UseCase};
use crate::ports::ResultRow;
use crate::schema::{GraphSchema, RequirementsDocument, SchemaAnalysis};
use crate::{EpochId, PipelineRunId, Timestamp};

/// The six capability units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    SchemaAnalysis,
    RequirementsExtraction,
    UseCaseGeneration,
    TemplateGeneration,
    Execution,
    Reporting,
}

impl StageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StageKind::SchemaAnalysis => "schema_analysis",
            StageKind::RequirementsExtraction => "requirements_extraction",
            StageKind::UseCaseGeneration => "use_case_generation",
            StageKind::TemplateGeneration => "template_generation",
            StageKind::Execution => "execution",
            StageKind::Reporting => "reporting",
        }
    }
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RunPhase {
    NotStarted,
    SchemaAndRequirements,
    UseCaseGeneration,
    TemplateGeneration,
    Execution,
    Reporting,
    Completed,
    Failed { stage: StageKind },
}

impl RunPhase {
    /// The successor on the success path; `None` for terminal phases.
    pub fn next(self) -> Option<RunPhase> {
        match self {
            RunPhase::NotStarted => Some(RunPhase::SchemaAndRequirements),
            RunPhase::SchemaAndRequirements => Some(RunPhase::UseCaseGeneration),
            RunPhase::UseCaseGeneration => Some(RunPhase::TemplateGeneration),
            RunPhase::TemplateGeneration => Some(RunPhase::Execution),
            RunPhase::Execution => Some(RunPhase::Reporting),
            RunPhase::Reporting => Some(RunPhase::Completed),
            RunPhase::Completed | RunPhase::Failed { .. } => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed { .. })
    }

    /// Units that run during this phase.
    pub fn stages(self) -> &'static [StageKind] {
        match self {
            RunPhase::SchemaAndRequirements => {
                &[StageKind::SchemaAnalysis, StageKind::RequirementsExtraction]
            }
            RunPhase::UseCaseGeneration => &[StageKind::UseCaseGeneration],
            RunPhase::TemplateGeneration => &[StageKind::TemplateGeneration],
            RunPhase::Execution => &[StageKind::Execution],
            RunPhase::Reporting => &[StageKind::Reporting],
            RunPhase::NotStarted | RunPhase::Completed | RunPhase::Failed { .. } => &[],
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunPhase::NotStarted => f.write_str("not_started"),
            RunPhase::SchemaAndRequirements => f.write_str("schema_and_requirements"),
            RunPhase::UseCaseGeneration => f.write_str("use_case_generation"),
            RunPhase::TemplateGeneration => f.write_str("template_generation"),
            RunPhase::Execution => f.write_str("execution"),
            RunPhase::Reporting => f.write_str("reporting"),
            RunPhase::Completed => f.write_str("completed"),
            RunPhase::Failed { stage } => write!(f, "failed({stage})"),
        }
    }
}

/// An execution record together with the rows it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutput {
    pub execution: Execution,
    /// Empty unless the execution completed.
    #[serde(default)]
    pub rows: Vec<ResultRow>,
}

impl ExecutionOutput {
    pub fn is_completed(&self) -> bool {
        self.execution.status == ExecutionStatus::Completed
    }
}

/// What a run is asked to analyse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInputs {
    pub schema: GraphSchema,
    pub documents: Vec<RequirementsDocument>,
}

/// Persisted orchestrator state for one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub run_id: PipelineRunId,
    pub epoch_id: EpochId,
    /// The phase that runs next, or the terminal phase reached.
    pub phase: RunPhase,
    pub inputs: RunInputs,
    #[serde(default)]
    pub schema_analysis: Option<SchemaAnalysis>,
    #[serde(default)]
    pub requirement: Option<Requirement>,
    #[serde(default)]
    pub use_cases: Option<Vec<UseCase>>,
    #[serde(default)]
    pub templates: Option<Vec<Template>>,
    #[serde(default)]
    pub executions: Option<Vec<ExecutionOutput>>,
    #[serde(default)]
    pub reports: Option<Vec<AnalysisReport>>,
    pub updated_at: Timestamp,
}

impl Checkpoint {
    /// A fresh checkpoint with no outputs.
    pub fn new(run_id: PipelineRunId, epoch_id: EpochId, inputs: RunInputs) -> Self {
        Self {
            run_id,
            epoch_id,
            phase: RunPhase::NotStarted,
            inputs,
            schema_analysis: None,
            requirement: None,
            use_cases: None,
            templates: None,
            executions: None,
            reports: None,
            updated_at: Timestamp::now(),
        }
    }
}
