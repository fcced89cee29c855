//! JSON bodies exchanged with the engine.

use pipeline::{
    AlgorithmKind, AlgorithmParameters, GraphConfig, PerformanceMetrics, ResultRow, Template,
};
use serde::{Deserialize, Serialize};

/// Body of `POST /v1/jobs`.
#[derive(Debug, Serialize)]
pub struct JobRequest<'a> {
    pub name: &'a str,
    pub algorithm: AlgorithmKind,
    pub params: &'a AlgorithmParameters,
    #[serde(flatten)]
    pub graph: &'a GraphConfig,
}

impl<'a> From<&'a Template> for JobRequest<'a> {
    fn from(template: &'a Template) -> Self {
        Self {
            name: &template.name,
            algorithm: template.algorithm,
            params: &template.parameters,
            graph: &template.graph_config,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Submitted {
    pub id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Engine-reported resource usage. Missing fields are left unset.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct JobMetrics {
    pub execution_time_seconds: Option<f64>,
    pub memory_usage_mb: Option<f64>,
    pub vertex_count: Option<u64>,
    pub edge_count: Option<u64>,
}

impl JobMetrics {
    /// Engine metrics, falling back to `measured_seconds` for the runtime.
    pub fn into_performance(self, measured_seconds: f64) -> PerformanceMetrics {
        PerformanceMetrics {
            execution_time_seconds: self.execution_time_seconds.unwrap_or(measured_seconds),
            memory_usage_mb: self.memory_usage_mb,
            vertex_count: self.vertex_count,
            edge_count: self.edge_count,
        }
    }
}

/// Body of `GET /v1/jobs/{id}`.
#[derive(Debug, Deserialize)]
pub struct JobStatus {
    pub id: String,
    pub status: JobState,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub rows: Vec<ResultRow>,
    #[serde(default)]
    pub metrics: JobMetrics,
}
