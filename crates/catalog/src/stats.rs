//! Result shapes of catalog queries.

use std::collections::BTreeMap;

use pipeline::{
    AlgorithmKind, EdgeSet, EntityKind, EntityRef, EpochId, EpochStatus, Execution,
    ExecutionStatus, Timestamp,
};
use serde::{Deserialize, Serialize};

/// Entities reachable downstream of a starting entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactReport {
    pub root: EntityRef,
    /// Affected entities per kind. Kinds with no affected entity are absent.
    pub affected: BTreeMap<EntityKind, usize>,
    /// Affected entities in breadth-first order, each listed once.
    pub entities: Vec<EntityRef>,
}

impl ImpactReport {
    pub fn total(&self) -> usize {
        self.entities.len()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.affected.get(&kind).copied().unwrap_or(0)
    }
}

/// Execution outcome totals.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub completed: usize,
    pub failed: usize,
    /// `completed / (completed + failed)`; zero when nothing finished.
    pub success_rate: f64,
    /// Mean execution time of completed executions, in seconds.
    pub average_execution_seconds: f64,
    pub total_results: u64,
}

impl ExecutionSummary {
    pub fn from_executions<'a>(executions: impl IntoIterator<Item = &'a Execution>) -> Self {
        let mut summary = ExecutionSummary::default();
        let mut completed_seconds = 0.0;
        for execution in executions {
            summary.total += 1;
            summary.total_results += execution.result_count;
            match execution.status {
                ExecutionStatus::Pending => summary.pending += 1,
                ExecutionStatus::Running => summary.running += 1,
                ExecutionStatus::Completed => {
                    summary.completed += 1;
                    completed_seconds += execution.performance_metrics.execution_time_seconds;
                }
                ExecutionStatus::Failed => summary.failed += 1,
            }
        }
        let finished = summary.completed + summary.failed;
        if finished > 0 {
            summary.success_rate = summary.completed as f64 / finished as f64;
        }
        if summary.completed > 0 {
            summary.average_execution_seconds = completed_seconds / summary.completed as f64;
        }
        summary
    }
}

/// Aggregates for one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochStatistics {
    pub epoch_id: EpochId,
    pub name: String,
    pub status: EpochStatus,
    pub entity_counts: BTreeMap<EntityKind, usize>,
    /// Earliest member creation time.
    pub first_activity: Option<Timestamp>,
    /// Latest member creation or execution update time.
    pub last_activity: Option<Timestamp>,
    /// Sum of execution times of the epoch's executions, in seconds.
    pub total_execution_seconds: f64,
}

/// Catalog-wide aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStatistics {
    pub entity_counts: BTreeMap<EntityKind, usize>,
    pub edge_counts: BTreeMap<EdgeSet, usize>,
    pub executions: ExecutionSummary,
    /// Executions per algorithm.
    pub algorithms: BTreeMap<AlgorithmKind, usize>,
    pub epochs: Vec<EpochStatistics>,
}
