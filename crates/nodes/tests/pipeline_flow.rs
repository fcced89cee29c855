//! End-to-end runs of the pipeline executor against scripted collaborators.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use catalog::{CatalogBackend, LineageCatalog, MemoryBackend};
use nodes::{MemoryCheckpointStore, PipelineExecutor, ReasoningGateway};
use pipeline::{
    AnalyticsEngine, CheckpointStore, CollectionName, CollectionSchema, Direction, EdgeSet,
    EngineError, EngineRun, EntityKind, EntityRef, Epoch, EpochId, ExecutionStatus, GraphName, GraphSchema, InsightOrigin,
    PerformanceMetrics, PipelineError, ProviderError, ReasoningProvider, ReportingConfig,
    RequirementsDocument, ResultRow, RunInputs, RunPhase, StageKind, Template,
};

const BRIEF: &str = "Identify the most influential customers.\n- Group customers into communities";
const SINGLE_OBJECTIVE: &str = "Identify the most influential customers.";

const INSIGHTS: &str = "Title: Three customers dominate purchase influence\n\
    Description: The top 3 customers hold 62.5% of the total PageRank score across 40 scored \
    customers, far above the median score of 1.5 for the rest.\n\
    Business Impact: Prioritise these accounts in the loyalty programme\n\
    Confidence: 85";

// ---------------------------------------------------------------------------
// Test doubles
// ---------------------------------------------------------------------------

/// Answers by the stage named on the first prompt line and logs start/end.
/// One stage may be made to wait before answering.
struct ScriptedProvider {
    slow: Option<(StageKind, Duration)>,
    log: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    fn new() -> Self {
        Self {
            slow: None,
            log: Mutex::new(Vec::new()),
        }
    }

    fn slow(stage: StageKind, delay: Duration) -> Self {
        Self {
            slow: Some((stage, delay)),
            ..Self::new()
        }
    }

    fn logged(&self, entry: &str) -> bool {
        self.log.lock().unwrap().iter().any(|e| e == entry)
    }

    fn position(&self, entry: &str) -> usize {
        let log = self.log.lock().unwrap();
        log.iter()
            .position(|e| e == entry)
            .unwrap_or_else(|| panic!("{entry} not in {log:?}"))
    }
}

#[async_trait]
impl ReasoningProvider for ScriptedProvider {
    async fn complete(&self, prompt: &str, _timeout: Duration) -> Result<String, ProviderError> {
        let stage = prompt
            .lines()
            .next()
            .unwrap_or_default()
            .trim_start_matches("Stage: ")
            .to_string();
        self.log.lock().unwrap().push(format!("start {stage}"));
        if let Some((slow, delay)) = self.slow {
            if stage == slow.as_str() {
                tokio::time::sleep(delay).await;
            }
        }
        let reply = match stage.as_str() {
            "schema_analysis" => "A retail graph of customers and stores linked by purchases.",
            "requirements_extraction" => {
                "Domain: retail\nSummary: Find influential customers.\n\
                 Objective: Find influential customers | high | Rank customers by purchase influence"
            }
            "use_case_generation" => {
                "Use Case: Influential customers | PageRank | Target loyalty campaigns"
            }
            _ => INSIGHTS,
        };
        self.log.lock().unwrap().push(format!("end {stage}"));
        Ok(reply.to_string())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

struct HangingProvider;

#[async_trait]
impl ReasoningProvider for HangingProvider {
    async fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, ProviderError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok("too late".into())
    }

    fn name(&self) -> &str {
        "hanging"
    }
}

struct CountingProvider {
    calls: AtomicU32,
}

#[async_trait]
impl ReasoningProvider for CountingProvider {
    async fn complete(&self, _prompt: &str, _timeout: Duration) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(INSIGHTS.into())
    }

    fn name(&self) -> &str {
        "counting"
    }
}

/// Fails with the queued errors first, then succeeds.
struct ScriptedEngine {
    failures: Mutex<VecDeque<EngineError>>,
    always: Option<EngineError>,
    calls: AtomicU32,
}

impl ScriptedEngine {
    fn healthy() -> Self {
        Self::failing_first(Vec::new())
    }

    fn failing_first(failures: Vec<EngineError>) -> Self {
        Self {
            failures: Mutex::new(failures.into()),
            always: None,
            calls: AtomicU32::new(0),
        }
    }

    fn always(error: EngineError) -> Self {
        Self {
            always: Some(error),
            ..Self::healthy()
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

fn rows() -> Vec<ResultRow> {
    (0..40)
        .map(|i| {
            let score = if i < 3 { 50.0 } else { f64::from(i % 4) + 0.5 };
            ResultRow::new(format!("customers/{i}"), score)
        })
        .collect()
}

#[async_trait]
impl AnalyticsEngine for ScriptedEngine {
    async fn execute(&self, template: &Template) -> Result<EngineRun, EngineError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.always {
            return Err(error.clone());
        }
        if let Some(error) = self.failures.lock().unwrap().pop_front() {
            return Err(error);
        }
        Ok(EngineRun {
            job_id: format!("{}-{n}", template.algorithm),
            rows: rows(),
            metrics: PerformanceMetrics {
                execution_time_seconds: 1.5,
                ..PerformanceMetrics::default()
            },
        })
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn collection(name: &str, count: u64) -> CollectionSchema {
    CollectionSchema {
        name: CollectionName::new(name).unwrap(),
        document_count: count,
        attributes: vec!["name".into()],
    }
}

fn inputs(text: &str) -> RunInputs {
    RunInputs {
        schema: GraphSchema {
            database_name: "retail".into(),
            graph_name: GraphName::new("customer_graph").unwrap(),
            vertex_collections: vec![collection("customers", 1_000), collection("stores", 50)],
            edge_collections: vec![collection("purchases", 5_000)],
        },
        documents: vec![RequirementsDocument {
            source: "brief.md".into(),
            text: text.into(),
        }],
    }
}

struct Harness {
    backend: Arc<MemoryBackend>,
    catalog: Arc<LineageCatalog>,
    checkpoints: Arc<MemoryCheckpointStore>,
    epoch_id: EpochId,
}

impl Harness {
    async fn new() -> Self {
        let backend = Arc::new(MemoryBackend::new());
        let catalog = Arc::new(LineageCatalog::new(backend.clone()));
        let epoch_id = catalog
            .create_epoch(Epoch::new("2026-10", "integration", Vec::new()))
            .await
            .unwrap();
        Self {
            backend,
            catalog,
            checkpoints: Arc::new(MemoryCheckpointStore::new()),
            epoch_id,
        }
    }

    fn executor(&self, gateway: ReasoningGateway, engine: Arc<ScriptedEngine>) -> PipelineExecutor {
        PipelineExecutor::new(
            ReportingConfig::default(),
            gateway,
            Arc::clone(&self.catalog),
            engine,
            self.checkpoints.clone(),
        )
    }

    async fn count(&self, kind: EntityKind) -> usize {
        self.catalog
            .query_by_epoch(self.epoch_id, &[kind])
            .await
            .unwrap()
            .len()
    }
}

fn config_with_timeout(seconds: u64) -> ReportingConfig {
    ReportingConfig {
        llm_timeout_seconds: seconds,
        ..ReportingConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn heuristic_run_produces_reports_and_full_lineage() {
    let harness = Harness::new().await;
    let engine = Arc::new(ScriptedEngine::healthy());
    let executor = harness.executor(ReasoningGateway::disabled(), engine.clone());

    let outcome = executor.run(harness.epoch_id, inputs(BRIEF)).await.unwrap();

    assert_eq!(outcome.executions.len(), 2);
    assert_eq!(outcome.reports.len(), 2);
    assert!(outcome.reports.iter().all(|r| !r.insights.is_empty()));
    assert!(outcome
        .reports
        .iter()
        .flat_map(|r| &r.insights)
        .all(|i| i.origin == InsightOrigin::Heuristic));
    assert_eq!(engine.calls(), 2);

    assert_eq!(harness.count(EntityKind::Requirement).await, 1);
    assert_eq!(harness.count(EntityKind::UseCase).await, 2);
    assert_eq!(harness.count(EntityKind::Template).await, 2);
    assert_eq!(harness.count(EntityKind::Execution).await, 2);
    for output in &outcome.executions {
        assert_eq!(output.execution.status, ExecutionStatus::Completed);
        assert_eq!(output.execution.result_count, 40);
        let lineage = harness
            .catalog
            .execution_lineage(output.execution.id)
            .await
            .unwrap();
        assert!(lineage.is_complete());
    }
    assert_eq!(
        executor.phase(outcome.run_id).await.unwrap(),
        RunPhase::Completed
    );
}

#[tokio::test]
async fn every_tracked_entity_is_contained_and_acyclic() {
    let harness = Harness::new().await;
    let executor = harness.executor(
        ReasoningGateway::disabled(),
        Arc::new(ScriptedEngine::healthy()),
    );
    executor.run(harness.epoch_id, inputs(BRIEF)).await.unwrap();

    let containment = harness
        .backend
        .edges(EdgeSet::EpochContainment)
        .await
        .unwrap();
    let mut members = 0;
    for kind in EntityKind::ALL {
        for entity in harness.backend.list(kind).await.unwrap() {
            let me = entity.entity_ref();
            let Some(epoch_id) = entity.epoch_id() else {
                continue;
            };
            members += 1;
            assert!(
                containment
                    .iter()
                    .any(|e| e.from == EntityRef::from(epoch_id) && e.to == me),
                "{me} has no containment edge"
            );
            let downstream = harness
                .catalog
                .traverse_lineage(me, Direction::Forward, usize::MAX)
                .await
                .unwrap();
            assert!(
                downstream.iter().all(|e| e.entity_ref() != me),
                "{me} reaches itself"
            );
        }
    }
    // One requirement, two use cases, two templates, two executions.
    assert_eq!(members, 7);
    assert_eq!(containment.len(), members);
}

/// Runs one objective with `provider` and checks both first-phase stages
/// finished before use-case generation asked for anything.
async fn assert_fan_out_barrier(provider: Arc<ScriptedProvider>) {
    let harness = Harness::new().await;
    let gateway = ReasoningGateway::new(provider.clone(), &ReportingConfig::default());
    let executor = harness.executor(gateway, Arc::new(ScriptedEngine::healthy()));

    let outcome = executor
        .run(harness.epoch_id, inputs(SINGLE_OBJECTIVE))
        .await
        .unwrap();

    let use_cases = provider.position("start use_case_generation");
    assert!(provider.position("end schema_analysis") < use_cases);
    assert!(provider.position("end requirements_extraction") < use_cases);

    let report = &outcome.reports[0];
    assert_eq!(report.insights.len(), 1);
    assert_eq!(report.insights[0].origin, InsightOrigin::Structured);
    assert_eq!(
        report.insights[0].title,
        "Three customers dominate purchase influence"
    );
    assert!((report.insights[0].confidence.as_f64() - 0.85).abs() < 1e-9);
    assert_eq!(
        report.recommendations,
        vec!["Prioritise these accounts in the loyalty programme"]
    );
}

#[tokio::test(start_paused = true)]
async fn barrier_holds_when_schema_analysis_finishes_last() {
    let provider = Arc::new(ScriptedProvider::slow(
        StageKind::SchemaAnalysis,
        Duration::from_millis(50),
    ));
    assert_fan_out_barrier(provider.clone()).await;

    // Requirements extraction started while schema analysis was still waiting.
    assert!(
        provider.position("start requirements_extraction")
            < provider.position("end schema_analysis")
    );
    assert!(
        provider.position("end requirements_extraction")
            < provider.position("end schema_analysis")
    );
}

#[tokio::test(start_paused = true)]
async fn barrier_holds_when_requirements_finish_last() {
    let provider = Arc::new(ScriptedProvider::slow(
        StageKind::RequirementsExtraction,
        Duration::from_millis(50),
    ));
    assert_fan_out_barrier(provider.clone()).await;

    assert!(
        provider.position("end schema_analysis")
            < provider.position("end requirements_extraction")
    );
}

#[tokio::test(start_paused = true)]
async fn fatal_failure_cancels_the_waiting_sibling() {
    let harness = Harness::new().await;
    let provider = Arc::new(ScriptedProvider::slow(
        StageKind::SchemaAnalysis,
        Duration::from_millis(50),
    ));
    let gateway = ReasoningGateway::new(provider.clone(), &ReportingConfig::default());
    let executor = harness.executor(gateway, Arc::new(ScriptedEngine::healthy()));

    let error = executor
        .run(harness.epoch_id, inputs("   "))
        .await
        .unwrap_err();
    let run_id = match error {
        PipelineError::StageFailed {
            run_id,
            stage: StageKind::RequirementsExtraction,
            ..
        } => run_id,
        other => panic!("expected requirements extraction to fail, got {other:?}"),
    };

    // Give a detached schema analysis every chance to finish.
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(provider.logged("start schema_analysis"));
    assert!(!provider.logged("end schema_analysis"));
    assert_eq!(harness.count(EntityKind::Requirement).await, 0);

    let checkpoint = harness.checkpoints.load(run_id).await.unwrap();
    assert!(checkpoint.schema_analysis.is_none());
    assert_eq!(
        checkpoint.phase,
        RunPhase::Failed {
            stage: StageKind::RequirementsExtraction
        }
    );
}

#[tokio::test(start_paused = true)]
async fn hung_reasoning_falls_back_to_heuristics() {
    let harness = Harness::new().await;
    let gateway = ReasoningGateway::new(Arc::new(HangingProvider), &config_with_timeout(1));
    let executor = harness.executor(gateway, Arc::new(ScriptedEngine::healthy()));

    let outcome = executor.run(harness.epoch_id, inputs(BRIEF)).await.unwrap();

    assert_eq!(outcome.reports.len(), 2);
    assert!(outcome
        .reports
        .iter()
        .flat_map(|r| &r.insights)
        .all(|i| i.origin == InsightOrigin::Heuristic));
    // schema, requirements, use cases, two reports; two attempts each.
    let stats = executor.reasoning_stats();
    assert_eq!(stats.fallbacks, 5);
    assert_eq!(stats.calls, 10);
}

#[tokio::test]
async fn disabled_interpretation_never_calls_the_provider() {
    let harness = Harness::new().await;
    let provider = Arc::new(CountingProvider {
        calls: AtomicU32::new(0),
    });
    let config = ReportingConfig {
        use_llm_interpretation: false,
        ..ReportingConfig::default()
    };
    let gateway = ReasoningGateway::new(provider.clone(), &config);
    let executor = harness.executor(gateway, Arc::new(ScriptedEngine::healthy()));

    let outcome = executor.run(harness.epoch_id, inputs(BRIEF)).await.unwrap();

    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    assert_eq!(outcome.reports.len(), 2);
}

#[tokio::test]
async fn recoverable_engine_failure_is_retried_once() {
    let harness = Harness::new().await;
    let engine = Arc::new(ScriptedEngine::failing_first(vec![EngineError::Unavailable {
        message: "connection refused".into(),
    }]));
    let executor = harness.executor(ReasoningGateway::disabled(), engine.clone());

    let outcome = executor
        .run(harness.epoch_id, inputs(SINGLE_OBJECTIVE))
        .await
        .unwrap();

    assert_eq!(engine.calls(), 2);
    assert_eq!(outcome.executions.len(), 1);
    let summary = harness
        .catalog
        .execution_summary(Some(harness.epoch_id))
        .await
        .unwrap();
    assert_eq!(summary.total, 2);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
async fn persistent_engine_failure_fails_the_run_after_one_retry() {
    let harness = Harness::new().await;
    let engine = Arc::new(ScriptedEngine::always(EngineError::Unavailable {
        message: "down".into(),
    }));
    let executor = harness.executor(ReasoningGateway::disabled(), engine.clone());

    let error = executor
        .run(harness.epoch_id, inputs(SINGLE_OBJECTIVE))
        .await
        .unwrap_err();

    let (run_id, stage) = match error {
        PipelineError::StageFailed { run_id, stage, .. } => (run_id, stage),
        other => panic!("expected a stage failure, got {other:?}"),
    };
    assert_eq!(stage, StageKind::Execution);
    assert_eq!(engine.calls(), 2);
    assert_eq!(
        harness.checkpoints.load(run_id).await.unwrap().phase,
        RunPhase::Failed {
            stage: StageKind::Execution
        }
    );
}

#[tokio::test]
async fn rejected_job_is_not_retried_and_leaves_partial_lineage() {
    let harness = Harness::new().await;
    let engine = Arc::new(ScriptedEngine::always(EngineError::Rejected {
        status: 400,
        message: "unknown graph".into(),
    }));
    let executor = harness.executor(ReasoningGateway::disabled(), engine.clone());

    let error = executor
        .run(harness.epoch_id, inputs(SINGLE_OBJECTIVE))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        PipelineError::StageFailed {
            stage: StageKind::Execution,
            ..
        }
    ));
    assert_eq!(engine.calls(), 1);
    assert_eq!(harness.count(EntityKind::Requirement).await, 1);
    assert_eq!(harness.count(EntityKind::UseCase).await, 1);
    assert_eq!(harness.count(EntityKind::Template).await, 1);
    let summary = harness
        .catalog
        .execution_summary(Some(harness.epoch_id))
        .await
        .unwrap();
    assert_eq!((summary.total, summary.failed), (1, 1));
}

#[tokio::test]
async fn missing_requirements_fail_without_retry() {
    let harness = Harness::new().await;
    let executor = harness.executor(
        ReasoningGateway::disabled(),
        Arc::new(ScriptedEngine::healthy()),
    );

    let error = executor
        .run(harness.epoch_id, inputs("   "))
        .await
        .unwrap_err();

    assert!(matches!(
        error,
        PipelineError::StageFailed {
            stage: StageKind::RequirementsExtraction,
            ..
        }
    ));
    assert_eq!(harness.count(EntityKind::Requirement).await, 0);
}

#[tokio::test]
async fn unknown_epoch_is_rejected_before_any_stage() {
    let harness = Harness::new().await;
    let executor = harness.executor(
        ReasoningGateway::disabled(),
        Arc::new(ScriptedEngine::healthy()),
    );

    let error = executor
        .run(EpochId::new_random(), inputs(BRIEF))
        .await
        .unwrap_err();

    assert!(matches!(error, PipelineError::Catalog(_)));
}

#[tokio::test]
async fn failed_run_resumes_from_the_failed_phase() {
    let harness = Harness::new().await;
    let broken = harness.executor(
        ReasoningGateway::disabled(),
        Arc::new(ScriptedEngine::always(EngineError::Rejected {
            status: 422,
            message: "engine misconfigured".into(),
        })),
    );
    let run_id = match broken
        .run(harness.epoch_id, inputs(SINGLE_OBJECTIVE))
        .await
        .unwrap_err()
    {
        PipelineError::StageFailed { run_id, .. } => run_id,
        other => panic!("expected a stage failure, got {other:?}"),
    };

    let engine = Arc::new(ScriptedEngine::healthy());
    let fixed = harness.executor(ReasoningGateway::disabled(), engine.clone());
    let outcome = fixed.resume(run_id).await.unwrap();

    assert_eq!(outcome.run_id, run_id);
    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(engine.calls(), 1);
    // Earlier phases were not re-run.
    assert_eq!(harness.count(EntityKind::Requirement).await, 1);
    assert_eq!(harness.count(EntityKind::Template).await, 1);
    assert_eq!(harness.count(EntityKind::Execution).await, 2);

    assert!(matches!(
        fixed.resume(run_id).await,
        Err(PipelineError::AlreadyFinished { .. })
    ));
}
