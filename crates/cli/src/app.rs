//! Wires configuration into a catalog, a reasoning gateway, an engine client
//! and a [`PipelineExecutor`].

use std::path::Path;
use std::sync::Arc;

use analytics_engine::HttpAnalyticsEngine;
use anyhow::{Context, Result};
use catalog::{CatalogStatistics, JsonFileBackend, LineageCatalog};
use nodes::{JsonFileCheckpointStore, PipelineExecutor, ReasoningGateway, RunOutcome};
use pipeline::{
    AnalyticsEngine, ExecutionId, ExecutionLineage, GraphSchema, PipelineRunId,
    RequirementsDocument, RunInputs,
};
use tracing::info;

use crate::config::{CliConfig, RunConfig};

/// Reads a variable the configuration names.
fn secret(var: &str) -> Result<String> {
    std::env::var(var).with_context(|| format!("environment variable {var} is not set"))
}

pub fn reasoning_gateway(config: &CliConfig) -> Result<ReasoningGateway> {
    let Some(llm) = &config.llm else {
        info!("no [llm] section; running on heuristics only");
        return Ok(ReasoningGateway::disabled());
    };
    if !config.reporting.use_llm_interpretation {
        return Ok(ReasoningGateway::disabled());
    }
    let provider = llm::provider_from_config(llm, secret(&llm.api_key_env)?)?;
    info!(provider = provider.name(), model = %llm.model, "reasoning enabled");
    Ok(ReasoningGateway::new(provider, &config.reporting))
}

fn engine(config: &CliConfig) -> Result<Arc<dyn AnalyticsEngine>> {
    let token = config
        .engine
        .api_token_env
        .as_deref()
        .map(secret)
        .transpose()?;
    Ok(Arc::new(HttpAnalyticsEngine::new(config.engine.clone(), token)?))
}

/// Loads the schema export and the requirements documents.
pub fn read_inputs(run: &RunConfig) -> Result<RunInputs> {
    let schema_text = std::fs::read_to_string(&run.schema)
        .with_context(|| format!("reading schema {}", run.schema.display()))?;
    let schema: GraphSchema = serde_json::from_str(&schema_text)
        .with_context(|| format!("parsing schema {}", run.schema.display()))?;
    let documents = run
        .requirements
        .iter()
        .map(|path| read_document(path))
        .collect::<Result<Vec<_>>>()?;
    Ok(RunInputs { schema, documents })
}

fn read_document(path: &Path) -> Result<RequirementsDocument> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading requirements {}", path.display()))?;
    Ok(RequirementsDocument {
        source: path.display().to_string(),
        text,
    })
}

pub struct App {
    config: CliConfig,
    catalog: Arc<LineageCatalog>,
}

impl App {
    /// Opens the catalog snapshot under `[run].state_dir`.
    pub async fn open(config: CliConfig) -> Result<Self> {
        let path = config.run.catalog_path();
        let backend = JsonFileBackend::open(&path)
            .await
            .with_context(|| format!("opening catalog {}", path.display()))?;
        Ok(Self {
            catalog: Arc::new(LineageCatalog::new(Arc::new(backend))),
            config,
        })
    }

    fn executor(&self) -> Result<PipelineExecutor> {
        let checkpoints = JsonFileCheckpointStore::new(self.config.run.checkpoint_dir());
        Ok(PipelineExecutor::new(
            self.config.reporting.clone(),
            reasoning_gateway(&self.config)?,
            Arc::clone(&self.catalog),
            engine(&self.config)?,
            Arc::new(checkpoints),
        )
        .with_strict_templates(self.config.run.strict_templates))
    }

    /// Starts a run in the configured epoch, creating the epoch if needed.
    pub async fn run(&self) -> Result<RunOutcome> {
        let inputs = read_inputs(&self.config.run)?;
        let run = &self.config.run;
        let name = run.epoch_name(chrono::Utc::now().date_naive());
        let epoch = self
            .catalog
            .ensure_epoch(&name, &run.epoch_description, run.tags.clone())
            .await?;
        info!(epoch = %name, epoch_id = %epoch.id, "using epoch");
        Ok(self.executor()?.run(epoch.id, inputs).await?)
    }

    pub async fn resume(&self, run_id: PipelineRunId) -> Result<RunOutcome> {
        Ok(self.executor()?.resume(run_id).await?)
    }

    pub async fn statistics(&self) -> Result<CatalogStatistics> {
        Ok(self.catalog.statistics().await?)
    }

    pub async fn lineage(&self, id: ExecutionId) -> Result<ExecutionLineage> {
        Ok(self.catalog.execution_lineage(id).await?)
    }
}
