//! The TOML configuration file.
//!
//! ```toml
//! [reporting]
//! min_confidence = 0.6
//!
//! [llm]                      # omit to run on heuristics only
//! provider = "anthropic"
//! model = "<model id>"
//! api_key_env = "ANTHROPIC_API_KEY"
//!
//! [engine]
//! base_url = "http://localhost:8529"
//!
//! [run]
//! epoch = "monthly"          # or a literal epoch name
//! schema = "schema.json"
//! requirements = ["brief.md"]
//!
//! [telemetry]
//! otlp_endpoint = "http://localhost:4317"
//! ```
//!
//! Relative paths are resolved against the directory holding the file.

use std::path::{Path, PathBuf};

use analytics_engine::EngineConfig;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use llm::LlmConfig;
use pipeline::ReportingConfig;
use serde::Deserialize;

/// Epoch value that selects one epoch per calendar month.
pub const MONTHLY: &str = "monthly";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    #[serde(default)]
    pub reporting: ReportingConfig,
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub engine: EngineConfig,
    pub run: RunConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// What to analyse and where state lives.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// `"monthly"` or an epoch name.
    #[serde(default = "default_epoch")]
    pub epoch: String,
    #[serde(default)]
    pub epoch_description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    /// JSON graph schema export.
    pub schema: PathBuf,
    /// Requirements documents, read as text.
    pub requirements: Vec<PathBuf>,
    /// Holds `catalog.json` and the `runs/` checkpoint directory.
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default)]
    pub strict_templates: bool,
}

fn default_epoch() -> String {
    MONTHLY.into()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from(".insightflow")
}

impl RunConfig {
    /// The epoch name for a run started on `today`.
    pub fn epoch_name(&self, today: NaiveDate) -> String {
        if self.epoch.eq_ignore_ascii_case(MONTHLY) {
            today.format("%Y-%m").to_string()
        } else {
            self.epoch.trim().to_string()
        }
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.state_dir.join("catalog.json")
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.state_dir.join("runs")
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetryConfig {
    /// OTLP gRPC endpoint. Spans are only exported when set.
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: "insightflow".into(),
        }
    }
}

impl CliConfig {
    /// Reads and validates `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&text, base).with_context(|| format!("loading config {}", path.display()))
    }

    /// Parses `text`, resolving relative paths against `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self> {
        let mut config: CliConfig = toml::from_str(text)?;
        config.reporting = config.reporting.validated()?;
        if let Some(llm) = &config.llm {
            llm.validate()?;
        }
        if config.run.epoch.trim().is_empty() {
            anyhow::bail!("[run].epoch must not be blank");
        }
        if config.run.requirements.is_empty() {
            anyhow::bail!("[run].requirements must name at least one document");
        }

        let run = &mut config.run;
        run.schema = base.join(&run.schema);
        run.state_dir = base.join(&run.state_dir);
        for doc in &mut run.requirements {
            *doc = base.join(&*doc);
        }
        Ok(config)
    }
}
