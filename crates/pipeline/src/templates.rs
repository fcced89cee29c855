//! Template validation.
//!
//! Errors make a template unusable; warnings are reported but do not block
//! execution. A strict validator promotes every warning to an error.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::algorithms::AlgorithmKind;
use crate::lineage::Template;
use crate::CollectionName;

const MAX_NAME_CHARS: usize = 200;
const MAX_RUNTIME_SECONDS: f64 = 3600.0;
const MAX_ITERATIONS_WARNING: i64 = 500;
const PAGERANK_THRESHOLD_WARNING: f64 = 0.1;
const LOUVAIN_RESOLUTION_WARNING: f64 = 5.0;
const PATH_DIRECTIONS: &[&str] = &["inbound", "outbound", "any"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// One finding against one template field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Dotted field path, e.g. `"parameters.damping_factor"`.
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{level}: {}: {}", self.field, self.message)
    }
}

/// All findings for one template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplateReport {
    pub issues: Vec<ValidationIssue>,
}

impl TemplateReport {
    /// `true` when no issue is an error.
    pub fn is_valid(&self) -> bool {
        !self.issues.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.issues.iter().filter(|i| i.severity == Severity::Warning)
    }
}

/// Checks templates before they are submitted to the engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateValidator {
    strict: bool,
}

impl TemplateValidator {
    pub fn new(strict: bool) -> Self {
        Self { strict }
    }

    pub fn validate(&self, template: &Template) -> TemplateReport {
        let mut issues = Issues {
            strict: self.strict,
            found: Vec::new(),
        };

        let name_chars = template.name.trim().chars().count();
        if name_chars == 0 {
            issues.error("name", "template name is required");
        } else if name_chars > MAX_NAME_CHARS {
            issues.warning(
                "name",
                format!("template name is {name_chars} characters; keep it under {MAX_NAME_CHARS}"),
            );
        }

        check_graph_config(template, &mut issues);
        check_parameters(template.algorithm, template, &mut issues);

        if let Some(runtime) = template.estimated_runtime_seconds {
            if !runtime.is_finite() || runtime < 0.0 {
                issues.error(
                    "estimated_runtime_seconds",
                    format!("runtime estimate must be non-negative, got {runtime}"),
                );
            } else if runtime > MAX_RUNTIME_SECONDS {
                issues.warning(
                    "estimated_runtime_seconds",
                    format!("estimated runtime {runtime:.0}s exceeds one hour"),
                );
            }
        }

        TemplateReport {
            issues: issues.found,
        }
    }

    /// Validates each template independently, in order.
    pub fn validate_batch(&self, templates: &[Template]) -> Vec<TemplateReport> {
        templates.iter().map(|t| self.validate(t)).collect()
    }
}

struct Issues {
    strict: bool,
    found: Vec<ValidationIssue>,
}

impl Issues {
    fn push(&mut self, severity: Severity, field: &str, message: impl Into<String>) {
        self.found.push(ValidationIssue {
            severity,
            field: field.to_string(),
            message: message.into(),
        });
    }

    fn error(&mut self, field: &str, message: impl Into<String>) {
        self.push(Severity::Error, field, message);
    }

    fn warning(&mut self, field: &str, message: impl Into<String>) {
        let severity = if self.strict {
            Severity::Error
        } else {
            Severity::Warning
        };
        self.push(severity, field, message);
    }
}

fn check_collection(field: &str, name: &CollectionName, issues: &mut Issues) {
    let raw = name.as_str();
    if raw.trim().is_empty() {
        issues.error(field, "collection name must not be blank");
    } else if raw.chars().any(char::is_whitespace) {
        issues.error(field, format!("collection name '{raw}' contains whitespace"));
    }
}

fn check_graph_config(template: &Template, issues: &mut Issues) {
    let config = &template.graph_config;
    if config.graph_name.as_str().trim().is_empty() {
        issues.error("graph_config.graph_name", "graph name is required");
    }
    if config.vertex_collections.is_empty() {
        issues.error(
            "graph_config.vertex_collections",
            "at least one vertex collection is required",
        );
    }
    for name in &config.vertex_collections {
        check_collection("graph_config.vertex_collections", name, issues);
    }
    for name in &config.edge_collections {
        check_collection("graph_config.edge_collections", name, issues);
    }
    match (&config.result_collection, config.store_results) {
        (Some(name), _) => check_collection("graph_config.result_collection", name, issues),
        (None, true) => issues.warning(
            "graph_config.result_collection",
            "store_results is set but no result collection is named",
        ),
        (None, false) => {}
    }
}

fn number(template: &Template, key: &str, issues: &mut Issues) -> Option<f64> {
    let value = template.parameters.get(key)?;
    match value.as_f64() {
        Some(n) => Some(n),
        None => {
            issues.error(
                &format!("parameters.{key}"),
                format!("expected a number, got {value}"),
            );
            None
        }
    }
}

fn integer(template: &Template, key: &str, issues: &mut Issues) -> Option<i64> {
    let value = template.parameters.get(key)?;
    match value.as_i64() {
        Some(n) => Some(n),
        None => {
            issues.error(
                &format!("parameters.{key}"),
                format!("expected an integer, got {value}"),
            );
            None
        }
    }
}

fn check_parameters(algorithm: AlgorithmKind, template: &Template, issues: &mut Issues) {
    if let Some(iterations) = integer(template, "max_iterations", issues) {
        if iterations < 1 {
            issues.error("parameters.max_iterations", "max_iterations must be at least 1");
        } else if iterations > MAX_ITERATIONS_WARNING {
            issues.warning(
                "parameters.max_iterations",
                format!("{iterations} iterations is unusually high"),
            );
        }
    }

    if let Some(value) = template.parameters.get("normalized") {
        if !value.is_boolean() {
            issues.error(
                "parameters.normalized",
                format!("expected true or false, got {value}"),
            );
        }
    }

    match algorithm {
        AlgorithmKind::PageRank => {
            if let Some(d) = number(template, "damping_factor", issues) {
                if d <= 0.0 || d >= 1.0 {
                    issues.error(
                        "parameters.damping_factor",
                        format!("damping_factor must be strictly between 0 and 1, got {d}"),
                    );
                }
            }
            if let Some(t) = number(template, "threshold", issues) {
                if t <= 0.0 {
                    issues.error("parameters.threshold", "threshold must be positive");
                } else if t > PAGERANK_THRESHOLD_WARNING {
                    issues.warning(
                        "parameters.threshold",
                        format!("threshold {t} will stop iteration early"),
                    );
                }
            }
        }
        AlgorithmKind::Louvain => {
            if let Some(r) = number(template, "resolution", issues) {
                if r <= 0.0 {
                    issues.error("parameters.resolution", "resolution must be positive");
                } else if r > LOUVAIN_RESOLUTION_WARNING {
                    issues.warning(
                        "parameters.resolution",
                        format!("resolution {r} produces very small communities"),
                    );
                }
            }
            if let Some(size) = integer(template, "min_community_size", issues) {
                if size < 1 {
                    issues.error(
                        "parameters.min_community_size",
                        "min_community_size must be at least 1",
                    );
                }
            }
        }
        AlgorithmKind::ShortestPath => {
            if let Some(value) = template.parameters.get("direction") {
                let valid = value
                    .as_str()
                    .is_some_and(|d| PATH_DIRECTIONS.contains(&d.to_ascii_lowercase().as_str()));
                if !valid {
                    issues.error(
                        "parameters.direction",
                        format!(
                            "direction must be one of {}, got {value}",
                            PATH_DIRECTIONS.join(", ")
                        ),
                    );
                }
            }
        }
        _ => {}
    }

    // Unknown non-scalar values cannot be sent to the engine.
    for (key, value) in &template.parameters {
        if matches!(value, Value::Object(_)) {
            issues.error(
                &format!("parameters.{key}"),
                "nested objects are not accepted as parameters",
            );
        }
    }
}
