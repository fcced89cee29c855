//! Insight records and the extraction / validation engine.
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`extractor`] | line-oriented tagging grammar over reasoning output |
//! | [`validator`] | multiplicative quality penalties and retention rules |
//! | [`heuristics`] | deterministic insights computed from engine result rows |

pub mod extractor;
pub mod heuristics;
pub mod validator;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::algorithms::AlgorithmKind;
use crate::{Confidence, ExecutionId, Timestamp};

pub use extractor::extract_insights;
pub use validator::{InsightValidator, Penalty, QualityAssessment, ValidationOutcome};

/// Category of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightType {
    KeyFinding,
    Pattern,
    Anomaly,
    Opportunity,
    Concern,
}

/// How an insight came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightOrigin {
    /// Parsed from tagged reasoning output.
    Structured,
    /// Reasoning output had no recognisable fields; the text is preserved
    /// verbatim (bounded) as a single low-confidence record.
    ParseFallback,
    /// Computed from result statistics without the reasoning capability.
    Heuristic,
}

/// A structured, confidence-scored finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub title: String,
    pub description: String,
    pub insight_type: InsightType,
    pub confidence: Confidence,
    pub business_impact: String,
    #[serde(default)]
    pub supporting_data: Map<String, Value>,
    pub origin: InsightOrigin,
}

// Keyword sets for type inference, checked in this order.
const ANOMALY_TERMS: &[&str] = &[
    "anomal", "unusual", "unexpected", "outlier", "spike", "irregular", "suspicious",
];
const PATTERN_TERMS: &[&str] = &[
    "pattern", "trend", "distribution", "recurring", "correlat", "seasonal",
];
const OPPORTUNITY_TERMS: &[&str] = &[
    "opportunit", "potential", "growth", "optimiz", "optimis", "untapped", "upside",
];
const RISK_TERMS: &[&str] = &[
    "risk", "concern", "problem", "vulnerab", "bottleneck", "threat", "fraud", "single point of failure",
];

/// Infers the insight type from title and description.
///
/// Total: every input maps to exactly one type, falling back to
/// [`InsightType::KeyFinding`].
pub fn infer_insight_type(title: &str, description: &str) -> InsightType {
    let text = format!("{title} {description}").to_lowercase();
    let mentions = |terms: &[&str]| terms.iter().any(|t| text.contains(t));
    if mentions(ANOMALY_TERMS) {
        InsightType::Anomaly
    } else if mentions(PATTERN_TERMS) {
        InsightType::Pattern
    } else if mentions(OPPORTUNITY_TERMS) {
        InsightType::Opportunity
    } else if mentions(RISK_TERMS) {
        InsightType::Concern
    } else {
        InsightType::KeyFinding
    }
}

/// Final output of the reporting stage for one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub execution_id: ExecutionId,
    pub algorithm: AlgorithmKind,
    pub title: String,
    pub summary: String,
    /// Never empty.
    pub insights: Vec<Insight>,
    pub recommendations: Vec<String>,
    /// Set when every candidate failed validation and the top-two fallback
    /// was applied.
    pub validation_exhausted: bool,
    pub generated_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_each_type() {
        assert_eq!(
            infer_insight_type("Unusual Spike in Node Activity", ""),
            InsightType::Anomaly
        );
        assert_eq!(
            infer_insight_type("Unexpected Outlier Detected", ""),
            InsightType::Anomaly
        );
        assert_eq!(
            infer_insight_type("Distribution Pattern Identified", ""),
            InsightType::Pattern
        );
        assert_eq!(
            infer_insight_type("Network Trend Analysis", ""),
            InsightType::Pattern
        );
        assert_eq!(
            infer_insight_type("Growth Opportunity in Long Tail", ""),
            InsightType::Opportunity
        );
        assert_eq!(
            infer_insight_type("Critical Risk Identified", ""),
            InsightType::Concern
        );
        assert_eq!(
            infer_insight_type("Top Nodes Identified", ""),
            InsightType::KeyFinding
        );
    }

    #[test]
    fn description_participates_in_inference() {
        assert_eq!(
            infer_insight_type("Bridge nodes", "These nodes are a bottleneck for flow"),
            InsightType::Concern
        );
    }
}
