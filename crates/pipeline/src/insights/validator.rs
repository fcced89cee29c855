//! Quality validation of candidate insights.
//!
//! Each candidate is scored by a fixed list of independent multiplicative
//! penalties:
//!
//! | Penalty | Fires when | Factor |
//! |---------|------------|--------|
//! | [`Penalty::LowConfidence`] | confidence below the configured minimum | ×0.5 |
//! | [`Penalty::ShortTitle`] | title shorter than 15 characters | ×0.7 |
//! | [`Penalty::ShortDescription`] | description shorter than 100 characters | ×0.6 |
//! | [`Penalty::NoQuantitativeEvidence`] | description has no percentage, decimal or ≥2-digit integer | ×0.7 |
//! | [`Penalty::GenericBusinessImpact`] | business impact contains a stock phrase | ×0.8 |
//! | [`Penalty::GenericTitle`] | title is exactly a stock title | ×0.5 |
//!
//! A candidate is retained when its adjusted confidence is at least
//! [`RETENTION_FLOOR`]. Parse-fallback records skip the penalties: they carry
//! raw text and are kept as-is.
//!
//! When nothing survives, the two candidates with the highest original
//! confidence are kept, each discounted by [`EXHAUSTION_DISCOUNT`]. The output
//! is never empty for non-empty input.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{Insight, InsightOrigin};
use crate::config::ReportingConfig;
use crate::Confidence;

/// Minimum adjusted confidence for retention.
pub const RETENTION_FLOOR: f64 = 0.4;

/// Extra discount applied to candidates kept by the exhaustion fallback.
pub const EXHAUSTION_DISCOUNT: f64 = 0.6;

/// Number of candidates kept by the exhaustion fallback.
pub const EXHAUSTION_KEEP: usize = 2;

const MIN_TITLE_CHARS: usize = 15;
const MIN_DESCRIPTION_CHARS: usize = 100;

const GENERIC_IMPACT_PHRASES: &[&str] = &[
    "further analysis",
    "requires investigation",
    "needs investigation",
    "further investigation",
    "more research",
    "should be monitored",
    "warrants attention",
    "could be important",
];

const GENERIC_TITLES: &[&str] = &[
    "insight",
    "analysis results",
    "key finding",
    "finding",
    "results",
    "analysis",
    "llm analysis",
    "summary",
    "observation",
];

static NUMERIC_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+(?:\.\d+)?%|\d+\.\d+|\d{2,}").expect("numeric token pattern is valid")
});

/// One quality rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Penalty {
    LowConfidence,
    ShortTitle,
    ShortDescription,
    NoQuantitativeEvidence,
    GenericBusinessImpact,
    GenericTitle,
}

impl Penalty {
    /// Multiplier applied when the penalty fires.
    pub fn factor(self) -> f64 {
        match self {
            Penalty::LowConfidence => 0.5,
            Penalty::ShortTitle => 0.7,
            Penalty::ShortDescription => 0.6,
            Penalty::NoQuantitativeEvidence => 0.7,
            Penalty::GenericBusinessImpact => 0.8,
            Penalty::GenericTitle => 0.5,
        }
    }
}

/// Scoring record for one candidate, in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityAssessment {
    /// Position of the candidate in the validator input.
    pub index: usize,
    pub original: Confidence,
    pub adjusted: Confidence,
    pub penalties: Vec<Penalty>,
    pub retained: bool,
}

/// Result of validating a candidate list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Retained insights with adjusted confidences, in input order.
    pub insights: Vec<Insight>,
    pub assessments: Vec<QualityAssessment>,
    /// Set when the exhaustion fallback supplied the output.
    pub exhausted: bool,
}

/// Applies the penalty table and retention rules.
#[derive(Debug, Clone)]
pub struct InsightValidator {
    min_confidence: Confidence,
    max_insights: usize,
}

impl InsightValidator {
    pub fn new(config: &ReportingConfig) -> Self {
        Self {
            min_confidence: config.min_confidence(),
            max_insights: config.max_insights_per_report.max(1),
        }
    }

    /// Penalties that fire for `insight`. Empty for parse-fallback records.
    pub fn penalties_for(&self, insight: &Insight) -> Vec<Penalty> {
        if insight.origin == InsightOrigin::ParseFallback {
            return Vec::new();
        }
        let mut fired = Vec::new();
        if insight.confidence < self.min_confidence {
            fired.push(Penalty::LowConfidence);
        }
        if insight.title.trim().chars().count() < MIN_TITLE_CHARS {
            fired.push(Penalty::ShortTitle);
        }
        if insight.description.trim().chars().count() < MIN_DESCRIPTION_CHARS {
            fired.push(Penalty::ShortDescription);
        }
        if !NUMERIC_TOKEN.is_match(&insight.description) {
            fired.push(Penalty::NoQuantitativeEvidence);
        }
        let impact = insight.business_impact.to_lowercase();
        if GENERIC_IMPACT_PHRASES.iter().any(|p| impact.contains(p)) {
            fired.push(Penalty::GenericBusinessImpact);
        }
        let title = insight.title.trim().to_lowercase();
        if GENERIC_TITLES.contains(&title.as_str()) {
            fired.push(Penalty::GenericTitle);
        }
        fired
    }

    /// Scores and filters `candidates`.
    pub fn validate(&self, candidates: Vec<Insight>) -> ValidationOutcome {
        let mut assessments: Vec<QualityAssessment> = candidates
            .iter()
            .enumerate()
            .map(|(index, insight)| {
                let penalties = self.penalties_for(insight);
                let factor: f64 = penalties.iter().map(|p| p.factor()).product();
                let adjusted = insight.confidence.scaled(factor);
                QualityAssessment {
                    index,
                    original: insight.confidence,
                    adjusted,
                    retained: insight.origin == InsightOrigin::ParseFallback
                        || adjusted.as_f64() >= RETENTION_FLOOR,
                    penalties,
                }
            })
            .collect();

        let exhausted = !candidates.is_empty() && assessments.iter().all(|a| !a.retained);
        if exhausted {
            warn!(
                candidates = candidates.len(),
                "every insight failed validation; keeping top {EXHAUSTION_KEEP} by original confidence"
            );
            let mut ranked: Vec<usize> = (0..candidates.len()).collect();
            // Stable sort keeps the earlier candidate first on equal confidence.
            ranked.sort_by(|&a, &b| {
                assessments[b]
                    .original
                    .partial_cmp(&assessments[a].original)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            for &index in ranked.iter().take(EXHAUSTION_KEEP) {
                let assessment = &mut assessments[index];
                assessment.adjusted = assessment.original.scaled(EXHAUSTION_DISCOUNT);
                assessment.retained = true;
            }
        }

        self.apply_cap(&mut assessments);

        let insights: Vec<Insight> = candidates
            .into_iter()
            .zip(&assessments)
            .filter(|(_, a)| a.retained)
            .map(|(mut insight, a)| {
                insight.confidence = a.adjusted;
                insight
            })
            .collect();

        debug!(
            retained = insights.len(),
            assessed = assessments.len(),
            exhausted,
            "validated insights"
        );

        ValidationOutcome {
            insights,
            assessments,
            exhausted,
        }
    }

    /// Keeps at most `max_insights` retained entries, preferring higher
    /// adjusted confidence and, on ties, the earlier candidate.
    fn apply_cap(&self, assessments: &mut [QualityAssessment]) {
        let mut retained: Vec<usize> = assessments
            .iter()
            .filter(|a| a.retained)
            .map(|a| a.index)
            .collect();
        if retained.len() <= self.max_insights {
            return;
        }
        retained.sort_by(|&a, &b| {
            assessments[b]
                .adjusted
                .partial_cmp(&assessments[a].adjusted)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        for &index in &retained[self.max_insights..] {
            assessments[index].retained = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::Map;

    use super::*;
    use crate::insights::InsightType;

    fn insight(title: &str, description: &str, confidence: f64) -> Insight {
        Insight {
            title: title.to_string(),
            description: description.to_string(),
            insight_type: InsightType::KeyFinding,
            confidence: Confidence::clamped(confidence),
            business_impact: "Prioritise retention offers for the top 20 accounts".to_string(),
            supporting_data: Map::new(),
            origin: InsightOrigin::Structured,
        }
    }

    fn strong(title: &str, confidence: f64) -> Insight {
        insight(
            title,
            "The top 5% of accounts hold 62.3% of total PageRank mass across 12000 customers, \
             concentrating influence in a small core of the network.",
            confidence,
        )
    }

    fn validator() -> InsightValidator {
        InsightValidator::new(&ReportingConfig::default())
    }

    #[test]
    fn generic_short_insight_recovers_through_exhaustion() {
        let outcome = validator().validate(vec![insight("Insight", "twenty chars of text", 0.9)]);
        let a = &outcome.assessments[0];
        assert!(a.penalties.contains(&Penalty::GenericTitle));
        assert!(a.penalties.contains(&Penalty::ShortTitle));
        assert!(a.penalties.contains(&Penalty::ShortDescription));
        assert!(a.penalties.contains(&Penalty::NoQuantitativeEvidence));
        assert!(outcome.exhausted);
        assert_eq!(outcome.insights.len(), 1);
        assert!((outcome.insights[0].confidence.as_f64() - 0.54).abs() < 1e-9);
    }

    #[test]
    fn well_formed_insight_passes_untouched() {
        let outcome = validator().validate(vec![strong("Influence Concentrated in Core", 0.85)]);
        assert!(!outcome.exhausted);
        assert!(outcome.assessments[0].penalties.is_empty());
        assert!((outcome.insights[0].confidence.as_f64() - 0.85).abs() < 1e-12);
    }

    #[test]
    fn penalties_compound_multiplicatively() {
        let mut candidate = strong("Influence Concentrated in Core", 0.8);
        candidate.business_impact = "This requires investigation".into();
        let outcome = validator().validate(vec![candidate]);
        assert_eq!(
            outcome.assessments[0].penalties,
            vec![Penalty::GenericBusinessImpact]
        );
        assert!((outcome.insights[0].confidence.as_f64() - 0.64).abs() < 1e-9);
    }

    #[test]
    fn low_confidence_penalty_uses_configured_threshold() {
        let config = ReportingConfig {
            min_confidence: 0.9,
            ..ReportingConfig::default()
        };
        let outcome = InsightValidator::new(&config)
            .validate(vec![strong("Influence Concentrated in Core", 0.85)]);
        assert_eq!(outcome.assessments[0].penalties, vec![Penalty::LowConfidence]);
        assert!((outcome.insights[0].confidence.as_f64() - 0.425).abs() < 1e-9);
    }

    #[test]
    fn retained_order_follows_input() {
        let outcome = validator().validate(vec![
            strong("Second Highest Influence Group", 0.7),
            insight("Insight", "short", 0.99),
            strong("Highest Influence Group Found", 0.9),
        ]);
        assert!(!outcome.exhausted);
        let titles: Vec<&str> = outcome.insights.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Second Highest Influence Group", "Highest Influence Group Found"]
        );
        assert!(!outcome.assessments[1].retained);
    }

    #[test]
    fn exhaustion_keeps_two_best_by_original_confidence() {
        let outcome = validator().validate(vec![
            insight("Insight", "short", 0.5),
            insight("Finding", "short", 0.9),
            insight("Summary", "short", 0.7),
        ]);
        assert!(outcome.exhausted);
        let titles: Vec<&str> = outcome.insights.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["Finding", "Summary"]);
        assert!((outcome.insights[0].confidence.as_f64() - 0.54).abs() < 1e-9);
        assert!((outcome.insights[1].confidence.as_f64() - 0.42).abs() < 1e-9);
    }

    #[test]
    fn parse_fallback_is_always_retained() {
        let mut fallback = insight("Analysis Results (Unparsed)", "raw text", 0.6);
        fallback.origin = InsightOrigin::ParseFallback;
        let outcome = validator().validate(vec![fallback]);
        assert!(!outcome.exhausted);
        assert!(outcome.assessments[0].penalties.is_empty());
        assert!((outcome.insights[0].confidence.as_f64() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn cap_keeps_highest_adjusted_in_input_order() {
        let config = ReportingConfig {
            max_insights_per_report: 2,
            ..ReportingConfig::default()
        };
        let outcome = InsightValidator::new(&config).validate(vec![
            strong("First Influence Concentration", 0.6),
            strong("Second Influence Concentration", 0.9),
            strong("Third Influence Concentration", 0.8),
        ]);
        let titles: Vec<&str> = outcome.insights.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Second Influence Concentration", "Third Influence Concentration"]
        );
    }

    #[test]
    fn numeric_evidence_detection() {
        let v = validator();
        let has = |d: &str| {
            !v.penalties_for(&insight("A Sufficiently Long Title", d, 0.9))
                .contains(&Penalty::NoQuantitativeEvidence)
        };
        assert!(has("about 45% of nodes"));
        assert!(has("a score of 0.37"));
        assert!(has("over 120 accounts"));
        assert!(!has("only 3 hubs"));
        assert!(!has("no numbers at all"));
    }

    #[test]
    fn empty_input_is_empty_output() {
        let outcome = validator().validate(Vec::new());
        assert!(outcome.insights.is_empty());
        assert!(!outcome.exhausted);
    }
}
