//! Property tests for the insight extractor and validator.

use pipeline::insights::extractor::{extract_insights, parse_confidence};
use pipeline::{Confidence, Insight, InsightOrigin, InsightType, InsightValidator, ReportingConfig};
use proptest::prelude::*;
use serde_json::Map;

fn candidate() -> impl Strategy<Value = Insight> {
    (
        "[A-Za-z ]{0,40}",
        "[A-Za-z0-9 .%]{0,200}",
        "[a-z ]{0,60}",
        0.0f64..=1.0,
    )
        .prop_map(|(title, description, business_impact, confidence)| Insight {
            title,
            description,
            insight_type: InsightType::KeyFinding,
            confidence: Confidence::clamped(confidence),
            business_impact,
            supporting_data: Map::new(),
            origin: InsightOrigin::Structured,
        })
}

proptest! {
    #[test]
    fn extractor_never_drops_non_empty_input(text in "\\PC{1,400}") {
        prop_assert!(!extract_insights(&text).is_empty());
    }

    #[test]
    fn whitespace_only_input_still_yields_an_insight(text in "[ \t\r\n]{1,40}") {
        prop_assert_eq!(extract_insights(&text).len(), 1);
    }

    #[test]
    fn extracted_records_always_carry_a_title(
        titles in prop::collection::vec("[A-Za-z][A-Za-z ]{0,30}", 1..5)
    ) {
        let text: String = titles
            .iter()
            .map(|t| format!("Title: {t}\nDescription: about {t}\nConfidence: 80\n"))
            .collect();
        let insights = extract_insights(&text);
        prop_assert_eq!(insights.len(), titles.len());
        for insight in &insights {
            prop_assert!(!insight.title.is_empty());
            prop_assert!((insight.confidence.as_f64() - 0.8).abs() < 1e-12);
        }
    }

    #[test]
    fn parsed_confidence_is_always_in_range(raw in "\\PC{0,20}") {
        let c = parse_confidence(&raw).as_f64();
        prop_assert!((0.0..=1.0).contains(&c));
    }

    #[test]
    fn validator_output_is_non_empty_capped_and_never_inflated(
        candidates in prop::collection::vec(candidate(), 1..12),
        cap in 1usize..6,
    ) {
        let config = ReportingConfig {
            max_insights_per_report: cap,
            ..ReportingConfig::default()
        };
        let originals: Vec<f64> = candidates.iter().map(|c| c.confidence.as_f64()).collect();
        let outcome = InsightValidator::new(&config).validate(candidates);

        prop_assert!(!outcome.insights.is_empty());
        prop_assert!(outcome.insights.len() <= cap);
        for assessment in &outcome.assessments {
            prop_assert!(assessment.adjusted.as_f64() <= originals[assessment.index] + 1e-12);
        }

        // Retained entries keep input order.
        let retained: Vec<usize> = outcome
            .assessments
            .iter()
            .filter(|a| a.retained)
            .map(|a| a.index)
            .collect();
        prop_assert!(retained.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(retained.len(), outcome.insights.len());
    }
}
