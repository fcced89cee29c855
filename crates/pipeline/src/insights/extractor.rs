//! Insight extraction from reasoning output.
//!
//! The extractor is a line scanner over a small tagging grammar:
//!
//! ```text
//! marker-line := ws* decoration? emphasis? FIELD emphasis? ws* ':' emphasis? ws* value
//! decoration  := ('-' | '*' | '+' | '•' | DIGITS ('.' | ')')) ws*  |  '#'+ ws*
//! emphasis    := '**' | '__'
//! FIELD       := 'title' | 'description' | 'business impact' | 'confidence'   (any case)
//! ```
//!
//! Scanning rules:
//!
//! 1. A `Title` marker closes the current candidate (if any) and opens a new one.
//! 2. Any other marker opens that field on the current candidate. Markers seen
//!    before the first `Title` have no candidate to attach to and are skipped.
//! 3. A non-marker, non-blank line is appended, space-joined, to the open field.
//! 4. Blank lines are ignored; they neither open nor close fields.
//!
//! Confidence normalisation: the first number in the field is read; values in
//! `[0, 1]` are used as-is, values in `(1, 100]` are percentages, anything else
//! (or no number at all) yields [`DEFAULT_CONFIDENCE`].
//!
//! If the scan yields no candidate, the whole text (trimmed, unless nothing
//! but whitespace would remain) becomes a single
//! [`InsightOrigin::ParseFallback`] insight, bounded to
//! [`FALLBACK_MAX_CHARS`] characters. Any non-empty input therefore yields at
//! least one insight. Structured fields are never truncated.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map};
use tracing::{debug, warn};

use super::{infer_insight_type, Insight, InsightOrigin};
use crate::Confidence;

/// Confidence assigned when the field is missing or unparseable.
pub const DEFAULT_CONFIDENCE: f64 = 0.7;

/// Confidence of the verbatim parse-fallback insight.
pub const FALLBACK_CONFIDENCE: f64 = 0.6;

/// Character bound of the verbatim parse-fallback description.
pub const FALLBACK_MAX_CHARS: usize = 1000;

/// Title of the verbatim parse-fallback insight.
pub const FALLBACK_TITLE: &str = "Analysis Results (Unparsed)";

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^\s*(?:(?:[-*+•]|\d+[.)])\s*|#+\s*)?(?:\*\*|__)?\s*(title|description|business[ _]impact|confidence)\s*(?:\*\*|__)?\s*:\s*(?:\*\*|__)?\s*(.*?)\s*$",
    )
    .expect("marker pattern is valid")
});

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("number pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Description,
    BusinessImpact,
    Confidence,
}

impl Field {
    fn from_marker(marker: &str) -> Field {
        match marker.to_ascii_lowercase().as_str() {
            "title" => Field::Title,
            "description" => Field::Description,
            "confidence" => Field::Confidence,
            _ => Field::BusinessImpact,
        }
    }
}

#[derive(Debug, Default)]
struct Draft {
    title: String,
    description: String,
    business_impact: String,
    confidence: String,
}

impl Draft {
    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Description => &mut self.description,
            Field::BusinessImpact => &mut self.business_impact,
            Field::Confidence => &mut self.confidence,
        }
    }

    fn append(&mut self, field: Field, text: &str) {
        let text = strip_emphasis(text);
        if text.is_empty() {
            return;
        }
        let slot = self.field_mut(field);
        if !slot.is_empty() {
            slot.push(' ');
        }
        slot.push_str(text);
    }

    fn into_insight(self) -> Option<Insight> {
        let description = self.description.trim().to_string();
        let mut title = self.title.trim().to_string();
        if title.is_empty() {
            if description.is_empty() {
                return None;
            }
            title = description.chars().take(80).collect();
        }
        let confidence = parse_confidence(&self.confidence);
        Some(Insight {
            insight_type: infer_insight_type(&title, &description),
            title,
            description,
            confidence,
            business_impact: self.business_impact.trim().to_string(),
            supporting_data: Map::new(),
            origin: InsightOrigin::Structured,
        })
    }
}

fn strip_emphasis(text: &str) -> &str {
    text.trim()
        .trim_start_matches("**")
        .trim_end_matches("**")
        .trim()
}

/// Scanner state: finished candidates, the open candidate and its open field.
#[derive(Default)]
struct Scanner {
    finished: Vec<Draft>,
    current: Option<Draft>,
    open: Option<Field>,
}

impl Scanner {
    fn feed(&mut self, line: &str) {
        if line.trim().is_empty() {
            return;
        }
        if let Some(caps) = MARKER.captures(line) {
            let field = Field::from_marker(&caps[1]);
            let value = caps.get(2).map_or("", |m| m.as_str());
            if field == Field::Title {
                if let Some(done) = self.current.take() {
                    self.finished.push(done);
                }
                self.current = Some(Draft::default());
            }
            match self.current.as_mut() {
                Some(draft) => {
                    draft.append(field, value);
                    self.open = Some(field);
                }
                None => self.open = None,
            }
            return;
        }
        if let (Some(draft), Some(field)) = (self.current.as_mut(), self.open) {
            draft.append(field, line);
        }
    }

    fn finish(mut self) -> Vec<Draft> {
        if let Some(done) = self.current.take() {
            self.finished.push(done);
        }
        self.finished
    }
}

/// Reads a confidence value from free text.
///
/// `"0.9"` → 0.9, `"95"` / `"95%"` → 0.95, `"high"` → 0.7.
pub fn parse_confidence(raw: &str) -> Confidence {
    let value = NUMBER
        .find(raw)
        .and_then(|m| m.as_str().parse::<f64>().ok());
    match value {
        Some(v) if (0.0..=1.0).contains(&v) => Confidence::clamped(v),
        Some(v) if v > 1.0 && v <= 100.0 => Confidence::clamped(v / 100.0),
        _ => Confidence::clamped(DEFAULT_CONFIDENCE),
    }
}

/// Extracts candidate insights from one block of narrative text.
///
/// Never fails. Returns an empty list only for the empty string.
pub fn extract_insights(text: &str) -> Vec<Insight> {
    let mut scanner = Scanner::default();
    for line in text.lines() {
        scanner.feed(line);
    }
    let insights: Vec<Insight> = scanner
        .finish()
        .into_iter()
        .filter_map(Draft::into_insight)
        .collect();

    if !insights.is_empty() {
        debug!(count = insights.len(), "extracted structured insights");
        return insights;
    }

    if text.is_empty() {
        return Vec::new();
    }
    let trimmed = match text.trim() {
        "" => text,
        trimmed => trimmed,
    };

    let total_chars = trimmed.chars().count();
    warn!(
        chars = total_chars,
        "no structured insight fields found; preserving text as fallback insight"
    );
    let description: String = trimmed.chars().take(FALLBACK_MAX_CHARS).collect();
    let mut supporting_data = Map::new();
    supporting_data.insert("original_chars".into(), json!(total_chars));
    supporting_data.insert("truncated".into(), json!(total_chars > FALLBACK_MAX_CHARS));
    vec![Insight {
        insight_type: infer_insight_type(FALLBACK_TITLE, &description),
        title: FALLBACK_TITLE.to_string(),
        description,
        confidence: Confidence::clamped(FALLBACK_CONFIDENCE),
        business_impact: String::new(),
        supporting_data,
        origin: InsightOrigin::ParseFallback,
    }]
}
