//! Requirements extraction from business documents.
//!
//! The reasoning answer is read line by line:
//!
//! ```text
//! Domain: retail
//! Summary: one sentence
//! Objective: <title> | <priority> | <description>
//! ```
//!
//! The priority and description columns are optional. An answer with no
//! `Objective:` line is discarded in favour of the keyword heuristic.

use async_trait::async_trait;
use pipeline::{
    EpochId, Objective, Priority, Requirement, RequirementId, RequirementsDocument, StageError,
    StageKind, Timestamp,
};
use tracing::{info, instrument, warn};

use super::{first_sentence, truncate_chars};
use crate::unit::{prompt_header, CapabilityUnit, StageContext};

const MAX_SUMMARY_CHARS: usize = 240;
const MAX_OBJECTIVE_TITLE_CHARS: usize = 80;
const DEFAULT_DOMAIN: &str = "general";

/// Domain labels and the lowercase terms that suggest them.
const DOMAINS: &[(&str, &[&str])] = &[
    ("finance", &["fraud", "transaction", "bank", "payment", "account"]),
    ("retail", &["customer", "purchase", "product", "store", "basket"]),
    ("supply_chain", &["supplier", "shipment", "logistics", "warehouse", "inventory"]),
    ("social_network", &["follower", "friend", "social", "influencer", "community"]),
    ("healthcare", &["patient", "clinical", "diagnosis", "hospital"]),
    ("telecom", &["subscriber", "network outage", "cell tower", "call record"]),
];

/// Verbs that mark a sentence as an objective.
const GOAL_VERBS: &[&str] = &[
    "identify", "find", "detect", "discover", "determine", "understand", "measure", "rank",
    "segment", "reduce", "improve", "optimize", "optimise", "locate", "analyze", "analyse",
];

/// Turns requirements documents into one tracked [`Requirement`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequirementsUnit;

#[derive(Debug, Default)]
struct Extracted {
    domain: Option<String>,
    summary: Option<String>,
    objectives: Vec<Objective>,
}

fn objective(index: usize, title: &str, priority: Priority, description: &str) -> Objective {
    let title = truncate_chars(title.trim(), MAX_OBJECTIVE_TITLE_CHARS);
    let description = match description.trim() {
        "" => title.clone(),
        text => text.to_string(),
    };
    Objective {
        id: format!("OBJ-{:03}", index + 1),
        title,
        description,
        priority,
        success_criteria: Vec::new(),
    }
}

fn field<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let line = line.trim().trim_start_matches(['-', '*', ' ']);
    let (key, value) = line.split_once(':')?;
    key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
}

fn parse_answer(text: &str) -> Extracted {
    let mut extracted = Extracted::default();
    for line in text.lines() {
        if let Some(domain) = field(line, "domain").filter(|d| !d.is_empty()) {
            extracted.domain = Some(domain.to_ascii_lowercase().replace(' ', "_"));
        } else if let Some(summary) = field(line, "summary").filter(|s| !s.is_empty()) {
            extracted.summary = Some(truncate_chars(summary, MAX_SUMMARY_CHARS));
        } else if let Some(value) = field(line, "objective") {
            let mut columns = value.split('|').map(str::trim);
            let title = columns.next().unwrap_or_default();
            if title.is_empty() {
                continue;
            }
            let priority = columns
                .next()
                .and_then(Priority::parse_lenient)
                .unwrap_or(Priority::Medium);
            let description = columns.collect::<Vec<_>>().join(" | ");
            let index = extracted.objectives.len();
            extracted
                .objectives
                .push(objective(index, title, priority, &description));
        }
    }
    extracted
}

fn detect_domain(text: &str) -> String {
    let lower = text.to_lowercase();
    DOMAINS
        .iter()
        .map(|(domain, terms)| (*domain, terms.iter().filter(|t| lower.contains(*t)).count()))
        .filter(|&(_, hits)| hits > 0)
        // First listed domain wins ties.
        .fold(None, |best: Option<(&str, usize)>, candidate| match best {
            Some(b) if b.1 >= candidate.1 => Some(b),
            _ => Some(candidate),
        })
        .map_or_else(|| DEFAULT_DOMAIN.to_string(), |(domain, _)| domain.to_string())
}

fn priority_of(text: &str) -> Priority {
    let lower = text.to_lowercase();
    if lower.contains("critical") || lower.contains("urgent") {
        Priority::Critical
    } else if lower.contains("must") || lower.contains("high priority") {
        Priority::High
    } else if lower.contains("nice to have") || lower.contains("optional") {
        Priority::Low
    } else {
        Priority::Medium
    }
}

/// Candidate objective statements: bullet items and sentences with a goal verb.
fn statements(text: &str) -> Vec<String> {
    let mut found = Vec::new();
    for line in text.lines() {
        let trimmed = line.trim();
        let bullet = trimmed
            .strip_prefix(['-', '*', '•'])
            .or_else(|| {
                let digits = trimmed.chars().take_while(char::is_ascii_digit).count();
                (digits > 0)
                    .then(|| trimmed[digits..].strip_prefix(['.', ')']))
                    .flatten()
            })
            .map(str::trim);
        match bullet {
            Some(item) if !item.is_empty() => found.push(item.to_string()),
            Some(_) => {}
            None => {
                for sentence in trimmed.split_inclusive(['.', '!', '?']) {
                    let lower = sentence.to_lowercase();
                    if GOAL_VERBS
                        .iter()
                        .any(|verb| lower.split(|c: char| !c.is_alphanumeric()).any(|w| w == *verb))
                    {
                        found.push(sentence.trim().to_string());
                    }
                }
            }
        }
    }
    found
}

fn heuristic(text: &str) -> Extracted {
    let objectives = statements(text)
        .iter()
        .enumerate()
        .map(|(i, statement)| {
            objective(
                i,
                &first_sentence(statement, MAX_OBJECTIVE_TITLE_CHARS),
                priority_of(statement),
                statement,
            )
        })
        .collect();
    Extracted {
        domain: Some(detect_domain(text)),
        summary: Some(first_sentence(text, MAX_SUMMARY_CHARS)),
        objectives,
    }
}

fn prompt(text: &str) -> String {
    format!(
        "{}Extract the business requirements from the document below. Answer with one \
         `Domain:` line, one `Summary:` line and one line per objective in the form \
         `Objective: <title> | <critical|high|medium|low> | <description>`.\n\n{}\n",
        prompt_header(StageKind::RequirementsExtraction),
        text
    )
}

impl RequirementsUnit {
    fn build(
        epoch_id: EpochId,
        documents: &[RequirementsDocument],
        mut found: Extracted,
        text: &str,
    ) -> Requirement {
        if found.objectives.is_empty() {
            // Every non-blank document yields at least its opening sentence.
            found.objectives.push(objective(
                0,
                &first_sentence(text, MAX_OBJECTIVE_TITLE_CHARS),
                Priority::Medium,
                &first_sentence(text, MAX_SUMMARY_CHARS),
            ));
        }
        Requirement {
            id: RequirementId::new_random(),
            epoch_id,
            domain: found.domain.unwrap_or_else(|| detect_domain(text)),
            summary: found
                .summary
                .unwrap_or_else(|| first_sentence(text, MAX_SUMMARY_CHARS)),
            objectives: found.objectives,
            source_documents: documents.iter().map(|d| d.source.clone()).collect(),
            created_at: Timestamp::now(),
        }
    }
}

#[async_trait]
impl CapabilityUnit for RequirementsUnit {
    type Input = Vec<RequirementsDocument>;
    type Output = Requirement;

    const STAGE: StageKind = StageKind::RequirementsExtraction;

    #[instrument(skip_all, fields(run_id = %ctx.run_id, epoch_id = %ctx.epoch_id, stage = %Self::STAGE))]
    async fn execute_async(
        &self,
        documents: &Vec<RequirementsDocument>,
        ctx: &StageContext,
    ) -> Result<Requirement, StageError> {
        let text = documents
            .iter()
            .map(|d| d.text.trim())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n");
        if text.is_empty() {
            return Err(StageError::dependency(
                Self::STAGE,
                "at least one non-empty requirements document",
            ));
        }

        let reasoned = ctx
            .gateway
            .reason(Self::STAGE, &prompt(&text), Self::REASONING_ATTEMPTS)
            .await
            .map(|answer| parse_answer(&answer));
        let found = match reasoned {
            Some(parsed) if !parsed.objectives.is_empty() => parsed,
            Some(_) => {
                warn!("reasoning answer had no objectives; using heuristic extraction");
                heuristic(&text)
            }
            None => heuristic(&text),
        };

        let requirement = Self::build(ctx.epoch_id, documents, found, &text);
        ctx.catalog
            .track_requirement(requirement.clone())
            .await
            .map_err(|e| StageError::new(Self::STAGE, e))?;
        info!(
            requirement_id = %requirement.id,
            domain = %requirement.domain,
            objectives = requirement.objectives.len(),
            "requirement extracted"
        );
        Ok(requirement)
    }
}
