//! Use-case generation: one analysis approach per distinct algorithm.

use std::collections::HashSet;

use async_trait::async_trait;
use pipeline::{
    AlgorithmKind, Priority, Requirement, SchemaAnalysis, StageError, StageKind, Timestamp,
    UseCase, UseCaseId, UseCaseKind,
};
use tracing::{debug, info, instrument};

use super::truncate_chars;
use crate::unit::{prompt_header, CapabilityUnit, StageContext};

const MAX_TITLE_CHARS: usize = 120;

/// What use-case generation depends on.
#[derive(Debug, Clone, PartialEq)]
pub struct UseCaseInput {
    pub analysis: SchemaAnalysis,
    pub requirement: Requirement,
}

/// Maps requirement objectives to graph analyses.
#[derive(Debug, Clone, Copy, Default)]
pub struct UseCaseUnit;

/// A use case before it receives an identity.
#[derive(Debug, Clone, PartialEq)]
struct Draft {
    title: String,
    description: String,
    algorithm: AlgorithmKind,
    business_value: String,
    priority: Priority,
}

/// Reads `Use Case: <title> | <algorithm> | <business value>` lines.
///
/// The algorithm column may be any spelling [`AlgorithmKind::detect`]
/// recognises; lines without a recognisable algorithm are skipped.
fn parse_answer(text: &str) -> Vec<Draft> {
    text.lines()
        .filter_map(|line| {
            let line = line.trim().trim_start_matches(['-', '*', ' ']);
            let (key, value) = line.split_once(':')?;
            let key = key.trim().to_ascii_lowercase();
            if key != "use case" && key != "use_case" {
                return None;
            }
            let mut columns = value.split('|').map(str::trim);
            let title = columns.next().filter(|t| !t.is_empty())?;
            let algorithm = AlgorithmKind::detect(columns.next()?)?;
            let business_value = columns.collect::<Vec<_>>().join(" | ");
            Some(Draft {
                title: truncate_chars(title, MAX_TITLE_CHARS),
                description: title.to_string(),
                algorithm,
                business_value,
                priority: Priority::Medium,
            })
        })
        .collect()
}

/// Classifies each objective; explicit algorithm mentions win over keywords.
fn heuristic(requirement: &Requirement, analysis: &SchemaAnalysis) -> Vec<Draft> {
    requirement
        .objectives
        .iter()
        .filter_map(|objective| {
            let text = format!("{} {}", objective.title, objective.description);
            let algorithm = AlgorithmKind::detect(&text)
                .or_else(|| UseCaseKind::classify(&text).map(|kind| kind.algorithms()[0]))?;
            Some(Draft {
                title: truncate_chars(
                    &format!("{} ({})", objective.title, algorithm),
                    MAX_TITLE_CHARS,
                ),
                description: objective.description.clone(),
                algorithm,
                business_value: format!(
                    "Addresses {} by running {} over graph '{}'",
                    objective.id, algorithm, analysis.graph_name
                ),
                priority: objective.priority,
            })
        })
        .collect()
}

fn default_draft(analysis: &SchemaAnalysis) -> Draft {
    let algorithm = UseCaseKind::Centrality.algorithms()[0];
    Draft {
        title: format!("Key entities in {}", analysis.graph_name),
        description: format!(
            "Rank the entities of graph '{}' by structural importance",
            analysis.graph_name
        ),
        algorithm,
        business_value: "Highlights the most connected entities for prioritisation".into(),
        priority: Priority::Medium,
    }
}

/// First draft per algorithm, in input order.
fn dedupe(drafts: Vec<Draft>) -> Vec<Draft> {
    let mut seen = HashSet::new();
    drafts
        .into_iter()
        .filter(|d| seen.insert(d.algorithm))
        .collect()
}

fn prompt(input: &UseCaseInput) -> String {
    let objectives = input
        .requirement
        .objectives
        .iter()
        .map(|o| format!("- {} [{:?}]: {}", o.title, o.priority, o.description))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "{}Domain: {}\nGraph: {}\n{}\n\nObjectives:\n{}\n\nPropose graph analyses, one per line, as \
         `Use Case: <title> | <algorithm> | <business value>`. Algorithms: {}.\n",
        prompt_header(StageKind::UseCaseGeneration),
        input.requirement.domain,
        input.analysis.graph_name,
        input.analysis.summary,
        objectives,
        AlgorithmKind::ALL
            .iter()
            .map(|a| a.name())
            .collect::<Vec<_>>()
            .join(", ")
    )
}

#[async_trait]
impl CapabilityUnit for UseCaseUnit {
    type Input = UseCaseInput;
    type Output = Vec<UseCase>;

    const STAGE: StageKind = StageKind::UseCaseGeneration;

    #[instrument(skip_all, fields(run_id = %ctx.run_id, epoch_id = %ctx.epoch_id, stage = %Self::STAGE))]
    async fn execute_async(
        &self,
        input: &UseCaseInput,
        ctx: &StageContext,
    ) -> Result<Vec<UseCase>, StageError> {
        let requirement = &input.requirement;
        if requirement.objectives.is_empty() {
            return Err(StageError::dependency(
                Self::STAGE,
                format!("objectives of requirement {}", requirement.id),
            ));
        }

        let reasoned = ctx
            .gateway
            .reason(Self::STAGE, &prompt(input), Self::REASONING_ATTEMPTS)
            .await
            .map(|answer| parse_answer(&answer))
            .filter(|drafts| !drafts.is_empty());
        let mut drafts = dedupe(match reasoned {
            Some(drafts) => drafts,
            None => heuristic(requirement, &input.analysis),
        });
        if drafts.is_empty() {
            debug!("no objective matched an analysis kind; using default centrality use case");
            drafts.push(default_draft(&input.analysis));
        }

        let mut use_cases = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let use_case = UseCase {
                id: UseCaseId::new_random(),
                epoch_id: ctx.epoch_id,
                requirement_ids: vec![requirement.id],
                title: draft.title,
                description: draft.description,
                kind: UseCaseKind::for_algorithm(draft.algorithm),
                algorithm: draft.algorithm,
                business_value: draft.business_value,
                priority: draft.priority,
                created_at: Timestamp::now(),
            };
            ctx.catalog
                .track_use_case(use_case.clone())
                .await
                .map_err(|e| StageError::new(Self::STAGE, e))?;
            use_cases.push(use_case);
        }
        info!(use_cases = use_cases.len(), "use cases generated");
        Ok(use_cases)
    }
}

#[cfg(test)]
mod tests {
    use pipeline::{EngineSize, EpochId, GraphName, GraphSize, Objective, RequirementId};

    use super::*;

    fn analysis() -> SchemaAnalysis {
        SchemaAnalysis {
            graph_name: GraphName::new("customers").unwrap(),
            size: GraphSize {
                vertices: 100,
                edges: 300,
            },
            density: 0.03,
            average_degree: 6.0,
            key_entities: Vec::new(),
            key_relationships: Vec::new(),
            complexity_score: 2.0,
            recommended_engine_size: EngineSize::XSmall,
            summary: String::new(),
        }
    }

    fn requirement(objectives: &[&str]) -> Requirement {
        Requirement {
            id: RequirementId::new_random(),
            epoch_id: EpochId::new_random(),
            domain: "retail".into(),
            summary: String::new(),
            objectives: objectives
                .iter()
                .enumerate()
                .map(|(i, t)| Objective {
                    id: format!("OBJ-{:03}", i + 1),
                    title: (*t).to_string(),
                    description: (*t).to_string(),
                    priority: Priority::High,
                    success_criteria: Vec::new(),
                })
                .collect(),
            source_documents: Vec::new(),
            created_at: Timestamp::now(),
        }
    }

    #[test]
    fn heuristic_classifies_and_dedupes() {
        let req = requirement(&[
            "Find the most influential customers",
            "Rank key accounts",
            "Group customers into segments",
            "Run strongly connected components",
            "Budget review",
        ]);
        let drafts = dedupe(heuristic(&req, &analysis()));
        let algorithms: Vec<AlgorithmKind> = drafts.iter().map(|d| d.algorithm).collect();
        assert_eq!(
            algorithms,
            vec![
                AlgorithmKind::PageRank,
                AlgorithmKind::Louvain,
                AlgorithmKind::Scc
            ]
        );
        assert_eq!(drafts[0].priority, Priority::High);
    }

    #[test]
    fn parses_use_case_lines() {
        let drafts = parse_answer(
            "Use Case: Influencers | PageRank | Target campaigns\n\
             use_case: Rings | quantum walk | nothing\n\
             - Use Case: Households | Louvain",
        );
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].algorithm, AlgorithmKind::PageRank);
        assert_eq!(drafts[0].business_value, "Target campaigns");
        assert_eq!(drafts[1].algorithm, AlgorithmKind::Louvain);
    }
}
