//! Schema analysis: graph statistics plus a narrative summary.

use async_trait::async_trait;
use pipeline::{
    CollectionName, CollectionSchema, EngineSize, GraphSchema, SchemaAnalysis, StageError,
    StageFailure, StageKind,
};
use tracing::{info, instrument};

use crate::unit::{prompt_header, CapabilityUnit, StageContext};

/// Summarises the analysed graph. Produces no catalog entity.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaAnalysisUnit;

fn by_size(collections: &[CollectionSchema]) -> Vec<CollectionName> {
    let mut sorted: Vec<&CollectionSchema> = collections.iter().collect();
    sorted.sort_by(|a, b| {
        b.document_count
            .cmp(&a.document_count)
            .then_with(|| a.name.as_str().cmp(b.name.as_str()))
    });
    sorted.into_iter().map(|c| c.name.clone()).collect()
}

/// 0–10 rating from element count, collection count and degree.
fn complexity_score(schema: &GraphSchema) -> f64 {
    let size = schema.size();
    let collections = (schema.vertex_collections.len() + schema.edge_collections.len()) as f64;
    let raw = ((size.total() as f64) + 1.0).log10() * 1.5
        + collections * 0.25
        + size.average_degree().ln_1p();
    (raw.min(10.0) * 10.0).round() / 10.0
}

fn heuristic_summary(schema: &GraphSchema) -> String {
    let size = schema.size();
    format!(
        "Graph '{}' in database '{}' holds {} vertices and {} edges across {} vertex and {} edge \
         collections (density {:.6}, average degree {:.2}).",
        schema.graph_name,
        schema.database_name,
        size.vertices,
        size.edges,
        schema.vertex_collections.len(),
        schema.edge_collections.len(),
        size.density(),
        size.average_degree()
    )
}

fn prompt(schema: &GraphSchema) -> String {
    let describe = |collections: &[CollectionSchema]| {
        collections
            .iter()
            .map(|c| {
                format!(
                    "- {} ({} documents; attributes: {})",
                    c.name,
                    c.document_count,
                    c.attributes.join(", ")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    };
    format!(
        "{}Describe this graph for a business analyst in one paragraph: what the entities are, \
         how they relate, and which analyses it can support.\n\nVertex collections:\n{}\n\nEdge collections:\n{}\n",
        prompt_header(StageKind::SchemaAnalysis),
        describe(&schema.vertex_collections),
        describe(&schema.edge_collections)
    )
}

#[async_trait]
impl CapabilityUnit for SchemaAnalysisUnit {
    type Input = GraphSchema;
    type Output = SchemaAnalysis;

    const STAGE: StageKind = StageKind::SchemaAnalysis;

    #[instrument(skip_all, fields(run_id = %ctx.run_id, stage = %Self::STAGE, graph = %schema.graph_name))]
    async fn execute_async(
        &self,
        schema: &GraphSchema,
        ctx: &StageContext,
    ) -> Result<SchemaAnalysis, StageError> {
        if schema.vertex_collections.is_empty() {
            return Err(StageError::new(
                Self::STAGE,
                StageFailure::NoUsableOutput {
                    reason: format!("graph '{}' has no vertex collections", schema.graph_name),
                },
            ));
        }

        let size = schema.size();
        let summary = match ctx
            .gateway
            .reason(Self::STAGE, &prompt(schema), Self::REASONING_ATTEMPTS)
            .await
        {
            Some(text) => text.trim().to_string(),
            None => heuristic_summary(schema),
        };

        let analysis = SchemaAnalysis {
            graph_name: schema.graph_name.clone(),
            size,
            density: size.density(),
            average_degree: size.average_degree(),
            key_entities: by_size(&schema.vertex_collections),
            key_relationships: by_size(&schema.edge_collections),
            complexity_score: complexity_score(schema),
            recommended_engine_size: EngineSize::recommend(size),
            summary,
        };
        info!(
            vertices = size.vertices,
            edges = size.edges,
            engine_size = analysis.recommended_engine_size.as_str(),
            "schema analysed"
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use pipeline::GraphName;

    use super::*;

    fn collection(name: &str, count: u64) -> CollectionSchema {
        CollectionSchema {
            name: CollectionName::new(name).unwrap(),
            document_count: count,
            attributes: Vec::new(),
        }
    }

    #[test]
    fn collections_are_ranked_by_size() {
        let ranked = by_size(&[collection("a", 5), collection("b", 50), collection("c", 5)]);
        let names: Vec<&str> = ranked.iter().map(CollectionName::as_str).collect();
        assert_eq!(names, vec!["b", "a", "c"]);
    }

    #[test]
    fn complexity_is_bounded() {
        let schema = GraphSchema {
            database_name: "db".into(),
            graph_name: GraphName::new("g").unwrap(),
            vertex_collections: (0..50).map(|i| collection(&format!("v{i}"), 1_000_000)).collect(),
            edge_collections: vec![collection("e", 900_000_000)],
        };
        let score = complexity_score(&schema);
        assert!((0.0..=10.0).contains(&score));
    }
}
