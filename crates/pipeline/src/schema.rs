//! Inputs to a pipeline run and the schema-analysis result.

use serde::{Deserialize, Serialize};

use crate::algorithms::EngineSize;
use crate::{CollectionName, GraphName};

/// A vertex or edge collection of the analysed graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: CollectionName,
    #[serde(default)]
    pub document_count: u64,
    /// Attribute names sampled from the collection.
    #[serde(default)]
    pub attributes: Vec<String>,
}

/// Graph schema as exported by the graph database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphSchema {
    pub database_name: String,
    pub graph_name: GraphName,
    #[serde(default)]
    pub vertex_collections: Vec<CollectionSchema>,
    #[serde(default)]
    pub edge_collections: Vec<CollectionSchema>,
}

impl GraphSchema {
    /// Vertex and edge totals.
    pub fn size(&self) -> GraphSize {
        GraphSize {
            vertices: self.vertex_collections.iter().map(|c| c.document_count).sum(),
            edges: self.edge_collections.iter().map(|c| c.document_count).sum(),
        }
    }
}

/// Vertex and edge totals of a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphSize {
    pub vertices: u64,
    pub edges: u64,
}

impl GraphSize {
    /// Vertices plus edges.
    pub fn total(self) -> u64 {
        self.vertices + self.edges
    }

    /// Mean degree (`2E / V`); zero for an empty vertex set.
    pub fn average_degree(self) -> f64 {
        if self.vertices == 0 {
            0.0
        } else {
            2.0 * self.edges as f64 / self.vertices as f64
        }
    }

    /// Directed density `E / (V (V - 1))`; zero below two vertices.
    pub fn density(self) -> f64 {
        if self.vertices < 2 {
            0.0
        } else {
            let v = self.vertices as f64;
            self.edges as f64 / (v * (v - 1.0))
        }
    }
}

/// A business-requirements document handed to the requirements unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequirementsDocument {
    /// Path or label of the source document.
    pub source: String,
    pub text: String,
}

/// Output of the schema-analysis unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaAnalysis {
    pub graph_name: GraphName,
    pub size: GraphSize,
    pub density: f64,
    pub average_degree: f64,
    /// Vertex collections ordered by document count, largest first.
    pub key_entities: Vec<CollectionName>,
    /// Edge collections ordered by document count, largest first.
    pub key_relationships: Vec<CollectionName>,
    /// 0–10 rough complexity rating.
    pub complexity_score: f64,
    pub recommended_engine_size: EngineSize,
    /// Narrative description (reasoning output or heuristic text).
    pub summary: String,
}
