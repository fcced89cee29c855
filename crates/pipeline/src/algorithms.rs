//! Algorithm catalogue and per-algorithm strategy table.
//!
//! Each [`AlgorithmKind`] maps to exactly one [`AlgorithmProfile`] in
//! [`PROFILES`]. Defaults, runtime estimation and heuristic insight generation
//! all go through the profile; adding an algorithm means adding one variant
//! and one table entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::insights::heuristics::{
    centrality_insights, community_insights, connectivity_insights, path_insights, ResultSummary,
};
use crate::insights::Insight;
use crate::schema::GraphSize;

/// Free-form algorithm parameters as accepted by the analytics engine.
pub type AlgorithmParameters = Map<String, Value>;

/// Graph algorithms the analytics engine can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmKind {
    #[serde(rename = "pagerank")]
    PageRank,
    Louvain,
    ShortestPath,
    BetweennessCentrality,
    ClosenessCentrality,
    LabelPropagation,
    Wcc,
    Scc,
}

/// Coarse grouping used to pick an insight strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmFamily {
    Centrality,
    Community,
    Pathfinding,
    Connectivity,
}

/// Pure function turning result statistics into candidate insights.
pub type InsightStrategy = fn(AlgorithmKind, &ResultSummary) -> Vec<Insight>;

/// Everything the pipeline knows about one algorithm.
pub struct AlgorithmProfile {
    pub kind: AlgorithmKind,
    pub name: &'static str,
    pub family: AlgorithmFamily,
    /// Extra spellings recognised in free text, lowercase.
    pub aliases: &'static [&'static str],
    pub default_parameters: fn() -> AlgorithmParameters,
    /// Estimated seconds per 10k graph elements.
    pub runtime_factor: f64,
    /// Floor for runtime estimates.
    pub min_runtime_seconds: f64,
    pub insights: InsightStrategy,
}

fn object(value: Value) -> AlgorithmParameters {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn pagerank_defaults() -> AlgorithmParameters {
    object(json!({ "damping_factor": 0.85, "threshold": 0.0001, "max_iterations": 100 }))
}

fn louvain_defaults() -> AlgorithmParameters {
    object(json!({ "resolution": 1.0, "min_community_size": 2 }))
}

fn shortest_path_defaults() -> AlgorithmParameters {
    object(json!({ "direction": "outbound" }))
}

fn centrality_defaults() -> AlgorithmParameters {
    object(json!({ "normalized": true }))
}

fn label_propagation_defaults() -> AlgorithmParameters {
    object(json!({ "max_iterations": 100 }))
}

fn no_parameters() -> AlgorithmParameters {
    Map::new()
}

/// The strategy table. Order matches [`AlgorithmKind`] declaration order.
pub static PROFILES: [AlgorithmProfile; 8] = [
    AlgorithmProfile {
        kind: AlgorithmKind::PageRank,
        name: "pagerank",
        family: AlgorithmFamily::Centrality,
        aliases: &["pagerank", "page rank", "page_rank"],
        default_parameters: pagerank_defaults,
        runtime_factor: 1.0,
        min_runtime_seconds: 1.0,
        insights: centrality_insights,
    },
    AlgorithmProfile {
        kind: AlgorithmKind::Louvain,
        name: "louvain",
        family: AlgorithmFamily::Community,
        aliases: &["louvain", "modularity"],
        default_parameters: louvain_defaults,
        runtime_factor: 1.5,
        min_runtime_seconds: 2.0,
        insights: community_insights,
    },
    AlgorithmProfile {
        kind: AlgorithmKind::ShortestPath,
        name: "shortest_path",
        family: AlgorithmFamily::Pathfinding,
        aliases: &["shortest path", "shortest_path", "dijkstra"],
        default_parameters: shortest_path_defaults,
        runtime_factor: 0.5,
        min_runtime_seconds: 1.0,
        insights: path_insights,
    },
    AlgorithmProfile {
        kind: AlgorithmKind::BetweennessCentrality,
        name: "betweenness_centrality",
        family: AlgorithmFamily::Centrality,
        aliases: &["betweenness", "betweenness_centrality", "bridge"],
        default_parameters: centrality_defaults,
        runtime_factor: 4.0,
        min_runtime_seconds: 5.0,
        insights: centrality_insights,
    },
    AlgorithmProfile {
        kind: AlgorithmKind::ClosenessCentrality,
        name: "closeness_centrality",
        family: AlgorithmFamily::Centrality,
        aliases: &["closeness", "closeness_centrality"],
        default_parameters: centrality_defaults,
        runtime_factor: 3.0,
        min_runtime_seconds: 5.0,
        insights: centrality_insights,
    },
    AlgorithmProfile {
        kind: AlgorithmKind::LabelPropagation,
        name: "label_propagation",
        family: AlgorithmFamily::Community,
        aliases: &["label propagation", "label_propagation"],
        default_parameters: label_propagation_defaults,
        runtime_factor: 1.0,
        min_runtime_seconds: 1.0,
        insights: community_insights,
    },
    AlgorithmProfile {
        kind: AlgorithmKind::Wcc,
        name: "wcc",
        family: AlgorithmFamily::Connectivity,
        aliases: &["wcc", "weakly connected", "connected component"],
        default_parameters: no_parameters,
        runtime_factor: 0.5,
        min_runtime_seconds: 1.0,
        insights: connectivity_insights,
    },
    AlgorithmProfile {
        kind: AlgorithmKind::Scc,
        name: "scc",
        family: AlgorithmFamily::Connectivity,
        aliases: &["scc", "strongly connected"],
        default_parameters: no_parameters,
        runtime_factor: 0.8,
        min_runtime_seconds: 1.0,
        insights: connectivity_insights,
    },
];

impl AlgorithmKind {
    /// Every algorithm, in table order.
    pub const ALL: [AlgorithmKind; 8] = [
        AlgorithmKind::PageRank,
        AlgorithmKind::Louvain,
        AlgorithmKind::ShortestPath,
        AlgorithmKind::BetweennessCentrality,
        AlgorithmKind::ClosenessCentrality,
        AlgorithmKind::LabelPropagation,
        AlgorithmKind::Wcc,
        AlgorithmKind::Scc,
    ];

    /// The strategy-table entry for this algorithm.
    pub fn profile(self) -> &'static AlgorithmProfile {
        &PROFILES[self as usize]
    }

    /// Canonical engine name, e.g. `"pagerank"`.
    pub fn name(self) -> &'static str {
        self.profile().name
    }

    pub fn family(self) -> AlgorithmFamily {
        self.profile().family
    }

    pub fn default_parameters(self) -> AlgorithmParameters {
        (self.profile().default_parameters)()
    }

    /// Runs this algorithm's heuristic insight strategy.
    pub fn heuristic_insights(self, summary: &ResultSummary) -> Vec<Insight> {
        (self.profile().insights)(self, summary)
    }

    /// Finds the first algorithm mentioned anywhere in `text`.
    ///
    /// The earliest mention wins; among aliases starting at the same
    /// position the longest wins, so `"strongly connected components"` is
    /// SCC rather than WCC.
    pub fn detect(text: &str) -> Option<AlgorithmKind> {
        let lower = text.to_ascii_lowercase();
        PROFILES
            .iter()
            .flat_map(|p| p.aliases.iter().map(move |a| (*a, p.kind)))
            .filter_map(|(alias, kind)| lower.find(alias).map(|pos| (pos, alias.len(), kind)))
            .min_by_key(|&(pos, len, _)| (pos, std::cmp::Reverse(len)))
            .map(|(_, _, kind)| kind)
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AlgorithmKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        PROFILES
            .iter()
            .find(|p| {
                p.name == normalised
                    || p.aliases.iter().any(|a| a.replace(' ', "_") == normalised)
            })
            .map(|p| p.kind)
            .ok_or_else(|| format!("unknown algorithm '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Use-case kinds
// ---------------------------------------------------------------------------

/// Category of analysis a use case asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UseCaseKind {
    Centrality,
    Community,
    Pathfinding,
    Connectivity,
}

impl UseCaseKind {
    pub const ALL: [UseCaseKind; 4] = [
        UseCaseKind::Centrality,
        UseCaseKind::Community,
        UseCaseKind::Pathfinding,
        UseCaseKind::Connectivity,
    ];

    /// Candidate algorithms, preferred first. Never empty.
    pub fn algorithms(self) -> &'static [AlgorithmKind] {
        match self {
            UseCaseKind::Centrality => &[
                AlgorithmKind::PageRank,
                AlgorithmKind::BetweennessCentrality,
                AlgorithmKind::ClosenessCentrality,
            ],
            UseCaseKind::Community => &[
                AlgorithmKind::Louvain,
                AlgorithmKind::LabelPropagation,
                AlgorithmKind::Wcc,
            ],
            UseCaseKind::Pathfinding => &[AlgorithmKind::ShortestPath],
            UseCaseKind::Connectivity => &[AlgorithmKind::Wcc, AlgorithmKind::Scc],
        }
    }

    /// Lowercase keywords that suggest this kind in objective text.
    pub fn keywords(self) -> &'static [&'static str] {
        match self {
            UseCaseKind::Centrality => &[
                "influen", "central", "important", "key ", "top ", "rank", "hub", "critical node",
            ],
            UseCaseKind::Community => &[
                "communit", "cluster", "segment", "group", "household", "cohort",
            ],
            UseCaseKind::Pathfinding => &["path", "route", "shortest", "distance", "reach"],
            UseCaseKind::Connectivity => &[
                "connect", "component", "fragment", "isolat", "island", "fraud ring",
            ],
        }
    }

    /// Kind implied by an algorithm.
    pub fn for_algorithm(algorithm: AlgorithmKind) -> UseCaseKind {
        match algorithm.family() {
            AlgorithmFamily::Centrality => UseCaseKind::Centrality,
            AlgorithmFamily::Community => UseCaseKind::Community,
            AlgorithmFamily::Pathfinding => UseCaseKind::Pathfinding,
            AlgorithmFamily::Connectivity => UseCaseKind::Connectivity,
        }
    }

    /// Classifies free text by keyword; `None` when nothing matches.
    pub fn classify(text: &str) -> Option<UseCaseKind> {
        let lower = format!("{} ", text.to_ascii_lowercase());
        Self::ALL
            .into_iter()
            .find(|kind| kind.keywords().iter().any(|k| lower.contains(k)))
    }
}

// ---------------------------------------------------------------------------
// Engine sizing
// ---------------------------------------------------------------------------

/// Analytics engine deployment size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineSize {
    XSmall,
    Small,
    Medium,
    Large,
    XLarge,
}

impl EngineSize {
    /// Recommends a size from vertex+edge totals: below 1k `xsmall`, below
    /// 10k `small`, below 100k `medium`, below 1M `large`, else `xlarge`.
    pub fn recommend(size: GraphSize) -> EngineSize {
        match size.total() {
            t if t < 1_000 => EngineSize::XSmall,
            t if t < 10_000 => EngineSize::Small,
            t if t < 100_000 => EngineSize::Medium,
            t if t < 1_000_000 => EngineSize::Large,
            _ => EngineSize::XLarge,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineSize::XSmall => "xsmall",
            EngineSize::Small => "small",
            EngineSize::Medium => "medium",
            EngineSize::Large => "large",
            EngineSize::XLarge => "xlarge",
        }
    }
}

// ---------------------------------------------------------------------------
// Parameter optimisation and runtime estimation
// ---------------------------------------------------------------------------

/// Adjusts parameters to the size and shape of the target graph.
///
/// Parameters explicitly present in `params` are only overridden by the rules
/// below; anything else passes through untouched.
pub fn optimize_parameters(
    algorithm: AlgorithmKind,
    mut params: AlgorithmParameters,
    size: Option<GraphSize>,
) -> AlgorithmParameters {
    let Some(size) = size else {
        return params;
    };
    let total = size.total();
    match algorithm {
        AlgorithmKind::PageRank => {
            if total < 1_000 {
                params.insert("max_iterations".into(), json!(150));
            } else if total > 100_000 {
                params.insert("max_iterations".into(), json!(50));
            }
            if size.average_degree() > 10.0 {
                let relaxed = params
                    .get("threshold")
                    .and_then(Value::as_f64)
                    .map_or(0.001, |t| (t * 10.0).min(0.01));
                params.insert("threshold".into(), json!(relaxed));
            }
        }
        AlgorithmKind::Louvain => {
            if total > 50_000 {
                params.insert("resolution".into(), json!(1.5));
                params.insert("min_community_size".into(), json!(5));
            }
        }
        _ => {}
    }
    params
}

/// Estimated runtime in seconds; `None` without graph statistics.
pub fn estimate_runtime_seconds(algorithm: AlgorithmKind, size: Option<GraphSize>) -> Option<f64> {
    let size = size?;
    let profile = algorithm.profile();
    let estimate = 1.0 + profile.runtime_factor * size.total() as f64 / 10_000.0;
    Some(estimate.max(profile.min_runtime_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(vertices: u64, edges: u64) -> Option<GraphSize> {
        Some(GraphSize { vertices, edges })
    }

    #[test]
    fn table_order_matches_enum() {
        for kind in AlgorithmKind::ALL {
            assert_eq!(kind.profile().kind, kind);
        }
    }

    #[test]
    fn names_round_trip_through_from_str() {
        for kind in AlgorithmKind::ALL {
            assert_eq!(kind.name().parse::<AlgorithmKind>().unwrap(), kind);
        }
        assert_eq!(
            "Label Propagation".parse::<AlgorithmKind>().unwrap(),
            AlgorithmKind::LabelPropagation
        );
        assert!("quantum walk".parse::<AlgorithmKind>().is_err());
    }

    #[test]
    fn serde_names_match_engine_names() {
        for kind in AlgorithmKind::ALL {
            assert_eq!(serde_json::to_value(kind).unwrap(), json!(kind.name()));
        }
    }

    #[test]
    fn detect_prefers_earliest_mention() {
        assert_eq!(
            AlgorithmKind::detect("run Strongly Connected components"),
            Some(AlgorithmKind::Scc)
        );
        assert_eq!(
            AlgorithmKind::detect("use PageRank to rank"),
            Some(AlgorithmKind::PageRank)
        );
        assert_eq!(AlgorithmKind::detect("nothing here"), None);
    }

    #[test]
    fn defaults() {
        let pr = AlgorithmKind::PageRank.default_parameters();
        assert_eq!(pr["damping_factor"], json!(0.85));
        assert_eq!(AlgorithmKind::Louvain.default_parameters()["resolution"], json!(1.0));
        assert_eq!(
            AlgorithmKind::ShortestPath.default_parameters()["direction"],
            json!("outbound")
        );
        assert_eq!(
            AlgorithmKind::BetweennessCentrality.default_parameters()["normalized"],
            json!(true)
        );
        assert!(AlgorithmKind::Wcc.default_parameters().is_empty());
    }

    #[test]
    fn every_use_case_kind_has_algorithms() {
        for kind in UseCaseKind::ALL {
            assert!(!kind.algorithms().is_empty());
        }
        assert!(UseCaseKind::Community
            .algorithms()
            .contains(&AlgorithmKind::LabelPropagation));
    }

    #[test]
    fn classify_objectives() {
        assert_eq!(
            UseCaseKind::classify("Identify the most influential customers"),
            Some(UseCaseKind::Centrality)
        );
        assert_eq!(
            UseCaseKind::classify("Segment buyers into communities"),
            Some(UseCaseKind::Community)
        );
        assert_eq!(UseCaseKind::classify("Lower costs"), None);
    }

    #[test]
    fn engine_size_boundaries() {
        let rec = |v, e| EngineSize::recommend(GraphSize { vertices: v, edges: e });
        assert_eq!(rec(100, 200), EngineSize::XSmall);
        assert_eq!(rec(500, 499), EngineSize::XSmall);
        assert_eq!(rec(500, 500), EngineSize::Small);
        assert_eq!(rec(5_000, 4_999), EngineSize::Small);
        assert_eq!(rec(5_000, 5_000), EngineSize::Medium);
        assert_eq!(rec(100_000, 500_000), EngineSize::Large);
        assert_eq!(rec(1_000_000, 5_000_000), EngineSize::XLarge);
        assert_eq!(rec(100, 50_000), EngineSize::Medium);
        assert_eq!(rec(0, 100), EngineSize::XSmall);
    }

    #[test]
    fn pagerank_iterations_follow_graph_size() {
        let small = optimize_parameters(
            AlgorithmKind::PageRank,
            AlgorithmKind::PageRank.default_parameters(),
            size(500, 200),
        );
        assert_eq!(small["max_iterations"], json!(150));

        let large = optimize_parameters(
            AlgorithmKind::PageRank,
            AlgorithmKind::PageRank.default_parameters(),
            size(50_000, 200_000),
        );
        assert!(large["max_iterations"].as_i64().unwrap() < 100);
    }

    #[test]
    fn dense_graphs_relax_pagerank_threshold() {
        let params = optimize_parameters(
            AlgorithmKind::PageRank,
            AlgorithmKind::PageRank.default_parameters(),
            size(1_000, 10_000),
        );
        assert!((params["threshold"].as_f64().unwrap() - 0.001).abs() < 1e-12);
    }

    #[test]
    fn louvain_scales_for_large_graphs() {
        let params = optimize_parameters(
            AlgorithmKind::Louvain,
            AlgorithmKind::Louvain.default_parameters(),
            size(20_000, 50_000),
        );
        assert_eq!(params["resolution"], json!(1.5));
        assert!(params["min_community_size"].as_i64().unwrap() > 2);
    }

    #[test]
    fn runtime_estimates() {
        let s = size(5_000, 15_000);
        let pr = estimate_runtime_seconds(AlgorithmKind::PageRank, s).unwrap();
        assert!(pr > 0.0 && pr < 100.0);
        let bc = estimate_runtime_seconds(AlgorithmKind::BetweennessCentrality, s).unwrap();
        assert!(bc >= 5.0);
        assert!(estimate_runtime_seconds(AlgorithmKind::PageRank, None).is_none());
    }
}
