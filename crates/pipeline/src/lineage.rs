//! Provenance entity models.
//!
//! Five entity kinds form the lineage catalog:
//!
//! ```text
//! Epoch ──contains──▶ Requirement ──▶ UseCase ──▶ Template ──▶ Execution
//!   │                                    ▲            ▲            ▲
//!   └──────────────contains──────────────┴────────────┴────────────┘
//! ```
//!
//! Relationships are carried twice: as foreign-key fields on the child
//! ([`CatalogEntity::lineage_parents`], [`CatalogEntity::epoch_id`]) and as
//! [`Edge`] records in two edge sets. The catalog repository derives the edges
//! from the foreign keys so the two can never disagree.
//!
//! Entities are immutable once created, except the status fields of
//! [`Execution`] and [`Epoch`].

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::algorithms::{AlgorithmKind, AlgorithmParameters, EngineSize, UseCaseKind};
use crate::{
    CollectionName, EpochId, ExecutionId, GraphName, RequirementId, TemplateId, Timestamp,
    UseCaseId,
};

// ---------------------------------------------------------------------------
// Entity references
// ---------------------------------------------------------------------------

/// The five catalog entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Run grouping; root of containment.
    Epoch,
    /// Extracted business need; root of lineage.
    Requirement,
    /// Analysis approach for one or more requirements.
    UseCase,
    /// Parameterised job specification.
    Template,
    /// One run of a template.
    Execution,
}

impl EntityKind {
    /// Every kind, in lineage order.
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Epoch,
        EntityKind::Requirement,
        EntityKind::UseCase,
        EntityKind::Template,
        EntityKind::Execution,
    ];

    /// Position in the derivation chain. Lineage edges only ever go from depth
    /// `n` to depth `n + 1`, which keeps the lineage graph acyclic by
    /// construction. Epochs are outside the chain.
    pub fn lineage_depth(self) -> Option<u8> {
        match self {
            EntityKind::Epoch => None,
            EntityKind::Requirement => Some(0),
            EntityKind::UseCase => Some(1),
            EntityKind::Template => Some(2),
            EntityKind::Execution => Some(3),
        }
    }

    /// Stable lowercase name.
    pub fn as_str(self) -> &'static str {
        match self {
            EntityKind::Epoch => "epoch",
            EntityKind::Requirement => "requirement",
            EntityKind::UseCase => "use_case",
            EntityKind::Template => "template",
            EntityKind::Execution => "execution",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed pointer to any catalog entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity identifier.
    pub id: Uuid,
}

impl EntityRef {
    /// Creates a reference from its parts.
    pub fn new(kind: EntityKind, id: Uuid) -> Self {
        Self { kind, id }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id)
    }
}

macro_rules! entity_ref_from {
    ($id:ty, $kind:expr) => {
        impl From<$id> for EntityRef {
            fn from(id: $id) -> Self {
                EntityRef::new($kind, id.as_uuid())
            }
        }
    };
}

entity_ref_from!(EpochId, EntityKind::Epoch);
entity_ref_from!(RequirementId, EntityKind::Requirement);
entity_ref_from!(UseCaseId, EntityKind::UseCase);
entity_ref_from!(TemplateId, EntityKind::Template);
entity_ref_from!(ExecutionId, EntityKind::Execution);

// ---------------------------------------------------------------------------
// Epoch
// ---------------------------------------------------------------------------

/// Lifecycle of an epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpochStatus {
    /// Accepting new artefacts.
    Active,
    /// Closed; kept for inspection only.
    Archived,
}

/// A time-bounded grouping of one analysis run's artefacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Epoch {
    pub id: EpochId,
    pub name: String,
    pub description: String,
    pub tags: Vec<String>,
    pub status: EpochStatus,
    pub created_at: Timestamp,
}

impl Epoch {
    /// Creates an active epoch with a fresh identifier.
    pub fn new(name: impl Into<String>, description: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            id: EpochId::new_random(),
            name: name.into(),
            description: description.into(),
            tags,
            status: EpochStatus::Active,
            created_at: Timestamp::now(),
        }
    }
}

// ---------------------------------------------------------------------------
// Requirement
// ---------------------------------------------------------------------------

/// Relative importance of an objective or use case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Low,
}

impl Priority {
    /// Lenient parse of free text (`"HIGH"`, `"p1"`, `"critical!"`).
    pub fn parse_lenient(text: &str) -> Option<Priority> {
        let lower = text.trim().to_ascii_lowercase();
        if lower.starts_with("crit") || lower == "p0" {
            Some(Priority::Critical)
        } else if lower.starts_with("high") || lower == "p1" {
            Some(Priority::High)
        } else if lower.starts_with("med") || lower == "p2" {
            Some(Priority::Medium)
        } else if lower.starts_with("low") || lower == "p3" {
            Some(Priority::Low)
        } else {
            None
        }
    }
}

/// One business objective stated by a requirements document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    /// Document-local label, e.g. `"OBJ-001"`.
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub success_criteria: Vec<String>,
}

/// An extracted business need.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    pub id: RequirementId,
    pub epoch_id: EpochId,
    pub domain: String,
    pub summary: String,
    pub objectives: Vec<Objective>,
    pub source_documents: Vec<String>,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Use case
// ---------------------------------------------------------------------------

/// An analysis approach addressing one or more requirements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UseCase {
    pub id: UseCaseId,
    pub epoch_id: EpochId,
    /// Lineage parents. Never empty.
    pub requirement_ids: Vec<RequirementId>,
    pub title: String,
    pub description: String,
    pub kind: UseCaseKind,
    pub algorithm: AlgorithmKind,
    pub business_value: String,
    pub priority: Priority,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Template
// ---------------------------------------------------------------------------

/// Where and how a template runs on the analytics engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    pub graph_name: GraphName,
    pub vertex_collections: Vec<CollectionName>,
    pub edge_collections: Vec<CollectionName>,
    pub engine_size: EngineSize,
    pub store_results: bool,
    pub result_collection: Option<CollectionName>,
}

/// A concrete, parameterised job specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub id: TemplateId,
    pub epoch_id: EpochId,
    /// Lineage parent.
    pub use_case_id: UseCaseId,
    /// Root requirement; must be one of the parent use case's requirements.
    pub requirement_id: RequirementId,
    pub name: String,
    pub description: String,
    pub algorithm: AlgorithmKind,
    pub parameters: AlgorithmParameters,
    pub graph_config: GraphConfig,
    pub estimated_runtime_seconds: Option<f64>,
    pub created_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Execution lifecycle: `pending → running → completed | failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// Whether the lifecycle allows moving from `self` to `next`.
    ///
    /// A pending execution may fail without ever running (e.g. the engine
    /// rejected the submission).
    pub fn can_transition_to(self, next: ExecutionStatus) -> bool {
        matches!(
            (self, next),
            (ExecutionStatus::Pending, ExecutionStatus::Running)
                | (ExecutionStatus::Pending, ExecutionStatus::Failed)
                | (ExecutionStatus::Running, ExecutionStatus::Completed)
                | (ExecutionStatus::Running, ExecutionStatus::Failed)
        )
    }

    /// `completed` and `failed` are terminal.
    pub fn is_terminal(self) -> bool {
        matches!(self, ExecutionStatus::Completed | ExecutionStatus::Failed)
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        })
    }
}

/// Resource usage reported for an execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub execution_time_seconds: f64,
    pub memory_usage_mb: Option<f64>,
    pub vertex_count: Option<u64>,
    pub edge_count: Option<u64>,
}

/// One run of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub epoch_id: EpochId,
    /// Lineage parent.
    pub template_id: TemplateId,
    pub use_case_id: UseCaseId,
    pub requirement_id: RequirementId,
    pub algorithm: AlgorithmKind,
    pub status: ExecutionStatus,
    pub result_count: u64,
    pub performance_metrics: PerformanceMetrics,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Execution {
    /// A pending execution for `template`, with foreign keys copied from it.
    pub fn pending_for(template: &Template) -> Self {
        let now = Timestamp::now();
        Self {
            id: ExecutionId::new_random(),
            epoch_id: template.epoch_id,
            template_id: template.id,
            use_case_id: template.use_case_id,
            requirement_id: template.requirement_id,
            algorithm: template.algorithm,
            status: ExecutionStatus::Pending,
            result_count: 0,
            performance_metrics: PerformanceMetrics::default(),
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Entity union
// ---------------------------------------------------------------------------

/// Any catalog document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "entity", rename_all = "snake_case")]
pub enum CatalogEntity {
    Epoch(Epoch),
    Requirement(Requirement),
    UseCase(UseCase),
    Template(Template),
    Execution(Execution),
}

impl CatalogEntity {
    /// Typed pointer to this entity.
    pub fn entity_ref(&self) -> EntityRef {
        match self {
            CatalogEntity::Epoch(e) => e.id.into(),
            CatalogEntity::Requirement(r) => r.id.into(),
            CatalogEntity::UseCase(u) => u.id.into(),
            CatalogEntity::Template(t) => t.id.into(),
            CatalogEntity::Execution(x) => x.id.into(),
        }
    }

    /// Kind of this entity.
    pub fn kind(&self) -> EntityKind {
        self.entity_ref().kind
    }

    /// Containing epoch (foreign key). `None` for epochs themselves.
    pub fn epoch_id(&self) -> Option<EpochId> {
        match self {
            CatalogEntity::Epoch(_) => None,
            CatalogEntity::Requirement(r) => Some(r.epoch_id),
            CatalogEntity::UseCase(u) => Some(u.epoch_id),
            CatalogEntity::Template(t) => Some(t.epoch_id),
            CatalogEntity::Execution(x) => Some(x.epoch_id),
        }
    }

    /// Lineage parents derived from foreign keys.
    pub fn lineage_parents(&self) -> Vec<EntityRef> {
        match self {
            CatalogEntity::Epoch(_) | CatalogEntity::Requirement(_) => Vec::new(),
            CatalogEntity::UseCase(u) => u.requirement_ids.iter().map(|&id| id.into()).collect(),
            CatalogEntity::Template(t) => vec![t.use_case_id.into()],
            CatalogEntity::Execution(x) => vec![x.template_id.into()],
        }
    }

    /// Creation time.
    pub fn created_at(&self) -> Timestamp {
        match self {
            CatalogEntity::Epoch(e) => e.created_at,
            CatalogEntity::Requirement(r) => r.created_at,
            CatalogEntity::UseCase(u) => u.created_at,
            CatalogEntity::Template(t) => t.created_at,
            CatalogEntity::Execution(x) => x.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Edges
// ---------------------------------------------------------------------------

/// The two edge collections of the provenance graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeSet {
    /// Requirement → UseCase → Template → Execution.
    Lineage,
    /// Epoch → {Requirement, UseCase, Template, Execution}.
    EpochContainment,
}

/// A directed edge record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub set: EdgeSet,
    pub from: EntityRef,
    pub to: EntityRef,
}

impl Edge {
    /// A lineage edge `parent → child`.
    pub fn lineage(parent: EntityRef, child: EntityRef) -> Self {
        Self {
            set: EdgeSet::Lineage,
            from: parent,
            to: child,
        }
    }

    /// A containment edge `epoch → member`.
    pub fn containment(epoch: EpochId, member: EntityRef) -> Self {
        Self {
            set: EdgeSet::EpochContainment,
            from: epoch.into(),
            to: member,
        }
    }

    /// Every edge implied by the foreign keys of `entity`.
    pub fn implied_by(entity: &CatalogEntity) -> Vec<Edge> {
        let me = entity.entity_ref();
        let mut edges: Vec<Edge> = entity
            .lineage_parents()
            .into_iter()
            .map(|parent| Edge::lineage(parent, me))
            .collect();
        if let Some(epoch) = entity.epoch_id() {
            edges.push(Edge::containment(epoch, me));
        }
        edges
    }
}

// ---------------------------------------------------------------------------
// Query shapes
// ---------------------------------------------------------------------------

/// Traversal direction over lineage edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Parent to child (towards executions).
    Forward,
    /// Child to parent (towards requirements).
    Backward,
}

/// The full derivation chain of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLineage {
    pub requirement: Option<Requirement>,
    pub use_case: Option<UseCase>,
    pub template: Option<Template>,
    pub execution: Execution,
}

impl ExecutionLineage {
    /// Whether every link of the chain resolved.
    pub fn is_complete(&self) -> bool {
        self.requirement.is_some() && self.use_case.is_some() && self.template.is_some()
    }
}
