//! The lineage catalog repository.
//!
//! [`LineageCatalog`] is the only writer of catalog state. Every write is
//! checked against the current contents and then committed as one
//! [`WriteBatch`]:
//!
//! | Write | Batch contents |
//! |-------|----------------|
//! | `track_*` | entity + lineage edge(s) to parent(s) + containment edge from epoch |
//! | `update_execution_status` | replaced execution |
//! | `delete` | entity removal + every edge pointing at it |
//!
//! Edges are derived from foreign keys ([`Edge::implied_by`]) and lineage
//! edges may only connect depth `n` to depth `n + 1`, so the lineage graph
//! stays acyclic and in agreement with the entity fields.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use pipeline::{
    CatalogEntity, CatalogError, Direction, Edge, EdgeSet, EntityKind, EntityRef, Epoch, EpochId,
    EpochStatus, Execution, ExecutionId, ExecutionLineage, ExecutionStatus, PerformanceMetrics,
    Requirement, RequirementId, Template, TemplateId, Timestamp, UseCase, UseCaseId,
};
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::backend::{CatalogBackend, Mutation, WriteBatch};
use crate::memory::MemoryBackend;
use crate::stats::{CatalogStatistics, EpochStatistics, ExecutionSummary, ImpactReport};

/// Fields that may change together with an execution's status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionUpdate {
    pub result_count: Option<u64>,
    pub performance_metrics: Option<PerformanceMetrics>,
    pub error: Option<String>,
}

/// Provenance graph over epochs, requirements, use cases, templates and
/// executions.
pub struct LineageCatalog {
    backend: Arc<dyn CatalogBackend>,
    // Serialises check-then-commit sequences.
    writer: Mutex<()>,
}

impl std::fmt::Debug for LineageCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineageCatalog").finish_non_exhaustive()
    }
}

impl LineageCatalog {
    pub fn new(backend: Arc<dyn CatalogBackend>) -> Self {
        Self {
            backend,
            writer: Mutex::new(()),
        }
    }

    /// A catalog over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    async fn write_guard(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().await
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetches any entity.
    ///
    /// # Errors
    ///
    /// [`CatalogError::NotFound`] when absent.
    pub async fn get(&self, entity: EntityRef) -> Result<CatalogEntity, CatalogError> {
        self.backend
            .get(entity)
            .await?
            .ok_or(CatalogError::NotFound { entity })
    }

    async fn typed<T>(
        &self,
        entity: EntityRef,
        pick: fn(CatalogEntity) -> Option<T>,
    ) -> Result<T, CatalogError> {
        pick(self.get(entity).await?).ok_or(CatalogError::NotFound { entity })
    }

    pub async fn epoch(&self, id: EpochId) -> Result<Epoch, CatalogError> {
        self.typed(id.into(), |e| match e {
            CatalogEntity::Epoch(x) => Some(x),
            _ => None,
        })
        .await
    }

    pub async fn requirement(&self, id: RequirementId) -> Result<Requirement, CatalogError> {
        self.typed(id.into(), |e| match e {
            CatalogEntity::Requirement(x) => Some(x),
            _ => None,
        })
        .await
    }

    pub async fn use_case(&self, id: UseCaseId) -> Result<UseCase, CatalogError> {
        self.typed(id.into(), |e| match e {
            CatalogEntity::UseCase(x) => Some(x),
            _ => None,
        })
        .await
    }

    pub async fn template(&self, id: TemplateId) -> Result<Template, CatalogError> {
        self.typed(id.into(), |e| match e {
            CatalogEntity::Template(x) => Some(x),
            _ => None,
        })
        .await
    }

    pub async fn execution(&self, id: ExecutionId) -> Result<Execution, CatalogError> {
        self.typed(id.into(), |e| match e {
            CatalogEntity::Execution(x) => Some(x),
            _ => None,
        })
        .await
    }

    /// Every epoch, ordered by identifier.
    pub async fn epochs(&self) -> Result<Vec<Epoch>, CatalogError> {
        Ok(self
            .backend
            .list(EntityKind::Epoch)
            .await?
            .into_iter()
            .filter_map(|e| match e {
                CatalogEntity::Epoch(x) => Some(x),
                _ => None,
            })
            .collect())
    }

    async fn executions(&self) -> Result<Vec<Execution>, CatalogError> {
        Ok(self
            .backend
            .list(EntityKind::Execution)
            .await?
            .into_iter()
            .filter_map(|e| match e {
                CatalogEntity::Execution(x) => Some(x),
                _ => None,
            })
            .collect())
    }

    // -----------------------------------------------------------------------
    // Epochs
    // -----------------------------------------------------------------------

    /// Stores a new epoch.
    pub async fn create_epoch(&self, epoch: Epoch) -> Result<EpochId, CatalogError> {
        let _guard = self.write_guard().await;
        let id = epoch.id;
        let mut batch = WriteBatch::new();
        batch.push(Mutation::Insert(CatalogEntity::Epoch(epoch)));
        self.backend.commit(batch).await?;
        info!(epoch_id = %id, "created epoch");
        Ok(id)
    }

    /// Returns the active epoch called `name`, creating it if none exists.
    pub async fn ensure_epoch(
        &self,
        name: &str,
        description: &str,
        tags: Vec<String>,
    ) -> Result<Epoch, CatalogError> {
        let _guard = self.write_guard().await;
        if let Some(existing) = self
            .epochs()
            .await?
            .into_iter()
            .find(|e| e.status == EpochStatus::Active && e.name == name)
        {
            debug!(epoch_id = %existing.id, name, "reusing active epoch");
            return Ok(existing);
        }
        let epoch = Epoch::new(name, description, tags);
        let mut batch = WriteBatch::new();
        batch.push(Mutation::Insert(CatalogEntity::Epoch(epoch.clone())));
        self.backend.commit(batch).await?;
        info!(epoch_id = %epoch.id, name, "created epoch");
        Ok(epoch)
    }

    /// Closes an epoch to further writes.
    pub async fn archive_epoch(&self, id: EpochId) -> Result<Epoch, CatalogError> {
        let _guard = self.write_guard().await;
        let mut epoch = self.epoch(id).await?;
        epoch.status = EpochStatus::Archived;
        let mut batch = WriteBatch::new();
        batch.push(Mutation::Replace(CatalogEntity::Epoch(epoch.clone())));
        self.backend.commit(batch).await?;
        info!(epoch_id = %id, "archived epoch");
        Ok(epoch)
    }

    // -----------------------------------------------------------------------
    // Tracked writes
    // -----------------------------------------------------------------------

    pub async fn track_requirement(
        &self,
        requirement: Requirement,
    ) -> Result<RequirementId, CatalogError> {
        let id = requirement.id;
        self.create(CatalogEntity::Requirement(requirement)).await?;
        Ok(id)
    }

    pub async fn track_use_case(&self, use_case: UseCase) -> Result<UseCaseId, CatalogError> {
        let id = use_case.id;
        self.create(CatalogEntity::UseCase(use_case)).await?;
        Ok(id)
    }

    pub async fn track_template(&self, template: Template) -> Result<TemplateId, CatalogError> {
        let id = template.id;
        self.create(CatalogEntity::Template(template)).await?;
        Ok(id)
    }

    pub async fn track_execution(&self, execution: Execution) -> Result<ExecutionId, CatalogError> {
        let id = execution.id;
        self.create(CatalogEntity::Execution(execution)).await?;
        Ok(id)
    }

    /// Writes a non-epoch entity together with all edges its foreign keys
    /// imply, in one batch.
    async fn create(&self, entity: CatalogEntity) -> Result<(), CatalogError> {
        let _guard = self.write_guard().await;
        self.check_new(&entity).await?;
        let edges = Edge::implied_by(&entity);
        let me = entity.entity_ref();
        let mut batch = WriteBatch::new();
        batch.push(Mutation::Insert(entity));
        for edge in &edges {
            batch.push(Mutation::InsertEdge(*edge));
        }
        self.backend.commit(batch).await?;
        debug!(entity = %me, edges = edges.len(), "tracked entity");
        Ok(())
    }

    async fn require_parent(
        &self,
        child: EntityRef,
        parent: EntityRef,
    ) -> Result<CatalogEntity, CatalogError> {
        self.backend
            .get(parent)
            .await?
            .ok_or_else(|| CatalogError::IntegrityViolation {
                message: format!("{child} references missing {parent}"),
            })
    }

    async fn check_new(&self, entity: &CatalogEntity) -> Result<(), CatalogError> {
        let me = entity.entity_ref();
        if self.backend.get(me).await?.is_some() {
            return Err(CatalogError::DuplicateId { entity: me });
        }

        let Some(epoch_id) = entity.epoch_id() else {
            return Err(CatalogError::IntegrityViolation {
                message: format!("{me} must be created through the epoch operations"),
            });
        };
        match self.require_parent(me, epoch_id.into()).await? {
            CatalogEntity::Epoch(epoch) if epoch.status == EpochStatus::Active => {}
            _ => {
                return Err(CatalogError::IntegrityViolation {
                    message: format!("epoch {epoch_id} is archived; {me} cannot be added"),
                })
            }
        }

        let parents = entity.lineage_parents();
        if entity.kind() == EntityKind::UseCase && parents.is_empty() {
            return Err(CatalogError::IntegrityViolation {
                message: format!("{me} names no requirement"),
            });
        }
        for parent in &parents {
            lineage_step(*parent, me)?;
            self.require_parent(me, *parent).await?;
        }

        match entity {
            CatalogEntity::Template(template) => {
                let use_case = self.use_case(template.use_case_id).await?;
                if !use_case.requirement_ids.contains(&template.requirement_id) {
                    return Err(CatalogError::IntegrityViolation {
                        message: format!(
                            "{me} names requirement {} which use case {} does not address",
                            template.requirement_id, template.use_case_id
                        ),
                    });
                }
            }
            CatalogEntity::Execution(execution) => {
                let template = self.template(execution.template_id).await?;
                if template.use_case_id != execution.use_case_id
                    || template.requirement_id != execution.requirement_id
                {
                    return Err(CatalogError::IntegrityViolation {
                        message: format!(
                            "{me} foreign keys disagree with template {}",
                            execution.template_id
                        ),
                    });
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Moves an execution along its lifecycle.
    ///
    /// # Errors
    ///
    /// [`CatalogError::InvalidTransition`] when the lifecycle forbids the
    /// change; the stored execution is then unchanged.
    pub async fn update_execution_status(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        update: ExecutionUpdate,
    ) -> Result<Execution, CatalogError> {
        let _guard = self.write_guard().await;
        let mut execution = self.execution(id).await?;
        if !execution.status.can_transition_to(status) {
            return Err(CatalogError::InvalidTransition {
                entity: id.into(),
                from: execution.status,
                to: status,
            });
        }
        execution.status = status;
        if let Some(count) = update.result_count {
            execution.result_count = count;
        }
        if let Some(metrics) = update.performance_metrics {
            execution.performance_metrics = metrics;
        }
        if update.error.is_some() {
            execution.error = update.error;
        }
        execution.updated_at = Timestamp::now();

        let mut batch = WriteBatch::new();
        batch.push(Mutation::Replace(CatalogEntity::Execution(execution.clone())));
        self.backend.commit(batch).await?;
        debug!(execution_id = %id, %status, "updated execution status");
        Ok(execution)
    }

    /// Deletes a leaf entity and every edge pointing at it.
    ///
    /// # Errors
    ///
    /// [`CatalogError::HasDependents`] while lineage children (or, for an
    /// epoch, members) exist.
    pub async fn delete(&self, entity: EntityRef) -> Result<(), CatalogError> {
        let _guard = self.write_guard().await;
        self.get(entity).await?;

        let mut dependents = self
            .backend
            .edges_from(EdgeSet::Lineage, entity)
            .await?
            .len();
        if entity.kind == EntityKind::Epoch {
            dependents += self
                .backend
                .edges_from(EdgeSet::EpochContainment, entity)
                .await?
                .len();
        }
        if dependents > 0 {
            return Err(CatalogError::HasDependents { entity, dependents });
        }

        let mut batch = WriteBatch::new();
        batch.push(Mutation::Remove(entity));
        for set in [EdgeSet::Lineage, EdgeSet::EpochContainment] {
            for edge in self.backend.edges_to(set, entity).await? {
                batch.push(Mutation::RemoveEdge(edge));
            }
        }
        self.backend.commit(batch).await?;
        info!(%entity, "deleted catalog entity");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Graph queries
    // -----------------------------------------------------------------------

    /// Members of `epoch` whose kind is in `kinds` (all kinds when empty),
    /// in lineage order then creation order.
    pub async fn query_by_epoch(
        &self,
        epoch: EpochId,
        kinds: &[EntityKind],
    ) -> Result<Vec<CatalogEntity>, CatalogError> {
        self.epoch(epoch).await?;
        let mut members = Vec::new();
        for edge in self
            .backend
            .edges_from(EdgeSet::EpochContainment, epoch.into())
            .await?
        {
            if !kinds.is_empty() && !kinds.contains(&edge.to.kind) {
                continue;
            }
            if let Some(entity) = self.backend.get(edge.to).await? {
                members.push(entity);
            }
        }
        members.sort_by_key(|e| (e.kind(), e.created_at(), e.entity_ref()));
        Ok(members)
    }

    async fn lineage_adjacency(
        &self,
        direction: Direction,
    ) -> Result<HashMap<EntityRef, Vec<EntityRef>>, CatalogError> {
        let mut adjacency: HashMap<EntityRef, Vec<EntityRef>> = HashMap::new();
        for edge in self.backend.edges(EdgeSet::Lineage).await? {
            let (from, to) = match direction {
                Direction::Forward => (edge.from, edge.to),
                Direction::Backward => (edge.to, edge.from),
            };
            adjacency.entry(from).or_default().push(to);
        }
        Ok(adjacency)
    }

    /// Entities within `depth` lineage hops of `start`, breadth-first,
    /// excluding `start`.
    pub async fn traverse_lineage(
        &self,
        start: EntityRef,
        direction: Direction,
        depth: usize,
    ) -> Result<Vec<CatalogEntity>, CatalogError> {
        self.get(start).await?;
        let adjacency = self.lineage_adjacency(direction).await?;
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([(start, 0usize)]);
        let mut found = Vec::new();
        while let Some((node, hops)) = queue.pop_front() {
            if hops == depth {
                continue;
            }
            for &next in adjacency.get(&node).into_iter().flatten() {
                if visited.insert(next) {
                    if let Some(entity) = self.backend.get(next).await? {
                        found.push(entity);
                    }
                    queue.push_back((next, hops + 1));
                }
            }
        }
        Ok(found)
    }

    /// Everything downstream of `start`, counted per kind. Each entity is
    /// counted once however many paths reach it. For an epoch, its members
    /// are the first hop.
    pub async fn impact_analysis(&self, start: EntityRef) -> Result<ImpactReport, CatalogError> {
        self.get(start).await?;
        let mut adjacency = self.lineage_adjacency(Direction::Forward).await?;
        if start.kind == EntityKind::Epoch {
            let members = self
                .backend
                .edges_from(EdgeSet::EpochContainment, start)
                .await?
                .into_iter()
                .map(|e| e.to)
                .collect();
            adjacency.insert(start, members);
        }

        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut entities = Vec::new();
        let mut affected: BTreeMap<EntityKind, usize> = BTreeMap::new();
        while let Some(node) = queue.pop_front() {
            for &next in adjacency.get(&node).into_iter().flatten() {
                if visited.insert(next) {
                    *affected.entry(next.kind).or_default() += 1;
                    entities.push(next);
                    queue.push_back(next);
                }
            }
        }
        debug!(root = %start, affected = entities.len(), "impact analysis");
        Ok(ImpactReport {
            root: start,
            affected,
            entities,
        })
    }

    /// The requirement → use case → template chain behind an execution.
    /// Links that no longer resolve are `None`.
    pub async fn execution_lineage(
        &self,
        id: ExecutionId,
    ) -> Result<ExecutionLineage, CatalogError> {
        let execution = self.execution(id).await?;
        Ok(ExecutionLineage {
            requirement: found(self.requirement(execution.requirement_id).await)?,
            use_case: found(self.use_case(execution.use_case_id).await)?,
            template: found(self.template(execution.template_id).await)?,
            execution,
        })
    }

    // -----------------------------------------------------------------------
    // Aggregates
    // -----------------------------------------------------------------------

    /// Execution totals, optionally limited to one epoch.
    pub async fn execution_summary(
        &self,
        epoch: Option<EpochId>,
    ) -> Result<ExecutionSummary, CatalogError> {
        let executions = self.executions().await?;
        Ok(ExecutionSummary::from_executions(
            executions
                .iter()
                .filter(|x| epoch.map_or(true, |e| e == x.epoch_id)),
        ))
    }

    pub async fn statistics(&self) -> Result<CatalogStatistics, CatalogError> {
        let mut entity_counts = BTreeMap::new();
        let mut by_ref: HashMap<EntityRef, CatalogEntity> = HashMap::new();
        for kind in EntityKind::ALL {
            let entities = self.backend.list(kind).await?;
            entity_counts.insert(kind, entities.len());
            by_ref.extend(entities.into_iter().map(|e| (e.entity_ref(), e)));
        }

        let mut edge_counts = BTreeMap::new();
        let mut containment: HashMap<EntityRef, Vec<EntityRef>> = HashMap::new();
        for set in [EdgeSet::Lineage, EdgeSet::EpochContainment] {
            let edges = self.backend.edges(set).await?;
            edge_counts.insert(set, edges.len());
            if set == EdgeSet::EpochContainment {
                for edge in edges {
                    containment.entry(edge.from).or_default().push(edge.to);
                }
            }
        }

        let executions = self.executions().await?;
        let mut algorithms = BTreeMap::new();
        for execution in &executions {
            *algorithms.entry(execution.algorithm).or_default() += 1;
        }

        let mut epochs = Vec::new();
        for epoch in self.epochs().await? {
            let mut counts: BTreeMap<EntityKind, usize> = BTreeMap::new();
            let mut first: Option<Timestamp> = None;
            let mut last: Option<Timestamp> = None;
            let mut seconds = 0.0;
            let members = containment.get(&epoch.id.into()).cloned().unwrap_or_default();
            for member in members {
                let Some(entity) = by_ref.get(&member) else {
                    continue;
                };
                *counts.entry(member.kind).or_default() += 1;
                let created = entity.created_at();
                let touched = match entity {
                    CatalogEntity::Execution(x) => {
                        seconds += x.performance_metrics.execution_time_seconds;
                        x.updated_at.max(created)
                    }
                    _ => created,
                };
                first = Some(first.map_or(created, |f| f.min(created)));
                last = Some(last.map_or(touched, |l| l.max(touched)));
            }
            epochs.push(EpochStatistics {
                epoch_id: epoch.id,
                name: epoch.name,
                status: epoch.status,
                entity_counts: counts,
                first_activity: first,
                last_activity: last,
                total_execution_seconds: seconds,
            });
        }

        Ok(CatalogStatistics {
            entity_counts,
            edge_counts,
            executions: ExecutionSummary::from_executions(&executions),
            algorithms,
            epochs,
        })
    }
}

/// A lineage edge may only go one level down the requirement → use case →
/// template → execution chain.
fn lineage_step(from: EntityRef, to: EntityRef) -> Result<(), CatalogError> {
    match (from.kind.lineage_depth(), to.kind.lineage_depth()) {
        (Some(p), Some(c)) if p + 1 == c => Ok(()),
        _ => Err(CatalogError::LineageCycle { from, to }),
    }
}

fn found<T>(result: Result<T, CatalogError>) -> Result<Option<T>, CatalogError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(CatalogError::NotFound { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lineage_edges_only_step_one_level_down() {
        let requirement = EntityRef::from(RequirementId::new_random());
        let use_case = EntityRef::from(UseCaseId::new_random());
        let template = EntityRef::from(TemplateId::new_random());
        let execution = EntityRef::from(ExecutionId::new_random());

        assert_eq!(lineage_step(requirement, use_case), Ok(()));
        assert_eq!(lineage_step(template, execution), Ok(()));

        for (from, to) in [
            (execution, requirement),
            (use_case, requirement),
            (requirement, template),
            (template, template),
        ] {
            assert_eq!(
                lineage_step(from, to),
                Err(CatalogError::LineageCycle { from, to })
            );
        }
    }

    #[test]
    fn epochs_never_sit_on_the_lineage_chain() {
        let epoch = EntityRef::from(EpochId::new_random());
        let requirement = EntityRef::from(RequirementId::new_random());
        assert!(matches!(
            lineage_step(epoch, requirement),
            Err(CatalogError::LineageCycle { .. })
        ));
    }
}
