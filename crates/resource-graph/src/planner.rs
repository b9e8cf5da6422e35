//! Planner - diffs declarations against state and orders the operations

use crate::context::Provider;
use crate::diff::{DiffSummary, ResourceDiff};
use crate::error::{Error, Result};
use crate::graph::{Edges, ResourceGraph, sort_levels};
use crate::reference::referenced_resources;
use crate::state::Snapshot;
use crate::types::{OpKind, Properties, ResourceDecl, ResourceRecord};
use std::collections::BTreeSet;

/// One planned operation
#[derive(Debug, Clone)]
pub struct Step {
    pub diff: ResourceDiff,
    /// Declaration to apply (`None` for deletes)
    pub decl: Option<ResourceDecl>,
    /// Steps that must finish before this one starts
    pub after: BTreeSet<String>,
}

impl Step {
    pub fn name(&self) -> &str {
        &self.diff.name
    }

    pub fn kind(&self) -> OpKind {
        self.diff.kind
    }
}

/// Ordered operations that converge state to the declarations
///
/// Creates, updates and replaces come first in dependency order, then
/// deletes with dependents before their dependencies.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    steps: Vec<Step>,
}

impl Plan {
    /// Plan the changes needed to reach `graph` from `snapshot`
    pub fn build<P>(graph: &ResourceGraph, snapshot: &Snapshot, provider: &P) -> Result<Self>
    where
        P: Provider + ?Sized,
    {
        let mut steps: Vec<Step> = Vec::with_capacity(graph.len());

        for decl in graph.decls() {
            let record = snapshot.get(&decl.name);
            let replace_on = provider.replace_keys(&decl.resource_type);
            let Some(mut diff) = ResourceDiff::compute(Some(decl), record, replace_on) else {
                continue;
            };

            let protected = decl.protect || record.is_some_and(|r| r.protect);
            if diff.kind == OpKind::Replace && protected {
                return Err(Error::Protected(decl.name.clone()));
            }

            // Outputs of a changing dependency may differ
            if diff.kind == OpKind::Same {
                let changing: BTreeSet<String> = steps
                    .iter()
                    .filter(|s| s.kind().is_change())
                    .map(|s| s.name().to_string())
                    .collect();
                let keys = keys_referencing(decl, &changing)?;
                if !keys.is_empty() {
                    log::debug!("{} follows a changing dependency", decl.name);
                    diff.kind = OpKind::Update;
                    diff.changed_keys = keys;
                }
            }

            steps.push(Step {
                diff,
                decl: Some(decl.clone()),
                after: graph.dependencies_of(&decl.name).cloned().unwrap_or_default(),
            });
        }

        let orphans: Vec<&ResourceRecord> = snapshot
            .resources
            .values()
            .filter(|r| !graph.contains(&r.name))
            .collect();
        steps.extend(delete_steps(&orphans)?);

        Ok(Self { steps })
    }

    /// Plan deletion of everything in `snapshot`
    pub fn destroy(snapshot: &Snapshot) -> Result<Self> {
        let records: Vec<&ResourceRecord> = snapshot.resources.values().collect();
        Ok(Self {
            steps: delete_steps(&records)?,
        })
    }

    /// Keep only the targets and what they depend on
    ///
    /// Each target is a logical name. Deletes can be targeted by the name
    /// of the recorded resource; the deletes of everything recorded as
    /// depending on it are kept too.
    pub fn filter_by_targets(self, graph: &ResourceGraph, targets: &[String]) -> Result<Self> {
        if targets.is_empty() {
            return Ok(self);
        }

        let mut keep: BTreeSet<String> = BTreeSet::new();
        for target in targets {
            if graph.contains(target) {
                keep.insert(target.clone());
                keep.extend(graph.transitive_dependencies(target));
            } else if self.steps.iter().any(|s| s.name() == target) {
                keep.extend(self.delete_dependents(target));
            } else {
                return Err(Error::UnknownTarget(target.clone()));
            }
        }

        Ok(Self {
            steps: self
                .steps
                .into_iter()
                .filter(|s| keep.contains(s.name()))
                .collect(),
        })
    }

    /// `name` and every delete step that has to run before it
    fn delete_dependents(&self, name: &str) -> BTreeSet<String> {
        let mut found = BTreeSet::new();
        let mut pending = vec![name.to_string()];

        while let Some(current) = pending.pop() {
            if !found.insert(current.clone()) {
                continue;
            }
            if let Some(step) = self.get(&current).filter(|s| s.kind() == OpKind::Delete) {
                pending.extend(step.after.iter().cloned());
            }
        }
        found
    }

    /// All steps, including unchanged resources
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Steps that change something
    pub fn changes(&self) -> impl Iterator<Item = &Step> {
        self.steps.iter().filter(|s| s.kind().is_change())
    }

    pub fn get(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name() == name)
    }

    pub fn summary(&self) -> DiffSummary {
        DiffSummary::from_diffs(self.steps.iter().map(|s| &s.diff))
    }

    pub fn has_changes(&self) -> bool {
        self.changes().next().is_some()
    }

    /// Check if the plan contains no steps at all
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Delete steps for `records`, dependents first
fn delete_steps(records: &[&ResourceRecord]) -> Result<Vec<Step>> {
    if let Some(protected) = records.iter().find(|r| r.protect) {
        return Err(Error::Protected(protected.name.clone()));
    }

    let edges: Edges = records
        .iter()
        .map(|r| (r.name.clone(), r.dependencies.iter().cloned().collect()))
        .collect();
    let levels = sort_levels(&edges)?;

    let mut steps = Vec::with_capacity(records.len());
    for name in levels.iter().rev().flatten() {
        let Some(record) = records.iter().copied().find(|r| &r.name == name) else {
            continue;
        };

        let dependents: BTreeSet<String> = records
            .iter()
            .filter(|r| r.dependencies.contains(name))
            .map(|r| r.name.clone())
            .collect();

        steps.push(Step {
            diff: delete_diff(record),
            decl: None,
            after: dependents,
        });
    }
    Ok(steps)
}

/// Property keys of `decl` whose values reference one of `names`
fn keys_referencing(decl: &ResourceDecl, names: &BTreeSet<String>) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    for (key, value) in &decl.properties {
        let single: Properties = [(key.clone(), value.clone())].into_iter().collect();
        if referenced_resources(&decl.name, &single)?
            .iter()
            .any(|r| names.contains(r))
        {
            keys.push(key.clone());
        }
    }
    Ok(keys)
}

fn delete_diff(record: &ResourceRecord) -> ResourceDiff {
    ResourceDiff {
        name: record.name.clone(),
        resource_type: record.resource_type.clone(),
        kind: OpKind::Delete,
        changed_keys: Vec::new(),
        replace_keys: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{ApplyContext, ResolvedResource};
    use chrono::Utc;

    struct TableProvider;

    impl Provider for TableProvider {
        fn name(&self) -> &str {
            "test"
        }

        fn replace_keys(&self, resource_type: &str) -> &[&str] {
            if resource_type == "table" { &["name"] } else { &[] }
        }

        fn create(&self, _: &ApplyContext, _: &ResolvedResource<'_>) -> anyhow::Result<Properties> {
            Ok(Properties::new())
        }

        fn update(
            &self,
            _: &ApplyContext,
            _: &ResolvedResource<'_>,
            _: &ResourceRecord,
        ) -> anyhow::Result<Properties> {
            Ok(Properties::new())
        }

        fn delete(&self, _: &ApplyContext, _: &ResourceRecord) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn applied(decl: &ResourceDecl, dependencies: &[&str]) -> ResourceRecord {
        ResourceRecord {
            name: decl.name.clone(),
            resource_type: decl.resource_type.clone(),
            declared: decl.properties.clone(),
            inputs: decl.properties.clone(),
            outputs: Properties::new(),
            dependencies: dependencies.iter().map(|s| (*s).to_string()).collect(),
            protect: decl.protect,
            updated_at: Utc::now(),
        }
    }

    fn decls() -> Vec<ResourceDecl> {
        vec![
            ResourceDecl::new("pool", "user_pool"),
            ResourceDecl::new("client", "user_pool_client").property("user_pool_id", "${pool.id}"),
            ResourceDecl::new("table", "table").property("name", "notes.Note"),
        ]
    }

    #[test]
    fn test_fresh_plan_creates_in_order() {
        let graph = ResourceGraph::build(decls()).unwrap();
        let plan = Plan::build(&graph, &Snapshot::default(), &TableProvider).unwrap();

        let names: Vec<&str> = plan.steps().iter().map(Step::name).collect();
        assert_eq!(names, vec!["pool", "table", "client"]);
        assert!(plan.steps().iter().all(|s| s.kind() == OpKind::Create));
        assert_eq!(plan.summary().creates, 3);
    }

    #[test]
    fn test_applied_state_is_unchanged() {
        let graph = ResourceGraph::build(decls()).unwrap();
        let mut snapshot = Snapshot::default();
        for decl in graph.decls() {
            snapshot.record(applied(decl, &[]));
        }

        let plan = Plan::build(&graph, &snapshot, &TableProvider).unwrap();
        assert!(!plan.has_changes());
        assert_eq!(plan.summary().unchanged, 3);
    }

    #[test]
    fn test_replace_cascades_to_referencing_resources() {
        let mut snapshot = Snapshot::default();
        for decl in decls() {
            snapshot.record(applied(&decl, &[]));
        }

        let mut changed = decls();
        changed[0] = ResourceDecl::new("pool", "user_pool_v2");
        let graph = ResourceGraph::build(changed).unwrap();
        let plan = Plan::build(&graph, &snapshot, &TableProvider).unwrap();

        assert_eq!(plan.get("pool").unwrap().kind(), OpKind::Replace);
        assert_eq!(plan.get("client").unwrap().kind(), OpKind::Update);
        assert_eq!(plan.get("table").unwrap().kind(), OpKind::Same);
    }

    #[test]
    fn test_replace_key_forces_replace() {
        let mut snapshot = Snapshot::default();
        for decl in decls() {
            snapshot.record(applied(&decl, &[]));
        }

        let mut changed = decls();
        changed[2] = ResourceDecl::new("table", "table").property("name", "notes.Other");
        let graph = ResourceGraph::build(changed).unwrap();
        let plan = Plan::build(&graph, &snapshot, &TableProvider).unwrap();

        let step = plan.get("table").unwrap();
        assert_eq!(step.kind(), OpKind::Replace);
        assert_eq!(step.diff.replace_keys, vec!["name"]);
    }

    #[test]
    fn test_update_marks_referencing_resources() {
        let mut snapshot = Snapshot::default();
        for decl in decls() {
            snapshot.record(applied(&decl, &[]));
        }

        let mut changed = decls();
        changed[0] = ResourceDecl::new("pool", "user_pool").property("mfa", "ON");
        let graph = ResourceGraph::build(changed).unwrap();
        let plan = Plan::build(&graph, &snapshot, &TableProvider).unwrap();

        assert_eq!(plan.get("pool").unwrap().kind(), OpKind::Update);
        let client = plan.get("client").unwrap();
        assert_eq!(client.kind(), OpKind::Update);
        assert_eq!(client.diff.changed_keys, vec!["user_pool_id"]);
        assert_eq!(plan.get("table").unwrap().kind(), OpKind::Same);
    }

    #[test]
    fn test_protected_replace_is_refused() {
        let mut snapshot = Snapshot::default();
        for decl in decls() {
            snapshot.record(applied(&decl.protected(), &[]));
        }

        let mut changed = decls();
        changed[0] = ResourceDecl::new("pool", "user_pool_v2").protected();
        let graph = ResourceGraph::build(changed).unwrap();
        let err = Plan::build(&graph, &snapshot, &TableProvider).unwrap_err();
        assert!(matches!(err, Error::Protected(name) if name == "pool"));

        // Recorded protection holds even if the declaration drops it
        let mut changed = decls();
        changed[2] = ResourceDecl::new("table", "table").property("name", "notes.Other");
        let graph = ResourceGraph::build(changed).unwrap();
        let err = Plan::build(&graph, &snapshot, &TableProvider).unwrap_err();
        assert!(matches!(err, Error::Protected(name) if name == "table"));
    }

    #[test]
    fn test_orphans_deleted_dependents_first() {
        let all = decls();
        let mut snapshot = Snapshot::default();
        snapshot.record(applied(&all[0], &[]));
        snapshot.record(applied(&all[1], &["pool"]));
        snapshot.record(applied(&all[2], &[]));

        let graph = ResourceGraph::build(vec![all[2].clone()]).unwrap();
        let plan = Plan::build(&graph, &snapshot, &TableProvider).unwrap();

        let deletes: Vec<&str> = plan
            .steps()
            .iter()
            .filter(|s| s.kind() == OpKind::Delete)
            .map(Step::name)
            .collect();
        assert_eq!(deletes, vec!["client", "pool"]);
        assert!(plan.get("pool").unwrap().after.contains("client"));
        // Deletes come after everything else
        assert_eq!(plan.steps()[0].name(), "table");
    }

    #[test]
    fn test_protected_orphan_is_refused() {
        let mut snapshot = Snapshot::default();
        snapshot.record(applied(&ResourceDecl::new("pool", "user_pool").protected(), &[]));

        let graph = ResourceGraph::build(Vec::new()).unwrap();
        let err = Plan::build(&graph, &snapshot, &TableProvider).unwrap_err();
        assert!(matches!(err, Error::Protected(name) if name == "pool"));
    }

    #[test]
    fn test_destroy_plans_everything() {
        let mut snapshot = Snapshot::default();
        let all = decls();
        snapshot.record(applied(&all[0], &[]));
        snapshot.record(applied(&all[1], &["pool"]));

        let plan = Plan::destroy(&snapshot).unwrap();
        let names: Vec<&str> = plan.steps().iter().map(Step::name).collect();
        assert_eq!(names, vec!["client", "pool"]);
    }

    #[test]
    fn test_filter_by_targets_keeps_dependencies() {
        let graph = ResourceGraph::build(decls()).unwrap();
        let plan = Plan::build(&graph, &Snapshot::default(), &TableProvider)
            .unwrap()
            .filter_by_targets(&graph, &["client".to_string()])
            .unwrap();

        let names: Vec<&str> = plan.steps().iter().map(Step::name).collect();
        assert_eq!(names, vec!["pool", "client"]);

        let err = Plan::build(&graph, &Snapshot::default(), &TableProvider)
            .unwrap()
            .filter_by_targets(&graph, &["ghost".to_string()])
            .unwrap_err();
        assert!(matches!(err, Error::UnknownTarget(_)));
    }

    #[test]
    fn test_targeted_delete_keeps_recorded_dependents() {
        let all = decls();
        let mut snapshot = Snapshot::default();
        snapshot.record(applied(&all[0], &[]));
        snapshot.record(applied(&all[1], &["pool"]));
        snapshot.record(applied(&all[2], &[]));

        let graph = ResourceGraph::build(vec![all[2].clone()]).unwrap();
        let plan = Plan::build(&graph, &snapshot, &TableProvider)
            .unwrap()
            .filter_by_targets(&graph, &["pool".to_string()])
            .unwrap();

        let names: Vec<&str> = plan.steps().iter().map(Step::name).collect();
        assert_eq!(names, vec!["client", "pool"]);
        assert!(plan.steps().iter().all(|s| s.kind() == OpKind::Delete));
        assert!(plan.get("pool").unwrap().after.contains("client"));
    }
}
