//! Stack loading and planning
//!
//! A [`Stack`] bundles the config, last-applied state and provider of one
//! stack, and turns the blueprint into a plan.

use anyhow::{Context as _, Result};
use resource_graph::{FileStore, Plan, ResourceGraph, Snapshot, StateStore};
use std::path::PathBuf;

use crate::Context;
use crate::blueprint::{self, Blueprint};
use crate::config::NuageConfig;
use crate::paths;
use crate::provider::LocalProvider;

/// Everything needed to plan and apply one stack
pub struct Stack {
    pub config: NuageConfig,
    pub store: FileStore,
    pub snapshot: Snapshot,
    pub provider: LocalProvider,
}

impl Stack {
    /// Open the stack selected by the global options
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = NuageConfig::load(ctx.config.as_deref())?.with_stack(ctx.stack.as_deref())?;
        Self::with_state_dir(config, paths::state_dir()?)
    }

    /// Open a stack whose state lives in `state_dir`
    pub fn with_state_dir(config: NuageConfig, state_dir: PathBuf) -> Result<Self> {
        let store = FileStore::for_stack(&state_dir, &config.stack);
        let snapshot = store
            .load()
            .with_context(|| format!("Failed to load state for stack '{}'", config.stack))?;
        let provider = LocalProvider::from_config(&config, &state_dir);

        log::debug!(
            "Opened stack {} ({} resources in state, provider root {})",
            config.stack_name(),
            snapshot.len(),
            provider.root().display()
        );

        Ok(Self {
            config,
            store,
            snapshot,
            provider,
        })
    }

    /// Declarations of this stack
    pub fn blueprint(&self) -> Result<Blueprint> {
        blueprint::notes_backend(&self.config)
    }

    /// Plan the changes that converge state to `blueprint`
    ///
    /// Each target is a logical name, a full resource type such as
    /// `aws:dynamodb/table`, or the last segment of one (`table`).
    pub fn plan(&self, blueprint: &Blueprint, targets: &[String]) -> Result<(ResourceGraph, Plan)> {
        let graph = ResourceGraph::build(blueprint.resources.clone())
            .context("Invalid stack declaration")?;
        let plan = Plan::build(&graph, &self.snapshot, &self.provider)?;

        let targets = expand_targets(&graph, &self.snapshot, targets);
        let plan = plan.filter_by_targets(&graph, &targets)?;
        Ok((graph, plan))
    }

    /// Plan deletion of everything in state
    pub fn destroy_plan(&self) -> Result<Plan> {
        Ok(Plan::destroy(&self.snapshot)?)
    }
}

/// Replace type targets with the names of the resources of that type
fn expand_targets(graph: &ResourceGraph, snapshot: &Snapshot, targets: &[String]) -> Vec<String> {
    let mut expanded = Vec::new();

    for target in targets {
        if graph.contains(target) || snapshot.get(target).is_some() {
            expanded.push(target.clone());
            continue;
        }

        let matches_type = |resource_type: &str| {
            resource_type == target
                || resource_type.rsplit('/').next() == Some(target.as_str())
        };
        let by_type: Vec<String> = graph
            .decls()
            .filter(|d| matches_type(&d.resource_type))
            .map(|d| d.name.clone())
            .chain(
                snapshot
                    .resources
                    .values()
                    .filter(|r| !graph.contains(&r.name) && matches_type(&r.resource_type))
                    .map(|r| r.name.clone()),
            )
            .collect();

        if by_type.is_empty() {
            // Unknown; the plan filter reports it
            expanded.push(target.clone());
        } else {
            expanded.extend(by_type);
        }
    }

    expanded
}

#[cfg(test)]
mod tests {
    use super::*;
    use resource_graph::ResourceDecl;

    fn graph() -> ResourceGraph {
        ResourceGraph::build(vec![
            ResourceDecl::new("pool", "aws:cognito/userPool"),
            ResourceDecl::new("notes", "aws:dynamodb/table"),
            ResourceDecl::new("comments", "aws:dynamodb/table"),
        ])
        .unwrap()
    }

    #[test]
    fn test_expand_targets_by_name_and_type() {
        let graph = graph();
        let snapshot = Snapshot::default();

        assert_eq!(
            expand_targets(&graph, &snapshot, &["pool".to_string()]),
            vec!["pool"]
        );

        let mut tables = expand_targets(&graph, &snapshot, &["table".to_string()]);
        tables.sort();
        assert_eq!(tables, vec!["comments", "notes"]);

        let mut full = expand_targets(&graph, &snapshot, &["aws:dynamodb/table".to_string()]);
        full.sort();
        assert_eq!(full, vec!["comments", "notes"]);

        assert_eq!(
            expand_targets(&graph, &snapshot, &["ghost".to_string()]),
            vec!["ghost"]
        );
    }
}
