//! Resource graph builder
//!
//! Turns a set of declarations into a DAG. Edges come from explicit
//! `depends_on` lists and from `${name.output}` references.

use crate::error::{Error, Result};
use crate::reference::{is_valid_segment, referenced_resources};
use crate::types::ResourceDecl;
use std::collections::{BTreeMap, BTreeSet};

/// Adjacency list: node -> nodes it depends on
pub type Edges = BTreeMap<String, BTreeSet<String>>;

#[derive(Debug, Clone)]
struct Node {
    decl: ResourceDecl,
    dependencies: BTreeSet<String>,
    dependents: BTreeSet<String>,
}

/// A validated, acyclic graph of declared resources
#[derive(Debug, Clone, Default)]
pub struct ResourceGraph {
    nodes: BTreeMap<String, Node>,
    levels: Vec<Vec<String>>,
    order: Vec<String>,
}

impl ResourceGraph {
    /// Build the graph, rejecting duplicates, unknown dependencies and cycles
    pub fn build(decls: Vec<ResourceDecl>) -> Result<Self> {
        let mut nodes: BTreeMap<String, Node> = BTreeMap::new();

        for decl in decls {
            if !is_valid_segment(&decl.name) {
                return Err(Error::InvalidName(decl.name));
            }
            if nodes.contains_key(&decl.name) {
                return Err(Error::DuplicateResource(decl.name));
            }

            let mut dependencies = referenced_resources(&decl.name, &decl.properties)?;
            dependencies.extend(decl.depends_on.iter().cloned());
            if dependencies.contains(&decl.name) {
                return Err(Error::SelfDependency(decl.name));
            }

            nodes.insert(
                decl.name.clone(),
                Node {
                    decl,
                    dependencies,
                    dependents: BTreeSet::new(),
                },
            );
        }

        let mut reverse: Vec<(String, String)> = Vec::new();
        for (name, node) in &nodes {
            for dep in &node.dependencies {
                if !nodes.contains_key(dep) {
                    return Err(Error::UnknownDependency {
                        resource: name.clone(),
                        dependency: dep.clone(),
                    });
                }
                reverse.push((dep.clone(), name.clone()));
            }
        }
        for (dep, dependent) in reverse {
            if let Some(node) = nodes.get_mut(&dep) {
                node.dependents.insert(dependent);
            }
        }

        let edges: Edges = nodes
            .iter()
            .map(|(name, node)| (name.clone(), node.dependencies.clone()))
            .collect();
        let levels = sort_levels(&edges)?;
        let order = levels.iter().flatten().cloned().collect();

        log::debug!(
            "Built resource graph: {} resources in {} levels",
            nodes.len(),
            levels.len()
        );

        Ok(Self {
            nodes,
            levels,
            order,
        })
    }

    /// Number of resources
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Declaration of a resource
    pub fn get(&self, name: &str) -> Option<&ResourceDecl> {
        self.nodes.get(name).map(|n| &n.decl)
    }

    /// Deterministic topological order (dependencies first, ties by name)
    pub fn order(&self) -> &[String] {
        &self.order
    }

    /// Waves of resources; every dependency of a resource sits in an earlier wave
    pub fn levels(&self) -> &[Vec<String>] {
        &self.levels
    }

    /// Declarations in topological order
    pub fn decls(&self) -> impl Iterator<Item = &ResourceDecl> {
        self.order.iter().filter_map(|name| self.get(name))
    }

    /// Direct dependencies of a resource
    pub fn dependencies_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.nodes.get(name).map(|n| &n.dependencies)
    }

    /// Direct dependents of a resource
    pub fn dependents_of(&self, name: &str) -> Option<&BTreeSet<String>> {
        self.nodes.get(name).map(|n| &n.dependents)
    }

    /// Everything that (transitively) depends on a resource
    pub fn transitive_dependents(&self, name: &str) -> BTreeSet<String> {
        self.walk(name, |n| &n.dependents)
    }

    /// Everything a resource (transitively) depends on
    pub fn transitive_dependencies(&self, name: &str) -> BTreeSet<String> {
        self.walk(name, |n| &n.dependencies)
    }

    fn walk<F>(&self, start: &str, next: F) -> BTreeSet<String>
    where
        F: Fn(&Node) -> &BTreeSet<String>,
    {
        let mut seen = BTreeSet::new();
        let mut stack = vec![start.to_string()];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for neighbour in next(node) {
                if seen.insert(neighbour.clone()) {
                    stack.push(neighbour.clone());
                }
            }
        }
        seen
    }
}

/// Group nodes into dependency levels (Kahn's algorithm, name tie-break)
///
/// Dependencies that are not keys of `edges` are ignored, so callers can
/// sort a subset of a larger graph.
pub fn sort_levels(edges: &Edges) -> Result<Vec<Vec<String>>> {
    let mut remaining: BTreeMap<&str, usize> = edges
        .iter()
        .map(|(name, deps)| {
            let count = deps.iter().filter(|d| edges.contains_key(*d)).count();
            (name.as_str(), count)
        })
        .collect();

    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for (name, deps) in edges {
        for dep in deps.iter().filter(|d| edges.contains_key(*d)) {
            dependents.entry(dep.as_str()).or_default().push(name.as_str());
        }
    }

    let mut levels = Vec::new();
    let mut ready: Vec<&str> = remaining
        .iter()
        .filter(|(_, count)| **count == 0)
        .map(|(name, _)| *name)
        .collect();

    while !ready.is_empty() {
        for name in &ready {
            remaining.remove(name);
        }

        let mut next = BTreeSet::new();
        for name in &ready {
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(count) = remaining.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        next.insert(*dependent);
                    }
                }
            }
        }

        levels.push(ready.iter().map(|s| (*s).to_string()).collect());
        ready = next.into_iter().collect();
    }

    if !remaining.is_empty() {
        let stuck: BTreeSet<&str> = remaining.keys().copied().collect();
        return Err(Error::Cycle(find_cycle(edges, &stuck)));
    }

    Ok(levels)
}

/// Find one cycle among nodes Kahn's algorithm could not place
fn find_cycle(edges: &Edges, stuck: &BTreeSet<&str>) -> Vec<String> {
    // Every stuck node has at least one stuck dependency, so following
    // dependencies from any of them must revisit a node.
    let Some(&start) = stuck.iter().next() else {
        return Vec::new();
    };

    let mut path: Vec<&str> = vec![start];
    let mut position: BTreeMap<&str, usize> = BTreeMap::from([(start, 0)]);
    let mut current = start;

    loop {
        let next = edges
            .get(current)
            .and_then(|deps| deps.iter().find(|d| stuck.contains(d.as_str())));
        let Some(next) = next else {
            return path.iter().map(|s| (*s).to_string()).collect();
        };

        if let Some(&at) = position.get(next.as_str()) {
            // Report in dependent -> dependency order, closing the loop
            let mut cycle: Vec<String> = path[at..].iter().map(|s| (*s).to_string()).collect();
            cycle.push(next.clone());
            return cycle;
        }

        position.insert(next.as_str(), path.len());
        path.push(next.as_str());
        current = next.as_str();
    }
}
