//! Dependency resolution and execution layering.
//!
//! A [`DagResolver`] validates an agent dependency graph once, at
//! construction, and partitions it into execution layers: layer 1 holds the
//! agents with no dependencies, and each later layer holds agents whose
//! dependencies all sit in earlier layers. Agents within one layer can run
//! in parallel; layers run strictly in sequence.
//!
//! Validation catches the two ways a graph can be unusable (a dependency on
//! a name that does not exist, and a directed cycle) and reports them as
//! [`OrchestratorError`]s. Nothing downstream ever sees an invalid graph.
//!
//! Within a layer the order of names carries no meaning. Layers are sorted
//! by name so plans and logs are reproducible, but callers must not rely on
//! intra-layer order for correctness.
//!
//! # Example
//!
//! ```
//! use std::collections::HashMap;
//! use agentdag::DagResolver;
//!
//! let mut deps = HashMap::new();
//! deps.insert("analyst".to_string(), vec![]);
//! deps.insert("commercial".to_string(), vec!["analyst".to_string()]);
//! deps.insert("market".to_string(), vec!["analyst".to_string()]);
//!
//! let dag = DagResolver::new(deps).unwrap();
//! assert_eq!(dag.layers(), &[
//!     vec!["analyst".to_string()],
//!     vec!["commercial".to_string(), "market".to_string()],
//! ]);
//! ```

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use crate::agentdag::error::OrchestratorError;

/// A validated agent dependency graph, partitioned into execution layers.
#[derive(Debug, Clone)]
pub struct DagResolver {
    dependencies: HashMap<String, Vec<String>>,
    layers: Vec<Vec<String>>,
}

impl DagResolver {
    /// Validate a dependency graph and compute its execution layers.
    ///
    /// `dependencies` maps each agent name to the names it depends on, in
    /// declaration order. Fails with
    /// [`MissingDependency`](OrchestratorError::MissingDependency) when a
    /// listed name has no entry of its own, and with
    /// [`CircularDependency`](OrchestratorError::CircularDependency) when
    /// the graph contains a cycle.
    pub fn new(dependencies: HashMap<String, Vec<String>>) -> Result<Self, OrchestratorError> {
        validate_references(&dependencies)?;
        detect_cycles(&dependencies)?;
        let layers = layer(&dependencies);
        log::debug!(
            "resolved {} agents into {} layers",
            dependencies.len(),
            layers.len()
        );
        Ok(Self { dependencies, layers })
    }

    /// The execution layers, in order. Empty for an empty agent set.
    pub fn layers(&self) -> &[Vec<String>] {
        &self.layers
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Number of agents in the graph.
    pub fn agent_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Direct dependencies of an agent, in declaration order. `None` when
    /// the agent is unknown.
    pub fn dependencies_of(&self, name: &str) -> Option<&[String]> {
        self.dependencies.get(name).map(|deps| deps.as_slice())
    }

    /// Agents that list `name` among their dependencies, sorted.
    pub fn dependents_of(&self, name: &str) -> Vec<String> {
        let mut dependents: Vec<String> = self
            .dependencies
            .iter()
            .filter(|(_, deps)| deps.iter().any(|d| d == name))
            .map(|(agent, _)| agent.clone())
            .collect();
        dependents.sort();
        dependents
    }
}

impl fmt::Display for DagResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .layers
            .iter()
            .map(|layer| format!("[{}]", layer.join(", ")))
            .collect();
        write!(f, "DAG({})", rendered.join(" -> "))
    }
}

fn validate_references(
    dependencies: &HashMap<String, Vec<String>>,
) -> Result<(), OrchestratorError> {
    for (agent, deps) in dependencies {
        for dep in deps {
            if !dependencies.contains_key(dep) {
                return Err(OrchestratorError::MissingDependency {
                    agent: agent.clone(),
                    missing: dep.clone(),
                });
            }
        }
    }
    Ok(())
}

/// Three-color depth-first search over dependency edges. An edge reaching a
/// node still on the traversal stack closes a cycle; the cycle is the path
/// slice starting at the repeated node, with that node appended.
fn detect_cycles(dependencies: &HashMap<String, Vec<String>>) -> Result<(), OrchestratorError> {
    let mut visited: HashSet<&str> = HashSet::new();
    let mut on_stack: HashSet<&str> = HashSet::new();
    let mut path: Vec<&str> = Vec::new();

    let mut roots: Vec<&str> = dependencies.keys().map(|n| n.as_str()).collect();
    roots.sort_unstable();

    for root in roots {
        if !visited.contains(root) {
            dfs(root, dependencies, &mut visited, &mut on_stack, &mut path)?;
        }
    }
    Ok(())
}

fn dfs<'a>(
    node: &'a str,
    dependencies: &'a HashMap<String, Vec<String>>,
    visited: &mut HashSet<&'a str>,
    on_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Result<(), OrchestratorError> {
    visited.insert(node);
    on_stack.insert(node);
    path.push(node);

    if let Some(deps) = dependencies.get(node) {
        for dep in deps {
            if !visited.contains(dep.as_str()) {
                dfs(dep, dependencies, visited, on_stack, path)?;
            } else if on_stack.contains(dep.as_str()) {
                let start = path.iter().position(|n| *n == dep.as_str()).unwrap_or(0);
                let mut cycle: Vec<String> =
                    path[start..].iter().map(|n| n.to_string()).collect();
                cycle.push(dep.clone());
                return Err(OrchestratorError::CircularDependency(cycle));
            }
        }
    }

    path.pop();
    on_stack.remove(node);
    Ok(())
}

/// Kahn's topological layering: seed with the in-degree-zero agents, then
/// repeatedly release every agent whose dependencies have all been placed.
/// Assumes an acyclic graph (cycles are rejected before this runs).
fn layer(dependencies: &HashMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let mut in_degree: HashMap<&str, usize> = dependencies
        .iter()
        .map(|(name, deps)| (name.as_str(), deps.len()))
        .collect();

    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    for (name, deps) in dependencies {
        for dep in deps {
            dependents
                .entry(dep.as_str())
                .or_insert_with(Vec::new)
                .push(name.as_str());
        }
    }

    let mut frontier: VecDeque<&str> = {
        let mut roots: Vec<&str> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(name, _)| *name)
            .collect();
        roots.sort_unstable();
        roots.into_iter().collect()
    };

    let mut layers: Vec<Vec<String>> = Vec::new();
    let mut placed = 0;

    while !frontier.is_empty() {
        let layer: Vec<&str> = frontier.drain(..).collect();
        placed += layer.len();

        let mut released: Vec<&str> = Vec::new();
        for agent in &layer {
            if let Some(children) = dependents.get(agent) {
                for child in children {
                    if let Some(degree) = in_degree.get_mut(child) {
                        *degree -= 1;
                        if *degree == 0 {
                            released.push(*child);
                        }
                    }
                }
            }
        }
        released.sort_unstable();
        frontier.extend(released);

        layers.push(layer.into_iter().map(|n| n.to_string()).collect());
    }

    debug_assert_eq!(placed, dependencies.len(), "cyclic graph reached layering");
    layers
}
