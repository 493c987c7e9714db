//! Task graph (DAG) construction and validation
//!
//! Graphs are assembled with [`PipelineGraphBuilder`] and checked on
//! [`PipelineGraphBuilder::finalize`]: node names are unique, edges name
//! existing nodes, there are no cycles, and every node is reachable from a
//! single root. A [`PipelineGraph`] is immutable once built.

use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::environment::is_identifier;
use crate::schedule::Schedule;
use crate::task::TaskNode;

/// Graph construction errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("Invalid name '{0}': expected letters, digits and underscores, starting with a letter")]
    InvalidName(String),

    #[error("Invalid warehouse '{0}': expected letters, digits and underscores, starting with a letter")]
    InvalidWarehouse(String),

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Duplicate task '{0}'")]
    DuplicateNode(String),

    #[error("Unknown task '{0}'")]
    UnknownNode(String),

    #[error("Task '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("Duplicate dependency {0} -> {1}")]
    DuplicateEdge(String, String),

    #[error("Graph '{0}' has no tasks")]
    Empty(String),

    #[error("Dependency cycle among tasks: {}", .0.join(", "))]
    Cycle(Vec<String>),

    #[error("Graph has no root task")]
    NoRoot,

    #[error("Graph must have a single root task, found: {}", .0.join(", "))]
    MultipleRoots(Vec<String>),

    #[error("Tasks not reachable from root '{root}': {}", .unreachable.join(", "))]
    Unreachable {
        root: String,
        unreachable: Vec<String>,
    },
}

/// Validated, immutable task graph
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineGraph {
    name: String,
    schedule: Schedule,
    warehouse: String,

    /// Nodes in declaration order
    nodes: Vec<TaskNode>,

    /// `(before, after)`: `after` starts only once `before` completes
    edges: Vec<(String, String)>,

    /// node -> nodes it waits for
    #[serde(skip)]
    parents: HashMap<String, Vec<String>>,

    /// node -> nodes waiting for it
    #[serde(skip)]
    children: HashMap<String, Vec<String>>,

    /// Indices into `nodes`, topologically sorted
    #[serde(skip)]
    order: Vec<usize>,
}

impl PipelineGraph {
    /// Start building a graph
    pub fn builder(
        name: impl Into<String>,
        schedule: Schedule,
        warehouse: impl Into<String>,
    ) -> PipelineGraphBuilder {
        PipelineGraphBuilder::new(name, schedule, warehouse)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Default warehouse for every task
    pub fn warehouse(&self) -> &str {
        &self.warehouse
    }

    /// Nodes in declaration order
    pub fn nodes(&self) -> &[TaskNode] {
        &self.nodes
    }

    /// Dependency edges as `(before, after)`
    pub fn edges(&self) -> &[(String, String)] {
        &self.edges
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, name: &str) -> Option<&TaskNode> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// The single node without dependencies
    pub fn root(&self) -> &TaskNode {
        // finalize guarantees exactly one root, which sorts first
        &self.nodes[self.order[0]]
    }

    /// Warehouse a node runs on: its own override, else the graph's
    pub fn effective_warehouse<'a>(&'a self, node: &'a TaskNode) -> &'a str {
        node.warehouse.as_deref().unwrap_or(&self.warehouse)
    }

    /// Immediate dependencies of a node
    pub fn parents(&self, name: &str) -> Vec<&str> {
        self.parents
            .get(name)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Immediate dependents of a node
    pub fn children(&self, name: &str) -> Vec<&str> {
        self.children
            .get(name)
            .map(|deps| deps.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Nodes in an order where every node follows all of its parents
    pub fn topological_order(&self) -> Vec<&TaskNode> {
        self.order.iter().map(|&i| &self.nodes[i]).collect()
    }

    /// All nodes that (transitively) wait for `name`
    pub fn downstream(&self, name: &str) -> Vec<String> {
        traverse(&self.children, name)
    }

    /// All nodes `name` (transitively) waits for
    pub fn upstream(&self, name: &str) -> Vec<String> {
        traverse(&self.parents, name)
    }

    /// Check if `target` runs (transitively) after `source`
    pub fn has_path(&self, source: &str, target: &str) -> bool {
        self.downstream(source).iter().any(|n| n == target)
    }

    /// SHA-256 of the deployable definition (hex)
    ///
    /// Two graphs with the same fingerprint deploy the same tasks.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let mut field = |value: &str| {
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        };

        field(&self.name);
        field(&self.schedule.to_sql());
        field(&self.warehouse);
        for node in &self.nodes {
            field(&node.name);
            field(&node.definition.to_sql());
            field(self.effective_warehouse(node));
        }
        for (before, after) in &self.edges {
            field(before);
            field(after);
        }

        hex::encode(hasher.finalize())
    }
}

/// BFS over an adjacency map, excluding the start node
fn traverse(adjacency: &HashMap<String, Vec<String>>, start: &str) -> Vec<String> {
    let mut visited = HashSet::new();
    let mut queue: VecDeque<&String> = VecDeque::new();
    let mut result = Vec::new();

    if let Some(next) = adjacency.get(start) {
        queue.extend(next);
    }

    while let Some(current) = queue.pop_front() {
        if !visited.insert(current) {
            continue;
        }
        result.push(current.clone());

        if let Some(next) = adjacency.get(current) {
            queue.extend(next.iter().filter(|n| !visited.contains(n)));
        }
    }

    result
}

/// Accumulates nodes and dependencies, then validates them into a
/// [`PipelineGraph`]
#[derive(Debug, Clone)]
pub struct PipelineGraphBuilder {
    name: String,
    schedule: Schedule,
    warehouse: String,
    nodes: Vec<TaskNode>,
    edges: Vec<(String, String)>,
}

impl PipelineGraphBuilder {
    pub fn new(name: impl Into<String>, schedule: Schedule, warehouse: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            schedule,
            warehouse: warehouse.into(),
            nodes: Vec::new(),
            edges: Vec::new(),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.nodes.iter().any(|n| n.name == name)
    }

    /// Add a task node
    pub fn add_node(&mut self, node: TaskNode) -> Result<&mut Self, GraphError> {
        if !is_identifier(&node.name) {
            return Err(GraphError::InvalidName(node.name));
        }
        if let Some(warehouse) = node.warehouse.as_deref().filter(|w| !is_identifier(w)) {
            return Err(GraphError::InvalidWarehouse(warehouse.to_string()));
        }
        if self.contains(&node.name) {
            return Err(GraphError::DuplicateNode(node.name));
        }
        self.nodes.push(node);
        Ok(self)
    }

    /// Declare that `after` must not start before `before` completes
    pub fn add_dependency(&mut self, before: &str, after: &str) -> Result<&mut Self, GraphError> {
        for name in [before, after] {
            if !self.contains(name) {
                return Err(GraphError::UnknownNode(name.to_string()));
            }
        }
        if before == after {
            return Err(GraphError::SelfDependency(before.to_string()));
        }
        if self.edges.iter().any(|(b, a)| b == before && a == after) {
            return Err(GraphError::DuplicateEdge(before.to_string(), after.to_string()));
        }

        self.edges.push((before.to_string(), after.to_string()));
        Ok(self)
    }

    /// Add the edges of a linear chain: `names[0] -> names[1] -> ...`
    pub fn chain(&mut self, names: &[&str]) -> Result<&mut Self, GraphError> {
        for pair in names.windows(2) {
            self.add_dependency(pair[0], pair[1])?;
        }
        Ok(self)
    }

    /// Validate and freeze the graph
    pub fn finalize(self) -> Result<PipelineGraph, GraphError> {
        if !is_identifier(&self.name) {
            return Err(GraphError::InvalidName(self.name));
        }
        if !is_identifier(&self.warehouse) {
            return Err(GraphError::InvalidWarehouse(self.warehouse));
        }
        if self.nodes.is_empty() {
            return Err(GraphError::Empty(self.name));
        }

        let mut parents: HashMap<String, Vec<String>> = HashMap::new();
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for (before, after) in &self.edges {
            parents.entry(after.clone()).or_default().push(before.clone());
            children.entry(before.clone()).or_default().push(after.clone());
        }

        let order = topological_sort(&self.nodes, &parents, &children)?;

        let roots: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| !parents.contains_key(&n.name))
            .map(|n| n.name.clone())
            .collect();

        let root = match roots.as_slice() {
            [] => return Err(GraphError::NoRoot),
            [root] => root.clone(),
            _ => return Err(GraphError::MultipleRoots(roots)),
        };

        let reachable: HashSet<String> = traverse(&children, &root).into_iter().collect();
        let unreachable: Vec<String> = self
            .nodes
            .iter()
            .filter(|n| n.name != root && !reachable.contains(&n.name))
            .map(|n| n.name.clone())
            .collect();
        if !unreachable.is_empty() {
            return Err(GraphError::Unreachable { root, unreachable });
        }

        Ok(PipelineGraph {
            name: self.name,
            schedule: self.schedule,
            warehouse: self.warehouse,
            nodes: self.nodes,
            edges: self.edges,
            parents,
            children,
            order,
        })
    }
}

/// Kahn's algorithm, stable with respect to declaration order
fn topological_sort(
    nodes: &[TaskNode],
    parents: &HashMap<String, Vec<String>>,
    children: &HashMap<String, Vec<String>>,
) -> Result<Vec<usize>, GraphError> {
    let index: HashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.name.as_str(), i))
        .collect();

    let mut in_degree: Vec<usize> = nodes
        .iter()
        .map(|n| parents.get(&n.name).map_or(0, Vec::len))
        .collect();

    let mut queue: VecDeque<usize> = (0..nodes.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(i) = queue.pop_front() {
        order.push(i);

        if let Some(next) = children.get(&nodes[i].name) {
            for child in next {
                let c = index[child.as_str()];
                in_degree[c] -= 1;
                if in_degree[c] == 0 {
                    queue.push_back(c);
                }
            }
        }
    }

    if order.len() == nodes.len() {
        Ok(order)
    } else {
        let cyclic = (0..nodes.len())
            .filter(|&i| in_degree[i] > 0)
            .map(|i| nodes[i].name.clone())
            .collect();
        Err(GraphError::Cycle(cyclic))
    }
}
