//! Dependency graph over a swarm's tasks.
//!
//! SwarmGraph is a derived view: it borrows the tasks of one loaded
//! [`Swarm`] and answers which are ready, which are blocked, and how they
//! layer into waves. Edges run from a dependency to its dependent.

use std::collections::HashMap;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::core::swarm::Swarm;
use crate::core::task::{Task, TaskId};
use crate::swlog_warn;

pub struct SwarmGraph<'a> {
    graph: DiGraph<&'a Task, ()>,
    task_index: HashMap<&'a TaskId, NodeIndex>,
    /// Dependencies naming tasks outside the swarm. They never complete.
    external: HashMap<NodeIndex, Vec<&'a TaskId>>,
}

impl<'a> SwarmGraph<'a> {
    /// Build the graph. Acyclicity is the store's invariant and is not
    /// checked here.
    pub fn from_swarm(swarm: &'a Swarm) -> Self {
        let mut graph = DiGraph::new();
        let mut task_index = HashMap::new();
        for task in &swarm.tasks {
            let index = graph.add_node(task);
            task_index.entry(&task.id).or_insert(index);
        }

        let mut external: HashMap<NodeIndex, Vec<&'a TaskId>> = HashMap::new();
        for task in &swarm.tasks {
            let to = task_index[&task.id];
            for dep in &task.depends_on {
                match task_index.get(dep) {
                    Some(&from) => {
                        graph.update_edge(from, to, ());
                    }
                    None => {
                        swlog_warn!(
                            "swarm {}: task {} depends on unknown task {}",
                            swarm.id,
                            task.id,
                            dep
                        );
                        external.entry(to).or_default().push(dep);
                    }
                }
            }
        }

        Self {
            graph,
            task_index,
            external,
        }
    }

    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn get_task(&self, id: &TaskId) -> Option<&'a Task> {
        self.task_index.get(id).map(|&index| self.graph[index])
    }

    fn deps_satisfied(&self, index: NodeIndex) -> bool {
        !self.external.contains_key(&index)
            && self
                .graph
                .neighbors_directed(index, Direction::Incoming)
                .all(|dep| self.graph[dep].is_complete())
    }

    /// Tasks not yet complete whose every dependency is complete.
    pub fn ready_tasks(&self) -> Vec<&'a Task> {
        self.graph
            .node_indices()
            .filter(|&index| !self.graph[index].is_complete() && self.deps_satisfied(index))
            .map(|index| self.graph[index])
            .collect()
    }

    /// Tasks neither complete nor ready.
    pub fn blocked_tasks(&self) -> Vec<&'a Task> {
        self.graph
            .node_indices()
            .filter(|&index| !self.graph[index].is_complete() && !self.deps_satisfied(index))
            .map(|index| self.graph[index])
            .collect()
    }

    pub fn completed_tasks(&self) -> Vec<&'a Task> {
        self.graph
            .node_weights()
            .copied()
            .filter(|task| task.is_complete())
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.graph.node_weights().all(|task| task.is_complete())
    }

    /// Incomplete dependencies holding a task back, in-swarm ones first.
    pub fn blockers(&self, id: &TaskId) -> Vec<&'a TaskId> {
        let Some(&index) = self.task_index.get(id) else {
            return Vec::new();
        };
        let mut blockers: Vec<&'a TaskId> = self
            .graph
            .neighbors_directed(index, Direction::Incoming)
            .map(|dep| self.graph[dep])
            .filter(|dep| !dep.is_complete())
            .map(|dep| &dep.id)
            .collect();
        blockers.sort();
        if let Some(external) = self.external.get(&index) {
            blockers.extend(external.iter().copied());
        }
        blockers
    }

    /// Tasks grouped by topological depth.
    ///
    /// Wave N holds tasks whose longest dependency chain has length N. Order
    /// inside a wave follows the swarm's task order but carries no meaning.
    /// Tasks on a cycle appear in no wave.
    pub fn waves(&self) -> Vec<Vec<&'a Task>> {
        let mut indegree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|index| {
                let count = self
                    .graph
                    .neighbors_directed(index, Direction::Incoming)
                    .count();
                (index, count)
            })
            .collect();

        let mut current: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|index| indegree[index] == 0)
            .collect();
        let mut waves = Vec::new();
        let mut placed = 0;

        while !current.is_empty() {
            let mut next = Vec::new();
            for &index in &current {
                for dependent in self.graph.neighbors_directed(index, Direction::Outgoing) {
                    if let Some(remaining) = indegree.get_mut(&dependent) {
                        *remaining -= 1;
                        if *remaining == 0 {
                            next.push(dependent);
                        }
                    }
                }
            }
            next.sort();
            placed += current.len();
            waves.push(current.iter().map(|&index| self.graph[index]).collect());
            current = next;
        }

        if placed < self.graph.node_count() {
            swlog_warn!(
                "{} task(s) sit on a dependency cycle and were left out of the waves",
                self.graph.node_count() - placed
            );
        }
        waves
    }

    /// Size of the widest wave.
    pub fn max_parallelism(&self) -> usize {
        self.waves().iter().map(Vec::len).max().unwrap_or(0)
    }
}

impl std::fmt::Debug for SwarmGraph<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwarmGraph")
            .field("tasks", &self.graph.node_count())
            .field("dependencies", &self.graph.edge_count())
            .field("external", &self.external.len())
            .finish()
    }
}
