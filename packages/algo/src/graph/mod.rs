//! Prerequisite DAG
//!
//! Validation of authored prerequisite graphs (unique names, known
//! prerequisites, no cycles, every KP reachable from a root) and the
//! adjacency-list view of a loaded course that the mastery tracker, the
//! review trigger and the diagnostic traversal share.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Course, KpId};

// ==================== Validation ====================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("duplicate knowledge point name '{0}'")]
    DuplicateName(String),
    #[error("knowledge point '{knowledge_point}' has unknown prerequisite '{prerequisite}'")]
    UnknownPrerequisite {
        knowledge_point: String,
        prerequisite: String,
    },
    #[error("prerequisite cycle detected: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },
    #[error("knowledge points not reachable from any root: {}", .path.join(" -> "))]
    Unreachable { path: Vec<String> },
}

/// Validates a prerequisite graph given as `(name, prerequisite names)` pairs.
///
/// The graph is walked depth-first from every zero-prerequisite root along
/// prerequisite -> dependent edges. A back edge is reported as a cycle with
/// the closing path. Anything left unvisited afterwards is unreachable; the
/// residue is searched again so the report names the loop that keeps it
/// detached when there is one.
pub fn validate_prerequisite_graph<'a, I>(nodes: I) -> Result<(), GraphError>
where
    I: IntoIterator<Item = (&'a str, &'a [String])>,
{
    let nodes: Vec<(&str, &[String])> = nodes.into_iter().collect();

    let mut index: HashMap<&str, usize> = HashMap::with_capacity(nodes.len());
    for (i, (name, _)) in nodes.iter().enumerate() {
        if index.insert(*name, i).is_some() {
            return Err(GraphError::DuplicateName(name.to_string()));
        }
    }

    let mut prerequisites: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    let mut postrequisites: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];
    for (i, (name, prereqs)) in nodes.iter().enumerate() {
        for prereq in prereqs.iter() {
            let Some(&p) = index.get(prereq.as_str()) else {
                return Err(GraphError::UnknownPrerequisite {
                    knowledge_point: name.to_string(),
                    prerequisite: prereq.clone(),
                });
            };
            if !prerequisites[i].contains(&p) {
                prerequisites[i].push(p);
                postrequisites[p].push(i);
            }
        }
    }

    let names = |path: Vec<usize>| -> Vec<String> {
        path.into_iter().map(|i| nodes[i].0.to_string()).collect()
    };

    let mut visited = vec![false; nodes.len()];
    let mut on_stack = vec![false; nodes.len()];
    for root in (0..nodes.len()).filter(|&i| prerequisites[i].is_empty()) {
        if visited[root] {
            continue;
        }
        let mut stack = Vec::new();
        if let Some(cycle) =
            find_cycle(root, &postrequisites, &mut visited, &mut on_stack, &mut stack)
        {
            return Err(GraphError::Cycle { path: names(cycle) });
        }
    }

    let unvisited: Vec<usize> = (0..nodes.len()).filter(|&i| !visited[i]).collect();
    let Some(&first) = unvisited.first() else {
        return Ok(());
    };

    // Walk prerequisite edges backwards from the detached residue.
    let mut residual_visited = vec![false; nodes.len()];
    let mut residual_on_stack = vec![false; nodes.len()];
    let mut stack = Vec::new();
    let path = match find_cycle(
        first,
        &prerequisites,
        &mut residual_visited,
        &mut residual_on_stack,
        &mut stack,
    ) {
        Some(mut cycle) => {
            cycle.reverse();
            cycle
        }
        None => unvisited,
    };
    Err(GraphError::Unreachable { path: names(path) })
}

fn find_cycle(
    node: usize,
    edges: &[Vec<usize>],
    visited: &mut [bool],
    on_stack: &mut [bool],
    stack: &mut Vec<usize>,
) -> Option<Vec<usize>> {
    visited[node] = true;
    on_stack[node] = true;
    stack.push(node);

    for &next in &edges[node] {
        if !visited[next] {
            if let Some(cycle) = find_cycle(next, edges, visited, on_stack, stack) {
                return Some(cycle);
            }
        } else if on_stack[next] {
            let start = stack.iter().position(|&n| n == next).unwrap_or(0);
            let mut cycle = stack[start..].to_vec();
            cycle.push(next);
            return Some(cycle);
        }
    }

    stack.pop();
    on_stack[node] = false;
    None
}

// ==================== Adjacency ====================

/// Prerequisite/postrequisite adjacency of a loaded course, built once.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrerequisiteGraph {
    /// KP ids in course order (lesson order, then KP order within a lesson)
    order: Vec<KpId>,
    prerequisites: HashMap<KpId, Vec<KpId>>,
    postrequisites: HashMap<KpId, Vec<KpId>>,
}

impl PrerequisiteGraph {
    pub fn from_course(course: &Course) -> Self {
        let mut graph = Self::default();
        for lesson in &course.lessons {
            for kp in &lesson.knowledge_points {
                graph.order.push(kp.id);
                graph.prerequisites.insert(kp.id, kp.prerequisites.clone());
                graph.postrequisites.entry(kp.id).or_default();
            }
        }
        for lesson in &course.lessons {
            for kp in &lesson.knowledge_points {
                for prereq in &kp.prerequisites {
                    graph.postrequisites.entry(*prereq).or_default().push(kp.id);
                }
            }
        }
        graph
    }

    pub fn kp_ids(&self) -> &[KpId] {
        &self.order
    }

    pub fn prerequisites(&self, kp: KpId) -> &[KpId] {
        self.prerequisites.get(&kp).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn postrequisites(&self, kp: KpId) -> &[KpId] {
        self.postrequisites.get(&kp).map(Vec::as_slice).unwrap_or(&[])
    }

    /// KPs with no prerequisites, in course order
    pub fn roots(&self) -> Vec<KpId> {
        self.order
            .iter()
            .copied()
            .filter(|kp| self.prerequisites(*kp).is_empty())
            .collect()
    }

    /// A leaf has no postrequisites: nothing lists it as a prerequisite.
    pub fn is_leaf(&self, kp: KpId) -> bool {
        self.postrequisites(kp).is_empty()
    }
}
