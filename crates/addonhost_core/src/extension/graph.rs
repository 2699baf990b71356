//! Dependency ordering over extension identifiers.
//!
//! # Invariants
//! - Output lists every dependency before its dependents.
//! - Among ready nodes, input order is kept, so results are deterministic.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::hash::Hash;

/// Nodes that could not be ordered because they sit on or behind a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleError<T> {
    pub unresolved: Vec<T>,
}

/// Kahn topological sort.
///
/// `edges` are `(dependency, dependent)` pairs. Edges that mention a node
/// outside `nodes` are ignored; callers resolve missing nodes beforehand.
pub fn topological_sort<T>(
    nodes: impl IntoIterator<Item = T>,
    edges: impl IntoIterator<Item = (T, T)>,
) -> Result<Vec<T>, CycleError<T>>
where
    T: Copy + Eq + Hash,
{
    let node_list: Vec<T> = nodes.into_iter().collect();
    if node_list.is_empty() {
        return Ok(Vec::new());
    }

    let position: HashMap<T, usize> = node_list
        .iter()
        .enumerate()
        .map(|(index, node)| (*node, index))
        .collect();
    let mut dependents: HashMap<T, Vec<T>> = HashMap::new();
    let mut in_degree: HashMap<T, usize> = node_list.iter().map(|node| (*node, 0)).collect();

    for (dependency, dependent) in edges {
        if !position.contains_key(&dependency) || !position.contains_key(&dependent) {
            continue;
        }
        dependents.entry(dependency).or_default().push(dependent);
        if let Some(degree) = in_degree.get_mut(&dependent) {
            *degree += 1;
        }
    }

    let mut queue: VecDeque<T> = node_list
        .iter()
        .copied()
        .filter(|node| in_degree.get(node).copied().unwrap_or(0) == 0)
        .collect();

    let mut sorted = Vec::with_capacity(node_list.len());
    while let Some(node) = queue.pop_front() {
        sorted.push(node);
        let Some(children) = dependents.get(&node) else {
            continue;
        };
        // Release children in input order.
        let mut ready = BTreeSet::new();
        for child in children {
            if let Some(degree) = in_degree.get_mut(child) {
                *degree -= 1;
                if *degree == 0 {
                    ready.insert(position[child]);
                }
            }
        }
        queue.extend(ready.into_iter().map(|index| node_list[index]));
    }

    if sorted.len() != node_list.len() {
        let unresolved = node_list
            .iter()
            .copied()
            .filter(|node| in_degree.get(node).copied().unwrap_or(0) > 0)
            .collect();
        return Err(CycleError { unresolved });
    }
    Ok(sorted)
}
