//! Depth-first cycle detection over the contracted prerequisite graph.
//!
//! Uses an explicit stack rather than recursion so that long prerequisite
//! chains over large catalogues cannot overflow the call stack.

use std::collections::HashSet;

use crate::domain::{ModuleIndex, graph::Edges};

/// Searches `edges` for a directed cycle.
///
/// A traversal is started from every vertex not yet explored, in graph
/// order. The search halts at the first successor found on the current
/// path, and returns the cycle it closes: the vertices from the revisited
/// one to the top of the path, followed by the revisited vertex again. A self
/// loop is reported as `[v, v]`.
///
/// Which cycle is reported when several exist depends on traversal order and
/// must not be relied upon. `None` means the graph is acyclic.
pub(crate) fn find_cycle(edges: &Edges) -> Option<Vec<ModuleIndex>> {
    let mut finished = HashSet::new();
    let mut on_path = HashSet::new();

    for root in edges.nodes() {
        if finished.contains(&root) {
            continue;
        }

        on_path.insert(root);
        let mut stack = vec![(root, successors(edges, root))];

        while let Some((node, pending)) = stack.last_mut() {
            let Some(next) = pending.next() else {
                let node = *node;
                on_path.remove(&node);
                finished.insert(node);
                stack.pop();
                continue;
            };

            if on_path.contains(&next) {
                let path: Vec<_> = stack.iter().map(|(n, _)| *n).collect();
                let start = path
                    .iter()
                    .position(|&n| n == next)
                    .expect("vertices on the current path are on the stack");
                let mut cycle = path[start..].to_vec();
                cycle.push(next);
                tracing::debug!(length = cycle.len() - 1, "cycle found");
                return Some(cycle);
            }

            if !finished.contains(&next) {
                on_path.insert(next);
                stack.push((next, successors(edges, next)));
            }
        }
    }

    None
}

fn successors(edges: &Edges, node: ModuleIndex) -> std::vec::IntoIter<ModuleIndex> {
    edges.neighbors(node).collect::<Vec<_>>().into_iter()
}
