//! Cycle detection over node dependencies.

use std::collections::{HashMap, HashSet};

use super::{NodeArena, NodeId};

/// Tracks the visitation state of a node during cycle detection.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum VisitState {
    Visiting,
    Visited,
}

/// Find a dependency cycle among `nodes`, ignoring edges that leave the set.
///
/// The returned cycle starts at its smallest handle and repeats it at the
/// end.
pub(crate) fn find_cycle(arena: &NodeArena, nodes: &[NodeId]) -> Option<Vec<NodeId>> {
    let members: HashSet<NodeId> = nodes.iter().copied().collect();
    let mut detector = CycleDetector::new(arena, &members);
    nodes.iter().find_map(|&node| {
        if detector.is_visited(node) {
            None
        } else {
            detector.visit(node)
        }
    })
}

struct CycleDetector<'a> {
    arena: &'a NodeArena,
    members: &'a HashSet<NodeId>,
    stack: Vec<NodeId>,
    states: HashMap<NodeId, VisitState>,
}

impl<'a> CycleDetector<'a> {
    fn new(arena: &'a NodeArena, members: &'a HashSet<NodeId>) -> Self {
        Self {
            arena,
            members,
            stack: Vec::new(),
            states: HashMap::new(),
        }
    }

    fn is_visited(&self, node: NodeId) -> bool {
        matches!(self.states.get(&node), Some(VisitState::Visited))
    }

    fn visit(&mut self, node: NodeId) -> Option<Vec<NodeId>> {
        match self.states.get(&node) {
            Some(VisitState::Visited) => return None,
            Some(VisitState::Visiting) => {
                let idx = self.stack.iter().position(|n| *n == node).unwrap_or(0);
                let mut cycle: Vec<NodeId> = self.stack.iter().skip(idx).copied().collect();
                cycle.push(node);
                return Some(canonicalize_cycle(cycle));
            }
            None => {
                self.states.insert(node, VisitState::Visiting);
            }
        }

        self.stack.push(node);
        let arena = self.arena;
        let deps = arena.get(node).map(super::BuildNode::dependencies).unwrap_or_default();
        for &dep in deps {
            if !self.members.contains(&dep) {
                tracing::trace!(dependency = dep.0, dependent = node.0, "edge leaves the ordered set");
                continue;
            }
            if let Some(cycle) = self.visit(dep) {
                return Some(cycle);
            }
        }

        self.stack.pop();
        self.states.insert(node, VisitState::Visited);
        None
    }
}

fn canonicalize_cycle(mut cycle: Vec<NodeId>) -> Vec<NodeId> {
    if cycle.len() < 2 {
        return cycle;
    }
    let len = cycle.len() - 1;
    let start = cycle
        .iter()
        .take(len)
        .enumerate()
        .min_by_key(|(_, id)| **id)
        .map_or(0, |(idx, _)| idx);
    let (prefix, suffix) = cycle.split_at_mut(len);
    prefix.rotate_left(start);
    if let (Some(first), Some(slot)) = (prefix.first().copied(), suffix.first_mut()) {
        *slot = first;
    }
    cycle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{ExecNode, NodeBody, NodeTag};
    use crate::tool::ToolId;
    use rstest::rstest;

    fn arena_with(edges: &[(usize, usize)], count: usize) -> NodeArena {
        let mut arena = NodeArena::new();
        for _ in 0..count {
            arena.push(
                NodeTag::Exec,
                NodeBody::Exec(ExecNode {
                    tool: ToolId(0),
                    arguments: String::new(),
                    local_only: false,
                }),
            );
        }
        for &(from, to) in edges {
            arena.add_dependency(NodeId(from), NodeId(to));
        }
        arena
    }

    fn all(count: usize) -> Vec<NodeId> {
        (0..count).map(NodeId).collect()
    }

    #[rstest]
    fn acyclic_graph_has_no_cycle() {
        let arena = arena_with(&[(1, 0), (2, 1), (2, 0)], 3);
        assert_eq!(find_cycle(&arena, &all(3)), None);
    }

    #[rstest]
    fn finds_two_node_cycle() {
        let arena = arena_with(&[(0, 1), (1, 0)], 2);
        assert_eq!(find_cycle(&arena, &all(2)), Some(vec![NodeId(0), NodeId(1), NodeId(0)]));
    }

    #[rstest]
    fn ignores_edges_outside_the_set() {
        let arena = arena_with(&[(0, 1), (1, 0)], 2);
        assert_eq!(find_cycle(&arena, &[NodeId(0)]), None);
    }

    #[rstest]
    fn canonicalize_cycle_rotates_smallest_node() {
        let cycle = vec![NodeId(2), NodeId(0), NodeId(1), NodeId(2)];
        assert_eq!(
            canonicalize_cycle(cycle),
            vec![NodeId(0), NodeId(1), NodeId(2), NodeId(0)]
        );
    }
}
