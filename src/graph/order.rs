//! Topological ordering of translated nodes.
//!
//! Uses a fixed-point pass: whenever a node sits before one of its
//! dependencies it is moved to just after the furthest one, and passes
//! repeat until nothing moves. Nodes already in dependency order keep their
//! relative positions, which keeps the generated script stable.

use std::collections::HashMap;

use tracing::debug;

use super::cycle::find_cycle;
use super::{NodeArena, NodeId};
use crate::translate::TranslateError;

/// Order `nodes` so every dependency inside the set precedes its dependents.
///
/// Dependencies outside `nodes` are ignored.
///
/// # Errors
///
/// Returns [`TranslateError::DependencyCycle`] when the nodes depend on each
/// other in a loop.
pub fn order_nodes(arena: &NodeArena, nodes: &[NodeId]) -> Result<Vec<NodeId>, TranslateError> {
    if let Some(cycle) = find_cycle(arena, nodes) {
        return Err(TranslateError::DependencyCycle {
            cycle: cycle
                .into_iter()
                .map(|id| arena.alias(id).unwrap_or_else(|| format!("node {}", id.0)))
                .collect(),
        });
    }
    let mut order = nodes.to_vec();
    let mut passes = 0_usize;
    while reorder_pass(arena, &mut order) {
        passes += 1;
    }
    debug!(nodes = order.len(), passes, "ordered nodes");
    Ok(order)
}

/// One scan over `order`; returns whether any node moved.
fn reorder_pass(arena: &NodeArena, order: &mut [NodeId]) -> bool {
    let mut moved = false;
    let mut position: HashMap<NodeId, usize> =
        order.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let mut i = 0;
    while let Some(&node) = order.get(i) {
        let highest = arena
            .get(node)
            .into_iter()
            .flat_map(|n| n.dependencies())
            .filter_map(|dep| position.get(dep).copied())
            .max();
        match highest {
            Some(h) if h > i => {
                if let Some(window) = order.get_mut(i..=h) {
                    window.rotate_left(1);
                }
                for (offset, id) in order.iter().enumerate().take(h + 1).skip(i) {
                    position.insert(*id, offset);
                }
                moved = true;
            }
            _ => i += 1,
        }
    }
    moved
}
