// This code is part of Qmdd.
//
// (C) Copyright IBM 2024
//
// This code is licensed under the Apache License, Version 2.0. You may
// obtain a copy of this license in the LICENSE.txt file in the root directory
// of this source tree or at http://www.apache.org/licenses/LICENSE-2.0.
//
// Any modifications or derivative works of this code must retain this
// copyright notice, and modified files need to carry a notice indicating
// that they have been altered from the originals.

//! Materialisation of skipped variable levels.
//!
//! A reduced diagram elides levels whose block is the identity: an edge may
//! jump several levels down, or straight to the 1-terminal from a non-zero
//! level.  The level-local rewrite primitives need every edge at level `k` to
//! land at level `k - 1`, so this pass walks the diagram breadth-first and
//! splices an explicit identity stub into every skipping edge.

use std::collections::VecDeque;

use hashbrown::HashSet;

use crate::complex::WeightId;
use crate::node::{Edge, NodeId, NEDGE};
use crate::package::Package;

/// Which outgoing edges of the node skip a level: either a non-zero terminal
/// edge while the node is above level 0, or a non-terminal edge whose target
/// is not exactly one level down.
fn skipped_edges(pkg: &Package, id: NodeId) -> [bool; NEDGE] {
    let node = pkg.node(id);
    let mut skips = [false; NEDGE];
    for (i, edge) in node.edges.iter().enumerate() {
        if edge.is_terminal() {
            skips[i] = node.v > 0 && !edge.is_zero();
        } else {
            skips[i] = pkg.node(edge.node).v + 1 != node.v;
        }
    }
    skips
}

/// Whether any reachable edge still skips a level.
pub fn has_skipped_nodes(pkg: &Package, root: Edge) -> bool {
    if root.is_terminal() {
        return false;
    }
    let mut queue = VecDeque::new();
    let mut seen: HashSet<NodeId> = HashSet::new();
    queue.push_back(root.node);
    seen.insert(root.node);
    while let Some(id) = queue.pop_front() {
        let skips = skipped_edges(pkg, id);
        if skips.iter().any(|&s| s) {
            return true;
        }
        for edge in pkg.node(id).edges {
            if !edge.is_terminal() && seen.insert(edge.node) {
                queue.push_back(edge.node);
            }
        }
    }
    false
}

/// Insert identity stubs until every edge lands exactly one level down.
///
/// A stub at level `v - 1` carries the replaced edge's target on its outer
/// quadrants with weight one and zero inner quadrants; the edge from the
/// parent keeps its original weight.  Stubs may themselves still skip (a
/// long jump shortens by one level per stub) and are enqueued for further
/// completion, which is why the pass terminates.  The pass is idempotent.
pub fn complete_skipped(pkg: &mut Package, root: Edge) {
    if root.is_terminal() {
        return;
    }
    let mut queue = VecDeque::new();
    let mut seen: HashSet<NodeId> = HashSet::new();
    queue.push_back(root.node);
    seen.insert(root.node);

    while let Some(id) = queue.pop_front() {
        let skips = skipped_edges(pkg, id);
        let any_skipped = skips.iter().any(|&s| s);
        // The node's key is stale as soon as one child is replaced.
        let key_before = if any_skipped {
            pkg.table.hash_key(pkg.node(id))
        } else {
            0
        };

        for i in 0..NEDGE {
            let edge = pkg.node(id).edges[i];
            if !skips[i] {
                if !edge.is_terminal() && seen.insert(edge.node) {
                    queue.push_back(edge.node);
                }
                continue;
            }

            if !edge.is_terminal() {
                pkg.dec_ref(edge);
            }
            let stub = make_stub(pkg, pkg.node(id).v - 1, edge.node);
            pkg.node_mut(id).edges[i].node = stub;
            pkg.inc_ref(Edge {
                node: stub,
                weight: edge.weight,
            });
            if seen.insert(stub) {
                queue.push_back(stub);
            }
        }

        if any_skipped {
            pkg.table.rehash(&mut pkg.arena, id, key_before);
        }
    }
}

/// Build (or find) the identity stub `[t, 0, 0, t]` at level `v` over the
/// original target `t`.  The outer edges carry weight one; the stub is
/// already in normal form, so it goes straight through the unique table.
fn make_stub(pkg: &mut Package, v: u32, target: NodeId) -> NodeId {
    let outer = Edge {
        node: target,
        weight: WeightId::ONE,
    };
    let fresh = pkg.arena.get();
    {
        let node = pkg.arena.node_mut(fresh);
        node.v = v;
        node.edges = [outer, Edge::zero(), Edge::zero(), outer];
    }
    pkg.table.lookup(&mut pkg.arena, fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_complex::Complex64;

    /// A root at level 2 whose live edge jumps straight to the 1-terminal.
    fn skipping_root(pkg: &mut Package, weight: Complex64) -> Edge {
        let w = pkg.lookup_weight(weight);
        let root = pkg.make_dd_node(
            2,
            [
                Edge::terminal(w),
                Edge::zero(),
                Edge::zero(),
                Edge::terminal(w),
            ],
        );
        pkg.inc_ref(root);
        root
    }

    #[test]
    fn detects_terminal_skips() {
        let mut pkg = Package::new(3);
        let root = skipping_root(&mut pkg, Complex64::new(1.0, 0.0));
        assert!(has_skipped_nodes(&pkg, root));
        complete_skipped(&mut pkg, root);
        assert!(!has_skipped_nodes(&pkg, root));
        assert!(pkg.check_level_contiguity(root));
        // One stub chain per level below the root, shared by both edges.
        assert_eq!(pkg.size(root), 4);
    }

    #[test]
    fn completion_is_idempotent() {
        let mut pkg = Package::new(3);
        let root = skipping_root(&mut pkg, Complex64::new(1.0, 0.0));
        complete_skipped(&mut pkg, root);
        let size = pkg.size(root);
        complete_skipped(&mut pkg, root);
        assert_eq!(pkg.size(root), size);
        assert!(pkg.check_canonicity(root));
        assert!(pkg.check_ref_counts(root));
    }

    #[test]
    fn stub_outer_edges_carry_weight_one() {
        let mut pkg = Package::new(2);
        // Non-unit weight on the skipping edge: the parent edge keeps it and
        // the stub must not absorb it.
        let w = pkg.lookup_weight(Complex64::new(0.5, 0.0));
        let lower = pkg.make_dd_node(
            0,
            [Edge::one(), Edge::zero(), Edge::zero(), Edge::one()],
        );
        let root = pkg.make_dd_node(
            1,
            [
                Edge {
                    node: lower.node,
                    weight: w,
                },
                Edge::zero(),
                Edge::zero(),
                Edge::one(),
            ],
        );
        pkg.inc_ref(root);
        complete_skipped(&mut pkg, root);
        assert!(pkg.check_level_contiguity(root));
        let node = pkg.node(root.node);
        // The 0.5-weighted edge already landed one level down and is intact.
        assert_eq!(node.edges[0].weight, w);
        // The former 1-terminal edge gained a stub with unit outer edges.
        let stub = pkg.node(node.edges[3].node);
        assert_eq!(node.edges[3].weight, WeightId::ONE);
        assert_eq!(stub.edges[0], Edge::one());
        assert_eq!(stub.edges[3], Edge::one());
        assert!(stub.edges[1].is_zero() && stub.edges[2].is_zero());
    }
}
