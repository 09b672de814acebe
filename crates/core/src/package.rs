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

//! The decision-diagram package: one arena, one unique table, one complex
//! table and the compute caches, owned together so that every algorithm in
//! this crate can be a free function over `&mut Package`.

use hashbrown::{HashMap, HashSet};
use num_complex::Complex64;

use crate::arena::NodeArena;
use crate::complex::{ComplexTable, WeightId};
use crate::node::{Edge, MatrixNode, NodeId, NEDGE};
use crate::unique_table::UniqueTable;

pub struct Package {
    pub(crate) arena: NodeArena,
    pub(crate) table: UniqueTable,
    pub(crate) weights: ComplexTable,
    pub(crate) add_cache: HashMap<(Edge, Edge), Edge>,
    pub(crate) mul_cache: HashMap<(Edge, Edge), Edge>,
}

impl Package {
    pub fn new(num_qubits: usize) -> Package {
        Package {
            arena: NodeArena::new(),
            table: UniqueTable::new(num_qubits),
            weights: ComplexTable::new(),
            add_cache: HashMap::new(),
            mul_cache: HashMap::new(),
        }
    }

    pub fn num_vars(&self) -> usize {
        self.table.num_vars()
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &MatrixNode {
        self.arena.node(id)
    }

    #[inline]
    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut MatrixNode {
        self.arena.node_mut(id)
    }

    #[inline]
    pub fn weight(&self, id: WeightId) -> Complex64 {
        self.weights.value(id)
    }

    pub fn lookup_weight(&mut self, value: Complex64) -> WeightId {
        self.weights.lookup(value)
    }

    pub fn terminal_edge(&mut self, value: Complex64) -> Edge {
        Edge::terminal(self.weights.lookup(value))
    }

    /// Nodes with a non-zero reference count, per level.
    pub fn active(&self) -> &[u64] {
        self.table.active()
    }

    pub fn unique_table(&self) -> &UniqueTable {
        &self.table
    }

    /// Build and canonicalise a node at level `v` from four quadrant edges.
    ///
    /// Normalisation pulls the first weight of strictly largest magnitude out
    /// as the common factor; a row of semantically zero edges collapses to
    /// the zero terminal without touching the arena.
    pub fn make_dd_node(&mut self, v: u32, mut edges: [Edge; NEDGE]) -> Edge {
        for e in edges.iter_mut() {
            if e.weight == WeightId::ZERO {
                *e = Edge::zero();
            }
        }
        let mut argmax: Option<usize> = None;
        let mut max_mag = 0.0f64;
        for (i, e) in edges.iter().enumerate() {
            if e.weight != WeightId::ZERO {
                let mag = self.weights.value(e.weight).norm_sqr();
                if mag > max_mag {
                    max_mag = mag;
                    argmax = Some(i);
                }
            }
        }
        let argmax = match argmax {
            Some(i) => i,
            None => return Edge::zero(),
        };
        let top = edges[argmax].weight;
        if top != WeightId::ONE {
            for e in edges.iter_mut() {
                if e.weight != WeightId::ZERO {
                    e.weight = self.weights.div(e.weight, top);
                }
            }
        }
        let fresh = self.arena.get();
        {
            let node = self.arena.node_mut(fresh);
            node.v = v;
            node.edges = edges;
        }
        let id = self.table.lookup(&mut self.arena, fresh);
        Edge { node: id, weight: top }
    }

    /// Acquire a reference on the sub-diagram under `e`.
    ///
    /// The count of the target node saturates; on its 0-to-1 transition the
    /// node starts owning references on its own children, which preserves the
    /// invariant that every edge out of a live node has a referenced target.
    pub fn inc_ref(&mut self, e: Edge) {
        if e.is_terminal() {
            return;
        }
        let changed = self.table.inc_ref(&mut self.arena, e.node);
        if changed && self.arena.node(e.node).ref_count == 1 {
            let children = self.arena.node(e.node).edges;
            for child in children {
                self.inc_ref(child);
            }
        }
    }

    /// Release a reference on the sub-diagram under `e`; the mirror image of
    /// [`Package::inc_ref`].
    pub fn dec_ref(&mut self, e: Edge) {
        if e.is_terminal() {
            return;
        }
        let changed = self.table.dec_ref(&mut self.arena, e.node);
        if changed && self.arena.node(e.node).ref_count == 0 {
            let children = self.arena.node(e.node).edges;
            for child in children {
                self.dec_ref(child);
            }
        }
    }

    /// Number of distinct reachable nodes, counting the terminal once.
    pub fn size(&self, e: Edge) -> usize {
        if e.is_terminal() {
            return 1;
        }
        let mut seen: HashSet<NodeId> = HashSet::new();
        seen.insert(e.node);
        let mut stack = vec![e.node];
        while let Some(id) = stack.pop() {
            for child in self.arena.node(id).edges {
                if !child.is_terminal() && seen.insert(child.node) {
                    stack.push(child.node);
                }
            }
        }
        seen.len() + 1
    }

    /// Collect dead nodes.  Clears the compute caches first whenever a sweep
    /// actually runs, since cached results may reference collectable nodes.
    pub fn garbage_collect(&mut self, force: bool) -> usize {
        if !force && !self.table.possibly_needs_collection() {
            return 0;
        }
        self.add_cache.clear();
        self.mul_cache.clear();
        self.table.garbage_collect(&mut self.arena, force)
    }

    fn reachable(&self, e: Edge) -> Vec<NodeId> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut order = Vec::new();
        if e.is_terminal() {
            return order;
        }
        seen.insert(e.node);
        order.push(e.node);
        let mut i = 0;
        while i < order.len() {
            for child in self.arena.node(order[i]).edges {
                if !child.is_terminal() && seen.insert(child.node) {
                    order.push(child.node);
                }
            }
            i += 1;
        }
        order
    }

    /// Canonicity check: no two distinct reachable nodes at the same level
    /// share an edge tuple.  Holds whenever no rewrite is mid-flight.
    pub fn check_canonicity(&self, root: Edge) -> bool {
        let mut seen: HashMap<(u32, [Edge; NEDGE]), NodeId> = HashMap::new();
        for id in self.reachable(root) {
            let node = self.arena.node(id);
            if let Some(&other) = seen.get(&(node.v, node.edges)) {
                if other != id {
                    return false;
                }
            }
            seen.insert((node.v, node.edges), id);
        }
        true
    }

    /// Level contiguity: every non-terminal edge lands one level down and
    /// every terminal edge above level 0 is semantically zero.  Holds after
    /// the completion pass.
    pub fn check_level_contiguity(&self, root: Edge) -> bool {
        for id in self.reachable(root) {
            let node = self.arena.node(id);
            for child in node.edges {
                if child.is_terminal() {
                    if node.v > 0 && child.weight != WeightId::ZERO {
                        return false;
                    }
                } else if self.arena.node(child.node).v + 1 != node.v {
                    return false;
                }
            }
        }
        true
    }

    /// Reference-count soundness: every reachable node carries at least as
    /// many references as it has reachable live parents (plus one for the
    /// root edge), with equality unless the count saturated.
    pub fn check_ref_counts(&self, root: Edge) -> bool {
        let mut indegree: HashMap<NodeId, u32> = HashMap::new();
        if root.is_terminal() {
            return true;
        }
        *indegree.entry(root.node).or_insert(0) += 1;
        for id in self.reachable(root) {
            for child in self.arena.node(id).edges {
                if !child.is_terminal() {
                    *indegree.entry(child.node).or_insert(0) += 1;
                }
            }
        }
        indegree
            .iter()
            .all(|(&id, &count)| self.arena.node(id).ref_count >= count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn make_dd_node_normalises_by_the_largest_weight() {
        let mut pkg = Package::new(1);
        let half = pkg.terminal_edge(Complex64::new(0.5, 0.0));
        let quarter = pkg.terminal_edge(Complex64::new(0.25, 0.0));
        let e = pkg.make_dd_node(0, [half, Edge::zero(), Edge::zero(), quarter]);
        assert!(!e.is_terminal());
        assert_eq!(pkg.weight(e.weight), Complex64::new(0.5, 0.0));
        let node = pkg.node(e.node);
        assert_eq!(node.edges[0].weight, WeightId::ONE);
        assert_eq!(pkg.weight(node.edges[3].weight), Complex64::new(0.5, 0.0));
    }

    #[test]
    fn make_dd_node_collapses_zero_rows() {
        let mut pkg = Package::new(1);
        let e = pkg.make_dd_node(0, [Edge::zero(); NEDGE]);
        assert!(e.is_terminal());
        assert_eq!(e.weight, WeightId::ZERO);
        assert_eq!(pkg.arena.in_use(), 0);
    }

    #[test]
    fn structural_twins_share_one_node() {
        let mut pkg = Package::new(1);
        let a = pkg.make_dd_node(0, [Edge::one(), Edge::zero(), Edge::zero(), Edge::one()]);
        let b = pkg.make_dd_node(0, [Edge::one(), Edge::zero(), Edge::zero(), Edge::one()]);
        assert_eq!(a, b);
        assert_eq!(pkg.size(a), 2);
    }

    #[test]
    fn inc_ref_propagates_on_first_reference() {
        let mut pkg = Package::new(2);
        let lower = pkg.make_dd_node(0, [Edge::one(), Edge::zero(), Edge::zero(), Edge::one()]);
        let upper = pkg.make_dd_node(1, [lower, Edge::zero(), Edge::zero(), lower]);
        pkg.inc_ref(upper);
        assert_eq!(pkg.node(upper.node).ref_count, 1);
        // Two edges of the upper node point at the lower node.
        assert_eq!(pkg.node(lower.node).ref_count, 2);
        pkg.dec_ref(upper);
        assert_eq!(pkg.node(upper.node).ref_count, 0);
        assert_eq!(pkg.node(lower.node).ref_count, 0);
    }
}
