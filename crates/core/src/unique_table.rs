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

//! Per-variable hash table enforcing structural canonicity of matrix nodes.
//!
//! Each variable owns a fixed power-of-two array of buckets; nodes chain
//! through their intrusive `next` field.  The canonicity invariant (one live
//! node per structural edge tuple and variable) holds between rewrite
//! primitives; a primitive detaches the whole bucket column of its level,
//! rebuilds the nodes and re-inserts them via [`UniqueTable::rehash`].

use std::hash::{BuildHasher, Hash, Hasher};

use log::{debug, warn};

use crate::arena::NodeArena;
use crate::node::{MatrixNode, NodeId};

/// Number of hash buckets per variable (power of two).
pub const NBUCKET: usize = 1 << 15;

/// Entries present before garbage collection is first considered.
pub const INITIAL_GC_LIMIT: usize = 131072;

/// Per-variable unique-table counters.
#[derive(Clone, Debug, Default)]
pub struct TableStats {
    pub num_entries: usize,
    pub peak_num_entries: usize,
    pub num_active: usize,
    pub peak_num_active: usize,
    pub lookups: u64,
    pub hits: u64,
    pub collisions: u64,
    pub inserts: u64,
    pub gc_runs: u64,
}

impl TableStats {
    fn track_insert(&mut self) {
        self.inserts += 1;
        self.num_entries += 1;
        self.peak_num_entries = self.peak_num_entries.max(self.num_entries);
    }

    fn track_active(&mut self) {
        self.num_active += 1;
        self.peak_num_active = self.peak_num_active.max(self.num_active);
    }
}

pub struct UniqueTable {
    tables: Vec<Vec<NodeId>>,
    stats: Vec<TableStats>,
    /// Nodes with a non-zero reference count, per level.  The sifting driver
    /// reads these as its activity heuristic.
    active: Vec<u64>,
    hash_state: ahash::RandomState,
    initial_gc_limit: usize,
    gc_limit: usize,
}

impl UniqueTable {
    pub fn new(num_vars: usize) -> UniqueTable {
        UniqueTable::with_gc_limit(num_vars, INITIAL_GC_LIMIT)
    }

    pub fn with_gc_limit(num_vars: usize, initial_gc_limit: usize) -> UniqueTable {
        UniqueTable {
            tables: (0..num_vars).map(|_| vec![NodeId::NONE; NBUCKET]).collect(),
            stats: vec![TableStats::default(); num_vars],
            active: vec![0; num_vars],
            // Fixed seeds: the structural hash must be deterministic so that
            // two structurally identical nodes agree at every moment.
            hash_state: ahash::RandomState::with_seeds(
                0x243f_6a88_85a3_08d3,
                0x1319_8a2e_0370_7344,
                0xa409_3822_299f_31d0,
                0x082e_fa98_ec4e_6c89,
            ),
            initial_gc_limit,
            gc_limit: initial_gc_limit,
        }
    }

    pub fn num_vars(&self) -> usize {
        self.tables.len()
    }

    /// Structural hash of a node: the four (target, weight) pairs, masked to
    /// the bucket range.  Mutating a child of a hashed node invalidates its
    /// key until [`UniqueTable::rehash`] runs.
    pub fn hash_key(&self, node: &MatrixNode) -> usize {
        let mut hasher = self.hash_state.build_hasher();
        node.edges.hash(&mut hasher);
        (hasher.finish() as usize) & (NBUCKET - 1)
    }

    fn nodes_equal(arena: &NodeArena, p: NodeId, q: NodeId) -> bool {
        arena.node(p).edges == arena.node(q).edges
    }

    /// Canonicalise a freshly built node: return the existing structural
    /// twin (handing `p` back to the arena) or insert `p` at the head of its
    /// bucket.  Only normalised nodes may be stored.
    pub fn lookup(&mut self, arena: &mut NodeArena, p: NodeId) -> NodeId {
        if p.is_none() {
            return p;
        }
        let v = arena.node(p).v as usize;
        let key = self.hash_key(arena.node(p));
        self.stats[v].lookups += 1;

        let mut q = self.tables[v][key];
        while !q.is_none() {
            if Self::nodes_equal(arena, p, q) {
                if p != q {
                    arena.return_entry(p);
                }
                self.stats[v].hits += 1;
                return q;
            }
            self.stats[v].collisions += 1;
            q = arena.node(q).next;
        }

        arena.node_mut(p).next = self.tables[v][key];
        self.tables[v][key] = p;
        self.stats[v].track_insert();
        p
    }

    /// Node-level saturating increment.  Returns whether the count changed;
    /// a 0-to-1 transition is tracked in the per-level active counters.
    pub fn inc_ref(&mut self, arena: &mut NodeArena, p: NodeId) -> bool {
        let node = arena.node_mut(p);
        if node.ref_count == u32::MAX {
            return false;
        }
        node.ref_count += 1;
        if node.ref_count == u32::MAX {
            warn!("reference count of node {:?} saturated; the node will never be freed", p);
        }
        if node.ref_count == 1 {
            let v = node.v as usize;
            self.active[v] += 1;
            self.stats[v].track_active();
        }
        true
    }

    /// Node-level saturating decrement.  Decrementing a zero count is a
    /// programmer error and aborts.
    pub fn dec_ref(&mut self, arena: &mut NodeArena, p: NodeId) -> bool {
        let node = arena.node_mut(p);
        if node.ref_count == u32::MAX {
            return false;
        }
        assert!(
            node.ref_count > 0,
            "reference count underflow on node {:?} (v = {})",
            p,
            node.v
        );
        node.ref_count -= 1;
        if node.ref_count == 0 {
            let v = node.v as usize;
            self.active[v] -= 1;
            self.stats[v].num_active -= 1;
        }
        true
    }

    pub fn active(&self) -> &[u64] {
        &self.active
    }

    /// Detach and return the whole bucket column of variable `v`.
    ///
    /// The column in the table is cleared; the returned chains stay valid
    /// because the nodes still live in the arena.  Rewrite primitives iterate
    /// the snapshot so that nodes re-inserted mid-rewrite are not observed.
    pub fn get_bucket_column(&mut self, v: u32) -> Vec<NodeId> {
        let column = std::mem::replace(&mut self.tables[v as usize], vec![NodeId::NONE; NBUCKET]);
        self.stats[v as usize].num_entries = 0;
        column
    }

    /// Move a node whose children just changed from the bucket it was hashed
    /// into before the mutation to the bucket of its new key.
    ///
    /// Tolerates the node being absent from `old_key` (it may have been
    /// removed earlier in the same sweep, or its column may be detached); in
    /// that case the node simply re-enters the table.
    pub fn rehash(&mut self, arena: &mut NodeArena, p: NodeId, old_key: usize) {
        debug_assert!(old_key < NBUCKET);
        let v = arena.node(p).v as usize;

        let mut removed = false;
        let mut prev = NodeId::NONE;
        let mut cur = self.tables[v][old_key];
        while !cur.is_none() {
            let next = arena.node(cur).next;
            if cur == p {
                if prev.is_none() {
                    self.tables[v][old_key] = next;
                } else {
                    arena.node_mut(prev).next = next;
                }
                removed = true;
                break;
            }
            prev = cur;
            cur = next;
        }

        let key = self.hash_key(arena.node(p));
        arena.node_mut(p).next = self.tables[v][key];
        self.tables[v][key] = p;
        if !removed {
            // Re-entering after a column detach.
            self.stats[v].num_entries += 1;
            self.stats[v].peak_num_entries = self.stats[v].peak_num_entries.max(self.stats[v].num_entries);
        }
    }

    pub fn num_entries(&self) -> usize {
        self.stats.iter().map(|s| s.num_entries).sum()
    }

    pub fn num_active_entries(&self) -> u64 {
        self.active.iter().sum()
    }

    pub fn stats(&self) -> &[TableStats] {
        &self.stats
    }

    pub fn possibly_needs_collection(&self) -> bool {
        self.num_entries() >= self.gc_limit
    }

    /// Unlink every dead node (zero reference count) and hand it back to the
    /// arena.  Returns the number of collected nodes.
    ///
    /// The limit adapts: once the post-collection population is above 90% of
    /// the limit, the limit grows by the initial limit, otherwise successive
    /// calls would rescan the full table for nothing.
    pub fn garbage_collect(&mut self, arena: &mut NodeArena, force: bool) -> usize {
        let before = self.num_entries();
        if (!force && before < self.gc_limit) || before == 0 {
            return 0;
        }
        for (v, table) in self.tables.iter_mut().enumerate() {
            let stat = &mut self.stats[v];
            stat.gc_runs += 1;
            for bucket in table.iter_mut() {
                let mut prev = NodeId::NONE;
                let mut cur = *bucket;
                while !cur.is_none() {
                    let next = arena.node(cur).next;
                    if arena.node(cur).ref_count == 0 {
                        if prev.is_none() {
                            *bucket = next;
                        } else {
                            arena.node_mut(prev).next = next;
                        }
                        arena.return_entry(cur);
                        stat.num_entries -= 1;
                    } else {
                        prev = cur;
                    }
                    cur = next;
                }
            }
            stat.num_active = stat.num_entries;
        }
        let after = self.num_entries();
        if after > self.gc_limit / 10 * 9 {
            self.gc_limit = after + self.initial_gc_limit;
        }
        debug!(
            "garbage collection removed {} of {} entries (limit now {})",
            before - after,
            before,
            self.gc_limit
        );
        before - after
    }

    /// Null every bucket and reset the collection limit and statistics.  The
    /// nodes themselves stay in the arena; callers that want the storage back
    /// collect first.
    pub fn clear(&mut self) {
        for table in self.tables.iter_mut() {
            table.fill(NodeId::NONE);
        }
        self.gc_limit = self.initial_gc_limit;
        for stat in self.stats.iter_mut() {
            *stat = TableStats::default();
        }
        self.active.fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complex::WeightId;
    use crate::node::Edge;

    fn fresh_node(arena: &mut NodeArena, v: u32, weight: WeightId) -> NodeId {
        let id = arena.get();
        let node = arena.node_mut(id);
        node.v = v;
        node.edges = [
            Edge::terminal(weight),
            Edge::zero(),
            Edge::zero(),
            Edge::terminal(weight),
        ];
        id
    }

    #[test]
    fn lookup_deduplicates_structural_twins() {
        let mut arena = NodeArena::new();
        let mut table = UniqueTable::new(2);
        let a = fresh_node(&mut arena, 0, WeightId::ONE);
        let a = table.lookup(&mut arena, a);
        let b = fresh_node(&mut arena, 0, WeightId::ONE);
        let b = table.lookup(&mut arena, b);
        assert_eq!(a, b);
        assert_eq!(table.num_entries(), 1);
        // The duplicate went back to the pool and is reused.
        let c = fresh_node(&mut arena, 1, WeightId::ONE);
        let c = table.lookup(&mut arena, c);
        assert_ne!(a, c);
        assert_eq!(table.num_entries(), 2);
    }

    #[test]
    fn rehash_moves_a_node_after_child_mutation() {
        let mut arena = NodeArena::new();
        let mut table = UniqueTable::new(1);
        let a = fresh_node(&mut arena, 0, WeightId::ONE);
        let key_before = table.hash_key(arena.node(a));
        let a = table.lookup(&mut arena, a);
        arena.node_mut(a).edges[1] = Edge::one();
        table.rehash(&mut arena, a, key_before);
        assert_eq!(table.num_entries(), 1);
        // A fresh twin of the mutated shape resolves to the moved node.
        let twin = arena.get();
        arena.node_mut(twin).v = 0;
        arena.node_mut(twin).edges = arena.node(a).edges;
        assert_eq!(table.lookup(&mut arena, twin), a);
    }

    #[test]
    fn rehash_tolerates_detached_columns() {
        let mut arena = NodeArena::new();
        let mut table = UniqueTable::new(1);
        let a = fresh_node(&mut arena, 0, WeightId::ONE);
        let key_before = table.hash_key(arena.node(a));
        let a = table.lookup(&mut arena, a);
        let column = table.get_bucket_column(0);
        assert_eq!(table.num_entries(), 0);
        assert!(column.contains(&a));
        table.rehash(&mut arena, a, key_before);
        assert_eq!(table.num_entries(), 1);
    }

    #[test]
    fn garbage_collect_frees_only_dead_nodes() {
        let mut arena = NodeArena::new();
        let mut table = UniqueTable::with_gc_limit(1, 4);
        let live = fresh_node(&mut arena, 0, WeightId::ONE);
        let live = table.lookup(&mut arena, live);
        table.inc_ref(&mut arena, live);
        let dead = fresh_node(&mut arena, 0, WeightId(1));
        arena.node_mut(dead).edges[1] = Edge::one();
        let dead = table.lookup(&mut arena, dead);
        assert_ne!(live, dead);
        let collected = table.garbage_collect(&mut arena, true);
        assert_eq!(collected, 1);
        assert_eq!(table.num_entries(), 1);
        assert_eq!(arena.node(live).ref_count, 1);
    }

    #[test]
    #[should_panic(expected = "reference count underflow")]
    fn dec_ref_on_zero_is_fatal() {
        let mut arena = NodeArena::new();
        let mut table = UniqueTable::new(1);
        let a = fresh_node(&mut arena, 0, WeightId::ONE);
        let a = table.lookup(&mut arena, a);
        table.dec_ref(&mut arena, a);
    }
}
