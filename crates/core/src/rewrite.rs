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

//! The three adjacent-level rewrite primitives.
//!
//! Each primitive rebuilds every live node at one level in place: the sixteen
//! grandchild edges (with weights folded) form a 4x4 matrix that is
//! re-blocked into four fresh children one level down.  The primitives differ
//! only in the cell permutation applied to that matrix, so they share one
//! generic rebuild.
//!
//! The unique-table canonicity invariant is transiently violated while a
//! primitive runs; the level's bucket column is detached up front and each
//! rebuilt node re-enters the table through `rehash`, so no outside reader
//! may observe the table inside this window.

use crate::complex::WeightId;
use crate::node::{Edge, NodeId, NEDGE};
use crate::package::Package;
use crate::steplog::ReorderScheme;

/// Variable transposition: grandchild `(i, j)` moves to cell `(j, i)`.
#[inline]
fn pi_swap(i: usize, j: usize) -> (usize, usize) {
    (j, i)
}

/// XOR the upper qubit into the lower: cell `(j ^ i, j)`.
#[inline]
fn pi_upper(i: usize, j: usize) -> (usize, usize) {
    (j ^ i, j)
}

/// XOR the lower qubit into the upper: cell `(i, j ^ i)`.
#[inline]
fn pi_lower(i: usize, j: usize) -> (usize, usize) {
    (i, j ^ i)
}

/// Exchange the variables at positions `index` and `index - 1` of the order,
/// where `index` is `level + 1` when sweeping up and `level` otherwise.
pub fn level_exchange(pkg: &mut Package, perm: &mut [u32], level: u32, up: bool) {
    let index = if up { level + 1 } else { level };
    assert!(
        index > 0 && (index as usize) < perm.len(),
        "level exchange at index {} outside (0, {})",
        index,
        perm.len()
    );
    perm.swap(index as usize, index as usize - 1);
    rewrite_level(pkg, index, pi_swap);
}

/// Apply a linear transform (or, for [`ReorderScheme::Sifting`], a plain
/// exchange) at `index = level (+ 1 if up)`.  The output permutation is
/// untouched by the pure linear transforms.
pub fn linear_trans(
    pkg: &mut Package,
    perm: &mut [u32],
    level: u32,
    scheme: ReorderScheme,
    up: bool,
) {
    if scheme == ReorderScheme::Sifting {
        return level_exchange(pkg, perm, level, up);
    }
    let index = if up { level + 1 } else { level };
    assert!(
        index > 0 && (index as usize) < perm.len(),
        "linear transform at index {} outside (0, {})",
        index,
        perm.len()
    );
    match scheme {
        ReorderScheme::LtUpper => rewrite_level(pkg, index, pi_upper),
        ReorderScheme::LtLower => rewrite_level(pkg, index, pi_lower),
        _ => unreachable!("no level rewrite for {:?}", scheme),
    }
}

fn rewrite_level<F>(pkg: &mut Package, index: u32, pi: F)
where
    F: Fn(usize, usize) -> (usize, usize) + Copy,
{
    let column = pkg.table.get_bucket_column(index);
    for head in column {
        let mut id = head;
        while !id.is_none() {
            let next = pkg.node(id).next;
            if pkg.node(id).ref_count == 0 {
                // Dead entry left over from an earlier rewrite; its children
                // were released when the count hit zero.
                pkg.arena.return_entry(id);
            } else {
                rebuild_node(pkg, id, pi);
            }
            id = next;
        }
    }
}

/// Rebuild one live node at `index` in place.
///
/// The node keeps its identity (parents and the root edge stay valid); its
/// four children are replaced by freshly normalised, canonicalised nodes one
/// level down, with reference counts transferred from the old children.
fn rebuild_node<F>(pkg: &mut Package, id: NodeId, pi: F)
where
    F: Fn(usize, usize) -> (usize, usize) + Copy,
{
    let key_before = pkg.table.hash_key(pkg.node(id));
    let v = pkg.node(id).v;
    debug_assert!(v > 0);

    // Capture the grandchild matrix with the child weights folded in.  A
    // terminal child stands in for its own grandchildren; after completion
    // such an edge is semantically zero.
    let mut cells = [[Edge::zero(); NEDGE]; NEDGE];
    for i in 0..NEDGE {
        let ei = pkg.node(id).edges[i];
        for j in 0..NEDGE {
            let (row, col) = pi(i, j);
            if ei.is_terminal() {
                cells[row][col] = ei;
            } else {
                let gj = pkg.node(ei.node).edges[j];
                let w = pkg.weights.mul(ei.weight, gj.weight);
                cells[row][col] = if w == WeightId::ZERO {
                    Edge::zero()
                } else {
                    Edge {
                        node: gj.node,
                        weight: w,
                    }
                };
            }
        }
        // The new children absorb the old edge weights.
        pkg.node_mut(id).edges[i].weight = WeightId::ONE;
    }

    for (i, row) in cells.into_iter().enumerate() {
        let new_edge = pkg.make_dd_node(v - 1, row);
        let old = pkg.node(id).edges[i];
        if !old.is_terminal() {
            pkg.dec_ref(old);
        }
        pkg.node_mut(id).edges[i] = new_edge;
        if !new_edge.is_terminal() {
            pkg.inc_ref(new_edge);
        }
    }

    pkg.table.rehash(&mut pkg.arena, id, key_before);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::complete_skipped;
    use crate::functionality::{build_functionality, to_matrix};
    use crate::Circuit;
    use approx::abs_diff_eq;
    use ndarray::Array2;
    use num_complex::Complex64;

    fn cnot_setup() -> (Package, Circuit, Edge) {
        let mut qc = Circuit::new(2);
        qc.cx(0, 1);
        let mut pkg = Package::new(2);
        let root = build_functionality(&mut pkg, &qc);
        complete_skipped(&mut pkg, root);
        (pkg, qc, root)
    }

    fn permuted_matrix(m: &Array2<Complex64>, perm_rows: &[usize]) -> Array2<Complex64> {
        let dim = m.nrows();
        let mut out = Array2::zeros((dim, dim));
        for r in 0..dim {
            for c in 0..dim {
                out[[perm_rows[r], perm_rows[c]]] = m[[r, c]];
            }
        }
        out
    }

    #[test]
    fn swap_permutes_the_represented_matrix() {
        let (mut pkg, mut qc, root) = cnot_setup();
        let before = to_matrix(&pkg, root, 2);
        level_exchange(&mut pkg, &mut qc.output_permutation, 1, false);
        assert_eq!(qc.output_permutation, vec![1, 0]);
        let after = to_matrix(&pkg, root, 2);
        // Bit-reversal of row and column indices for two qubits: 01 <-> 10.
        let expected = permuted_matrix(&before, &[0, 2, 1, 3]);
        assert!(abs_diff_eq!(after, expected, epsilon = 1e-9));
        assert!(pkg.check_canonicity(root));
        assert!(pkg.check_ref_counts(root));
    }

    #[test]
    fn swap_twice_is_the_identity_on_nodes_and_permutation() {
        let (mut pkg, mut qc, root) = cnot_setup();
        let nodes_before: Vec<_> = pkg.node(root.node).edges.to_vec();
        level_exchange(&mut pkg, &mut qc.output_permutation, 1, false);
        level_exchange(&mut pkg, &mut qc.output_permutation, 1, false);
        assert_eq!(qc.output_permutation, vec![0, 1]);
        // The orphaned originals were still in the table, so the rebuilt
        // children canonicalise to exactly the original node set.
        assert_eq!(pkg.node(root.node).edges.to_vec(), nodes_before);
        assert!(pkg.check_level_contiguity(root));
    }

    #[test]
    fn linear_transforms_are_involutions() {
        for scheme in [ReorderScheme::LtUpper, ReorderScheme::LtLower] {
            let (mut pkg, mut qc, root) = cnot_setup();
            let before = to_matrix(&pkg, root, 2);
            let size_before = pkg.size(root);
            linear_trans(&mut pkg, &mut qc.output_permutation, 1, scheme, false);
            assert_eq!(qc.output_permutation, vec![0, 1]);
            linear_trans(&mut pkg, &mut qc.output_permutation, 1, scheme, false);
            let after = to_matrix(&pkg, root, 2);
            assert!(abs_diff_eq!(after, before, epsilon = 1e-9));
            assert_eq!(pkg.size(root), size_before);
            assert!(pkg.check_ref_counts(root));
        }
    }

    #[test]
    fn matched_linear_transform_absorbs_the_cnot() {
        // The upper transform is exactly the XOR a lower-controlled CNOT
        // implements, so it leaves the diagram at its minimal four nodes.
        let (mut pkg, mut qc, root) = cnot_setup();
        linear_trans(
            &mut pkg,
            &mut qc.output_permutation,
            1,
            ReorderScheme::LtUpper,
            false,
        );
        assert!(pkg.size(root) <= 4);
        assert!(pkg.check_canonicity(root));
    }

    #[test]
    fn swap_keeps_size_small_on_cnot() {
        let (mut pkg, mut qc, root) = cnot_setup();
        assert!(pkg.size(root) <= 4);
        level_exchange(&mut pkg, &mut qc.output_permutation, 1, false);
        assert!(pkg.size(root) <= 4);
    }
}
