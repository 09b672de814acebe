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

//! Construction of the functional matrix DAG from a circuit.
//!
//! Gate diagrams only materialise the involved levels; everywhere else the
//! identity is implicit, either as a non-zero terminal edge or as an edge
//! that jumps more than one level down.  `add` and `multiply` interpret such
//! edges as identity-extended blocks, which is also why the completion pass
//! exists: the finished functionality carries those shortcuts until the
//! reordering machinery asks for explicit levels.

use ndarray::Array2;
use num_complex::Complex64;

use crate::circuit::{Circuit, Gate};
use crate::complex::WeightId;
use crate::node::{Edge, NEDGE};
use crate::package::Package;

fn top_var(pkg: &Package, e: Edge) -> i32 {
    if e.is_terminal() {
        -1
    } else {
        pkg.node(e.node).v as i32
    }
}

/// Quadrant `i` of operand `e` in a level-`v` context, weight folded in.
///
/// An operand that does not top out at `v` (a terminal, or a node further
/// down) is an identity-extended block: it passes through unchanged on the
/// diagonal quadrants and is zero off the diagonal.
fn quadrant(pkg: &mut Package, e: Edge, v: u32, i: usize) -> Edge {
    if e.weight == WeightId::ZERO {
        return Edge::zero();
    }
    if !e.is_terminal() && pkg.node(e.node).v == v {
        let child = pkg.node(e.node).edges[i];
        if child.weight == WeightId::ZERO {
            return Edge::zero();
        }
        let weight = pkg.weights.mul(e.weight, child.weight);
        if weight == WeightId::ZERO {
            return Edge::zero();
        }
        return Edge {
            node: child.node,
            weight,
        };
    }
    if i == 0 || i == 3 {
        e
    } else {
        Edge::zero()
    }
}

/// Pointwise sum of two blocks.
pub fn add(pkg: &mut Package, x: Edge, y: Edge) -> Edge {
    if x.weight == WeightId::ZERO {
        return y;
    }
    if y.weight == WeightId::ZERO {
        return x;
    }
    if x.node == y.node {
        // Covers the terminal-terminal case and shared sub-blocks alike.
        let sum = pkg.weight(x.weight) + pkg.weight(y.weight);
        let weight = pkg.lookup_weight(sum);
        return if weight == WeightId::ZERO {
            Edge::zero()
        } else {
            Edge {
                node: x.node,
                weight,
            }
        };
    }
    // Addition commutes; cache under a canonical operand order.
    let (x, y) = if (y.node.0, y.weight.0) < (x.node.0, x.weight.0) {
        (y, x)
    } else {
        (x, y)
    };
    if let Some(&cached) = pkg.add_cache.get(&(x, y)) {
        return cached;
    }
    let v = top_var(pkg, x).max(top_var(pkg, y)) as u32;
    let mut cells = [Edge::zero(); NEDGE];
    for (i, cell) in cells.iter_mut().enumerate() {
        let xq = quadrant(pkg, x, v, i);
        let yq = quadrant(pkg, y, v, i);
        *cell = add(pkg, xq, yq);
    }
    let result = pkg.make_dd_node(v, cells);
    pkg.add_cache.insert((x, y), result);
    result
}

/// Block matrix product `x · y`.
pub fn multiply(pkg: &mut Package, x: Edge, y: Edge) -> Edge {
    if x.weight == WeightId::ZERO || y.weight == WeightId::ZERO {
        return Edge::zero();
    }
    // A terminal operand is a scaled identity, so it only scales the other.
    if x.is_terminal() {
        return scaled(pkg, y, x.weight);
    }
    if y.is_terminal() {
        return scaled(pkg, x, y.weight);
    }
    if let Some(&cached) = pkg.mul_cache.get(&(x, y)) {
        return cached;
    }
    let v = top_var(pkg, x).max(top_var(pkg, y)) as u32;
    let mut cells = [Edge::zero(); NEDGE];
    for r in 0..2 {
        for c in 0..2 {
            let mut acc = Edge::zero();
            for k in 0..2 {
                let xq = quadrant(pkg, x, v, 2 * r + k);
                let yq = quadrant(pkg, y, v, 2 * k + c);
                let product = multiply(pkg, xq, yq);
                acc = add(pkg, acc, product);
            }
            cells[2 * r + c] = acc;
        }
    }
    let result = pkg.make_dd_node(v, cells);
    pkg.mul_cache.insert((x, y), result);
    result
}

fn scaled(pkg: &mut Package, e: Edge, factor: WeightId) -> Edge {
    let weight = pkg.weights.mul(e.weight, factor);
    if weight == WeightId::ZERO {
        Edge::zero()
    } else {
        Edge {
            node: e.node,
            weight,
        }
    }
}

/// Explicit identity diagram over `n` levels (no level skipping).
pub fn make_ident(pkg: &mut Package, n: usize) -> Edge {
    let mut e = Edge::one();
    for v in 0..n as u32 {
        e = pkg.make_dd_node(v, [e, Edge::zero(), Edge::zero(), e]);
    }
    e
}

/// Diagram of a single-qubit base matrix with positive controls; only the
/// involved levels are materialised.
pub fn make_gate_dd(
    pkg: &mut Package,
    matrix: &[[Complex64; 2]; 2],
    target: u32,
    controls: &[u32],
) -> Edge {
    let mut em = [
        pkg.terminal_edge(matrix[0][0]),
        pkg.terminal_edge(matrix[0][1]),
        pkg.terminal_edge(matrix[1][0]),
        pkg.terminal_edge(matrix[1][1]),
    ];
    let mut sorted: Vec<u32> = controls.to_vec();
    sorted.sort_unstable();
    debug_assert!(!sorted.contains(&target));

    for &c in sorted.iter().filter(|&&c| c < target) {
        for (i, entry) in em.iter_mut().enumerate() {
            // Control clear: identity on the diagonal entries, zero off it.
            let clear = if i == 0 || i == 3 {
                Edge::one()
            } else {
                Edge::zero()
            };
            *entry = pkg.make_dd_node(c, [clear, Edge::zero(), Edge::zero(), *entry]);
        }
    }
    let mut e = pkg.make_dd_node(target, em);
    for &c in sorted.iter().filter(|&&c| c > target) {
        e = pkg.make_dd_node(c, [Edge::one(), Edge::zero(), Edge::zero(), e]);
    }
    e
}

pub fn gate_dd(pkg: &mut Package, gate: &Gate) -> Edge {
    let matrix = gate.gate.base_matrix(&gate.params);
    make_gate_dd(pkg, &matrix, gate.target, &gate.controls)
}

/// Multiply the circuit's gates, left to right, into an identity.
///
/// The running product holds a reference throughout so that the garbage
/// collection between gates only reclaims discarded intermediates.  The
/// returned root edge always sits at level `n - 1` (explicit identity levels
/// are stacked on top if the top qubits are uninvolved) and is referenced.
pub fn build_functionality(pkg: &mut Package, circuit: &Circuit) -> Edge {
    assert_eq!(
        pkg.num_vars(),
        circuit.num_qubits,
        "package and circuit disagree on the qubit count"
    );
    let mut e = Edge::one();
    for gate in &circuit.gates {
        let g = gate_dd(pkg, gate);
        let product = multiply(pkg, g, e);
        pkg.inc_ref(product);
        pkg.dec_ref(e);
        e = product;
        pkg.garbage_collect(false);
    }
    for v in (top_var(pkg, e) + 1)..circuit.num_qubits as i32 {
        let wrapped = pkg.make_dd_node(v as u32, [e, Edge::zero(), Edge::zero(), e]);
        pkg.inc_ref(wrapped);
        pkg.dec_ref(e);
        e = wrapped;
    }
    e
}

/// Dense rendering of the represented matrix; test-sized inputs only.
pub fn to_matrix(pkg: &Package, e: Edge, n: usize) -> Array2<Complex64> {
    let dim = 1usize << n;
    let mut out = Array2::zeros((dim, dim));
    fill(pkg, e, n as i32 - 1, Complex64::new(1.0, 0.0), 0, 0, &mut out);
    out
}

fn fill(
    pkg: &Package,
    e: Edge,
    v: i32,
    acc: Complex64,
    row: usize,
    col: usize,
    out: &mut Array2<Complex64>,
) {
    if e.weight == WeightId::ZERO {
        return;
    }
    let acc = acc * pkg.weight(e.weight);
    if v < 0 {
        debug_assert!(e.is_terminal());
        out[[row, col]] = acc;
        return;
    }
    let half = 1usize << v;
    if e.is_terminal() || (pkg.node(e.node).v as i32) < v {
        // Identity-extended: the block repeats on the diagonal one level down.
        let sub = Edge {
            node: e.node,
            weight: WeightId::ONE,
        };
        fill(pkg, sub, v - 1, acc, row, col, out);
        fill(pkg, sub, v - 1, acc, row + half, col + half, out);
        return;
    }
    for (i, &child) in pkg.node(e.node).edges.iter().enumerate() {
        fill(
            pkg,
            child,
            v - 1,
            acc,
            row + (i >> 1) * half,
            col + (i & 1) * half,
            out,
        );
    }
}
