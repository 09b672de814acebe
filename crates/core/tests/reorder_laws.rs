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

//! Algebraic laws of the reordering machinery: self-inverse primitives, the
//! step log as a faithful restore path, and completion idempotence.

use std::f64::consts::PI;

use approx::abs_diff_eq;

use qmdd_core::sifting::undo_log;
use qmdd_core::{
    build_functionality, complete_skipped, has_skipped_nodes, print_order, reorder_select,
    to_matrix, Circuit, Package, ReorderScheme, StepLog,
};

fn ghz(n: usize) -> Circuit {
    let mut qc = Circuit::new(n);
    qc.h(0);
    for q in 1..n as u32 {
        qc.cx(0, q);
    }
    qc
}

fn qft(n: usize) -> Circuit {
    let mut qc = Circuit::new(n);
    for target in (0..n as u32).rev() {
        qc.h(target);
        for control in 0..target {
            qc.cp(PI / f64::from(1 << (target - control)), control, target);
        }
    }
    qc
}

fn completed_functionality(qc: &Circuit) -> (Package, qmdd_core::Edge) {
    let mut pkg = Package::new(qc.num_qubits);
    let root = build_functionality(&mut pkg, qc);
    complete_skipped(&mut pkg, root);
    (pkg, root)
}

#[test]
fn step_log_rewinds_a_full_sifting_pass() {
    let mut qc = ghz(4);
    let (mut pkg, root) = completed_functionality(&qc);
    let start_size = pkg.size(root);
    let start_matrix = to_matrix(&pkg, root, 4);

    let mut log = StepLog::new();
    reorder_select(
        &mut pkg,
        root,
        &mut qc.output_permutation,
        ReorderScheme::Sifting,
        Some(&mut log),
    );
    assert!(pkg.size(root) <= start_size);

    // The log is the path from the start state to the current state; undoing
    // it newest-to-oldest lands exactly back on the start configuration.
    undo_log(&mut pkg, &mut qc.output_permutation, &log);
    assert_eq!(pkg.size(root), start_size);
    assert_eq!(qc.output_permutation, vec![0, 1, 2, 3]);
    let rewound = to_matrix(&pkg, root, 4);
    assert!(abs_diff_eq!(rewound, start_matrix, epsilon = 1e-9));
}

#[test]
fn step_log_rewinds_a_mixed_pass() {
    let mut qc = qft(4);
    let (mut pkg, root) = completed_functionality(&qc);
    let start_size = pkg.size(root);
    let start_matrix = to_matrix(&pkg, root, 4);

    let mut log = StepLog::new();
    reorder_select(
        &mut pkg,
        root,
        &mut qc.output_permutation,
        ReorderScheme::LtMixed,
        Some(&mut log),
    );
    undo_log(&mut pkg, &mut qc.output_permutation, &log);
    assert_eq!(pkg.size(root), start_size);
    assert_eq!(qc.output_permutation, vec![0, 1, 2, 3]);
    let rewound = to_matrix(&pkg, root, 4);
    assert!(abs_diff_eq!(rewound, start_matrix, epsilon = 1e-9));
}

#[test]
fn completion_materialises_skips_idempotently() {
    // Gates between non-adjacent qubits leave level-skipping edges in the
    // constructed functionality.
    let mut qc = Circuit::new(3);
    qc.cz(0, 2);
    qc.cx(2, 0);
    let mut pkg = Package::new(3);
    let root = build_functionality(&mut pkg, &qc);
    assert!(has_skipped_nodes(&pkg, root));
    complete_skipped(&mut pkg, root);
    assert!(!has_skipped_nodes(&pkg, root));
    assert!(pkg.check_level_contiguity(root));
    let size = pkg.size(root);
    let matrix = to_matrix(&pkg, root, 3);
    complete_skipped(&mut pkg, root);
    assert_eq!(pkg.size(root), size);
    assert!(abs_diff_eq!(to_matrix(&pkg, root, 3), matrix, epsilon = 1e-12));
    assert!(pkg.check_ref_counts(root));
}

#[test]
fn completion_preserves_the_represented_matrix() {
    let qc = qft(4);
    let mut pkg = Package::new(4);
    let root = build_functionality(&mut pkg, &qc);
    let before = to_matrix(&pkg, root, 4);
    complete_skipped(&mut pkg, root);
    let after = to_matrix(&pkg, root, 4);
    assert!(abs_diff_eq!(after, before, epsilon = 1e-12));
}

#[test]
fn print_order_verification_agrees_after_reordering() {
    let mut qc = ghz(4);
    let (mut pkg, root) = completed_functionality(&qc);
    let mut log = StepLog::new();
    reorder_select(
        &mut pkg,
        root,
        &mut qc.output_permutation,
        ReorderScheme::LtMixed,
        Some(&mut log),
    );
    let text = print_order(&log, &qc.output_permutation, &qc.initial_layout, "x");
    let lines: Vec<&str> = text.lines().collect();
    // The replayed layout must reproduce the live permutation.
    assert_eq!(lines[0], lines[1]);
}

#[test]
fn primitives_preserve_invariants_across_a_pass() {
    let mut qc = ghz(4);
    let (mut pkg, root) = completed_functionality(&qc);
    reorder_select(
        &mut pkg,
        root,
        &mut qc.output_permutation,
        ReorderScheme::LtUpper,
        None,
    );
    assert!(pkg.check_canonicity(root));
    assert!(pkg.check_level_contiguity(root));
    assert!(pkg.check_ref_counts(root));
    // The permutation is still a permutation of the qubits.
    let mut sorted = qc.output_permutation.clone();
    sorted.sort_unstable();
    assert_eq!(sorted, vec![0, 1, 2, 3]);
}
