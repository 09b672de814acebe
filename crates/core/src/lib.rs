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

//! Quantum multi-valued decision diagrams over a hash-consed node store,
//! with dynamic variable reordering.
//!
//! A circuit's functional matrix is represented as a shared, reduced,
//! ordered DAG whose nodes each carry four weighted edges (the quadrants of
//! a block).  Reordering the variable levels permutes the matrix and can
//! shrink the diagram dramatically; the [`sifting`] driver sweeps one
//! variable at a time through the order using the in-place [`rewrite`]
//! primitives (exchange, upper and lower linear transform), logs every step
//! and restores the smallest configuration it saw.

pub mod arena;
pub mod circuit;
pub mod complex;
pub mod completion;
pub mod export;
pub mod functionality;
pub mod gate_matrix;
pub mod node;
pub mod orchestrator;
pub mod package;
pub mod rewrite;
pub mod sifting;
pub mod steplog;
pub mod unique_table;

pub use circuit::{Circuit, Gate, QasmError, StandardGate};
pub use complex::{ComplexTable, WeightId, TOLERANCE};
pub use completion::{complete_skipped, has_skipped_nodes};
pub use export::export_dot;
pub use functionality::{build_functionality, make_ident, multiply, to_matrix};
pub use node::{Edge, MatrixNode, NodeId, NEDGE};
pub use orchestrator::{reorder_until_stable, ReorderSummary, DEFAULT_STABILITY_ROUNDS};
pub use package::Package;
pub use rewrite::{level_exchange, linear_trans};
pub use sifting::reorder_select;
pub use steplog::{print_order, OptimalState, ReorderScheme, ReorderStep, StepLog};
