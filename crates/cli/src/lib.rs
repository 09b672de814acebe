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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use qmdd_core::{
    build_functionality, complete_skipped, export_dot, print_order, reorder_select,
    reorder_until_stable, Circuit, Package, ReorderScheme, StepLog, DEFAULT_STABILITY_ROUNDS,
};

#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Circuit description file (OpenQASM 2 subset).
    pub circuit: PathBuf,

    /// Consecutive stationary iterations before the outer loop stops.
    #[arg(short = 'k', long, default_value_t = DEFAULT_STABILITY_ROUNDS)]
    pub rounds: usize,

    /// Export the reordered diagram as a Graphviz file.
    #[arg(long)]
    pub dot: Option<PathBuf>,

    /// Prefix used when printing the variable order.
    #[arg(long, default_value = "x")]
    pub qubit_prefix: String,
}

/// Build the functional diagram, complete it, report a single sifting pass
/// as the baseline and then run the outer loop under `scheme`.
pub fn run(scheme: ReorderScheme, args: Args) -> Result<()> {
    let mut qc = Circuit::from_qasm_file(&args.circuit)
        .with_context(|| format!("failed to load circuit {}", args.circuit.display()))?;
    info!("{}: {} qubits, {} gates", args.circuit.display(), qc.num_qubits, qc.gates.len());

    let mut pkg = Package::new(qc.num_qubits);
    let root = build_functionality(&mut pkg, &qc);
    let initial_size = pkg.size(root);
    complete_skipped(&mut pkg, root);
    let completed_size = pkg.size(root);
    println!("initial dd size: {initial_size}");
    println!("after completing, dd size: {completed_size}");

    let mut log = StepLog::new();
    reorder_select(
        &mut pkg,
        root,
        &mut qc.output_permutation,
        ReorderScheme::Sifting,
        Some(&mut log),
    );
    println!("dd size after one sifting pass: {}", pkg.size(root));

    let summary = reorder_until_stable(
        &mut pkg,
        root,
        &mut qc.output_permutation,
        scheme,
        Some(&mut log),
        args.rounds,
    );
    println!(
        "final dd size: {} ({} iterations)",
        summary.final_size, summary.iterations
    );
    print!(
        "{}",
        print_order(
            &log,
            &qc.output_permutation,
            &qc.initial_layout,
            &args.qubit_prefix
        )
    );

    if let Some(path) = &args.dot {
        export_dot(&pkg, root, path)
            .with_context(|| format!("failed to write {}", path.display()))?;
    }
    Ok(())
}
