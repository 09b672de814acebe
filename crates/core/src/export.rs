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

//! Graphviz export of a matrix DAG.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use hashbrown::HashSet;

use crate::complex::WeightId;
use crate::node::{Edge, NodeId};
use crate::package::Package;

pub fn export_dot<P: AsRef<Path>>(pkg: &Package, root: Edge, path: P) -> io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_dot(pkg, root, &mut writer)
}

/// Write the diagram in dot format: one circle per node labelled with its
/// level, a box for the terminal, zero edges suppressed and non-unit weights
/// as edge labels.
pub fn write_dot<W: Write>(pkg: &Package, root: Edge, out: &mut W) -> io::Result<()> {
    writeln!(out, "digraph \"DD\" {{")?;
    writeln!(out, "  graph [rankdir=TB];")?;
    writeln!(out, "  root [shape=point];")?;
    writeln!(out, "  t [shape=box, label=\"1\"];")?;

    if root.is_terminal() {
        writeln!(out, "  root -> t{};", weight_label(pkg, root.weight))?;
        return writeln!(out, "}}");
    }
    writeln!(
        out,
        "  root -> n{}{};",
        root.node.0,
        weight_label(pkg, root.weight)
    )?;

    let mut seen: HashSet<NodeId> = HashSet::new();
    seen.insert(root.node);
    let mut stack = vec![root.node];
    while let Some(id) = stack.pop() {
        let node = pkg.node(id);
        writeln!(out, "  n{} [shape=circle, label=\"q{}\"];", id.0, node.v)?;
        for (i, edge) in node.edges.iter().enumerate() {
            if edge.is_zero() {
                continue;
            }
            if edge.is_terminal() {
                writeln!(
                    out,
                    "  n{} -> t [taillabel=\"{}\"{}];",
                    id.0,
                    i,
                    weight_attr(pkg, edge.weight)
                )?;
            } else {
                writeln!(
                    out,
                    "  n{} -> n{} [taillabel=\"{}\"{}];",
                    id.0,
                    edge.node.0,
                    i,
                    weight_attr(pkg, edge.weight)
                )?;
                if seen.insert(edge.node) {
                    stack.push(edge.node);
                }
            }
        }
    }
    writeln!(out, "}}")
}

fn format_weight(pkg: &Package, w: WeightId) -> String {
    let value = pkg.weight(w);
    if value.im == 0.0 {
        format!("{}", value.re)
    } else if value.re == 0.0 {
        format!("{}i", value.im)
    } else {
        format!("{}{:+}i", value.re, value.im)
    }
}

fn weight_label(pkg: &Package, w: WeightId) -> String {
    if w == WeightId::ONE {
        String::new()
    } else {
        format!(" [label=\"{}\"]", format_weight(pkg, w))
    }
}

fn weight_attr(pkg: &Package, w: WeightId) -> String {
    if w == WeightId::ONE {
        String::new()
    } else {
        format!(", label=\"{}\"", format_weight(pkg, w))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functionality::build_functionality;
    use crate::Circuit;

    #[test]
    fn dot_output_mentions_every_level() {
        let mut pkg = Package::new(2);
        let mut qc = Circuit::new(2);
        qc.cx(0, 1);
        let root = build_functionality(&mut pkg, &qc);
        let mut buffer = Vec::new();
        write_dot(&pkg, root, &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("digraph"));
        assert!(text.contains("q1"));
        assert!(text.contains("q0"));
        assert!(text.contains("-> t"));
    }
}
