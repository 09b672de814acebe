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

//! Quantum circuit model and a line-oriented OpenQASM 2 subset parser.
//!
//! Gates are a single-qubit base matrix plus a list of positive controls;
//! multi-qubit standard gates (`cx`, `ccx`, `cz`, ...) are expressed that
//! way, and `swap` lowers to three `cx` during parsing and building.

use std::f64::consts::PI;
use std::path::Path;

use num_complex::Complex64;
use smallvec::{smallvec, SmallVec};
use thiserror::Error;

use crate::gate_matrix;

#[derive(Clone, Debug, Copy, Eq, PartialEq, Hash)]
pub enum StandardGate {
    IGate,
    XGate,
    YGate,
    ZGate,
    HGate,
    SGate,
    SdgGate,
    TGate,
    TdgGate,
    SXGate,
    RXGate,
    RYGate,
    RZGate,
    PhaseGate,
}

impl StandardGate {
    pub fn name(&self) -> &str {
        match self {
            Self::IGate => "id",
            Self::XGate => "x",
            Self::YGate => "y",
            Self::ZGate => "z",
            Self::HGate => "h",
            Self::SGate => "s",
            Self::SdgGate => "sdg",
            Self::TGate => "t",
            Self::TdgGate => "tdg",
            Self::SXGate => "sx",
            Self::RXGate => "rx",
            Self::RYGate => "ry",
            Self::RZGate => "rz",
            Self::PhaseGate => "p",
        }
    }

    pub fn num_params(&self) -> u32 {
        match self {
            Self::RXGate | Self::RYGate | Self::RZGate | Self::PhaseGate => 1,
            _ => 0,
        }
    }

    /// The 2x2 base matrix; controlled variants are this matrix plus the
    /// control list on the [`Gate`].
    pub fn base_matrix(&self, params: &[f64]) -> [[Complex64; 2]; 2] {
        match self {
            Self::IGate => gate_matrix::ONE_QUBIT_IDENTITY,
            Self::XGate => gate_matrix::XGATE,
            Self::YGate => gate_matrix::YGATE,
            Self::ZGate => gate_matrix::ZGATE,
            Self::HGate => gate_matrix::HGATE,
            Self::SGate => gate_matrix::SGATE,
            Self::SdgGate => gate_matrix::SDGGATE,
            Self::TGate => gate_matrix::TGATE,
            Self::TdgGate => gate_matrix::TDGGATE,
            Self::SXGate => gate_matrix::SXGATE,
            Self::RXGate => gate_matrix::rx_gate(params[0]),
            Self::RYGate => gate_matrix::ry_gate(params[0]),
            Self::RZGate => gate_matrix::rz_gate(params[0]),
            Self::PhaseGate => gate_matrix::phase_gate(params[0]),
        }
    }

    /// Map a QASM mnemonic to the base gate and its implied control count.
    fn from_name(name: &str) -> Option<(StandardGate, usize)> {
        let gate = match name {
            "id" | "i" | "u0" => (Self::IGate, 0),
            "x" => (Self::XGate, 0),
            "y" => (Self::YGate, 0),
            "z" => (Self::ZGate, 0),
            "h" => (Self::HGate, 0),
            "s" => (Self::SGate, 0),
            "sdg" => (Self::SdgGate, 0),
            "t" => (Self::TGate, 0),
            "tdg" => (Self::TdgGate, 0),
            "sx" => (Self::SXGate, 0),
            "rx" => (Self::RXGate, 0),
            "ry" => (Self::RYGate, 0),
            "rz" => (Self::RZGate, 0),
            "p" | "u1" => (Self::PhaseGate, 0),
            "cx" | "CX" => (Self::XGate, 1),
            "cy" => (Self::YGate, 1),
            "cz" => (Self::ZGate, 1),
            "ch" => (Self::HGate, 1),
            "crz" => (Self::RZGate, 1),
            "cp" | "cu1" => (Self::PhaseGate, 1),
            "ccx" => (Self::XGate, 2),
            _ => return None,
        };
        Some(gate)
    }
}

#[derive(Clone, Debug)]
pub struct Gate {
    pub gate: StandardGate,
    pub params: SmallVec<[f64; 1]>,
    pub controls: SmallVec<[u32; 2]>,
    pub target: u32,
}

#[derive(Error, Debug)]
pub enum QasmError {
    #[error("failed to read circuit file: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: malformed statement `{stmt}`")]
    Malformed { line: usize, stmt: String },
    #[error("line {line}: unknown gate `{name}`")]
    UnknownGate { line: usize, name: String },
    #[error("line {line}: unsupported statement `{stmt}`")]
    Unsupported { line: usize, stmt: String },
    #[error("line {line}: unknown register `{name}`")]
    UnknownRegister { line: usize, name: String },
    #[error("line {line}: qubit `{name}[{index}]` out of range")]
    QubitOutOfRange {
        line: usize,
        name: String,
        index: u32,
    },
    #[error("gate listed before any qreg declaration")]
    MissingRegister,
}

/// A circuit over `num_qubits` qubits together with its layout bookkeeping.
///
/// `output_permutation` maps level position to logical qubit id and is the
/// array the reordering primitives mutate; `initial_layout` is the snapshot
/// taken at construction time that `print_order` replays against.
#[derive(Clone, Debug)]
pub struct Circuit {
    pub num_qubits: usize,
    pub gates: Vec<Gate>,
    pub initial_layout: Vec<u32>,
    pub output_permutation: Vec<u32>,
}

impl Circuit {
    pub fn new(num_qubits: usize) -> Circuit {
        let identity: Vec<u32> = (0..num_qubits as u32).collect();
        Circuit {
            num_qubits,
            gates: Vec::new(),
            initial_layout: identity.clone(),
            output_permutation: identity,
        }
    }

    pub fn add(
        &mut self,
        gate: StandardGate,
        params: SmallVec<[f64; 1]>,
        controls: SmallVec<[u32; 2]>,
        target: u32,
    ) {
        debug_assert!((target as usize) < self.num_qubits);
        debug_assert!(controls.iter().all(|&c| (c as usize) < self.num_qubits && c != target));
        self.gates.push(Gate {
            gate,
            params,
            controls,
            target,
        });
    }

    pub fn id(&mut self, q: u32) {
        self.add(StandardGate::IGate, smallvec![], smallvec![], q);
    }

    pub fn x(&mut self, q: u32) {
        self.add(StandardGate::XGate, smallvec![], smallvec![], q);
    }

    pub fn y(&mut self, q: u32) {
        self.add(StandardGate::YGate, smallvec![], smallvec![], q);
    }

    pub fn z(&mut self, q: u32) {
        self.add(StandardGate::ZGate, smallvec![], smallvec![], q);
    }

    pub fn h(&mut self, q: u32) {
        self.add(StandardGate::HGate, smallvec![], smallvec![], q);
    }

    pub fn s(&mut self, q: u32) {
        self.add(StandardGate::SGate, smallvec![], smallvec![], q);
    }

    pub fn sdg(&mut self, q: u32) {
        self.add(StandardGate::SdgGate, smallvec![], smallvec![], q);
    }

    pub fn t(&mut self, q: u32) {
        self.add(StandardGate::TGate, smallvec![], smallvec![], q);
    }

    pub fn tdg(&mut self, q: u32) {
        self.add(StandardGate::TdgGate, smallvec![], smallvec![], q);
    }

    pub fn rx(&mut self, theta: f64, q: u32) {
        self.add(StandardGate::RXGate, smallvec![theta], smallvec![], q);
    }

    pub fn ry(&mut self, theta: f64, q: u32) {
        self.add(StandardGate::RYGate, smallvec![theta], smallvec![], q);
    }

    pub fn rz(&mut self, theta: f64, q: u32) {
        self.add(StandardGate::RZGate, smallvec![theta], smallvec![], q);
    }

    pub fn p(&mut self, lam: f64, q: u32) {
        self.add(StandardGate::PhaseGate, smallvec![lam], smallvec![], q);
    }

    pub fn cx(&mut self, control: u32, target: u32) {
        self.add(StandardGate::XGate, smallvec![], smallvec![control], target);
    }

    pub fn cz(&mut self, control: u32, target: u32) {
        self.add(StandardGate::ZGate, smallvec![], smallvec![control], target);
    }

    pub fn cp(&mut self, lam: f64, control: u32, target: u32) {
        self.add(StandardGate::PhaseGate, smallvec![lam], smallvec![control], target);
    }

    pub fn ccx(&mut self, c0: u32, c1: u32, target: u32) {
        self.add(StandardGate::XGate, smallvec![], smallvec![c0, c1], target);
    }

    pub fn swap(&mut self, a: u32, b: u32) {
        self.cx(a, b);
        self.cx(b, a);
        self.cx(a, b);
    }

    pub fn from_qasm_file<P: AsRef<Path>>(path: P) -> Result<Circuit, QasmError> {
        let source = std::fs::read_to_string(path)?;
        Circuit::from_qasm_str(&source)
    }

    /// Parse the OpenQASM 2 subset used by the circuit corpora: header and
    /// include lines, `qreg`/`creg` declarations and gate applications with
    /// optional angle expressions over `pi`.  `barrier`, `measure` and
    /// `reset` statements are tolerated and ignored.
    pub fn from_qasm_str(source: &str) -> Result<Circuit, QasmError> {
        let mut registers: Vec<(String, u32, u32)> = Vec::new();
        let mut num_qubits: u32 = 0;
        let mut gates: Vec<(StandardGate, SmallVec<[f64; 1]>, SmallVec<[u32; 2]>, u32)> =
            Vec::new();

        for (lineno, raw) in source.lines().enumerate() {
            let line = lineno + 1;
            let text = raw.split("//").next().unwrap_or("");
            for stmt in text.split(';') {
                let stmt = stmt.trim();
                if stmt.is_empty() {
                    continue;
                }
                let head = stmt.split_whitespace().next().unwrap_or("");
                match head {
                    "OPENQASM" | "include" | "creg" | "barrier" | "measure" | "reset" => continue,
                    "qreg" => {
                        let (name, width) = parse_declaration(stmt, line)?;
                        registers.push((name, num_qubits, width));
                        num_qubits += width;
                        continue;
                    }
                    "gate" | "opaque" | "if" => {
                        return Err(QasmError::Unsupported {
                            line,
                            stmt: stmt.to_string(),
                        });
                    }
                    _ => {}
                }

                let (name, params, args) = split_application(stmt, line)?;
                let mut qubits: SmallVec<[u32; 4]> = SmallVec::new();
                for arg in &args {
                    qubits.push(resolve_qubit(arg, &registers, line)?);
                }
                if name == "swap" {
                    if qubits.len() != 2 {
                        return Err(QasmError::Malformed {
                            line,
                            stmt: stmt.to_string(),
                        });
                    }
                    let (a, b) = (qubits[0], qubits[1]);
                    gates.push((StandardGate::XGate, smallvec![], smallvec![a], b));
                    gates.push((StandardGate::XGate, smallvec![], smallvec![b], a));
                    gates.push((StandardGate::XGate, smallvec![], smallvec![a], b));
                    continue;
                }
                let (gate, num_controls) =
                    StandardGate::from_name(&name).ok_or_else(|| QasmError::UnknownGate {
                        line,
                        name: name.clone(),
                    })?;
                if qubits.len() != num_controls + 1 || params.len() != gate.num_params() as usize {
                    return Err(QasmError::Malformed {
                        line,
                        stmt: stmt.to_string(),
                    });
                }
                let target = qubits[num_controls];
                let controls: SmallVec<[u32; 2]> = qubits[..num_controls].iter().copied().collect();
                gates.push((gate, params, controls, target));
            }
        }

        if num_qubits == 0 {
            return Err(QasmError::MissingRegister);
        }
        let mut circuit = Circuit::new(num_qubits as usize);
        for (gate, params, controls, target) in gates {
            circuit.add(gate, params, controls, target);
        }
        Ok(circuit)
    }
}

/// Parse `qreg name[width]`.
fn parse_declaration(stmt: &str, line: usize) -> Result<(String, u32), QasmError> {
    let malformed = || QasmError::Malformed {
        line,
        stmt: stmt.to_string(),
    };
    let rest = stmt.split_whitespace().nth(1).ok_or_else(malformed)?;
    let open = rest.find('[').ok_or_else(malformed)?;
    let close = rest.find(']').ok_or_else(malformed)?;
    if close < open {
        return Err(malformed());
    }
    let name = rest[..open].to_string();
    let width: u32 = rest[open + 1..close].parse().map_err(|_| malformed())?;
    Ok((name, width))
}

/// Split a gate application into mnemonic, evaluated parameters and argument
/// strings: `crz(pi/2) q[0],q[1]`.
fn split_application(
    stmt: &str,
    line: usize,
) -> Result<(String, SmallVec<[f64; 1]>, Vec<String>), QasmError> {
    let malformed = || QasmError::Malformed {
        line,
        stmt: stmt.to_string(),
    };
    let name_end = stmt
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(stmt.len());
    let name = stmt[..name_end].to_string();
    if name.is_empty() {
        return Err(malformed());
    }
    let rest = stmt[name_end..].trim_start();
    let mut params: SmallVec<[f64; 1]> = SmallVec::new();
    let args_text = if let Some(inner) = rest.strip_prefix('(') {
        let close = inner.find(')').ok_or_else(malformed)?;
        for piece in inner[..close].split(',') {
            params.push(eval_angle(piece).ok_or_else(malformed)?);
        }
        &inner[close + 1..]
    } else {
        rest
    };
    let args: Vec<String> = args_text
        .split(',')
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect();
    if args.is_empty() {
        return Err(malformed());
    }
    Ok((name, params, args))
}

fn resolve_qubit(
    arg: &str,
    registers: &[(String, u32, u32)],
    line: usize,
) -> Result<u32, QasmError> {
    let malformed = || QasmError::Malformed {
        line,
        stmt: arg.to_string(),
    };
    let open = arg.find('[').ok_or_else(malformed)?;
    let close = arg.find(']').ok_or_else(malformed)?;
    if close < open {
        return Err(malformed());
    }
    let name = &arg[..open];
    let index: u32 = arg[open + 1..close].parse().map_err(|_| malformed())?;
    let (_, offset, width) = registers
        .iter()
        .find(|(reg, _, _)| reg == name)
        .ok_or_else(|| QasmError::UnknownRegister {
            line,
            name: name.to_string(),
        })?;
    if index >= *width {
        return Err(QasmError::QubitOutOfRange {
            line,
            name: name.to_string(),
            index,
        });
    }
    Ok(offset + index)
}

/// Evaluate a flat angle expression: `pi`, literals, `*`, `/` and a unary
/// leading minus, left to right.
fn eval_angle(expr: &str) -> Option<f64> {
    let mut acc: Option<f64> = None;
    let mut op = '*';
    let mut atom = String::new();
    for ch in expr.chars().chain(std::iter::once('*')) {
        match ch {
            '*' | '/' => {
                let value = eval_atom(atom.trim())?;
                acc = Some(match (acc, op) {
                    (None, _) => value,
                    (Some(a), '*') => a * value,
                    (Some(a), _) => a / value,
                });
                op = ch;
                atom.clear();
            }
            _ => atom.push(ch),
        }
    }
    acc
}

fn eval_atom(atom: &str) -> Option<f64> {
    if let Some(rest) = atom.strip_prefix('-') {
        return eval_atom(rest.trim()).map(|v| -v);
    }
    match atom {
        "pi" => Some(PI),
        _ => atom.parse().ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_lowers_swap_to_three_cx() {
        let mut qc = Circuit::new(2);
        qc.swap(0, 1);
        assert_eq!(qc.gates.len(), 3);
        assert!(qc
            .gates
            .iter()
            .all(|g| g.gate == StandardGate::XGate && g.controls.len() == 1));
    }

    #[test]
    fn parses_a_bell_pair_program() {
        let qc = Circuit::from_qasm_str(
            "OPENQASM 2.0;\ninclude \"qelib1.inc\";\nqreg q[2];\ncreg c[2];\nh q[0];\ncx q[0],q[1];\nmeasure q[0] -> c[0];\n",
        )
        .unwrap();
        assert_eq!(qc.num_qubits, 2);
        assert_eq!(qc.gates.len(), 2);
        assert_eq!(qc.gates[0].gate, StandardGate::HGate);
        assert_eq!(qc.gates[1].gate, StandardGate::XGate);
        assert_eq!(qc.gates[1].controls.as_slice(), &[0]);
        assert_eq!(qc.gates[1].target, 1);
    }

    #[test]
    fn parses_angle_expressions() {
        let qc = Circuit::from_qasm_str("qreg q[1];\nrz(pi/2) q[0];\np(-pi/4) q[0];\nrx(3*pi/2) q[0];\n")
            .unwrap();
        assert_eq!(qc.gates.len(), 3);
        assert!((qc.gates[0].params[0] - PI / 2.).abs() < 1e-12);
        assert!((qc.gates[1].params[0] + PI / 4.).abs() < 1e-12);
        assert!((qc.gates[2].params[0] - 3. * PI / 2.).abs() < 1e-12);
    }

    #[test]
    fn multiple_registers_are_offset() {
        let qc = Circuit::from_qasm_str("qreg a[2];\nqreg b[2];\ncx a[1],b[0];\n").unwrap();
        assert_eq!(qc.num_qubits, 4);
        assert_eq!(qc.gates[0].controls.as_slice(), &[1]);
        assert_eq!(qc.gates[0].target, 2);
    }

    #[test]
    fn rejects_unknown_gates() {
        let err = Circuit::from_qasm_str("qreg q[1];\nfrobnicate q[0];\n").unwrap_err();
        assert!(matches!(err, QasmError::UnknownGate { line: 2, .. }));
    }
}
