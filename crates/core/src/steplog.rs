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

//! The step log: an append-only history of primitive applications.
//!
//! Every recorded step is self-inverse (swapping twice restores, a linear
//! transform applied twice is the identity), so the log doubles as the
//! restore path: inverse-replay newest-to-oldest rewinds the diagram to the
//! state before the log, forward replay reproduces any recorded intermediate
//! state.

use itertools::Itertools;

/// Which rewrite a step (or a whole reordering run) uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ReorderScheme {
    None,
    Sifting,
    LtUpper,
    LtLower,
    LtMixed,
}

/// One recorded primitive application and the diagram size it produced.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ReorderStep {
    pub level: u32,
    pub scheme: ReorderScheme,
    pub up: bool,
    pub dd_size: usize,
}

/// The best configuration seen during a sweep, updated monotonically.
#[derive(Copy, Clone, Debug)]
pub struct OptimalState {
    pub level: u32,
    pub scheme: ReorderScheme,
    pub up: bool,
    pub min_size: usize,
}

impl OptimalState {
    /// Whether `step` is the recorded step that produced this state.
    pub fn matches(&self, step: &ReorderStep) -> bool {
        step.level == self.level && step.scheme == self.scheme && step.up == self.up
    }
}

#[derive(Clone, Debug, Default)]
pub struct StepLog {
    steps: Vec<ReorderStep>,
}

impl StepLog {
    pub fn new() -> StepLog {
        StepLog { steps: Vec::new() }
    }

    pub fn record(&mut self, level: u32, scheme: ReorderScheme, up: bool, dd_size: usize) {
        self.steps.push(ReorderStep {
            level,
            scheme,
            up,
            dd_size,
        });
    }

    pub fn push(&mut self, step: ReorderStep) {
        self.steps.push(step);
    }

    pub fn pop(&mut self) -> Option<ReorderStep> {
        self.steps.pop()
    }

    pub fn last(&self) -> Option<&ReorderStep> {
        self.steps.last()
    }

    pub fn at(&self, i: usize) -> &ReorderStep {
        &self.steps[i]
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.steps.truncate(len);
    }

    pub fn clear(&mut self) {
        self.steps.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReorderStep> {
        self.steps.iter()
    }

    /// Smallest diagram size any recorded step produced.
    pub fn min_size(&self) -> Option<usize> {
        self.steps.iter().map(|s| s.dd_size).min()
    }
}

/// Render the current variable order, then replay the logged exchanges from
/// the initial layout as a verification line.  Both lines list the qubit of
/// each level position as `prefix<id>`, bottom level first.
pub fn print_order(log: &StepLog, perm: &[u32], initial_layout: &[u32], prefix: &str) -> String {
    let mut out = perm.iter().map(|q| format!("{prefix}{q}")).join(" ");
    out.push('\n');

    let mut replayed = initial_layout.to_vec();
    for step in log.iter() {
        if step.scheme == ReorderScheme::Sifting {
            let pos = step.level as usize;
            if step.up {
                replayed.swap(pos, pos + 1);
            } else {
                replayed.swap(pos, pos - 1);
            }
        }
    }
    out.push_str(&replayed.iter().map(|q| format!("{prefix}{q}")).join(" "));
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_and_pop_are_lifo() {
        let mut log = StepLog::new();
        log.record(2, ReorderScheme::Sifting, false, 17);
        log.record(1, ReorderScheme::LtUpper, false, 12);
        assert_eq!(log.len(), 2);
        assert_eq!(log.last().unwrap().scheme, ReorderScheme::LtUpper);
        let popped = log.pop().unwrap();
        assert_eq!(popped.level, 1);
        assert_eq!(log.len(), 1);
        assert_eq!(log.min_size(), Some(17));
    }

    #[test]
    fn print_order_replays_only_exchanges() {
        let mut log = StepLog::new();
        // One downward exchange at level 2, one linear transform (which does
        // not move qubits), one upward exchange at level 0.
        log.record(2, ReorderScheme::Sifting, false, 10);
        log.record(2, ReorderScheme::LtLower, false, 9);
        log.record(0, ReorderScheme::Sifting, true, 8);
        let perm = vec![1, 2, 0];
        let text = print_order(&log, &perm, &[0, 1, 2], "x");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "x1 x2 x0");
        // Replay: [0,1,2] -> swap(2,1) -> [0,2,1] -> swap(0,1) -> [2,0,1].
        assert_eq!(lines[1], "x2 x0 x1");
    }
}
