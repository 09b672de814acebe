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

#![allow(clippy::too_many_arguments)]

//! The sifting driver: move one variable at a time through the order,
//! tracking the smallest diagram seen, and restore to it.
//!
//! Every sweep step applies a plain exchange first and then (for the linear
//! variants) tries the configured transform on top, keeping it only when it
//! wins.  The per-sweep logs always contain a path from the current diagram
//! back to the sweep's start state and from the start state to the best
//! state, which is what the restoration phase walks.

use log::debug;

use crate::node::Edge;
use crate::package::Package;
use crate::rewrite::{level_exchange, linear_trans};
use crate::steplog::{OptimalState, ReorderScheme, ReorderStep, StepLog};

/// Dispatch a full reordering pass of the selected scheme.
///
/// The mixed variant runs the upper-transform driver to completion and then
/// the lower-transform driver; each per-variable sift restores to the best
/// state it visited, so the composition never ends larger than the better
/// half alone.
pub fn reorder_select(
    pkg: &mut Package,
    root: Edge,
    perm: &mut [u32],
    scheme: ReorderScheme,
    mut log: Option<&mut StepLog>,
) {
    match scheme {
        ReorderScheme::None => {}
        ReorderScheme::Sifting => sift_pass(pkg, root, perm, None, log.as_deref_mut()),
        ReorderScheme::LtUpper => {
            sift_pass(pkg, root, perm, Some(ReorderScheme::LtUpper), log.as_deref_mut())
        }
        ReorderScheme::LtLower => {
            sift_pass(pkg, root, perm, Some(ReorderScheme::LtLower), log.as_deref_mut())
        }
        ReorderScheme::LtMixed => {
            sift_pass(pkg, root, perm, Some(ReorderScheme::LtUpper), log.as_deref_mut());
            sift_pass(pkg, root, perm, Some(ReorderScheme::LtLower), log.as_deref_mut());
        }
    }
}

/// Re-apply one recorded step.  Steps are self-inverse, so this both replays
/// and rewinds depending on the current diagram state.
pub fn apply_step(pkg: &mut Package, perm: &mut [u32], step: &ReorderStep) {
    match step.scheme {
        ReorderScheme::Sifting => level_exchange(pkg, perm, step.level, step.up),
        ReorderScheme::LtUpper | ReorderScheme::LtLower => {
            linear_trans(pkg, perm, step.level, step.scheme, step.up)
        }
        _ => unreachable!("{:?} is never recorded as a step", step.scheme),
    }
}

/// Rewind the diagram to the state before `log`, keeping the records.
pub fn undo_log(pkg: &mut Package, perm: &mut [u32], log: &StepLog) {
    for i in (0..log.len()).rev() {
        apply_step(pkg, perm, log.at(i));
    }
}

/// Rewind the diagram to the state before `log`, consuming the records.
pub fn undo_log_pop(pkg: &mut Package, perm: &mut [u32], log: &mut StepLog) {
    while let Some(step) = log.pop() {
        apply_step(pkg, perm, &step);
    }
}

/// One sifting pass: sift `n - 1` variables in order of decreasing activity.
fn sift_pass(
    pkg: &mut Package,
    root: Edge,
    perm: &mut [u32],
    lt: Option<ReorderScheme>,
    mut master: Option<&mut StepLog>,
) {
    let n = perm.len();
    if n < 2 {
        return;
    }
    let mut free = vec![true; n];

    for _ in 0..n - 1 {
        // Activity heuristic: the unsifted variable with the most live
        // nodes, ties to the lowest level.
        let mut level = 0usize;
        let mut max_active = 0u64;
        let mut found = false;
        for (j, &var) in perm.iter().enumerate() {
            let activity = pkg.active()[var as usize];
            if free[var as usize] && (!found || activity > max_active) {
                found = true;
                max_active = activity;
                level = j;
            }
        }
        if !found {
            break;
        }
        free[perm[level] as usize] = false;

        let start_size = pkg.size(root);
        let mut best = OptimalState {
            level: level as u32,
            scheme: ReorderScheme::None,
            up: false,
            min_size: start_size,
        };
        debug!(
            "sifting level {} (qubit {}, activity {}), dd size {}",
            level, perm[level], max_active, start_size
        );

        if level == 0 {
            // No downward half from the bottom level.
            let mut up_log = StepLog::new();
            sweep_up(pkg, root, perm, level, lt, &mut best, &mut up_log);
            rewind_to_best(pkg, perm, &mut up_log, &best, root);
            append_surviving(&mut master, &up_log);
        } else if level == n - 1 {
            // No upward half from the top level.
            let mut down_log = StepLog::new();
            sweep_down(pkg, root, perm, level, lt, &mut best, &mut down_log);
            rewind_to_best(pkg, perm, &mut down_log, &best, root);
            append_surviving(&mut master, &down_log);
        } else if 2 * level < n {
            let mut down_log = StepLog::new();
            let mut up_log = StepLog::new();
            sweep_down(pkg, root, perm, level, lt, &mut best, &mut down_log);
            // Back to the start state; the records stay, the best state may
            // still lie on the downward path.
            undo_log(pkg, perm, &down_log);
            sweep_up(pkg, root, perm, level, lt, &mut best, &mut up_log);
            if best.scheme == ReorderScheme::None {
                undo_log_pop(pkg, perm, &mut up_log);
            } else if best.up {
                rewind_to_best(pkg, perm, &mut up_log, &best, root);
                append_surviving(&mut master, &up_log);
            } else {
                undo_log_pop(pkg, perm, &mut up_log);
                replay_to_best(pkg, perm, &mut down_log, &best, root);
                append_surviving(&mut master, &down_log);
            }
        } else {
            let mut down_log = StepLog::new();
            let mut up_log = StepLog::new();
            sweep_up(pkg, root, perm, level, lt, &mut best, &mut up_log);
            undo_log(pkg, perm, &up_log);
            sweep_down(pkg, root, perm, level, lt, &mut best, &mut down_log);
            if best.scheme == ReorderScheme::None {
                undo_log_pop(pkg, perm, &mut down_log);
            } else if !best.up {
                rewind_to_best(pkg, perm, &mut down_log, &best, root);
                append_surviving(&mut master, &down_log);
            } else {
                undo_log_pop(pkg, perm, &mut down_log);
                replay_to_best(pkg, perm, &mut up_log, &best, root);
                append_surviving(&mut master, &up_log);
            }
        }
    }
}

/// Sweep the chosen level down to 0: exchange, then try the transform on
/// top of the exchange and keep whichever configuration is smallest so far.
fn sweep_down(
    pkg: &mut Package,
    root: Edge,
    perm: &mut [u32],
    from: usize,
    lt: Option<ReorderScheme>,
    best: &mut OptimalState,
    log: &mut StepLog,
) {
    let mut level = from;
    while level > 0 {
        sweep_step(pkg, root, perm, level as u32, lt, false, best, log);
        level -= 1;
    }
}

/// Sweep the chosen level up to `n - 1`; the mirror image of [`sweep_down`].
fn sweep_up(
    pkg: &mut Package,
    root: Edge,
    perm: &mut [u32],
    from: usize,
    lt: Option<ReorderScheme>,
    best: &mut OptimalState,
    log: &mut StepLog,
) {
    let n = perm.len();
    let mut level = from;
    while level < n - 1 {
        sweep_step(pkg, root, perm, level as u32, lt, true, best, log);
        level += 1;
    }
}

fn sweep_step(
    pkg: &mut Package,
    root: Edge,
    perm: &mut [u32],
    level: u32,
    lt: Option<ReorderScheme>,
    up: bool,
    best: &mut OptimalState,
    log: &mut StepLog,
) {
    level_exchange(pkg, perm, level, up);
    let exchange_size = pkg.size(root);
    // The exchange record always stays: the sweep position advanced.
    log.record(level, ReorderScheme::Sifting, up, exchange_size);

    let Some(scheme) = lt else {
        if exchange_size < best.min_size {
            *best = OptimalState {
                level,
                scheme: ReorderScheme::Sifting,
                up,
                min_size: exchange_size,
            };
        }
        return;
    };

    linear_trans(pkg, perm, level, scheme, up);
    let lt_size = pkg.size(root);
    log.record(level, scheme, up, lt_size);

    if best.min_size <= exchange_size.min(lt_size) {
        // The incumbent stays ahead; the transform is undone (it is its own
        // inverse) and its record cancelled.
        linear_trans(pkg, perm, level, scheme, up);
        log.pop();
    } else if exchange_size <= lt_size {
        linear_trans(pkg, perm, level, scheme, up);
        log.pop();
        *best = OptimalState {
            level,
            scheme: ReorderScheme::Sifting,
            up,
            min_size: exchange_size,
        };
    } else {
        *best = OptimalState {
            level,
            scheme,
            up,
            min_size: lt_size,
        };
    }
}

/// Pop and undo records until the one that produced `best` is on top.  With
/// no best recorded (scheme `None`) this rewinds the whole log.
fn rewind_to_best(
    pkg: &mut Package,
    perm: &mut [u32],
    log: &mut StepLog,
    best: &OptimalState,
    root: Edge,
) {
    while let Some(&last) = log.last() {
        if best.matches(&last) {
            debug_assert_eq!(pkg.size(root), best.min_size);
            break;
        }
        apply_step(pkg, perm, &last);
        log.pop();
    }
}

/// Replay records forward from the start state until `best` is reached and
/// discard everything after it.
fn replay_to_best(
    pkg: &mut Package,
    perm: &mut [u32],
    log: &mut StepLog,
    best: &OptimalState,
    root: Edge,
) {
    let mut k = 0;
    while k < log.len() {
        let step = *log.at(k);
        apply_step(pkg, perm, &step);
        if best.matches(&step) {
            debug_assert_eq!(pkg.size(root), best.min_size);
            break;
        }
        k += 1;
    }
    log.truncate((k + 1).min(log.len()));
}

/// Keep the records that lead from the sweep's start state to the restored
/// best state in the caller's master log, so that a later forward replay
/// (`print_order` verification, restores across passes) stays truthful.
fn append_surviving(master: &mut Option<&mut StepLog>, log: &StepLog) {
    if let Some(master) = master.as_deref_mut() {
        for step in log.iter() {
            master.push(*step);
        }
    }
}
