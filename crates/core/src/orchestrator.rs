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

//! The outer fixed-point loop: repeat the sifting driver until the diagram
//! size settles.

use log::debug;

use crate::node::Edge;
use crate::package::Package;
use crate::sifting::reorder_select;
use crate::steplog::{ReorderScheme, StepLog};

/// Consecutive near-stationary iterations required before stopping.
pub const DEFAULT_STABILITY_ROUNDS: usize = 10;

/// Successive sizes within this distance count as stationary.
pub const STABILITY_TOLERANCE: usize = 10;

/// Hard cap on driver invocations; the only runtime bound.
pub const MAX_ITERATIONS: usize = 100;

#[derive(Copy, Clone, Debug)]
pub struct ReorderSummary {
    pub initial_size: usize,
    pub final_size: usize,
    pub min_size: usize,
    pub iterations: usize,
}

/// Invoke the driver until `|size_k - size_{k-1}| <= 10` holds for `rounds`
/// consecutive non-improving iterations (any improvement resets the count),
/// or [`MAX_ITERATIONS`] elapse.  Every pass restores to the best state it
/// visited, so sizes are non-increasing and the final size is the minimum.
pub fn reorder_until_stable(
    pkg: &mut Package,
    root: Edge,
    perm: &mut [u32],
    scheme: ReorderScheme,
    mut log: Option<&mut StepLog>,
    rounds: usize,
) -> ReorderSummary {
    let initial_size = pkg.size(root);
    if perm.len() < 2 {
        // Nothing to reorder.
        return ReorderSummary {
            initial_size,
            final_size: initial_size,
            min_size: initial_size,
            iterations: 0,
        };
    }
    let mut prev = initial_size;
    let mut min_size = initial_size;
    let mut stable = 0;
    let mut iterations = 0;

    for _ in 0..MAX_ITERATIONS {
        reorder_select(pkg, root, perm, scheme, log.as_deref_mut());
        iterations += 1;
        let size = pkg.size(root);
        debug!("reorder iteration {}: dd size {}", iterations, size);
        if size < min_size {
            min_size = size;
            stable = 0;
        } else if prev.abs_diff(size) <= STABILITY_TOLERANCE {
            stable += 1;
            if stable >= rounds {
                break;
            }
        } else {
            stable = 0;
        }
        prev = size;
    }

    let final_size = pkg.size(root);
    ReorderSummary {
        initial_size,
        final_size,
        min_size: min_size.min(final_size),
        iterations,
    }
}
