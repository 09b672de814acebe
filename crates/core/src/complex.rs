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

use approx::abs_diff_eq;
use hashbrown::HashMap;
use num_complex::Complex64;
use smallvec::SmallVec;

/// Tolerance under which two complex values share one table entry.
pub const TOLERANCE: f64 = 1e-10;

/// Handle to a hash-consed complex weight.
///
/// Handles compare and hash as plain integers, which is what makes the
/// structural node hash of the unique table well defined: approximately equal
/// weights are guaranteed to carry the same handle.
#[derive(Copy, Clone, Debug, Hash, Ord, PartialOrd, Eq, PartialEq)]
pub struct WeightId(pub u32);

impl WeightId {
    pub const ZERO: WeightId = WeightId(0);
    pub const ONE: WeightId = WeightId(1);
}

/// Hash-consed store of complex edge weights.
///
/// `lookup` interns with tolerance [`TOLERANCE`]; values close to an already
/// interned one reuse its handle, and values close to 0 or 1 collapse to the
/// pre-seeded [`WeightId::ZERO`] / [`WeightId::ONE`] entries.  The table only
/// ever grows; weights are tiny and shared across the whole DAG lifetime.
pub struct ComplexTable {
    values: Vec<Complex64>,
    cells: HashMap<(i64, i64), SmallVec<[WeightId; 2]>>,
}

impl Default for ComplexTable {
    fn default() -> Self {
        ComplexTable::new()
    }
}

impl ComplexTable {
    pub fn new() -> ComplexTable {
        let mut table = ComplexTable {
            values: Vec::with_capacity(64),
            cells: HashMap::new(),
        };
        // Entry order pins the ZERO and ONE handles.
        let zero = table.intern(Complex64::new(0.0, 0.0));
        let one = table.intern(Complex64::new(1.0, 0.0));
        debug_assert_eq!(zero, WeightId::ZERO);
        debug_assert_eq!(one, WeightId::ONE);
        table
    }

    #[inline]
    pub fn value(&self, id: WeightId) -> Complex64 {
        self.values[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Canonicalise a complex value into a weight handle.
    pub fn lookup(&mut self, value: Complex64) -> WeightId {
        if abs_diff_eq!(value, Complex64::new(0.0, 0.0), epsilon = TOLERANCE) {
            return WeightId::ZERO;
        }
        if abs_diff_eq!(value, Complex64::new(1.0, 0.0), epsilon = TOLERANCE) {
            return WeightId::ONE;
        }
        // Probe the 3x3 cell neighbourhood so that near-boundary values still
        // find their interned representative.
        let (kr, ki) = Self::cell_of(value);
        for dr in -1..=1i64 {
            for di in -1..=1i64 {
                if let Some(candidates) = self.cells.get(&(kr + dr, ki + di)) {
                    for &id in candidates {
                        if abs_diff_eq!(self.values[id.0 as usize], value, epsilon = TOLERANCE) {
                            return id;
                        }
                    }
                }
            }
        }
        self.intern(value)
    }

    pub fn mul(&mut self, a: WeightId, b: WeightId) -> WeightId {
        if a == WeightId::ZERO || b == WeightId::ZERO {
            return WeightId::ZERO;
        }
        if a == WeightId::ONE {
            return b;
        }
        if b == WeightId::ONE {
            return a;
        }
        let product = self.value(a) * self.value(b);
        self.lookup(product)
    }

    pub fn div(&mut self, a: WeightId, b: WeightId) -> WeightId {
        debug_assert_ne!(b, WeightId::ZERO, "division by the zero weight");
        if a == WeightId::ZERO {
            return WeightId::ZERO;
        }
        if b == WeightId::ONE {
            return a;
        }
        if a == b {
            return WeightId::ONE;
        }
        let quotient = self.value(a) / self.value(b);
        self.lookup(quotient)
    }

    pub fn approx_eq(&self, a: WeightId, b: WeightId) -> bool {
        a == b || abs_diff_eq!(self.value(a), self.value(b), epsilon = TOLERANCE)
    }

    fn intern(&mut self, value: Complex64) -> WeightId {
        let id = WeightId(self.values.len() as u32);
        self.values.push(value);
        self.cells.entry(Self::cell_of(value)).or_default().push(id);
        id
    }

    #[inline]
    fn cell_of(value: Complex64) -> (i64, i64) {
        (
            (value.re / TOLERANCE).round() as i64,
            (value.im / TOLERANCE).round() as i64,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_1_SQRT_2;

    #[test]
    fn zero_and_one_are_preseeded() {
        let mut table = ComplexTable::new();
        assert_eq!(table.lookup(Complex64::new(0.0, 0.0)), WeightId::ZERO);
        assert_eq!(table.lookup(Complex64::new(1.0, 0.0)), WeightId::ONE);
        assert_eq!(table.lookup(Complex64::new(1e-13, -1e-13)), WeightId::ZERO);
    }

    #[test]
    fn interning_is_tolerant() {
        let mut table = ComplexTable::new();
        let a = table.lookup(Complex64::new(FRAC_1_SQRT_2, 0.0));
        let b = table.lookup(Complex64::new(FRAC_1_SQRT_2 + 1e-12, 0.0));
        assert_eq!(a, b);
        let c = table.lookup(Complex64::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2));
        assert_ne!(a, c);
    }

    #[test]
    fn products_collapse_to_canonical_handles() {
        let mut table = ComplexTable::new();
        let h = table.lookup(Complex64::new(FRAC_1_SQRT_2, 0.0));
        let half = table.mul(h, h);
        assert_eq!(half, table.lookup(Complex64::new(0.5, 0.0)));
        assert_eq!(table.div(h, h), WeightId::ONE);
        assert_eq!(table.mul(h, WeightId::ZERO), WeightId::ZERO);
    }
}
