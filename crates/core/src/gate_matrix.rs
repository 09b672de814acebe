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

use num_complex::Complex64;
use std::f64::consts::FRAC_1_SQRT_2;

pub const C_ZERO: Complex64 = Complex64::new(0., 0.);
pub const C_ONE: Complex64 = Complex64::new(1., 0.);
pub const C_M_ONE: Complex64 = Complex64::new(-1., 0.);
pub const IM: Complex64 = Complex64::new(0., 1.);
pub const M_IM: Complex64 = Complex64::new(0., -1.);

pub static ONE_QUBIT_IDENTITY: [[Complex64; 2]; 2] = [[C_ONE, C_ZERO], [C_ZERO, C_ONE]];

pub static XGATE: [[Complex64; 2]; 2] = [[C_ZERO, C_ONE], [C_ONE, C_ZERO]];

pub static YGATE: [[Complex64; 2]; 2] = [[C_ZERO, M_IM], [IM, C_ZERO]];

pub static ZGATE: [[Complex64; 2]; 2] = [[C_ONE, C_ZERO], [C_ZERO, C_M_ONE]];

pub static HGATE: [[Complex64; 2]; 2] = [
    [
        Complex64::new(FRAC_1_SQRT_2, 0.),
        Complex64::new(FRAC_1_SQRT_2, 0.),
    ],
    [
        Complex64::new(FRAC_1_SQRT_2, 0.),
        Complex64::new(-FRAC_1_SQRT_2, 0.),
    ],
];

pub static SGATE: [[Complex64; 2]; 2] = [[C_ONE, C_ZERO], [C_ZERO, IM]];

pub static SDGGATE: [[Complex64; 2]; 2] = [[C_ONE, C_ZERO], [C_ZERO, M_IM]];

pub static TGATE: [[Complex64; 2]; 2] = [
    [C_ONE, C_ZERO],
    [C_ZERO, Complex64::new(FRAC_1_SQRT_2, FRAC_1_SQRT_2)],
];

pub static TDGGATE: [[Complex64; 2]; 2] = [
    [C_ONE, C_ZERO],
    [C_ZERO, Complex64::new(FRAC_1_SQRT_2, -FRAC_1_SQRT_2)],
];

pub static SXGATE: [[Complex64; 2]; 2] = [
    [Complex64::new(0.5, 0.5), Complex64::new(0.5, -0.5)],
    [Complex64::new(0.5, -0.5), Complex64::new(0.5, 0.5)],
];

pub fn rx_gate(theta: f64) -> [[Complex64; 2]; 2] {
    let half_theta = theta / 2.;
    let cos = Complex64::new(half_theta.cos(), 0.);
    let isin = Complex64::new(0., -half_theta.sin());
    [[cos, isin], [isin, cos]]
}

pub fn ry_gate(theta: f64) -> [[Complex64; 2]; 2] {
    let half_theta = theta / 2.;
    let cos = Complex64::new(half_theta.cos(), 0.);
    let sin = Complex64::new(half_theta.sin(), 0.);
    [[cos, -sin], [sin, cos]]
}

pub fn rz_gate(theta: f64) -> [[Complex64; 2]; 2] {
    let ilam2 = Complex64::new(0., 0.5 * theta);
    [[(-ilam2).exp(), C_ZERO], [C_ZERO, ilam2.exp()]]
}

pub fn phase_gate(lam: f64) -> [[Complex64; 2]; 2] {
    [[C_ONE, C_ZERO], [C_ZERO, Complex64::new(0., lam).exp()]]
}
