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

//! Plain-sifting variant of the reordering driver, kept as the comparison
//! baseline for the linear-transform runs.

use anyhow::Result;
use clap::Parser;

use qmdd_cli::{run, Args};
use qmdd_core::ReorderScheme;

fn main() -> Result<()> {
    env_logger::init();
    run(ReorderScheme::Sifting, Args::parse())
}
