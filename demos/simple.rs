// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A very simple demonstration of the use of Square-Root ORAM.

extern crate sqrt_oram;

use rand::rngs::OsRng;
use sqrt_oram::{Oram, OramError, SqrtOram};

fn main() -> Result<(), OramError> {
    let mut rng = OsRng;
    let mut oram = SqrtOram::<u64>::new(64, &mut rng)?;
    oram.write(0, &[1], &mut rng)?;
    println!("{:?}", oram.read(0, &mut rng)?);
    Ok(())
}
