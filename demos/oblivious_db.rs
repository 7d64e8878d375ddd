// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! An example of using Square-Root ORAM to obliviously serve an indexed table of records.

extern crate sqrt_oram;

use rand::{rngs::OsRng, Rng};
use sqrt_oram::{Address, BlockValue, Oram, OramError, SqrtOram};

// Each record is a fixed number of 32-byte fields.
const FIELD_SIZE: usize = 32;
const FIELDS_PER_RECORD: usize = 4;
const DB_SIZE: Address = 256;

fn record(i: Address) -> Vec<BlockValue<FIELD_SIZE>> {
    (0..FIELDS_PER_RECORD)
        .map(|field| BlockValue::new([(i as u8).wrapping_add(field as u8); FIELD_SIZE]))
        .collect()
}

fn main() -> Result<(), OramError> {
    let mut rng = OsRng;

    // A stand-in for the table you want to obliviously serve.
    let table: Vec<Vec<BlockValue<FIELD_SIZE>>> = (0..DB_SIZE).map(record).collect();
    let mut oram = SqrtOram::from_entries(&table, FIELDS_PER_RECORD, &mut rng)?;

    println!(
        "Serving {} records with period {} and recursion height {}.",
        DB_SIZE,
        oram.period(),
        oram.recursion_height()
    );

    // Now oram can be used to obliviously serve the contents of the table.
    let num_operations = 1000;
    for _ in 0..num_operations {
        let random_index = rng.gen_range(0..DB_SIZE);

        let fields = oram.read(random_index, &mut rng)?;
        assert_eq!(fields, record(random_index));
    }

    println!("Served {} reads over {} epochs.", num_operations, oram.epoch());
    Ok(())
}
