// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! This module contains common test utilities for tests of the `sqrt-oram` crate.

use crate::{
    Address, BlockValue, EntryLength, Oram, OramBlock, OramError, SqrtOram,
    DEFAULT_POSITIONS_PER_BLOCK,
};
use duplicate::duplicate_item;
use rand::{
    distributions::{Distribution, Standard},
    rngs::StdRng,
    CryptoRng, Rng, RngCore, SeedableRng,
};
use simplelog::{Config, WriteLogger};
use std::fmt::Debug;
use std::iter::zip;
use std::sync::Once;
use subtle::Choice;

static INIT: Once = Once::new();

// For use in manual testing and inspection.
pub(crate) fn init_logger() {
    INIT.call_once(|| {
        WriteLogger::init(log::LevelFilter::Info, Config::default(), std::io::stdout()).unwrap()
    })
}

/// A 16-byte value type, used to exercise entries of non-integer values.
pub(crate) type BlockValue16 = BlockValue<16>;

pub(crate) trait Testable: Oram + Debug {
    fn new_for_test<R: RngCore + CryptoRng>(
        block_capacity: Address,
        entry_length: EntryLength,
        rng: &mut R,
    ) -> Self;

    fn test_hook(&self) {}
}

/// Checks the bookkeeping of `oram` after an access: exactly one slot has been read per access
/// since the last refresh, and no slot has been read more often than it has been written.
pub(crate) fn check_epoch_invariants<V: OramBlock>(oram: &SqrtOram<V>) {
    let shuffle = oram.shuffle();
    assert_eq!(shuffle.used_count(), oram.clock());
    assert!(oram.clock() <= oram.period());
    for (reads, writes) in zip(&shuffle.reads, &shuffle.writes) {
        assert!(reads <= writes);
    }
}

/// A default-configured `SqrtOram`.
#[derive(Debug)]
pub(crate) struct DefaultSqrtOram<V: OramBlock> {
    oram: SqrtOram<V>,
}

/// A `SqrtOram` with period 2 and 2 positions per block, which has the deepest possible recursion.
#[derive(Debug)]
pub(crate) struct DeepRecursionSqrtOram<V: OramBlock> {
    oram: SqrtOram<V>,
}

/// A `SqrtOram` whose period equals its capacity, so that its position map is linear.
#[derive(Debug)]
pub(crate) struct FullPeriodSqrtOram<V: OramBlock> {
    oram: SqrtOram<V>,
}

#[duplicate_item(
    oram_type                 period_for_capacity              positions_per_block;
    [DefaultSqrtOram]         [None]                           [DEFAULT_POSITIONS_PER_BLOCK];
    [DeepRecursionSqrtOram]   [Some(2)]                        [2];
    [FullPeriodSqrtOram]      [Some(block_capacity as usize)]  [DEFAULT_POSITIONS_PER_BLOCK];
)]
impl<V: OramBlock> Testable for oram_type<V> {
    fn new_for_test<R: RngCore + CryptoRng>(
        block_capacity: Address,
        entry_length: EntryLength,
        rng: &mut R,
    ) -> Self {
        let data = vec![V::default(); block_capacity as usize * entry_length];
        let oram = SqrtOram::new_with_parameters(
            data,
            entry_length,
            period_for_capacity,
            positions_per_block,
            rng,
        )
        .unwrap();
        Self { oram }
    }

    fn test_hook(&self) {
        check_epoch_invariants(&self.oram);
    }
}

// Every access reads one slot of each shuffle store in the recursion, and writes it back.
// The refresh at the start of an access additionally writes back one slot per stash block.
#[duplicate_item(
    oram_type;
    [DefaultSqrtOram];
    [DeepRecursionSqrtOram];
    [FullPeriodSqrtOram];
)]
impl<V: OramBlock> Oram for oram_type<V> {
    type V = V;

    fn block_capacity(&self) -> Result<Address, OramError> {
        self.oram.block_capacity()
    }

    fn entry_length(&self) -> EntryLength {
        self.oram.entry_length()
    }

    fn access<R: RngCore + CryptoRng>(
        &mut self,
        index: Address,
        is_write: Choice,
        value: &[V],
        rng: &mut R,
    ) -> Result<Vec<V>, OramError> {
        let (pre_read_count, pre_write_count) = self.oram.physical_access_counts();
        let refreshes = self.oram.clock() == self.oram.period();

        let result = self.oram.access(index, is_write, value, rng)?;

        let (post_read_count, post_write_count) = self.oram.physical_access_counts();
        let levels = 1 + self.oram.recursion_height() as u64;
        let refresh_writes = if refreshes {
            self.oram.period() as u64
        } else {
            0
        };
        assert_eq!(post_read_count - pre_read_count, levels);
        assert_eq!(post_write_count - pre_write_count, levels + refresh_writes);

        Ok(result)
    }
}

fn random_entry<V: OramBlock, R: Rng>(entry_length: EntryLength, rng: &mut R) -> Vec<V>
where
    Standard: Distribution<V>,
{
    (0..entry_length).map(|_| rng.gen::<V>()).collect()
}

/// Tests the correctness of an `Oram` type T on a workload of random reads and writes.
pub(crate) fn test_correctness_random_workload<V: OramBlock, T: Oram<V = V> + Testable>(
    entry_length: EntryLength,
    capacity: Address,
    num_operations: u32,
) where
    Standard: Distribution<V>,
{
    init_logger();
    let mut rng = StdRng::seed_from_u64(0);

    let mut oram = T::new_for_test(capacity, entry_length, &mut rng);
    let mut mirror_array = vec![vec![V::default(); entry_length]; capacity as usize];

    for _ in 0..num_operations {
        let random_index = rng.gen_range(0..capacity);
        let new_entry = random_entry(entry_length, &mut rng);

        let read_versus_write = rng.gen::<bool>();

        if read_versus_write {
            assert_eq!(
                oram.read(random_index, &mut rng).unwrap(),
                mirror_array[random_index as usize]
            );
        } else {
            let old = oram
                .access(random_index, Choice::from(1), &new_entry, &mut rng)
                .unwrap();
            assert_eq!(old, mirror_array[random_index as usize]);
            mirror_array[random_index as usize] = new_entry;
        }
        oram.test_hook();
    }

    for index in 0..capacity {
        assert_eq!(
            oram.read(index, &mut rng).unwrap(),
            mirror_array[index as usize],
            "{index}"
        )
    }

    oram.test_hook();
}

/// Tests the correctness of an `Oram` type T on repeated passes of sequential accesses 0, 1, ..., `capacity`
pub(crate) fn test_correctness_linear_workload<V: OramBlock, T: Oram<V = V> + Testable>(
    entry_length: EntryLength,
    capacity: Address,
    num_operations: u32,
) where
    Standard: Distribution<V>,
{
    init_logger();
    let mut rng = StdRng::seed_from_u64(0);

    let mut oram = T::new_for_test(capacity, entry_length, &mut rng);

    let mut mirror_array = vec![vec![V::default(); entry_length]; capacity as usize];

    let num_passes = (num_operations as u64 / capacity).max(1);

    for _ in 0..num_passes {
        for index in 0..capacity {
            let new_entry = random_entry(entry_length, &mut rng);

            let read_versus_write: bool = rng.gen::<bool>();

            if read_versus_write {
                assert_eq!(
                    oram.read(index, &mut rng).unwrap(),
                    mirror_array[index as usize]
                );
            } else {
                oram.write(index, &new_entry, &mut rng).unwrap();
                mirror_array[index as usize] = new_entry;
            }
        }
        oram.test_hook();
    }

    for index in 0..capacity {
        assert_eq!(
            oram.read(index, &mut rng).unwrap(),
            mirror_array[index as usize],
            "{index}"
        )
    }

    oram.test_hook();
}

macro_rules! create_correctness_test {
    ($function_name:ident, $oram_type: ident, $value_type: ident, $entry_length: expr, $block_capacity:expr, $iterations_to_test: expr) => {
        paste::paste! {
            #[test]
            fn [<$function_name _ $oram_type:snake _ $value_type:snake _ $block_capacity _ $entry_length _ $iterations_to_test>]() {
                $function_name::<$value_type, $oram_type<$value_type>>($entry_length, $block_capacity, $iterations_to_test);
            }
        }
    };
}

macro_rules! create_correctness_tests_for_workload_and_oram_type {
    ($function_name: ident, $oram_type: ident, $value_type: ident) => {
        create_correctness_test!($function_name, $oram_type, $value_type, 1, 2, 10);
        create_correctness_test!($function_name, $oram_type, $value_type, 1, 8, 100);
        create_correctness_test!($function_name, $oram_type, $value_type, 3, 8, 100);
        create_correctness_test!($function_name, $oram_type, $value_type, 2, 16, 100);
        create_correctness_test!($function_name, $oram_type, $value_type, 1, 33, 200);
        // 4 values per entry, 64 entries, testing with 200 operations
        create_correctness_test!($function_name, $oram_type, $value_type, 4, 64, 200);
        create_correctness_test!($function_name, $oram_type, $value_type, 2, 100, 300);
        create_correctness_test!($function_name, $oram_type, $value_type, 1, 8, 1000);
    };
}

macro_rules! create_correctness_tests_for_oram_type {
    ($oram_type: ident, $value_type: ident) => {
        create_correctness_tests_for_workload_and_oram_type!(
            test_correctness_linear_workload,
            $oram_type,
            $value_type
        );
        create_correctness_tests_for_workload_and_oram_type!(
            test_correctness_random_workload,
            $oram_type,
            $value_type
        );
    };
}

pub(crate) use create_correctness_test;
pub(crate) use create_correctness_tests_for_oram_type;
pub(crate) use create_correctness_tests_for_workload_and_oram_type;
