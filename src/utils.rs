// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Utilities.

use crate::{Address, OramError};
use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};

use subtle::{Choice, ConditionallySelectable, ConstantTimeLess};

/// Sorts `items` in ascending order of `keys`, obliviously and in constant time.
/// Assumes that `keys.len() == items.len()`.
pub(crate) fn bitonic_sort_by_keys<
    T: ConditionallySelectable,
    K: ConditionallySelectable + ConstantTimeLess,
>(
    items: &mut [T],
    keys: &mut [K],
) {
    assert_eq!(items.len(), keys.len());
    bitonic_sort_with(keys, |i, j, do_swap| {
        let (items_i, items_j) = items.split_at_mut(j);
        T::conditional_swap(&mut items_i[i], &mut items_j[0], do_swap);
    });
}

/// Sorts `keys` in ascending order, obliviously and in constant time, calling
/// `swap_items(i, j, do_swap)` (with `i < j`) for every compare-exchange so that
/// the caller can move any data associated with the keys alongside them.
/// The algorithm is bitonic sort, based on code written by Hans Werner Lang
/// and available [here](https://hwlang.de/algorithmen/sortieren/bitonic/oddn.htm).
pub(crate) fn bitonic_sort_with<
    K: ConditionallySelectable + ConstantTimeLess,
    F: FnMut(usize, usize, Choice),
>(
    keys: &mut [K],
    mut swap_items: F,
) {
    let ascending: Choice = 1.into();
    helper_bitonic_sort(0, keys.len(), keys, &mut swap_items, ascending);
}

fn helper_bitonic_sort<
    K: ConditionallySelectable + ConstantTimeLess,
    F: FnMut(usize, usize, Choice),
>(
    lo: usize,
    n: usize,
    keys: &mut [K],
    swap_items: &mut F,
    direction: Choice,
) {
    if n > 1 {
        let m = n / 2;
        helper_bitonic_sort(lo, m, keys, swap_items, !direction);
        helper_bitonic_sort(lo + m, n - m, keys, swap_items, direction);
        helper_bitonic_merge(lo, n, keys, swap_items, direction);
    }
}

fn helper_bitonic_merge<
    K: ConditionallySelectable + ConstantTimeLess,
    F: FnMut(usize, usize, Choice),
>(
    lo: usize,
    n: usize,
    keys: &mut [K],
    swap_items: &mut F,
    direction: Choice,
) {
    if n > 1 {
        let m = n.next_power_of_two() >> 1;
        for i in lo..(lo + n - m) {
            let j = i + m;
            let jlti = keys[j].ct_lt(&keys[i]);
            let do_swap = !(jlti ^ direction);
            let (keys_i, keys_j) = keys.split_at_mut(j);
            K::conditional_swap(&mut keys_i[i], &mut keys_j[0], do_swap);
            swap_items(i, j, do_swap);
        }

        helper_bitonic_merge(lo, m, keys, swap_items, direction);
        helper_bitonic_merge(lo + m, n - m, keys, swap_items, direction);
    }
}

/// Returns a random permutation of 0 through n.
pub(crate) fn random_permutation_of_0_through_n_exclusive<R: RngCore + CryptoRng>(
    n: Address,
    rng: &mut R,
) -> Vec<Address> {
    let mut permuted_addresses = Vec::from_iter(0..n);
    permuted_addresses.shuffle(rng);
    permuted_addresses
}

/// Given a permutation, inverts it using oblivious (data-independent) operations.
pub(crate) fn invert_permutation_oblivious(
    permutation: &[Address],
) -> Result<Vec<Address>, OramError> {
    let n: Address = permutation.len().try_into()?;
    let mut copied = permutation.to_owned();
    let mut result = Vec::from_iter(0..n);
    bitonic_sort_by_keys(&mut result, &mut copied);
    Ok(result)
}
