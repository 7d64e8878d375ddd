// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! An implementation of Square-Root ORAM.

use crate::{
    position_map::PositionMap,
    shuffle_store::{Block, ShuffleStore},
    stash::Stash,
    Address, EntryLength, Oram, OramBlock, OramError, Period, PositionsPerBlock,
};
use rand::{CryptoRng, RngCore};
use subtle::{Choice, ConditionallySelectable};

/// The default number of positions stored per position map block.
pub const DEFAULT_POSITIONS_PER_BLOCK: PositionsPerBlock = 8;

/// Returns the default period `ceil(sqrt(n * log2(n) - n + 1))` of an ORAM storing
/// `block_capacity` entries, which is at least 1.
pub fn default_period(block_capacity: Address) -> Period {
    let n = block_capacity as f64;
    // NaN for `n == 0`, which `max` discards.
    let period = (n * n.log2() - n + 1.0).max(0.0).sqrt().ceil() as Period;
    period.max(1)
}

/// A Square-Root ORAM.
///
/// ## Parameters
///
/// - Value type `V`: the type of the values making up each entry.
/// - Entry length: the number of values in each entry. Fixed at construction.
/// - Period `T`: the number of accesses between two refreshes, and the size of the stash.
///     Defaults to [`default_period`]. Must be between 1 and the capacity.
/// - Positions per block: the number of positions packed into each block of a recursive
///     position map. Must be a power of two and at least 2.
///     Larger values mean fewer levels of recursion but more work per level.
///
/// ## Security
///
/// Each access scans the whole stash, makes one lookup in the position map, and reads and
/// writes one slot of the shuffle store. The slot is chosen by the position map: it is the
/// slot holding the requested entry if the entry is not in the stash, and otherwise a slot
/// that has not been read during the current epoch. Since the shuffle store is ordered by a
/// fresh secret random permutation at the start of every epoch, and no slot is read twice
/// within an epoch, the sequence of slots read is uniformly random.
/// The clock (the number of accesses since the last refresh) is public.
#[derive(Debug)]
pub struct SqrtOram<V: OramBlock> {
    /// The underlying permuted memory that the ORAM is obliviously accessing on behalf of its client.
    shuffle: ShuffleStore<V>,
    /// The blocks read from `shuffle` during the current epoch.
    stash: Stash<V>,
    /// Maps logical indices to slots of `shuffle`.
    position_map: PositionMap,
    entry_length: EntryLength,
    period: Period,
    epoch: u64,
    depth: usize,
}

impl<V: OramBlock> SqrtOram<V> {
    /// Returns a new `SqrtOram` mapping addresses `0 <= address < block_capacity` to
    /// default-valued entries of length 1, with default parameters.
    pub fn new<R: RngCore + CryptoRng>(
        block_capacity: Address,
        rng: &mut R,
    ) -> Result<Self, OramError> {
        let number_of_values: usize = block_capacity.try_into()?;
        Self::new_with_parameters(
            vec![V::default(); number_of_values],
            1,
            None,
            DEFAULT_POSITIONS_PER_BLOCK,
            rng,
        )
    }

    /// Returns a new `SqrtOram` holding `data`, which consists of `n` entries of `entry_length`
    /// values laid out one after the other. Entry `i` is stored at address `i`.
    /// If `period` is `None`, the period is [`default_period`]`(n)`.
    ///
    /// # Errors
    ///
    /// Returns an `EntryLengthMismatch` if `data.len()` is not a multiple of `entry_length`.
    ///
    /// Returns an `InvalidConfigurationError` in the following cases.
    ///
    /// - `entry_length` is 0.
    /// - `data` is empty.
    /// - `period` is 0 or greater than `n`.
    /// - `positions_per_block` is 0, 1, or is not a power of two.
    pub fn new_with_parameters<R: RngCore + CryptoRng>(
        data: Vec<V>,
        entry_length: EntryLength,
        period: Option<Period>,
        positions_per_block: PositionsPerBlock,
        rng: &mut R,
    ) -> Result<Self, OramError> {
        let oram = Self::build(data, entry_length, period, positions_per_block, 0, rng)?;

        log::info!(
            "SqrtOram::new(capacity = {}, entry length = {}, period = {}, recursion height = {})",
            oram.shuffle.len(),
            entry_length,
            oram.period,
            oram.recursion_height()
        );

        Ok(oram)
    }

    /// Returns a new `SqrtOram` with default parameters whose entry `i` is `entries[i]`.
    ///
    /// # Errors
    ///
    /// Returns an `EntryLengthMismatch` if any entry does not consist of exactly `entry_length` values.
    /// See [`SqrtOram::new_with_parameters`] for the remaining cases.
    pub fn from_entries<R: RngCore + CryptoRng>(
        entries: &[Vec<V>],
        entry_length: EntryLength,
        rng: &mut R,
    ) -> Result<Self, OramError> {
        if let Some(entry) = entries.iter().find(|entry| entry.len() != entry_length) {
            return Err(OramError::EntryLengthMismatch {
                expected: entry_length,
                actual: entry.len(),
            });
        }

        Self::new_with_parameters(
            entries.concat(),
            entry_length,
            None,
            DEFAULT_POSITIONS_PER_BLOCK,
            rng,
        )
    }

    /// Returns an ORAM used to store the packed positions of a recursive position map at `depth`.
    pub(crate) fn new_nested<R: RngCore + CryptoRng>(
        data: Vec<V>,
        entry_length: EntryLength,
        period: Period,
        positions_per_block: PositionsPerBlock,
        depth: usize,
        rng: &mut R,
    ) -> Result<Self, OramError> {
        Self::build(
            data,
            entry_length,
            Some(period),
            positions_per_block,
            depth,
            rng,
        )
    }

    fn build<R: RngCore + CryptoRng>(
        data: Vec<V>,
        entry_length: EntryLength,
        period: Option<Period>,
        positions_per_block: PositionsPerBlock,
        depth: usize,
        rng: &mut R,
    ) -> Result<Self, OramError> {
        let mut shuffle = ShuffleStore::new(data, entry_length)?;
        if shuffle.is_empty() {
            return Err(OramError::InvalidConfigurationError);
        }

        let period = match period {
            Some(period) => period,
            None => default_period(shuffle.capacity()?),
        };
        if (period == 0) | (period > shuffle.len()) {
            return Err(OramError::InvalidConfigurationError);
        }
        if (positions_per_block < 2) | !positions_per_block.is_power_of_two() {
            return Err(OramError::InvalidConfigurationError);
        }

        log::debug!(
            "SqrtOram::new -- depth {}, size {}, period {}",
            depth,
            shuffle.len(),
            period
        );

        let permutation = shuffle.shuffle_the_shuffle(rng)?;
        let position_map =
            PositionMap::create(permutation, depth + 1, period, positions_per_block, rng)?;

        Ok(Self {
            shuffle,
            stash: Stash::new(period, entry_length),
            position_map,
            entry_length,
            period,
            epoch: 0,
            depth,
        })
    }

    /// The number of accesses between two refreshes.
    pub fn period(&self) -> Period {
        self.period
    }

    /// The number of accesses made since the last refresh.
    pub fn clock(&self) -> usize {
        self.stash.len()
    }

    /// The number of refreshes performed so far.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// The recursion depth of this ORAM; 0 for an ORAM that is not part of a position map.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// The number of nested ORAMs used by the position map of this ORAM.
    pub fn recursion_height(&self) -> usize {
        self.position_map.recursion_height()
    }

    /// The total number of physical reads and writes made to the shuffle stores of this ORAM
    /// and of every nested ORAM, in that order.
    pub fn physical_access_counts(&self) -> (u64, u64) {
        let (nested_reads, nested_writes) = self.position_map.physical_access_counts();
        (
            self.shuffle.get_read_count() + nested_reads,
            self.shuffle.get_write_count() + nested_writes,
        )
    }

    pub(crate) fn stash(&self) -> &Stash<V> {
        &self.stash
    }

    /// Looks up `index` in the position map (a fake lookup if `found` is set), marks the slot as
    /// used and reads it. Returns the slot and the block read from it.
    pub(crate) fn fetch(
        &mut self,
        index: Address,
        found: Choice,
    ) -> Result<(Address, Block<V>), OramError> {
        debug_assert!(!self.stash.is_full());

        let physical_address = self.position_map.get_position(index, found)?;
        if physical_address >= self.shuffle.capacity()? {
            log::error!(
                "SqrtOram at depth {} received out-of-range physical address {}",
                self.depth,
                physical_address
            );
            return Err(OramError::InvariantViolation { depth: self.depth });
        }

        self.shuffle.mark_used(physical_address)?;
        let block = self.shuffle.read_block(physical_address)?;
        Ok((physical_address, block))
    }

    /// Writes `block` back to the slot it was fetched from and appends it to the stash,
    /// advancing the clock.
    pub(crate) fn retire(
        &mut self,
        physical_address: Address,
        block: &Block<V>,
    ) -> Result<(), OramError> {
        self.shuffle.write_block(physical_address, block)?;
        self.stash.push(block)
    }

    /// Moves the stash back into the shuffle store, reshuffles the store under a fresh
    /// random permutation, and reinitializes the position map. Starts a new epoch.
    ///
    /// This happens automatically once the stash is full; calling it earlier is allowed.
    pub fn refresh<R: RngCore + CryptoRng>(&mut self, rng: &mut R) -> Result<(), OramError> {
        log::debug!(
            "SqrtOram::refresh -- depth {}, epoch {}, clock {}",
            self.depth,
            self.epoch,
            self.stash.len()
        );

        let used_slots = self.shuffle.used_count();
        if used_slots != self.stash.len() {
            log::error!(
                "SqrtOram at depth {} used {} slots but holds {} stash blocks",
                self.depth,
                used_slots,
                self.stash.len()
            );
            return Err(OramError::InvariantViolation { depth: self.depth });
        }

        // The j-th used slot receives the j-th stash block. Which slots are used is public.
        let mut next_stash_slot = 0;
        for slot in 0..self.shuffle.len() {
            if self.shuffle.is_used(slot) {
                let block = self.stash.block(next_stash_slot);
                self.shuffle.write_block(slot.try_into()?, &block)?;
                next_stash_slot += 1;
            }
        }

        self.stash.clear();
        self.shuffle.clear_used();

        let permutation = self.shuffle.shuffle_the_shuffle(rng)?;
        self.position_map.reinitialize(&permutation, rng)?;
        self.epoch += 1;
        Ok(())
    }

    /// Overwrites the contents of this ORAM in place with `data` (padded with default values),
    /// empties the stash, reshuffles, and reinitializes the position map.
    pub(crate) fn reinitialize<R: RngCore + CryptoRng>(
        &mut self,
        data: &[V],
        rng: &mut R,
    ) -> Result<(), OramError> {
        self.shuffle.overwrite(data)?;
        self.stash.clear();

        let permutation = self.shuffle.shuffle_the_shuffle(rng)?;
        self.position_map.reinitialize(&permutation, rng)
    }

    #[cfg(test)]
    pub(crate) fn shuffle(&self) -> &ShuffleStore<V> {
        &self.shuffle
    }
}

impl<V: OramBlock> Oram for SqrtOram<V> {
    type V = V;

    fn block_capacity(&self) -> Result<Address, OramError> {
        self.shuffle.capacity()
    }

    fn entry_length(&self) -> EntryLength {
        self.entry_length
    }

    fn access<R: RngCore + CryptoRng>(
        &mut self,
        index: Address,
        is_write: Choice,
        value: &[V],
        rng: &mut R,
    ) -> Result<Vec<V>, OramError> {
        if value.len() != self.entry_length() {
            return Err(OramError::EntryLengthMismatch {
                expected: self.entry_length(),
                actual: value.len(),
            });
        }

        // This operation is not constant-time, but only leaks whether the ORAM index is well-formed or not.
        let capacity = self.block_capacity()?;
        if index >= capacity {
            return Err(OramError::AddressOutOfBoundsError {
                attempted: index,
                capacity,
            });
        }

        if self.stash.is_full() {
            self.refresh(rng)?;
        }

        // Scan the stash for the target block, reading it into `result` and possibly overwriting it.
        let mut result = vec![V::default(); value.len()];
        let found = self.stash.scan(index, is_write, value, &mut result);

        // Read the target block from the shuffle store if it was not in the stash,
        // and an unread block otherwise.
        let (physical_address, mut block) = self.fetch(index, found)?;

        let not_found = !found;
        let should_write = not_found & is_write;
        for ((stored, out), new) in block.payload.iter_mut().zip(result.iter_mut()).zip(value) {
            out.conditional_assign(stored, not_found);
            stored.conditional_assign(new, should_write);
        }

        self.retire(physical_address, &block)?;

        Ok(result)
    }
}
