// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A recursive Square-Root ORAM position map data structure.

use crate::{
    linear_position_map::LinearPositionMap, sqrt_oram::SqrtOram, Address, OramError, Period,
    PositionsPerBlock,
};
use rand::{CryptoRng, RngCore};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

/// Translates logical addresses of a Square-Root ORAM into physical slots of its shuffle store.
#[derive(Debug)]
pub enum PositionMap {
    /// A linear-scanning position map, used when the map is small.
    Linear(LinearPositionMap),
    /// A position map whose entries are packed into blocks stored in a nested Square-Root ORAM.
    Recursive(RecursivePositionMap),
}

impl PositionMap {
    /// Returns a new position map sending logical address `i` to `permutation[i]`.
    /// The map is linear if `permutation.len() / positions_per_block <= period`, and recursive otherwise.
    /// `depth` is only used to label log messages and errors.
    pub fn create<R: RngCore + CryptoRng>(
        permutation: Vec<Address>,
        depth: usize,
        period: Period,
        positions_per_block: PositionsPerBlock,
        rng: &mut R,
    ) -> Result<Self, OramError> {
        if (positions_per_block < 2) | !positions_per_block.is_power_of_two() {
            return Err(OramError::InvalidConfigurationError);
        }

        if permutation.len() <= period * positions_per_block {
            Ok(Self::Linear(LinearPositionMap::new(permutation, depth)))
        } else {
            Ok(Self::Recursive(RecursivePositionMap::new(
                &permutation,
                depth,
                period,
                positions_per_block,
                rng,
            )?))
        }
    }

    /// The number of nested ORAMs below this position map.
    pub fn recursion_height(&self) -> usize {
        match self {
            PositionMap::Linear(_) => 0,
            PositionMap::Recursive(inner) => 1 + inner.positions.recursion_height(),
        }
    }

    /// Returns the physical address of `logical_address`.
    ///
    /// If `fake` is set, the caller already holds the block for `logical_address`, and the map
    /// instead returns the address of a slot that has not been handed out during this epoch.
    /// The work performed is the same in both cases.
    pub fn get_position(
        &mut self,
        logical_address: Address,
        fake: Choice,
    ) -> Result<Address, OramError> {
        match self {
            PositionMap::Linear(linear_map) => linear_map.get_position(logical_address, fake),
            PositionMap::Recursive(recursive_map) => {
                recursive_map.get_position(logical_address, fake)
            }
        }
    }

    /// Overwrites the map in place with a new permutation, starting a new epoch.
    pub fn reinitialize<R: RngCore + CryptoRng>(
        &mut self,
        permutation: &[Address],
        rng: &mut R,
    ) -> Result<(), OramError> {
        match self {
            PositionMap::Linear(linear_map) => linear_map.reinitialize(permutation),
            PositionMap::Recursive(recursive_map) => recursive_map.reinitialize(permutation, rng),
        }
    }

    /// The depth of this position map below the top-level ORAM.
    pub fn depth(&self) -> usize {
        match self {
            PositionMap::Linear(linear_map) => linear_map.depth(),
            PositionMap::Recursive(recursive_map) => recursive_map.depth,
        }
    }

    /// The total number of physical reads and writes made by the nested ORAMs of this map.
    pub fn physical_access_counts(&self) -> (u64, u64) {
        match self {
            PositionMap::Linear(_) => (0, 0),
            PositionMap::Recursive(recursive_map) => {
                recursive_map.positions.physical_access_counts()
            }
        }
    }
}

/// A position map storing blocks of `positions_per_block` consecutive entries of the
/// permutation in a nested Square-Root ORAM with the same period as its parent.
///
/// The nested ORAM's clock advances once per lookup, in step with the parent's clock,
/// and it is reinitialized whenever the parent refreshes; it never refreshes on its own.
#[derive(Debug)]
pub struct RecursivePositionMap {
    positions: Box<SqrtOram<Address>>,
    positions_per_block: PositionsPerBlock,
    depth: usize,
}

impl RecursivePositionMap {
    fn new<R: RngCore + CryptoRng>(
        permutation: &[Address],
        depth: usize,
        period: Period,
        positions_per_block: PositionsPerBlock,
        rng: &mut R,
    ) -> Result<Self, OramError> {
        log::debug!(
            "RecursivePositionMap::new -- depth {}, size {}",
            depth,
            permutation.len()
        );

        // The last block is padded with zeroes when `positions_per_block` does not divide the size.
        let number_of_blocks = permutation.len().div_ceil(positions_per_block);
        let mut packed = permutation.to_vec();
        packed.resize(number_of_blocks * positions_per_block, 0);

        let positions = SqrtOram::new_nested(
            packed,
            positions_per_block,
            period,
            positions_per_block,
            depth,
            rng,
        )?;

        Ok(Self {
            positions: Box::new(positions),
            positions_per_block,
            depth,
        })
    }

    fn address_of_block(&self, address: Address) -> Address {
        let block_address_bits = self.positions_per_block.ilog2();
        address >> block_address_bits
    }

    fn address_within_block(&self, address: Address) -> Result<Address, OramError> {
        let mask: Address = (self.positions_per_block - 1).try_into()?;
        Ok(address & mask)
    }

    fn get_position(
        &mut self,
        logical_address: Address,
        fake: Choice,
    ) -> Result<Address, OramError> {
        log::debug!("RecursivePositionMap::get_position -- depth {}", self.depth);

        // (1) Split the address into the index of the position block holding it,
        //     and its offset within that block.
        let address_of_block = self.address_of_block(logical_address);
        let address_within_block = self.address_within_block(logical_address)?;

        // (2) Look for the position block in the nested stash.
        let (found, mut position) = self
            .positions
            .stash()
            .find_position(address_of_block, address_within_block);

        // (3) Fetch a block from the nested shuffle store: the requested one if it was not in the
        //     stash, and an untouched one otherwise.
        let (physical_address, block) = self.positions.fetch(address_of_block, found)?;
        self.positions.retire(physical_address, &block)?;

        // (4) Take the position from the fetched block, unless it is a dummy fetched on behalf of
        //     a block already found in the stash. A fake lookup always takes it: the fetched block
        //     is untouched, so all of its positions are unused. Entry 0 is used in that case,
        //     since it is the only entry that is never padding.
        let take_fetched = fake | !found;
        let offset = Address::conditional_select(&address_within_block, &0, fake);
        for (i, entry) in (0..).zip(&block.payload) {
            let is_requested_entry = offset.ct_eq(&i);
            position.conditional_assign(entry, take_fetched & is_requested_entry);
        }

        // (5) The position was selected obliviously and is uniformly random, so it may be revealed.
        Ok(position)
    }

    fn reinitialize<R: RngCore + CryptoRng>(
        &mut self,
        permutation: &[Address],
        rng: &mut R,
    ) -> Result<(), OramError> {
        self.positions.reinitialize(permutation, rng)
    }
}
