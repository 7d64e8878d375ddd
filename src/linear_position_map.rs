// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A position map that answers every lookup with a complete pass over its entries.

use crate::{Address, OramError};
use std::iter::zip;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

/// The base case position map: `n` physical addresses stored in logical order, together with a
/// secret bit per entry recording whether the entry has been handed out during the current epoch.
#[derive(Debug)]
pub struct LinearPositionMap {
    physical: Vec<Address>,
    used: Vec<u8>,
    depth: usize,
}

impl LinearPositionMap {
    /// Creates a position map sending logical address `i` to `permutation[i]`.
    pub fn new(permutation: Vec<Address>, depth: usize) -> Self {
        log::debug!(
            "LinearPositionMap::new -- depth {}, size {}",
            depth,
            permutation.len()
        );

        let used = vec![0u8; permutation.len()];
        Self {
            physical: permutation,
            used,
            depth,
        }
    }

    /// The number of logical addresses mapped.
    pub fn capacity(&self) -> Result<Address, OramError> {
        Ok(self.physical.len().try_into()?)
    }

    /// The depth of this position map below the top-level ORAM.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the physical address of `logical_address`, or if `fake` is set, the physical
    /// address of the first entry not yet handed out during this epoch.
    /// Either way, exactly one entry is selected and marked as handed out, by a scan that
    /// visits every entry.
    pub fn get_position(
        &mut self,
        logical_address: Address,
        fake: Choice,
    ) -> Result<Address, OramError> {
        log::debug!("LinearPositionMap::get_position -- depth {}", self.depth);

        let real = !fake;
        let mut position = Address::MAX;
        let mut done = Choice::from(0);

        for (i, (physical, used)) in zip(&self.physical, &mut self.used).enumerate() {
            let is_requested_index = Address::try_from(i)?.ct_eq(&logical_address);
            let is_free = !Choice::from(*used);

            let selected = (real & is_requested_index) | (fake & is_free & !done);
            position.conditional_assign(physical, selected);
            used.conditional_assign(&1, selected);
            done |= selected;
        }

        if position >= self.capacity()? {
            log::error!(
                "Position map at depth {} did not select a physical address",
                self.depth
            );
            return Err(OramError::InvariantViolation { depth: self.depth });
        }
        Ok(position)
    }

    /// Overwrites the map with a new permutation, starting a new epoch.
    pub fn reinitialize(&mut self, permutation: &[Address]) -> Result<(), OramError> {
        if permutation.len() != self.physical.len() {
            return Err(OramError::InvalidConfigurationError);
        }
        self.physical.copy_from_slice(permutation);
        self.used.fill(0);
        Ok(())
    }
}
