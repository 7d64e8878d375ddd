// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! The permuted backing memory of a Square-Root ORAM.

use crate::{
    utils::{
        bitonic_sort_with, invert_permutation_oblivious,
        random_permutation_of_0_through_n_exclusive,
    },
    Address, EntryLength, OramBlock, OramError,
};
use rand::{CryptoRng, RngCore};
use subtle::ConditionallySelectable;

/// An ORAM entry together with the logical index it belongs to.
#[derive(Clone, Debug, PartialEq)]
pub struct Block<V> {
    /// The logical index of the entry.
    pub index: Address,
    /// The `entry_length` values of the entry.
    pub payload: Vec<V>,
}

/// An array of `n` blocks, stored in an order given by a secret random permutation.
///
/// Slots read since the last refresh are marked as used. Which slots are used is public,
/// since it is determined by the (public) physical addresses handed out by the position map.
/// Every physical read and write is counted, so that tests can check that the number of
/// physical accesses does not depend on what is being accessed.
#[derive(Debug)]
pub struct ShuffleStore<V: OramBlock> {
    payloads: Vec<V>,
    indices: Vec<Address>,
    used: Vec<bool>,
    entry_length: EntryLength,
    /// `reads[i]` tracks the total number of reads made to slot `i`.
    pub reads: Vec<u64>,
    /// `writes[i]` tracks the total number of writes made to slot `i`.
    pub writes: Vec<u64>,
}

impl<V: OramBlock> ShuffleStore<V> {
    /// Returns a store holding `data`, laid out entry by entry, in logical order.
    /// The caller must call [`ShuffleStore::shuffle_the_shuffle`] before handing out slots.
    pub fn new(data: Vec<V>, entry_length: EntryLength) -> Result<Self, OramError> {
        if entry_length == 0 {
            return Err(OramError::InvalidConfigurationError);
        }
        if data.len() % entry_length != 0 {
            return Err(OramError::EntryLengthMismatch {
                expected: entry_length,
                actual: data.len() % entry_length,
            });
        }

        let number_of_slots = data.len() / entry_length;
        let capacity: Address = number_of_slots.try_into()?;
        Ok(Self {
            payloads: data,
            indices: Vec::from_iter(0..capacity),
            used: vec![false; number_of_slots],
            entry_length,
            reads: vec![0; number_of_slots],
            writes: vec![0; number_of_slots],
        })
    }

    /// The number of slots in the store.
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    /// Returns true if the store holds no slots.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The number of slots in the store, as an `Address`.
    pub fn capacity(&self) -> Result<Address, OramError> {
        Ok(self.indices.len().try_into()?)
    }

    /// The logical index held by each slot.
    pub fn indices(&self) -> &[Address] {
        &self.indices
    }

    fn slot(&self, physical_address: Address) -> Result<usize, OramError> {
        let slot: usize = physical_address.try_into()?;
        if slot >= self.indices.len() {
            return Err(OramError::AddressOutOfBoundsError {
                attempted: physical_address,
                capacity: self.capacity()?,
            });
        }
        Ok(slot)
    }

    /// Reads the block stored in slot `physical_address`.
    pub fn read_block(&mut self, physical_address: Address) -> Result<Block<V>, OramError> {
        log::trace!("Physical read -- {}", physical_address);

        let slot = self.slot(physical_address)?;
        self.reads[slot] += 1;
        let start = slot * self.entry_length;
        Ok(Block {
            index: self.indices[slot],
            payload: self.payloads[start..start + self.entry_length].to_vec(),
        })
    }

    /// Overwrites slot `physical_address` with `block`.
    pub fn write_block(
        &mut self,
        physical_address: Address,
        block: &Block<V>,
    ) -> Result<(), OramError> {
        log::trace!("Physical write -- {}", physical_address);

        let slot = self.slot(physical_address)?;
        if block.payload.len() != self.entry_length {
            return Err(OramError::EntryLengthMismatch {
                expected: self.entry_length,
                actual: block.payload.len(),
            });
        }
        self.writes[slot] += 1;
        let start = slot * self.entry_length;
        self.payloads[start..start + self.entry_length].copy_from_slice(&block.payload);
        self.indices[slot] = block.index;
        Ok(())
    }

    /// Marks slot `physical_address` as read during the current epoch.
    pub fn mark_used(&mut self, physical_address: Address) -> Result<(), OramError> {
        let slot = self.slot(physical_address)?;
        self.used[slot] = true;
        Ok(())
    }

    /// Returns true if `slot` has been read during the current epoch.
    pub fn is_used(&self, slot: usize) -> bool {
        self.used[slot]
    }

    /// The number of slots read during the current epoch.
    pub fn used_count(&self) -> usize {
        self.used.iter().filter(|used| **used).count()
    }

    /// Starts a new epoch in which no slot has been read.
    pub fn clear_used(&mut self) {
        self.used.fill(false);
    }

    /// Replaces the contents of the store with `data` in logical order, padding with default values.
    /// Does not reallocate.
    pub fn overwrite(&mut self, data: &[V]) -> Result<(), OramError> {
        if data.len() > self.payloads.len() {
            return Err(OramError::EntryLengthMismatch {
                expected: self.payloads.len(),
                actual: data.len(),
            });
        }

        let (head, tail) = self.payloads.split_at_mut(data.len());
        head.copy_from_slice(data);
        tail.fill(V::default());
        for (slot, index) in self.indices.iter_mut().enumerate() {
            *index = slot.try_into()?;
        }
        self.clear_used();
        Ok(())
    }

    /// Obliviously moves the block in slot `i` to slot `permutation[i]`, for every `i`.
    pub fn permute(&mut self, permutation: &[Address]) -> Result<(), OramError> {
        if permutation.len() != self.indices.len() {
            return Err(OramError::InvalidConfigurationError);
        }

        let entry_length = self.entry_length;
        let indices = &mut self.indices;
        let payloads = &mut self.payloads;
        let mut keys = permutation.to_vec();
        bitonic_sort_with(&mut keys, |i, j, do_swap| {
            let (indices_i, indices_j) = indices.split_at_mut(j);
            Address::conditional_swap(&mut indices_i[i], &mut indices_j[0], do_swap);

            let (payloads_i, payloads_j) = payloads.split_at_mut(j * entry_length);
            for k in 0..entry_length {
                V::conditional_swap(
                    &mut payloads_i[i * entry_length + k],
                    &mut payloads_j[k],
                    do_swap,
                );
            }
        });
        Ok(())
    }

    /// Applies a fresh secure random permutation to the store, and returns the permutation
    /// mapping each logical index to the slot now holding it.
    ///
    /// The result is the inverse of the logical indices *after* shuffling, which is not the
    /// inverse of the drawn permutation whenever the store was already out of logical order.
    pub fn shuffle_the_shuffle<R: RngCore + CryptoRng>(
        &mut self,
        rng: &mut R,
    ) -> Result<Vec<Address>, OramError> {
        let random_shuffle = random_permutation_of_0_through_n_exclusive(self.capacity()?, rng);
        self.permute(&random_shuffle)?;
        invert_permutation_oblivious(&self.indices)
    }

    /// Returns the total number of physical reads.
    pub fn get_read_count(&self) -> u64 {
        self.reads.iter().sum()
    }

    /// Returns the total number of physical writes.
    pub fn get_write_count(&self) -> u64 {
        self.writes.iter().sum()
    }
}
