// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! A fixed-size, obliviously scanned Square-Root ORAM stash.

use crate::{shuffle_store::Block, Address, EntryLength, OramBlock, OramError, Period};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

/// A stash of up to `capacity` blocks, filled in order.
///
/// The number of blocks held (the clock) is public: every ORAM access appends exactly one block.
/// Scans always visit every occupied slot.
#[derive(Debug)]
pub struct Stash<V: OramBlock> {
    payloads: Vec<V>,
    indices: Vec<Address>,
    entry_length: EntryLength,
    clock: usize,
}

impl<V: OramBlock> Stash<V> {
    const DUMMY_INDEX: Address = Address::MAX;

    /// Creates an empty stash holding up to `capacity` blocks of `entry_length` values.
    pub fn new(capacity: Period, entry_length: EntryLength) -> Self {
        Self {
            payloads: vec![V::default(); capacity * entry_length],
            indices: vec![Self::DUMMY_INDEX; capacity],
            entry_length,
            clock: 0,
        }
    }

    /// The maximum number of blocks the stash can hold.
    pub fn capacity(&self) -> usize {
        self.indices.len()
    }

    /// The number of blocks appended since the stash was last cleared.
    pub fn len(&self) -> usize {
        self.clock
    }

    /// Returns true if no block has been appended since the stash was last cleared.
    pub fn is_empty(&self) -> bool {
        self.clock == 0
    }

    /// Returns true if the stash cannot take another block.
    pub fn is_full(&self) -> bool {
        self.clock == self.capacity()
    }

    fn entry(&self, slot: usize) -> &[V] {
        &self.payloads[slot * self.entry_length..(slot + 1) * self.entry_length]
    }

    /// Obliviously scans the stash for a block with logical index `index`.
    /// If one is found, its values are copied into `result`, and if `is_write` is set,
    /// they are overwritten with `value`. Returns whether the block was found.
    pub fn scan(
        &mut self,
        index: Address,
        is_write: Choice,
        value: &[V],
        result: &mut [V],
    ) -> Choice {
        debug_assert_eq!(value.len(), self.entry_length);
        debug_assert_eq!(result.len(), self.entry_length);

        let mut found = Choice::from(0);
        for (slot_index, entry) in self
            .indices
            .iter()
            .zip(self.payloads.chunks_exact_mut(self.entry_length))
            .take(self.clock)
        {
            let is_requested_index = slot_index.ct_eq(&index);
            found |= is_requested_index;

            let should_write = is_requested_index & is_write;
            for ((stored, out), new) in entry.iter_mut().zip(result.iter_mut()).zip(value) {
                out.conditional_assign(stored, is_requested_index);
                stored.conditional_assign(new, should_write);
            }
        }
        found
    }

    /// Appends `block` to the stash.
    pub fn push(&mut self, block: &Block<V>) -> Result<(), OramError> {
        // Only reachable if a caller skips the refresh at the end of an epoch.
        assert!(!self.is_full());

        if block.payload.len() != self.entry_length {
            return Err(OramError::EntryLengthMismatch {
                expected: self.entry_length,
                actual: block.payload.len(),
            });
        }
        let start = self.clock * self.entry_length;
        self.payloads[start..start + self.entry_length].copy_from_slice(&block.payload);
        self.indices[self.clock] = block.index;
        self.clock += 1;
        Ok(())
    }

    /// Returns a copy of the block in `slot`.
    pub fn block(&self, slot: usize) -> Block<V> {
        Block {
            index: self.indices[slot],
            payload: self.entry(slot).to_vec(),
        }
    }

    /// Empties the stash.
    pub fn clear(&mut self) {
        self.indices.fill(Self::DUMMY_INDEX);
        self.clock = 0;
    }
}

impl Stash<Address> {
    /// Obliviously scans a stash of position blocks for the block with index `block_index`,
    /// and selects entry `offset` of that block. Returns whether the block was found, and the
    /// selected entry (`Address::MAX` if it was not).
    pub fn find_position(&self, block_index: Address, offset: Address) -> (Choice, Address) {
        let mut found = Choice::from(0);
        let mut position = Address::MAX;

        for slot in 0..self.clock {
            let is_requested_block = self.indices[slot].ct_eq(&block_index);
            found |= is_requested_block;

            for (i, entry) in (0..).zip(self.entry(slot)) {
                let is_requested_entry: Choice = is_requested_block & offset.ct_eq(&i);
                position.conditional_assign(entry, is_requested_entry);
            }
        }
        (found, position)
    }
}
