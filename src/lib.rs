// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! An implementation of Square-Root Oblivious RAM.
//!
//! A [`SqrtOram`] stores `n` entries of `entry_length` values each. Every
//! access touches the same number of physical locations and performs the same
//! sequence of operations, whatever the index and whether it is a read or a write.
//! Values are processed with the constant-time primitives of [`subtle`];
//! the only values that are ever used to index memory directly are the
//! physical addresses chosen by the position map, which are uniformly random.

#![warn(clippy::cargo, clippy::doc_markdown, missing_docs, rustdoc::all)]

use rand::{CryptoRng, RngCore};
use std::num::TryFromIntError;
use subtle::{Choice, ConditionallySelectable};
use thiserror::Error;

pub mod block_value;
pub mod linear_position_map;
pub mod position_map;
pub mod shuffle_store;
pub mod sqrt_oram;
pub mod stash;
#[cfg(test)]
mod test_utils;
mod utils;

pub use crate::block_value::BlockValue;
pub use crate::sqrt_oram::{default_period, SqrtOram, DEFAULT_POSITIONS_PER_BLOCK};

/// The numeric type used to specify the size of an ORAM block in bytes.
pub type BlockSize = usize;
/// The numeric type used to specify the size of an ORAM in blocks, and to index into the ORAM.
pub type Address = u64;
/// The numeric type used to specify the number of values stored in one ORAM entry.
pub type EntryLength = usize;
/// The numeric type used to specify the period (number of accesses between refreshes) of an ORAM.
pub type Period = usize;
/// The numeric type used to specify how many positions are packed into one position map block.
pub type PositionsPerBlock = usize;

/// The type of value stored in each slot of an ORAM entry.
pub trait OramBlock:
    Copy + Clone + std::fmt::Debug + Default + PartialEq + ConditionallySelectable
{
}

impl OramBlock for u8 {}
impl OramBlock for u16 {}
impl OramBlock for u32 {}
impl OramBlock for u64 {}

/// A list of error types which are produced during ORAM protocol execution.
#[derive(Error, Debug)]
pub enum OramError {
    /// Errors arising from conversions between integer types.
    #[error("Arithmetic error encountered.")]
    IntegerConversionError(#[from] TryFromIntError),
    /// Errors arising from attempting to make an ORAM access to an invalid address.
    #[error("Attempted to access an out-of-bounds ORAM address {attempted} (capacity {capacity}).")]
    AddressOutOfBoundsError {
        /// The address the caller attempted to access.
        attempted: Address,
        /// The number of entries in the ORAM.
        capacity: Address,
    },
    /// Errors arising from an entry whose length differs from the ORAM's entry length.
    #[error("Expected an entry of {expected} values, got {actual}.")]
    EntryLengthMismatch {
        /// The entry length fixed at construction.
        expected: EntryLength,
        /// The length of the entry the caller supplied.
        actual: usize,
    },
    /// Errors arising from invalid parameters for an ORAM.
    #[error("Invalid configuration.")]
    InvalidConfigurationError,
    /// An oblivious scan failed to select a position. This indicates a bug and must not be retried.
    #[error("Position map at depth {depth} did not select a physical address.")]
    InvariantViolation {
        /// The recursion depth of the position map that failed.
        depth: usize,
    },
}

/// Represents an oblivious RAM (ORAM) mapping addresses to entries of `entry_length` values.
pub trait Oram
where
    Self: Sized,
{
    /// The type of the values stored by the ORAM.
    type V: OramBlock;

    /// Returns the number of entries stored by the ORAM.
    fn block_capacity(&self) -> Result<Address, OramError>;

    /// Returns the number of values in each entry.
    fn entry_length(&self) -> EntryLength;

    /// Performs an oblivious access to the entry at `index`.
    /// If `is_write` is set, the entry is overwritten with `value`; otherwise it is left unchanged.
    /// Returns the value the entry held before the access.
    fn access<R: RngCore + CryptoRng>(
        &mut self,
        index: Address,
        is_write: Choice,
        value: &[Self::V],
        rng: &mut R,
    ) -> Result<Vec<Self::V>, OramError>;

    /// Obliviously reads the entry stored at `index`.
    fn read<R: RngCore + CryptoRng>(
        &mut self,
        index: Address,
        rng: &mut R,
    ) -> Result<Vec<Self::V>, OramError> {
        let ignored = vec![Self::V::default(); self.entry_length()];
        self.access(index, Choice::from(0), &ignored, rng)
    }

    /// Obliviously writes `new_value` to the entry stored at `index`.
    fn write<R: RngCore + CryptoRng>(
        &mut self,
        index: Address,
        new_value: &[Self::V],
        rng: &mut R,
    ) -> Result<(), OramError> {
        self.access(index, Choice::from(1), new_value, rng)?;
        Ok(())
    }
}
