// Copyright (c) Meta Platforms, Inc. and affiliates.
//
// This source code is dual-licensed under either the MIT license found in the
// LICENSE-MIT file in the root directory of this source tree or the Apache
// License, Version 2.0 found in the LICENSE-APACHE file in the root directory
// of this source tree. You may select, at your option, one of the above-listed licenses.

//! Implements an entry value `BlockValue` consisting of unstructured bytes.

use crate::{BlockSize, OramBlock};
use rand::{
    distributions::{Distribution, Standard},
    Rng,
};
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};

#[derive(Clone, Copy, Debug, PartialEq)]
#[repr(align(64))]
/// An `OramBlock` consisting of `B` unstructured bytes.
pub struct BlockValue<const B: BlockSize>([u8; B]);

impl<const B: BlockSize> BlockValue<B> {
    /// Instantiates a `BlockValue` from an array of `B` bytes.
    pub fn new(data: [u8; B]) -> Self {
        Self(data)
    }

    /// The bytes held by this value.
    pub fn as_bytes(&self) -> &[u8; B] {
        &self.0
    }
}

impl<const B: BlockSize> Default for BlockValue<B> {
    fn default() -> Self {
        BlockValue::<B>([0u8; B])
    }
}

impl<const B: BlockSize> From<[u8; B]> for BlockValue<B> {
    fn from(data: [u8; B]) -> Self {
        Self::new(data)
    }
}

impl<const B: BlockSize> OramBlock for BlockValue<B> {}

impl<const B: BlockSize> ConditionallySelectable for BlockValue<B> {
    fn conditional_select(a: &Self, b: &Self, choice: Choice) -> Self {
        let mut result = BlockValue::default();
        for i in 0..B {
            result.0[i] = u8::conditional_select(&a.0[i], &b.0[i], choice);
        }
        result
    }
}

impl<const B: BlockSize> ConstantTimeEq for BlockValue<B> {
    fn ct_eq(&self, other: &Self) -> Choice {
        self.0[..].ct_eq(&other.0[..])
    }
}

impl<const B: BlockSize> Distribution<BlockValue<B>> for Standard {
    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> BlockValue<B> {
        let mut result = BlockValue::default();
        rng.fill(&mut result.0[..]);
        result
    }
}
