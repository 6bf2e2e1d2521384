//! Hash accumulators for lcheck.
//!
//! The auditor recomputes state and transaction digests through the
//! [`HashAccumulator`] interface. [`MerkleAccumulator`] is the bundled
//! implementation: domain-separated BLAKE3 leaves folded into a binary
//! Merkle root, independent of insertion order.

pub mod accumulator;
pub mod hasher;
pub mod merkle;

pub use accumulator::{
    AccumulatorFactory, AccumulatorMode, HashAccumulator, MerkleAccumulator, MerkleFactory,
};
pub use hasher::ContentHasher;
pub use merkle::merkle_root;
