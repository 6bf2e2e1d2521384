//! State snapshot reconstruction for lcheck.
//!
//! Rebuilds "every live key as of sequence S" from a versioned store and
//! feeds it into a hash accumulator:
//!
//! - [`partition`] -- picks live cursor keys from recent diff sets
//! - [`traverse_segment`] -- walks the successor chain over one `[from, to)`
//!   segment
//! - [`SnapshotBuilder`] -- partitions, runs one task per segment against a
//!   shared [`AccumulatorSession`] and joins them
//! - [`StateSnapshot::apply_diff`] -- advances a snapshot one sequence at a
//!   time from per-sequence diff sets

pub mod error;
pub mod incremental;
pub mod partition;
pub mod session;
pub mod traverse;

#[cfg(test)]
mod testutil;

pub use error::{SnapshotError, SnapshotResult};
pub use partition::partition;
pub use session::AccumulatorSession;
pub use traverse::{traverse_segment, Segment, SnapshotBuilder, StateSnapshot};
