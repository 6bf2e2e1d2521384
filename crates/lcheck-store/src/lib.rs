//! Versioned ledger store boundary for lcheck.
//!
//! The auditor only ever talks to a store through two traits:
//!
//! - [`LedgerReader`] -- point-in-time object and successor reads, diff
//!   sets, headers, transactions and secondary-index existence checks
//! - [`RepairWriter`] -- the two idempotent repair inserts
//!
//! # Backends
//!
//! - [`InMemoryStore`] -- table-per-`BTreeMap` store for tests and fixtures,
//!   dumpable to JSON via [`StoreDump`]
//!
//! [`LedgerSimulator`] writes consistent ledgers into an in-memory store.

pub mod error;
pub mod memory;
pub mod sim;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::{InMemoryStore, StoreDump};
pub use sim::{LedgerDraft, LedgerSimulator, RandomHistory};
pub use traits::{LedgerReader, RepairWriter};
