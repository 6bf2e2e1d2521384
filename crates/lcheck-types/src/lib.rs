//! Foundation types for lcheck.
//!
//! Every other lcheck crate depends on `lcheck-types`.
//!
//! # Key Types
//!
//! - [`Key`] -- 256-bit position in the ordered state key space
//! - [`KeyBounds`] -- lower/upper sentinels of one verification run
//! - [`Hash256`] -- digests, ledger hashes, transaction hashes, token ids
//! - [`LedgerHeader`] -- ground-truth digests for one ledger sequence
//! - [`ObjectVersion`] -- live value, tombstone or absence at a sequence
//! - [`TxEffects`] -- decoded effects of one transaction

pub mod bytes;
pub mod effects;
pub mod error;
pub mod key;
pub mod ledger;

pub use bytes::{hex_blob, AccountId, Hash256, Key};
pub use effects::{DecodeLimits, KeyDiffs, NftChange, TxEffects};
pub use error::TypeError;
pub use key::KeyBounds;
pub use ledger::{LedgerHeader, ObjectVersion, Sequence, TxRecord};
