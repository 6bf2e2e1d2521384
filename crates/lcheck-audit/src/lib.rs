//! Ledger integrity audit for lcheck.
//!
//! An [`Auditor`] walks a sequence range in barrier-synchronized waves and
//! runs one verification unit per ledger:
//!
//! - `objects` -- rebuild the state by partitioned traversal and compare
//!   with the header's state digest ([`StateVerifier`])
//! - `diff` -- one full rebuild, then per-ledger diff sets
//! - `tx` -- recompute the transaction digest and cross-check decoded
//!   effects against the secondary indexes ([`TransactionVerifier`])
//! - `ledger-hash` -- confirm each ledger hash resolves back to its
//!   sequence ([`LedgerHashVerifier`])
//!
//! Read failures abort the run. Logical mismatches are collected in an
//! [`AuditReport`] and never stop it. Two inconsistencies can be repaired
//! on request through the [`RepairController`].

pub mod config;
pub mod decoder;
pub mod error;
pub mod ledger_hash;
pub mod orchestrator;
pub mod repair;
pub mod report;
pub mod state;
pub mod tx;

pub use config::{AuditConfig, CheckOptions};
pub use decoder::{DecodeError, JsonEffectsDecoder, TxDecoder};
pub use error::{AuditError, AuditResult};
pub use ledger_hash::LedgerHashVerifier;
pub use orchestrator::{plan_waves, AuditMode, Auditor, Direction};
pub use repair::{RepairController, RepairOutcome};
pub use report::{AuditReport, Mismatch, MismatchKind, RepairStats, UnitOutcome};
pub use state::StateVerifier;
pub use tx::TransactionVerifier;
