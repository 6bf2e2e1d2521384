//! Opt-in corrective writes.
//!
//! Each repair is one insert followed by one confirming read. Outcomes are
//! logged and returned; a failed repair never aborts the run.

use std::sync::Arc;

use lcheck_store::{LedgerReader, RepairWriter, StoreResult};
use lcheck_types::{Hash256, Sequence};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepairOutcome {
    /// The row was written and reads back as expected.
    Confirmed,
    /// The write or the confirming read failed, or the read disagreed.
    Failed,
}

impl RepairOutcome {
    pub fn is_confirmed(self) -> bool {
        self == Self::Confirmed
    }
}

#[derive(Clone)]
pub struct RepairController {
    reader: Arc<dyn LedgerReader>,
    writer: Arc<dyn RepairWriter>,
}

impl RepairController {
    pub fn new(reader: Arc<dyn LedgerReader>, writer: Arc<dyn RepairWriter>) -> Self {
        Self { reader, writer }
    }

    /// Insert `hash -> seq` into the ledger-hash reverse index and confirm
    /// it resolves to `seq`.
    pub async fn repair_ledger_hash(&self, hash: &Hash256, seq: Sequence) -> RepairOutcome {
        let attempt = self.write_ledger_hash(hash, seq).await;
        report("ledger_hash", seq, &hash.to_hex(), attempt)
    }

    /// Insert the URI row for `token` at `seq` and confirm exactly one row
    /// now exists.
    pub async fn repair_nft_uri(&self, token: &Hash256, seq: Sequence, uri: &[u8]) -> RepairOutcome {
        let attempt = self.write_nft_uri(token, seq, uri).await;
        report("nft_uri", seq, &token.to_hex(), attempt)
    }

    async fn write_ledger_hash(&self, hash: &Hash256, seq: Sequence) -> StoreResult<bool> {
        self.writer.insert_ledger_hash(hash, seq).await?;
        Ok(self.reader.ledger_hash_sequence(hash).await? == Some(seq))
    }

    async fn write_nft_uri(&self, token: &Hash256, seq: Sequence, uri: &[u8]) -> StoreResult<bool> {
        self.writer.insert_nft_uri(token, seq, uri).await?;
        Ok(self.reader.nft_uri_count(token, seq).await? == 1)
    }
}

fn report(table: &str, seq: Sequence, id: &str, attempt: StoreResult<bool>) -> RepairOutcome {
    match attempt {
        Ok(true) => {
            tracing::info!(table, seq, id, "repair confirmed");
            RepairOutcome::Confirmed
        }
        Ok(false) => {
            tracing::error!(table, seq, id, "repair not visible on re-read");
            RepairOutcome::Failed
        }
        Err(e) => {
            tracing::error!(table, seq, id, error = %e, "repair failed");
            RepairOutcome::Failed
        }
    }
}
