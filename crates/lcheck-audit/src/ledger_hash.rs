//! Ledger-hash reverse-index verification.

use std::sync::Arc;

use lcheck_store::LedgerReader;
use lcheck_types::Sequence;
use tokio_util::sync::CancellationToken;

use crate::error::{AuditError, AuditResult};
use crate::repair::RepairController;
use crate::report::{Mismatch, MismatchKind, UnitOutcome};

/// Checks that a ledger's own hash resolves back to its sequence through
/// the reverse index.
#[derive(Clone)]
pub struct LedgerHashVerifier {
    reader: Arc<dyn LedgerReader>,
    repair: Option<RepairController>,
    cancel: CancellationToken,
}

impl LedgerHashVerifier {
    pub fn new(reader: Arc<dyn LedgerReader>) -> Self {
        Self {
            reader,
            repair: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Insert missing reverse-index rows through `repair`.
    pub fn with_repair(mut self, repair: RepairController) -> Self {
        self.repair = Some(repair);
        self
    }

    pub async fn verify(&self, seq: Sequence) -> AuditResult<UnitOutcome> {
        let mut outcome = UnitOutcome::default();
        self.check_cancel()?;
        let header = self.reader.ledger_header(seq).await?;
        let hash = header.ledger_hash;
        self.check_cancel()?;

        match self.reader.ledger_hash_sequence(&hash).await? {
            Some(found) if found == seq => {
                tracing::debug!(seq, hash = %hash, "ledger hash resolves");
            }
            Some(found) => outcome.push(Mismatch::record(
                seq,
                MismatchKind::LedgerHashSequence,
                format!("hash {hash} resolves to seq {found}"),
            )),
            None => {
                outcome.push(Mismatch::record(
                    seq,
                    MismatchKind::MissingLedgerHash,
                    format!("hash {hash}"),
                ));
                if let Some(repair) = &self.repair {
                    outcome.repairs.attempted += 1;
                    if repair.repair_ledger_hash(&hash, seq).await.is_confirmed() {
                        outcome.repairs.confirmed += 1;
                    }
                }
            }
        }
        Ok(outcome)
    }

    fn check_cancel(&self) -> AuditResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AuditError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcheck_crypto::MerkleFactory;
    use lcheck_store::{InMemoryStore, LedgerDraft, LedgerSimulator, StoreError};
    use lcheck_types::Key;

    fn store_with(ledgers: u64) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        let mut sim = LedgerSimulator::new(store.clone(), Arc::new(MerkleFactory), 1);
        for n in 1..=ledgers {
            sim.commit(LedgerDraft::new().set(Key::from_u64(n), "v")).unwrap();
        }
        store
    }

    #[tokio::test]
    async fn intact_index_passes() {
        let store = store_with(3);
        let verifier = LedgerHashVerifier::new(store);
        for seq in 1..=3 {
            assert!(verifier.verify(seq).await.unwrap().mismatches.is_empty());
        }
    }

    #[tokio::test]
    async fn missing_row_counted_and_repaired() {
        let store = store_with(2);
        let hash = store.ledger_header(2).await.unwrap().ledger_hash;
        assert!(store.drop_ledger_hash(&hash));

        let verifier = LedgerHashVerifier::new(store.clone())
            .with_repair(RepairController::new(store.clone(), store.clone()));
        let outcome = verifier.verify(2).await.unwrap();
        assert_eq!(outcome.mismatches.len(), 1);
        assert_eq!(outcome.mismatches[0].kind, MismatchKind::MissingLedgerHash);
        assert_eq!(outcome.repairs.confirmed, 1);
        assert_eq!(store.ledger_hash_sequence(&hash).await.unwrap(), Some(2));
    }

    #[tokio::test]
    async fn row_pointing_elsewhere_is_a_mismatch() {
        let store = store_with(2);
        let hash = store.ledger_header(2).await.unwrap().ledger_hash;
        store.put_ledger_hash(hash, 1);
        let outcome = LedgerHashVerifier::new(store).verify(2).await.unwrap();
        assert_eq!(outcome.mismatches[0].kind, MismatchKind::LedgerHashSequence);
    }

    #[tokio::test]
    async fn missing_header_is_fatal() {
        let store = store_with(1);
        let err = LedgerHashVerifier::new(store).verify(5).await.unwrap_err();
        assert!(matches!(err, AuditError::Store(StoreError::MissingHeader(5))));
    }
}
