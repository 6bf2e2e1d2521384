//! Diff-based snapshot updates.

use lcheck_store::LedgerReader;
use lcheck_types::{Hash256, Sequence};
use tokio_util::sync::CancellationToken;

use crate::error::{SnapshotError, SnapshotResult};
use crate::partition::check_cancel;
use crate::traverse::StateSnapshot;

impl StateSnapshot {
    /// Move the snapshot forward by one sequence using the diff set of
    /// `seq`, and return the new digest.
    ///
    /// Diffs must be applied in strictly increasing order with no gaps:
    /// `seq` has to be exactly one past the snapshot's sequence.
    pub async fn apply_diff(
        &mut self,
        reader: &dyn LedgerReader,
        seq: Sequence,
        cancel: &CancellationToken,
    ) -> SnapshotResult<Hash256> {
        let expected = self.sequence() + 1;
        if seq != expected {
            return Err(SnapshotError::OutOfOrder { expected, got: seq });
        }

        check_cancel(cancel)?;
        let mut keys = reader.diff_keys(seq).await?;
        keys.sort_unstable();
        keys.dedup();

        let (mut live, mut deleted) = (0usize, 0usize);
        for key in &keys {
            check_cancel(cancel)?;
            self.session().remove(key.as_bytes());
            match reader.object(key, seq).await?.into_live() {
                Some(value) => {
                    self.session().add(key.as_bytes(), &value);
                    live += 1;
                }
                None => deleted += 1,
            }
        }

        self.advance_to(seq);
        tracing::debug!(seq, changed = keys.len(), live, deleted, "diff applied");
        Ok(self.digest())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{k, simulator, simulator_at};
    use crate::traverse::SnapshotBuilder;
    use lcheck_crypto::MerkleFactory;
    use lcheck_store::{LedgerDraft, RandomHistory};
    use std::sync::Arc;

    #[tokio::test]
    async fn diff_chain_matches_full_traversal() {
        let mut sim = simulator();
        let headers = RandomHistory {
            seed: 11,
            ledgers: 15,
            key_pool: 16,
            ..Default::default()
        }
        .generate(&mut sim)
        .unwrap();
        let store = sim.store().clone();
        let builder = SnapshotBuilder::new(store.clone(), Arc::new(MerkleFactory));
        let cancel = CancellationToken::new();

        let mut snapshot = builder.build(1).await.unwrap();
        for header in &headers[1..] {
            let seq = header.sequence;
            let incremental = snapshot.apply_diff(&*store, seq, &cancel).await.unwrap();
            let full = builder.build(seq).await.unwrap();
            assert_eq!(incremental, full.digest(), "seq {seq}");
            assert_eq!(incremental, header.state_digest, "seq {seq}");
            assert_eq!(snapshot.len(), full.len());
        }
    }

    #[tokio::test]
    async fn delete_then_recreate_across_two_diffs() {
        let mut sim = simulator_at(4);
        sim.commit(LedgerDraft::new().set(k(1), "a").set(k(2), "b"))
            .unwrap();
        sim.commit(LedgerDraft::new().delete(k(2))).unwrap();
        sim.commit(LedgerDraft::new().set(k(1), "a2")).unwrap();
        sim.commit(LedgerDraft::new().set(k(2), "b2")).unwrap();
        let store = sim.store().clone();
        let builder = SnapshotBuilder::new(store.clone(), Arc::new(MerkleFactory));
        let cancel = CancellationToken::new();

        let mut snapshot = builder.build(5).await.unwrap();
        assert_eq!(snapshot.len(), 1);
        snapshot.apply_diff(&*store, 6, &cancel).await.unwrap();
        let digest = snapshot.apply_diff(&*store, 7, &cancel).await.unwrap();
        assert_eq!(digest, builder.build(7).await.unwrap().digest());
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.sequence(), 7);
    }

    #[tokio::test]
    async fn skipping_a_sequence_is_rejected() {
        let mut sim = simulator();
        for n in 1..=3 {
            sim.commit(LedgerDraft::new().set(k(n), "v")).unwrap();
        }
        let store = sim.store().clone();
        let builder = SnapshotBuilder::new(store.clone(), Arc::new(MerkleFactory));
        let mut snapshot = builder.build(1).await.unwrap();

        let err = snapshot
            .apply_diff(&*store, 3, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SnapshotError::OutOfOrder {
                expected: 2,
                got: 3
            }
        ));
        assert_eq!(snapshot.sequence(), 1);
    }

    #[tokio::test]
    async fn ledger_without_diff_keeps_digest() {
        let mut sim = simulator();
        sim.commit(LedgerDraft::new().set(k(1), "a")).unwrap();
        sim.commit(LedgerDraft::new()).unwrap();
        let store = sim.store().clone();
        let builder = SnapshotBuilder::new(store.clone(), Arc::new(MerkleFactory));
        let mut snapshot = builder.build(1).await.unwrap();
        let before = snapshot.digest();
        let after = snapshot
            .apply_diff(&*store, 2, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(before, after);
    }
}
