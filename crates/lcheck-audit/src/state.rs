//! State digest verification, full and incremental.

use lcheck_snapshot::{SnapshotBuilder, StateSnapshot};
use lcheck_types::{Hash256, Sequence};

use crate::error::AuditResult;
use crate::report::{Mismatch, MismatchKind, UnitOutcome};

/// Compares reconstructed state digests against ledger headers.
#[derive(Clone)]
pub struct StateVerifier {
    builder: SnapshotBuilder,
}

impl StateVerifier {
    pub fn new(builder: SnapshotBuilder) -> Self {
        Self { builder }
    }

    /// Rebuild the state at `seq` by partitioned traversal and compare.
    pub async fn verify_full(&self, seq: Sequence) -> AuditResult<UnitOutcome> {
        let snapshot = self.builder.build(seq).await?;
        self.compare(seq, snapshot.digest()).await
    }

    /// Build the base snapshot for an incremental run; the returned outcome
    /// holds the base comparison.
    pub async fn base(&self, seq: Sequence) -> AuditResult<(StateSnapshot, UnitOutcome)> {
        let snapshot = self.builder.build(seq).await?;
        let outcome = self.compare(seq, snapshot.digest()).await?;
        Ok((snapshot, outcome))
    }

    /// Advance `snapshot` to `seq` through its diff set and compare.
    pub async fn verify_next(
        &self,
        snapshot: &mut StateSnapshot,
        seq: Sequence,
    ) -> AuditResult<UnitOutcome> {
        let digest = snapshot
            .apply_diff(self.builder.reader().as_ref(), seq, self.builder.cancel_token())
            .await?;
        self.compare(seq, digest).await
    }

    async fn compare(&self, seq: Sequence, computed: Hash256) -> AuditResult<UnitOutcome> {
        let header = self.builder.reader().ledger_header(seq).await?;
        let mut outcome = UnitOutcome::default();
        if computed == header.state_digest {
            tracing::info!(seq, digest = %computed, "state digest matches");
        } else {
            outcome.push(Mismatch::record(
                seq,
                MismatchKind::StateDigest,
                format!("computed {computed} header {}", header.state_digest),
            ));
        }
        Ok(outcome)
    }
}
