//! Successor-chain traversal and parallel snapshot construction.

use std::sync::Arc;

use lcheck_crypto::{AccumulatorFactory, AccumulatorMode};
use lcheck_store::LedgerReader;
use lcheck_types::{Hash256, Key, KeyBounds, ObjectVersion, Sequence};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::error::{SnapshotError, SnapshotResult};
use crate::partition::{check_cancel, partition};
use crate::session::AccumulatorSession;

/// A `[from, to)` slice of the key space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    pub from: Key,
    pub to: Key,
}

impl Segment {
    /// Segments delimited by `cursors`, covering `bounds` end to end.
    pub fn split(bounds: &KeyBounds, cursors: &[Key]) -> Vec<Segment> {
        bounds
            .segments(cursors)
            .into_iter()
            .map(|(from, to)| Segment { from, to })
            .collect()
    }
}

/// Walk the successor chain through `segment` at `seq`, feeding every live
/// entry into `session`. Returns the number of entries added.
///
/// `segment.from` is processed (unless it is a sentinel); the walk stops as
/// soon as the successor is `>= segment.to`, so the end key belongs to the
/// next segment. Tombstoned keys are skipped but still followed.
pub async fn traverse_segment(
    reader: &dyn LedgerReader,
    bounds: &KeyBounds,
    seq: Sequence,
    segment: Segment,
    session: &AccumulatorSession,
    cancel: &CancellationToken,
) -> SnapshotResult<usize> {
    tracing::debug!(seq, from = %segment.from, to = %segment.to, "segment traversal started");
    let mut added = 0;
    let mut cursor = segment.from;
    loop {
        if !bounds.is_sentinel(&cursor) {
            check_cancel(cancel)?;
            match reader.object(&cursor, seq).await? {
                ObjectVersion::Live(value) => {
                    session.add(cursor.as_bytes(), &value);
                    added += 1;
                }
                ObjectVersion::Tombstone => {}
                ObjectVersion::Absent => {
                    tracing::warn!(key = %cursor, seq, "successor chain names a key with no object row");
                }
            }
        }

        check_cancel(cancel)?;
        let next = reader.successor(&cursor, seq).await?;
        if next >= segment.to {
            break;
        }
        if next <= cursor {
            return Err(SnapshotError::BrokenChain {
                key: cursor,
                next,
                seq,
            });
        }
        cursor = next;
    }
    tracing::debug!(seq, from = %segment.from, added, "segment traversal finished");
    Ok(added)
}

/// Reconstructed state at one sequence.
#[derive(Debug)]
pub struct StateSnapshot {
    sequence: Sequence,
    session: Arc<AccumulatorSession>,
}

impl StateSnapshot {
    pub(crate) fn new(sequence: Sequence, session: Arc<AccumulatorSession>) -> Self {
        Self { sequence, session }
    }

    /// Sequence the snapshot currently reflects.
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn digest(&self) -> Hash256 {
        self.session.digest()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.session.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn session(&self) -> &AccumulatorSession {
        &self.session
    }

    pub(crate) fn advance_to(&mut self, sequence: Sequence) {
        self.sequence = sequence;
    }
}

/// Builds full state snapshots: partition, one traversal task per segment,
/// join, digest.
#[derive(Clone)]
pub struct SnapshotBuilder {
    reader: Arc<dyn LedgerReader>,
    factory: Arc<dyn AccumulatorFactory>,
    bounds: KeyBounds,
    fanout: u64,
    cancel: CancellationToken,
}

impl SnapshotBuilder {
    pub fn new(reader: Arc<dyn LedgerReader>, factory: Arc<dyn AccumulatorFactory>) -> Self {
        Self {
            reader,
            factory,
            bounds: KeyBounds::default(),
            fanout: 16,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_bounds(mut self, bounds: KeyBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Number of preceding diff sets mined for cursors. Zero disables
    /// partitioning.
    pub fn with_fanout(mut self, fanout: u64) -> Self {
        self.fanout = fanout;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn reader(&self) -> &Arc<dyn LedgerReader> {
        &self.reader
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Partition the space at `seq` and traverse it.
    pub async fn build(&self, seq: Sequence) -> SnapshotResult<StateSnapshot> {
        let cursors = partition(
            self.reader.as_ref(),
            &self.bounds,
            seq,
            self.fanout,
            &self.cancel,
        )
        .await?;
        self.build_with_cursors(seq, &cursors).await
    }

    /// Traverse `seq` split at the given cursors, which must be strictly
    /// increasing and inside the bounds.
    ///
    /// The first failing segment aborts the snapshot; the remaining tasks
    /// are aborted when the join set is dropped.
    pub(crate) async fn build_with_cursors(
        &self,
        seq: Sequence,
        cursors: &[Key],
    ) -> SnapshotResult<StateSnapshot> {
        let session = Arc::new(AccumulatorSession::new(
            AccumulatorMode::State,
            self.factory.create(AccumulatorMode::State),
        ));

        let mut tasks = JoinSet::new();
        for segment in Segment::split(&self.bounds, cursors) {
            let reader = Arc::clone(&self.reader);
            let session = Arc::clone(&session);
            let cancel = self.cancel.clone();
            let bounds = self.bounds;
            tasks.spawn(async move {
                traverse_segment(reader.as_ref(), &bounds, seq, segment, &session, &cancel).await
            });
        }

        let mut entries = 0;
        while let Some(joined) = tasks.join_next().await {
            entries += joined.map_err(|e| SnapshotError::TaskFailed(e.to_string()))??;
        }

        tracing::debug!(seq, segments = cursors.len() + 1, entries, "snapshot built");
        Ok(StateSnapshot::new(seq, session))
    }
}
