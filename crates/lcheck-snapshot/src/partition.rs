//! Key-space partitioning.
//!
//! Cursors come from recent diff sets: keys that changed lately are spread
//! across the space roughly the way writes are, and are cheap to collect.

use lcheck_store::LedgerReader;
use lcheck_types::{Key, KeyBounds, Sequence};
use tokio_util::sync::CancellationToken;

use crate::error::{SnapshotError, SnapshotResult};

/// Compute the cursor list for a snapshot at `target`.
///
/// Candidates are the diff keys of `target` and the `fanout - 1` sequences
/// before it. The result is sorted, duplicate-free, strictly inside
/// `bounds` and holds only keys live at `target`. An empty list is valid
/// and means a single sentinel-to-sentinel segment.
pub async fn partition(
    reader: &dyn LedgerReader,
    bounds: &KeyBounds,
    target: Sequence,
    fanout: u64,
    cancel: &CancellationToken,
) -> SnapshotResult<Vec<Key>> {
    let mut candidates = Vec::new();
    for back in 0..fanout.min(target.saturating_add(1)) {
        check_cancel(cancel)?;
        candidates.extend(reader.diff_keys(target - back).await?);
    }
    candidates.sort_unstable();
    candidates.dedup();
    candidates.retain(|key| bounds.contains(key));

    let mut cursors = Vec::with_capacity(candidates.len());
    for key in candidates {
        check_cancel(cancel)?;
        if reader.object(&key, target).await?.is_live() {
            cursors.push(key);
        } else {
            tracing::debug!(key = %key, seq = target, "dropping non-live cursor candidate");
        }
    }

    tracing::debug!(seq = target, fanout, cursors = cursors.len(), "key space partitioned");
    Ok(cursors)
}

pub(crate) fn check_cancel(cancel: &CancellationToken) -> SnapshotResult<()> {
    if cancel.is_cancelled() {
        return Err(SnapshotError::Cancelled);
    }
    Ok(())
}
