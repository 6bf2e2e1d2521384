use lcheck_types::{Key, Sequence};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("store error: {0}")]
    Store(#[from] lcheck_store::StoreError),

    #[error("successor chain does not advance at {key} (seq {seq}): next is {next}")]
    BrokenChain { key: Key, next: Key, seq: Sequence },

    #[error("diff for seq {got} applied to a snapshot that expects seq {expected}")]
    OutOfOrder { expected: Sequence, got: Sequence },

    #[error("traversal task failed: {0}")]
    TaskFailed(String),

    #[error("snapshot cancelled")]
    Cancelled,
}

pub type SnapshotResult<T> = Result<T, SnapshotError>;
