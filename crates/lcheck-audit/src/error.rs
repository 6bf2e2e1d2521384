use lcheck_snapshot::SnapshotError;
use lcheck_types::Sequence;
use thiserror::Error;

use crate::decoder::DecodeError;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("store error: {0}")]
    Store(#[from] lcheck_store::StoreError),

    #[error("snapshot error: {0}")]
    Snapshot(SnapshotError),

    #[error("decode error at seq {seq}: {source}")]
    Decode {
        seq: Sequence,
        #[source]
        source: DecodeError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid range {from}..={to}: {reason}")]
    InvalidRange {
        from: Sequence,
        to: Sequence,
        reason: String,
    },

    #[error("verification task failed: {0}")]
    TaskFailed(String),

    #[error("audit cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<SnapshotError> for AuditError {
    fn from(err: SnapshotError) -> Self {
        match err {
            SnapshotError::Cancelled => Self::Cancelled,
            SnapshotError::TaskFailed(msg) => Self::TaskFailed(msg),
            SnapshotError::Store(store) => Self::Store(store),
            other => Self::Snapshot(other),
        }
    }
}

pub type AuditResult<T> = Result<T, AuditError>;
