use lcheck_types::{Key, Sequence};

/// Errors from store operations. Every variant is an infrastructure failure:
/// the auditor aborts the run when it sees one.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend failed to answer a query.
    #[error("backend error: {0}")]
    Backend(String),

    /// No header row exists for the ledger.
    #[error("ledger header missing for sequence {0}")]
    MissingHeader(Sequence),

    /// No successor edge exists for the key at or below the sequence.
    #[error("successor missing for key {key} at sequence {seq}")]
    MissingSuccessor { key: Key, seq: Sequence },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
