use serde::{Deserialize, Serialize};

use crate::bytes::{hex_blob, Hash256};

/// Monotonic ledger sequence number.
pub type Sequence = u64;

/// The digests recorded for one ledger, treated as ground truth.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHeader {
    pub sequence: Sequence,
    /// Hash identifying the ledger itself (key of the reverse hash index).
    pub ledger_hash: Hash256,
    /// Digest over every live state entry.
    pub state_digest: Hash256,
    /// Digest over every transaction and its metadata.
    pub tx_digest: Hash256,
}

/// A transaction row: hash, raw transaction blob and raw metadata blob.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub hash: Hash256,
    #[serde(with = "hex_blob")]
    pub tx: Vec<u8>,
    #[serde(with = "hex_blob")]
    pub metadata: Vec<u8>,
}

/// Result of a point-in-time object read.
///
/// A tombstone is a stored deletion marker; `Absent` means no version of the
/// key exists at or below the requested sequence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectVersion {
    Live(Vec<u8>),
    Tombstone,
    Absent,
}

impl ObjectVersion {
    /// Interpret a stored value: an empty value is a tombstone.
    pub fn from_stored(value: Vec<u8>) -> Self {
        if value.is_empty() {
            Self::Tombstone
        } else {
            Self::Live(value)
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    /// The live value, if any.
    pub fn into_live(self) -> Option<Vec<u8>> {
        match self {
            Self::Live(value) => Some(value),
            Self::Tombstone | Self::Absent => None,
        }
    }
}
