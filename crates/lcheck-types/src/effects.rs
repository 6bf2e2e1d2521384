//! Decoded transaction effects.
//!
//! A transaction decoder turns a transaction blob plus its metadata into an
//! effect set. Each effect implies a secondary-index row that must exist.

use serde::{Deserialize, Serialize};

use crate::bytes::{hex_blob, AccountId, Hash256, Key};

/// Everything the auditor cross-checks for one transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxEffects {
    /// Position of the transaction within its ledger.
    pub tx_index: u32,
    #[serde(default)]
    pub affected_accounts: Vec<AccountId>,
    /// Tokens touched by the transaction (one NFT-transaction row each).
    #[serde(default)]
    pub nft_txs: Vec<Hash256>,
    /// The token whose state changed, if any.
    #[serde(default)]
    pub nft_change: Option<NftChange>,
    #[serde(default)]
    pub key_diffs: KeyDiffs,
}

/// A token minted or modified by a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftChange {
    pub token_id: Hash256,
    pub issuer: AccountId,
    pub taxon: u32,
    #[serde(default, with = "opt_hex_blob")]
    pub uri: Option<Vec<u8>>,
}

/// State keys created, deleted and modified by a transaction.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDiffs {
    #[serde(default)]
    pub created: Vec<Key>,
    #[serde(default)]
    pub deleted: Vec<Key>,
    #[serde(default)]
    pub updated: Vec<Key>,
}

impl KeyDiffs {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }

    /// Append another transaction's diffs to this one.
    pub fn extend(&mut self, other: KeyDiffs) {
        self.created.extend(other.created);
        self.deleted.extend(other.deleted);
        self.updated.extend(other.updated);
    }
}

/// Per-category caps handed to the decoder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeLimits {
    pub max_accounts: usize,
    pub max_nft_items: usize,
    pub max_diff_items: usize,
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self {
            max_accounts: 1000,
            max_nft_items: 100,
            max_diff_items: 100,
        }
    }
}

mod opt_hex_blob {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match bytes {
            Some(b) => super::hex_blob::serialize(b, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        s.map(|s| hex::decode(s).map_err(serde::de::Error::custom))
            .transpose()
    }
}
