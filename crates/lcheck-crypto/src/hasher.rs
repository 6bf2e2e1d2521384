use lcheck_types::Hash256;

/// Domain-separated BLAKE3 hasher.
///
/// Each hasher carries a domain tag that is prepended to every hash
/// computation, so a state entry and a transaction with identical bytes
/// never produce the same leaf.
pub struct ContentHasher {
    domain: &'static str,
}

impl ContentHasher {
    /// Leaf hasher for state entries.
    pub const STATE_LEAF: Self = Self {
        domain: "lcheck-state-leaf-v1",
    };
    /// Leaf hasher for transaction + metadata pairs.
    pub const TX_LEAF: Self = Self {
        domain: "lcheck-tx-leaf-v1",
    };
    /// Item identity (the accumulator's map key).
    pub const ITEM_ID: Self = Self {
        domain: "lcheck-item-v1",
    };
    /// Transaction identifier derived from the raw transaction blob.
    pub const TX_ID: Self = Self {
        domain: "lcheck-txid-v1",
    };
    /// Ledger identifier derived from a header's contents.
    pub const LEDGER: Self = Self {
        domain: "lcheck-ledger-v1",
    };

    pub const fn new(domain: &'static str) -> Self {
        Self { domain }
    }

    /// Hash one byte string with domain separation.
    pub fn hash(&self, data: &[u8]) -> Hash256 {
        self.hash_parts(&[data])
    }

    /// Hash several byte strings, each length-prefixed so that part
    /// boundaries are unambiguous.
    pub fn hash_parts(&self, parts: &[&[u8]]) -> Hash256 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.domain.as_bytes());
        hasher.update(b":");
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Hash256::new(*hasher.finalize().as_bytes())
    }

    pub fn domain(&self) -> &str {
        self.domain
    }
}
