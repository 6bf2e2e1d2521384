//! The hash accumulator interface and its reference implementation.

use std::collections::BTreeMap;
use std::fmt;

use lcheck_types::Hash256;
use serde::{Deserialize, Serialize};

use crate::hasher::ContentHasher;
use crate::merkle::merkle_root;

/// What an accumulator ingests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulatorMode {
    /// `(state key, object value)` pairs.
    State,
    /// `(transaction blob, metadata blob)` pairs.
    Transaction,
}

impl fmt::Display for AccumulatorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::State => f.write_str("state"),
            Self::Transaction => f.write_str("transaction"),
        }
    }
}

/// Ingests ordered key/value pairs and emits a 32-byte digest.
///
/// Implementations are not required to be safe for concurrent mutation;
/// callers serialize access. Implementations used with parallel traversal
/// must be insensitive to the order of `add`/`remove` calls.
pub trait HashAccumulator: Send {
    /// Insert `primary -> secondary`, replacing any entry for `primary`.
    fn add(&mut self, primary: &[u8], secondary: &[u8]);

    /// Remove the entry for `primary`. No-op if absent.
    fn remove(&mut self, primary: &[u8]);

    /// Digest over every current entry.
    fn digest(&self) -> Hash256;

    /// Number of current entries.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Creates fresh accumulators. Injected so tests can substitute a fake.
pub trait AccumulatorFactory: Send + Sync {
    fn create(&self, mode: AccumulatorMode) -> Box<dyn HashAccumulator>;
}

/// Order-insensitive accumulator: entries are kept sorted by a hash of their
/// primary bytes, and the digest is the Merkle root over the sorted leaves.
pub struct MerkleAccumulator {
    mode: AccumulatorMode,
    entries: BTreeMap<Hash256, Hash256>,
}

impl MerkleAccumulator {
    pub fn new(mode: AccumulatorMode) -> Self {
        Self {
            mode,
            entries: BTreeMap::new(),
        }
    }

    pub fn mode(&self) -> AccumulatorMode {
        self.mode
    }

    fn item_id(&self, primary: &[u8]) -> Hash256 {
        ContentHasher::ITEM_ID.hash(primary)
    }

    fn leaf(&self, primary: &[u8], secondary: &[u8]) -> Hash256 {
        let hasher = match self.mode {
            AccumulatorMode::State => ContentHasher::STATE_LEAF,
            AccumulatorMode::Transaction => ContentHasher::TX_LEAF,
        };
        hasher.hash_parts(&[primary, secondary])
    }
}

impl HashAccumulator for MerkleAccumulator {
    fn add(&mut self, primary: &[u8], secondary: &[u8]) {
        let id = self.item_id(primary);
        let leaf = self.leaf(primary, secondary);
        self.entries.insert(id, leaf);
    }

    fn remove(&mut self, primary: &[u8]) {
        let id = self.item_id(primary);
        self.entries.remove(&id);
    }

    fn digest(&self) -> Hash256 {
        let leaves: Vec<Hash256> = self.entries.values().copied().collect();
        merkle_root(&leaves)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl fmt::Debug for MerkleAccumulator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerkleAccumulator")
            .field("mode", &self.mode)
            .field("entries", &self.entries.len())
            .finish()
    }
}

/// Factory for [`MerkleAccumulator`].
#[derive(Clone, Copy, Debug, Default)]
pub struct MerkleFactory;

impl AccumulatorFactory for MerkleFactory {
    fn create(&self, mode: AccumulatorMode) -> Box<dyn HashAccumulator> {
        Box::new(MerkleAccumulator::new(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn state() -> MerkleAccumulator {
        MerkleAccumulator::new(AccumulatorMode::State)
    }

    #[test]
    fn empty_digest_is_zero() {
        assert_eq!(state().digest(), Hash256::default());
        assert!(state().is_empty());
    }

    #[test]
    fn add_then_remove_restores_digest() {
        let mut acc = state();
        acc.add(b"k1", b"v1");
        let before = acc.digest();
        acc.add(b"k2", b"v2");
        assert_ne!(acc.digest(), before);
        acc.remove(b"k2");
        assert_eq!(acc.digest(), before);
    }

    #[test]
    fn remove_missing_is_noop() {
        let mut acc = state();
        acc.add(b"k1", b"v1");
        let before = acc.digest();
        acc.remove(b"nope");
        assert_eq!(acc.digest(), before);
        assert_eq!(acc.len(), 1);
    }

    #[test]
    fn add_replaces_existing_value() {
        let mut a = state();
        a.add(b"k", b"old");
        a.add(b"k", b"new");
        let mut b = state();
        b.add(b"k", b"new");
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn modes_produce_different_digests() {
        let mut s = state();
        let mut t = MerkleAccumulator::new(AccumulatorMode::Transaction);
        s.add(b"x", b"y");
        t.add(b"x", b"y");
        assert_ne!(s.digest(), t.digest());
    }

    #[test]
    fn factory_creates_requested_mode() {
        let acc = MerkleFactory.create(AccumulatorMode::Transaction);
        assert!(acc.is_empty());
        assert_eq!(
            format!("{}", AccumulatorMode::Transaction),
            "transaction"
        );
    }

    proptest! {
        #[test]
        fn insertion_order_does_not_matter(
            items in proptest::collection::btree_map(
                proptest::collection::vec(any::<u8>(), 1..8),
                proptest::collection::vec(any::<u8>(), 1..8),
                0..24,
            )
        ) {
            let mut forward = state();
            for (k, v) in &items {
                forward.add(k, v);
            }
            let mut backward = state();
            for (k, v) in items.iter().rev() {
                backward.add(k, v);
            }
            prop_assert_eq!(forward.digest(), backward.digest());
        }
    }
}
