//! Ledger simulator: the writer side of the store.
//!
//! Commits ledgers into an [`InMemoryStore`] the way an ingester would,
//! keeping every table consistent: object versions, successor edges over
//! every key ever written (tombstones included), per-ledger diff sets,
//! headers with recomputed digests, transactions and their secondary-index
//! rows. Tests and the `demo` command build fixtures with it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use lcheck_crypto::{AccumulatorFactory, AccumulatorMode, ContentHasher};
use lcheck_types::{
    AccountId, Hash256, Key, KeyBounds, KeyDiffs, LedgerHeader, NftChange, Sequence, TxEffects,
    TxRecord,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryStore;

/// Changes and transactions making up one ledger.
#[derive(Clone, Debug, Default)]
pub struct LedgerDraft {
    changes: BTreeMap<Key, Option<Vec<u8>>>,
    transactions: Vec<(Vec<u8>, TxEffects)>,
}

impl LedgerDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update `key`.
    pub fn set(mut self, key: Key, value: impl Into<Vec<u8>>) -> Self {
        self.changes.insert(key, Some(value.into()));
        self
    }

    /// Delete `key` (writes a tombstone).
    pub fn delete(mut self, key: Key) -> Self {
        self.changes.insert(key, None);
        self
    }

    /// Add a transaction. Its `tx_index` is assigned on commit.
    pub fn transaction(mut self, tx: impl Into<Vec<u8>>, effects: TxEffects) -> Self {
        self.transactions.push((tx.into(), effects));
        self
    }
}

/// Commits [`LedgerDraft`]s into a store in ascending sequence order.
pub struct LedgerSimulator {
    store: Arc<InMemoryStore>,
    factory: Arc<dyn AccumulatorFactory>,
    bounds: KeyBounds,
    next_seq: Sequence,
    live: BTreeMap<Key, Vec<u8>>,
    written: BTreeSet<Key>,
    edges: HashMap<Key, Key>,
}

impl LedgerSimulator {
    pub fn new(
        store: Arc<InMemoryStore>,
        factory: Arc<dyn AccumulatorFactory>,
        first_seq: Sequence,
    ) -> Self {
        Self {
            store,
            factory,
            bounds: KeyBounds::default(),
            next_seq: first_seq,
            live: BTreeMap::new(),
            written: BTreeSet::new(),
            edges: HashMap::new(),
        }
    }

    pub fn with_bounds(mut self, bounds: KeyBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Sequence the next commit will receive.
    pub fn next_sequence(&self) -> Sequence {
        self.next_seq
    }

    /// Live state after the last commit.
    pub fn live_state(&self) -> &BTreeMap<Key, Vec<u8>> {
        &self.live
    }

    pub fn store(&self) -> &Arc<InMemoryStore> {
        &self.store
    }

    /// Write one ledger and return its header.
    pub fn commit(&mut self, draft: LedgerDraft) -> StoreResult<LedgerHeader> {
        let seq = self.next_seq;

        for (key, change) in draft.changes {
            if !self.bounds.contains(&key) {
                return Err(StoreError::Backend(format!(
                    "key {key} outside the configured bounds"
                )));
            }
            match change {
                Some(value) if !value.is_empty() => {
                    self.store.put_object(key, seq, value.clone());
                    self.live.insert(key, value);
                }
                _ => {
                    self.store.put_object(key, seq, Vec::new());
                    self.live.remove(&key);
                }
            }
            self.written.insert(key);
            self.store.put_diff(seq, key);
        }

        self.write_successors(seq);
        let tx_digest = self.write_transactions(seq, draft.transactions)?;

        let mut state = self.factory.create(AccumulatorMode::State);
        for (key, value) in &self.live {
            state.add(key.as_bytes(), value);
        }
        let state_digest = state.digest();

        let seq_bytes = seq.to_be_bytes();
        let ledger_hash = ContentHasher::LEDGER.hash_parts(&[
            &seq_bytes,
            state_digest.as_bytes(),
            tx_digest.as_bytes(),
        ]);
        let header = LedgerHeader {
            sequence: seq,
            ledger_hash,
            state_digest,
            tx_digest,
        };
        self.store.put_header(header);
        self.store.put_ledger_hash(ledger_hash, seq);

        tracing::debug!(seq, live = self.live.len(), "simulated ledger committed");
        self.next_seq += 1;
        Ok(header)
    }

    /// Rewrite only the edges whose target changed.
    fn write_successors(&mut self, seq: Sequence) {
        let chain: Vec<Key> = std::iter::once(self.bounds.lower)
            .chain(self.written.iter().copied())
            .chain(std::iter::once(self.bounds.upper))
            .collect();
        for pair in chain.windows(2) {
            let (from, next) = (pair[0], pair[1]);
            if self.edges.get(&from) != Some(&next) {
                self.store.put_successor(from, seq, next);
                self.edges.insert(from, next);
            }
        }
    }

    fn write_transactions(
        &mut self,
        seq: Sequence,
        transactions: Vec<(Vec<u8>, TxEffects)>,
    ) -> StoreResult<Hash256> {
        let mut acc = self.factory.create(AccumulatorMode::Transaction);
        for (index, (tx, mut effects)) in transactions.into_iter().enumerate() {
            let tx_index = index as u32;
            effects.tx_index = tx_index;
            let metadata = serde_json::to_vec(&effects)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            let hash = ContentHasher::TX_ID.hash(&tx);
            acc.add(&tx, &metadata);

            for account in &effects.affected_accounts {
                self.store.put_account_tx(*account, seq, tx_index);
            }
            for token in &effects.nft_txs {
                self.store.put_nft_tx(*token, seq, tx_index);
            }
            if let Some(change) = &effects.nft_change {
                self.store.put_nft(change.token_id, seq);
                if let Some(uri) = &change.uri {
                    self.store.put_nft_uri(change.token_id, seq, uri.clone());
                    self.store
                        .put_issuer_nft(change.issuer, change.taxon, change.token_id);
                }
            }
            self.store.put_transaction(
                seq,
                TxRecord {
                    hash,
                    tx,
                    metadata,
                },
            );
        }
        Ok(acc.digest())
    }
}

/// Parameters for a seeded random ledger history.
#[derive(Clone, Copy, Debug)]
pub struct RandomHistory {
    pub seed: u64,
    pub ledgers: u64,
    /// Size of the key pool; a small pool forces deletes and re-creations.
    pub key_pool: usize,
    pub max_changes: usize,
    pub account_pool: usize,
}

impl Default for RandomHistory {
    fn default() -> Self {
        Self {
            seed: 7,
            ledgers: 20,
            key_pool: 64,
            max_changes: 8,
            account_pool: 8,
        }
    }
}

impl RandomHistory {
    /// Commit `ledgers` random ledgers through `sim`.
    ///
    /// Every change is wrapped in a transaction whose decoded effects name
    /// the key as created, deleted or updated; some transactions also mint
    /// an NFT with a URI.
    pub fn generate(&self, sim: &mut LedgerSimulator) -> StoreResult<Vec<LedgerHeader>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let keys: Vec<Key> = (0..self.key_pool.max(1))
            .map(|_| {
                let mut bytes = [0u8; 32];
                rng.fill(&mut bytes[..]);
                bytes[0] = bytes[0].clamp(0x01, 0xfe);
                Key::new(bytes)
            })
            .collect();
        let accounts: Vec<AccountId> = (0..self.account_pool.max(1))
            .map(|_| {
                let mut bytes = [0u8; 20];
                rng.fill(&mut bytes[..]);
                AccountId::new(bytes)
            })
            .collect();

        let mut headers = Vec::with_capacity(self.ledgers as usize);
        for _ in 0..self.ledgers {
            let seq = sim.next_sequence();
            let mut draft = LedgerDraft::new();
            let mut touched = BTreeSet::new();
            let changes = rng.gen_range(1..=self.max_changes.max(1));
            for n in 0..changes {
                let key = keys[rng.gen_range(0..keys.len())];
                if !touched.insert(key) {
                    continue;
                }
                let mut diffs = KeyDiffs::default();
                let was_live = sim.live_state().contains_key(&key);
                if was_live && rng.gen_bool(0.3) {
                    draft = draft.delete(key);
                    diffs.deleted.push(key);
                } else {
                    let value = format!("v{seq}-{n}-{}", rng.gen::<u32>()).into_bytes();
                    draft = draft.set(key, value);
                    if was_live {
                        diffs.updated.push(key);
                    } else {
                        diffs.created.push(key);
                    }
                }

                let account = accounts[rng.gen_range(0..accounts.len())];
                let mut effects = TxEffects {
                    affected_accounts: vec![account],
                    key_diffs: diffs,
                    ..Default::default()
                };
                if rng.gen_bool(0.2) {
                    let mut token = [0u8; 32];
                    rng.fill(&mut token[..]);
                    let token = Hash256::new(token);
                    effects.nft_txs.push(token);
                    effects.nft_change = Some(NftChange {
                        token_id: token,
                        issuer: account,
                        taxon: rng.gen_range(0..4),
                        uri: Some(format!("ipfs://{seq}/{n}").into_bytes()),
                    });
                }
                let tx = format!("tx-{}-{seq}-{n}", self.seed).into_bytes();
                draft = draft.transaction(tx, effects);
            }
            headers.push(sim.commit(draft)?);
        }
        Ok(headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::LedgerReader;
    use lcheck_crypto::MerkleFactory;
    use lcheck_types::ObjectVersion;

    fn sim() -> LedgerSimulator {
        LedgerSimulator::new(Arc::new(InMemoryStore::new()), Arc::new(MerkleFactory), 1)
    }

    fn k(n: u64) -> Key {
        Key::from_u64(n)
    }

    #[tokio::test]
    async fn successor_chain_includes_tombstones() {
        let mut sim = sim();
        sim.commit(LedgerDraft::new().set(k(1), "a").set(k(2), "b"))
            .unwrap();
        sim.commit(LedgerDraft::new().delete(k(1))).unwrap();
        let store = sim.store().clone();

        assert_eq!(store.successor(&Key::MIN, 2).await.unwrap(), k(1));
        assert_eq!(store.successor(&k(1), 2).await.unwrap(), k(2));
        assert_eq!(store.successor(&k(2), 2).await.unwrap(), Key::MAX);
        assert_eq!(store.object(&k(1), 2).await.unwrap(), ObjectVersion::Tombstone);
    }

    #[tokio::test]
    async fn diff_set_lists_changed_keys() {
        let mut sim = sim();
        sim.commit(LedgerDraft::new().set(k(1), "a")).unwrap();
        sim.commit(LedgerDraft::new().set(k(2), "b").delete(k(1)))
            .unwrap();
        let mut keys = sim.store().diff_keys(2).await.unwrap();
        keys.sort();
        assert_eq!(keys, vec![k(1), k(2)]);
    }

    #[tokio::test]
    async fn header_digest_matches_live_state() {
        let mut sim = sim();
        let h1 = sim.commit(LedgerDraft::new().set(k(1), "a")).unwrap();
        let h2 = sim
            .commit(LedgerDraft::new().set(k(2), "b").delete(k(2)))
            .unwrap();
        let h3 = sim.commit(LedgerDraft::new().delete(k(1))).unwrap();
        assert_eq!(h1.state_digest, h2.state_digest);
        assert_ne!(h1.state_digest, h3.state_digest);
        assert_eq!(h3.state_digest, Hash256::default());
        assert_eq!(
            sim.store().ledger_hash_sequence(&h2.ledger_hash).await.unwrap(),
            Some(2)
        );
    }

    #[tokio::test]
    async fn transactions_write_index_rows() {
        let mut sim = sim();
        let account = AccountId::new([1; 20]);
        let token = Hash256::new([2; 32]);
        let effects = TxEffects {
            affected_accounts: vec![account],
            nft_txs: vec![token],
            nft_change: Some(NftChange {
                token_id: token,
                issuer: account,
                taxon: 3,
                uri: Some(b"u".to_vec()),
            }),
            ..Default::default()
        };
        sim.commit(
            LedgerDraft::new()
                .transaction("t0", TxEffects::default())
                .transaction("t1", effects),
        )
        .unwrap();
        let store = sim.store().clone();

        assert_eq!(store.tx_hashes(1).await.unwrap().len(), 2);
        assert!(store.account_tx_exists(&account, 1, 1).await.unwrap());
        assert!(store.nft_tx_exists(&token, 1, 1).await.unwrap());
        assert!(store.nft_exists(&token, 1).await.unwrap());
        assert_eq!(store.nft_uri_count(&token, 1).await.unwrap(), 1);
        assert!(store.issuer_nft_exists(&account, 3, &token).await.unwrap());
    }

    #[test]
    fn out_of_bounds_key_rejected() {
        let mut sim = sim();
        assert!(sim.commit(LedgerDraft::new().set(Key::MAX, "x")).is_err());
    }

    #[test]
    fn random_history_is_deterministic() {
        let history = RandomHistory {
            ledgers: 5,
            ..Default::default()
        };
        let a = history.generate(&mut sim()).unwrap();
        let b = history.generate(&mut sim()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 5);
        assert_eq!(a[4].sequence, 5);
    }
}
