use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use lcheck_types::{
    hex_blob, AccountId, Hash256, Key, LedgerHeader, ObjectVersion, Sequence, TxRecord,
};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};
use crate::traits::{LedgerReader, RepairWriter};

/// In-memory ledger store.
///
/// Intended for tests, fixtures and demos. Every table lives behind one
/// `RwLock`; rows are cloned on read. The `put_*` methods are the raw
/// writer side that a ledger ingester would use, and the `drop_*` methods
/// exist to plant inconsistencies for the auditor to find.
pub struct InMemoryStore {
    tables: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    headers: BTreeMap<Sequence, LedgerHeader>,
    objects: HashMap<Key, BTreeMap<Sequence, Vec<u8>>>,
    successors: HashMap<Key, BTreeMap<Sequence, Key>>,
    diffs: BTreeMap<Sequence, Vec<Key>>,
    ledger_txs: BTreeMap<Sequence, Vec<Hash256>>,
    transactions: HashMap<Hash256, TxRecord>,
    ledger_hashes: HashMap<Hash256, Sequence>,
    account_txs: BTreeSet<(AccountId, Sequence, u32)>,
    nft_txs: BTreeSet<(Hash256, Sequence, u32)>,
    nfts: BTreeSet<(Hash256, Sequence)>,
    nft_uris: BTreeMap<(Hash256, Sequence), Vec<u8>>,
    issuer_nfts: BTreeSet<(AccountId, u32, Hash256)>,
}

impl InMemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
        }
    }

    /// Number of ledger headers stored.
    pub fn ledger_count(&self) -> usize {
        self.tables.read().expect("lock poisoned").headers.len()
    }

    // -----------------------------------------------------------------------
    // Raw writes
    // -----------------------------------------------------------------------

    /// Write an object version. An empty value is a tombstone.
    pub fn put_object(&self, key: Key, seq: Sequence, value: Vec<u8>) {
        let mut t = self.tables.write().expect("lock poisoned");
        t.objects.entry(key).or_default().insert(seq, value);
    }

    pub fn put_successor(&self, key: Key, seq: Sequence, next: Key) {
        let mut t = self.tables.write().expect("lock poisoned");
        t.successors.entry(key).or_default().insert(seq, next);
    }

    /// Record `key` in the diff set of `seq`. Duplicate keys are ignored.
    pub fn put_diff(&self, seq: Sequence, key: Key) {
        let mut t = self.tables.write().expect("lock poisoned");
        let keys = t.diffs.entry(seq).or_default();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }

    /// Insert or overwrite the header for `header.sequence`.
    pub fn put_header(&self, header: LedgerHeader) {
        let mut t = self.tables.write().expect("lock poisoned");
        t.headers.insert(header.sequence, header);
    }

    /// Store a transaction row and list it under ledger `seq`.
    pub fn put_transaction(&self, seq: Sequence, record: TxRecord) {
        let mut t = self.tables.write().expect("lock poisoned");
        let hashes = t.ledger_txs.entry(seq).or_default();
        if !hashes.contains(&record.hash) {
            hashes.push(record.hash);
        }
        t.transactions.insert(record.hash, record);
    }

    pub fn put_ledger_hash(&self, hash: Hash256, seq: Sequence) {
        let mut t = self.tables.write().expect("lock poisoned");
        t.ledger_hashes.insert(hash, seq);
    }

    pub fn put_account_tx(&self, account: AccountId, seq: Sequence, tx_index: u32) {
        let mut t = self.tables.write().expect("lock poisoned");
        t.account_txs.insert((account, seq, tx_index));
    }

    pub fn put_nft_tx(&self, token: Hash256, seq: Sequence, tx_index: u32) {
        let mut t = self.tables.write().expect("lock poisoned");
        t.nft_txs.insert((token, seq, tx_index));
    }

    pub fn put_nft(&self, token: Hash256, seq: Sequence) {
        let mut t = self.tables.write().expect("lock poisoned");
        t.nfts.insert((token, seq));
    }

    pub fn put_nft_uri(&self, token: Hash256, seq: Sequence, uri: Vec<u8>) {
        let mut t = self.tables.write().expect("lock poisoned");
        t.nft_uris.insert((token, seq), uri);
    }

    pub fn put_issuer_nft(&self, issuer: AccountId, taxon: u32, token: Hash256) {
        let mut t = self.tables.write().expect("lock poisoned");
        t.issuer_nfts.insert((issuer, taxon, token));
    }

    // -----------------------------------------------------------------------
    // Planted inconsistencies
    // -----------------------------------------------------------------------

    /// Remove the transaction row for `hash`, leaving it listed in its ledger.
    pub fn drop_transaction(&self, hash: &Hash256) -> bool {
        let mut t = self.tables.write().expect("lock poisoned");
        t.transactions.remove(hash).is_some()
    }

    pub fn drop_ledger_hash(&self, hash: &Hash256) -> bool {
        let mut t = self.tables.write().expect("lock poisoned");
        t.ledger_hashes.remove(hash).is_some()
    }

    pub fn drop_account_tx(&self, account: &AccountId, seq: Sequence, tx_index: u32) -> bool {
        let mut t = self.tables.write().expect("lock poisoned");
        t.account_txs.remove(&(*account, seq, tx_index))
    }

    pub fn drop_nft_tx(&self, token: &Hash256, seq: Sequence, tx_index: u32) -> bool {
        let mut t = self.tables.write().expect("lock poisoned");
        t.nft_txs.remove(&(*token, seq, tx_index))
    }

    pub fn drop_nft(&self, token: &Hash256, seq: Sequence) -> bool {
        let mut t = self.tables.write().expect("lock poisoned");
        t.nfts.remove(&(*token, seq))
    }

    pub fn drop_nft_uri(&self, token: &Hash256, seq: Sequence) -> bool {
        let mut t = self.tables.write().expect("lock poisoned");
        t.nft_uris.remove(&(*token, seq)).is_some()
    }

    pub fn drop_issuer_nft(&self, issuer: &AccountId, taxon: u32, token: &Hash256) -> bool {
        let mut t = self.tables.write().expect("lock poisoned");
        t.issuer_nfts.remove(&(*issuer, taxon, *token))
    }

    /// Remove `key` from the diff set of `seq`.
    pub fn drop_diff(&self, seq: Sequence, key: &Key) -> bool {
        let mut t = self.tables.write().expect("lock poisoned");
        match t.diffs.get_mut(&seq) {
            Some(keys) => {
                let before = keys.len();
                keys.retain(|k| k != key);
                keys.len() != before
            }
            None => false,
        }
    }

    /// Overwrite the state digest of a stored header.
    pub fn corrupt_state_digest(&self, seq: Sequence, digest: Hash256) -> bool {
        let mut t = self.tables.write().expect("lock poisoned");
        match t.headers.get_mut(&seq) {
            Some(header) => {
                header.state_digest = digest;
                true
            }
            None => false,
        }
    }

    /// Overwrite the transaction digest of a stored header.
    pub fn corrupt_tx_digest(&self, seq: Sequence, digest: Hash256) -> bool {
        let mut t = self.tables.write().expect("lock poisoned");
        match t.headers.get_mut(&seq) {
            Some(header) => {
                header.tx_digest = digest;
                true
            }
            None => false,
        }
    }

    // -----------------------------------------------------------------------
    // Fixture dumps
    // -----------------------------------------------------------------------

    /// Flatten every table into a serializable dump.
    pub fn to_dump(&self) -> StoreDump {
        let t = self.tables.read().expect("lock poisoned");
        let mut dump = StoreDump {
            headers: t.headers.values().copied().collect(),
            ..Default::default()
        };
        for (key, versions) in &t.objects {
            for (seq, value) in versions {
                dump.objects.push(ObjectRow {
                    key: *key,
                    seq: *seq,
                    value: value.clone(),
                });
            }
        }
        for (key, versions) in &t.successors {
            for (seq, next) in versions {
                dump.successors.push(SuccessorRow {
                    key: *key,
                    seq: *seq,
                    next: *next,
                });
            }
        }
        dump.objects.sort_by(|a, b| (a.key, a.seq).cmp(&(b.key, b.seq)));
        dump.successors.sort_by(|a, b| (a.key, a.seq).cmp(&(b.key, b.seq)));
        dump.diffs = t
            .diffs
            .iter()
            .map(|(seq, keys)| DiffRow {
                seq: *seq,
                keys: keys.clone(),
            })
            .collect();
        dump.ledger_txs = t
            .ledger_txs
            .iter()
            .map(|(seq, hashes)| LedgerTxRow {
                seq: *seq,
                hashes: hashes.clone(),
            })
            .collect();
        dump.transactions = t.transactions.values().cloned().collect();
        dump.transactions.sort_by_key(|r| r.hash);
        dump.ledger_hashes = t
            .ledger_hashes
            .iter()
            .map(|(hash, seq)| LedgerHashRow {
                hash: *hash,
                seq: *seq,
            })
            .collect();
        dump.ledger_hashes.sort_by_key(|r| r.seq);
        dump.account_txs = t
            .account_txs
            .iter()
            .map(|(account, seq, tx_index)| AccountTxRow {
                account: *account,
                seq: *seq,
                tx_index: *tx_index,
            })
            .collect();
        dump.nft_txs = t
            .nft_txs
            .iter()
            .map(|(token, seq, tx_index)| NftTxRow {
                token: *token,
                seq: *seq,
                tx_index: *tx_index,
            })
            .collect();
        dump.nfts = t
            .nfts
            .iter()
            .map(|(token, seq)| NftRow {
                token: *token,
                seq: *seq,
            })
            .collect();
        dump.nft_uris = t
            .nft_uris
            .iter()
            .map(|((token, seq), uri)| NftUriRow {
                token: *token,
                seq: *seq,
                uri: uri.clone(),
            })
            .collect();
        dump.issuer_nfts = t
            .issuer_nfts
            .iter()
            .map(|(issuer, taxon, token)| IssuerNftRow {
                issuer: *issuer,
                taxon: *taxon,
                token: *token,
            })
            .collect();
        dump
    }

    /// Rebuild a store from a dump.
    pub fn from_dump(dump: StoreDump) -> Self {
        let store = Self::new();
        for header in dump.headers {
            store.put_header(header);
        }
        for row in dump.objects {
            store.put_object(row.key, row.seq, row.value);
        }
        for row in dump.successors {
            store.put_successor(row.key, row.seq, row.next);
        }
        for row in dump.diffs {
            for key in row.keys {
                store.put_diff(row.seq, key);
            }
        }
        {
            let mut t = store.tables.write().expect("lock poisoned");
            for row in dump.ledger_txs {
                t.ledger_txs.insert(row.seq, row.hashes);
            }
            for record in dump.transactions {
                t.transactions.insert(record.hash, record);
            }
        }
        for row in dump.ledger_hashes {
            store.put_ledger_hash(row.hash, row.seq);
        }
        for row in dump.account_txs {
            store.put_account_tx(row.account, row.seq, row.tx_index);
        }
        for row in dump.nft_txs {
            store.put_nft_tx(row.token, row.seq, row.tx_index);
        }
        for row in dump.nfts {
            store.put_nft(row.token, row.seq);
        }
        for row in dump.nft_uris {
            store.put_nft_uri(row.token, row.seq, row.uri);
        }
        for row in dump.issuer_nfts {
            store.put_issuer_nft(row.issuer, row.taxon, row.token);
        }
        store
    }

    /// Write the store to a JSON fixture file.
    pub fn save_json(&self, path: &Path) -> StoreResult<()> {
        let json = serde_json::to_vec_pretty(&self.to_dump())
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load a store from a JSON fixture file.
    pub fn load_json(path: &Path) -> StoreResult<Self> {
        let bytes = std::fs::read(path)?;
        let dump: StoreDump =
            serde_json::from_slice(&bytes).map_err(|e| StoreError::Serialization(e.to_string()))?;
        tracing::debug!(path = %path.display(), ledgers = dump.headers.len(), "fixture loaded");
        Ok(Self::from_dump(dump))
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let t = self.tables.read().expect("lock poisoned");
        f.debug_struct("InMemoryStore")
            .field("ledgers", &t.headers.len())
            .field("keys", &t.objects.len())
            .field("transactions", &t.transactions.len())
            .finish()
    }
}

#[async_trait]
impl LedgerReader for InMemoryStore {
    async fn ledger_range(&self) -> StoreResult<Option<(Sequence, Sequence)>> {
        let t = self.tables.read().expect("lock poisoned");
        let first = t.headers.keys().next().copied();
        let last = t.headers.keys().next_back().copied();
        Ok(first.zip(last))
    }

    async fn object(&self, key: &Key, seq: Sequence) -> StoreResult<ObjectVersion> {
        let t = self.tables.read().expect("lock poisoned");
        let version = t
            .objects
            .get(key)
            .and_then(|versions| versions.range(..=seq).next_back())
            .map(|(_, value)| ObjectVersion::from_stored(value.clone()))
            .unwrap_or(ObjectVersion::Absent);
        Ok(version)
    }

    async fn successor(&self, key: &Key, seq: Sequence) -> StoreResult<Key> {
        let t = self.tables.read().expect("lock poisoned");
        t.successors
            .get(key)
            .and_then(|versions| versions.range(..=seq).next_back())
            .map(|(_, next)| *next)
            .ok_or(StoreError::MissingSuccessor { key: *key, seq })
    }

    async fn diff_keys(&self, seq: Sequence) -> StoreResult<Vec<Key>> {
        let t = self.tables.read().expect("lock poisoned");
        Ok(t.diffs.get(&seq).cloned().unwrap_or_default())
    }

    async fn ledger_header(&self, seq: Sequence) -> StoreResult<LedgerHeader> {
        let t = self.tables.read().expect("lock poisoned");
        t.headers
            .get(&seq)
            .copied()
            .ok_or(StoreError::MissingHeader(seq))
    }

    async fn tx_hashes(&self, seq: Sequence) -> StoreResult<Vec<Hash256>> {
        let t = self.tables.read().expect("lock poisoned");
        Ok(t.ledger_txs.get(&seq).cloned().unwrap_or_default())
    }

    async fn transaction(&self, hash: &Hash256) -> StoreResult<Option<TxRecord>> {
        let t = self.tables.read().expect("lock poisoned");
        Ok(t.transactions.get(hash).cloned())
    }

    async fn ledger_hash_sequence(&self, hash: &Hash256) -> StoreResult<Option<Sequence>> {
        let t = self.tables.read().expect("lock poisoned");
        Ok(t.ledger_hashes.get(hash).copied())
    }

    async fn account_tx_exists(
        &self,
        account: &AccountId,
        seq: Sequence,
        tx_index: u32,
    ) -> StoreResult<bool> {
        let t = self.tables.read().expect("lock poisoned");
        Ok(t.account_txs.contains(&(*account, seq, tx_index)))
    }

    async fn nft_tx_exists(
        &self,
        token: &Hash256,
        seq: Sequence,
        tx_index: u32,
    ) -> StoreResult<bool> {
        let t = self.tables.read().expect("lock poisoned");
        Ok(t.nft_txs.contains(&(*token, seq, tx_index)))
    }

    async fn nft_exists(&self, token: &Hash256, seq: Sequence) -> StoreResult<bool> {
        let t = self.tables.read().expect("lock poisoned");
        Ok(t.nfts.contains(&(*token, seq)))
    }

    async fn nft_uri_count(&self, token: &Hash256, seq: Sequence) -> StoreResult<u64> {
        let t = self.tables.read().expect("lock poisoned");
        Ok(u64::from(t.nft_uris.contains_key(&(*token, seq))))
    }

    async fn issuer_nft_exists(
        &self,
        issuer: &AccountId,
        taxon: u32,
        token: &Hash256,
    ) -> StoreResult<bool> {
        let t = self.tables.read().expect("lock poisoned");
        Ok(t.issuer_nfts.contains(&(*issuer, taxon, *token)))
    }
}

#[async_trait]
impl RepairWriter for InMemoryStore {
    async fn insert_ledger_hash(&self, hash: &Hash256, seq: Sequence) -> StoreResult<()> {
        self.put_ledger_hash(*hash, seq);
        Ok(())
    }

    async fn insert_nft_uri(&self, token: &Hash256, seq: Sequence, uri: &[u8]) -> StoreResult<()> {
        self.put_nft_uri(*token, seq, uri.to_vec());
        Ok(())
    }
}

/// Serializable snapshot of every table, one row per entry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreDump {
    pub headers: Vec<LedgerHeader>,
    pub objects: Vec<ObjectRow>,
    pub successors: Vec<SuccessorRow>,
    pub diffs: Vec<DiffRow>,
    pub ledger_txs: Vec<LedgerTxRow>,
    pub transactions: Vec<TxRecord>,
    pub ledger_hashes: Vec<LedgerHashRow>,
    pub account_txs: Vec<AccountTxRow>,
    pub nft_txs: Vec<NftTxRow>,
    pub nfts: Vec<NftRow>,
    pub nft_uris: Vec<NftUriRow>,
    pub issuer_nfts: Vec<IssuerNftRow>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRow {
    pub key: Key,
    pub seq: Sequence,
    #[serde(with = "hex_blob")]
    pub value: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuccessorRow {
    pub key: Key,
    pub seq: Sequence,
    pub next: Key,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffRow {
    pub seq: Sequence,
    pub keys: Vec<Key>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerTxRow {
    pub seq: Sequence,
    pub hashes: Vec<Hash256>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerHashRow {
    pub hash: Hash256,
    pub seq: Sequence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountTxRow {
    pub account: AccountId,
    pub seq: Sequence,
    pub tx_index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftTxRow {
    pub token: Hash256,
    pub seq: Sequence,
    pub tx_index: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftRow {
    pub token: Hash256,
    pub seq: Sequence,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NftUriRow {
    pub token: Hash256,
    pub seq: Sequence,
    #[serde(with = "hex_blob")]
    pub uri: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuerNftRow {
    pub issuer: AccountId,
    pub taxon: u32,
    pub token: Hash256,
}
