use async_trait::async_trait;
use lcheck_types::{AccountId, Hash256, Key, LedgerHeader, ObjectVersion, Sequence, TxRecord};

use crate::error::StoreResult;

/// Read boundary over a versioned ledger store.
///
/// Every read is point-in-time: `object` and `successor` return the most
/// recent row whose version is at or below the requested sequence.
/// Implementations must satisfy these invariants:
/// - Reads never mutate the store and are safe to issue concurrently.
/// - A failed read is an `Err`; "no such row" is expressed in the return
///   type wherever the auditor treats it as a logical finding.
#[async_trait]
pub trait LedgerReader: Send + Sync {
    /// First and last stored ledger sequence, or `None` for an empty store.
    async fn ledger_range(&self) -> StoreResult<Option<(Sequence, Sequence)>>;

    /// The object at `key` as of `seq`.
    async fn object(&self, key: &Key, seq: Sequence) -> StoreResult<ObjectVersion>;

    /// The key following `key` in the successor chain as of `seq`.
    async fn successor(&self, key: &Key, seq: Sequence) -> StoreResult<Key>;

    /// Keys whose object changed at exactly `seq`.
    async fn diff_keys(&self, seq: Sequence) -> StoreResult<Vec<Key>>;

    async fn ledger_header(&self, seq: Sequence) -> StoreResult<LedgerHeader>;

    /// Hashes of the transactions included in ledger `seq`. No order is
    /// guaranteed.
    async fn tx_hashes(&self, seq: Sequence) -> StoreResult<Vec<Hash256>>;

    async fn transaction(&self, hash: &Hash256) -> StoreResult<Option<TxRecord>>;

    /// Reverse ledger-hash index lookup.
    async fn ledger_hash_sequence(&self, hash: &Hash256) -> StoreResult<Option<Sequence>>;

    async fn account_tx_exists(
        &self,
        account: &AccountId,
        seq: Sequence,
        tx_index: u32,
    ) -> StoreResult<bool>;

    async fn nft_tx_exists(&self, token: &Hash256, seq: Sequence, tx_index: u32)
        -> StoreResult<bool>;

    async fn nft_exists(&self, token: &Hash256, seq: Sequence) -> StoreResult<bool>;

    /// Number of URI rows stored for `(token, seq)`.
    async fn nft_uri_count(&self, token: &Hash256, seq: Sequence) -> StoreResult<u64>;

    async fn issuer_nft_exists(
        &self,
        issuer: &AccountId,
        taxon: u32,
        token: &Hash256,
    ) -> StoreResult<bool>;
}

/// The two narrow writes the repair path is allowed to perform.
///
/// Both inserts are idempotent: repeating one leaves a single row.
#[async_trait]
pub trait RepairWriter: Send + Sync {
    async fn insert_ledger_hash(&self, hash: &Hash256, seq: Sequence) -> StoreResult<()>;

    async fn insert_nft_uri(&self, token: &Hash256, seq: Sequence, uri: &[u8]) -> StoreResult<()>;
}
