//! Per-ledger transaction verification.

use std::collections::BTreeSet;
use std::sync::Arc;

use lcheck_crypto::{AccumulatorFactory, AccumulatorMode};
use lcheck_store::LedgerReader;
use lcheck_types::{DecodeLimits, Hash256, Key, KeyDiffs, Sequence, TxEffects, TxRecord};
use tokio_util::sync::CancellationToken;

use crate::config::CheckOptions;
use crate::decoder::{saturated, TxDecoder};
use crate::error::{AuditError, AuditResult};
use crate::repair::RepairController;
use crate::report::{Mismatch, MismatchKind, UnitOutcome};

/// Recomputes a ledger's transaction digest and cross-checks decoded
/// effects against the secondary indexes.
#[derive(Clone)]
pub struct TransactionVerifier {
    reader: Arc<dyn LedgerReader>,
    decoder: Arc<dyn TxDecoder>,
    factory: Arc<dyn AccumulatorFactory>,
    checks: CheckOptions,
    limits: DecodeLimits,
    repair: Option<RepairController>,
    cancel: CancellationToken,
}

impl TransactionVerifier {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        decoder: Arc<dyn TxDecoder>,
        factory: Arc<dyn AccumulatorFactory>,
    ) -> Self {
        Self {
            reader,
            decoder,
            factory,
            checks: CheckOptions::default(),
            limits: DecodeLimits::default(),
            repair: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_checks(mut self, checks: CheckOptions) -> Self {
        self.checks = checks;
        self
    }

    pub fn with_limits(mut self, limits: DecodeLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Used only when `fix_nft_uri` is set.
    pub fn with_repair(mut self, repair: RepairController) -> Self {
        self.repair = Some(repair);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Verify every transaction of ledger `seq`.
    pub async fn verify(&self, seq: Sequence) -> AuditResult<UnitOutcome> {
        let mut outcome = UnitOutcome::default();
        let mut acc = (!self.checks.skip_digest)
            .then(|| self.factory.create(AccumulatorMode::Transaction));
        let mut diffs = KeyDiffs::default();
        let mut missing = 0usize;

        self.check_cancel()?;
        let hashes = self.reader.tx_hashes(seq).await?;
        for hash in &hashes {
            self.check_cancel()?;
            let Some(record) = self.reader.transaction(hash).await? else {
                outcome.push(Mismatch::record(
                    seq,
                    MismatchKind::MissingTransaction,
                    format!("tx {hash} listed but not stored"),
                ));
                missing += 1;
                continue;
            };
            if let Some(acc) = acc.as_mut() {
                acc.add(&record.tx, &record.metadata);
            }
            if !self.checks.needs_decode() {
                continue;
            }

            let effects = self.decode(seq, &record)?;
            if !self.checks.skip_account_check {
                self.check_accounts(seq, &effects, &mut outcome).await?;
            }
            if !self.checks.skip_nft_check {
                self.check_nfts(seq, &effects, &mut outcome).await?;
            }
            if !self.checks.skip_diff_check {
                diffs.extend(effects.key_diffs);
            }
        }

        if !self.checks.skip_diff_check {
            self.check_diff(seq, diffs, &mut outcome).await?;
        }
        match acc {
            Some(acc) if missing == 0 => {
                self.check_digest(seq, acc.digest(), &mut outcome).await?;
            }
            Some(_) => {
                tracing::warn!(seq, missing, "transaction digest not compared, rows missing");
            }
            None => {}
        }

        tracing::info!(
            seq,
            txs = hashes.len(),
            mismatches = outcome.mismatches.len(),
            "ledger transactions verified"
        );
        Ok(outcome)
    }

    fn decode(&self, seq: Sequence, record: &TxRecord) -> AuditResult<TxEffects> {
        let effects = self
            .decoder
            .decode(&record.tx, &record.metadata, &self.limits)
            .map_err(|source| AuditError::Decode { seq, source })?;
        for category in saturated(&effects, &self.limits) {
            tracing::warn!(
                seq,
                tx_index = effects.tx_index,
                category,
                "decoded effects reached the item limit"
            );
        }
        Ok(effects)
    }

    async fn check_accounts(
        &self,
        seq: Sequence,
        effects: &TxEffects,
        outcome: &mut UnitOutcome,
    ) -> AuditResult<()> {
        for account in &effects.affected_accounts {
            self.check_cancel()?;
            if !self
                .reader
                .account_tx_exists(account, seq, effects.tx_index)
                .await?
            {
                outcome.push(Mismatch::record(
                    seq,
                    MismatchKind::MissingAccountTx,
                    format!("account {account} tx_index {}", effects.tx_index),
                ));
            }
        }
        Ok(())
    }

    async fn check_nfts(
        &self,
        seq: Sequence,
        effects: &TxEffects,
        outcome: &mut UnitOutcome,
    ) -> AuditResult<()> {
        for token in &effects.nft_txs {
            self.check_cancel()?;
            if !self.reader.nft_tx_exists(token, seq, effects.tx_index).await? {
                outcome.push(Mismatch::record(
                    seq,
                    MismatchKind::MissingNftTx,
                    format!("token {token} tx_index {}", effects.tx_index),
                ));
            }
        }

        let Some(change) = &effects.nft_change else {
            return Ok(());
        };
        let token = &change.token_id;
        self.check_cancel()?;
        if !self.reader.nft_exists(token, seq).await? {
            outcome.push(Mismatch::record(
                seq,
                MismatchKind::MissingNft,
                format!("token {token}"),
            ));
        }

        let Some(uri) = &change.uri else {
            return Ok(());
        };
        self.check_cancel()?;
        if self.reader.nft_uri_count(token, seq).await? == 0 {
            outcome.push(Mismatch::record(
                seq,
                MismatchKind::MissingNftUri,
                format!("token {token}"),
            ));
            if let (true, Some(repair)) = (self.checks.fix_nft_uri, &self.repair) {
                outcome.repairs.attempted += 1;
                if repair.repair_nft_uri(token, seq, uri).await.is_confirmed() {
                    outcome.repairs.confirmed += 1;
                }
            }
        }
        self.check_cancel()?;
        if !self
            .reader
            .issuer_nft_exists(&change.issuer, change.taxon, token)
            .await?
        {
            outcome.push(Mismatch::record(
                seq,
                MismatchKind::MissingIssuerNft,
                format!("issuer {} taxon {} token {token}", change.issuer, change.taxon),
            ));
        }
        Ok(())
    }

    /// Every decoded key change must appear in the stored diff set of
    /// `seq`. Keys both created and deleted within the ledger are transient
    /// and excluded.
    async fn check_diff(
        &self,
        seq: Sequence,
        diffs: KeyDiffs,
        outcome: &mut UnitOutcome,
    ) -> AuditResult<()> {
        let created: BTreeSet<Key> = diffs.created.into_iter().collect();
        let deleted: BTreeSet<Key> = diffs.deleted.into_iter().collect();
        let transient: BTreeSet<Key> = created.intersection(&deleted).copied().collect();
        for key in &transient {
            tracing::debug!(seq, key = %key, "transient key excluded from diff check");
        }
        let expected: BTreeSet<Key> = created
            .into_iter()
            .chain(deleted)
            .chain(diffs.updated)
            .filter(|key| !transient.contains(key))
            .collect();
        if expected.is_empty() {
            return Ok(());
        }

        self.check_cancel()?;
        let stored: BTreeSet<Key> = self.reader.diff_keys(seq).await?.into_iter().collect();
        for key in expected.difference(&stored) {
            outcome.push(Mismatch::record(
                seq,
                MismatchKind::MissingDiff,
                format!("key {key}"),
            ));
        }
        Ok(())
    }

    async fn check_digest(
        &self,
        seq: Sequence,
        computed: Hash256,
        outcome: &mut UnitOutcome,
    ) -> AuditResult<()> {
        self.check_cancel()?;
        let header = self.reader.ledger_header(seq).await?;
        if computed != header.tx_digest {
            outcome.push(Mismatch::record(
                seq,
                MismatchKind::TxDigest,
                format!("computed {computed} header {}", header.tx_digest),
            ));
        } else {
            tracing::debug!(seq, digest = %computed, "transaction digest matches");
        }
        Ok(())
    }

    fn check_cancel(&self) -> AuditResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AuditError::Cancelled);
        }
        Ok(())
    }
}
