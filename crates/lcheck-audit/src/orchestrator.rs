//! Wave-based orchestration of verification units over a ledger range.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use lcheck_crypto::AccumulatorFactory;
use lcheck_snapshot::SnapshotBuilder;
use lcheck_store::{LedgerReader, RepairWriter};
use lcheck_types::Sequence;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::AuditConfig;
use crate::decoder::TxDecoder;
use crate::error::{AuditError, AuditResult};
use crate::ledger_hash::LedgerHashVerifier;
use crate::repair::RepairController;
use crate::report::{AuditReport, UnitOutcome};
use crate::state::StateVerifier;
use crate::tx::TransactionVerifier;

/// What a run verifies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AuditMode {
    /// Full partitioned traversal per ledger.
    Objects,
    /// One full traversal, then diff sets for each following ledger.
    Diff,
    /// Transaction digest and secondary indexes.
    Tx,
    /// Ledger-hash reverse index.
    LedgerHash,
}

impl AuditMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Objects => "objects",
            Self::Diff => "diff",
            Self::Tx => "tx",
            Self::LedgerHash => "ledger-hash",
        }
    }

    /// State checks walk forward; transaction and ledger-hash checks start
    /// from the newest ledger.
    pub fn default_direction(self) -> Direction {
        match self {
            Self::Objects | Self::Diff => Direction::Ascending,
            Self::Tx | Self::LedgerHash => Direction::Descending,
        }
    }
}

impl fmt::Display for AuditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "objects" => Ok(Self::Objects),
            "diff" => Ok(Self::Diff),
            "tx" => Ok(Self::Tx),
            "ledger-hash" => Ok(Self::LedgerHash),
            other => Err(format!("unknown audit mode: {other}")),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Ascending,
    Descending,
}

/// Split `from..=to` into waves of at most `wave_size` sequences.
pub fn plan_waves(
    from: Sequence,
    to: Sequence,
    wave_size: usize,
    direction: Direction,
) -> Vec<Vec<Sequence>> {
    if from > to || wave_size == 0 {
        return Vec::new();
    }
    let seqs: Vec<Sequence> = match direction {
        Direction::Ascending => (from..=to).collect(),
        Direction::Descending => (from..=to).rev().collect(),
    };
    seqs.chunks(wave_size).map(<[Sequence]>::to_vec).collect()
}

/// One verification unit, cloned into each spawned task.
#[derive(Clone)]
enum Unit {
    State(StateVerifier),
    Tx(TransactionVerifier),
    LedgerHash(LedgerHashVerifier),
}

impl Unit {
    async fn verify(&self, seq: Sequence) -> AuditResult<UnitOutcome> {
        match self {
            Self::State(v) => v.verify_full(seq).await,
            Self::Tx(v) => v.verify(seq).await,
            Self::LedgerHash(v) => v.verify(seq).await,
        }
    }
}

/// Runs audits over ledger ranges.
pub struct Auditor {
    reader: Arc<dyn LedgerReader>,
    writer: Option<Arc<dyn RepairWriter>>,
    factory: Arc<dyn AccumulatorFactory>,
    decoder: Arc<dyn TxDecoder>,
    config: AuditConfig,
    cancel: CancellationToken,
}

impl Auditor {
    pub fn new(
        reader: Arc<dyn LedgerReader>,
        factory: Arc<dyn AccumulatorFactory>,
        decoder: Arc<dyn TxDecoder>,
        config: AuditConfig,
    ) -> Self {
        Self {
            reader,
            writer: None,
            factory,
            decoder,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Required when any `fix_*` option is enabled.
    pub fn with_repair_writer(mut self, writer: Arc<dyn RepairWriter>) -> Self {
        self.writer = Some(writer);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolve `to == 0` to the newest stored ledger and check the range
    /// against what the store holds.
    pub async fn resolve_range(
        &self,
        from: Sequence,
        to: Sequence,
    ) -> AuditResult<(Sequence, Sequence)> {
        let Some((first, last)) = self.reader.ledger_range().await? else {
            return Err(AuditError::InvalidRange {
                from,
                to,
                reason: "store holds no ledgers".into(),
            });
        };
        tracing::info!(first, last, "stored ledger range");
        let to = if to == 0 { last } else { to };
        let reason = if from > to {
            Some("start is after end".to_string())
        } else if from < first || from > last {
            Some(format!("start not in stored range {first}..={last}"))
        } else if to < first || to > last {
            Some(format!("end not in stored range {first}..={last}"))
        } else {
            None
        };
        match reason {
            Some(reason) => Err(AuditError::InvalidRange { from, to, reason }),
            None => Ok((from, to)),
        }
    }

    /// Run `mode` over `from..=to` in the mode's default direction.
    pub async fn run(
        &self,
        mode: AuditMode,
        from: Sequence,
        to: Sequence,
    ) -> AuditResult<AuditReport> {
        self.run_with_direction(mode, from, to, mode.default_direction())
            .await
    }

    pub async fn run_with_direction(
        &self,
        mode: AuditMode,
        from: Sequence,
        to: Sequence,
        direction: Direction,
    ) -> AuditResult<AuditReport> {
        self.config.validate()?;
        if from > to {
            return Err(AuditError::InvalidRange {
                from,
                to,
                reason: "start is after end".into(),
            });
        }
        tracing::info!(
            mode = %mode,
            from,
            to,
            wave_size = self.config.wave_size,
            "audit started"
        );

        let mut report = match mode {
            AuditMode::Diff => {
                if direction != Direction::Ascending {
                    return Err(AuditError::Config(
                        "diff mode only runs in ascending order".into(),
                    ));
                }
                self.run_diff(from, to).await?
            }
            _ => {
                let unit = self.unit(mode)?;
                self.run_waves(unit, mode, from, to, direction).await?
            }
        };
        report.sort();

        tracing::info!(
            mode = %mode,
            from,
            to,
            ledgers = report.ledgers_checked,
            mismatches = report.total_mismatches(),
            repairs = report.repairs.attempted,
            "audit finished"
        );
        Ok(report)
    }

    async fn run_waves(
        &self,
        unit: Unit,
        mode: AuditMode,
        from: Sequence,
        to: Sequence,
        direction: Direction,
    ) -> AuditResult<AuditReport> {
        let mut report = AuditReport::new(mode.as_str(), from, to);
        for (wave, seqs) in plan_waves(from, to, self.config.wave_size, direction)
            .into_iter()
            .enumerate()
        {
            self.check_cancel()?;
            let mut tasks = JoinSet::new();
            for &seq in &seqs {
                let unit = unit.clone();
                tasks.spawn(async move { unit.verify(seq).await });
            }

            let mut found = 0;
            while let Some(joined) = tasks.join_next().await {
                let outcome = joined.map_err(|e| AuditError::TaskFailed(e.to_string()))??;
                found += outcome.mismatches.len();
                report.absorb(outcome);
            }
            tracing::info!(
                wave,
                first = seqs.first().copied(),
                last = seqs.last().copied(),
                mismatches = found,
                total = report.total_mismatches(),
                "wave complete"
            );
        }
        Ok(report)
    }

    /// Verify `from` by full traversal, then every later ledger by diff.
    /// A mismatched base stops the run.
    async fn run_diff(&self, from: Sequence, to: Sequence) -> AuditResult<AuditReport> {
        let mut report = AuditReport::new(AuditMode::Diff.as_str(), from, to);
        let verifier = StateVerifier::new(self.snapshot_builder());

        self.check_cancel()?;
        let (mut snapshot, base) = verifier.base(from).await?;
        let base_ok = base.mismatches.is_empty();
        report.absorb(base);
        if !base_ok {
            tracing::warn!(seq = from, "base state mismatched, diff run stopped");
            return Ok(report);
        }

        for seq in from.saturating_add(1)..=to {
            self.check_cancel()?;
            let outcome = verifier.verify_next(&mut snapshot, seq).await?;
            report.absorb(outcome);
        }
        Ok(report)
    }

    fn unit(&self, mode: AuditMode) -> AuditResult<Unit> {
        let checks = &self.config.checks;
        let wants_repair = match mode {
            AuditMode::Tx => checks.fix_nft_uri,
            AuditMode::LedgerHash => checks.fix_ledger_hash,
            AuditMode::Objects | AuditMode::Diff => false,
        };
        let repair = match (wants_repair, &self.writer) {
            (false, _) => None,
            (true, Some(writer)) => Some(RepairController::new(
                Arc::clone(&self.reader),
                Arc::clone(writer),
            )),
            (true, None) => {
                return Err(AuditError::Config(
                    "repair requested but the store is opened read-only".into(),
                ))
            }
        };

        let unit = match mode {
            AuditMode::Objects | AuditMode::Diff => {
                Unit::State(StateVerifier::new(self.snapshot_builder()))
            }
            AuditMode::Tx => {
                let mut v = TransactionVerifier::new(
                    Arc::clone(&self.reader),
                    Arc::clone(&self.decoder),
                    Arc::clone(&self.factory),
                )
                .with_checks(*checks)
                .with_limits(self.config.limits)
                .with_cancel(self.cancel.clone());
                if let Some(repair) = repair {
                    v = v.with_repair(repair);
                }
                Unit::Tx(v)
            }
            AuditMode::LedgerHash => {
                let mut v = LedgerHashVerifier::new(Arc::clone(&self.reader))
                    .with_cancel(self.cancel.clone());
                if let Some(repair) = repair {
                    v = v.with_repair(repair);
                }
                Unit::LedgerHash(v)
            }
        };
        Ok(unit)
    }

    fn snapshot_builder(&self) -> SnapshotBuilder {
        SnapshotBuilder::new(Arc::clone(&self.reader), Arc::clone(&self.factory))
            .with_bounds(self.config.bounds)
            .with_fanout(self.config.fanout)
            .with_cancel(self.cancel.clone())
    }

    fn check_cancel(&self) -> AuditResult<()> {
        if self.cancel.is_cancelled() {
            return Err(AuditError::Cancelled);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CheckOptions;
    use crate::decoder::JsonEffectsDecoder;
    use crate::report::MismatchKind;
    use async_trait::async_trait;
    use lcheck_crypto::MerkleFactory;
    use lcheck_store::{InMemoryStore, LedgerSimulator, RandomHistory, StoreError, StoreResult};
    use lcheck_types::{AccountId, Hash256, Key, LedgerHeader, ObjectVersion, TxRecord};

    fn history(ledgers: u64) -> Arc<InMemoryStore> {
        let store = Arc::new(InMemoryStore::new());
        let mut sim = LedgerSimulator::new(store.clone(), Arc::new(MerkleFactory), 1);
        RandomHistory {
            seed: 3,
            ledgers,
            ..Default::default()
        }
        .generate(&mut sim)
        .unwrap();
        store
    }

    fn auditor(reader: Arc<dyn LedgerReader>, config: AuditConfig) -> Auditor {
        Auditor::new(reader, Arc::new(MerkleFactory), Arc::new(JsonEffectsDecoder), config)
    }

    fn with_wave(wave_size: usize) -> AuditConfig {
        AuditConfig {
            wave_size,
            fanout: 4,
            ..Default::default()
        }
    }

    #[test]
    fn waves_cover_range_in_order() {
        assert_eq!(
            plan_waves(1, 7, 3, Direction::Descending),
            vec![vec![7, 6, 5], vec![4, 3, 2], vec![1]]
        );
        assert_eq!(
            plan_waves(1, 4, 2, Direction::Ascending),
            vec![vec![1, 2], vec![3, 4]]
        );
        assert_eq!(plan_waves(5, 5, 50, Direction::Ascending), vec![vec![5]]);
        assert!(plan_waves(6, 5, 3, Direction::Ascending).is_empty());
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in [AuditMode::Objects, AuditMode::Diff, AuditMode::Tx, AuditMode::LedgerHash] {
            assert_eq!(mode.as_str().parse::<AuditMode>().unwrap(), mode);
        }
        assert!("ledgerhash".parse::<AuditMode>().is_err());
    }

    #[tokio::test]
    async fn three_bad_headers_counted_for_every_wave_size() {
        let store = history(10);
        for seq in [2, 5, 9] {
            store.corrupt_state_digest(seq, Hash256::new([0xaa; 32]));
            store.corrupt_tx_digest(seq, Hash256::new([0xbb; 32]));
        }
        for wave_size in [1, 2, 5] {
            let auditor = auditor(store.clone(), with_wave(wave_size));
            for mode in [AuditMode::Objects, AuditMode::Tx] {
                let report = auditor.run(mode, 1, 10).await.unwrap();
                assert_eq!(report.total_mismatches(), 3, "{mode} wave {wave_size}");
                assert_eq!(report.bad_sequences(), vec![2, 5, 9]);
                assert_eq!(report.ledgers_checked, 10);
            }
        }
    }

    #[tokio::test]
    async fn diff_mode_counts_each_bad_ledger() {
        let store = history(8);
        store.corrupt_state_digest(4, Hash256::new([1; 32]));
        store.corrupt_state_digest(7, Hash256::new([2; 32]));
        let report = auditor(store, with_wave(4))
            .run(AuditMode::Diff, 1, 8)
            .await
            .unwrap();
        assert_eq!(report.ledgers_checked, 8);
        assert_eq!(report.bad_sequences(), vec![4, 7]);
    }

    #[tokio::test]
    async fn diff_mode_stops_on_bad_base() {
        let store = history(8);
        store.corrupt_state_digest(3, Hash256::new([1; 32]));
        store.corrupt_state_digest(6, Hash256::new([1; 32]));
        let report = auditor(store, with_wave(4))
            .run(AuditMode::Diff, 3, 8)
            .await
            .unwrap();
        assert_eq!(report.ledgers_checked, 1);
        assert_eq!(report.total_mismatches(), 1);
    }

    #[tokio::test]
    async fn diff_mode_rejects_descending() {
        let store = history(3);
        let err = auditor(store, with_wave(2))
            .run_with_direction(AuditMode::Diff, 1, 3, Direction::Descending)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
    }

    #[tokio::test]
    async fn ledger_hash_run_repairs_and_still_counts() {
        let store = history(6);
        for seq in [2, 4] {
            let hash = store.ledger_header(seq).await.unwrap().ledger_hash;
            store.drop_ledger_hash(&hash);
        }
        let config = AuditConfig {
            checks: CheckOptions {
                fix_ledger_hash: true,
                ..Default::default()
            },
            ..with_wave(3)
        };
        let fixing = auditor(store.clone(), config).with_repair_writer(store.clone());
        let report = fixing.run(AuditMode::LedgerHash, 1, 6).await.unwrap();
        assert_eq!(report.bad_sequences(), vec![2, 4]);
        assert_eq!(report.repairs.confirmed, 2);
        assert!(report
            .mismatches
            .iter()
            .all(|m| m.kind == MismatchKind::MissingLedgerHash));

        let again = fixing.run(AuditMode::LedgerHash, 1, 6).await.unwrap();
        assert!(again.is_consistent());
    }

    #[tokio::test]
    async fn repair_without_writer_is_a_config_error() {
        let store = history(2);
        let config = AuditConfig {
            checks: CheckOptions {
                fix_nft_uri: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let err = auditor(store, config)
            .run(AuditMode::Tx, 1, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
    }

    #[tokio::test]
    async fn range_resolution() {
        let store = history(5);
        let auditor = auditor(store, AuditConfig::default());
        assert_eq!(auditor.resolve_range(2, 0).await.unwrap(), (2, 5));
        assert_eq!(auditor.resolve_range(1, 3).await.unwrap(), (1, 3));
        assert!(auditor.resolve_range(4, 2).await.is_err());
        assert!(auditor.resolve_range(0, 3).await.is_err());
        assert!(auditor.resolve_range(2, 9).await.is_err());

        let empty = Auditor::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(MerkleFactory),
            Arc::new(JsonEffectsDecoder),
            AuditConfig::default(),
        );
        assert!(matches!(
            empty.resolve_range(1, 0).await,
            Err(AuditError::InvalidRange { .. })
        ));
    }

    #[tokio::test]
    async fn cancelled_run_stops() {
        let store = history(4);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = auditor(store, with_wave(2))
            .with_cancel(cancel)
            .run(AuditMode::Objects, 1, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Cancelled));
    }

    /// Delegates to an in-memory store but fails object reads at one sequence.
    struct FailingReader {
        inner: Arc<InMemoryStore>,
        fail_at: Sequence,
    }

    #[async_trait]
    impl LedgerReader for FailingReader {
        async fn ledger_range(&self) -> StoreResult<Option<(Sequence, Sequence)>> {
            self.inner.ledger_range().await
        }

        async fn object(&self, key: &Key, seq: Sequence) -> StoreResult<ObjectVersion> {
            if seq == self.fail_at {
                return Err(StoreError::Backend("connection reset".into()));
            }
            self.inner.object(key, seq).await
        }

        async fn successor(&self, key: &Key, seq: Sequence) -> StoreResult<Key> {
            self.inner.successor(key, seq).await
        }

        async fn diff_keys(&self, seq: Sequence) -> StoreResult<Vec<Key>> {
            self.inner.diff_keys(seq).await
        }

        async fn ledger_header(&self, seq: Sequence) -> StoreResult<LedgerHeader> {
            self.inner.ledger_header(seq).await
        }

        async fn tx_hashes(&self, seq: Sequence) -> StoreResult<Vec<Hash256>> {
            self.inner.tx_hashes(seq).await
        }

        async fn transaction(&self, hash: &Hash256) -> StoreResult<Option<TxRecord>> {
            self.inner.transaction(hash).await
        }

        async fn ledger_hash_sequence(&self, hash: &Hash256) -> StoreResult<Option<Sequence>> {
            self.inner.ledger_hash_sequence(hash).await
        }

        async fn account_tx_exists(
            &self,
            account: &AccountId,
            seq: Sequence,
            tx_index: u32,
        ) -> StoreResult<bool> {
            self.inner.account_tx_exists(account, seq, tx_index).await
        }

        async fn nft_tx_exists(
            &self,
            token: &Hash256,
            seq: Sequence,
            tx_index: u32,
        ) -> StoreResult<bool> {
            self.inner.nft_tx_exists(token, seq, tx_index).await
        }

        async fn nft_exists(&self, token: &Hash256, seq: Sequence) -> StoreResult<bool> {
            self.inner.nft_exists(token, seq).await
        }

        async fn nft_uri_count(&self, token: &Hash256, seq: Sequence) -> StoreResult<u64> {
            self.inner.nft_uri_count(token, seq).await
        }

        async fn issuer_nft_exists(
            &self,
            issuer: &AccountId,
            taxon: u32,
            token: &Hash256,
        ) -> StoreResult<bool> {
            self.inner.issuer_nft_exists(issuer, taxon, token).await
        }
    }

    #[tokio::test]
    async fn read_failure_aborts_the_run() {
        let store = history(6);
        store.corrupt_state_digest(1, Hash256::new([1; 32]));
        let reader = Arc::new(FailingReader {
            inner: store,
            fail_at: 4,
        });
        for wave_size in [1, 3, 6] {
            let err = auditor(reader.clone(), with_wave(wave_size))
                .run(AuditMode::Objects, 1, 6)
                .await
                .unwrap_err();
            assert!(
                matches!(err, AuditError::Store(StoreError::Backend(_))),
                "wave {wave_size}: {err}"
            );
        }
    }
}
