use std::fmt;

use lcheck_types::Sequence;
use serde::{Deserialize, Serialize};

/// Kind of logical inconsistency found.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    StateDigest,
    TxDigest,
    /// A hash listed for the ledger has no transaction row. The ledger's
    /// transaction digest is not compared in that case.
    MissingTransaction,
    MissingAccountTx,
    MissingNftTx,
    MissingNft,
    MissingNftUri,
    MissingIssuerNft,
    MissingDiff,
    MissingLedgerHash,
    LedgerHashSequence,
}

impl fmt::Display for MismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::StateDigest => "state digest",
            Self::TxDigest => "transaction digest",
            Self::MissingTransaction => "missing transaction",
            Self::MissingAccountTx => "missing account_tx row",
            Self::MissingNftTx => "missing nft_tx row",
            Self::MissingNft => "missing nft row",
            Self::MissingNftUri => "missing nft_uri row",
            Self::MissingIssuerNft => "missing issuer_nft row",
            Self::MissingDiff => "missing diff row",
            Self::MissingLedgerHash => "missing ledger_hash row",
            Self::LedgerHashSequence => "ledger_hash resolves elsewhere",
        };
        f.write_str(s)
    }
}

/// One logical finding. Never fatal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mismatch {
    pub sequence: Sequence,
    pub kind: MismatchKind,
    pub detail: String,
}

impl Mismatch {
    /// Build a mismatch and log it at `warn`.
    pub fn record(sequence: Sequence, kind: MismatchKind, detail: impl Into<String>) -> Self {
        let detail = detail.into();
        tracing::warn!(seq = sequence, kind = %kind, %detail, "mismatch");
        Self {
            sequence,
            kind,
            detail,
        }
    }
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "seq {}: {}: {}", self.sequence, self.kind, self.detail)
    }
}

/// Repair attempts made during a run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairStats {
    pub attempted: u64,
    pub confirmed: u64,
}

impl RepairStats {
    pub fn failed(&self) -> u64 {
        self.attempted - self.confirmed
    }

    pub fn merge(&mut self, other: RepairStats) {
        self.attempted += other.attempted;
        self.confirmed += other.confirmed;
    }
}

/// What one verification unit found.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UnitOutcome {
    pub mismatches: Vec<Mismatch>,
    pub repairs: RepairStats,
}

impl UnitOutcome {
    pub fn push(&mut self, mismatch: Mismatch) {
        self.mismatches.push(mismatch);
    }
}

/// Result of a completed run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    pub mode: String,
    pub from: Sequence,
    pub to: Sequence,
    pub ledgers_checked: u64,
    pub mismatches: Vec<Mismatch>,
    pub repairs: RepairStats,
}

impl AuditReport {
    pub fn new(mode: impl Into<String>, from: Sequence, to: Sequence) -> Self {
        Self {
            mode: mode.into(),
            from,
            to,
            ledgers_checked: 0,
            mismatches: Vec::new(),
            repairs: RepairStats::default(),
        }
    }

    pub fn absorb(&mut self, outcome: UnitOutcome) {
        self.ledgers_checked += 1;
        self.mismatches.extend(outcome.mismatches);
        self.repairs.merge(outcome.repairs);
    }

    pub fn total_mismatches(&self) -> u64 {
        self.mismatches.len() as u64
    }

    /// Zero mismatches is the only consistent result.
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Order mismatches by sequence then kind.
    pub fn sort(&mut self) {
        self.mismatches
            .sort_by(|a, b| (a.sequence, a.kind).cmp(&(b.sequence, b.kind)));
    }

    /// Mismatched sequences, ascending and unique.
    pub fn bad_sequences(&self) -> Vec<Sequence> {
        let mut seqs: Vec<Sequence> = self.mismatches.iter().map(|m| m.sequence).collect();
        seqs.sort_unstable();
        seqs.dedup();
        seqs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_counts_ledgers_and_mismatches() {
        let mut report = AuditReport::new("tx", 1, 3);
        report.absorb(UnitOutcome::default());
        report.absorb(UnitOutcome {
            mismatches: vec![
                Mismatch::record(3, MismatchKind::TxDigest, "x"),
                Mismatch::record(2, MismatchKind::MissingNftUri, "y"),
            ],
            repairs: RepairStats {
                attempted: 1,
                confirmed: 1,
            },
        });
        report.sort();
        assert_eq!(report.ledgers_checked, 2);
        assert_eq!(report.total_mismatches(), 2);
        assert_eq!(report.bad_sequences(), vec![2, 3]);
        assert_eq!(report.repairs.failed(), 0);
        assert!(!report.is_consistent());
    }

    #[test]
    fn report_serializes_kinds_in_snake_case() {
        let mut report = AuditReport::new("objects", 1, 1);
        report.absorb(UnitOutcome {
            mismatches: vec![Mismatch::record(1, MismatchKind::StateDigest, "d")],
            repairs: RepairStats::default(),
        });
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("\"state_digest\""));
    }
}
