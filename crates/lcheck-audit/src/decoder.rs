//! Transaction decoding.
//!
//! Decoding is an injected collaborator: production deployments plug in
//! the ledger's binary codec, tests and fixtures use [`JsonEffectsDecoder`].

use lcheck_types::{DecodeLimits, TxEffects};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed metadata: {0}")]
    Malformed(String),
}

/// Turns a transaction blob and its metadata into an effect set.
///
/// Each category of the result holds at most the corresponding entry of
/// `limits`; extra items are dropped, not reported as errors.
pub trait TxDecoder: Send + Sync {
    fn decode(
        &self,
        tx: &[u8],
        metadata: &[u8],
        limits: &DecodeLimits,
    ) -> Result<TxEffects, DecodeError>;
}

/// Reads metadata as the JSON encoding of [`TxEffects`].
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonEffectsDecoder;

impl TxDecoder for JsonEffectsDecoder {
    fn decode(
        &self,
        _tx: &[u8],
        metadata: &[u8],
        limits: &DecodeLimits,
    ) -> Result<TxEffects, DecodeError> {
        let mut effects: TxEffects = serde_json::from_slice(metadata)
            .map_err(|e| DecodeError::Malformed(e.to_string()))?;
        effects.affected_accounts.truncate(limits.max_accounts);
        effects.nft_txs.truncate(limits.max_nft_items);
        let diffs = &mut effects.key_diffs;
        diffs.created.truncate(limits.max_diff_items);
        diffs.deleted.truncate(limits.max_diff_items);
        diffs.updated.truncate(limits.max_diff_items);
        Ok(effects)
    }
}

/// Categories of `effects` that reached their cap.
pub fn saturated(effects: &TxEffects, limits: &DecodeLimits) -> Vec<&'static str> {
    let mut full = Vec::new();
    if effects.affected_accounts.len() >= limits.max_accounts {
        full.push("accounts");
    }
    if effects.nft_txs.len() >= limits.max_nft_items {
        full.push("nft");
    }
    let diffs = &effects.key_diffs;
    if [&diffs.created, &diffs.deleted, &diffs.updated]
        .iter()
        .any(|keys| keys.len() >= limits.max_diff_items)
    {
        full.push("diff");
    }
    full
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcheck_types::{AccountId, Key};

    fn encode(effects: &TxEffects) -> Vec<u8> {
        serde_json::to_vec(effects).unwrap()
    }

    #[test]
    fn decodes_json_metadata() {
        let effects = TxEffects {
            tx_index: 4,
            affected_accounts: vec![AccountId::new([1; 20])],
            ..Default::default()
        };
        let decoded = JsonEffectsDecoder
            .decode(b"tx", &encode(&effects), &DecodeLimits::default())
            .unwrap();
        assert_eq!(decoded, effects);
    }

    #[test]
    fn truncates_at_limits() {
        let effects = TxEffects {
            affected_accounts: (0..5u8).map(|i| AccountId::new([i; 20])).collect(),
            key_diffs: lcheck_types::KeyDiffs {
                created: (0..5).map(Key::from_u64).collect(),
                ..Default::default()
            },
            ..Default::default()
        };
        let limits = DecodeLimits {
            max_accounts: 3,
            max_nft_items: 3,
            max_diff_items: 2,
        };
        let decoded = JsonEffectsDecoder
            .decode(b"tx", &encode(&effects), &limits)
            .unwrap();
        assert_eq!(decoded.affected_accounts.len(), 3);
        assert_eq!(decoded.key_diffs.created.len(), 2);
        assert_eq!(saturated(&decoded, &limits), vec!["accounts", "diff"]);
    }

    #[test]
    fn garbage_metadata_is_an_error() {
        let err = JsonEffectsDecoder
            .decode(b"tx", b"\x00\x01", &DecodeLimits::default())
            .unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }
}
