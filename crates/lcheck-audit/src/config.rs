use std::path::Path;

use lcheck_types::{DecodeLimits, KeyBounds};
use serde::{Deserialize, Serialize};

use crate::error::{AuditError, AuditResult};

/// Which checks run, and which repairs are allowed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CheckOptions {
    /// Skip recomputing the transaction digest.
    pub skip_digest: bool,
    pub skip_account_check: bool,
    pub skip_nft_check: bool,
    pub skip_diff_check: bool,
    /// Insert missing NFT URI rows.
    pub fix_nft_uri: bool,
    /// Insert missing ledger-hash reverse-index rows.
    pub fix_ledger_hash: bool,
}

impl CheckOptions {
    /// Whether any check needs decoded transaction effects.
    pub fn needs_decode(&self) -> bool {
        !(self.skip_account_check && self.skip_nft_check && self.skip_diff_check)
    }
}

/// Configuration for one audit run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Verification units launched concurrently per wave.
    pub wave_size: usize,
    /// Preceding diff sets mined for traversal cursors.
    pub fanout: u64,
    pub checks: CheckOptions,
    pub limits: DecodeLimits,
    pub bounds: KeyBounds,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            wave_size: 50,
            fanout: 16,
            checks: CheckOptions::default(),
            limits: DecodeLimits::default(),
            bounds: KeyBounds::default(),
        }
    }
}

impl AuditConfig {
    pub fn from_toml_str(s: &str) -> AuditResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| AuditError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> AuditResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> AuditResult<String> {
        toml::to_string_pretty(self).map_err(|e| AuditError::Config(e.to_string()))
    }

    pub fn validate(&self) -> AuditResult<()> {
        if self.wave_size == 0 {
            return Err(AuditError::Config("wave_size must be at least 1".into()));
        }
        let limits = &self.limits;
        if limits.max_accounts == 0 || limits.max_nft_items == 0 || limits.max_diff_items == 0 {
            return Err(AuditError::Config("decode limits must be at least 1".into()));
        }
        self.bounds
            .validate()
            .map_err(|e| AuditError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lcheck_types::Key;

    #[test]
    fn defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.wave_size, 50);
        assert_eq!(config.fanout, 16);
        assert_eq!(config.limits.max_accounts, 1000);
        assert_eq!(config.bounds.lower, Key::MIN);
        assert!(config.validate().is_ok());
        assert!(config.checks.needs_decode());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = AuditConfig::from_toml_str(
            r#"
            wave_size = 8

            [checks]
            skip_nft_check = true
            fix_nft_uri = true
            "#,
        )
        .unwrap();
        assert_eq!(config.wave_size, 8);
        assert_eq!(config.fanout, 16);
        assert!(config.checks.skip_nft_check);
        assert!(config.checks.fix_nft_uri);
        assert!(!config.checks.skip_diff_check);
    }

    #[test]
    fn unknown_key_rejected() {
        assert!(AuditConfig::from_toml_str("wave_sise = 3").is_err());
    }

    #[test]
    fn zero_wave_rejected() {
        let err = AuditConfig::from_toml_str("wave_size = 0").unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
    }

    #[test]
    fn inverted_bounds_rejected() {
        let config = AuditConfig {
            bounds: KeyBounds {
                lower: Key::MAX,
                upper: Key::MIN,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lcheck.toml");
        let config = AuditConfig {
            wave_size: 3,
            ..Default::default()
        };
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(AuditConfig::load(&path).unwrap(), config);
    }
}
