//! Configuration

use serde::{Deserialize, Serialize};
use std::{env, path::PathBuf};

/// Proving backend mode
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProverMode {
    /// Keyed attestations, checked on verification
    Attest,
    /// Empty payloads, every proof verifies (for wiring tests)
    #[default]
    Mock,
}

impl ProverMode {
    /// Whether proofs carry no attestation
    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock)
    }
}

impl From<&str> for ProverMode {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "attest" => Self::Attest,
            _ => Self::Mock,
        }
    }
}

/// Prover configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ProverConfig {
    pub mode: ProverMode,
    /// Hex-encoded 32-byte attestation key (required for attest mode)
    pub key: Option<String>,
}

impl ProverConfig {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let mode = env::var("PROVER_MODE")
            .map(|s| ProverMode::from(s.as_str()))
            .unwrap_or_default();
        let key = env::var("PROVER_KEY").ok();

        Self { mode, key }
    }
}

/// Host configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding proofs and settlement state
    pub data_dir: PathBuf,
    /// Prover configuration
    pub prover: ProverConfig,
    /// Merges running at once during a reduction round
    pub merge_parallelism: usize,
    /// Settlement state file name inside `data_dir`
    pub settlement_state: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            prover: ProverConfig::default(),
            merge_parallelism: 4,
            settlement_state: "settlement.json".to_string(),
        }
    }
}

impl Config {
    /// Load from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: env::var("TIDEPOOL_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            prover: ProverConfig::from_env(),
            merge_parallelism: env::var("MERGE_PARALLELISM")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.merge_parallelism),
            settlement_state: env::var("SETTLEMENT_STATE").unwrap_or(defaults.settlement_state),
        }
    }

    /// Directory of the proof store
    pub fn proofs_dir(&self) -> PathBuf {
        self.data_dir.join("proofs")
    }

    /// Settlement state file
    pub fn settlement_path(&self) -> PathBuf {
        self.data_dir.join(&self.settlement_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prover_mode_parse() {
        assert_eq!(ProverMode::from("attest"), ProverMode::Attest);
        assert_eq!(ProverMode::from("ATTEST"), ProverMode::Attest);
        assert_eq!(ProverMode::from("anything"), ProverMode::Mock);
        assert!(ProverMode::default().is_mock());
    }

    #[test]
    fn test_default_paths() {
        let config = Config::default();
        assert_eq!(config.merge_parallelism, 4);
        assert_eq!(config.proofs_dir(), PathBuf::from("./data/proofs"));
        assert_eq!(config.settlement_path(), PathBuf::from("./data/settlement.json"));
    }
}
