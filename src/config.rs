//! Engine configuration, read from RON.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Every field has a default, so an empty `()` document is a valid config.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    /// Base seed for reproducible sessions. Each battle derives its own
    /// seed from this and the order it was created in. `None` draws from
    /// entropy.
    pub rng_seed: Option<u64>,
    pub min_wager: i64,
    pub max_wager: i64,
    /// Moves given to a creature that has none recorded.
    pub default_moves: Vec<String>,
    /// Battles idle this long are expired. `None` disables expiry.
    pub stall_timeout_secs: Option<u64>,
    /// Directory of RON catalogs layered over the built-in definitions.
    pub definitions: Option<PathBuf>,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            rng_seed: None,
            min_wager: 0,
            max_wager: 10_000,
            default_moves: vec!["Tackle".to_string()],
            stall_timeout_secs: None,
            definitions: None,
        }
    }
}

impl BattleConfig {
    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        let config: BattleConfig = ron::from_str(text).map_err(|err| ConfigError::Malformed(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_ron_str(&text)?;
        tracing::info!(path = %path.display(), "loaded battle config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_wager < 0 {
            return Err(ConfigError::Invalid("min_wager must not be negative".to_string()));
        }
        if self.max_wager < self.min_wager {
            return Err(ConfigError::Invalid(format!(
                "max_wager {} is below min_wager {}",
                self.max_wager, self.min_wager
            )));
        }
        if self.default_moves.is_empty() {
            return Err(ConfigError::Invalid("default_moves must name at least one move".to_string()));
        }
        Ok(())
    }

    pub fn wager_in_range(&self, wager: i64) -> bool {
        (self.min_wager..=self.max_wager).contains(&wager)
    }
}
