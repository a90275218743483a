//! Configuration types
//!
//! Loaded from a TOML file (optional), then overridden from the environment,
//! then validated. Environment variables:
//! - `TALLY_CATALOG_PATH`: path of the introspected store
//! - `TALLY_LEDGER_PATH`: path of the ledger store
//! - `TALLY_BUSY_TIMEOUT_MS`: session-acquisition timeout in milliseconds

use crate::{ConfigError, RoleVocabulary};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_CATALOG_PATH: &str = "TALLY_CATALOG_PATH";
pub const ENV_LEDGER_PATH: &str = "TALLY_LEDGER_PATH";
pub const ENV_BUSY_TIMEOUT_MS: &str = "TALLY_BUSY_TIMEOUT_MS";

fn default_busy_timeout_ms() -> u64 {
    5_000
}

/// Master configuration struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TallyConfig {
    /// Pre-populated store whose single table is discovered at runtime.
    pub catalog_path: PathBuf,
    /// Store holding the fixed-schema accounts table.
    pub ledger_path: PathBuf,
    /// How long a session waits for the store's write lock.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    #[serde(default)]
    pub roles: RoleVocabulary,
}

impl Default for TallyConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from("library.db"),
            ledger_path: PathBuf::from("finance.db"),
            busy_timeout_ms: default_busy_timeout_ms(),
            roles: RoleVocabulary::default(),
        }
    }
}

impl TallyConfig {
    /// Load from `path` when given (defaults otherwise), apply environment
    /// overrides, and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: TallyConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in `load`).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_CATALOG_PATH) {
            self.catalog_path = PathBuf::from(path);
        }
        if let Some(path) = lookup(ENV_LEDGER_PATH) {
            self.ledger_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms = raw.parse().map_err(|_| ConfigError::InvalidValue {
                field: ENV_BUSY_TIMEOUT_MS.to_string(),
                value: raw.clone(),
                reason: "must be an unsigned integer".to_string(),
            })?;
        }
        Ok(())
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - both store paths are non-empty
    /// - busy_timeout_ms > 0
    /// - the role vocabulary names at least one column per fixed role and at
    ///   least one non-blank quantity marker
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "catalog_path".to_string(),
            });
        }
        if self.ledger_path.as_os_str().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "ledger_path".to_string(),
            });
        }
        if self.busy_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "busy_timeout_ms".to_string(),
                value: self.busy_timeout_ms.to_string(),
                reason: "must be > 0".to_string(),
            });
        }
        if self.roles.identity.trim().is_empty() {
            return Err(ConfigError::MissingRequired {
                field: "roles.identity".to_string(),
            });
        }
        if self.roles.primary_text.iter().all(|n| n.trim().is_empty()) {
            return Err(ConfigError::MissingRequired {
                field: "roles.primary_text".to_string(),
            });
        }
        if self.roles.secondary_text.iter().all(|n| n.trim().is_empty()) {
            return Err(ConfigError::MissingRequired {
                field: "roles.secondary_text".to_string(),
            });
        }
        // an empty marker would make every column quantity-like
        if self.roles.quantity_markers.is_empty()
            || self.roles.quantity_markers.iter().any(|m| m.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue {
                field: "roles.quantity_markers".to_string(),
                value: format!("{:?}", self.roles.quantity_markers),
                reason: "must contain only non-blank markers".to_string(),
            });
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

// =============================================================================
// TESTS
// =============================================================================
