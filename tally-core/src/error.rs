//! Error types for tally operations

use crate::ColumnRole;
use thiserror::Error;

/// Schema discovery and schema creation errors.
///
/// Fatal to the calling operation and never retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("No user table found in store")]
    NoUserTable,

    #[error("Expected exactly one user table, found {}: {}", .tables.len(), .tables.join(", "))]
    MultipleUserTables { tables: Vec<String> },

    #[error("Table {table} has no columns")]
    NoColumns { table: String },

    #[error("No column for role {role} in table {table}")]
    MissingRole { role: ColumnRole, table: String },

    #[error("Ambiguous column for role {role}: {}", .candidates.join(", "))]
    AmbiguousRole {
        role: ColumnRole,
        candidates: Vec<String>,
    },

    #[error("Table {table} already exists")]
    TableExists { table: String },
}

/// Storage layer errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {reason}")]
    Sqlite {
        /// Engine result code, when the failure came from the engine.
        code: Option<String>,
        reason: String,
    },

    #[error("Failed to open store at {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },
}

/// Validation errors for caller-supplied values.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid transfer amount {amount}: {reason}")]
    InvalidAmount { amount: f64, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required configuration field: {field}")]
    MissingRequired { field: String },

    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all tally errors.
#[derive(Debug, Error)]
pub enum TallyError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for tally operations.
pub type TallyResult<T> = Result<T, TallyError>;

// =============================================================================
// TESTS
// =============================================================================
