//! Tally Core - Data Types
//!
//! Pure data structures shared by the storage components: discovered schema
//! and column roles, catalog and ledger rows, transfer and probe outcomes,
//! the error taxonomy, and configuration. Nothing in this crate opens a store.

pub mod config;
pub mod entities;
pub mod error;
pub mod schema;

pub use config::TallyConfig;
pub use entities::{
    Account, NewAccount, NewRecord, ProbeReport, Record, RowId, TransferOutcome,
};
pub use error::{
    ConfigError, SchemaError, StorageError, TallyError, TallyResult, ValidationError,
};
pub use schema::{
    classify_roles, quote_identifier, AmbiguityPolicy, ColumnDescriptor, ColumnRole, RoleMap,
    RoleVocabulary, TableSchema,
};
