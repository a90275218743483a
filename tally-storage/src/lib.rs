//! Tally Storage - SQLite Record and Ledger Stores
//!
//! Two independent stores live behind this crate:
//! - the catalog, a pre-populated single-table store whose schema is
//!   discovered at runtime ([`SchemaIntrospector`], [`SqliteRecordRepository`])
//! - the ledger, a fixed `accounts` table created on demand ([`LedgerStore`]),
//!   mutated by [`TransferEngine`] and probed by [`RollbackSandbox`]
//!
//! Every public operation opens its own session and releases it before
//! returning. Mutations either commit in full or leave the store untouched.

mod error;
pub mod introspect;
pub mod ledger;
pub mod repository;
pub mod sandbox;
pub mod session;
pub mod transfer;

pub use introspect::SchemaIntrospector;
pub use ledger::{LedgerStore, ACCOUNTS_TABLE};
pub use repository::{RecordStore, SqliteRecordRepository};
pub use sandbox::RollbackSandbox;
pub use session::SessionFactory;
pub use transfer::TransferEngine;
