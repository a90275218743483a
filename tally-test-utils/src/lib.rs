//! Tally Test Utilities
//!
//! Centralized test infrastructure for the tally workspace:
//! - Fixture seeding for catalog and ledger stores in temporary directories
//! - Proptest generators for records, accounts, and amounts
//! - Custom assertions for order-independent record comparison
//!
//! Nothing here runs on load. Every fixture is built by an explicit call.

// Re-export core types for convenience
pub use tally_core::{
    Account, NewAccount, NewRecord, ProbeReport, Record, RowId, TallyConfig, TallyError,
    TallyResult, TransferOutcome,
};
pub use tally_storage::{
    LedgerStore, RecordStore, RollbackSandbox, SchemaIntrospector, SessionFactory,
    SqliteRecordRepository, TransferEngine,
};

use proptest::prelude::*;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Busy timeout used by every fixture session.
pub const TEST_BUSY_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// CATALOG FIXTURES
// ============================================================================

/// Table layout of the library fixture.
pub const LIBRARY_DDL: &str = "CREATE TABLE books (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    author TEXT,
    year INTEGER NOT NULL,
    stock_quantity INTEGER NOT NULL
)";

/// Five books whose years average to exactly 1542.
pub const LIBRARY_ROWS: [(RowId, &str, &str, i64, i64); 5] = [
    (1, "Book1", "Author1", 1500, 5),
    (2, "Book2", "Author2", 1550, 10),
    (3, "Book3", "Author3", 1580, 8),
    (4, "Book4", "Author4", 1530, 7),
    (5, "Book5", "Author5", 1550, 3),
];

/// A seeded catalog store on disk. The directory lives as long as the fixture.
pub struct CatalogFixture {
    pub dir: TempDir,
    pub path: PathBuf,
}

impl CatalogFixture {
    pub fn sessions(&self) -> SessionFactory {
        SessionFactory::new(&self.path, TEST_BUSY_TIMEOUT)
    }

    /// Open a repository over this store with the default vocabulary.
    pub fn repository(&self) -> SqliteRecordRepository {
        SqliteRecordRepository::open(self.sessions(), SchemaIntrospector::default())
            .expect("fixture catalog should classify")
    }

    /// Raw connection for assertions that bypass the repository.
    pub fn connection(&self) -> Connection {
        Connection::open(&self.path).expect("fixture catalog should open")
    }
}

/// Create a catalog store from arbitrary DDL and seed SQL.
pub fn catalog_from_sql(ddl: &str, seed: &str) -> CatalogFixture {
    let dir = TempDir::new().expect("TempDir creation should succeed");
    let path = dir.path().join("library.db");
    let conn = Connection::open(&path).expect("catalog store should be created");
    conn.execute_batch(ddl).expect("catalog DDL should apply");
    conn.execute_batch(seed).expect("catalog seed should apply");
    CatalogFixture { dir, path }
}

/// The five-book library fixture.
pub fn library_catalog() -> CatalogFixture {
    let fixture = catalog_from_sql(LIBRARY_DDL, "");
    seed_library_rows(&fixture.path);
    fixture
}

/// The library table with no rows.
pub fn empty_library_catalog() -> CatalogFixture {
    catalog_from_sql(LIBRARY_DDL, "")
}

/// Replace the contents of the library table at `path` with [`LIBRARY_ROWS`].
pub fn seed_library_rows(path: &Path) {
    let mut conn = Connection::open(path).expect("catalog store should open");
    let tx = conn.transaction().expect("seed transaction");
    tx.execute("DELETE FROM books", []).expect("clear books");
    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO books (id, title, author, year, stock_quantity)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .expect("prepare seed insert");
        for (id, title, author, year, stock) in LIBRARY_ROWS {
            stmt.execute(params![id, title, author, year, stock])
                .expect("seed row");
        }
    }
    tx.commit().expect("commit seed");
}

// ============================================================================
// LEDGER FIXTURES
// ============================================================================

/// A ledger store on disk with its schema created.
pub struct LedgerFixture {
    pub dir: TempDir,
    pub ledger: LedgerStore,
    pub ids: Vec<RowId>,
}

impl LedgerFixture {
    pub fn engine(&self) -> TransferEngine {
        TransferEngine::new(self.ledger.clone())
    }

    pub fn sandbox(&self) -> RollbackSandbox {
        RollbackSandbox::new(self.ledger.clone())
    }

    pub fn balance(&self, id: RowId) -> f64 {
        self.ledger
            .balance(id)
            .expect("balance query should succeed")
            .expect("account should exist")
    }
}

/// Ledger path inside `dir`, without creating anything.
pub fn ledger_store_in(dir: &Path) -> LedgerStore {
    LedgerStore::new(SessionFactory::new(dir.join("finance.db"), TEST_BUSY_TIMEOUT))
}

/// A ledger with its schema created and `accounts` loaded.
pub fn funded_ledger(accounts: &[(&str, f64)]) -> LedgerFixture {
    let dir = TempDir::new().expect("TempDir creation should succeed");
    let ledger = ledger_store_in(dir.path());
    ledger.create_schema().expect("ledger schema should be created");
    let ids = ledger
        .bulk_insert(accounts.iter().map(|(owner, balance)| (*owner, *balance)))
        .expect("accounts should load");
    LedgerFixture { dir, ledger, ids }
}

/// Configuration pointing both stores into `dir`.
pub fn test_config(dir: &Path) -> TallyConfig {
    TallyConfig {
        catalog_path: dir.join("library.db"),
        ledger_path: dir.join("finance.db"),
        busy_timeout_ms: TEST_BUSY_TIMEOUT.as_millis() as u64,
        ..TallyConfig::default()
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

/// Strategy for a record ready to insert into the library fixture.
pub fn arb_new_record() -> impl Strategy<Value = NewRecord> {
    (
        "[A-Za-z0-9 ]{1,24}",
        proptest::option::of("[A-Za-z .]{1,24}"),
        1000i64..2100,
        0i64..500,
    )
        .prop_map(|(primary_text, secondary_text, ordering, quantity)| NewRecord {
            primary_text,
            secondary_text,
            ordering,
            quantity,
        })
}

/// Strategy for whole-unit balances, exact in `f64`.
pub fn arb_balance() -> impl Strategy<Value = f64> {
    (0u32..1_000_000).prop_map(f64::from)
}

/// Strategy for an account to bulk-load.
pub fn arb_new_account() -> impl Strategy<Value = NewAccount> {
    ("[A-Z][a-z]{2,10}", arb_balance()).prop_map(|(owner, balance)| NewAccount { owner, balance })
}

// ============================================================================
// ASSERTIONS
// ============================================================================

/// Assert two record sets are equal ignoring row order.
pub fn assert_same_records(actual: &[Record], expected: &[Record]) {
    let mut actual = actual.to_vec();
    let mut expected = expected.to_vec();
    actual.sort_by_key(|r| r.id);
    expected.sort_by_key(|r| r.id);
    assert_eq!(actual, expected, "record sets differ");
}

/// Sorted non-NULL ordering values of `records`.
pub fn orderings(records: &[Record]) -> Vec<i64> {
    let mut values: Vec<i64> = records.iter().filter_map(|r| r.ordering).collect();
    values.sort_unstable();
    values
}
