//! Fixed-schema accounts store.
//!
//! The ledger owns one table, `accounts (id, owner, balance)`, created
//! explicitly by [`LedgerStore::create_schema`]. Transfers and rollback probes
//! run against the same file through [`LedgerStore::session`].

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tally_core::{
    Account, NewAccount, RowId, SchemaError, TallyConfig, TallyResult, ValidationError,
};

use crate::error::sqlite;
use crate::session::SessionFactory;

/// Name of the ledger's only table.
pub const ACCOUNTS_TABLE: &str = "accounts";

const CREATE_ACCOUNTS_SQL: &str = "CREATE TABLE accounts (
    id INTEGER PRIMARY KEY,
    owner TEXT NOT NULL,
    balance REAL NOT NULL
)";

const TABLE_EXISTS_SQL: &str = "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1";

/// Balance of account `id`, `None` when the account does not exist.
pub(crate) fn read_balance(conn: &Connection, id: RowId) -> rusqlite::Result<Option<f64>> {
    conn.query_row(
        "SELECT balance FROM accounts WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()
}

pub(crate) fn account_present(conn: &Connection, id: RowId) -> rusqlite::Result<bool> {
    Ok(read_balance(conn, id)?.is_some())
}

/// Handle to the ledger file. Cheap to clone; holds no open connection.
#[derive(Debug, Clone)]
pub struct LedgerStore {
    sessions: SessionFactory,
}

impl LedgerStore {
    pub fn new(sessions: SessionFactory) -> Self {
        Self { sessions }
    }

    pub fn from_config(config: &TallyConfig) -> Self {
        Self::new(SessionFactory::ledger(config))
    }

    pub fn sessions(&self) -> &SessionFactory {
        &self.sessions
    }

    /// Open a session on an existing ledger.
    pub fn session(&self) -> TallyResult<Connection> {
        self.sessions.open()
    }

    /// Create the store file if needed and the accounts table within it.
    ///
    /// # Errors
    ///
    /// `SchemaError::TableExists` when the table is already there. Creation is
    /// deliberately not idempotent.
    pub fn create_schema(&self) -> TallyResult<()> {
        let mut conn = self.sessions.open_or_create()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sqlite)?;

        let exists = tx
            .query_row(TABLE_EXISTS_SQL, params![ACCOUNTS_TABLE], |_| Ok(()))
            .optional()
            .map_err(sqlite)?
            .is_some();
        if exists {
            return Err(SchemaError::TableExists {
                table: ACCOUNTS_TABLE.to_string(),
            }
            .into());
        }

        tx.execute(CREATE_ACCOUNTS_SQL, []).map_err(sqlite)?;
        tx.commit().map_err(sqlite)?;

        tracing::info!(path = %self.sessions.path().display(), "Ledger schema created");
        Ok(())
    }

    /// Insert all accounts in one transaction and return their ids in input
    /// order. Either every row is stored or none is.
    pub fn bulk_insert<I, A>(&self, accounts: I) -> TallyResult<Vec<RowId>>
    where
        I: IntoIterator<Item = A>,
        A: Into<NewAccount>,
    {
        let accounts: Vec<NewAccount> = accounts.into_iter().map(Into::into).collect();
        for account in &accounts {
            if !account.balance.is_finite() {
                return Err(ValidationError::InvalidValue {
                    field: "balance".to_string(),
                    reason: format!("balance for {} must be finite", account.owner),
                }
                .into());
            }
        }

        let mut conn = self.session()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sqlite)?;
        let mut ids = Vec::with_capacity(accounts.len());
        {
            let mut stmt = tx
                .prepare("INSERT INTO accounts (owner, balance) VALUES (?1, ?2)")
                .map_err(sqlite)?;
            for account in &accounts {
                stmt.execute(params![account.owner, account.balance])
                    .map_err(sqlite)?;
                ids.push(tx.last_insert_rowid());
            }
        }
        tx.commit().map_err(sqlite)?;

        tracing::info!(count = ids.len(), "Accounts loaded");
        Ok(ids)
    }

    pub fn get(&self, id: RowId) -> TallyResult<Option<Account>> {
        let conn = self.session()?;
        let account = conn
            .query_row(
                "SELECT id, owner, balance FROM accounts WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Account {
                        id: row.get(0)?,
                        owner: row.get(1)?,
                        balance: row.get(2)?,
                    })
                },
            )
            .optional()
            .map_err(sqlite)?;
        Ok(account)
    }

    pub fn balance(&self, id: RowId) -> TallyResult<Option<f64>> {
        let conn = self.session()?;
        read_balance(&conn, id).map_err(sqlite)
    }

    /// All accounts ordered by id.
    pub fn list(&self) -> TallyResult<Vec<Account>> {
        let conn = self.session()?;
        let mut stmt = conn
            .prepare("SELECT id, owner, balance FROM accounts ORDER BY id")
            .map_err(sqlite)?;
        let accounts = stmt
            .query_map([], |row| {
                Ok(Account {
                    id: row.get(0)?,
                    owner: row.get(1)?,
                    balance: row.get(2)?,
                })
            })
            .map_err(sqlite)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(sqlite)?;
        Ok(accounts)
    }

    /// Sum of all balances, `0.0` for an empty ledger.
    pub fn total_balance(&self) -> TallyResult<f64> {
        let conn = self.session()?;
        conn.query_row("SELECT TOTAL(balance) FROM accounts", [], |row| row.get(0))
            .map_err(sqlite)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tally_core::{StorageError, TallyError};
    use tempfile::TempDir;

    fn temp_ledger() -> (LedgerStore, TempDir) {
        let dir = TempDir::new().expect("failed to create temp dir");
        let ledger = LedgerStore::new(SessionFactory::new(
            dir.path().join("finance.db"),
            Duration::from_secs(1),
        ));
        (ledger, dir)
    }

    #[test]
    fn test_create_schema_creates_file_and_table() {
        let (ledger, _dir) = temp_ledger();
        ledger.create_schema().unwrap();

        assert!(ledger.sessions().path().exists());
        assert!(ledger.list().unwrap().is_empty());
        assert_eq!(ledger.total_balance().unwrap(), 0.0);
    }

    #[test]
    fn test_create_schema_twice_is_error() {
        let (ledger, _dir) = temp_ledger();
        ledger.create_schema().unwrap();

        let err = ledger.create_schema().unwrap_err();
        assert!(matches!(
            err,
            TallyError::Schema(SchemaError::TableExists { ref table }) if table == "accounts"
        ));
    }

    #[test]
    fn test_operations_before_schema_creation_fail() {
        let (ledger, _dir) = temp_ledger();
        let err = ledger.bulk_insert([("Alice", 1000.0)]).unwrap_err();
        assert!(matches!(err, TallyError::Storage(StorageError::Open { .. })));
    }

    #[test]
    fn test_bulk_insert_assigns_ids_in_order() {
        let (ledger, _dir) = temp_ledger();
        ledger.create_schema().unwrap();

        let ids = ledger
            .bulk_insert([("Alice", 1000.0), ("Bob", 500.0)])
            .unwrap();
        assert_eq!(ids, vec![1, 2]);

        let alice = ledger.get(1).unwrap().unwrap();
        assert_eq!(alice.owner, "Alice");
        assert_eq!(alice.balance, 1000.0);
        assert_eq!(ledger.balance(2).unwrap(), Some(500.0));
        assert_eq!(ledger.balance(3).unwrap(), None);
        assert_eq!(ledger.total_balance().unwrap(), 1500.0);
    }

    #[test]
    fn test_bulk_insert_empty_batch() {
        let (ledger, _dir) = temp_ledger();
        ledger.create_schema().unwrap();
        let ids = ledger.bulk_insert(Vec::<NewAccount>::new()).unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_bulk_insert_rejects_non_finite_balance_atomically() {
        let (ledger, _dir) = temp_ledger();
        ledger.create_schema().unwrap();

        let err = ledger
            .bulk_insert([("Alice", 10.0), ("Mallory", f64::NAN)])
            .unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)));
        assert!(ledger.list().unwrap().is_empty());
    }

    #[test]
    fn test_bulk_insert_is_all_or_nothing() {
        let (ledger, dir) = temp_ledger();
        ledger.create_schema().unwrap();

        // Reject a specific owner at the store level to force a mid-batch failure.
        let conn = Connection::open(dir.path().join("finance.db")).unwrap();
        conn.execute_batch(
            "CREATE TRIGGER no_mallory BEFORE INSERT ON accounts
             WHEN NEW.owner = 'Mallory'
             BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
        )
        .unwrap();
        drop(conn);

        let result = ledger.bulk_insert([("Alice", 1.0), ("Mallory", 2.0), ("Bob", 3.0)]);
        assert!(matches!(result, Err(TallyError::Storage(StorageError::Sqlite { .. }))));
        assert!(ledger.list().unwrap().is_empty());
    }
}
