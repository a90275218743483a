//! Delete-then-rollback probe for verifying the ledger's rollback guarantee.
//!
//! This is a verification tool, not a mutation path: the delete it issues is
//! always rolled back, and a crash mid-probe leaves an uncommitted transaction
//! that SQLite's journal recovery discards on the next open.

use rusqlite::{params, Connection, TransactionBehavior};
use tally_core::{ProbeReport, RowId, TallyResult};

use crate::error::sqlite;
use crate::ledger::{account_present, LedgerStore};

#[derive(Debug, Clone)]
pub struct RollbackSandbox {
    ledger: LedgerStore,
}

impl RollbackSandbox {
    pub fn new(ledger: LedgerStore) -> Self {
        Self { ledger }
    }

    /// Delete account `id` inside a transaction, roll back, and report whether
    /// the account is present again.
    pub fn probe_delete_and_revert(&self, id: RowId) -> TallyResult<bool> {
        Ok(self.probe(id)?.present_after)
    }

    /// Full observation of one probe.
    pub fn probe(&self, id: RowId) -> TallyResult<ProbeReport> {
        let mut conn = self.ledger.session()?;
        let existed_before = account_present(&conn, id).map_err(sqlite)?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sqlite)?;
        let observed = delete_and_observe(&tx, id);
        // Roll back whatever the delete did, including when it failed.
        tx.rollback().map_err(sqlite)?;
        let absent_during = observed?;

        let present_after = account_present(&conn, id).map_err(sqlite)?;
        let report = ProbeReport {
            existed_before,
            absent_during,
            present_after,
        };

        tracing::debug!(id, ?report, "Rollback probe finished");
        if existed_before && !present_after {
            tracing::error!(id, "Account missing after rollback");
        }
        Ok(report)
    }
}

fn delete_and_observe(conn: &Connection, id: RowId) -> TallyResult<bool> {
    conn.execute("DELETE FROM accounts WHERE id = ?1", params![id])
        .map_err(sqlite)?;
    Ok(!account_present(conn, id).map_err(sqlite)?)
}
