//! Row types for the catalog and ledger stores

use serde::{Deserialize, Serialize};

/// Integer row identity, unique and stable for the row's lifetime.
pub type RowId = i64;

/// A row of the introspected table, read through its [`crate::RoleMap`].
///
/// The table is populated outside this crate, so every column but the
/// identity may hold NULL; those read back as `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RowId,
    pub primary_text: Option<String>,
    pub secondary_text: Option<String>,
    pub ordering: Option<i64>,
    pub quantity: Option<i64>,
}

/// Values for a row about to be inserted. The identity is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRecord {
    pub primary_text: String,
    pub secondary_text: Option<String>,
    pub ordering: i64,
    pub quantity: i64,
}

impl NewRecord {
    pub fn new(
        primary_text: impl Into<String>,
        secondary_text: impl Into<String>,
        ordering: i64,
        quantity: i64,
    ) -> Self {
        Self {
            primary_text: primary_text.into(),
            secondary_text: Some(secondary_text.into()),
            ordering,
            quantity,
        }
    }
}

/// A ledger row. Balances carry no currency unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: RowId,
    pub owner: String,
    pub balance: f64,
}

/// An account about to be loaded into the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub owner: String,
    pub balance: f64,
}

impl NewAccount {
    pub fn new(owner: impl Into<String>, balance: f64) -> Self {
        Self {
            owner: owner.into(),
            balance,
        }
    }
}

impl<S: Into<String>> From<(S, f64)> for NewAccount {
    fn from((owner, balance): (S, f64)) -> Self {
        Self::new(owner, balance)
    }
}

/// Result of a transfer attempt. Only `Applied` mutates the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferOutcome {
    Applied,
    SenderMissing,
    InsufficientFunds,
    ReceiverMissing,
}

impl TransferOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, TransferOutcome::Applied)
    }
}

/// What a delete-then-rollback probe observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProbeReport {
    /// Row was present before the transaction began.
    pub existed_before: bool,
    /// Row was absent inside the transaction after the delete.
    pub absent_during: bool,
    /// Row was present again after rollback.
    pub present_after: bool,
}

impl ProbeReport {
    /// The store deleted the row and then fully restored it.
    pub fn rollback_verified(&self) -> bool {
        self.existed_before && self.absent_during && self.present_after
    }
}
