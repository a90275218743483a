//! Atomic balance transfers between two ledger accounts.
//!
//! The whole read-check-write sequence runs inside one IMMEDIATE transaction,
//! so SQLite's single-writer lock serializes concurrent transfers and the
//! sufficiency check can never act on a stale balance.

use rusqlite::{params, TransactionBehavior};
use tally_core::{RowId, StorageError, TallyResult, TransferOutcome, ValidationError};

use crate::error::sqlite;
use crate::ledger::{account_present, read_balance, LedgerStore};

/// Moves balance between accounts of one [`LedgerStore`].
#[derive(Debug, Clone)]
pub struct TransferEngine {
    ledger: LedgerStore,
}

impl TransferEngine {
    pub fn new(ledger: LedgerStore) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &LedgerStore {
        &self.ledger
    }

    /// Transfer `amount` from `from_id` to `to_id`.
    ///
    /// Returns `true` when the transfer was applied, `false` when the sender or
    /// receiver is missing or the sender's balance is below `amount`. A balance
    /// exactly equal to `amount` is sufficient.
    ///
    /// # Errors
    ///
    /// `ValidationError::InvalidAmount` for negative or non-finite amounts;
    /// storage errors from the ledger.
    pub fn transfer(&self, from_id: RowId, to_id: RowId, amount: f64) -> TallyResult<bool> {
        Ok(self.try_transfer(from_id, to_id, amount)?.is_applied())
    }

    /// Same as [`TransferEngine::transfer`], reporting why a transfer was not
    /// applied.
    pub fn try_transfer(
        &self,
        from_id: RowId,
        to_id: RowId,
        amount: f64,
    ) -> TallyResult<TransferOutcome> {
        validate_amount(amount)?;

        let mut conn = self.ledger.session()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(sqlite)?;

        let outcome = match read_balance(&tx, from_id).map_err(sqlite)? {
            None => TransferOutcome::SenderMissing,
            Some(balance) if balance < amount => TransferOutcome::InsufficientFunds,
            Some(_) => {
                if account_present(&tx, to_id).map_err(sqlite)? {
                    TransferOutcome::Applied
                } else {
                    TransferOutcome::ReceiverMissing
                }
            }
        };

        if !outcome.is_applied() {
            // Dropping the transaction rolls it back; nothing was written.
            tracing::warn!(from_id, to_id, amount, ?outcome, "Transfer rejected");
            return Ok(outcome);
        }

        let debited = tx.execute(
            "UPDATE accounts SET balance = balance - ?1 WHERE id = ?2",
            params![amount, from_id],
        )
        .map_err(sqlite)?;
        let credited = tx.execute(
            "UPDATE accounts SET balance = balance + ?1 WHERE id = ?2",
            params![amount, to_id],
        )
        .map_err(sqlite)?;
        if debited != 1 || credited != 1 {
            return Err(StorageError::TransactionFailed {
                reason: format!(
                    "transfer {from_id} -> {to_id} touched {debited} sender and {credited} receiver rows"
                ),
            }
            .into());
        }
        tx.commit().map_err(sqlite)?;

        tracing::info!(from_id, to_id, amount, "Transfer applied");
        Ok(TransferOutcome::Applied)
    }
}

fn validate_amount(amount: f64) -> Result<(), ValidationError> {
    if !amount.is_finite() {
        return Err(ValidationError::InvalidAmount {
            amount,
            reason: "must be finite".to_string(),
        });
    }
    if amount < 0.0 {
        return Err(ValidationError::InvalidAmount {
            amount,
            reason: "must be non-negative; reverse the endpoints instead".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionFactory;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;
    use tally_core::TallyError;
    use tempfile::TempDir;

    fn funded_engine(accounts: &[(&str, f64)]) -> (TransferEngine, Vec<RowId>, TempDir) {
        let dir = TempDir::new().expect("failed to create temp dir");
        let ledger = LedgerStore::new(SessionFactory::new(
            dir.path().join("finance.db"),
            Duration::from_secs(10),
        ));
        ledger.create_schema().expect("schema");
        let ids = ledger
            .bulk_insert(accounts.iter().map(|(o, b)| (*o, *b)))
            .expect("seed accounts");
        (TransferEngine::new(ledger), ids, dir)
    }

    #[test]
    fn test_transfer_moves_balance() {
        let (engine, ids, _dir) = funded_engine(&[("Alice", 1000.0), ("Bob", 500.0)]);
        assert!(engine.transfer(ids[0], ids[1], 100.0).unwrap());

        let ledger = engine.ledger();
        assert_eq!(ledger.balance(ids[0]).unwrap(), Some(900.0));
        assert_eq!(ledger.balance(ids[1]).unwrap(), Some(600.0));
    }

    #[test]
    fn test_transfer_exact_balance_leaves_zero() {
        let (engine, ids, _dir) = funded_engine(&[("Alice", 250.5), ("Bob", 0.0)]);
        assert!(engine.transfer(ids[0], ids[1], 250.5).unwrap());
        assert_eq!(engine.ledger().balance(ids[0]).unwrap(), Some(0.0));
        assert_eq!(engine.ledger().balance(ids[1]).unwrap(), Some(250.5));
    }

    #[test]
    fn test_transfer_insufficient_funds() {
        let (engine, ids, _dir) = funded_engine(&[("Alice", 50.0), ("Bob", 500.0)]);
        assert_eq!(
            engine.try_transfer(ids[0], ids[1], 50.01).unwrap(),
            TransferOutcome::InsufficientFunds
        );
        assert_eq!(engine.ledger().balance(ids[0]).unwrap(), Some(50.0));
        assert_eq!(engine.ledger().balance(ids[1]).unwrap(), Some(500.0));
    }

    #[test]
    fn test_transfer_missing_sender() {
        let (engine, ids, _dir) = funded_engine(&[("Bob", 500.0)]);
        assert_eq!(
            engine.try_transfer(42, ids[0], 1.0).unwrap(),
            TransferOutcome::SenderMissing
        );
        assert!(!engine.transfer(42, ids[0], 1.0).unwrap());
        assert_eq!(engine.ledger().balance(ids[0]).unwrap(), Some(500.0));
    }

    #[test]
    fn test_transfer_missing_receiver() {
        let (engine, ids, _dir) = funded_engine(&[("Alice", 1000.0)]);
        assert_eq!(
            engine.try_transfer(ids[0], 42, 100.0).unwrap(),
            TransferOutcome::ReceiverMissing
        );
        assert_eq!(engine.ledger().balance(ids[0]).unwrap(), Some(1000.0));
    }

    #[test]
    fn test_transfer_rejects_negative_amount() {
        let (engine, ids, _dir) = funded_engine(&[("Alice", 1000.0), ("Bob", 500.0)]);
        let err = engine.transfer(ids[0], ids[1], -10.0).unwrap_err();
        assert!(matches!(
            err,
            TallyError::Validation(ValidationError::InvalidAmount { .. })
        ));
        assert_eq!(engine.ledger().balance(ids[1]).unwrap(), Some(500.0));
    }

    #[test]
    fn test_transfer_rejects_non_finite_amount() {
        let (engine, ids, _dir) = funded_engine(&[("Alice", 1000.0), ("Bob", 500.0)]);
        assert!(engine.transfer(ids[0], ids[1], f64::NAN).is_err());
        assert!(engine.transfer(ids[0], ids[1], f64::INFINITY).is_err());
    }

    #[test]
    fn test_transfer_zero_amount_applies_without_change() {
        let (engine, ids, _dir) = funded_engine(&[("Alice", 10.0), ("Bob", 5.0)]);
        assert!(engine.transfer(ids[0], ids[1], 0.0).unwrap());
        assert_eq!(engine.ledger().total_balance().unwrap(), 15.0);
    }

    #[test]
    fn test_self_transfer_keeps_balance() {
        let (engine, ids, _dir) = funded_engine(&[("Alice", 10.0)]);
        assert!(engine.transfer(ids[0], ids[0], 10.0).unwrap());
        assert!(!engine.transfer(ids[0], ids[0], 10.5).unwrap());
        assert_eq!(engine.ledger().balance(ids[0]).unwrap(), Some(10.0));
    }

    #[test]
    fn test_concurrent_transfers_never_overdraw() {
        let (engine, ids, _dir) = funded_engine(&[("Alice", 100.0), ("Bob", 0.0), ("Carol", 0.0)]);
        let engine = Arc::new(engine);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let engine = Arc::clone(&engine);
                let to = ids[1 + (i % 2)];
                let from = ids[0];
                thread::spawn(move || {
                    (0..15)
                        .filter(|_| engine.transfer(from, to, 5.0).expect("transfer"))
                        .count()
                })
            })
            .collect();

        let applied: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        // 60 attempts against a balance that covers exactly 20
        assert_eq!(applied, 20);
        let ledger = engine.ledger();
        assert_eq!(ledger.balance(ids[0]).unwrap(), Some(0.0));
        assert_eq!(ledger.total_balance().unwrap(), 100.0);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// The pair's total balance is invariant across any transfer, applied
        /// or not.
        #[test]
        fn prop_transfer_conserves_pair_total(
            sender in 0u32..10_000,
            receiver in 0u32..10_000,
            amount in 0u32..12_000,
        ) {
            let (sender, receiver, amount) = (sender as f64, receiver as f64, amount as f64);
            let (engine, ids, _dir) = funded_engine(&[("A", sender), ("B", receiver)]);

            let applied = engine.transfer(ids[0], ids[1], amount).unwrap();
            let a = engine.ledger().balance(ids[0]).unwrap().unwrap();
            let b = engine.ledger().balance(ids[1]).unwrap().unwrap();

            prop_assert_eq!(applied, amount <= sender);
            prop_assert_eq!(a + b, sender + receiver);
            if applied {
                prop_assert_eq!(a, sender - amount);
                prop_assert_eq!(b, receiver + amount);
            } else {
                prop_assert_eq!(a, sender);
                prop_assert_eq!(b, receiver);
            }
        }
    }
}
