//! Transfer Engine
//!
//! Orchestrates a single transfer end-to-end: fail-fast validation, row
//! locks in canonical order, balance check, debit + credit, ledger
//! append, then commit - all inside one transaction. Any failure on any
//! step rolls the transaction back; the store is left exactly as found.
//!
//! The engine never retries on its own. `Store` errors are safe for the
//! caller to retry with backoff because rollback is guaranteed; every
//! other kind is a caller or invariant error.

mod phase;

pub use phase::TransferPhase;

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core_types::AccountId;
use crate::error::TransferError;
use crate::models::TransferRecord;
use crate::store::{AccountStore, TransferLedger};

/// The sole writer of account balances and ledger records.
///
/// Generic over the storage backend; see [`crate::store::MemoryStore`]
/// and [`crate::store::PgStore`].
pub struct TransferEngine<S> {
    store: Arc<S>,
}

impl<S> TransferEngine<S>
where
    S: AccountStore + TransferLedger,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Backend handle, for account creation and reporting reads.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Move `amount` minor units from `from` to `to` atomically.
    ///
    /// On success the debit, the credit and the [`TransferRecord`] became
    /// visible in one atomic step. On error nothing changed: locks are
    /// released and no partial write survives, including when the commit
    /// itself fails.
    pub async fn transfer(
        &self,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<TransferRecord, TransferError> {
        // Fail fast, no transaction opened and no lock held.
        debug!(phase = %TransferPhase::Validating, from, to, amount, "transfer requested");
        if from == to {
            return Err(TransferError::InvalidArgument("self-transfer"));
        }
        if amount <= 0 {
            return Err(TransferError::InvalidArgument("non-positive amount"));
        }

        let mut txn = self.store.begin().await?;

        match self.run_in_txn(&mut txn, from, to, amount).await {
            Ok(record) => {
                debug!(phase = %TransferPhase::Committing, transfer_id = %record.id, "committing");
                if let Err(err) = self.store.commit(txn).await {
                    // Commit failure: the store guarantees nothing was
                    // applied, so the caller may retry.
                    warn!(
                        phase = %TransferPhase::Aborted,
                        code = err.code(),
                        error = %err,
                        from, to, amount,
                        "commit failed, transfer aborted"
                    );
                    return Err(err);
                }
                info!(
                    phase = %TransferPhase::Done,
                    transfer_id = %record.id,
                    from, to, amount,
                    "transfer committed"
                );
                Ok(record)
            }
            Err(err) => {
                if let Err(rb_err) = self.store.rollback(txn).await {
                    warn!(error = %rb_err, "rollback reported an error");
                }
                warn!(
                    phase = %TransferPhase::Aborted,
                    code = err.code(),
                    error = %err,
                    from, to, amount,
                    "transfer aborted"
                );
                Err(err)
            }
        }
    }

    /// Steps 1-4 of the protocol, inside the open transaction. The
    /// caller owns commit/rollback, so every `?` here ends in rollback.
    async fn run_in_txn(
        &self,
        txn: &mut S::Txn,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<TransferRecord, TransferError> {
        // Canonical lock ordering: always lower account id first,
        // independent of transfer direction. Opposing transfers between
        // the same pair request locks in the same order and cannot
        // deadlock.
        let (first, second) = if from < to { (from, to) } else { (to, from) };
        debug!(phase = %TransferPhase::LockAcquisition, first, second, "acquiring row locks");
        let first_balance = self.store.lock_for_update(txn, first).await?;
        let second_balance = self.store.lock_for_update(txn, second).await?;

        let (from_balance, to_balance) = if first == from {
            (first_balance, second_balance)
        } else {
            (second_balance, first_balance)
        };

        debug!(phase = %TransferPhase::BalanceCheck, from_balance, amount, "checking funds");
        if from_balance < amount {
            return Err(TransferError::InsufficientFunds {
                account: from,
                available: from_balance,
                requested: amount,
            });
        }
        let credited = to_balance
            .checked_add(amount)
            .ok_or(TransferError::Overflow)?;

        debug!(phase = %TransferPhase::Applying, "writing balances");
        self.store.update_balance(txn, from, from_balance - amount).await?;
        self.store.update_balance(txn, to, credited).await?;

        debug!(phase = %TransferPhase::Auditing, "appending ledger record");
        self.store.append_transfer(txn, from, to, amount).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn engine() -> TransferEngine<MemoryStore> {
        TransferEngine::new(Arc::new(MemoryStore::default()))
    }

    #[tokio::test]
    async fn test_self_transfer_rejected_before_any_lock() {
        let engine = engine();
        let acct = engine.store().create_account(100).await.unwrap();

        let result = engine.transfer(acct.id, acct.id, 10).await;
        assert_eq!(
            result,
            Err(TransferError::InvalidArgument("self-transfer"))
        );
    }

    #[tokio::test]
    async fn test_non_positive_amount_rejected() {
        let engine = engine();
        let a = engine.store().create_account(100).await.unwrap();
        let b = engine.store().create_account(0).await.unwrap();

        for amount in [0, -1, -100] {
            let result = engine.transfer(a.id, b.id, amount).await;
            assert_eq!(
                result,
                Err(TransferError::InvalidArgument("non-positive amount")),
                "amount {amount} must be rejected"
            );
        }
    }

    #[tokio::test]
    async fn test_happy_path_moves_funds_and_records() {
        let engine = engine();
        let a = engine.store().create_account(1000).await.unwrap();
        let b = engine.store().create_account(0).await.unwrap();

        let record = engine.transfer(a.id, b.id, 100).await.unwrap();
        assert_eq!(record.from_account, a.id);
        assert_eq!(record.to_account, b.id);
        assert_eq!(record.amount, 100);

        assert_eq!(engine.store().balance_of(a.id).await.unwrap(), 900);
        assert_eq!(engine.store().balance_of(b.id).await.unwrap(), 100);
        assert_eq!(engine.store().ledger_len(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds_leaves_no_trace() {
        let engine = engine();
        let a = engine.store().create_account(50).await.unwrap();
        let b = engine.store().create_account(0).await.unwrap();

        let result = engine.transfer(a.id, b.id, 100).await;
        assert_eq!(
            result,
            Err(TransferError::InsufficientFunds {
                account: a.id,
                available: 50,
                requested: 100,
            })
        );

        assert_eq!(engine.store().balance_of(a.id).await.unwrap(), 50);
        assert_eq!(engine.store().balance_of(b.id).await.unwrap(), 0);
        assert_eq!(engine.store().ledger_len(), 0);
    }

    #[tokio::test]
    async fn test_unknown_account_is_not_found() {
        let engine = engine();
        let a = engine.store().create_account(100).await.unwrap();

        let result = engine.transfer(a.id, 9999, 10).await;
        assert_eq!(result, Err(TransferError::NotFound(9999)));
        assert_eq!(engine.store().balance_of(a.id).await.unwrap(), 100);

        let result = engine.transfer(9999, a.id, 10).await;
        assert_eq!(result, Err(TransferError::NotFound(9999)));
    }

    #[tokio::test]
    async fn test_credit_overflow_aborts_cleanly() {
        let engine = engine();
        let a = engine.store().create_account(100).await.unwrap();
        let b = engine.store().create_account(i64::MAX).await.unwrap();

        let result = engine.transfer(a.id, b.id, 1).await;
        assert_eq!(result, Err(TransferError::Overflow));

        assert_eq!(engine.store().balance_of(a.id).await.unwrap(), 100);
        assert_eq!(engine.store().balance_of(b.id).await.unwrap(), i64::MAX);
        assert_eq!(engine.store().ledger_len(), 0);
    }

    #[tokio::test]
    async fn test_drain_to_zero_is_allowed() {
        let engine = engine();
        let a = engine.store().create_account(100).await.unwrap();
        let b = engine.store().create_account(0).await.unwrap();

        engine.transfer(a.id, b.id, 100).await.unwrap();
        assert_eq!(engine.store().balance_of(a.id).await.unwrap(), 0);
        assert_eq!(engine.store().balance_of(b.id).await.unwrap(), 100);
    }
}
