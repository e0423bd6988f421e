//! Storage contract for the transfer engine
//!
//! Three seams, one per concern:
//!
//! - [`TransactionCoordinator`] - begin/commit/rollback boundaries. A
//!   transaction dropped without commit MUST roll back, so every exit
//!   path (early return, `?`, panic) leaves the store untouched.
//! - [`AccountStore`] - durable account rows with
//!   exclusive-read-for-update semantics.
//! - [`TransferLedger`] - the append-only audit trail, written inside
//!   the caller's transaction and visible only after commit.
//!
//! Two backends implement the full contract: [`MemoryStore`] (embedded,
//! per-row async mutexes) and [`PgStore`] (PostgreSQL, `SELECT ... FOR
//! UPDATE` row locks).

use async_trait::async_trait;

use crate::core_types::AccountId;
use crate::error::TransferError;
use crate::models::{Account, TransferRecord};

mod memory;
mod postgres;

pub use memory::{MemoryStore, MemoryTxn};
pub use postgres::{PgStore, PgTxn};

/// Default bound on how long a transaction waits for a contended row
/// lock before failing with a retriable store error.
pub const DEFAULT_LOCK_WAIT_MS: u64 = 5_000;

/// Transaction boundaries and the scoped-rollback discipline.
///
/// Implementations guarantee that a `Txn` dropped without an explicit
/// [`commit`](Self::commit) behaves exactly like a rollback: no staged
/// write becomes visible and all row locks are released.
#[async_trait]
pub trait TransactionCoordinator: Send + Sync {
    type Txn: Send;

    /// Open a new transaction.
    async fn begin(&self) -> Result<Self::Txn, TransferError>;

    /// Make every write of the transaction visible atomically.
    ///
    /// On failure the transaction is gone and none of its writes
    /// happened; the caller sees a retriable [`TransferError::Store`].
    async fn commit(&self, txn: Self::Txn) -> Result<(), TransferError>;

    /// Discard the transaction, releasing its row locks.
    async fn rollback(&self, txn: Self::Txn) -> Result<(), TransferError>;
}

/// Durable mapping from account id to balance.
#[async_trait]
pub trait AccountStore: TransactionCoordinator {
    /// Create an account with the given non-negative opening balance.
    ///
    /// Fails with [`TransferError::InvalidArgument`] when
    /// `initial_balance < 0`.
    async fn create_account(&self, initial_balance: i64) -> Result<Account, TransferError>;

    /// Acquire an exclusive lock on the account row within `txn` and
    /// return its current balance.
    ///
    /// Blocks while another transaction holds the lock, bounded by the
    /// backend's lock-wait timeout (timeout surfaces as a retriable
    /// [`TransferError::Store`]). Unknown ids fail with
    /// [`TransferError::NotFound`].
    async fn lock_for_update(
        &self,
        txn: &mut Self::Txn,
        id: AccountId,
    ) -> Result<i64, TransferError>;

    /// Write a new balance for an account locked earlier in `txn`.
    ///
    /// Fails with [`TransferError::StaleWrite`] if the row lock is not
    /// held in this transaction (defensive check), and rejects negative
    /// balances outright.
    async fn update_balance(
        &self,
        txn: &mut Self::Txn,
        id: AccountId,
        new_balance: i64,
    ) -> Result<(), TransferError>;

    /// Committed balance read, outside any write transaction.
    /// Reporting and verification only.
    async fn balance_of(&self, id: AccountId) -> Result<i64, TransferError>;
}

/// Append-only record of completed transfers.
#[async_trait]
pub trait TransferLedger: TransactionCoordinator {
    /// Stage one immutable record inside the caller's transaction.
    ///
    /// `amount` is validated by the engine before any lock is taken and
    /// re-validated here defensively.
    async fn append_transfer(
        &self,
        txn: &mut Self::Txn,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<TransferRecord, TransferError>;

    /// Committed transfers touching the account, oldest first.
    /// Reporting only; not part of the write path.
    async fn transfers_for_account(
        &self,
        id: AccountId,
    ) -> Result<Vec<TransferRecord>, TransferError>;
}
