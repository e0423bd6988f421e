//! Embedded in-process store
//!
//! Per-account row locks are `tokio::sync::Mutex`es held for the life of
//! the owning transaction. Balance writes and ledger appends are staged
//! in the transaction and applied at commit while the row guards are
//! still held, so no other transaction can observe an intermediate
//! state. Dropping a transaction without commit releases the guards and
//! discards the staging - rollback is the default exit.
//!
//! A small fault plan allows tests to fail the next balance write,
//! ledger append, or commit, to verify that nothing leaks out of an
//! aborted transaction.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use super::{AccountStore, DEFAULT_LOCK_WAIT_MS, TransactionCoordinator, TransferLedger};
use crate::core_types::AccountId;
use crate::error::TransferError;
use crate::models::{Account, TransferRecord};

struct AccountRow {
    balance: Arc<AsyncMutex<i64>>,
    created_at: DateTime<Utc>,
}

/// Fault switches for atomicity tests, modeled after the usual
/// mock-adapter `set_fail_*` toggles. Each switch fires once.
#[derive(Debug, Default)]
struct FaultPlan {
    fail_next_update: bool,
    fail_next_append: bool,
    fail_next_commit: bool,
}

/// In-process backend implementing the full storage contract.
pub struct MemoryStore {
    accounts: DashMap<AccountId, AccountRow>,
    ledger: std::sync::Mutex<Vec<TransferRecord>>,
    next_account_id: AtomicU64,
    lock_wait: Duration,
    faults: std::sync::Mutex<FaultPlan>,
}

/// One open transaction against a [`MemoryStore`].
///
/// Holds the owned row guards; dropping this value releases them and
/// discards every staged write.
pub struct MemoryTxn {
    locks: HashMap<AccountId, OwnedMutexGuard<i64>>,
    staged_balances: HashMap<AccountId, i64>,
    staged_records: Vec<TransferRecord>,
}

impl MemoryStore {
    /// Create a store with the given lock-wait bound.
    pub fn new(lock_wait: Duration) -> Self {
        Self {
            accounts: DashMap::new(),
            ledger: std::sync::Mutex::new(Vec::new()),
            next_account_id: AtomicU64::new(0),
            lock_wait,
            faults: std::sync::Mutex::new(FaultPlan::default()),
        }
    }

    /// Fail the next `update_balance` call with a store error.
    pub fn set_fail_next_update(&self) {
        self.faults.lock().unwrap().fail_next_update = true;
    }

    /// Fail the next `append_transfer` call with a store error.
    pub fn set_fail_next_append(&self) {
        self.faults.lock().unwrap().fail_next_append = true;
    }

    /// Fail the next `commit` call with a store error.
    pub fn set_fail_next_commit(&self) {
        self.faults.lock().unwrap().fail_next_commit = true;
    }

    /// Number of committed ledger records.
    pub fn ledger_len(&self) -> usize {
        self.ledger.lock().unwrap().len()
    }

    /// Committed view of one account row. Reporting only.
    pub async fn account(&self, id: AccountId) -> Result<Account, TransferError> {
        let (balance, created_at) = {
            let row = self.accounts.get(&id).ok_or(TransferError::NotFound(id))?;
            (row.balance.clone(), row.created_at)
        };
        Ok(Account {
            id,
            balance: *balance.lock().await,
            created_at,
        })
    }

    fn take_fault(&self, pick: impl FnOnce(&mut FaultPlan) -> &mut bool) -> bool {
        let mut plan = self.faults.lock().unwrap();
        let flag = pick(&mut *plan);
        std::mem::take(flag)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_LOCK_WAIT_MS))
    }
}

#[async_trait]
impl TransactionCoordinator for MemoryStore {
    type Txn = MemoryTxn;

    async fn begin(&self) -> Result<MemoryTxn, TransferError> {
        Ok(MemoryTxn {
            locks: HashMap::new(),
            staged_balances: HashMap::new(),
            staged_records: Vec::new(),
        })
    }

    async fn commit(&self, txn: MemoryTxn) -> Result<(), TransferError> {
        if self.take_fault(|p| &mut p.fail_next_commit) {
            // Dropping txn here releases the guards with nothing applied.
            return Err(TransferError::Store("injected commit failure".into()));
        }

        let MemoryTxn {
            mut locks,
            staged_balances,
            staged_records,
        } = txn;

        // Staged writes only exist for rows whose guard is held; verify
        // before applying anything so a violation aborts cleanly.
        for id in staged_balances.keys() {
            if !locks.contains_key(id) {
                return Err(TransferError::StaleWrite(*id));
            }
        }

        for (id, new_balance) in &staged_balances {
            if let Some(guard) = locks.get_mut(id) {
                **guard = *new_balance;
            }
        }

        let record_count = staged_records.len();
        if record_count > 0 {
            self.ledger.lock().unwrap().extend(staged_records);
        }

        debug!(
            balances = staged_balances.len(),
            records = record_count,
            "memory txn committed"
        );
        Ok(())
    }

    async fn rollback(&self, txn: MemoryTxn) -> Result<(), TransferError> {
        debug!(
            balances = txn.staged_balances.len(),
            records = txn.staged_records.len(),
            "memory txn rolled back"
        );
        drop(txn);
        Ok(())
    }
}

#[async_trait]
impl AccountStore for MemoryStore {
    async fn create_account(&self, initial_balance: i64) -> Result<Account, TransferError> {
        if initial_balance < 0 {
            return Err(TransferError::InvalidArgument("negative initial balance"));
        }

        let id = self.next_account_id.fetch_add(1, Ordering::Relaxed) + 1;
        let created_at = Utc::now();
        self.accounts.insert(
            id,
            AccountRow {
                balance: Arc::new(AsyncMutex::new(initial_balance)),
                created_at,
            },
        );

        debug!(account = id, balance = initial_balance, "account created");
        Ok(Account {
            id,
            balance: initial_balance,
            created_at,
        })
    }

    async fn lock_for_update(
        &self,
        txn: &mut MemoryTxn,
        id: AccountId,
    ) -> Result<i64, TransferError> {
        // Re-entrant within the same transaction: the guard is already
        // ours, report the staged view of the balance.
        if let Some(guard) = txn.locks.get(&id) {
            return Ok(*txn.staged_balances.get(&id).unwrap_or(&**guard));
        }

        let balance = self
            .accounts
            .get(&id)
            .map(|row| row.balance.clone())
            .ok_or(TransferError::NotFound(id))?;

        let guard = tokio::time::timeout(self.lock_wait, balance.lock_owned())
            .await
            .map_err(|_| {
                TransferError::Store(format!("lock wait timed out for account {id}"))
            })?;

        let current = *guard;
        txn.locks.insert(id, guard);
        Ok(current)
    }

    async fn update_balance(
        &self,
        txn: &mut MemoryTxn,
        id: AccountId,
        new_balance: i64,
    ) -> Result<(), TransferError> {
        if self.take_fault(|p| &mut p.fail_next_update) {
            return Err(TransferError::Store("injected write failure".into()));
        }
        if !txn.locks.contains_key(&id) {
            return Err(TransferError::StaleWrite(id));
        }
        if new_balance < 0 {
            return Err(TransferError::InvalidArgument("negative balance write"));
        }

        txn.staged_balances.insert(id, new_balance);
        Ok(())
    }

    async fn balance_of(&self, id: AccountId) -> Result<i64, TransferError> {
        let balance = self
            .accounts
            .get(&id)
            .map(|row| row.balance.clone())
            .ok_or(TransferError::NotFound(id))?;

        // Waits out any in-flight writer, then reads the committed value.
        Ok(*balance.lock().await)
    }
}

#[async_trait]
impl TransferLedger for MemoryStore {
    async fn append_transfer(
        &self,
        txn: &mut MemoryTxn,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<TransferRecord, TransferError> {
        if self.take_fault(|p| &mut p.fail_next_append) {
            return Err(TransferError::Store("injected append failure".into()));
        }
        if amount <= 0 {
            return Err(TransferError::InvalidArgument("non-positive amount"));
        }

        let record = TransferRecord::new(from, to, amount);
        txn.staged_records.push(record.clone());
        Ok(record)
    }

    async fn transfers_for_account(
        &self,
        id: AccountId,
    ) -> Result<Vec<TransferRecord>, TransferError> {
        let ledger = self.ledger.lock().unwrap();
        Ok(ledger
            .iter()
            .filter(|r| r.from_account == id || r.to_account == id)
            .cloned()
            .collect())
    }
}
