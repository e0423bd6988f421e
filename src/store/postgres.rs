//! PostgreSQL store
//!
//! Row locks come from `SELECT ... FOR UPDATE`; the lock-wait bound is
//! enforced with `SET LOCAL lock_timeout`, so a stuck peer transaction
//! surfaces as a retriable store error instead of blocking forever.
//! Dropping an uncommitted `sqlx` transaction rolls it back, which gives
//! the same scoped-rollback discipline as the embedded backend.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::debug;
use ulid::Ulid;

use super::{AccountStore, DEFAULT_LOCK_WAIT_MS, TransactionCoordinator, TransferLedger};
use crate::core_types::AccountId;
use crate::error::TransferError;
use crate::models::{Account, TransferRecord};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts_tb (
    account_id  BIGSERIAL PRIMARY KEY,
    balance     BIGINT NOT NULL CHECK (balance >= 0),
    created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS transfers_tb (
    transfer_id      TEXT PRIMARY KEY,
    from_account_id  BIGINT NOT NULL REFERENCES accounts_tb (account_id),
    to_account_id    BIGINT NOT NULL REFERENCES accounts_tb (account_id),
    amount           BIGINT NOT NULL CHECK (amount > 0),
    created_at       TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_transfers_from ON transfers_tb (from_account_id);
CREATE INDEX IF NOT EXISTS idx_transfers_to   ON transfers_tb (to_account_id);
"#;

/// PostgreSQL backend implementing the full storage contract.
pub struct PgStore {
    pool: PgPool,
    lock_wait: Duration,
}

/// One open transaction against a [`PgStore`].
///
/// `locked` tracks which rows this transaction has taken `FOR UPDATE`,
/// backing the stale-write check.
pub struct PgTxn {
    tx: Transaction<'static, Postgres>,
    locked: HashSet<AccountId>,
}

impl PgStore {
    /// Wrap an existing pool with the default lock-wait bound.
    pub fn new(pool: PgPool) -> Self {
        Self::with_lock_wait(pool, Duration::from_millis(DEFAULT_LOCK_WAIT_MS))
    }

    /// Wrap an existing pool with an explicit lock-wait bound.
    pub fn with_lock_wait(pool: PgPool, lock_wait: Duration) -> Self {
        Self { pool, lock_wait }
    }

    /// Create the accounts and transfers tables if missing.
    pub async fn ensure_schema(&self) -> Result<(), TransferError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TransactionCoordinator for PgStore {
    type Txn = PgTxn;

    async fn begin(&self) -> Result<PgTxn, TransferError> {
        let mut tx = self.pool.begin().await?;

        // Bound every row-lock wait in this transaction.
        let stmt = format!("SET LOCAL lock_timeout = '{}ms'", self.lock_wait.as_millis());
        sqlx::query(&stmt).execute(&mut *tx).await?;

        Ok(PgTxn {
            tx,
            locked: HashSet::new(),
        })
    }

    async fn commit(&self, txn: PgTxn) -> Result<(), TransferError> {
        txn.tx.commit().await?;
        debug!("pg txn committed");
        Ok(())
    }

    async fn rollback(&self, txn: PgTxn) -> Result<(), TransferError> {
        txn.tx.rollback().await?;
        debug!("pg txn rolled back");
        Ok(())
    }
}

#[async_trait]
impl AccountStore for PgStore {
    async fn create_account(&self, initial_balance: i64) -> Result<Account, TransferError> {
        if initial_balance < 0 {
            return Err(TransferError::InvalidArgument("negative initial balance"));
        }

        let row = sqlx::query(
            r#"INSERT INTO accounts_tb (balance) VALUES ($1)
               RETURNING account_id, created_at"#,
        )
        .bind(initial_balance)
        .fetch_one(&self.pool)
        .await?;

        let id = row.get::<i64, _>("account_id") as AccountId;
        debug!(account = id, balance = initial_balance, "account created");
        Ok(Account {
            id,
            balance: initial_balance,
            created_at: row.get("created_at"),
        })
    }

    async fn lock_for_update(
        &self,
        txn: &mut PgTxn,
        id: AccountId,
    ) -> Result<i64, TransferError> {
        let row = sqlx::query(
            r#"SELECT balance FROM accounts_tb WHERE account_id = $1 FOR UPDATE"#,
        )
        .bind(id as i64)
        .fetch_optional(&mut *txn.tx)
        .await?
        .ok_or(TransferError::NotFound(id))?;

        txn.locked.insert(id);
        Ok(row.get("balance"))
    }

    async fn update_balance(
        &self,
        txn: &mut PgTxn,
        id: AccountId,
        new_balance: i64,
    ) -> Result<(), TransferError> {
        if !txn.locked.contains(&id) {
            return Err(TransferError::StaleWrite(id));
        }
        if new_balance < 0 {
            return Err(TransferError::InvalidArgument("negative balance write"));
        }

        let result = sqlx::query(r#"UPDATE accounts_tb SET balance = $1 WHERE account_id = $2"#)
            .bind(new_balance)
            .bind(id as i64)
            .execute(&mut *txn.tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TransferError::NotFound(id));
        }
        Ok(())
    }

    async fn balance_of(&self, id: AccountId) -> Result<i64, TransferError> {
        let row = sqlx::query(r#"SELECT balance FROM accounts_tb WHERE account_id = $1"#)
            .bind(id as i64)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(TransferError::NotFound(id))?;

        Ok(row.get("balance"))
    }
}

#[async_trait]
impl TransferLedger for PgStore {
    async fn append_transfer(
        &self,
        txn: &mut PgTxn,
        from: AccountId,
        to: AccountId,
        amount: i64,
    ) -> Result<TransferRecord, TransferError> {
        if amount <= 0 {
            return Err(TransferError::InvalidArgument("non-positive amount"));
        }

        let id = Ulid::new();
        let row = sqlx::query(
            r#"INSERT INTO transfers_tb (transfer_id, from_account_id, to_account_id, amount)
               VALUES ($1, $2, $3, $4)
               RETURNING created_at"#,
        )
        .bind(id.to_string())
        .bind(from as i64)
        .bind(to as i64)
        .bind(amount)
        .fetch_one(&mut *txn.tx)
        .await?;

        Ok(TransferRecord {
            id,
            from_account: from,
            to_account: to,
            amount,
            created_at: row.get("created_at"),
        })
    }

    async fn transfers_for_account(
        &self,
        id: AccountId,
    ) -> Result<Vec<TransferRecord>, TransferError> {
        let rows = sqlx::query(
            r#"SELECT transfer_id, from_account_id, to_account_id, amount, created_at
               FROM transfers_tb
               WHERE from_account_id = $1 OR to_account_id = $1
               ORDER BY created_at ASC"#,
        )
        .bind(id as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}

fn row_to_record(row: &sqlx::postgres::PgRow) -> Result<TransferRecord, TransferError> {
    let id_str: String = row.get("transfer_id");
    let id: Ulid = id_str
        .parse()
        .map_err(|_| TransferError::Store(format!("invalid transfer_id in ledger: {id_str}")))?;

    let created_at: DateTime<Utc> = row.get("created_at");

    Ok(TransferRecord {
        id,
        from_account: row.get::<i64, _>("from_account_id") as AccountId,
        to_account: row.get::<i64, _>("to_account_id") as AccountId,
        amount: row.get("amount"),
        created_at,
    })
}
