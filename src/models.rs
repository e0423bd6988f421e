//! Account and TransferRecord data model
//!
//! `TransferRecord` is the append-only audit trail: created exactly once
//! per successful transfer, in the same atomic unit as the balance
//! mutation, and never updated or deleted afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::core_types::{AccountId, TransferId};

/// A single account row.
///
/// `balance` is a signed integer in minor currency units (no floating
/// point). Invariant: `balance >= 0` at every transaction boundary. The
/// balance is mutated only inside a [`crate::engine::TransferEngine`]
/// transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}

/// One committed transfer between two distinct accounts.
///
/// Exists if and only if the corresponding balance mutation committed;
/// both are written within the same atomic unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub id: TransferId,
    pub from_account: AccountId,
    pub to_account: AccountId,
    /// Always positive, in minor units.
    pub amount: i64,
    /// Stamped when the record is written inside the committing
    /// transaction; visible to other transactions only after commit.
    pub created_at: DateTime<Utc>,
}

impl TransferRecord {
    /// Build a new record with a fresh ULID and the current timestamp.
    ///
    /// Callers are the storage backends only; the record stays staged
    /// inside the transaction until commit.
    pub fn new(from_account: AccountId, to_account: AccountId, amount: i64) -> Self {
        Self {
            id: Ulid::new(),
            from_account,
            to_account,
            amount,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_ids_are_unique() {
        let a = TransferRecord::new(1, 2, 100);
        let b = TransferRecord::new(1, 2, 100);

        assert_ne!(a.id, b.id);
        // the ULID timestamp component never goes backwards
        assert!(b.id.timestamp_ms() >= a.id.timestamp_ms());
    }

    #[test]
    fn test_record_carries_parties_and_amount() {
        let rec = TransferRecord::new(7, 9, 250);
        assert_eq!(rec.from_account, 7);
        assert_eq!(rec.to_account, 9);
        assert_eq!(rec.amount, 250);
    }
}
