//! Transfer Error Types
//!
//! The full error taxonomy of the engine and both storage backends.
//! Every error reaches the caller with its kind preserved; the engine
//! never downgrades a failure to a partial success.

use thiserror::Error;

use crate::core_types::AccountId;

/// Transfer error taxonomy.
///
/// `Store` is the only retriable kind: the engine guarantees no partial
/// effect occurred, so the caller may retry with the same parameters
/// (ideally with backoff). Everything else is a caller or invariant
/// error and must not be retried unchanged.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Malformed request: self-transfer, non-positive amount,
    /// negative initial balance.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// Referenced account does not exist.
    #[error("account {0} not found")]
    NotFound(AccountId),

    /// Business-rule violation: the source balance cannot cover the
    /// requested amount.
    #[error("insufficient funds in account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: AccountId,
        available: i64,
        requested: i64,
    },

    /// Crediting the destination would overflow its i64 balance.
    #[error("credit would overflow destination balance")]
    Overflow,

    /// A balance write was attempted without holding the row lock in the
    /// same transaction. Internal misuse, not a caller error.
    #[error("stale write on account {0}: row lock not held in this transaction")]
    StaleWrite(AccountId),

    /// I/O failure, lock-wait timeout, or commit failure.
    #[error("store error: {0}")]
    Store(String),
}

impl TransferError {
    /// Stable error code for logs and API surfaces.
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::InvalidArgument(_) => "INVALID_ARGUMENT",
            TransferError::NotFound(_) => "NOT_FOUND",
            TransferError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            TransferError::Overflow => "OVERFLOW",
            TransferError::StaleWrite(_) => "STALE_WRITE",
            TransferError::Store(_) => "STORE_ERROR",
        }
    }

    /// Whether the caller may retry the same request.
    ///
    /// Only `Store` qualifies: the transaction rolled back cleanly and
    /// the failure (I/O, lock-wait timeout, commit) may be transient.
    pub fn is_retriable(&self) -> bool {
        matches!(self, TransferError::Store(_))
    }
}

impl From<sqlx::Error> for TransferError {
    fn from(e: sqlx::Error) -> Self {
        TransferError::Store(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            TransferError::InvalidArgument("self-transfer").code(),
            "INVALID_ARGUMENT"
        );
        assert_eq!(TransferError::NotFound(42).code(), "NOT_FOUND");
        assert_eq!(
            TransferError::InsufficientFunds {
                account: 1,
                available: 50,
                requested: 100
            }
            .code(),
            "INSUFFICIENT_FUNDS"
        );
        assert_eq!(TransferError::Store("io".into()).code(), "STORE_ERROR");
    }

    #[test]
    fn test_only_store_errors_are_retriable() {
        assert!(TransferError::Store("lock wait timed out".into()).is_retriable());

        assert!(!TransferError::InvalidArgument("non-positive amount").is_retriable());
        assert!(!TransferError::NotFound(1).is_retriable());
        assert!(
            !TransferError::InsufficientFunds {
                account: 1,
                available: 0,
                requested: 1
            }
            .is_retriable()
        );
        assert!(!TransferError::Overflow.is_retriable());
        assert!(!TransferError::StaleWrite(1).is_retriable());
    }

    #[test]
    fn test_display() {
        let err = TransferError::InsufficientFunds {
            account: 3,
            available: 50,
            requested: 100,
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds in account 3: available 50, requested 100"
        );
    }
}
