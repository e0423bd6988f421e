//! Transfer call state machine
//!
//! Every `Transfer` call walks `Validating → LockAcquisition →
//! BalanceCheck → Applying → Auditing → Committing → Done`, with
//! `Aborted` reachable from any non-terminal phase on error. Exactly one
//! of the two terminal phases is reached per call.

use std::fmt;

/// Phases of a single transfer call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferPhase {
    /// Preconditions checked fail-fast, no lock held
    Validating,

    /// Row locks taken in canonical ascending-id order
    LockAcquisition,

    /// Source balance read and compared against the amount,
    /// both locks held
    BalanceCheck,

    /// Debit and credit written inside the transaction
    Applying,

    /// Ledger record appended inside the same transaction
    Auditing,

    /// Atomic commit in flight
    Committing,

    /// Terminal: balances and ledger record visible to everyone
    Done,

    /// Terminal: transaction rolled back, store untouched
    Aborted,
}

impl TransferPhase {
    /// Check if this is a terminal phase (no more transitions possible)
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self, TransferPhase::Done | TransferPhase::Aborted)
    }

    /// Get human-readable phase name
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPhase::Validating => "VALIDATING",
            TransferPhase::LockAcquisition => "LOCK_ACQUISITION",
            TransferPhase::BalanceCheck => "BALANCE_CHECK",
            TransferPhase::Applying => "APPLYING",
            TransferPhase::Auditing => "AUDITING",
            TransferPhase::Committing => "COMMITTING",
            TransferPhase::Done => "DONE",
            TransferPhase::Aborted => "ABORTED",
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_phases() {
        assert!(TransferPhase::Done.is_terminal());
        assert!(TransferPhase::Aborted.is_terminal());

        assert!(!TransferPhase::Validating.is_terminal());
        assert!(!TransferPhase::LockAcquisition.is_terminal());
        assert!(!TransferPhase::BalanceCheck.is_terminal());
        assert!(!TransferPhase::Applying.is_terminal());
        assert!(!TransferPhase::Auditing.is_terminal());
        assert!(!TransferPhase::Committing.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(TransferPhase::Validating.to_string(), "VALIDATING");
        assert_eq!(TransferPhase::LockAcquisition.to_string(), "LOCK_ACQUISITION");
        assert_eq!(TransferPhase::Done.to_string(), "DONE");
        assert_eq!(TransferPhase::Aborted.to_string(), "ABORTED");
    }
}
