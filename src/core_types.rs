//! Core types used throughout the system
//!
//! These are fundamental type aliases used by all modules.
//! They provide semantic meaning and enable future type evolution.

/// Account ID - globally unique, immutable after assignment.
///
/// # Constraints:
/// - **Non-reusable**: Once assigned, never recycled, even after the
///   account stops transacting
/// - **Totally ordered**: The ascending-id order is the canonical lock
///   acquisition order for multi-account transactions
pub type AccountId = u64;

/// Transfer ID - unique identifier of one committed transfer.
///
/// ULIDs are monotonically creatable and lexicographically sortable,
/// which keeps the audit trail naturally ordered by creation time.
pub type TransferId = ulid::Ulid;
