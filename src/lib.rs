//! minledger - Atomic Funds-Transfer Engine
//!
//! Moves value between account balances stored in a transactional ledger,
//! guaranteeing correctness under concurrent access and partial failure.
//!
//! # Modules
//!
//! - [`core_types`] - Core type aliases (AccountId, TransferId)
//! - [`models`] - Account and TransferRecord types
//! - [`error`] - Error taxonomy with stable codes and retriability
//! - [`store`] - Storage contract plus memory and PostgreSQL backends
//! - [`engine`] - The transfer engine and its per-call state machine
//! - [`config`] - YAML configuration
//! - [`logging`] - Tracing subscriber setup
//!
//! # Guarantees
//!
//! - No committed balance is ever negative.
//! - Debit, credit and ledger append commit as one atomic unit; any
//!   failure rolls the whole transfer back with no partial effect.
//! - Row locks are always acquired in ascending account-id order, so two
//!   transfers moving in opposite directions between the same pair of
//!   accounts can never deadlock.

// Core types - must be first!
pub mod core_types;

pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod models;
pub mod store;

// Convenient re-exports at crate root
pub use config::LedgerConfig;
pub use core_types::{AccountId, TransferId};
pub use engine::{TransferEngine, TransferPhase};
pub use error::TransferError;
pub use models::{Account, TransferRecord};
pub use store::{AccountStore, MemoryStore, PgStore, TransactionCoordinator, TransferLedger};
