//! Points ledger for the Velvet loyalty platform.
//!
//! Accounts, an append-only audit trail, and the earn schedule that turns
//! purchase spend into points. All balance mutations are balance-checked and
//! atomic at the store layer, so concurrent spends of the same account can
//! never overdraw it.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod store;
pub mod types;

pub use error::LedgerError;
pub use ledger::PointsLedger;
pub use memory::InMemoryLedgerStore;
pub use store::LedgerStore;
pub use types::{
    EarnSchedule, PointsAccount, PointsTransaction, PurchaseCategory, TransactionKind,
};
