//! Ledger error taxonomy.

use thiserror::Error;
use velvet_core::{Points, StoreError};

/// Errors produced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The amount was zero where a positive amount is required.
    #[error("amount must be greater than zero")]
    InvalidAmount,

    /// The debit exceeds the current balance.
    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance {
        /// Balance at the time of the attempt.
        balance: Points,
        /// Amount the operation required.
        required: Points,
    },

    /// Sender and recipient are the same account.
    #[error("cannot transfer points to the same account")]
    SelfTransfer,

    /// A balance or lifetime counter would exceed its representable range.
    #[error("points arithmetic overflow")]
    Overflow,

    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Stable machine-readable code for logs and clients.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount => "invalid_amount",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::SelfTransfer => "self_transfer",
            Self::Overflow => "overflow",
            Self::Store(err) => err.reason_code(),
        }
    }
}
