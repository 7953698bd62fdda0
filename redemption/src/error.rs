//! Redemption error taxonomy.

use thiserror::Error;
use velvet_core::{Points, StoreError, Tier};
use velvet_ledger::LedgerError;

/// Errors produced by the redemption engine.
#[derive(Debug, Error)]
pub enum RedemptionError {
    /// No reward with the given id.
    #[error("reward not found")]
    RewardNotFound,

    /// The reward is not accepting claims.
    #[error("reward is not active")]
    RewardInactive,

    /// The reward's claim window has passed.
    #[error("reward has expired")]
    RewardExpired,

    /// No units remain.
    #[error("reward is out of stock")]
    OutOfStock,

    /// The member already holds a live claim on this reward.
    #[error("reward already claimed")]
    AlreadyClaimed,

    /// The member's tier does not meet the reward's requirement.
    #[error("tier {required} required")]
    TierTooLow {
        /// Minimum tier the reward demands.
        required: Tier,
        /// The member's tier, if they have one.
        actual: Option<Tier>,
    },

    /// The member's balance does not cover the cost.
    #[error("insufficient balance: have {balance}, need {required}")]
    InsufficientBalance {
        /// Balance at the time of the attempt.
        balance: Points,
        /// Cost of the reward.
        required: Points,
    },

    /// No claim with the given id.
    #[error("claim not found")]
    ClaimNotFound,

    /// A reward update would set `total_supply` below `claimed_supply`.
    #[error("total supply {total} is below claimed supply {claimed}")]
    SupplyBelowClaimed {
        /// Requested total supply.
        total: u32,
        /// Units already claimed.
        claimed: u32,
    },

    /// The ledger rejected an operation for a reason other than balance.
    #[error(transparent)]
    Ledger(LedgerError),

    /// The underlying store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LedgerError> for RedemptionError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientBalance { balance, required } => {
                Self::InsufficientBalance { balance, required }
            }
            LedgerError::Store(err) => Self::Store(err),
            other => Self::Ledger(other),
        }
    }
}

impl RedemptionError {
    /// Stable machine-readable code for logs and clients.
    #[must_use]
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::RewardNotFound => "reward_not_found",
            Self::RewardInactive => "reward_inactive",
            Self::RewardExpired => "reward_expired",
            Self::OutOfStock => "out_of_stock",
            Self::AlreadyClaimed => "already_claimed",
            Self::TierTooLow { .. } => "tier_too_low",
            Self::InsufficientBalance { .. } => "insufficient_balance",
            Self::ClaimNotFound => "claim_not_found",
            Self::SupplyBelowClaimed { .. } => "supply_below_claimed",
            Self::Ledger(err) => err.reason_code(),
            Self::Store(err) => err.reason_code(),
        }
    }
}
