//! Rewards, claims, and the claim state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use velvet_core::{ClaimId, Points, RewardId, Tier, UserId};

/// What kind of reward a claim delivers.
///
/// Physical and experiential categories require manual approval before
/// fulfilment; digital rewards are approved automatically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RewardCategory {
    /// Delivered automatically (codes, downloads, upgrades)
    Digital,
    /// Physical goods that ship
    Merchandise,
    /// Meet-and-greets, backstage tours
    Experience,
    /// Limited-run collectible items
    Collectible,
}

impl RewardCategory {
    /// Whether claims in this category need a human in the loop.
    #[must_use]
    pub const fn needs_approval(self) -> bool {
        !matches!(self, Self::Digital)
    }
}

impl fmt::Display for RewardCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Digital => "digital",
            Self::Merchandise => "merchandise",
            Self::Experience => "experience",
            Self::Collectible => "collectible",
        };
        f.write_str(name)
    }
}

/// A catalog entry members can spend points on.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    /// Reward identifier
    pub id: RewardId,
    /// Display name
    pub name: String,
    /// Points debited per claim
    pub cost: Points,
    /// Delivery category
    pub category: RewardCategory,
    /// Units available in total
    pub total_supply: u32,
    /// Units already claimed; never exceeds `total_supply`
    pub claimed_supply: u32,
    /// Minimum tier, if the reward is tier-gated
    pub tier_required: Option<Tier>,
    /// Whether the reward currently accepts claims
    pub is_active: bool,
    /// Claims are rejected at and after this instant
    pub expires_at: Option<DateTime<Utc>>,
    /// When the reward was published
    pub created_at: DateTime<Utc>,
}

impl Reward {
    /// Units still claimable.
    #[must_use]
    pub const fn remaining_supply(&self) -> u32 {
        self.total_supply.saturating_sub(self.claimed_supply)
    }

    /// Whether the reward has expired as of `now`.
    #[must_use]
    pub fn expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }
}

/// Lifecycle of a claim.
///
/// `Pending -> Approved -> Fulfilled`, with `Pending | Approved ->
/// Cancelled`. `Fulfilled` and `Cancelled` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimStatus {
    /// Waiting for manual approval
    Pending,
    /// Cleared for fulfilment
    Approved,
    /// Delivered; terminal
    Fulfilled,
    /// Cancelled and refunded; terminal
    Cancelled,
}

impl ClaimStatus {
    /// A live claim blocks the same user from claiming the reward again.
    #[must_use]
    pub const fn is_live(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Fulfilled => "fulfilled",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// One member's claim against one reward.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardClaim {
    /// Claim identifier
    pub id: ClaimId,
    /// Claiming member
    pub user_id: UserId,
    /// Reward claimed
    pub reward_id: RewardId,
    /// Points debited when the claim was made; refunded on cancellation
    pub points_cost: Points,
    /// Current lifecycle state
    pub status: ClaimStatus,
    /// When the claim was made
    pub claimed_at: DateTime<Utc>,
    /// When the claim was fulfilled, once it is
    pub fulfilled_at: Option<DateTime<Utc>>,
}

/// What a successful `claim_reward` hands back to the caller.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReceipt {
    /// The freshly inserted claim
    pub claim: RewardClaim,
    /// Whether the claim awaits manual approval
    pub requires_approval: bool,
    /// Member balance after the debit
    pub balance_after: Points,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digital_rewards_skip_approval() {
        assert!(!RewardCategory::Digital.needs_approval());
        assert!(RewardCategory::Merchandise.needs_approval());
        assert!(RewardCategory::Experience.needs_approval());
        assert!(RewardCategory::Collectible.needs_approval());
    }

    #[test]
    fn cancelled_is_the_only_non_live_status() {
        assert!(ClaimStatus::Pending.is_live());
        assert!(ClaimStatus::Approved.is_live());
        assert!(ClaimStatus::Fulfilled.is_live());
        assert!(!ClaimStatus::Cancelled.is_live());
    }

    #[test]
    fn remaining_supply_never_underflows() {
        let reward = Reward {
            id: RewardId::new(),
            name: "poster".into(),
            cost: Points::new(100),
            category: RewardCategory::Merchandise,
            total_supply: 3,
            claimed_supply: 3,
            tier_required: None,
            is_active: true,
            expires_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(reward.remaining_supply(), 0);
    }
}
