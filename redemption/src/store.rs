//! Reward and claim storage abstraction.

use crate::error::RedemptionError;
use crate::types::{ClaimStatus, Reward, RewardClaim};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use velvet_core::{ClaimId, RewardId, UserId};

/// Storage for the reward catalog and claims.
///
/// Supply and status mutations are conditional at the store layer, so the
/// engine's guarantees do not depend on the caller holding a lock for the
/// read that preceded the write.
#[async_trait]
pub trait RewardStore: Send + Sync {
    /// Inserts or replaces a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the write fails.
    async fn upsert_reward(&self, reward: Reward) -> Result<(), RedemptionError>;

    /// The reward, if it exists.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn reward(&self, reward_id: RewardId) -> Result<Option<Reward>, RedemptionError>;

    /// All catalog entries, optionally only the active ones.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn list_rewards(&self, active_only: bool) -> Result<Vec<Reward>, RedemptionError>;

    /// Atomically increments `claimed_supply` if units remain. Returns
    /// `false` without writing when the reward is sold out.
    ///
    /// # Errors
    ///
    /// Returns [`RedemptionError::RewardNotFound`] or a store failure.
    async fn try_increment_claimed(&self, reward_id: RewardId) -> Result<bool, RedemptionError>;

    /// Decrements `claimed_supply`, freeing one unit. Saturates at zero.
    ///
    /// # Errors
    ///
    /// Returns [`RedemptionError::RewardNotFound`] or a store failure.
    async fn decrement_claimed(&self, reward_id: RewardId) -> Result<(), RedemptionError>;

    /// Inserts a new claim row.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the write fails.
    async fn insert_claim(&self, claim: RewardClaim) -> Result<(), RedemptionError>;

    /// The claim, if it exists.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn claim(&self, claim_id: ClaimId) -> Result<Option<RewardClaim>, RedemptionError>;

    /// All claims by one member, most recent first.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn claims_for_user(&self, user_id: UserId) -> Result<Vec<RewardClaim>, RedemptionError>;

    /// Whether the member holds a live (non-cancelled) claim on the reward.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn has_live_claim(
        &self,
        user_id: UserId,
        reward_id: RewardId,
    ) -> Result<bool, RedemptionError>;

    /// Moves the claim from `expected` to `next` and stamps `fulfilled_at`
    /// when given. Returns the updated claim, or `None` without writing when
    /// the claim is not currently in `expected`.
    ///
    /// # Errors
    ///
    /// Returns [`RedemptionError::ClaimNotFound`] or a store failure.
    async fn transition_claim(
        &self,
        claim_id: ClaimId,
        expected: ClaimStatus,
        next: ClaimStatus,
        fulfilled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<RewardClaim>, RedemptionError>;
}
