//! In-memory reward store.

use crate::error::RedemptionError;
use crate::store::RewardStore;
use crate::types::{ClaimStatus, Reward, RewardClaim};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use velvet_core::{ClaimId, RewardId, StoreError, UserId};

#[derive(Default)]
struct RedemptionState {
    rewards: HashMap<RewardId, Reward>,
    claims: HashMap<ClaimId, RewardClaim>,
}

/// Hash-map reward store for tests, demos, and single-node deployments.
#[derive(Default)]
pub struct InMemoryRewardStore {
    state: Mutex<RedemptionState>,
}

impl InMemoryRewardStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, RedemptionState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("redemption state mutex poisoned".into()))
    }
}

#[async_trait]
impl RewardStore for InMemoryRewardStore {
    async fn upsert_reward(&self, reward: Reward) -> Result<(), RedemptionError> {
        let mut state = self.lock()?;
        state.rewards.insert(reward.id, reward);
        Ok(())
    }

    async fn reward(&self, reward_id: RewardId) -> Result<Option<Reward>, RedemptionError> {
        let state = self.lock()?;
        Ok(state.rewards.get(&reward_id).cloned())
    }

    async fn list_rewards(&self, active_only: bool) -> Result<Vec<Reward>, RedemptionError> {
        let state = self.lock()?;
        let mut rewards: Vec<Reward> = state
            .rewards
            .values()
            .filter(|reward| !active_only || reward.is_active)
            .cloned()
            .collect();
        rewards.sort_by_key(|reward| reward.created_at);
        Ok(rewards)
    }

    async fn try_increment_claimed(&self, reward_id: RewardId) -> Result<bool, RedemptionError> {
        let mut state = self.lock()?;
        let reward = state
            .rewards
            .get_mut(&reward_id)
            .ok_or(RedemptionError::RewardNotFound)?;
        if reward.claimed_supply >= reward.total_supply {
            return Ok(false);
        }
        reward.claimed_supply += 1;
        Ok(true)
    }

    async fn decrement_claimed(&self, reward_id: RewardId) -> Result<(), RedemptionError> {
        let mut state = self.lock()?;
        let reward = state
            .rewards
            .get_mut(&reward_id)
            .ok_or(RedemptionError::RewardNotFound)?;
        reward.claimed_supply = reward.claimed_supply.saturating_sub(1);
        Ok(())
    }

    async fn insert_claim(&self, claim: RewardClaim) -> Result<(), RedemptionError> {
        let mut state = self.lock()?;
        state.claims.insert(claim.id, claim);
        Ok(())
    }

    async fn claim(&self, claim_id: ClaimId) -> Result<Option<RewardClaim>, RedemptionError> {
        let state = self.lock()?;
        Ok(state.claims.get(&claim_id).cloned())
    }

    async fn claims_for_user(&self, user_id: UserId) -> Result<Vec<RewardClaim>, RedemptionError> {
        let state = self.lock()?;
        let mut claims: Vec<RewardClaim> = state
            .claims
            .values()
            .filter(|claim| claim.user_id == user_id)
            .cloned()
            .collect();
        claims.sort_by(|a, b| b.claimed_at.cmp(&a.claimed_at));
        Ok(claims)
    }

    async fn has_live_claim(
        &self,
        user_id: UserId,
        reward_id: RewardId,
    ) -> Result<bool, RedemptionError> {
        let state = self.lock()?;
        Ok(state.claims.values().any(|claim| {
            claim.user_id == user_id && claim.reward_id == reward_id && claim.status.is_live()
        }))
    }

    async fn transition_claim(
        &self,
        claim_id: ClaimId,
        expected: ClaimStatus,
        next: ClaimStatus,
        fulfilled_at: Option<DateTime<Utc>>,
    ) -> Result<Option<RewardClaim>, RedemptionError> {
        let mut state = self.lock()?;
        let claim = state
            .claims
            .get_mut(&claim_id)
            .ok_or(RedemptionError::ClaimNotFound)?;
        if claim.status != expected {
            return Ok(None);
        }
        claim.status = next;
        if fulfilled_at.is_some() {
            claim.fulfilled_at = fulfilled_at;
        }
        Ok(Some(claim.clone()))
    }
}
