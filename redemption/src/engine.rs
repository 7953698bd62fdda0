//! The redemption engine.

use crate::error::RedemptionError;
use crate::store::RewardStore;
use crate::types::{ClaimReceipt, ClaimStatus, Reward, RewardClaim};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};
use velvet_core::{
    ClaimId, Clock, EligibilityResolver, EventBus, LoyaltyEvent, Points, RewardId, StoreError,
    UserId,
};
use velvet_ledger::PointsLedger;

/// Claims costing at least this many points queue for manual approval even
/// in an auto-approved category.
const APPROVAL_THRESHOLD: Points = Points::new(1000);

/// Spends points on rewards and walks claims through their lifecycle.
///
/// Claims of one reward serialize on a per-reward async lock, so the supply
/// check and the supply increment cannot interleave between two claimants.
/// Claims of different rewards never contend.
pub struct RedemptionEngine {
    store: Arc<dyn RewardStore>,
    ledger: Arc<PointsLedger>,
    eligibility: Arc<dyn EligibilityResolver>,
    clock: Arc<dyn Clock>,
    bus: Arc<dyn EventBus>,
    locks: Mutex<HashMap<RewardId, Arc<tokio::sync::Mutex<()>>>>,
}

impl RedemptionEngine {
    /// Creates an engine over the given store, ledger, and resolver.
    #[must_use]
    pub fn new(
        store: Arc<dyn RewardStore>,
        ledger: Arc<PointsLedger>,
        eligibility: Arc<dyn EligibilityResolver>,
        clock: Arc<dyn Clock>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            ledger,
            eligibility,
            clock,
            bus,
            locks: Mutex::new(HashMap::new()),
        }
    }

    fn reward_lock(&self, reward_id: RewardId) -> Result<Arc<tokio::sync::Mutex<()>>, StoreError> {
        let mut locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Backend("reward lock map mutex poisoned".into()))?;
        // Entries nobody holds are dropped on the way through, so the map
        // tracks contended rewards rather than every reward ever seen.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Ok(locks.entry(reward_id).or_default().clone())
    }

    #[cfg(test)]
    fn lock_map_len(&self) -> Result<usize, StoreError> {
        let locks = self
            .locks
            .lock()
            .map_err(|_| StoreError::Backend("reward lock map mutex poisoned".into()))?;
        Ok(locks.len())
    }

    /// Publishes a reward to the catalog.
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    pub async fn publish_reward(&self, reward: Reward) -> Result<(), RedemptionError> {
        info!(reward_id = %reward.id, name = %reward.name, cost = %reward.cost, "reward published");
        self.store.upsert_reward(reward).await
    }

    /// Replaces a catalog entry, preserving its live `claimed_supply`.
    ///
    /// # Errors
    ///
    /// Returns [`RedemptionError::RewardNotFound`] for an unknown reward,
    /// [`RedemptionError::SupplyBelowClaimed`] when the new total supply is
    /// below the units already claimed, or a store error.
    pub async fn update_reward(&self, reward: Reward) -> Result<(), RedemptionError> {
        let lock = self.reward_lock(reward.id)?;
        let _guard = lock.lock().await;

        let current = self
            .store
            .reward(reward.id)
            .await?
            .ok_or(RedemptionError::RewardNotFound)?;
        if reward.total_supply < current.claimed_supply {
            return Err(RedemptionError::SupplyBelowClaimed {
                total: reward.total_supply,
                claimed: current.claimed_supply,
            });
        }
        let updated = Reward {
            claimed_supply: current.claimed_supply,
            ..reward
        };
        info!(reward_id = %updated.id, active = updated.is_active, "reward updated");
        self.store.upsert_reward(updated).await
    }

    /// The catalog entry, if it exists.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    pub async fn reward(&self, reward_id: RewardId) -> Result<Option<Reward>, RedemptionError> {
        self.store.reward(reward_id).await
    }

    /// The catalog, optionally only its active entries.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    pub async fn list_rewards(&self, active_only: bool) -> Result<Vec<Reward>, RedemptionError> {
        self.store.list_rewards(active_only).await
    }

    /// Claims a reward for a member, debiting its cost from the ledger.
    ///
    /// With one unit left and N concurrent claimants, exactly one succeeds;
    /// the rest observe `OutOfStock`.
    ///
    /// # Errors
    ///
    /// Validation runs in a fixed order and the first failure wins:
    /// `RewardNotFound`, `RewardInactive`, `RewardExpired`, `OutOfStock`,
    /// `AlreadyClaimed`, `TierTooLow`, `InsufficientBalance`. Any failure
    /// after the debit refunds the debit before the error is returned.
    pub async fn claim_reward(
        &self,
        user_id: UserId,
        reward_id: RewardId,
    ) -> Result<ClaimReceipt, RedemptionError> {
        let lock = self.reward_lock(reward_id)?;
        let _guard = lock.lock().await;
        let now = self.clock.now();

        let reward = self
            .store
            .reward(reward_id)
            .await?
            .ok_or(RedemptionError::RewardNotFound)?;
        if !reward.is_active {
            return Err(RedemptionError::RewardInactive);
        }
        if reward.expired_at(now) {
            return Err(RedemptionError::RewardExpired);
        }
        if reward.remaining_supply() == 0 {
            return Err(RedemptionError::OutOfStock);
        }
        if self.store.has_live_claim(user_id, reward_id).await? {
            return Err(RedemptionError::AlreadyClaimed);
        }
        if let Some(required) = reward.tier_required {
            let actual = self.eligibility.tier_of(user_id).await;
            if !actual.is_some_and(|tier| tier.meets(required)) {
                return Err(RedemptionError::TierTooLow { required, actual });
            }
        }

        // Point of no return: the debit commits, and every failure past it
        // must compensate.
        let debit = self
            .ledger
            .spend_points(user_id, reward.cost, format!("claim: {}", reward.name))
            .await?;

        if !self.store.try_increment_claimed(reward_id).await? {
            self.refund(user_id, reward.cost, &reward.name).await;
            return Err(RedemptionError::OutOfStock);
        }

        let requires_approval =
            reward.cost >= APPROVAL_THRESHOLD || reward.category.needs_approval();
        let claim = RewardClaim {
            id: ClaimId::new(),
            user_id,
            reward_id,
            points_cost: reward.cost,
            status: if requires_approval {
                ClaimStatus::Pending
            } else {
                ClaimStatus::Approved
            },
            claimed_at: now,
            fulfilled_at: None,
        };
        if let Err(err) = self.store.insert_claim(claim.clone()).await {
            self.store.decrement_claimed(reward_id).await?;
            self.refund(user_id, reward.cost, &reward.name).await;
            return Err(err);
        }

        info!(
            %user_id,
            %reward_id,
            claim_id = %claim.id,
            cost = %reward.cost,
            requires_approval,
            "reward claimed"
        );
        self.publish(LoyaltyEvent::RewardClaimed {
            user_id,
            reward_id,
            claim_id: claim.id,
            points_cost: reward.cost,
            requires_approval,
        })
        .await;

        Ok(ClaimReceipt {
            claim,
            requires_approval,
            balance_after: debit.balance_after,
        })
    }

    /// Approves a pending claim. Returns `false` without writing when the
    /// claim is not pending, so duplicate calls are safe.
    ///
    /// # Errors
    ///
    /// Returns [`RedemptionError::ClaimNotFound`] or a store error.
    pub async fn approve_claim(&self, claim_id: ClaimId) -> Result<bool, RedemptionError> {
        let Some(claim) = self
            .store
            .transition_claim(claim_id, ClaimStatus::Pending, ClaimStatus::Approved, None)
            .await?
        else {
            return Ok(false);
        };
        info!(%claim_id, user_id = %claim.user_id, "claim approved");
        self.publish(LoyaltyEvent::ClaimApproved {
            claim_id,
            user_id: claim.user_id,
        })
        .await;
        Ok(true)
    }

    /// Fulfils an approved claim, stamping the fulfilment time. Returns
    /// `false` without writing when the claim is not approved.
    ///
    /// # Errors
    ///
    /// Returns [`RedemptionError::ClaimNotFound`] or a store error.
    pub async fn fulfill_claim(&self, claim_id: ClaimId) -> Result<bool, RedemptionError> {
        let now = self.clock.now();
        let Some(claim) = self
            .store
            .transition_claim(
                claim_id,
                ClaimStatus::Approved,
                ClaimStatus::Fulfilled,
                Some(now),
            )
            .await?
        else {
            return Ok(false);
        };
        info!(%claim_id, user_id = %claim.user_id, "claim fulfilled");
        self.publish(LoyaltyEvent::ClaimFulfilled {
            claim_id,
            user_id: claim.user_id,
            fulfilled_at: now,
        })
        .await;
        Ok(true)
    }

    /// Cancels a pending or approved claim, refunding its cost and freeing
    /// its unit. Returns `false` without writing when the claim is already
    /// fulfilled or cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`RedemptionError::ClaimNotFound`] or a store error. A
    /// failure while freeing the unit or crediting the refund rolls the
    /// claim back to its prior status before the error surfaces.
    pub async fn cancel_claim(&self, claim_id: ClaimId) -> Result<bool, RedemptionError> {
        let claim = self
            .store
            .claim(claim_id)
            .await?
            .ok_or(RedemptionError::ClaimNotFound)?;

        let lock = self.reward_lock(claim.reward_id)?;
        let _guard = lock.lock().await;

        let mut prior = ClaimStatus::Pending;
        let mut cancelled = self
            .store
            .transition_claim(claim_id, ClaimStatus::Pending, ClaimStatus::Cancelled, None)
            .await?;
        if cancelled.is_none() {
            prior = ClaimStatus::Approved;
            cancelled = self
                .store
                .transition_claim(claim_id, ClaimStatus::Approved, ClaimStatus::Cancelled, None)
                .await?;
        }
        let Some(cancelled) = cancelled else {
            return Ok(false);
        };

        // A failure past the status flip rolls the claim back to its prior
        // state, so the refund and the freed unit move together or not at
        // all.
        if let Err(err) = self.store.decrement_claimed(cancelled.reward_id).await {
            self.restore_claim(claim_id, prior).await;
            return Err(err);
        }
        if let Err(err) = self
            .ledger
            .award_points(
                cancelled.user_id,
                cancelled.points_cost,
                "claim cancelled: refund",
            )
            .await
        {
            match self.store.try_increment_claimed(cancelled.reward_id).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(%claim_id, reward_id = %cancelled.reward_id, "freed unit reclaimed before rollback")
                }
                Err(inc_err) => {
                    warn!(%claim_id, error = %inc_err, "supply rollback failed after refund error")
                }
            }
            self.restore_claim(claim_id, prior).await;
            return Err(err.into());
        }

        info!(
            %claim_id,
            user_id = %cancelled.user_id,
            refunded = %cancelled.points_cost,
            "claim cancelled"
        );
        self.publish(LoyaltyEvent::ClaimCancelled {
            claim_id,
            user_id: cancelled.user_id,
            refunded: cancelled.points_cost,
        })
        .await;
        Ok(true)
    }

    /// The claim's current state.
    ///
    /// # Errors
    ///
    /// Returns [`RedemptionError::ClaimNotFound`] or a store error.
    pub async fn claim_status(&self, claim_id: ClaimId) -> Result<ClaimStatus, RedemptionError> {
        let claim = self
            .store
            .claim(claim_id)
            .await?
            .ok_or(RedemptionError::ClaimNotFound)?;
        Ok(claim.status)
    }

    /// All claims by one member, most recent first.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    pub async fn list_claims(&self, user_id: UserId) -> Result<Vec<RewardClaim>, RedemptionError> {
        self.store.claims_for_user(user_id).await
    }

    /// Puts a cancelled claim back into its prior status after a failed
    /// compensation step. A rollback that itself fails is logged loudly.
    async fn restore_claim(&self, claim_id: ClaimId, prior: ClaimStatus) {
        match self
            .store
            .transition_claim(claim_id, ClaimStatus::Cancelled, prior, None)
            .await
        {
            Ok(Some(_)) => {}
            Ok(None) => warn!(%claim_id, "cancelled claim vanished during rollback"),
            Err(err) => warn!(%claim_id, error = %err, "claim status rollback failed"),
        }
    }

    /// Refunds a debit whose claim never materialized. A refund that itself
    /// fails is logged loudly; the audit trail still holds the debit row.
    async fn refund(&self, user_id: UserId, amount: Points, reward_name: &str) {
        let reason = format!("claim failed: refund for {reward_name}");
        if let Err(err) = self.ledger.award_points(user_id, amount, reason).await {
            warn!(%user_id, %amount, error = %err, "claim compensation refund failed");
        }
    }

    /// The store commit is the source of truth; a failed publish is logged
    /// and never rolls the write back.
    async fn publish(&self, event: LoyaltyEvent) {
        let event_type = event.event_type();
        if let Err(err) = self.bus.publish(event).await {
            warn!(%event_type, error = %err, "event publish failed");
        }
    }
}
