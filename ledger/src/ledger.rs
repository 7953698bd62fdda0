//! The points ledger service.

use crate::error::LedgerError;
use crate::store::LedgerStore;
use crate::types::{EarnSchedule, PointsAccount, PointsTransaction, PurchaseCategory, TransactionKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use velvet_core::{Clock, EventBus, LoyaltyEvent, Points, TtlCache, UserId};

const BALANCE_CACHE_TTL: Duration = Duration::from_secs(5);
const BALANCE_CACHE_CAPACITY: usize = 10_000;

/// Append-only points ledger over accounts and their audit trail.
///
/// Every mutation goes through the store's atomic operations; the service
/// adds validation, the earn schedule, event publication, and a short-lived
/// balance cache that is invalidated on every write.
pub struct PointsLedger {
    store: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    bus: Arc<dyn EventBus>,
    schedule: EarnSchedule,
    balance_cache: TtlCache<UserId, Points>,
}

impl PointsLedger {
    /// Creates a ledger with the platform-standard earn schedule.
    #[must_use]
    pub fn new(store: Arc<dyn LedgerStore>, clock: Arc<dyn Clock>, bus: Arc<dyn EventBus>) -> Self {
        Self::with_schedule(store, clock, bus, EarnSchedule::standard())
    }

    /// Creates a ledger with a custom earn schedule.
    #[must_use]
    pub fn with_schedule(
        store: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        bus: Arc<dyn EventBus>,
        schedule: EarnSchedule,
    ) -> Self {
        Self {
            store,
            clock,
            bus,
            schedule,
            balance_cache: TtlCache::new(BALANCE_CACHE_TTL, BALANCE_CACHE_CAPACITY),
        }
    }

    /// Credits `amount` to `user_id`, recording `reason` in the audit trail.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] for a zero amount, or a store
    /// error.
    pub async fn award_points(
        &self,
        user_id: UserId,
        amount: Points,
        reason: impl Into<String>,
    ) -> Result<PointsTransaction, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        let reason = reason.into();
        let tx = self
            .store
            .credit(
                user_id,
                amount,
                TransactionKind::Earned,
                reason.clone(),
                self.clock.now(),
            )
            .await?;
        self.balance_cache.invalidate(&user_id);
        info!(%user_id, %amount, balance = %tx.balance_after, %reason, "points awarded");
        self.publish(LoyaltyEvent::PointsEarned {
            user_id,
            amount,
            balance: tx.balance_after,
            reason,
        })
        .await;
        Ok(tx)
    }

    /// Awards points for a purchase according to the earn schedule.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] when the purchase is too small
    /// to earn a whole point, or a store error.
    pub async fn award_for_purchase(
        &self,
        user_id: UserId,
        category: PurchaseCategory,
        spend_cents: u64,
    ) -> Result<PointsTransaction, LedgerError> {
        let amount = self.schedule.points_for(category, spend_cents);
        let reason = format!("{category} purchase");
        self.award_points(user_id, amount, reason).await
    }

    /// Debits `amount` from `user_id` if the balance covers it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] for a zero amount,
    /// [`LedgerError::InsufficientBalance`] when the balance is short, or a
    /// store error. On an insufficient balance nothing is written.
    pub async fn spend_points(
        &self,
        user_id: UserId,
        amount: Points,
        reason: impl Into<String>,
    ) -> Result<PointsTransaction, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        let reason = reason.into();
        let tx = self
            .store
            .debit(
                user_id,
                amount,
                TransactionKind::Spent,
                reason.clone(),
                self.clock.now(),
            )
            .await?;
        self.balance_cache.invalidate(&user_id);
        info!(%user_id, %amount, balance = %tx.balance_after, %reason, "points spent");
        self.publish(LoyaltyEvent::PointsSpent {
            user_id,
            amount,
            balance: tx.balance_after,
            reason,
        })
        .await;
        Ok(tx)
    }

    /// Moves `amount` from `from` to `to` atomically, writing one
    /// `Transferred` and one `Received` row.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::SelfTransfer`] when both sides are the same
    /// account, [`LedgerError::InvalidAmount`] for a zero amount,
    /// [`LedgerError::InsufficientBalance`] when the sender is short, or a
    /// store error.
    pub async fn transfer_points(
        &self,
        from: UserId,
        to: UserId,
        amount: Points,
        message: impl Into<String>,
    ) -> Result<(PointsTransaction, PointsTransaction), LedgerError> {
        if from == to {
            return Err(LedgerError::SelfTransfer);
        }
        if amount.is_zero() {
            return Err(LedgerError::InvalidAmount);
        }
        let (sent, received) = self
            .store
            .transfer(from, to, amount, message.into(), self.clock.now())
            .await?;
        self.balance_cache.invalidate(&from);
        self.balance_cache.invalidate(&to);
        info!(%from, %to, %amount, "points transferred");
        self.publish(LoyaltyEvent::PointsTransferred {
            from,
            to,
            amount,
            sender_balance: sent.balance_after,
            recipient_balance: received.balance_after,
        })
        .await;
        Ok((sent, received))
    }

    /// Current balance, served from a short-lived cache when fresh.
    ///
    /// Accounts that do not exist yet report zero.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    pub async fn balance(&self, user_id: UserId) -> Result<Points, LedgerError> {
        if let Some(balance) = self.balance_cache.get(&user_id) {
            return Ok(balance);
        }
        // A mutation that lands during the store read must win: its
        // invalidation bumps the generation, and the stale value stays out.
        let observed = self.balance_cache.generation();
        let balance = self.store.balance(user_id).await?;
        self.balance_cache.insert_if_fresh(user_id, balance, observed);
        Ok(balance)
    }

    /// The account record, if the account has ever been touched.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    pub async fn account(&self, user_id: UserId) -> Result<Option<PointsAccount>, LedgerError> {
        self.store.account(user_id).await
    }

    /// Transaction history, most recent first.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    pub async fn history(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PointsTransaction>, LedgerError> {
        self.store.history(user_id, limit, offset).await
    }

    /// The ledger commit is the source of truth; a failed publish is logged
    /// and never rolls the write back.
    async fn publish(&self, event: LoyaltyEvent) {
        let event_type = event.event_type();
        if let Err(err) = self.bus.publish(event).await {
            warn!(%event_type, error = %err, "event publish failed");
        }
    }
}
