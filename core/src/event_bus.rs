//! Typed event bus for the loyalty core.
//!
//! Components publish [`LoyaltyEvent`]s after committing a mutation;
//! reporting, notification and UI collaborators subscribe downstream. The
//! bus is notification-only: the stores are the system of record, so a
//! failed publish is logged by the caller and never rolls back state.

use crate::eligibility::AccessType;
use crate::ids::{ClaimId, EventId, RewardId, UserId};
use crate::points::Points;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while publishing an event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// The transport rejected the event.
    #[error("event publish failed: {0}")]
    PublishFailed(String),
}

/// Every event the loyalty core exposes to downstream collaborators.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoyaltyEvent {
    /// Points were credited to an account.
    PointsEarned {
        /// Account credited
        user_id: UserId,
        /// Amount credited
        amount: Points,
        /// Balance after the credit
        balance: Points,
        /// Why the points were awarded
        reason: String,
    },

    /// Points were debited from an account.
    PointsSpent {
        /// Account debited
        user_id: UserId,
        /// Amount debited
        amount: Points,
        /// Balance after the debit
        balance: Points,
        /// Why the points were spent
        reason: String,
    },

    /// Points moved between two accounts.
    PointsTransferred {
        /// Sending account
        from: UserId,
        /// Receiving account
        to: UserId,
        /// Amount moved
        amount: Points,
        /// Sender's balance after the transfer
        sender_balance: Points,
        /// Recipient's balance after the transfer
        recipient_balance: Points,
    },

    /// A reward was claimed against the ledger.
    RewardClaimed {
        /// Claiming member
        user_id: UserId,
        /// Reward claimed
        reward_id: RewardId,
        /// Claim record
        claim_id: ClaimId,
        /// Points debited for the claim
        points_cost: Points,
        /// Whether the claim starts in the approval queue
        requires_approval: bool,
    },

    /// A pending claim was approved.
    ClaimApproved {
        /// Claim record
        claim_id: ClaimId,
        /// Claiming member
        user_id: UserId,
    },

    /// An approved claim was fulfilled.
    ClaimFulfilled {
        /// Claim record
        claim_id: ClaimId,
        /// Claiming member
        user_id: UserId,
        /// When the reward was handed over
        fulfilled_at: DateTime<Utc>,
    },

    /// A claim was cancelled and its cost refunded.
    ClaimCancelled {
        /// Claim record
        claim_id: ClaimId,
        /// Claiming member
        user_id: UserId,
        /// Points credited back
        refunded: Points,
    },

    /// A member was admitted into a presale window.
    PresaleEntered {
        /// Admitted member
        user_id: UserId,
        /// Event whose window was entered
        event_id: EventId,
        /// Eligibility path that admitted them
        access_type: AccessType,
        /// Ticket allowance granted by that path
        max_tickets: u32,
    },

    /// A member was waitlisted because the window was at capacity.
    PresaleWaitlisted {
        /// Waitlisted member
        user_id: UserId,
        /// Event whose window was full
        event_id: EventId,
        /// 1-based queue position
        position: u32,
    },
}

impl LoyaltyEvent {
    /// Topic the event is published under.
    #[must_use]
    pub const fn topic(&self) -> &'static str {
        match self {
            Self::PointsEarned { .. }
            | Self::PointsSpent { .. }
            | Self::PointsTransferred { .. } => "ledger",
            Self::RewardClaimed { .. }
            | Self::ClaimApproved { .. }
            | Self::ClaimFulfilled { .. }
            | Self::ClaimCancelled { .. } => "redemption",
            Self::PresaleEntered { .. } | Self::PresaleWaitlisted { .. } => "admission",
        }
    }

    /// Versioned event type name for downstream routing.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::PointsEarned { .. } => "PointsEarned.v1",
            Self::PointsSpent { .. } => "PointsSpent.v1",
            Self::PointsTransferred { .. } => "PointsTransferred.v1",
            Self::RewardClaimed { .. } => "RewardClaimed.v1",
            Self::ClaimApproved { .. } => "ClaimApproved.v1",
            Self::ClaimFulfilled { .. } => "ClaimFulfilled.v1",
            Self::ClaimCancelled { .. } => "ClaimCancelled.v1",
            Self::PresaleEntered { .. } => "PresaleEntered.v1",
            Self::PresaleWaitlisted { .. } => "PresaleWaitlisted.v1",
        }
    }
}

/// Publish-only event bus abstraction.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the bus is shared across
/// concurrent request handlers as `Arc<dyn EventBus>`.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one event.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the transport rejects the
    /// event. Callers log and continue; committed state is never rolled back
    /// because a notification failed.
    async fn publish(&self, event: LoyaltyEvent) -> Result<(), EventBusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topics_partition_the_catalogue() {
        let earned = LoyaltyEvent::PointsEarned {
            user_id: UserId::new(),
            amount: Points::new(10),
            balance: Points::new(10),
            reason: "attendance".to_string(),
        };
        assert_eq!(earned.topic(), "ledger");
        assert_eq!(earned.event_type(), "PointsEarned.v1");

        let admitted = LoyaltyEvent::PresaleEntered {
            user_id: UserId::new(),
            event_id: EventId::new(),
            access_type: AccessType::Vip,
            max_tickets: 8,
        };
        assert_eq!(admitted.topic(), "admission");
    }
}
