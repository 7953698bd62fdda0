//! # Velvet Testing
//!
//! Deterministic test doubles for the loyalty core:
//!
//! - [`FixedClock`]: a clock pinned to (and manually advanced from) a fixed
//!   instant, for window-boundary and expiry tests
//! - [`RecordingEventBus`]: captures every published [`LoyaltyEvent`] for
//!   assertions
//! - [`StaticEligibility`]: a builder-style eligibility resolver backed by
//!   static tables
//!
//! All doubles are cheap, `Send + Sync`, and safe to share across the
//! spawned tasks of a concurrency stress test.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use velvet_core::{
    Clock, EligibilityResolver, EventBus, EventBusError, EventId, LoyaltyEvent, Tier, UserId,
};

/// A clock pinned to a fixed instant.
///
/// Tests advance it explicitly; nothing moves on its own.
#[derive(Clone, Debug)]
pub struct FixedClock {
    now: Arc<RwLock<DateTime<Utc>>>,
}

impl FixedClock {
    /// Creates a clock pinned to `now`.
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(RwLock::new(now)),
        }
    }

    /// Advances the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.write().unwrap();
        *now += delta;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap()
    }
}

/// An event bus that records everything published to it.
#[derive(Clone, Debug, Default)]
pub struct RecordingEventBus {
    published: Arc<Mutex<Vec<LoyaltyEvent>>>,
}

impl RecordingEventBus {
    /// Creates an empty recording bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All events published so far, in publish order.
    #[must_use]
    pub fn published(&self) -> Vec<LoyaltyEvent> {
        self.published.lock().unwrap().clone()
    }

    /// Number of events published so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    /// Whether nothing has been published yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events published under `topic`, in publish order.
    #[must_use]
    pub fn on_topic(&self, topic: &str) -> Vec<LoyaltyEvent> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|event| event.topic() == topic)
            .cloned()
            .collect()
    }

    /// Clears the recording (for test isolation).
    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, event: LoyaltyEvent) -> Result<(), EventBusError> {
        self.published.lock().unwrap().push(event);
        Ok(())
    }
}

/// An eligibility resolver backed by static tables.
///
/// # Example
///
/// ```
/// use velvet_testing::StaticEligibility;
/// use velvet_core::{Tier, UserId, EventId};
///
/// let user = UserId::new();
/// let event = EventId::new();
/// let resolver = StaticEligibility::new()
///     .with_tier(user, Tier::Gold)
///     .with_whitelisted(user, event)
///     .with_access_code(event, "EARLYBIRD");
/// ```
#[derive(Clone, Debug, Default)]
pub struct StaticEligibility {
    tiers: HashMap<UserId, Tier>,
    vip_passes: HashMap<UserId, HashSet<String>>,
    whitelist: HashSet<(UserId, EventId)>,
    access_codes: HashMap<EventId, HashSet<String>>,
}

impl StaticEligibility {
    /// Creates a resolver that knows nothing about anyone.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a member's tier.
    #[must_use]
    pub fn with_tier(mut self, user_id: UserId, tier: Tier) -> Self {
        self.tiers.insert(user_id, tier);
        self
    }

    /// Grants a member a VIP pass of `pass_type`.
    #[must_use]
    pub fn with_vip_pass(mut self, user_id: UserId, pass_type: &str) -> Self {
        self.vip_passes
            .entry(user_id)
            .or_default()
            .insert(pass_type.to_string());
        self
    }

    /// Whitelists a member for an event.
    #[must_use]
    pub fn with_whitelisted(mut self, user_id: UserId, event_id: EventId) -> Self {
        self.whitelist.insert((user_id, event_id));
        self
    }

    /// Registers a valid access code for an event.
    #[must_use]
    pub fn with_access_code(mut self, event_id: EventId, code: &str) -> Self {
        self.access_codes
            .entry(event_id)
            .or_default()
            .insert(code.to_string());
        self
    }
}

#[async_trait]
impl EligibilityResolver for StaticEligibility {
    async fn tier_of(&self, user_id: UserId) -> Option<Tier> {
        self.tiers.get(&user_id).copied()
    }

    async fn has_vip_pass(&self, user_id: UserId, required_passes: &[String]) -> bool {
        let Some(held) = self.vip_passes.get(&user_id) else {
            return false;
        };
        required_passes.iter().any(|pass| held.contains(pass))
    }

    async fn is_whitelisted(&self, user_id: UserId, event_id: EventId) -> bool {
        self.whitelist.contains(&(user_id, event_id))
    }

    async fn validate_access_code(&self, event_id: EventId, code: &str) -> bool {
        self.access_codes
            .get(&event_id)
            .is_some_and(|codes| codes.contains(code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn recording_bus_captures_in_order() {
        let bus = RecordingEventBus::new();
        let user_id = UserId::new();

        bus.publish(LoyaltyEvent::PointsEarned {
            user_id,
            amount: 10.into(),
            balance: 10.into(),
            reason: "test".to_string(),
        })
        .await
        .unwrap();

        assert_eq!(bus.len(), 1);
        assert_eq!(bus.on_topic("ledger").len(), 1);
        assert!(bus.on_topic("admission").is_empty());
    }

    #[tokio::test]
    async fn static_eligibility_lookups() {
        let user = UserId::new();
        let stranger = UserId::new();
        let event = EventId::new();

        let resolver = StaticEligibility::new()
            .with_tier(user, Tier::Platinum)
            .with_vip_pass(user, "backstage")
            .with_access_code(event, "EARLYBIRD");

        assert_eq!(resolver.tier_of(user).await, Some(Tier::Platinum));
        assert_eq!(resolver.tier_of(stranger).await, None);
        assert!(
            resolver
                .has_vip_pass(user, &["backstage".to_string()])
                .await
        );
        assert!(!resolver.has_vip_pass(user, &[]).await);
        assert!(resolver.validate_access_code(event, "EARLYBIRD").await);
        assert!(!resolver.validate_access_code(event, "earlybird").await);
        assert!(!resolver.is_whitelisted(user, event).await);
    }

    #[test]
    fn fixed_clock_advances_only_when_told() {
        let clock = FixedClock::at(Utc::now());
        let before = clock.now();
        assert_eq!(clock.now(), before);
        clock.advance(Duration::minutes(5));
        assert_eq!(clock.now(), before + Duration::minutes(5));
    }
}
