//! # Velvet Core
//!
//! Shared abstractions for the Velvet loyalty core: the points ledger, the
//! reward redemption engine, and the presale admission gate all build on the
//! types in this crate.
//!
//! ## Contents
//!
//! - Identifier newtypes and the [`Points`](points::Points) value type
//! - The ranked [`Tier`](tier::Tier) model
//! - [`Clock`](clock::Clock) abstraction for testable time
//! - The typed [`EventBus`](event_bus::EventBus) and the
//!   [`LoyaltyEvent`](event_bus::LoyaltyEvent) catalogue consumed by
//!   reporting and notification collaborators
//! - The [`EligibilityResolver`](eligibility::EligibilityResolver) trait for
//!   external tier / pass / whitelist lookups
//! - A bounded-TTL, invalidate-on-write [`TtlCache`](cache::TtlCache)
//!
//! ## Design principles
//!
//! - External dependencies are injected as `Arc<dyn Trait>` so every
//!   component can be exercised with deterministic doubles.
//! - Errors are structured: every variant carries a stable machine-readable
//!   reason code alongside its human-readable message.
//! - Nothing in this crate performs I/O on its own.

pub mod cache;
pub mod clock;
pub mod eligibility;
pub mod error;
pub mod event_bus;
pub mod ids;
pub mod points;
pub mod tier;

pub use cache::TtlCache;
pub use clock::{Clock, SystemClock};
pub use eligibility::{AccessType, EligibilityResolver};
pub use error::StoreError;
pub use event_bus::{EventBus, EventBusError, LoyaltyEvent};
pub use ids::{ClaimId, EventId, RewardId, TransactionId, UserId};
pub use points::Points;
pub use tier::Tier;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
