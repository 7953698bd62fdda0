//! External eligibility resolution.
//!
//! Tier membership, VIP passes, whitelists and access codes are owned by
//! other services; the loyalty core only consults them. The whole surface is
//! one injected trait object so tests can substitute a static table.

use crate::ids::{EventId, UserId};
use crate::tier::Tier;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The eligibility path through which presale access was granted.
///
/// Paths are resolved in fixed priority order: tier, then VIP pass, then
/// access code, then whitelist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessType {
    /// Admitted because the member's tier meets the window requirement.
    Tier,
    /// Admitted through a VIP pass.
    Vip,
    /// Admitted with a valid access code.
    Code,
    /// Admitted via the event whitelist.
    Whitelist,
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tier => "tier",
            Self::Vip => "vip",
            Self::Code => "code",
            Self::Whitelist => "whitelist",
        };
        f.write_str(name)
    }
}

/// Resolves a member's externally-owned eligibility facts.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the resolver is shared across
/// concurrent request handlers as `Arc<dyn EligibilityResolver>`.
#[async_trait]
pub trait EligibilityResolver: Send + Sync {
    /// The member's current ranked tier, if they have one.
    async fn tier_of(&self, user_id: UserId) -> Option<Tier>;

    /// Whether the member holds any of the listed pass types.
    ///
    /// An empty `required_passes` list never matches.
    async fn has_vip_pass(&self, user_id: UserId, required_passes: &[String]) -> bool;

    /// Whether the member is on the event's whitelist.
    async fn is_whitelisted(&self, user_id: UserId, event_id: EventId) -> bool;

    /// Whether `code` is a currently valid access code for the event.
    async fn validate_access_code(&self, event_id: EventId, code: &str) -> bool;
}
