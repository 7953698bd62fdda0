//! Presale windows, grants, and waitlist entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use velvet_core::{AccessType, EventId, Tier, UserId};

/// Ticket allowance granted per access path.
///
/// VIP pass holders get the largest allowance, access-code holders a mid
/// allowance, tier members 2 plus their tier rank, and whitelisted members
/// the base allowance.
#[must_use]
pub fn ticket_allowance(access_type: AccessType, tier: Option<Tier>) -> u32 {
    match access_type {
        AccessType::Tier => 2 + tier.map_or(0, |t| u32::from(t.rank())),
        AccessType::Vip => 8,
        AccessType::Code => 4,
        AccessType::Whitelist => 2,
    }
}

/// A presale admission window for one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresaleWindow {
    /// Event the window admits into
    pub event_id: EventId,
    /// First instant the window accepts entries
    pub starts_at: DateTime<Utc>,
    /// Entries are rejected at and after this instant
    pub ends_at: DateTime<Utc>,
    /// Minimum tier for the tier path, if the path is open
    pub required_tier: Option<Tier>,
    /// VIP pass types accepted by the VIP path
    pub required_passes: Vec<String>,
    /// Codes accepted by the code path
    pub access_codes: Vec<String>,
    /// When set, only the whitelist path admits
    pub whitelist_only: bool,
    /// Participant cap; `None` means uncapped
    pub max_participants: Option<u32>,
    /// Fresh participant count; never exceeds `max_participants`
    pub current_participants: u32,
}

impl PresaleWindow {
    /// Whether the window is open as of `now`.
    #[must_use]
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }

    /// Whether `count` participants leave room for one more.
    #[must_use]
    pub fn has_capacity_at(&self, count: u32) -> bool {
        self.max_participants.is_none_or(|cap| count < cap)
    }
}

/// A member's admission into a presale window.
///
/// Immutable once created; at most one per (user, event).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresaleAccessGrant {
    /// Admitted member
    pub user_id: UserId,
    /// Event entered
    pub event_id: EventId,
    /// Path that admitted the member
    pub access_type: AccessType,
    /// When the grant was created
    pub entered_at: DateTime<Utc>,
    /// Tickets the member may purchase
    pub max_tickets: u32,
    /// Tickets purchased so far
    pub tickets_purchased: u32,
}

/// A member waiting for capacity, ordered by join time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WaitlistEntry {
    /// Waiting member
    pub user_id: UserId,
    /// Event waited on
    pub event_id: EventId,
    /// Path the member qualified through
    pub access_type: AccessType,
    /// When the member joined the waitlist
    pub joined_at: DateTime<Utc>,
}

/// Read-only answer to "could this member get in right now".
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessCheck {
    /// Existing grant, if the member is already admitted
    pub grant: Option<PresaleAccessGrant>,
    /// Whether the window is currently open
    pub window_open: bool,
    /// Whether the tier path would admit the member
    pub tier_eligible: bool,
    /// Whether the VIP path would admit the member
    pub vip_eligible: bool,
    /// Whether the window accepts any access code
    pub code_available: bool,
    /// Whether the whitelist path would admit the member
    pub whitelisted: bool,
}

impl AccessCheck {
    /// Whether any path would admit the member.
    #[must_use]
    pub const fn any_path(&self) -> bool {
        self.tier_eligible || self.vip_eligible || self.code_available || self.whitelisted
    }
}

/// What `enter_presale` produced for the member.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryOutcome {
    /// The member holds a grant; carries it whether fresh or pre-existing.
    Admitted(PresaleAccessGrant),
    /// The window is at capacity; the member waits at this 1-based position.
    Waitlisted {
        /// Position in the queue, 1 = next to be promoted
        position: usize,
    },
}

/// What freeing a grant did to the waitlist.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromotionOutcome {
    /// The head of the waitlist took the freed slot.
    Promoted(PresaleAccessGrant),
    /// Nobody was waiting; the slot stays free.
    NobodyWaiting,
}

/// Eventually-consistent queue aggregate for dashboards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStatus {
    /// Event the status describes
    pub event_id: EventId,
    /// Current participant count
    pub participants: u32,
    /// Participant cap, if any
    pub capacity: Option<u32>,
    /// Members currently waiting
    pub waitlist_len: usize,
    /// Linear-heuristic wait estimate for the back of the queue
    pub estimated_wait_minutes: u64,
}
