//! The admission gate.

use crate::error::AdmissionError;
use crate::lock::{LockService, LockToken};
use crate::store::PresaleStore;
use crate::types::{
    ticket_allowance, AccessCheck, EntryOutcome, PresaleAccessGrant, PresaleWindow,
    PromotionOutcome, QueueStatus, WaitlistEntry,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use velvet_core::{
    AccessType, Clock, EligibilityResolver, EventBus, EventId, LoyaltyEvent, UserId,
};

const ADMISSION_LOCK_TTL: Duration = Duration::from_secs(10);
const WAIT_MINUTES_PER_POSITION: u64 = 2;

/// Admits members into presale windows and keeps the waitlist ordered.
///
/// Capacity decisions happen under an event-scoped TTL lock: the gate
/// re-reads the committed participant count while holding it, so two
/// entrants can never both take the last slot. Everything else (access
/// checks, queue status) reads without locking.
pub struct AdmissionGate {
    store: Arc<dyn PresaleStore>,
    locks: Arc<dyn LockService>,
    eligibility: Arc<dyn EligibilityResolver>,
    clock: Arc<dyn Clock>,
    bus: Arc<dyn EventBus>,
}

impl AdmissionGate {
    /// Creates a gate over the given store, lock service, and resolver.
    #[must_use]
    pub fn new(
        store: Arc<dyn PresaleStore>,
        locks: Arc<dyn LockService>,
        eligibility: Arc<dyn EligibilityResolver>,
        clock: Arc<dyn Clock>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            store,
            locks,
            eligibility,
            clock,
            bus,
        }
    }

    /// Opens a presale window for an event, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns a store error if the write fails.
    pub async fn open_window(&self, window: PresaleWindow) -> Result<(), AdmissionError> {
        info!(event_id = %window.event_id, starts_at = %window.starts_at, ends_at = %window.ends_at, "presale window opened");
        self.store.upsert_window(window).await
    }

    /// Updates a window's configuration, preserving its live participant
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::WindowNotFound`] for an unknown event or a
    /// store error.
    pub async fn update_window(&self, window: PresaleWindow) -> Result<(), AdmissionError> {
        let current = self
            .store
            .window(window.event_id)
            .await?
            .ok_or(AdmissionError::WindowNotFound)?;
        let updated = PresaleWindow {
            current_participants: current.current_participants,
            ..window
        };
        info!(event_id = %updated.event_id, "presale window updated");
        self.store.upsert_window(updated).await
    }

    /// Answers "could this member get in right now" without mutating
    /// anything.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::WindowNotFound`] for an unknown event or a
    /// store error.
    pub async fn check_access(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<AccessCheck, AdmissionError> {
        let window = self
            .store
            .window(event_id)
            .await?
            .ok_or(AdmissionError::WindowNotFound)?;
        let grant = self.store.grant(user_id, event_id).await?;
        let whitelisted = self.eligibility.is_whitelisted(user_id, event_id).await;

        let (tier_eligible, vip_eligible, code_available) = if window.whitelist_only {
            (false, false, false)
        } else {
            let tier_eligible = match window.required_tier {
                Some(required) => self
                    .eligibility
                    .tier_of(user_id)
                    .await
                    .is_some_and(|tier| tier.meets(required)),
                None => false,
            };
            let vip_eligible = !window.required_passes.is_empty()
                && self
                    .eligibility
                    .has_vip_pass(user_id, &window.required_passes)
                    .await;
            (tier_eligible, vip_eligible, !window.access_codes.is_empty())
        };

        Ok(AccessCheck {
            grant,
            window_open: window.is_open(self.clock.now()),
            tier_eligible,
            vip_eligible,
            code_available,
            whitelisted,
        })
    }

    /// Admits the member into the presale, or waitlists them at capacity.
    ///
    /// Idempotent: a member who already holds a grant gets it back
    /// unchanged, with no counter movement.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::WindowNotFound`] / `WindowClosed` /
    /// `NotEligible` / `InvalidAccessCode` for validation failures,
    /// [`AdmissionError::Busy`] when the admission lock is contended (the
    /// caller should retry), or a store error.
    pub async fn enter_presale(
        &self,
        user_id: UserId,
        event_id: EventId,
        access_code: Option<&str>,
    ) -> Result<EntryOutcome, AdmissionError> {
        let window = self
            .store
            .window(event_id)
            .await?
            .ok_or(AdmissionError::WindowNotFound)?;

        if let Some(existing) = self.store.grant(user_id, event_id).await? {
            return Ok(EntryOutcome::Admitted(existing));
        }
        if !window.is_open(self.clock.now()) {
            return Err(AdmissionError::WindowClosed);
        }

        let access_type = self.resolve_access(user_id, &window, access_code).await?;
        let tier = self.eligibility.tier_of(user_id).await;
        let max_tickets = ticket_allowance(access_type, tier);

        let token = self
            .locks
            .try_acquire(&format!("presale:{event_id}"), ADMISSION_LOCK_TTL)
            .await?
            .ok_or(AdmissionError::Busy)?;

        let outcome = self
            .admit_or_waitlist(user_id, &window, access_type, max_tickets)
            .await;
        self.release(token).await;
        outcome
    }

    /// The capacity decision. Runs while the admission lock is held.
    async fn admit_or_waitlist(
        &self,
        user_id: UserId,
        window: &PresaleWindow,
        access_type: AccessType,
        max_tickets: u32,
    ) -> Result<EntryOutcome, AdmissionError> {
        let event_id = window.event_id;
        let now = self.clock.now();
        let count = self.store.participant_count(event_id).await?;

        if window.has_capacity_at(count) {
            let grant = PresaleAccessGrant {
                user_id,
                event_id,
                access_type,
                entered_at: now,
                max_tickets,
                tickets_purchased: 0,
            };
            if !self.store.insert_grant(grant.clone()).await? {
                // Raced with our own earlier request; the stored grant wins.
                let existing = self
                    .store
                    .grant(user_id, event_id)
                    .await?
                    .ok_or(AdmissionError::GrantNotFound)?;
                return Ok(EntryOutcome::Admitted(existing));
            }
            // A waitlisted member who gets in once capacity frees must not
            // keep their queue slot, or a later promotion would pick them
            // again.
            self.store.remove_waitlist(user_id, event_id).await?;
            info!(%user_id, %event_id, %access_type, max_tickets, "presale entered");
            self.publish(LoyaltyEvent::PresaleEntered {
                user_id,
                event_id,
                access_type,
                max_tickets,
            })
            .await;
            return Ok(EntryOutcome::Admitted(grant));
        }

        let position = self
            .store
            .push_waitlist(WaitlistEntry {
                user_id,
                event_id,
                access_type,
                joined_at: now,
            })
            .await?;
        info!(%user_id, %event_id, position, "presale waitlisted");
        self.publish(LoyaltyEvent::PresaleWaitlisted {
            user_id,
            event_id,
            position: u32::try_from(position).unwrap_or(u32::MAX),
        })
        .await;
        Ok(EntryOutcome::Waitlisted { position })
    }

    /// Releases the member's grant and promotes the head of the waitlist
    /// into the freed slot.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::GrantNotFound`] when the member holds no
    /// grant, [`AdmissionError::Busy`] when the admission lock is contended,
    /// or a store error.
    pub async fn leave_presale(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<PromotionOutcome, AdmissionError> {
        let token = self
            .locks
            .try_acquire(&format!("presale:{event_id}"), ADMISSION_LOCK_TTL)
            .await?
            .ok_or(AdmissionError::Busy)?;

        let outcome = self.remove_and_promote(user_id, event_id).await;
        self.release(token).await;
        outcome
    }

    /// The slot handover. Runs while the admission lock is held.
    async fn remove_and_promote(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<PromotionOutcome, AdmissionError> {
        if self.store.remove_grant(user_id, event_id).await?.is_none() {
            return Err(AdmissionError::GrantNotFound);
        }
        info!(%user_id, %event_id, "presale left");

        loop {
            let Some(next) = self.store.pop_waitlist(event_id).await? else {
                return Ok(PromotionOutcome::NobodyWaiting);
            };

            let tier = self.eligibility.tier_of(next.user_id).await;
            let grant = PresaleAccessGrant {
                user_id: next.user_id,
                event_id,
                access_type: next.access_type,
                entered_at: self.clock.now(),
                max_tickets: ticket_allowance(next.access_type, tier),
                tickets_purchased: 0,
            };
            // A stale entry for a member who already holds a grant is
            // skipped; the slot goes to the next genuinely waiting member.
            if !self.store.insert_grant(grant.clone()).await? {
                continue;
            }
            info!(user_id = %grant.user_id, %event_id, "waitlist promoted");
            self.publish(LoyaltyEvent::PresaleEntered {
                user_id: grant.user_id,
                event_id,
                access_type: grant.access_type,
                max_tickets: grant.max_tickets,
            })
            .await;
            return Ok(PromotionOutcome::Promoted(grant));
        }
    }

    /// Queue aggregate for dashboards. Eventually consistent; never takes
    /// the admission lock.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::WindowNotFound`] for an unknown event or a
    /// store error.
    pub async fn queue_status(&self, event_id: EventId) -> Result<QueueStatus, AdmissionError> {
        let window = self
            .store
            .window(event_id)
            .await?
            .ok_or(AdmissionError::WindowNotFound)?;
        let waitlist_len = self.store.waitlist_len(event_id).await?;
        Ok(QueueStatus {
            event_id,
            participants: window.current_participants,
            capacity: window.max_participants,
            waitlist_len,
            estimated_wait_minutes: u64::try_from(waitlist_len).unwrap_or(u64::MAX)
                * WAIT_MINUTES_PER_POSITION,
        })
    }

    /// The member's 1-based waitlist position, if they are waiting.
    ///
    /// # Errors
    ///
    /// Returns a store error if the read fails.
    pub async fn waitlist_position(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Option<usize>, AdmissionError> {
        self.store.waitlist_position(user_id, event_id).await
    }

    /// Picks the first satisfied access path in fixed priority order:
    /// tier, then VIP pass, then access code, then whitelist.
    async fn resolve_access(
        &self,
        user_id: UserId,
        window: &PresaleWindow,
        access_code: Option<&str>,
    ) -> Result<AccessType, AdmissionError> {
        let mut invalid_code = false;
        if !window.whitelist_only {
            if let Some(required) = window.required_tier {
                let tier = self.eligibility.tier_of(user_id).await;
                if tier.is_some_and(|t| t.meets(required)) {
                    return Ok(AccessType::Tier);
                }
            }
            if !window.required_passes.is_empty()
                && self
                    .eligibility
                    .has_vip_pass(user_id, &window.required_passes)
                    .await
            {
                return Ok(AccessType::Vip);
            }
            if let Some(code) = access_code {
                let accepted = window.access_codes.iter().any(|c| c == code)
                    || self.eligibility.validate_access_code(window.event_id, code).await;
                if accepted {
                    return Ok(AccessType::Code);
                }
                invalid_code = true;
            }
        }
        if self
            .eligibility
            .is_whitelisted(user_id, window.event_id)
            .await
        {
            return Ok(AccessType::Whitelist);
        }
        if invalid_code {
            return Err(AdmissionError::InvalidAccessCode);
        }
        Err(AdmissionError::NotEligible)
    }

    async fn release(&self, token: LockToken) {
        match self.locks.release(token).await {
            Ok(true) => {}
            Ok(false) => warn!("admission lock expired before release"),
            Err(err) => warn!(error = %err, "admission lock release failed"),
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
