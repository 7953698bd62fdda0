//! Presale storage abstraction.

use crate::error::AdmissionError;
use crate::types::{PresaleAccessGrant, PresaleWindow, WaitlistEntry};
use async_trait::async_trait;
use velvet_core::{EventId, UserId};

/// Storage for windows, grants, and the per-event waitlist.
///
/// `participant_count` must always read the committed count, never a cache:
/// the gate re-reads it while holding the admission lock and trusts the
/// answer.
#[async_trait]
pub trait PresaleStore: Send + Sync {
    /// Inserts or replaces the window for an event.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the write fails.
    async fn upsert_window(&self, window: PresaleWindow) -> Result<(), AdmissionError>;

    /// The event's window, if one has been opened.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn window(&self, event_id: EventId) -> Result<Option<PresaleWindow>, AdmissionError>;

    /// The member's grant for the event, if admitted.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn grant(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Option<PresaleAccessGrant>, AdmissionError>;

    /// Inserts a grant and increments the participant count in one step.
    /// Returns `false` without writing when the member already holds one.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the write fails.
    async fn insert_grant(&self, grant: PresaleAccessGrant) -> Result<bool, AdmissionError>;

    /// Removes the member's grant and decrements the participant count.
    /// Returns the removed grant, or `None` when there was nothing to
    /// remove.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the write fails.
    async fn remove_grant(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Option<PresaleAccessGrant>, AdmissionError>;

    /// Fresh committed participant count for the event.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn participant_count(&self, event_id: EventId) -> Result<u32, AdmissionError>;

    /// Appends the member to the event's waitlist and returns their 1-based
    /// position. Re-joining returns the existing position unchanged.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the write fails.
    async fn push_waitlist(&self, entry: WaitlistEntry) -> Result<usize, AdmissionError>;

    /// The member's 1-based waitlist position, if they are waiting.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn waitlist_position(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Option<usize>, AdmissionError>;

    /// Number of members waiting on the event.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn waitlist_len(&self, event_id: EventId) -> Result<usize, AdmissionError>;

    /// Removes and returns the longest-waiting member, if any.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the write fails.
    async fn pop_waitlist(&self, event_id: EventId) -> Result<Option<WaitlistEntry>, AdmissionError>;

    /// Removes the member's waitlist entry wherever it sits in the queue.
    /// Returns `true` when an entry was removed.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the write fails.
    async fn remove_waitlist(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<bool, AdmissionError>;
}
