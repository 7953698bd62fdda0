//! In-memory presale store.

use crate::error::AdmissionError;
use crate::store::PresaleStore;
use crate::types::{PresaleAccessGrant, PresaleWindow, WaitlistEntry};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use velvet_core::{EventId, StoreError, UserId};

#[derive(Default)]
struct PresaleState {
    windows: HashMap<EventId, PresaleWindow>,
    grants: HashMap<(UserId, EventId), PresaleAccessGrant>,
    waitlists: HashMap<EventId, VecDeque<WaitlistEntry>>,
}

/// Hash-map presale store for tests, demos, and single-node deployments.
#[derive(Default)]
pub struct InMemoryPresaleStore {
    state: Mutex<PresaleState>,
}

impl InMemoryPresaleStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, PresaleState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("presale state mutex poisoned".into()))
    }
}

#[async_trait]
impl PresaleStore for InMemoryPresaleStore {
    async fn upsert_window(&self, window: PresaleWindow) -> Result<(), AdmissionError> {
        let mut state = self.lock()?;
        state.windows.insert(window.event_id, window);
        Ok(())
    }

    async fn window(&self, event_id: EventId) -> Result<Option<PresaleWindow>, AdmissionError> {
        let state = self.lock()?;
        Ok(state.windows.get(&event_id).cloned())
    }

    async fn grant(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Option<PresaleAccessGrant>, AdmissionError> {
        let state = self.lock()?;
        Ok(state.grants.get(&(user_id, event_id)).cloned())
    }

    async fn insert_grant(&self, grant: PresaleAccessGrant) -> Result<bool, AdmissionError> {
        let mut state = self.lock()?;
        let key = (grant.user_id, grant.event_id);
        if state.grants.contains_key(&key) {
            return Ok(false);
        }
        let event_id = grant.event_id;
        state.grants.insert(key, grant);
        if let Some(window) = state.windows.get_mut(&event_id) {
            window.current_participants += 1;
        }
        Ok(true)
    }

    async fn remove_grant(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Option<PresaleAccessGrant>, AdmissionError> {
        let mut state = self.lock()?;
        let removed = state.grants.remove(&(user_id, event_id));
        if removed.is_some() {
            if let Some(window) = state.windows.get_mut(&event_id) {
                window.current_participants = window.current_participants.saturating_sub(1);
            }
        }
        Ok(removed)
    }

    async fn participant_count(&self, event_id: EventId) -> Result<u32, AdmissionError> {
        let state = self.lock()?;
        Ok(state
            .windows
            .get(&event_id)
            .map_or(0, |window| window.current_participants))
    }

    async fn push_waitlist(&self, entry: WaitlistEntry) -> Result<usize, AdmissionError> {
        let mut state = self.lock()?;
        let queue = state.waitlists.entry(entry.event_id).or_default();
        if let Some(position) = queue.iter().position(|e| e.user_id == entry.user_id) {
            return Ok(position + 1);
        }
        queue.push_back(entry);
        Ok(queue.len())
    }

    async fn waitlist_position(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Option<usize>, AdmissionError> {
        let state = self.lock()?;
        Ok(state.waitlists.get(&event_id).and_then(|queue| {
            queue
                .iter()
                .position(|entry| entry.user_id == user_id)
                .map(|index| index + 1)
        }))
    }

    async fn waitlist_len(&self, event_id: EventId) -> Result<usize, AdmissionError> {
        let state = self.lock()?;
        Ok(state.waitlists.get(&event_id).map_or(0, VecDeque::len))
    }

    async fn pop_waitlist(
        &self,
        event_id: EventId,
    ) -> Result<Option<WaitlistEntry>, AdmissionError> {
        let mut state = self.lock()?;
        Ok(state
            .waitlists
            .get_mut(&event_id)
            .and_then(VecDeque::pop_front))
    }

    async fn remove_waitlist(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<bool, AdmissionError> {
        let mut state = self.lock()?;
        let Some(queue) = state.waitlists.get_mut(&event_id) else {
            return Ok(false);
        };
        let Some(index) = queue.iter().position(|entry| entry.user_id == user_id) else {
            return Ok(false);
        };
        let _ = queue.remove(index);
        Ok(true)
    }
}
