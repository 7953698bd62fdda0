//! Presale admission gate for the Velvet loyalty platform.
//!
//! Windows define who may enter and how many may be inside; the gate admits
//! members through a fixed priority of access paths and waitlists the rest
//! in FIFO order. Capacity decisions run under an event-scoped TTL lock so
//! the last slot is taken exactly once.

pub mod error;
pub mod gate;
pub mod lock;
pub mod memory;
pub mod store;
pub mod types;

pub use error::AdmissionError;
pub use gate::AdmissionGate;
pub use lock::{InMemoryLockService, LockService, LockToken, RedisLockService};
pub use memory::InMemoryPresaleStore;
pub use store::PresaleStore;
pub use types::{
    ticket_allowance, AccessCheck, EntryOutcome, PresaleAccessGrant, PresaleWindow,
    PromotionOutcome, QueueStatus, WaitlistEntry,
};
