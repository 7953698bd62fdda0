//! Reward catalog and claim engine for the Velvet loyalty platform.
//!
//! Rewards are finite-supply catalog entries; claims debit the points ledger
//! and move through `Pending -> Approved -> Fulfilled`, with cancellation
//! refunding the debit. Supply accounting and the ledger are kept consistent
//! by compensating every partial failure.

pub mod engine;
pub mod error;
pub mod memory;
pub mod store;
pub mod types;

pub use engine::RedemptionEngine;
pub use error::RedemptionError;
pub use memory::InMemoryRewardStore;
pub use store::RewardStore;
pub use types::{ClaimReceipt, ClaimStatus, Reward, RewardCategory, RewardClaim};
