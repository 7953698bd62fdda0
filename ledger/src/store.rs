//! Ledger storage abstraction.
//!
//! The store owns the atomicity contract of the ledger: a debit checks the
//! balance and writes the new row inside one critical section, and
//! `balance_after` is derived there, never by the calling service. A
//! read-then-write implementation of this trait is incorrect under
//! concurrency, not merely slow.

use crate::error::LedgerError;
use crate::types::{PointsAccount, PointsTransaction, TransactionKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use velvet_core::{Points, UserId};

/// Storage for accounts and their append-only transaction history.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; the store is shared across
/// concurrent request handlers as `Arc<dyn LedgerStore>`.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Credits `amount` to the account, creating it if absent, and appends
    /// the transaction row in the same atomic step.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Overflow`] if the balance would overflow, or a
    /// store failure.
    async fn credit(
        &self,
        user_id: UserId,
        amount: Points,
        kind: TransactionKind,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<PointsTransaction, LedgerError>;

    /// Atomically debits `amount` if and only if the current balance covers
    /// it, appending the transaction row in the same step.
    ///
    /// Concurrent debits of one account serialize here; the race for the
    /// last point has exactly one winner.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] when the balance is
    /// short, or a store failure.
    async fn debit(
        &self,
        user_id: UserId,
        amount: Points,
        kind: TransactionKind,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<PointsTransaction, LedgerError>;

    /// Atomically debits the sender and credits the recipient, producing the
    /// `Transferred` and `Received` rows in one commit. Nothing is written
    /// if the sender's balance is short or the recipient cannot absorb the
    /// amount.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InsufficientBalance`] when the sender is
    /// short, [`LedgerError::Overflow`] when the recipient's balance or
    /// lifetime total would overflow, or a store failure.
    async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: Points,
        message: String,
        at: DateTime<Utc>,
    ) -> Result<(PointsTransaction, PointsTransaction), LedgerError>;

    /// Current balance; zero for accounts that do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn balance(&self, user_id: UserId) -> Result<Points, LedgerError>;

    /// The full account record, if it exists.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn account(&self, user_id: UserId) -> Result<Option<PointsAccount>, LedgerError>;

    /// Transaction history, most recent first, `limit` rows starting at
    /// `offset`.
    ///
    /// # Errors
    ///
    /// Returns a store failure if the read fails.
    async fn history(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PointsTransaction>, LedgerError>;
}
