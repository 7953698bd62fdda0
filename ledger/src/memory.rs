//! In-memory ledger store.
//!
//! One mutex guards the accounts and the history together, so a debit's
//! balance check, the balance write, and the appended row all commit in the
//! same critical section.

use crate::error::LedgerError;
use crate::store::LedgerStore;
use crate::types::{PointsAccount, PointsTransaction, TransactionKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use velvet_core::{Points, StoreError, TransactionId, UserId};

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<UserId, PointsAccount>,
    history: HashMap<UserId, Vec<PointsTransaction>>,
}

/// Hash-map ledger store for tests, demos, and single-node deployments.
#[derive(Default)]
pub struct InMemoryLedgerStore {
    state: Mutex<LedgerState>,
}

impl InMemoryLedgerStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Backend("ledger state mutex poisoned".into()))
    }
}

/// Applies a credit to `state` and appends the row. Caller holds the lock.
fn apply_credit(
    state: &mut LedgerState,
    user_id: UserId,
    amount: Points,
    kind: TransactionKind,
    reason: String,
    at: DateTime<Utc>,
) -> Result<PointsTransaction, LedgerError> {
    let account = state
        .accounts
        .entry(user_id)
        .or_insert_with(|| PointsAccount::new(user_id, at));
    let balance = account
        .balance
        .checked_add(amount)
        .ok_or(LedgerError::Overflow)?;
    let lifetime_earned = account
        .lifetime_earned
        .checked_add(amount)
        .ok_or(LedgerError::Overflow)?;
    account.balance = balance;
    account.lifetime_earned = lifetime_earned;

    let tx = PointsTransaction {
        id: TransactionId::new(),
        user_id,
        kind,
        amount,
        balance_after: balance,
        reason,
        recorded_at: at,
    };
    state.history.entry(user_id).or_default().push(tx.clone());
    Ok(tx)
}

/// Applies a balance-checked debit to `state` and appends the row. Caller
/// holds the lock; on `InsufficientBalance` nothing has been written.
fn apply_debit(
    state: &mut LedgerState,
    user_id: UserId,
    amount: Points,
    kind: TransactionKind,
    reason: String,
    at: DateTime<Utc>,
) -> Result<PointsTransaction, LedgerError> {
    let account = state
        .accounts
        .entry(user_id)
        .or_insert_with(|| PointsAccount::new(user_id, at));
    let balance = account
        .balance
        .checked_sub(amount)
        .ok_or(LedgerError::InsufficientBalance {
            balance: account.balance,
            required: amount,
        })?;
    account.balance = balance;
    account.lifetime_spent = account.lifetime_spent.saturating_add(amount);

    let tx = PointsTransaction {
        id: TransactionId::new(),
        user_id,
        kind,
        amount,
        balance_after: balance,
        reason,
        recorded_at: at,
    };
    state.history.entry(user_id).or_default().push(tx.clone());
    Ok(tx)
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn credit(
        &self,
        user_id: UserId,
        amount: Points,
        kind: TransactionKind,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<PointsTransaction, LedgerError> {
        let mut state = self.lock()?;
        apply_credit(&mut state, user_id, amount, kind, reason, at)
    }

    async fn debit(
        &self,
        user_id: UserId,
        amount: Points,
        kind: TransactionKind,
        reason: String,
        at: DateTime<Utc>,
    ) -> Result<PointsTransaction, LedgerError> {
        let mut state = self.lock()?;
        apply_debit(&mut state, user_id, amount, kind, reason, at)
    }

    async fn transfer(
        &self,
        from: UserId,
        to: UserId,
        amount: Points,
        message: String,
        at: DateTime<Utc>,
    ) -> Result<(PointsTransaction, PointsTransaction), LedgerError> {
        let mut state = self.lock()?;
        // Both balance checks happen before either account mutates, so a
        // short sender or a saturated recipient leaves nothing written.
        if let Some(account) = state.accounts.get(&to) {
            if account.balance.checked_add(amount).is_none()
                || account.lifetime_earned.checked_add(amount).is_none()
            {
                return Err(LedgerError::Overflow);
            }
        }
        let sent = apply_debit(
            &mut state,
            from,
            amount,
            TransactionKind::Transferred,
            message.clone(),
            at,
        )?;
        let received = apply_credit(&mut state, to, amount, TransactionKind::Received, message, at)?;
        Ok((sent, received))
    }

    async fn balance(&self, user_id: UserId) -> Result<Points, LedgerError> {
        let state = self.lock()?;
        Ok(state
            .accounts
            .get(&user_id)
            .map_or(Points::ZERO, |account| account.balance))
    }

    async fn account(&self, user_id: UserId) -> Result<Option<PointsAccount>, LedgerError> {
        let state = self.lock()?;
        Ok(state.accounts.get(&user_id).cloned())
    }

    async fn history(
        &self,
        user_id: UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<PointsTransaction>, LedgerError> {
        let state = self.lock()?;
        Ok(state.history.get(&user_id).map_or_else(Vec::new, |rows| {
            rows.iter()
                .rev()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect()
        }))
    }
}
