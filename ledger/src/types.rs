//! Domain types for the points ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use velvet_core::{Points, TransactionId, UserId};

/// A member's points account.
///
/// Accounts are created lazily on first mutation and mutated only through
/// ledger transactions; the balance can never go negative.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsAccount {
    /// Owning member
    pub user_id: UserId,
    /// Current spendable balance
    pub balance: Points,
    /// Total points ever credited
    pub lifetime_earned: Points,
    /// Total points ever debited
    pub lifetime_spent: Points,
    /// When the account was first touched
    pub created_at: DateTime<Utc>,
}

impl PointsAccount {
    /// Creates an empty account.
    #[must_use]
    pub const fn new(user_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance: Points::ZERO,
            lifetime_earned: Points::ZERO,
            lifetime_spent: Points::ZERO,
            created_at,
        }
    }
}

/// How a ledger transaction moved points.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionKind {
    /// Credit from an award or a refund
    Earned,
    /// Debit from a spend or a claim
    Spent,
    /// Debit side of a transfer
    Transferred,
    /// Credit side of a transfer
    Received,
}

impl TransactionKind {
    /// Whether this kind credits the account.
    #[must_use]
    pub const fn is_credit(self) -> bool {
        matches!(self, Self::Earned | Self::Received)
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Earned => "earned",
            Self::Spent => "spent",
            Self::Transferred => "transferred",
            Self::Received => "received",
        };
        f.write_str(name)
    }
}

/// One immutable row of the audit trail.
///
/// `balance_after` is derived inside the same atomic step that persists the
/// row, so the history independently audits every balance the account has
/// ever held.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsTransaction {
    /// Transaction identifier
    pub id: TransactionId,
    /// Account the row belongs to
    pub user_id: UserId,
    /// Movement direction
    pub kind: TransactionKind,
    /// Amount moved (always positive)
    pub amount: Points,
    /// Account balance immediately after this row committed
    pub balance_after: Points,
    /// Why the points moved
    pub reason: String,
    /// Commit time
    pub recorded_at: DateTime<Utc>,
}

/// Purchase categories with distinct earn rates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PurchaseCategory {
    /// Ticket purchases
    Tickets,
    /// Merchandise purchases
    Merchandise,
    /// Food and drink
    Concessions,
    /// Experience add-ons
    Experiences,
}

impl fmt::Display for PurchaseCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Tickets => "tickets",
            Self::Merchandise => "merchandise",
            Self::Concessions => "concessions",
            Self::Experiences => "experiences",
        };
        f.write_str(name)
    }
}

/// Table-driven conversion from purchase spend to points.
///
/// A default points-per-dollar rate, overridable per category, scaled by a
/// global multiplier in basis points (10000 = 1x).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarnSchedule {
    default_rate: u64,
    overrides: HashMap<PurchaseCategory, u64>,
    multiplier_bps: u64,
}

impl EarnSchedule {
    /// Platform default: 10 points per dollar, no overrides, 1x multiplier.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            default_rate: 10,
            overrides: HashMap::new(),
            multiplier_bps: 10_000,
        }
    }

    /// Creates a schedule with an explicit default points-per-dollar rate.
    #[must_use]
    pub fn with_default_rate(rate: u64) -> Self {
        Self {
            default_rate: rate,
            overrides: HashMap::new(),
            multiplier_bps: 10_000,
        }
    }

    /// Overrides the rate for one category.
    #[must_use]
    pub fn override_category(mut self, category: PurchaseCategory, rate: u64) -> Self {
        self.overrides.insert(category, rate);
        self
    }

    /// Sets the global multiplier in basis points (10000 = 1x).
    #[must_use]
    pub fn with_multiplier_bps(mut self, multiplier_bps: u64) -> Self {
        self.multiplier_bps = multiplier_bps;
        self
    }

    /// Points earned for a purchase of `spend_cents` in `category`.
    ///
    /// Rounds down; a purchase too small to earn a whole point earns zero.
    #[must_use]
    pub fn points_for(&self, category: PurchaseCategory, spend_cents: u64) -> Points {
        let rate = self
            .overrides
            .get(&category)
            .copied()
            .unwrap_or(self.default_rate);
        let raw = u128::from(spend_cents) * u128::from(rate) / 100;
        let scaled = raw * u128::from(self.multiplier_bps) / 10_000;
        Points::new(u64::try_from(scaled).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_schedule_is_ten_per_dollar() {
        let schedule = EarnSchedule::standard();
        assert_eq!(
            schedule.points_for(PurchaseCategory::Tickets, 2500),
            Points::new(250)
        );
    }

    #[test]
    fn category_override_wins() {
        let schedule =
            EarnSchedule::standard().override_category(PurchaseCategory::Merchandise, 5);
        assert_eq!(
            schedule.points_for(PurchaseCategory::Merchandise, 1000),
            Points::new(50)
        );
        assert_eq!(
            schedule.points_for(PurchaseCategory::Tickets, 1000),
            Points::new(100)
        );
    }

    #[test]
    fn multiplier_scales_in_basis_points() {
        // 1.5x promotion
        let schedule = EarnSchedule::standard().with_multiplier_bps(15_000);
        assert_eq!(
            schedule.points_for(PurchaseCategory::Tickets, 1000),
            Points::new(150)
        );
    }

    #[test]
    fn sub_point_purchases_earn_nothing() {
        let schedule = EarnSchedule::with_default_rate(1);
        assert_eq!(
            schedule.points_for(PurchaseCategory::Concessions, 99),
            Points::ZERO
        );
    }
}
