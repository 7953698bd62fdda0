//! Ledger behavior tests: award, spend, transfer, history, and events.

#![allow(clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use std::sync::Arc;
use velvet_core::{LoyaltyEvent, Points, UserId};
use velvet_ledger::{
    EarnSchedule, InMemoryLedgerStore, LedgerError, PointsLedger, PurchaseCategory,
    TransactionKind,
};
use velvet_testing::{FixedClock, RecordingEventBus};

fn ledger_with_bus() -> (PointsLedger, Arc<RecordingEventBus>) {
    let clock = Arc::new(FixedClock::at(
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
    ));
    let bus = Arc::new(RecordingEventBus::new());
    let ledger = PointsLedger::new(Arc::new(InMemoryLedgerStore::new()), clock, bus.clone());
    (ledger, bus)
}

fn ledger() -> PointsLedger {
    ledger_with_bus().0
}

#[tokio::test]
async fn award_credits_balance_and_publishes() {
    let (ledger, bus) = ledger_with_bus();
    let user = UserId::new();

    let tx = ledger
        .award_points(user, Points::new(100), "signup bonus")
        .await
        .unwrap();

    assert_eq!(tx.amount, Points::new(100));
    assert_eq!(tx.balance_after, Points::new(100));
    assert_eq!(tx.kind, TransactionKind::Earned);
    assert_eq!(ledger.balance(user).await.unwrap(), Points::new(100));

    let events = bus.on_topic("ledger");
    assert_eq!(events.len(), 1);
    match &events[0] {
        LoyaltyEvent::PointsEarned {
            user_id,
            amount,
            balance,
            reason,
        } => {
            assert_eq!(*user_id, user);
            assert_eq!(*amount, Points::new(100));
            assert_eq!(*balance, Points::new(100));
            assert_eq!(reason, "signup bonus");
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn zero_amount_award_is_rejected() {
    let ledger = ledger();
    let user = UserId::new();

    let err = ledger.award_points(user, Points::ZERO, "noop").await;
    assert!(matches!(err, Err(LedgerError::InvalidAmount)));
}

#[tokio::test]
async fn overdraw_is_rejected_and_balance_untouched() {
    let (ledger, bus) = ledger_with_bus();
    let user = UserId::new();
    ledger
        .award_points(user, Points::new(100), "signup bonus")
        .await
        .unwrap();
    bus.clear();

    let err = ledger
        .spend_points(user, Points::new(150), "concert ticket")
        .await;
    match err {
        Err(LedgerError::InsufficientBalance { balance, required }) => {
            assert_eq!(balance, Points::new(100));
            assert_eq!(required, Points::new(150));
        }
        other => panic!("expected InsufficientBalance, got {other:?}"),
    }

    // Nothing committed: balance, history, and the bus are all untouched.
    assert_eq!(ledger.balance(user).await.unwrap(), Points::new(100));
    assert_eq!(ledger.history(user, 10, 0).await.unwrap().len(), 1);
    assert!(bus.is_empty());
}

#[tokio::test]
async fn spend_debits_and_records_balance_after() {
    let ledger = ledger();
    let user = UserId::new();
    ledger
        .award_points(user, Points::new(500), "signup bonus")
        .await
        .unwrap();

    let tx = ledger
        .spend_points(user, Points::new(200), "merch discount")
        .await
        .unwrap();

    assert_eq!(tx.kind, TransactionKind::Spent);
    assert_eq!(tx.balance_after, Points::new(300));
    assert_eq!(ledger.balance(user).await.unwrap(), Points::new(300));
}

#[tokio::test]
async fn transfer_moves_points_and_writes_both_rows() {
    let (ledger, bus) = ledger_with_bus();
    let alice = UserId::new();
    let bob = UserId::new();
    ledger
        .award_points(alice, Points::new(200), "signup bonus")
        .await
        .unwrap();
    ledger
        .award_points(bob, Points::new(10), "signup bonus")
        .await
        .unwrap();
    bus.clear();

    let (sent, received) = ledger
        .transfer_points(alice, bob, Points::new(50), "happy birthday")
        .await
        .unwrap();

    assert_eq!(sent.kind, TransactionKind::Transferred);
    assert_eq!(sent.balance_after, Points::new(150));
    assert_eq!(received.kind, TransactionKind::Received);
    assert_eq!(received.balance_after, Points::new(60));
    assert_eq!(ledger.balance(alice).await.unwrap(), Points::new(150));
    assert_eq!(ledger.balance(bob).await.unwrap(), Points::new(60));

    // One row on each side of the transfer.
    let alice_rows = ledger.history(alice, 10, 0).await.unwrap();
    let bob_rows = ledger.history(bob, 10, 0).await.unwrap();
    assert_eq!(alice_rows[0].kind, TransactionKind::Transferred);
    assert_eq!(bob_rows[0].kind, TransactionKind::Received);

    let events = bus.on_topic("ledger");
    assert_eq!(events.len(), 1);
    assert!(matches!(
        events[0],
        LoyaltyEvent::PointsTransferred {
            sender_balance,
            recipient_balance,
            ..
        } if sender_balance == Points::new(150) && recipient_balance == Points::new(60)
    ));
}

#[tokio::test]
async fn transfer_to_self_is_rejected() {
    let ledger = ledger();
    let user = UserId::new();
    ledger
        .award_points(user, Points::new(100), "signup bonus")
        .await
        .unwrap();

    let err = ledger
        .transfer_points(user, user, Points::new(10), "loop")
        .await;
    assert!(matches!(err, Err(LedgerError::SelfTransfer)));
}

#[tokio::test]
async fn short_transfer_writes_nothing() {
    let ledger = ledger();
    let alice = UserId::new();
    let bob = UserId::new();
    ledger
        .award_points(alice, Points::new(30), "signup bonus")
        .await
        .unwrap();

    let err = ledger
        .transfer_points(alice, bob, Points::new(50), "too much")
        .await;
    assert!(matches!(err, Err(LedgerError::InsufficientBalance { .. })));
    assert_eq!(ledger.balance(alice).await.unwrap(), Points::new(30));
    assert_eq!(ledger.balance(bob).await.unwrap(), Points::ZERO);
    assert!(ledger.history(bob, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn transfer_to_saturated_recipient_writes_nothing() {
    let ledger = ledger();
    let alice = UserId::new();
    let bob = UserId::new();
    ledger
        .award_points(alice, Points::new(100), "signup bonus")
        .await
        .unwrap();
    ledger
        .award_points(bob, Points::new(u64::MAX), "everything")
        .await
        .unwrap();

    let err = ledger
        .transfer_points(alice, bob, Points::new(50), "one more")
        .await;
    assert!(matches!(err, Err(LedgerError::Overflow)));

    // The sender keeps the full balance and neither side grows a row.
    assert_eq!(ledger.balance(alice).await.unwrap(), Points::new(100));
    assert_eq!(ledger.balance(bob).await.unwrap(), Points::new(u64::MAX));
    assert_eq!(ledger.history(alice, 10, 0).await.unwrap().len(), 1);
    assert_eq!(ledger.history(bob, 10, 0).await.unwrap().len(), 1);
}

#[tokio::test]
async fn purchase_award_follows_the_schedule() {
    let clock = Arc::new(FixedClock::at(
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap(),
    ));
    let bus = Arc::new(RecordingEventBus::new());
    let schedule = EarnSchedule::standard()
        .override_category(PurchaseCategory::Tickets, 20)
        .with_multiplier_bps(15_000);
    let ledger = PointsLedger::with_schedule(
        Arc::new(InMemoryLedgerStore::new()),
        clock,
        bus,
        schedule,
    );
    let user = UserId::new();

    // $40.00 of tickets at 20/dollar with a 1.5x multiplier.
    let tx = ledger
        .award_for_purchase(user, PurchaseCategory::Tickets, 4000)
        .await
        .unwrap();
    assert_eq!(tx.amount, Points::new(1200));
    assert_eq!(tx.reason, "tickets purchase");

    // $2.50 of concessions at the default 10/dollar and 1.5x: 37 points.
    let tx = ledger
        .award_for_purchase(user, PurchaseCategory::Concessions, 250)
        .await
        .unwrap();
    assert_eq!(tx.amount, Points::new(37));
}

#[tokio::test]
async fn tiny_purchase_earns_nothing_and_writes_nothing() {
    let ledger = ledger();
    let user = UserId::new();

    let err = ledger
        .award_for_purchase(user, PurchaseCategory::Concessions, 5)
        .await;
    assert!(matches!(err, Err(LedgerError::InvalidAmount)));
    assert!(ledger.history(user, 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn history_pages_most_recent_first() {
    let ledger = ledger();
    let user = UserId::new();
    for i in 1..=5u64 {
        ledger
            .award_points(user, Points::new(i * 10), format!("award {i}"))
            .await
            .unwrap();
    }

    let page = ledger.history(user, 2, 0).await.unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].reason, "award 5");
    assert_eq!(page[1].reason, "award 4");

    let page = ledger.history(user, 2, 4).await.unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].reason, "award 1");
}

#[tokio::test]
async fn account_tracks_lifetime_totals() {
    let ledger = ledger();
    let user = UserId::new();
    ledger
        .award_points(user, Points::new(300), "signup bonus")
        .await
        .unwrap();
    ledger
        .spend_points(user, Points::new(120), "merch discount")
        .await
        .unwrap();

    let account = ledger.account(user).await.unwrap().unwrap();
    assert_eq!(account.balance, Points::new(180));
    assert_eq!(account.lifetime_earned, Points::new(300));
    assert_eq!(account.lifetime_spent, Points::new(120));
}

#[tokio::test]
async fn unknown_account_reads_as_zero() {
    let ledger = ledger();
    let user = UserId::new();

    assert_eq!(ledger.balance(user).await.unwrap(), Points::ZERO);
    assert!(ledger.account(user).await.unwrap().is_none());
}
