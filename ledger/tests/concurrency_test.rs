//! Concurrent-spend races: the balance check and the write commit together,
//! so parallel debits can never overdraw an account.

#![allow(clippy::unwrap_used)]

use futures::future::join_all;
use std::sync::Arc;
use velvet_core::{Points, SystemClock, UserId};
use velvet_ledger::{InMemoryLedgerStore, LedgerError, PointsLedger};
use velvet_testing::RecordingEventBus;

fn shared_ledger() -> Arc<PointsLedger> {
    Arc::new(PointsLedger::new(
        Arc::new(InMemoryLedgerStore::new()),
        Arc::new(SystemClock),
        Arc::new(RecordingEventBus::new()),
    ))
}

#[tokio::test]
async fn last_points_have_exactly_one_winner() {
    let ledger = shared_ledger();
    let user = UserId::new();
    ledger
        .award_points(user, Points::new(100), "signup bonus")
        .await
        .unwrap();

    // Twenty tasks race to spend the full balance.
    let handles: Vec<_> = (0..20)
        .map(|i| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger
                    .spend_points(user, Points::new(100), format!("attempt {i}"))
                    .await
            })
        })
        .collect();

    let results = join_all(handles).await;
    let mut winners = 0;
    let mut losers = 0;
    for result in results {
        match result.unwrap() {
            Ok(_) => winners += 1,
            Err(LedgerError::InsufficientBalance { .. }) => losers += 1,
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(losers, 19);
    assert_eq!(ledger.balance(user).await.unwrap(), Points::ZERO);
}

#[tokio::test]
async fn concurrent_spends_never_overdraw() {
    let ledger = shared_ledger();
    let user = UserId::new();
    ledger
        .award_points(user, Points::new(250), "signup bonus")
        .await
        .unwrap();

    // 250 points cover at most two 100-point spends.
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move { ledger.spend_points(user, Points::new(100), "spend").await })
        })
        .collect();

    let results = join_all(handles).await;
    let winners = results
        .into_iter()
        .filter(|r| matches!(r, Ok(Ok(_))))
        .count();

    assert_eq!(winners, 2);
    assert_eq!(ledger.balance(user).await.unwrap(), Points::new(50));
}

#[tokio::test]
async fn concurrent_transfers_conserve_total_points() {
    let ledger = shared_ledger();
    let alice = UserId::new();
    let bob = UserId::new();
    ledger
        .award_points(alice, Points::new(1000), "seed")
        .await
        .unwrap();
    ledger
        .award_points(bob, Points::new(1000), "seed")
        .await
        .unwrap();

    // Both directions at once, 50 transfers of 10 points each way.
    let mut handles = Vec::new();
    for _ in 0..50 {
        let l = ledger.clone();
        handles.push(tokio::spawn(async move {
            l.transfer_points(alice, bob, Points::new(10), "ping").await
        }));
        let l = ledger.clone();
        handles.push(tokio::spawn(async move {
            l.transfer_points(bob, alice, Points::new(10), "pong").await
        }));
    }
    for result in join_all(handles).await {
        result.unwrap().unwrap();
    }

    let alice_balance = ledger.balance(alice).await.unwrap();
    let bob_balance = ledger.balance(bob).await.unwrap();
    assert_eq!(alice_balance, Points::new(1000));
    assert_eq!(bob_balance, Points::new(1000));
}
