//! Presale rush demo.
//!
//! Drives the whole stack in-process: members earn points for purchases,
//! forty of them rush a ten-slot presale window, the waitlist fills in
//! order, and the winners spend their points on a scarce reward.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use futures::future::join_all;
use rand::Rng;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use velvet_admission::{
    AdmissionError, AdmissionGate, EntryOutcome, InMemoryLockService, InMemoryPresaleStore,
    PresaleWindow,
};
use velvet_core::{
    EventBus, EventBusError, EventId, LoyaltyEvent, Points, RewardId, SystemClock, Tier, UserId,
};
use velvet_ledger::{InMemoryLedgerStore, PointsLedger, PurchaseCategory};
use velvet_redemption::{
    InMemoryRewardStore, RedemptionEngine, RedemptionError, Reward, RewardCategory,
};
use velvet_testing::StaticEligibility;

/// Logs every published event as one JSON line.
struct TracingEventBus;

#[async_trait]
impl EventBus for TracingEventBus {
    async fn publish(&self, event: LoyaltyEvent) -> Result<(), EventBusError> {
        let payload = serde_json::to_string(&event)
            .map_err(|err| EventBusError::PublishFailed(err.to_string()))?;
        info!(topic = event.topic(), event_type = event.event_type(), %payload, "event");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "presale_rush=info,velvet=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Velvet presale rush demo starting");

    let clock = Arc::new(SystemClock);
    let bus = Arc::new(TracingEventBus);
    let event_id = EventId::new();

    // Forty members across the tier ladder, all whitelisted as a fallback.
    let members: Vec<UserId> = (0..40).map(|_| UserId::new()).collect();
    let tiers = [
        Tier::Bronze,
        Tier::Silver,
        Tier::Gold,
        Tier::Platinum,
        Tier::Diamond,
    ];
    let mut eligibility = StaticEligibility::new();
    for (i, &member) in members.iter().enumerate() {
        eligibility = eligibility
            .with_tier(member, tiers[i % tiers.len()])
            .with_whitelisted(member, event_id);
    }
    let eligibility = Arc::new(eligibility);

    let ledger = Arc::new(PointsLedger::new(
        Arc::new(InMemoryLedgerStore::new()),
        clock.clone(),
        bus.clone(),
    ));
    let engine = Arc::new(RedemptionEngine::new(
        Arc::new(InMemoryRewardStore::new()),
        ledger.clone(),
        eligibility.clone(),
        clock.clone(),
        bus.clone(),
    ));
    let gate = Arc::new(AdmissionGate::new(
        Arc::new(InMemoryPresaleStore::new()),
        Arc::new(InMemoryLockService::new()),
        eligibility,
        clock,
        bus,
    ));

    // Act 1: everyone buys tickets and merch, earning points.
    info!("--- act 1: members earn points from purchases ---");
    for &member in &members {
        let mut rng = rand::thread_rng();
        let ticket_spend = rng.gen_range(5_000..=20_000);
        let merch_spend = rng.gen_range(1_000..=8_000);
        ledger
            .award_for_purchase(member, PurchaseCategory::Tickets, ticket_spend)
            .await?;
        ledger
            .award_for_purchase(member, PurchaseCategory::Merchandise, merch_spend)
            .await?;
    }

    // Act 2: the presale opens with ten slots and the rush hits.
    info!("--- act 2: forty members rush a ten-slot window ---");
    gate.open_window(PresaleWindow {
        event_id,
        starts_at: Utc::now() - Duration::minutes(1),
        ends_at: Utc::now() + Duration::hours(1),
        required_tier: Some(Tier::Gold),
        required_passes: Vec::new(),
        access_codes: vec!["VELVET25".into()],
        whitelist_only: false,
        max_participants: Some(10),
        current_participants: 0,
    })
    .await?;

    let entries: Vec<_> = members
        .iter()
        .map(|&member| {
            let gate = gate.clone();
            tokio::spawn(async move {
                // A little arrival jitter, then retry on Busy like a real
                // client would.
                let jitter = rand::thread_rng().gen_range(0..25);
                tokio::time::sleep(std::time::Duration::from_millis(jitter)).await;
                loop {
                    match gate.enter_presale(member, event_id, Some("VELVET25")).await {
                        Ok(outcome) => return Ok((member, outcome)),
                        Err(AdmissionError::Busy) => tokio::task::yield_now().await,
                        Err(other) => return Err(other),
                    }
                }
            })
        })
        .collect();

    let mut admitted = Vec::new();
    let mut waitlisted = 0usize;
    for entry in join_all(entries).await {
        match entry?? {
            (member, EntryOutcome::Admitted(grant)) => {
                admitted.push((member, grant.max_tickets));
            }
            (_, EntryOutcome::Waitlisted { .. }) => waitlisted += 1,
        }
    }
    info!(
        admitted = admitted.len(),
        waitlisted, "rush settled: capacity filled exactly once"
    );

    let status = gate.queue_status(event_id).await?;
    info!(
        participants = status.participants,
        waitlist = status.waitlist_len,
        wait_minutes = status.estimated_wait_minutes,
        "queue status"
    );

    // Act 3: one admitted member gives their slot back.
    info!("--- act 3: a slot frees up and the waitlist head moves in ---");
    let (leaver, _) = admitted[0];
    let promotion = gate.leave_presale(leaver, event_id).await?;
    info!(?promotion, "slot handed over");

    // Act 4: the admitted members race for one signed poster.
    info!("--- act 4: admitted members race for a one-unit reward ---");
    let poster = Reward {
        id: RewardId::new(),
        name: "signed tour poster".into(),
        cost: Points::new(500),
        category: RewardCategory::Collectible,
        total_supply: 1,
        claimed_supply: 0,
        tier_required: None,
        is_active: true,
        expires_at: None,
        created_at: Utc::now(),
    };
    engine.publish_reward(poster.clone()).await?;

    let claims: Vec<_> = admitted
        .iter()
        .skip(1)
        .map(|&(member, _)| {
            let engine = engine.clone();
            let reward_id = poster.id;
            tokio::spawn(async move { (member, engine.claim_reward(member, reward_id).await) })
        })
        .collect();

    let mut winner = None;
    let mut sold_out = 0usize;
    for claim in join_all(claims).await {
        match claim? {
            (member, Ok(receipt)) => {
                info!(user_id = %member, balance = %receipt.balance_after, "claim won");
                winner = Some((member, receipt));
            }
            (_, Err(RedemptionError::OutOfStock)) => sold_out += 1,
            (member, Err(other)) => {
                info!(user_id = %member, reason = other.reason_code(), "claim rejected");
            }
        }
    }
    info!(sold_out, "everyone else saw out_of_stock");

    // Act 5: the winner's claim walks the approval pipeline.
    if let Some((member, receipt)) = winner {
        info!("--- act 5: the winning claim is approved and fulfilled ---");
        engine.approve_claim(receipt.claim.id).await?;
        engine.fulfill_claim(receipt.claim.id).await?;
        let history = ledger.history(member, 5, 0).await?;
        for row in history {
            info!(
                kind = %row.kind,
                amount = %row.amount,
                balance_after = %row.balance_after,
                reason = %row.reason,
                "ledger row"
            );
        }
    }

    info!("demo complete");
    Ok(())
}
