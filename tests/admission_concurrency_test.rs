//! Concurrency tests for the admission controller.
//!
//! Verifies the governor never over-admits under parallel load and that
//! slot release discipline holds across tasks.

use std::sync::Arc;

use proctor::adapters::sqlite::{create_migrated_test_pool, SqliteProviderUsageRepository};
use proctor::domain::models::ProviderId;
use proctor::services::{
    AdmissionController, AdmissionDecision, ProviderBudgetLedger, RateLimitConfig,
};

async fn make_controller(max_concurrent: u32) -> Arc<AdmissionController> {
    let pool = create_migrated_test_pool().await.unwrap();
    let repo = Arc::new(SqliteProviderUsageRepository::new(pool));
    let ledger = Arc::new(ProviderBudgetLedger::new(
        repo,
        &[(ProviderId::Primary, 1_000_000), (ProviderId::Secondary, 100_000)],
    ));
    Arc::new(AdmissionController::new(
        RateLimitConfig {
            cooldown_secs: 0,
            max_concurrent,
            ..RateLimitConfig::default()
        },
        ledger,
    ))
}

#[tokio::test]
async fn test_parallel_requests_never_exceed_cap() {
    let controller = make_controller(2).await;

    // Issue 16 parallel requests from distinct agents while no slot is
    // released. Exactly the cap may be admitted.
    let mut handles = Vec::new();
    for i in 0..16 {
        let controller = controller.clone();
        handles.push(tokio::spawn(async move {
            let agent = format!("agent-{i}");
            controller
                .request_admission(&agent, None, ProviderId::Primary, 100)
                .await
        }));
    }

    let mut slots = Vec::new();
    let mut denied = 0u32;
    for handle in handles {
        match handle.await.unwrap() {
            AdmissionDecision::Allow(slot) => slots.push(slot),
            AdmissionDecision::Deny(_) => denied += 1,
        }
    }

    assert_eq!(slots.len(), 2, "exactly max_concurrent slots admitted");
    assert_eq!(denied, 14);
    assert_eq!(controller.active_count(), 2);

    drop(slots);
    assert_eq!(controller.active_count(), 0);
}

#[tokio::test]
async fn test_released_slots_recycle_under_load() {
    let controller = make_controller(2).await;

    // Three waves of admissions; each wave drops its slots before the next,
    // so every wave gets the full cap again.
    for wave in 0..3 {
        let mut slots = Vec::new();
        for i in 0..2 {
            let agent = format!("wave{wave}-agent{i}");
            match controller
                .request_admission(&agent, None, ProviderId::Primary, 100)
                .await
            {
                AdmissionDecision::Allow(slot) => slots.push(slot),
                AdmissionDecision::Deny(reason) => {
                    panic!("wave {wave} admission denied: {reason}")
                }
            }
        }
        assert_eq!(controller.active_count(), 2);
        drop(slots);
        assert_eq!(controller.active_count(), 0);
    }
}

#[tokio::test]
async fn test_slot_released_when_task_panics() {
    let controller = make_controller(1).await;

    let handle = {
        let controller = controller.clone();
        tokio::spawn(async move {
            let decision = controller
                .request_admission("doomed", None, ProviderId::Primary, 100)
                .await;
            assert!(decision.is_allowed());
            // The slot guard is alive on this task's stack when it panics.
            panic!("simulated task crash");
        })
    };

    assert!(handle.await.is_err());
    // Drop ran during unwind; the permit came back.
    assert_eq!(controller.active_count(), 0);

    let decision = controller
        .request_admission("successor", None, ProviderId::Primary, 100)
        .await;
    assert!(decision.is_allowed());
}

#[tokio::test]
async fn test_double_release_does_not_underflow() {
    let controller = make_controller(2).await;

    let first = controller
        .request_admission("a", None, ProviderId::Primary, 100)
        .await;
    let second = controller
        .request_admission("b", None, ProviderId::Primary, 100)
        .await;

    if let AdmissionDecision::Allow(slot) = first {
        slot.release();
        slot.release();
        drop(slot);
    }
    // Only one slot actually came back; the other is still held.
    assert_eq!(controller.active_count(), 1);
    drop(second);
    assert_eq!(controller.active_count(), 0);
}
