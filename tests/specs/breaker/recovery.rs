// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A failing dependency is cut off, probed, and restored.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tandem_breaker::{BreakerError, BreakerRegistry, BreakerState};
use tandem_core::{BreakerConfig, FakeClock};

fn registry(clock: &FakeClock) -> BreakerRegistry<FakeClock> {
    BreakerRegistry::with_clock(
        BreakerConfig::new()
            .with_max_failures(5)
            .with_failure_window(Duration::from_secs(60))
            .with_timeout(Duration::from_secs(300))
            .with_half_open_attempts(3),
        clock.clone(),
    )
    .unwrap()
}

#[tokio::test]
async fn failing_dependency_is_cut_off_then_restored() {
    let clock = FakeClock::new();
    let breakers = registry(&clock);
    let calls = AtomicUsize::new(0);

    // 5 failures within 10 seconds
    for _ in 0..5 {
        let result = breakers
            .call("odds_api", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>("503")
            })
            .await;
        assert!(matches!(result, Err(BreakerError::Inner("503"))));
        clock.advance(Duration::from_secs(2));
    }
    assert_eq!(breakers.state("odds_api").unwrap().state, BreakerState::Open);

    // Fails fast until the timeout passes
    for _ in 0..4 {
        clock.advance(Duration::from_secs(60));
        let result = breakers
            .call("odds_api", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(())
            })
            .await;
        assert!(result.unwrap_err().is_open());
    }
    assert_eq!(calls.load(Ordering::SeqCst), 5);

    // Unrelated dependency is unaffected
    breakers
        .call("feature_db", || async { Ok::<_, &str>(()) })
        .await
        .unwrap();

    clock.advance(Duration::from_secs(60));
    for _ in 0..3 {
        breakers
            .call("odds_api", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>(())
            })
            .await
            .unwrap();
    }

    let snapshot = breakers.state("odds_api").unwrap();
    assert_eq!(snapshot.state, BreakerState::Closed);
    assert_eq!(snapshot.failure_count, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 8);
}

#[tokio::test]
async fn operator_reset_restores_service_immediately() {
    let clock = FakeClock::new();
    let breakers = registry(&clock);
    for _ in 0..5 {
        let _ = breakers
            .call("odds_api", || async { Err::<(), _>("503") })
            .await;
    }

    assert!(breakers.reset("odds_api"));

    breakers
        .call("odds_api", || async { Ok::<_, &str>(()) })
        .await
        .unwrap();
    assert_eq!(breakers.state("odds_api").unwrap().state, BreakerState::Closed);
}
