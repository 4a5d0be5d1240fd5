#![allow(clippy::unwrap_used)]

use super::*;
use crate::store::InMemoryStore;
use std::sync::atomic::AtomicUsize;
use std::time::Duration;

fn dependency_failure() -> GatewayError {
    GatewayError::DependencyFailure {
        dependency: "resources".to_string(),
        message: "HTTP 500".to_string(),
    }
}

fn breaker(config: CircuitConfig) -> (CircuitBreaker, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::new());
    (CircuitBreaker::new(config, store.clone()), store)
}

async fn fail(breaker: &CircuitBreaker, dependency: &str) -> Result<(), GatewayError> {
    breaker.execute(dependency, || async { Err::<(), _>(dependency_failure()) }).await
}

async fn succeed(breaker: &CircuitBreaker, dependency: &str) -> Result<(), GatewayError> {
    breaker.execute(dependency, || async { Ok(()) }).await
}

#[tokio::test]
async fn test_opens_after_threshold_and_short_circuits_with_fallback() {
    let config = CircuitConfig {
        failure_threshold: 5,
        success_threshold: 2,
        open_timeout_ms: 60_000,
        ..CircuitConfig::default()
    };
    let (breaker, _) = breaker(config);

    for _ in 0..4 {
        let _ = fail(&breaker, "resources").await;
        assert_eq!(breaker.get_state("resources").await, CircuitState::Closed);
    }
    let _ = fail(&breaker, "resources").await;
    assert_eq!(breaker.get_state("resources").await, CircuitState::Open);

    let calls = AtomicUsize::new(0);
    let result = breaker
        .execute_with_fallback(
            "resources",
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok("live")
            },
            |_| "fallback",
        )
        .await;

    assert_eq!(result.unwrap(), "fallback");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(breaker.short_circuits(), 1);
    assert_eq!(breaker.total_trips(), 1);
}

#[tokio::test]
async fn test_dependency_failures_surface_as_unavailable() {
    let (breaker, _) = breaker(CircuitConfig::default());

    let err = fail(&breaker, "auth").await.unwrap_err();
    assert!(matches!(err, GatewayError::ServiceUnavailable { ref dependency, .. } if dependency == "auth"));
    assert_eq!(breaker.get_record("auth").await.consecutive_failures, 1);
}

#[tokio::test]
async fn test_open_without_fallback_reports_retry_hint() {
    let config = CircuitConfig { failure_threshold: 1, ..CircuitConfig::default() };
    let (breaker, _) = breaker(config);

    let _ = fail(&breaker, "auth").await;
    let err = succeed(&breaker, "auth").await.unwrap_err();
    match err {
        GatewayError::CircuitOpen { dependency, retry_after_ms } => {
            assert_eq!(dependency, "auth");
            assert!(retry_after_ms > 0 && retry_after_ms <= 60_000);
        },
        other => panic!("expected CircuitOpen, got {other:?}"),
    }
}

#[tokio::test]
async fn test_success_resets_failures() {
    let (breaker, _) = breaker(CircuitConfig::default());

    let _ = fail(&breaker, "auth").await;
    let _ = fail(&breaker, "auth").await;
    succeed(&breaker, "auth").await.unwrap();

    let record = breaker.get_record("auth").await;
    assert_eq!(record.state, CircuitState::Closed);
    assert_eq!(record.consecutive_failures, 0);
}

#[tokio::test]
async fn test_client_errors_do_not_count_as_failures() {
    let config = CircuitConfig { failure_threshold: 2, ..CircuitConfig::default() };
    let (breaker, _) = breaker(config);

    let _ = fail(&breaker, "auth").await;
    for _ in 0..5 {
        let err = breaker
            .execute("auth", || async {
                Err::<(), _>(GatewayError::ClientError {
                    status: 404,
                    body: serde_json::json!({"message": "no such room"}),
                })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ClientError { status: 404, .. }));
    }

    let record = breaker.get_record("auth").await;
    assert_eq!(record.state, CircuitState::Closed);
    assert_eq!(record.consecutive_failures, 0);
}

#[tokio::test]
async fn test_half_open_recovery() {
    let config = CircuitConfig {
        failure_threshold: 2,
        success_threshold: 2,
        open_timeout_ms: 20,
        ..CircuitConfig::default()
    };
    let (breaker, _) = breaker(config);

    let _ = fail(&breaker, "acc").await;
    let _ = fail(&breaker, "acc").await;
    assert_eq!(breaker.get_state("acc").await, CircuitState::Open);

    tokio::time::sleep(Duration::from_millis(30)).await;

    succeed(&breaker, "acc").await.unwrap();
    let record = breaker.get_record("acc").await;
    assert_eq!(record.state, CircuitState::HalfOpen);
    assert_eq!(record.consecutive_successes, 1);
    assert_eq!(record.consecutive_failures, 0);

    succeed(&breaker, "acc").await.unwrap();
    let record = breaker.get_record("acc").await;
    assert_eq!(record.state, CircuitState::Closed);
    assert_eq!(record.consecutive_successes, 0);
    assert_eq!(record.consecutive_failures, 0);
}

#[tokio::test]
async fn test_half_open_failure_reopens_below_threshold() {
    let config = CircuitConfig {
        failure_threshold: 3,
        success_threshold: 2,
        open_timeout_ms: 20,
        ..CircuitConfig::default()
    };
    let (breaker, _) = breaker(config);

    for _ in 0..3 {
        let _ = fail(&breaker, "acc").await;
    }
    tokio::time::sleep(Duration::from_millis(30)).await;

    succeed(&breaker, "acc").await.unwrap();
    assert_eq!(breaker.get_state("acc").await, CircuitState::HalfOpen);

    let _ = fail(&breaker, "acc").await;
    let record = breaker.get_record("acc").await;
    assert_eq!(record.state, CircuitState::Open);
    assert_eq!(record.consecutive_failures, 1);
    assert_eq!(breaker.total_trips(), 2);
}

#[tokio::test]
async fn test_state_is_shared_through_store() {
    let store = Arc::new(InMemoryStore::new());
    let config = CircuitConfig { failure_threshold: 1, ..CircuitConfig::default() };
    let first = CircuitBreaker::new(config, store.clone());
    let second = CircuitBreaker::new(config, store.clone());

    let _ = fail(&first, "reservations").await;

    let calls = AtomicUsize::new(0);
    let result = second
        .execute("reservations", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await;
    assert!(matches!(result, Err(GatewayError::CircuitOpen { .. })));
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let raw = store.get("circuit:reservations").await.unwrap().unwrap();
    let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(json["state"], "OPEN");
}

#[tokio::test]
async fn test_unreachable_store_behaves_closed() {
    let (breaker, store) = breaker(CircuitConfig::default());
    store.set_unavailable(true);

    assert_eq!(breaker.execute("auth", || async { Ok(7) }).await.unwrap(), 7);
    assert_eq!(breaker.get_state("auth").await, CircuitState::Closed);
}

#[tokio::test]
async fn test_reset_and_summary() {
    let config = CircuitConfig { failure_threshold: 1, ..CircuitConfig::default() };
    let (breaker, _) = breaker(config);

    let _ = fail(&breaker, "auth").await;
    succeed(&breaker, "resources").await.unwrap();
    breaker.register("reservations");

    let summary = breaker.get_summary().await;
    assert_eq!(summary.open, 1);
    assert_eq!(summary.closed, 2);
    assert_eq!(summary.total_trips, 1);

    breaker.reset("auth").await.unwrap();
    assert_eq!(breaker.get_state("auth").await, CircuitState::Closed);

    let all = breaker.get_all().await;
    let names: Vec<&str> = all.iter().map(|s| s.dependency.as_str()).collect();
    assert_eq!(names, vec!["auth", "reservations", "resources"]);
    assert!(all.iter().all(|s| s.record == CircuitRecord::default()));
}

#[test]
fn test_pure_transitions() {
    let config = CircuitConfig { failure_threshold: 2, ..CircuitConfig::default() };
    let mut record = CircuitRecord::default();

    assert_eq!(state::on_success(&mut record, &config), Change::Unchanged);
    assert_eq!(state::on_failure(&mut record, &config, 1_000), Change::Counters);
    assert_eq!(
        state::on_failure(&mut record, &config, 2_000),
        Change::Transition { from: CircuitState::Closed, to: CircuitState::Open }
    );

    assert_eq!(
        state::admit(&mut record, &config, 2_500),
        Admission::Reject { retry_after_ms: 59_500 }
    );
    assert_eq!(state::admit(&mut record, &config, 62_000), Admission::Trial);
    assert_eq!(record.state, CircuitState::HalfOpen);
    assert_eq!(record.consecutive_failures, 0);
}
