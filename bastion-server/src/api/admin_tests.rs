#![allow(clippy::unwrap_used)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use super::admin::{
    circuit_stats, get_saga, limiter_stats, list_active_sagas, list_circuits, rate_limit_info,
    reset_circuit, reset_rate_limit, saga_stats,
};
use super::{get_metrics, health_check};
use crate::test_helpers::test_app_state;
use bastion_types::{CircuitState, InboundRequest, SagaStatus, SagaStep};

#[tokio::test]
async fn test_list_circuits_all_closed() {
    let app = test_app_state();
    let Json(circuits) = list_circuits(State(app.state)).await;

    let names: Vec<&str> = circuits.iter().map(|c| c.dependency.as_str()).collect();
    assert_eq!(names, vec!["auth", "reservations", "resources"]);
    assert!(circuits.iter().all(|c| c.record.state == CircuitState::Closed));
}

#[tokio::test]
async fn test_reset_circuit_closes_it() {
    let app = test_app_state();
    let gateway = app.state.gateway();
    let response = gateway.route(InboundRequest::new("resources", "/rooms", "GET")).await.unwrap();
    assert!(response.is_degraded());

    let Json(stats) = circuit_stats(State(app.state.clone())).await;
    assert_eq!(stats.open, 1);
    assert_eq!(stats.total_trips, 1);

    let Json(reset) = reset_circuit(State(app.state.clone()), Path("resources".to_string()))
        .await
        .unwrap();
    assert!(reset.success);
    assert_eq!(reset.target, "resources");

    let Json(stats) = circuit_stats(State(app.state)).await;
    assert_eq!(stats.open, 0);
    assert_eq!(stats.closed, 3);
}

#[tokio::test]
async fn test_rate_limit_info_and_reset() {
    let app = test_app_state();
    let mut request = InboundRequest::new("auth", "/me", "GET");
    request.client_ip = Some("198.51.100.4".to_string());
    app.state.gateway().route(request).await.unwrap();

    let key = "ip:198.51.100.4".to_string();
    let Json(info) = rate_limit_info(State(app.state.clone()), Path(key.clone())).await.unwrap();
    assert_eq!(info.count, 1);
    assert!(!info.blocked);
    assert_eq!(info.window_ttl_secs, Some(60));

    let Json(stats) = limiter_stats(State(app.state.clone())).await;
    assert_eq!(stats.checks, 1);
    assert_eq!(stats.allowed, 1);

    reset_rate_limit(State(app.state.clone()), Path(key.clone())).await.unwrap();
    let Json(info) = rate_limit_info(State(app.state), Path(key)).await.unwrap();
    assert_eq!(info.count, 0);
}

#[tokio::test]
async fn test_admin_store_outage_is_500() {
    let app = test_app_state();
    app.store.set_unavailable(true);

    let response = rate_limit_info(State(app.state), Path("ip:1.1.1.1".to_string()))
        .await
        .into_response();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_saga_endpoints() {
    let app = test_app_state();
    app.bus.fail_command_type("CreateReservation");
    let id = app.state.gateway().start_saga(
        "CreateFullReservation",
        vec![
            SagaStep::new("resources", "CheckAvailability", serde_json::json!({"roomId": "r1"}))
                .with_compensation("ReleaseHold", serde_json::json!({"roomId": "r1"})),
            SagaStep::new("reservations", "CreateReservation", serde_json::json!({})),
            SagaStep::new("notifications", "SendNotification", serde_json::json!({})),
        ],
    );

    for _ in 0..100 {
        if app.state.gateway().get_active_sagas().is_empty() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(1)).await;
    }

    let Json(active) = list_active_sagas(State(app.state.clone())).await;
    assert!(active.is_empty());

    let Json(saga) = get_saga(State(app.state.clone()), Path(id)).await.unwrap();
    assert_eq!(saga.status, SagaStatus::Compensated);
    assert_eq!(saga.compensated_steps, vec![0]);

    let Json(stats) = saga_stats(State(app.state.clone())).await;
    assert_eq!(stats.compensated, 1);

    let missing = get_saga(State(app.state), Path("nope".to_string())).await;
    assert_eq!(missing.err().map(|(status, _)| status), Some(StatusCode::NOT_FOUND));
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = test_app_state();
    let Json(health) = health_check(State(app.state)).await;
    assert_eq!(health.status, "ok");
    assert_eq!(health.pending_replies, 0);

    let response = get_metrics().await.into_response();
    assert_eq!(response.status(), StatusCode::OK);
}
