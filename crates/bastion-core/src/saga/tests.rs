#![allow(clippy::unwrap_used)]

use super::*;
use crate::bus::InMemoryCommandBus;
use bastion_types::{ReplyConfig, ReplyEvent};
use serde_json::json;

fn orchestrator() -> (Arc<SagaOrchestrator>, Arc<InMemoryCommandBus>) {
    let bus = Arc::new(InMemoryCommandBus::new());
    (SagaOrchestrator::new(bus.clone(), SagaConfig::default()), bus)
}

async fn wait_until_terminal(orchestrator: &SagaOrchestrator, id: &str) -> SagaInstance {
    for _ in 0..1_000 {
        let saga = orchestrator.get_saga_status(id).unwrap();
        if saga.status.is_terminal() {
            return saga;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("saga {id} never finished");
}

fn reservation_steps() -> Vec<SagaStep> {
    vec![
        SagaStep::new("resources", "CheckAvailability", json!({"roomId": "r-1"}))
            .with_compensation("ReleaseHold", json!({"roomId": "r-1"})),
        SagaStep::new("reservations", "CreateReservation", json!({"roomId": "r-1"}))
            .with_compensation("CancelReservation", json!({})),
        SagaStep::new("notifications", "SendNotification", json!({"template": "booked"})),
    ]
}

fn numbered_steps(count: usize) -> Vec<SagaStep> {
    (0..count)
        .map(|i| {
            SagaStep::new("resources", format!("Do{i}"), json!({"i": i}))
                .with_compensation(format!("Undo{i}"), json!({"i": i}))
        })
        .collect()
}

#[tokio::test]
async fn test_failed_step_compensates_only_dispatched_steps() {
    let (orchestrator, bus) = orchestrator();
    bus.fail_command_type("CreateReservation");

    let id = orchestrator.start_saga("CreateFullReservation", reservation_steps());
    let saga = wait_until_terminal(&orchestrator, &id).await;

    assert_eq!(saga.status, SagaStatus::Compensated);
    assert_eq!(bus.published_types(), vec!["CheckAvailability", "ReleaseHold"]);
    assert_eq!(saga.compensated_steps, vec![0]);
    assert!(saga.completed_steps.is_empty());
    assert!(saga.error.unwrap().contains("CreateReservation"));
    assert!(saga.ended_at.is_some());

    let publications = bus.published();
    assert_eq!(publications[1].topic, "resources.commands");
    assert_eq!(publications[1].command.data, json!({"roomId": "r-1"}));
    assert_eq!(publications[1].command.metadata.aggregate_id, id);
}

#[tokio::test]
async fn test_compensation_runs_in_reverse_order() {
    let (orchestrator, bus) = orchestrator();
    bus.fail_command_type("Do3");

    let id = orchestrator.start_saga("Chain", numbered_steps(5));
    let saga = wait_until_terminal(&orchestrator, &id).await;

    assert_eq!(saga.compensated_steps, vec![2, 1, 0]);
    assert_eq!(bus.published_types(), vec!["Do0", "Do1", "Do2", "Undo2", "Undo1", "Undo0"]);
    assert_eq!(saga.current_step, 3);
}

#[tokio::test]
async fn test_compensation_failure_does_not_stop_sweep() {
    let (orchestrator, bus) = orchestrator();
    bus.fail_command_type("Do3");
    bus.fail_command_type("Undo1");

    let id = orchestrator.start_saga("Chain", numbered_steps(4));
    let saga = wait_until_terminal(&orchestrator, &id).await;

    assert_eq!(saga.status, SagaStatus::Compensated);
    assert_eq!(saga.compensated_steps, vec![2, 1, 0]);
    assert_eq!(saga.compensation_errors.len(), 1);
    assert!(saga.compensation_errors[0].contains("Undo1"));
    assert_eq!(bus.published_types(), vec!["Do0", "Do1", "Do2", "Undo2", "Undo0"]);
}

#[tokio::test]
async fn test_first_step_failure_compensates_nothing() {
    let (orchestrator, bus) = orchestrator();
    bus.fail_command_type("Do0");

    let id = orchestrator.start_saga("Chain", numbered_steps(3));
    let saga = wait_until_terminal(&orchestrator, &id).await;

    assert_eq!(saga.status, SagaStatus::Compensated);
    assert!(saga.compensated_steps.is_empty());
    assert!(bus.published().is_empty());
}

#[tokio::test]
async fn test_happy_path_completes() {
    let (orchestrator, bus) = orchestrator();

    let id = orchestrator.start_saga("CreateFullReservation", reservation_steps());
    let saga = wait_until_terminal(&orchestrator, &id).await;

    assert_eq!(saga.status, SagaStatus::Completed);
    assert_eq!(saga.completed_steps, vec![0, 1, 2]);
    assert_eq!(
        bus.published_types(),
        vec!["CheckAvailability", "CreateReservation", "SendNotification"]
    );
    let topics: Vec<String> = bus.published().into_iter().map(|p| p.topic).collect();
    assert_eq!(topics, vec!["resources.commands", "reservations.commands", "notifications.commands"]);

    let stats = orchestrator.get_stats();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.completed, 1);
    assert!(orchestrator.get_active_sagas().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_reply_timeout_fails_awaiting_step() {
    let bus = Arc::new(InMemoryCommandBus::new());
    let correlator = Arc::new(RequestReplyCorrelator::new(bus.clone(), &ReplyConfig::default()));
    let orchestrator =
        SagaOrchestrator::with_correlator(bus.clone(), correlator.clone(), SagaConfig::default());

    let mut steps = numbered_steps(3);
    steps[1] = steps[1].clone().awaiting_reply(100);

    let id = orchestrator.start_saga("Awaited", steps);
    let saga = wait_until_terminal(&orchestrator, &id).await;

    assert_eq!(saga.status, SagaStatus::Compensated);
    assert!(saga.error.unwrap().contains("No reply for"));
    assert_eq!(saga.compensated_steps, vec![0]);
    assert_eq!(correlator.pending_count(), 0);
}

#[tokio::test]
async fn test_awaiting_step_continues_on_successful_reply() {
    let bus = Arc::new(InMemoryCommandBus::new());
    let correlator = Arc::new(RequestReplyCorrelator::new(bus.clone(), &ReplyConfig::default()));
    let orchestrator =
        SagaOrchestrator::with_correlator(bus.clone(), correlator.clone(), SagaConfig::default());

    let mut published = bus.subscribe();
    let responder = {
        let correlator = correlator.clone();
        tokio::spawn(async move {
            while let Ok(publication) = published.recv().await {
                let metadata = publication.command.metadata;
                if metadata.reply_to.is_some() {
                    if let Some(cid) = metadata.correlation_id {
                        correlator.handle_reply(ReplyEvent::ok(cid, json!({"ok": true})));
                    }
                }
            }
        })
    };

    let mut steps = numbered_steps(2);
    steps[0] = steps[0].clone().awaiting_reply(1_000);
    let id = orchestrator.start_saga("Awaited", steps);
    let saga = wait_until_terminal(&orchestrator, &id).await;

    assert_eq!(saga.status, SagaStatus::Completed);
    assert_eq!(saga.completed_steps, vec![0, 1]);
    responder.abort();
}

#[tokio::test]
async fn test_in_flight_saga_is_active() {
    let bus = Arc::new(InMemoryCommandBus::new());
    let correlator = Arc::new(RequestReplyCorrelator::new(bus.clone(), &ReplyConfig::default()));
    let orchestrator =
        SagaOrchestrator::with_correlator(bus.clone(), correlator.clone(), SagaConfig::default());

    let steps = vec![SagaStep::new("reservations", "Hold", json!({})).awaiting_reply(60_000)];
    let id = orchestrator.start_saga("Slow", steps);

    for _ in 0..100 {
        if correlator.pending_count() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let active = orchestrator.get_active_sagas();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, id);
    assert_eq!(active[0].status, SagaStatus::InProgress);
    assert_eq!(orchestrator.get_stats().in_progress, 1);
}

#[tokio::test]
async fn test_cleanup_evicts_only_old_terminal_sagas() {
    let (orchestrator, _) = orchestrator();

    let first = orchestrator.start_saga("One", numbered_steps(1));
    let second = orchestrator.start_saga("Two", numbered_steps(1));
    wait_until_terminal(&orchestrator, &first).await;
    wait_until_terminal(&orchestrator, &second).await;

    assert_eq!(orchestrator.cleanup_expired(), 0);

    orchestrator.update(&first, |saga| {
        saga.ended_at = Some(Utc::now() - chrono::Duration::hours(2));
    });
    assert_eq!(orchestrator.cleanup_expired(), 1);
    assert!(orchestrator.get_saga_status(&first).is_none());
    assert!(orchestrator.get_saga_status(&second).is_some());
    assert!(orchestrator.get_saga_status("missing").is_none());
}

#[tokio::test]
async fn test_cleanup_task_stops_on_shutdown() {
    let (orchestrator, _) = orchestrator();
    let handle = orchestrator.start_cleanup_task();

    orchestrator.shutdown();
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}

#[tokio::test]
async fn test_cleanup_task_ends_when_orchestrator_dropped() {
    let (orchestrator, _) = orchestrator();
    let handle = orchestrator.start_cleanup_task();
    assert_eq!(Arc::strong_count(&orchestrator), 1);

    drop(orchestrator);
    tokio::time::timeout(Duration::from_secs(1), handle).await.unwrap().unwrap();
}
