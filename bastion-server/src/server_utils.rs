use std::sync::Arc;

use bastion_core::{InMemoryCommandBus, Publication, RequestReplyCorrelator};
use bastion_types::ReplyEvent;
use tokio::signal;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received Ctrl+C, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Forward replies published on the in-process bus into the correlator.
///
/// Services running against the in-memory transport publish a command on the
/// reply topic whose `data` is a [`ReplyEvent`].
pub fn spawn_reply_bridge(
    bus: &InMemoryCommandBus,
    correlator: &Arc<RequestReplyCorrelator>,
) -> tokio::task::JoinHandle<()> {
    let (tx, rx) = mpsc::channel::<ReplyEvent>(256);
    let mut publications = bus.subscribe();
    let reply_topic = correlator.reply_topic().to_string();
    correlator.spawn_reply_listener(rx);

    tokio::spawn(async move {
        loop {
            match publications.recv().await {
                Ok(publication) => {
                    if let Some(reply) = as_reply(&reply_topic, publication) {
                        if tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Reply bridge lagged behind the bus");
                },
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        debug!("Reply bridge stopped");
    })
}

fn as_reply(reply_topic: &str, publication: Publication) -> Option<ReplyEvent> {
    if publication.topic != reply_topic {
        return None;
    }
    match serde_json::from_value(publication.command.data) {
        Ok(reply) => Some(reply),
        Err(e) => {
            warn!(command_id = %publication.command.command_id, error = %e, "Malformed reply dropped");
            None
        },
    }
}
