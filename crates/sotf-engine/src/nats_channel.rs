//! NATS transport for a session.
//!
//! [`NatsLink`] implements [`ActionChannel`] over two subjects per session:
//!
//! - **Client to host:** `sotf.{session}.host`
//! - **Host to clients:** `sotf.{session}.clients`
//!
//! Payloads are the JSON wire form of [`Action`]. The host publishes on the
//! clients subject and listens on the host subject; a client does the
//! reverse.
//!
//! # Sync/Async Bridge
//!
//! [`ActionChannel::transmit`] is synchronous, so the link only encodes and
//! queues. A publisher task owns the NATS client and drains the queue in
//! order. A subscriber task decodes incoming messages into the session's
//! inbound stream; when the subscription ends, so does that stream.

use async_nats::Subscriber;
use futures::StreamExt as _;
use sotf_core::{ActionChannel, ChannelError};
use sotf_types::{Action, HandlerRole};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::EngineError;

/// Subject clients publish to and the host listens on.
pub fn host_subject(session: &str) -> String {
    format!("sotf.{session}.host")
}

/// Subject the host publishes to and clients listen on.
pub fn clients_subject(session: &str) -> String {
    format!("sotf.{session}.clients")
}

/// `(publish, listen)` subjects for a participant of the given role.
pub fn route(session: &str, role: HandlerRole) -> (String, String) {
    match role {
        HandlerRole::Host => (clients_subject(session), host_subject(session)),
        HandlerRole::Client => (host_subject(session), clients_subject(session)),
    }
}

/// Outbound half: encodes actions and queues them for the publisher task.
#[derive(Debug, Clone)]
pub struct NatsLink {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
}

impl NatsLink {
    /// A link feeding the given publisher queue.
    pub const fn new(outbound: mpsc::UnboundedSender<Vec<u8>>) -> Self {
        Self { outbound }
    }
}

impl ActionChannel for NatsLink {
    fn transmit(&mut self, action: &Action) -> Result<(), ChannelError> {
        let payload = action.encode()?;
        self.outbound
            .send(payload)
            .map_err(|_closed| ChannelError::Closed)
    }
}

/// A connected transport, split for the session.
#[derive(Debug)]
pub struct NatsTransport {
    /// Outbound link, handed to the game handler.
    pub link: NatsLink,
    /// Decoded actions from the other side.
    pub inbound: mpsc::UnboundedReceiver<Action>,
    /// Publisher task; finishes (after flushing) once every link is dropped.
    pub publisher: JoinHandle<()>,
}

/// Connect to NATS and start the publisher and subscriber tasks.
///
/// # Errors
///
/// Returns [`EngineError::Nats`] if the connection or subscription fails.
pub async fn connect(
    url: &str,
    session: &str,
    role: HandlerRole,
) -> Result<NatsTransport, EngineError> {
    let client = async_nats::connect(url).await.map_err(|e| EngineError::Nats {
        message: format!("failed to connect to NATS at {url}: {e}"),
    })?;
    let (publish, listen) = route(session, role);

    // Subscribe before anything is published so no early action is missed.
    let subscriber = client
        .subscribe(listen.clone())
        .await
        .map_err(|e| EngineError::Nats {
            message: format!("failed to subscribe to {listen}: {e}"),
        })?;
    info!(publish = %publish, listen = %listen, "NATS transport connected");

    let (inbound_tx, inbound) = mpsc::unbounded_channel();
    tokio::spawn(forward_inbound(subscriber, inbound_tx));

    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    let publisher = tokio::spawn(publish_outbound(client, publish, outbound_rx));

    Ok(NatsTransport {
        link: NatsLink::new(outbound),
        inbound,
        publisher,
    })
}

async fn forward_inbound(mut subscriber: Subscriber, inbound: mpsc::UnboundedSender<Action>) {
    while let Some(msg) = subscriber.next().await {
        match Action::decode(&msg.payload) {
            Ok(action) => {
                debug!(kind = ?action.kind(), invoker = %action.invoker, "Action received");
                if inbound.send(action).is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!(error = %e, subject = %msg.subject, "Dropping malformed action");
            }
        }
    }
    info!("NATS subscription ended");
}

async fn publish_outbound(
    client: async_nats::Client,
    subject: String,
    mut outbound: mpsc::UnboundedReceiver<Vec<u8>>,
) {
    while let Some(payload) = outbound.recv().await {
        if let Err(e) = client.publish(subject.clone(), payload.into()).await {
            warn!(error = %e, subject = %subject, "Failed to publish action");
        }
    }
    if let Err(e) = client.flush().await {
        warn!(error = %e, "Failed to flush NATS client");
    }
    debug!(subject = %subject, "Publisher stopped");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use sotf_types::GameState;

    use super::*;

    #[test]
    fn roles_publish_where_the_other_side_listens() {
        let (host_pub, host_listen) = route("friday", HandlerRole::Host);
        let (client_pub, client_listen) = route("friday", HandlerRole::Client);
        assert_eq!(host_pub, "sotf.friday.clients");
        assert_eq!(host_listen, "sotf.friday.host");
        assert_eq!(host_pub, client_listen);
        assert_eq!(client_pub, host_listen);
    }

    #[test]
    fn transmit_queues_the_wire_form() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut link = NatsLink::new(tx);
        let action = Action::game_state("alice", GameState::Ready);
        link.transmit(&action).unwrap();
        let payload = rx.try_recv().unwrap();
        assert_eq!(Action::decode(&payload).unwrap(), action);
    }

    #[test]
    fn transmit_after_publisher_stops_reports_closed() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut link = NatsLink::new(tx);
        let result = link.transmit(&Action::message("alice", "hello"));
        assert!(matches!(result, Err(ChannelError::Closed)));
    }
}
