//! The message channel between participants.
//!
//! The core only needs one operation from the transport: hand an action to
//! the other side. For the host that means every client; for a client it
//! means the host. Delivery is assumed reliable and ordered.
//!
//! [`LocalHub`] wires participants together in-process over tokio channels
//! and round-trips every action through its JSON wire form, so a hub-based
//! test exercises the same encoding a networked session does.

use std::sync::{Arc, Mutex};

use sotf_types::Action;
use tokio::sync::mpsc;
use tracing::debug;

/// Errors that can occur while transmitting an action.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    /// The other side is gone.
    #[error("channel closed")]
    Closed,

    /// The action could not be encoded.
    #[error("failed to encode action: {source}")]
    Encode {
        /// The underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Outbound half of a participant's connection.
pub trait ActionChannel: Send {
    /// Hand `action` to the other side.
    fn transmit(&mut self, action: &Action) -> Result<(), ChannelError>;
}

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<Action>>>>;

fn wire_copy(action: &Action) -> Result<Action, ChannelError> {
    Ok(Action::decode(&action.encode()?)?)
}

/// In-process transport connecting one host and any number of clients.
#[derive(Debug)]
pub struct LocalHub {
    to_host: mpsc::UnboundedSender<Action>,
    host_inbox: Option<mpsc::UnboundedReceiver<Action>>,
    clients: Subscribers,
}

impl Default for LocalHub {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalHub {
    /// A hub with no participants yet.
    pub fn new() -> Self {
        let (to_host, host_inbox) = mpsc::unbounded_channel();
        Self {
            to_host,
            host_inbox: Some(host_inbox),
            clients: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// The host's outbound link and inbox. Available once.
    pub fn host(&mut self) -> Option<(HostLink, mpsc::UnboundedReceiver<Action>)> {
        let inbox = self.host_inbox.take()?;
        Some((
            HostLink {
                clients: Arc::clone(&self.clients),
            },
            inbox,
        ))
    }

    /// Connect a new client: its outbound link and inbox.
    pub fn join(&self) -> (ClientLink, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Ok(mut clients) = self.clients.lock() {
            clients.push(tx);
        }
        (
            ClientLink {
                host: self.to_host.clone(),
            },
            rx,
        )
    }
}

/// Host side: broadcasts to every connected client.
#[derive(Debug, Clone)]
pub struct HostLink {
    clients: Subscribers,
}

impl ActionChannel for HostLink {
    fn transmit(&mut self, action: &Action) -> Result<(), ChannelError> {
        let copy = wire_copy(action)?;
        let Ok(mut clients) = self.clients.lock() else {
            return Err(ChannelError::Closed);
        };
        clients.retain(|tx| tx.send(copy.clone()).is_ok());
        debug!(receivers = clients.len(), kind = ?action.kind(), "Broadcast action");
        Ok(())
    }
}

/// Client side: sends to the host.
#[derive(Debug, Clone)]
pub struct ClientLink {
    host: mpsc::UnboundedSender<Action>,
}

impl ActionChannel for ClientLink {
    fn transmit(&mut self, action: &Action) -> Result<(), ChannelError> {
        self.host
            .send(wire_copy(action)?)
            .map_err(|_closed| ChannelError::Closed)
    }
}

/// A channel that only records what was transmitted.
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    sent: Arc<Mutex<Vec<Action>>>,
}

impl RecordingChannel {
    /// A new, empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything transmitted so far.
    pub fn sent(&self) -> Vec<Action> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl ActionChannel for RecordingChannel {
    fn transmit(&mut self, action: &Action) -> Result<(), ChannelError> {
        self.sent
            .lock()
            .map_err(|_poisoned| ChannelError::Closed)?
            .push(action.clone());
        Ok(())
    }
}
