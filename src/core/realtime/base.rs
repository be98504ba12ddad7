//! Base types for realtime speech-to-speech model connections.
//!
//! A [`ModelConnector`] opens one duplex session per phone call and hands back a
//! [`ModelSocket`]: a sender for client events and a receiver of server events.
//! Dropping the sender closes the underlying connection; when the remote side
//! closes, the receiver yields `None`.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::openai::{ClientEvent, ServerEvent};

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur while opening or using a realtime session.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Missing API key, malformed URL and the like
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The socket is gone
    #[error("Not connected")]
    NotConnected,
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Connection Types
// =============================================================================

/// An open realtime session.
#[derive(Debug)]
pub struct ModelSocket {
    pub sender: mpsc::Sender<ClientEvent>,
    pub events: mpsc::Receiver<ServerEvent>,
}

impl ModelSocket {
    /// Build a socket from raw channel halves. Used by in-process connectors.
    pub fn new(sender: mpsc::Sender<ClientEvent>, events: mpsc::Receiver<ServerEvent>) -> Self {
        Self { sender, events }
    }

    /// Queue an event for the model.
    pub async fn send(&self, event: ClientEvent) -> RealtimeResult<()> {
        self.sender
            .send(event)
            .await
            .map_err(|_| RealtimeError::NotConnected)
    }
}

/// Opens realtime model sessions.
#[async_trait]
pub trait ModelConnector: Send + Sync {
    /// Voice name sent in `session.update`.
    fn voice(&self) -> &str;

    async fn connect(&self) -> RealtimeResult<ModelSocket>;
}
