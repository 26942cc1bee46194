//! Publish capability used by the dispatcher
//!
//! The frame handler runs on the audio thread, so publishing must never
//! block. `ChannelPublisher` hands payloads to a bounded queue that a
//! transport task drains on its own schedule.

use thiserror::Error;
use tokio::sync::mpsc;

/// Publish errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Outbound queue is full")]
    QueueFull,

    #[error("Transport disconnected")]
    Disconnected,

    #[error("Failed to encode payload: {0}")]
    Encode(String),
}

/// Best-effort message publishing
pub trait Publisher: Send + Sync {
    fn send(&self, topic: &str, payload: &str) -> Result<(), PublishError>;
}

/// One queued outbound payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub topic: String,
    pub payload: String,
}

/// Non-blocking publisher backed by a bounded tokio channel
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::Sender<OutboundMessage>,
}

impl ChannelPublisher {
    /// Create a publisher and the receiver the transport task should drain
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<OutboundMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Publisher for ChannelPublisher {
    fn send(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        let msg = OutboundMessage {
            topic: topic.to_string(),
            payload: payload.to_string(),
        };
        self.tx.try_send(msg).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PublishError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => PublishError::Disconnected,
        })
    }
}
