//! Transports deliver a research session's events as a cancellable subscription.
//!
//! The controller only ever sees [`TransportEvent`]s; wire details stay in the
//! transport implementations.

pub mod channel;
pub mod http;

pub use channel::{ChannelTransport, StreamHandle};
pub use http::{HealthStatus, HttpTransport};

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::events::ResearchEvent;
use crate::parsers::WireError;

/// Connection-level failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("Request to research backend failed: {0}")]
    Request(String),

    #[error("Research backend returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Failed to read event stream: {0}")]
    StreamRead(String),

    #[error("Event stream closed before the research finished")]
    ClosedEarly,

    #[error("No events received for {0} seconds")]
    IdleTimeout(u64),
}

/// What a subscription yields
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Event(ResearchEvent),
    /// Data that arrived but could not be decoded
    Malformed(WireError),
    Failed(TransportError),
}

/// A research request as handed to a transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResearchRequest {
    pub session_id: String,
    pub topic: String,
}

/// Handle to one open event stream.
///
/// Yields events until the transport ends the stream. Closing (or dropping)
/// the handle stops the transport's background task; no event is observable
/// through the handle afterwards.
#[derive(Debug)]
pub struct Subscription {
    receiver: mpsc::UnboundedReceiver<TransportEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(
        receiver: mpsc::UnboundedReceiver<TransportEvent>,
        task: Option<JoinHandle<()>>,
    ) -> Self {
        Self { receiver, task }
    }

    /// Next event, or `None` once the stream has ended or been closed
    pub async fn next(&mut self) -> Option<TransportEvent> {
        self.receiver.recv().await
    }

    pub fn close(&mut self) {
        self.receiver.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens research streams. Implementations spawn their own I/O, so `open`
/// must be called from within a tokio runtime.
pub trait EventTransport: Send + Sync + 'static {
    fn open(&self, request: &ResearchRequest) -> Subscription;
}
