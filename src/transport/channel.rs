// In-process transport driven through channels.
// Used to script event sequences and to embed the controller behind a custom source.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use super::{EventTransport, ResearchRequest, Subscription, TransportError, TransportEvent};
use crate::events::ResearchEvent;
use crate::parsers::parse_event;

/// Sending side of one stream opened through a [`ChannelTransport`].
///
/// Dropping every clone of the handle ends the stream.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    request: ResearchRequest,
    sender: mpsc::UnboundedSender<TransportEvent>,
}

impl StreamHandle {
    pub fn request(&self) -> &ResearchRequest {
        &self.request
    }

    pub fn session_id(&self) -> &str {
        &self.request.session_id
    }

    /// Deliver a decoded event. Returns `false` if the subscriber has closed.
    pub fn send(&self, event: ResearchEvent) -> bool {
        self.sender.send(TransportEvent::Event(event)).is_ok()
    }

    /// Deliver a raw JSON payload through the wire adapter
    pub fn send_raw(&self, data: &str) -> bool {
        let item = match parse_event(data) {
            Ok(event) => TransportEvent::Event(event),
            Err(e) => TransportEvent::Malformed(e),
        };
        self.sender.send(item).is_ok()
    }

    /// Report a connection failure
    pub fn fail(&self, error: TransportError) -> bool {
        self.sender.send(TransportEvent::Failed(error)).is_ok()
    }

    /// Whether the subscriber has closed its end
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Debug, Default)]
struct ChannelTransportInner {
    pending: VecDeque<StreamHandle>,
    requests: Vec<ResearchRequest>,
}

/// Transport whose streams are fed by the caller
#[derive(Debug, Clone, Default)]
pub struct ChannelTransport {
    inner: Arc<Mutex<ChannelTransportInner>>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the oldest stream not yet claimed
    pub fn take_next(&self) -> Option<StreamHandle> {
        self.lock().pending.pop_front()
    }

    /// Every request opened so far, in order
    pub fn requests(&self) -> Vec<ResearchRequest> {
        self.lock().requests.clone()
    }

    pub fn opened_count(&self) -> usize {
        self.lock().requests.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ChannelTransportInner> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventTransport for ChannelTransport {
    fn open(&self, request: &ResearchRequest) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let mut inner = self.lock();
        inner.requests.push(request.clone());
        inner.pending.push_back(StreamHandle {
            request: request.clone(),
            sender,
        });
        Subscription::new(receiver, None)
    }
}
