//! Server application state shared across handlers

use super::events::EventBroadcaster;
use crate::session::ResearchController;
use crate::shutdown::ShutdownState;
use std::sync::Arc;

/// Shared state for the UI bridge
#[derive(Clone)]
pub struct ServerAppState {
    /// The research session controller every client observes
    pub controller: Arc<ResearchController>,

    /// Event broadcaster for WebSocket clients
    pub broadcaster: Arc<EventBroadcaster>,

    /// Shutdown state
    pub shutdown_state: ShutdownState,
}

impl ServerAppState {
    pub fn new(controller: Arc<ResearchController>, shutdown_state: ShutdownState) -> Self {
        Self {
            controller,
            broadcaster: Arc::new(EventBroadcaster::new()),
            shutdown_state,
        }
    }
}
