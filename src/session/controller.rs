// Stream session controller: owns the active research stream and derives UI state from it

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::status_table::AgentStatusTable;
use super::transcript::{MessageOutcome, TranscriptStore};
use crate::events::ResearchEvent;
use crate::models::state_machine::{is_loading_lifecycle, is_terminal_lifecycle, transition_session};
use crate::models::{AgentId, AgentState, AgentStatusRecord, SessionLifecycle, TranscriptEntry};
use crate::transport::{
    EventTransport, ResearchRequest, Subscription, TransportError, TransportEvent,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Research topic must not be blank")]
    EmptyTopic,
}

/// Tuning for the controller
#[derive(Debug, Clone, Default)]
pub struct ControllerOptions {
    /// Fail the session when no event arrives within this window
    pub idle_timeout: Option<Duration>,
}

/// Read-only view of everything renderers need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchSnapshot {
    pub session_id: Option<String>,
    pub topic: Option<String>,
    pub lifecycle: Option<SessionLifecycle>,
    pub messages: Vec<TranscriptEntry>,
    pub status: Vec<AgentStatusRecord>,
    pub active_agent: Option<AgentId>,
    pub is_loading: bool,
}

/// Result of offering one transport event to the controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Event belongs to a superseded or finished session and was dropped
    Stale,
    /// State changed
    Applied,
    /// Accepted but produced no visible change
    Ignored,
    /// Session reached a terminal state
    Terminated,
}

#[derive(Debug)]
struct ActiveSession {
    id: String,
    topic: String,
    lifecycle: SessionLifecycle,
    pump: Option<JoinHandle<()>>,
}

/// All mutable state of the controller.
///
/// Mutated only through [`ControllerState::begin_session`] and
/// [`ControllerState::apply`]; both are synchronous so the lock guarding this
/// struct is never held across an await point.
#[derive(Debug, Default)]
pub struct ControllerState {
    transcript: TranscriptStore,
    status: AgentStatusTable,
    active_agent: Option<AgentId>,
    session: Option<ActiveSession>,
}

impl ControllerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Supersede any active session and start tracking `session_id`.
    ///
    /// Returns the previous session's pump task so the caller can abort it.
    pub fn begin_session(&mut self, session_id: &str, topic: &str) -> Option<JoinHandle<()>> {
        let previous_pump = match self.session.as_mut() {
            Some(previous) => {
                if is_loading_lifecycle(previous.lifecycle) {
                    log::info!("Cancelling research session {}", previous.id);
                    previous.lifecycle = SessionLifecycle::Cancelled;
                }
                previous.pump.take()
            }
            None => None,
        };

        self.status = AgentStatusTable::new();
        self.active_agent = None;
        self.transcript.append_user(topic);
        self.session = Some(ActiveSession {
            id: session_id.to_string(),
            topic: topic.to_string(),
            lifecycle: SessionLifecycle::Connecting,
            pump: None,
        });

        previous_pump
    }

    /// Record the pump task for `session_id`. Returns the handle back if that
    /// session is no longer the active one.
    fn attach_pump(&mut self, session_id: &str, pump: JoinHandle<()>) -> Option<JoinHandle<()>> {
        match self.session.as_mut() {
            Some(session) if session.id == session_id => {
                session.pump = Some(pump);
                None
            }
            _ => Some(pump),
        }
    }

    /// Apply one transport event tagged with the session it was received for
    pub fn apply(&mut self, session_id: &str, item: TransportEvent) -> ApplyOutcome {
        let lifecycle = match self.session.as_ref() {
            Some(session) if session.id == session_id => session.lifecycle,
            _ => {
                log::debug!("Dropping event for superseded session {}", session_id);
                return ApplyOutcome::Stale;
            }
        };
        if is_terminal_lifecycle(lifecycle) {
            log::debug!(
                "Dropping event for session {} after it became {}",
                session_id,
                lifecycle
            );
            return ApplyOutcome::Stale;
        }

        let event = match item {
            TransportEvent::Failed(error) => return self.fail_connection(error),
            TransportEvent::Malformed(error) => {
                log::warn!("Skipping malformed event in session {}: {}", session_id, error);
                let changed = self.mark_streaming();
                return if changed {
                    ApplyOutcome::Applied
                } else {
                    ApplyOutcome::Ignored
                };
            }
            TransportEvent::Event(event) => event,
        };

        let mut changed = self.mark_streaming();
        log::trace!("Applying {} event to session {}", event.kind(), session_id);

        match &event {
            ResearchEvent::AgentStatus(payload) => {
                changed |= self.status.apply(&event);
                changed |= self.update_active_agent(payload.agent, payload.state);
            }
            ResearchEvent::AgentMessage(payload) => {
                let outcome = self.transcript.apply_agent_message(
                    payload.agent,
                    &payload.content,
                    payload.message_id.as_deref(),
                    payload.is_final,
                );
                changed |= outcome != MessageOutcome::RejectedFinal;
            }
            ResearchEvent::Error(payload) => {
                let author = payload.agent.unwrap_or(AgentId::System);
                log::warn!(
                    "Research backend reported an error ({}): {}",
                    author.as_str(),
                    payload.message
                );
                self.transcript.append_error(author, payload.message.as_str());
                self.status.apply(&event);
                if let Some(agent) = payload.agent {
                    self.update_active_agent(agent, AgentState::Error);
                }
                self.finish(SessionLifecycle::Failed);
                return ApplyOutcome::Terminated;
            }
            ResearchEvent::Done => {
                self.finish(SessionLifecycle::Completed);
                return ApplyOutcome::Terminated;
            }
        }

        if changed {
            ApplyOutcome::Applied
        } else {
            ApplyOutcome::Ignored
        }
    }

    fn fail_connection(&mut self, error: TransportError) -> ApplyOutcome {
        log::warn!("Research stream failed: {}", error);
        self.transcript
            .append_error(AgentId::System, format!("Connection error: {}", error));
        self.finish(SessionLifecycle::Failed);
        ApplyOutcome::Terminated
    }

    /// `connecting -> streaming` on the first received event
    fn mark_streaming(&mut self) -> bool {
        self.move_session(SessionLifecycle::Streaming)
    }

    fn finish(&mut self, lifecycle: SessionLifecycle) {
        if self.move_session(lifecycle) {
            if let Some(session) = self.session.as_ref() {
                log::info!("Research session {} {}", session.id, lifecycle);
            }
        }
    }

    fn move_session(&mut self, target: SessionLifecycle) -> bool {
        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.lifecycle == target {
            return false;
        }
        match transition_session(session.lifecycle, target) {
            Ok(next) => {
                session.lifecycle = next;
                true
            }
            Err(e) => {
                log::debug!("{}", e);
                false
            }
        }
    }

    /// Spotlight the most recently activated agent; clear the spotlight when
    /// that agent stops working.
    fn update_active_agent(&mut self, agent: AgentId, state: AgentState) -> bool {
        let previous = self.active_agent;
        match state {
            AgentState::Working if self.status.get(agent) == AgentState::Working => {
                self.active_agent = Some(agent);
            }
            AgentState::Completed | AgentState::Error if previous == Some(agent) => {
                self.active_agent = None;
            }
            _ => {}
        }
        previous != self.active_agent
    }

    pub fn messages(&self) -> Vec<TranscriptEntry> {
        self.transcript.merged()
    }

    pub fn status(&self) -> &AgentStatusTable {
        &self.status
    }

    pub fn active_agent(&self) -> Option<AgentId> {
        self.active_agent
    }

    pub fn lifecycle(&self) -> Option<SessionLifecycle> {
        self.session.as_ref().map(|s| s.lifecycle)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    pub fn is_loading(&self) -> bool {
        self.lifecycle().map_or(false, is_loading_lifecycle)
    }

    pub fn snapshot(&self) -> ResearchSnapshot {
        ResearchSnapshot {
            session_id: self.session.as_ref().map(|s| s.id.clone()),
            topic: self.session.as_ref().map(|s| s.topic.clone()),
            lifecycle: self.lifecycle(),
            messages: self.transcript.merged(),
            status: self.status.records(),
            active_agent: self.active_agent,
            is_loading: self.is_loading(),
        }
    }
}

/// Mediates between `start_research` calls and the backend event stream.
///
/// Owns at most one live stream. Share it between renderers behind an `Arc`;
/// all accessors take `&self`.
pub struct ResearchController {
    transport: Arc<dyn EventTransport>,
    state: Arc<Mutex<ControllerState>>,
    updates: Arc<watch::Sender<ResearchSnapshot>>,
    options: ControllerOptions,
}

impl ResearchController {
    pub fn new(transport: Arc<dyn EventTransport>, options: ControllerOptions) -> Self {
        let state = ControllerState::new();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            transport,
            state: Arc::new(Mutex::new(state)),
            updates: Arc::new(updates),
            options,
        }
    }

    /// Start researching `topic`, superseding any session still in flight.
    ///
    /// Must be called from within a tokio runtime. Returns the new session id.
    pub fn start_research(&self, topic: &str) -> Result<String, ControllerError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ControllerError::EmptyTopic);
        }

        let session_id = Uuid::new_v4().to_string();
        {
            let mut state = lock_state(&self.state);
            // The old session is cancelled under the lock, so anything its pump
            // still delivers is dropped as stale.
            if let Some(previous_pump) = state.begin_session(&session_id, topic) {
                previous_pump.abort();
            }
            // Published while the lock is held so an older pump cannot
            // overwrite it
            self.updates.send_replace(state.snapshot());
        }

        log::info!("Starting research session {}: {}", session_id, topic);
        let subscription = self.transport.open(&ResearchRequest {
            session_id: session_id.clone(),
            topic: topic.to_string(),
        });

        let pump = tokio::spawn(run_pump(
            subscription,
            session_id.clone(),
            self.state.clone(),
            self.updates.clone(),
            self.options.idle_timeout,
        ));
        if let Some(orphan) = lock_state(&self.state).attach_pump(&session_id, pump) {
            orphan.abort();
        }

        Ok(session_id)
    }

    pub fn snapshot(&self) -> ResearchSnapshot {
        lock_state(&self.state).snapshot()
    }

    pub fn messages(&self) -> Vec<TranscriptEntry> {
        lock_state(&self.state).messages()
    }

    pub fn status(&self) -> Vec<AgentStatusRecord> {
        lock_state(&self.state).status().records()
    }

    pub fn agent_state(&self, agent: AgentId) -> AgentState {
        lock_state(&self.state).status().get(agent)
    }

    pub fn active_agent(&self) -> Option<AgentId> {
        lock_state(&self.state).active_agent()
    }

    pub fn is_loading(&self) -> bool {
        lock_state(&self.state).is_loading()
    }

    pub fn lifecycle(&self) -> Option<SessionLifecycle> {
        lock_state(&self.state).lifecycle()
    }

    pub fn session_id(&self) -> Option<String> {
        lock_state(&self.state).session_id().map(str::to_string)
    }

    /// Receive a fresh snapshot after every visible change.
    ///
    /// Snapshots are published under the state lock, so do not call back into
    /// the controller while holding a borrowed snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ResearchSnapshot> {
        self.updates.subscribe()
    }

    /// Wait until no session is loading and return the final snapshot
    pub async fn wait_until_settled(&self) -> ResearchSnapshot {
        let mut updates = self.subscribe();
        loop {
            {
                let current = updates.borrow_and_update();
                if !current.is_loading {
                    return current.clone();
                }
            }
            if updates.changed().await.is_err() {
                return self.snapshot();
            }
        }
    }
}

impl Drop for ResearchController {
    fn drop(&mut self) {
        let mut state = lock_state(&self.state);
        if let Some(session) = state.session.as_mut() {
            if let Some(pump) = session.pump.take() {
                pump.abort();
            }
        }
    }
}

fn lock_state(state: &Mutex<ControllerState>) -> MutexGuard<'_, ControllerState> {
    state
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Forward one subscription into the controller state until the session ends
/// or is superseded
async fn run_pump(
    mut subscription: Subscription,
    session_id: String,
    state: Arc<Mutex<ControllerState>>,
    updates: Arc<watch::Sender<ResearchSnapshot>>,
    idle_timeout: Option<Duration>,
) {
    loop {
        let next = match idle_timeout {
            Some(limit) => match tokio::time::timeout(limit, subscription.next()).await {
                Ok(next) => next,
                Err(_) => Some(TransportEvent::Failed(TransportError::IdleTimeout(
                    limit.as_secs(),
                ))),
            },
            None => subscription.next().await,
        };
        let item = next.unwrap_or(TransportEvent::Failed(TransportError::ClosedEarly));

        let outcome = {
            let mut guard = lock_state(&state);
            let outcome = guard.apply(&session_id, item);
            // Only reached while `session_id` is still current, and the guard
            // keeps it so until the snapshot is out
            if matches!(outcome, ApplyOutcome::Applied | ApplyOutcome::Terminated) {
                updates.send_replace(guard.snapshot());
            }
            outcome
        };

        if matches!(outcome, ApplyOutcome::Stale | ApplyOutcome::Terminated) {
            break;
        }
    }

    subscription.close();
    log::debug!("Event pump for session {} stopped", session_id);
}
