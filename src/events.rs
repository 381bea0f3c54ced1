// Event types flowing from the research backend into the controller,
// and the names of events pushed to UI clients over WebSocket

use serde::{Deserialize, Serialize};

use crate::models::{AgentId, AgentState};

// Event name constants for the UI bridge
pub const EVENT_RESEARCH_SNAPSHOT: &str = "research:snapshot";
pub const EVENT_RESEARCH_STARTED: &str = "research:started";

/// Payload for agent status events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusPayload {
    pub agent: AgentId,
    pub state: AgentState,
}

/// Payload for agent message events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessagePayload {
    pub agent: AgentId,
    /// Markdown content, the full text so far for streamed messages
    pub content: String,
    /// Logical message id. Messages sharing an id extend one transcript entry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    /// Whether this is the terminal state of the logical message
    pub is_final: bool,
}

/// Payload for backend-reported errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    /// Failing agent, if the backend named one from the roster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<AgentId>,
    pub message: String,
}

/// A backend event after wire decoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResearchEvent {
    AgentStatus(AgentStatusPayload),
    AgentMessage(AgentMessagePayload),
    Error(ErrorPayload),
    Done,
}

impl ResearchEvent {
    pub fn status(agent: AgentId, state: AgentState) -> Self {
        ResearchEvent::AgentStatus(AgentStatusPayload { agent, state })
    }

    /// A complete message without a logical id
    pub fn message(agent: AgentId, content: impl Into<String>) -> Self {
        ResearchEvent::AgentMessage(AgentMessagePayload {
            agent,
            content: content.into(),
            message_id: None,
            is_final: true,
        })
    }

    /// One step of a message streamed under a logical id
    pub fn partial_message(
        agent: AgentId,
        message_id: impl Into<String>,
        content: impl Into<String>,
        is_final: bool,
    ) -> Self {
        ResearchEvent::AgentMessage(AgentMessagePayload {
            agent,
            content: content.into(),
            message_id: Some(message_id.into()),
            is_final,
        })
    }

    pub fn error(agent: Option<AgentId>, message: impl Into<String>) -> Self {
        ResearchEvent::Error(ErrorPayload {
            agent,
            message: message.into(),
        })
    }

    /// `done` and `error` end the streaming phase of a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResearchEvent::Done | ResearchEvent::Error(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ResearchEvent::AgentStatus(_) => "agent_status",
            ResearchEvent::AgentMessage(_) => "agent_message",
            ResearchEvent::Error(_) => "error",
            ResearchEvent::Done => "done",
        }
    }
}
