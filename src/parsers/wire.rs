// Wire adapter: raw backend JSON -> ResearchEvent
//
// Accepts the backend's original event shapes (`status`, `message`, `error`)
// as well as the versioned kinds (`agent_status`, `agent_message`, `error`, `done`).

use serde::Deserialize;
use thiserror::Error;

use crate::events::ResearchEvent;
use crate::models::{AgentId, AgentState};

/// Sentinel some backends send as the last data frame
pub const DONE_SENTINEL: &str = "[DONE]";

const DEFAULT_ERROR_MESSAGE: &str = "The research backend reported an unknown error";

/// Reasons a data frame could not be turned into an event
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("Invalid event JSON: {0}")]
    InvalidJson(String),

    #[error("Unknown event type: '{0}'")]
    UnknownType(String),

    #[error("Event '{kind}' is missing field '{field}'")]
    MissingField {
        kind: &'static str,
        field: &'static str,
    },

    #[error("Unknown agent: '{0}'")]
    UnknownAgent(String),

    #[error("Unknown agent status: '{0}'")]
    UnknownStatus(String),
}

#[derive(Debug, Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default, alias = "state")]
    status: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "messageId")]
    message_id: Option<String>,
    #[serde(default, rename = "final", alias = "isFinal", alias = "is_final")]
    is_final: Option<bool>,
}

/// Parse one SSE data payload into an event
pub fn parse_event(data: &str) -> Result<ResearchEvent, WireError> {
    let data = data.trim();
    if data == DONE_SENTINEL {
        return Ok(ResearchEvent::Done);
    }

    let wire: WireEvent =
        serde_json::from_str(data).map_err(|e| WireError::InvalidJson(e.to_string()))?;

    match wire.kind.as_str() {
        "status" | "agent_status" => parse_status(wire),
        "message" | "agent_message" => parse_message(wire),
        "error" => Ok(parse_error(wire)),
        "done" | "finished" | "complete" => Ok(ResearchEvent::Done),
        other => Err(WireError::UnknownType(other.to_string())),
    }
}

/// Map a backend status string onto the agent lifecycle
pub fn parse_agent_state(status: &str) -> Result<AgentState, WireError> {
    match status.trim().to_lowercase().as_str() {
        "idle" | "pending" => Ok(AgentState::Idle),
        "planning" | "working" | "running" | "started" | "thinking" => Ok(AgentState::Working),
        "completed" | "complete" | "finished" | "done" => Ok(AgentState::Completed),
        "error" | "failed" => Ok(AgentState::Error),
        _ => Err(WireError::UnknownStatus(status.to_string())),
    }
}

fn parse_status(wire: WireEvent) -> Result<ResearchEvent, WireError> {
    let agent_name = wire.agent.ok_or(WireError::MissingField {
        kind: "agent_status",
        field: "agent",
    })?;
    let status = wire.status.ok_or(WireError::MissingField {
        kind: "agent_status",
        field: "status",
    })?;

    let agent: AgentId = agent_name
        .parse()
        .map_err(|_| WireError::UnknownAgent(agent_name.clone()))?;
    let state = parse_agent_state(&status)?;

    // The backend closes a run with a status on the system pseudo-agent
    if agent.is_system() {
        return match state {
            AgentState::Completed => Ok(ResearchEvent::Done),
            AgentState::Error => Ok(ResearchEvent::error(None, DEFAULT_ERROR_MESSAGE)),
            _ => Err(WireError::UnknownStatus(format!("System/{}", status))),
        };
    }

    Ok(ResearchEvent::status(agent, state))
}

fn parse_message(wire: WireEvent) -> Result<ResearchEvent, WireError> {
    let agent_name = wire.agent.ok_or(WireError::MissingField {
        kind: "agent_message",
        field: "agent",
    })?;
    let content = wire
        .content
        .or(wire.message)
        .ok_or(WireError::MissingField {
            kind: "agent_message",
            field: "content",
        })?;

    let agent: AgentId = match agent_name.parse() {
        Ok(agent) if !AgentId::is_system(&agent) => agent,
        _ => return Err(WireError::UnknownAgent(agent_name)),
    };

    Ok(ResearchEvent::AgentMessage(crate::events::AgentMessagePayload {
        agent,
        content,
        message_id: wire.message_id,
        // Messages without a completion flag are complete
        is_final: wire.is_final.unwrap_or(true),
    }))
}

fn parse_error(wire: WireEvent) -> ResearchEvent {
    // An unrecognised agent name must not swallow the error itself
    let agent = wire
        .agent
        .as_deref()
        .and_then(|name| name.parse::<AgentId>().ok())
        .filter(|agent| !agent.is_system());

    let message = wire
        .content
        .or(wire.message)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string());

    ResearchEvent::error(agent, message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::AgentMessagePayload;

    #[test]
    fn test_legacy_status_planning_is_working() {
        let event =
            parse_event(r#"{"type": "status", "agent": "Supervisor", "status": "planning"}"#)
                .unwrap();
        assert_eq!(
            event,
            ResearchEvent::status(AgentId::Supervisor, AgentState::Working)
        );
    }

    #[test]
    fn test_legacy_status_completed() {
        let event =
            parse_event(r#"{"type": "status", "agent": "Topic_Refiner", "status": "completed"}"#)
                .unwrap();
        assert_eq!(
            event,
            ResearchEvent::status(AgentId::TopicRefiner, AgentState::Completed)
        );
    }

    #[test]
    fn test_system_finished_is_done() {
        let event =
            parse_event(r#"{"type": "status", "agent": "System", "status": "finished"}"#).unwrap();
        assert_eq!(event, ResearchEvent::Done);
    }

    #[test]
    fn test_legacy_message_is_final() {
        let event = parse_event(
            r#"{"type": "message", "agent": "Supervisor",
                "content": "Deciding next step: **Topic_Refiner**."}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            ResearchEvent::message(
                AgentId::Supervisor,
                "Deciding next step: **Topic_Refiner**."
            )
        );
    }

    #[test]
    fn test_versioned_partial_message() {
        let event = parse_event(
            r##"{"type": "agent_message", "agent": "Report Compiler", "content": "# Rep",
                "messageId": "m-1", "final": false}"##,
        )
        .unwrap();
        assert_eq!(
            event,
            ResearchEvent::AgentMessage(AgentMessagePayload {
                agent: AgentId::ReportCompiler,
                content: "# Rep".to_string(),
                message_id: Some("m-1".to_string()),
                is_final: false,
            })
        );
    }

    #[test]
    fn test_error_without_agent() {
        let event = parse_event(r#"{"type": "error", "content": "quota exceeded"}"#).unwrap();
        assert_eq!(event, ResearchEvent::error(None, "quota exceeded"));
    }

    #[test]
    fn test_error_with_agent() {
        let event =
            parse_event(r#"{"type": "error", "agent": "Paper_Discoverer", "content": "timeout"}"#)
                .unwrap();
        assert_eq!(
            event,
            ResearchEvent::error(Some(AgentId::PaperDiscoverer), "timeout")
        );
    }

    #[test]
    fn test_error_with_unknown_agent_is_still_an_error() {
        let event =
            parse_event(r#"{"type": "error", "agent": "Mystery", "message": "boom"}"#).unwrap();
        assert_eq!(event, ResearchEvent::error(None, "boom"));
    }

    #[test]
    fn test_empty_error_gets_default_message() {
        let event = parse_event(r#"{"type": "error"}"#).unwrap();
        assert_eq!(event, ResearchEvent::error(None, DEFAULT_ERROR_MESSAGE));
    }

    #[test]
    fn test_done_variants() {
        assert_eq!(parse_event(r#"{"type": "done"}"#), Ok(ResearchEvent::Done));
        assert_eq!(parse_event("[DONE]"), Ok(ResearchEvent::Done));
    }

    #[test]
    fn test_supervisor_routing_to_finish_is_unknown_agent() {
        let result = parse_event(r#"{"type": "status", "agent": "FINISH", "status": "working"}"#);
        assert_eq!(result, Err(WireError::UnknownAgent("FINISH".to_string())));
    }

    #[test]
    fn test_malformed_payloads() {
        assert!(matches!(
            parse_event("not json"),
            Err(WireError::InvalidJson(_))
        ));
        assert_eq!(
            parse_event(r#"{"type": "heartbeat"}"#),
            Err(WireError::UnknownType("heartbeat".to_string()))
        );
        assert_eq!(
            parse_event(r#"{"type": "status", "status": "working"}"#),
            Err(WireError::MissingField {
                kind: "agent_status",
                field: "agent"
            })
        );
        assert_eq!(
            parse_event(r#"{"type": "status", "agent": "Gap_Analyst", "status": "dancing"}"#),
            Err(WireError::UnknownStatus("dancing".to_string()))
        );
    }

    #[test]
    fn test_message_from_system_is_rejected() {
        assert_eq!(
            parse_event(r#"{"type": "message", "agent": "System", "content": "x"}"#),
            Err(WireError::UnknownAgent("System".to_string()))
        );
    }
}
