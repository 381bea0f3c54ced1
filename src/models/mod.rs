// Data models shared by the controller, the wire adapter and the UI bridge

pub mod state_machine;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Agents known to the research backend.
///
/// The roster is closed: anything the backend names outside of it is treated
/// as a malformed event. `System` is a pseudo-agent used to attribute
/// connection-level errors and never appears in the status table.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AgentId {
    #[serde(rename = "Supervisor")]
    Supervisor,
    #[serde(rename = "Topic_Refiner")]
    TopicRefiner,
    #[serde(rename = "Paper_Discoverer")]
    PaperDiscoverer,
    #[serde(rename = "Insight_Synthesizer")]
    InsightSynthesizer,
    #[serde(rename = "Report_Compiler")]
    ReportCompiler,
    #[serde(rename = "Gap_Analyst")]
    GapAnalyst,
    #[serde(rename = "System")]
    System,
}

impl AgentId {
    /// The fixed roster, in sidebar order. Excludes the system pseudo-agent.
    pub fn roster() -> &'static [AgentId] {
        &[
            AgentId::Supervisor,
            AgentId::TopicRefiner,
            AgentId::PaperDiscoverer,
            AgentId::InsightSynthesizer,
            AgentId::ReportCompiler,
            AgentId::GapAnalyst,
        ]
    }

    /// Identifier used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentId::Supervisor => "Supervisor",
            AgentId::TopicRefiner => "Topic_Refiner",
            AgentId::PaperDiscoverer => "Paper_Discoverer",
            AgentId::InsightSynthesizer => "Insight_Synthesizer",
            AgentId::ReportCompiler => "Report_Compiler",
            AgentId::GapAnalyst => "Gap_Analyst",
            AgentId::System => "System",
        }
    }

    /// Human-readable name for renderers
    pub fn display_name(&self) -> &'static str {
        match self {
            AgentId::Supervisor => "Supervisor",
            AgentId::TopicRefiner => "Topic Refiner",
            AgentId::PaperDiscoverer => "Paper Discoverer",
            AgentId::InsightSynthesizer => "Insight Synthesizer",
            AgentId::ReportCompiler => "Report Compiler",
            AgentId::GapAnalyst => "Gap Analyst",
            AgentId::System => "System",
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, AgentId::System)
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for AgentId {
    type Err = String;

    /// Accepts both wire ids (`Topic_Refiner`) and display names (`Topic Refiner`),
    /// ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "supervisor" => Ok(AgentId::Supervisor),
            "topic_refiner" => Ok(AgentId::TopicRefiner),
            "paper_discoverer" => Ok(AgentId::PaperDiscoverer),
            "insight_synthesizer" => Ok(AgentId::InsightSynthesizer),
            "report_compiler" => Ok(AgentId::ReportCompiler),
            "gap_analyst" => Ok(AgentId::GapAnalyst),
            "system" => Ok(AgentId::System),
            _ => Err(format!("Unknown agent: '{}'", s)),
        }
    }
}

/// Lifecycle state of a single agent within a session
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    Working,
    Completed,
    Error,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Idle => "idle",
            AgentState::Working => "working",
            AgentState::Completed => "completed",
            AgentState::Error => "error",
        }
    }
}

impl std::fmt::Display for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the status table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatusRecord {
    pub agent_id: AgentId,
    pub state: AgentState,
}

/// Lifecycle of one research stream
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionLifecycle {
    Connecting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionLifecycle {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionLifecycle::Connecting => "connecting",
            SessionLifecycle::Streaming => "streaming",
            SessionLifecycle::Completed => "completed",
            SessionLifecycle::Failed => "failed",
            SessionLifecycle::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for SessionLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who produced a transcript entry
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EntryOrigin {
    User,
    Agent,
    System,
}

/// Distinguishes regular messages from inline error notices
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    #[default]
    Message,
    Error,
}

/// One displayed unit of conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptEntry {
    pub origin: EntryOrigin,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<AgentId>,
    /// Markdown for agent entries, plain text for user entries
    pub content: String,
    /// Logical order key, unique within a transcript
    pub timestamp: u64,
    pub is_final: bool,
    /// Logical message id used to extend a streaming message in place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(default)]
    pub kind: EntryKind,
    /// Wall-clock creation time, for display only
    pub created_at: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn user(content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            origin: EntryOrigin::User,
            agent_id: None,
            content: content.into(),
            timestamp,
            is_final: true,
            message_id: None,
            kind: EntryKind::Message,
            created_at: Utc::now(),
        }
    }

    pub fn agent(
        agent_id: AgentId,
        content: impl Into<String>,
        timestamp: u64,
        message_id: Option<String>,
        is_final: bool,
    ) -> Self {
        Self {
            origin: EntryOrigin::Agent,
            agent_id: Some(agent_id),
            content: content.into(),
            timestamp,
            is_final,
            message_id,
            kind: EntryKind::Message,
            created_at: Utc::now(),
        }
    }

    /// Error notice attributed to an agent, or to the system pseudo-agent
    pub fn error(agent_id: AgentId, content: impl Into<String>, timestamp: u64) -> Self {
        let origin = if agent_id.is_system() {
            EntryOrigin::System
        } else {
            EntryOrigin::Agent
        };
        Self {
            origin,
            agent_id: Some(agent_id),
            content: content.into(),
            timestamp,
            is_final: true,
            message_id: None,
            kind: EntryKind::Error,
            created_at: Utc::now(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.origin == EntryOrigin::User
    }

    pub fn is_error(&self) -> bool {
        self.kind == EntryKind::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_id_parses_wire_and_display_names() {
        assert_eq!("Topic_Refiner".parse::<AgentId>(), Ok(AgentId::TopicRefiner));
        assert_eq!("Topic Refiner".parse::<AgentId>(), Ok(AgentId::TopicRefiner));
        assert_eq!("gap_analyst".parse::<AgentId>(), Ok(AgentId::GapAnalyst));
        assert_eq!(" Supervisor ".parse::<AgentId>(), Ok(AgentId::Supervisor));
        assert!("FINISH".parse::<AgentId>().is_err());
    }

    #[test]
    fn test_roster_excludes_system() {
        assert_eq!(AgentId::roster().len(), 6);
        assert!(!AgentId::roster().contains(&AgentId::System));
    }

    #[test]
    fn test_agent_id_serializes_as_wire_id() {
        let json = serde_json::to_string(&AgentId::PaperDiscoverer).unwrap();
        assert_eq!(json, "\"Paper_Discoverer\"");
    }

    #[test]
    fn test_error_entry_origin() {
        let system = TranscriptEntry::error(AgentId::System, "connection refused", 1);
        assert_eq!(system.origin, EntryOrigin::System);
        assert!(system.is_error());

        let agent = TranscriptEntry::error(AgentId::GapAnalyst, "quota exceeded", 2);
        assert_eq!(agent.origin, EntryOrigin::Agent);
        assert_eq!(agent.agent_id, Some(AgentId::GapAnalyst));
    }

    #[test]
    fn test_entry_serialization_is_camel_case() {
        let entry = TranscriptEntry::agent(AgentId::Supervisor, "hi", 3, None, true);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["agentId"], "Supervisor");
        assert_eq!(json["isFinal"], true);
        assert!(json.get("messageId").is_none());
    }
}
