// Agent status table: reducer from status events to per-agent lifecycle

use std::collections::BTreeMap;

use crate::events::ResearchEvent;
use crate::models::state_machine::transition_agent;
use crate::models::{AgentId, AgentState, AgentStatusRecord};

/// Per-agent lifecycle for the fixed roster.
///
/// Every roster agent is present from construction. Entries are never removed;
/// a new session starts from [`AgentStatusTable::new`] again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentStatusTable {
    states: BTreeMap<AgentId, AgentState>,
}

impl AgentStatusTable {
    /// All roster agents idle
    pub fn new() -> Self {
        Self {
            states: AgentId::roster()
                .iter()
                .map(|agent| (*agent, AgentState::Idle))
                .collect(),
        }
    }

    /// State of `agent`. The system pseudo-agent is always idle.
    pub fn get(&self, agent: AgentId) -> AgentState {
        self.states.get(&agent).copied().unwrap_or_default()
    }

    /// Set an agent's state if the transition is legal.
    ///
    /// Returns `true` when the table changed.
    pub fn set(&mut self, agent: AgentId, target: AgentState) -> bool {
        let Some(current) = self.states.get_mut(&agent) else {
            log::debug!("Ignoring status for non-roster agent {}", agent.as_str());
            return false;
        };

        match transition_agent(*current, target) {
            Ok(next) if next != *current => {
                *current = next;
                true
            }
            Ok(_) => false,
            Err(e) => {
                log::warn!("{} for agent {}", e, agent.as_str());
                false
            }
        }
    }

    /// Pure reducer form: the table after applying `event`
    pub fn reduce(&self, event: &ResearchEvent) -> Self {
        let mut next = self.clone();
        next.apply(event);
        next
    }

    /// Apply the status effect of an event in place. Returns `true` on change.
    pub fn apply(&mut self, event: &ResearchEvent) -> bool {
        match event {
            ResearchEvent::AgentStatus(payload) => self.set(payload.agent, payload.state),
            ResearchEvent::Error(payload) => match payload.agent {
                Some(agent) => self.set(agent, AgentState::Error),
                None => false,
            },
            ResearchEvent::AgentMessage(_) | ResearchEvent::Done => false,
        }
    }

    /// Agents currently marked working
    pub fn working(&self) -> Vec<AgentId> {
        self.states
            .iter()
            .filter(|(_, state)| **state == AgentState::Working)
            .map(|(agent, _)| *agent)
            .collect()
    }

    pub fn all_idle(&self) -> bool {
        self.states.values().all(|state| *state == AgentState::Idle)
    }

    /// Snapshot in roster order
    pub fn records(&self) -> Vec<AgentStatusRecord> {
        AgentId::roster()
            .iter()
            .map(|agent| AgentStatusRecord {
                agent_id: *agent,
                state: self.get(*agent),
            })
            .collect()
    }
}

impl Default for AgentStatusTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_table_has_roster_idle() {
        let table = AgentStatusTable::new();
        assert!(table.all_idle());
        assert_eq!(table.records().len(), AgentId::roster().len());
        assert_eq!(table.records()[0].agent_id, AgentId::Supervisor);
    }

    #[test]
    fn test_reduce_is_pure() {
        let table = AgentStatusTable::new();
        let event = ResearchEvent::status(AgentId::Supervisor, AgentState::Working);
        let next = table.reduce(&event);

        assert!(table.all_idle());
        assert_eq!(next.get(AgentId::Supervisor), AgentState::Working);
    }

    #[test]
    fn test_repeated_working_is_idempotent() {
        let mut table = AgentStatusTable::new();
        let event = ResearchEvent::status(AgentId::PaperDiscoverer, AgentState::Working);
        assert!(table.apply(&event));
        assert!(!table.apply(&event));
        assert_eq!(table.working(), vec![AgentId::PaperDiscoverer]);
    }

    #[test]
    fn test_error_event_marks_named_agent() {
        let mut table = AgentStatusTable::new();
        table.apply(&ResearchEvent::status(AgentId::GapAnalyst, AgentState::Working));
        table.apply(&ResearchEvent::error(Some(AgentId::GapAnalyst), "boom"));
        assert_eq!(table.get(AgentId::GapAnalyst), AgentState::Error);
    }

    #[test]
    fn test_anonymous_error_leaves_table_untouched() {
        let mut table = AgentStatusTable::new();
        assert!(!table.apply(&ResearchEvent::error(None, "boom")));
        assert!(table.all_idle());
    }

    #[test]
    fn test_backward_transition_is_ignored() {
        let mut table = AgentStatusTable::new();
        table.set(AgentId::TopicRefiner, AgentState::Completed);
        assert!(!table.set(AgentId::TopicRefiner, AgentState::Idle));
        assert_eq!(table.get(AgentId::TopicRefiner), AgentState::Completed);
    }

    #[test]
    fn test_system_agent_is_not_tracked() {
        let mut table = AgentStatusTable::new();
        assert!(!table.set(AgentId::System, AgentState::Working));
        assert_eq!(table.get(AgentId::System), AgentState::Idle);
    }
}
