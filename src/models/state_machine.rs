// Session lifecycle and agent state machines with validation

use super::{AgentState, SessionLifecycle};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StateTransitionError {
    #[error("Invalid session transition from {from} to {to}")]
    InvalidSessionTransition {
        from: SessionLifecycle,
        to: SessionLifecycle,
    },

    #[error("Invalid agent transition from {from} to {to}")]
    InvalidAgentTransition { from: AgentState, to: AgentState },
}

/// Validates if a session can move from one lifecycle state to another
pub fn can_transition_session(from: SessionLifecycle, to: SessionLifecycle) -> bool {
    use SessionLifecycle::*;

    match (from, to) {
        // First event received
        (Connecting, Streaming) => true,
        // Connection error before any event
        (Connecting, Failed) => true,
        (Connecting, Cancelled) => true,

        (Streaming, Completed) => true,
        (Streaming, Failed) => true,
        (Streaming, Cancelled) => true,

        // Completed, Failed and Cancelled are terminal
        _ => false,
    }
}

/// Validates and performs a session lifecycle transition
pub fn transition_session(
    current: SessionLifecycle,
    target: SessionLifecycle,
) -> Result<SessionLifecycle, StateTransitionError> {
    if !can_transition_session(current, target) {
        return Err(StateTransitionError::InvalidSessionTransition {
            from: current,
            to: target,
        });
    }

    Ok(target)
}

/// Check if a lifecycle state ends the session
pub fn is_terminal_lifecycle(lifecycle: SessionLifecycle) -> bool {
    matches!(
        lifecycle,
        SessionLifecycle::Completed | SessionLifecycle::Failed | SessionLifecycle::Cancelled
    )
}

/// Check if a lifecycle state counts as loading for the UI
pub fn is_loading_lifecycle(lifecycle: SessionLifecycle) -> bool {
    matches!(
        lifecycle,
        SessionLifecycle::Connecting | SessionLifecycle::Streaming
    )
}

/// Validates if an agent can move from one state to another within a session
pub fn can_transition_agent(from: AgentState, to: AgentState) -> bool {
    use AgentState::*;

    match (from, to) {
        // Same state is always allowed (no-op)
        (a, b) if a == b => true,

        (Idle, Working) => true,
        // Backend may report completion or failure without a prior working event
        (Idle, Completed) => true,
        (Idle, Error) => true,

        (Working, Completed) => true,
        (Working, Error) => true,

        // Supervisor re-dispatches an agent that already finished once
        (Completed, Working) => true,
        (Completed, Error) => true,

        // Error is terminal until the next session resets the table
        _ => false,
    }
}

/// Validates and performs an agent state transition
pub fn transition_agent(
    current: AgentState,
    target: AgentState,
) -> Result<AgentState, StateTransitionError> {
    if !can_transition_agent(current, target) {
        return Err(StateTransitionError::InvalidAgentTransition {
            from: current,
            to: target,
        });
    }

    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connecting_to_streaming() {
        let result = transition_session(SessionLifecycle::Connecting, SessionLifecycle::Streaming);
        assert_eq!(result, Ok(SessionLifecycle::Streaming));
    }

    #[test]
    fn test_connecting_can_fail_or_cancel() {
        assert!(can_transition_session(
            SessionLifecycle::Connecting,
            SessionLifecycle::Failed
        ));
        assert!(can_transition_session(
            SessionLifecycle::Connecting,
            SessionLifecycle::Cancelled
        ));
    }

    #[test]
    fn test_connecting_cannot_complete_without_streaming() {
        assert!(!can_transition_session(
            SessionLifecycle::Connecting,
            SessionLifecycle::Completed
        ));
    }

    #[test]
    fn test_terminal_sessions_do_not_move() {
        for terminal in [
            SessionLifecycle::Completed,
            SessionLifecycle::Failed,
            SessionLifecycle::Cancelled,
        ] {
            assert!(is_terminal_lifecycle(terminal));
            assert!(!is_loading_lifecycle(terminal));
            assert!(transition_session(terminal, SessionLifecycle::Streaming).is_err());
            assert!(transition_session(terminal, SessionLifecycle::Cancelled).is_err());
        }
    }

    #[test]
    fn test_loading_lifecycles() {
        assert!(is_loading_lifecycle(SessionLifecycle::Connecting));
        assert!(is_loading_lifecycle(SessionLifecycle::Streaming));
    }

    #[test]
    fn test_agent_forward_transitions() {
        assert!(can_transition_agent(AgentState::Idle, AgentState::Working));
        assert!(can_transition_agent(AgentState::Working, AgentState::Completed));
        assert!(can_transition_agent(AgentState::Working, AgentState::Error));
    }

    #[test]
    fn test_agent_working_is_idempotent() {
        assert_eq!(
            transition_agent(AgentState::Working, AgentState::Working),
            Ok(AgentState::Working)
        );
    }

    #[test]
    fn test_agent_cannot_return_to_idle() {
        assert!(!can_transition_agent(AgentState::Working, AgentState::Idle));
        assert!(!can_transition_agent(AgentState::Completed, AgentState::Idle));
    }

    #[test]
    fn test_agent_error_is_terminal() {
        let result = transition_agent(AgentState::Error, AgentState::Working);
        assert_eq!(
            result,
            Err(StateTransitionError::InvalidAgentTransition {
                from: AgentState::Error,
                to: AgentState::Working,
            })
        );
    }

    #[test]
    fn test_completed_agent_can_be_redispatched() {
        assert!(can_transition_agent(AgentState::Completed, AgentState::Working));
    }
}
