// Transcript store: ordered log of user and agent entries

use crate::models::{AgentId, TranscriptEntry};

/// Outcome of applying an agent message to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Appended,
    /// A non-final entry with the same logical id was replaced in place
    Extended,
    /// The targeted entry is already final and was left untouched
    RejectedFinal,
}

/// Ordered, append-only log of conversation entries.
///
/// User and agent entries are kept in separate lists and merged for display by
/// a stable sort on `timestamp`. Timestamps come from a monotonic counter so
/// no two entries share one.
#[derive(Debug, Clone, Default)]
pub struct TranscriptStore {
    user_entries: Vec<TranscriptEntry>,
    agent_entries: Vec<TranscriptEntry>,
    next_timestamp: u64,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next order key
    pub fn next_timestamp(&mut self) -> u64 {
        let timestamp = self.next_timestamp;
        self.next_timestamp += 1;
        timestamp
    }

    /// Insert an entry carrying its own timestamp. The counter is advanced past
    /// it so later allocations stay unique.
    pub fn insert(&mut self, entry: TranscriptEntry) {
        self.next_timestamp = self.next_timestamp.max(entry.timestamp.saturating_add(1));
        if entry.is_user() {
            self.user_entries.push(entry);
        } else {
            self.agent_entries.push(entry);
        }
    }

    /// Append a user entry with a fresh timestamp
    pub fn append_user(&mut self, content: impl Into<String>) -> u64 {
        let timestamp = self.next_timestamp();
        self.insert(TranscriptEntry::user(content, timestamp));
        timestamp
    }

    /// Append an error entry attributed to `agent` (or the system pseudo-agent)
    pub fn append_error(&mut self, agent: AgentId, content: impl Into<String>) -> u64 {
        let timestamp = self.next_timestamp();
        self.insert(TranscriptEntry::error(agent, content, timestamp));
        timestamp
    }

    /// Append an agent message, or extend a prior non-final entry with the same
    /// agent and logical message id.
    pub fn apply_agent_message(
        &mut self,
        agent: AgentId,
        content: &str,
        message_id: Option<&str>,
        is_final: bool,
    ) -> MessageOutcome {
        if let Some(id) = message_id {
            let existing = self.agent_entries.iter_mut().find(|entry| {
                entry.agent_id == Some(agent) && entry.message_id.as_deref() == Some(id)
            });

            if let Some(entry) = existing {
                if entry.is_final {
                    log::warn!(
                        "Ignoring update to final message '{}' from {}",
                        id,
                        agent.as_str()
                    );
                    return MessageOutcome::RejectedFinal;
                }
                entry.content = content.to_string();
                entry.is_final = is_final;
                return MessageOutcome::Extended;
            }
        }

        let timestamp = self.next_timestamp();
        self.insert(TranscriptEntry::agent(
            agent,
            content,
            timestamp,
            message_id.map(str::to_string),
            is_final,
        ));
        MessageOutcome::Appended
    }

    /// All entries merged and sorted ascending by timestamp
    pub fn merged(&self) -> Vec<TranscriptEntry> {
        let mut entries: Vec<TranscriptEntry> = self
            .user_entries
            .iter()
            .chain(self.agent_entries.iter())
            .cloned()
            .collect();
        // Stable: equal timestamps keep insertion order
        entries.sort_by_key(|entry| entry.timestamp);
        entries
    }

    pub fn len(&self) -> usize {
        self.user_entries.len() + self.agent_entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn user_entries(&self) -> &[TranscriptEntry] {
        &self.user_entries
    }

    pub fn agent_entries(&self) -> &[TranscriptEntry] {
        &self.agent_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryOrigin;

    #[test]
    fn test_merged_is_sorted_by_timestamp() {
        let mut store = TranscriptStore::new();
        store.insert(TranscriptEntry::agent(AgentId::Supervisor, "five", 5, None, true));
        store.insert(TranscriptEntry::user("two", 2));
        store.insert(TranscriptEntry::agent(AgentId::GapAnalyst, "nine", 9, None, true));

        let order: Vec<u64> = store.merged().iter().map(|e| e.timestamp).collect();
        assert_eq!(order, vec![2, 5, 9]);
    }

    #[test]
    fn test_insert_advances_counter() {
        let mut store = TranscriptStore::new();
        store.insert(TranscriptEntry::user("late", 41));
        assert_eq!(store.next_timestamp(), 42);
    }

    #[test]
    fn test_user_then_agent_ordering() {
        let mut store = TranscriptStore::new();
        store.append_user("impact of AI on jobs");
        store.apply_agent_message(AgentId::Supervisor, "Planning", None, true);

        let merged = store.merged();
        assert_eq!(merged[0].origin, EntryOrigin::User);
        assert_eq!(merged[1].origin, EntryOrigin::Agent);
    }

    #[test]
    fn test_messages_without_id_always_append() {
        let mut store = TranscriptStore::new();
        store.apply_agent_message(AgentId::Supervisor, "one", None, true);
        store.apply_agent_message(AgentId::Supervisor, "one", None, true);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_non_final_message_is_extended_in_place() {
        let mut store = TranscriptStore::new();
        store.append_user("topic");
        let first = store.apply_agent_message(AgentId::ReportCompiler, "# Re", Some("r1"), false);
        store.apply_agent_message(AgentId::Supervisor, "meanwhile", None, true);
        let second =
            store.apply_agent_message(AgentId::ReportCompiler, "# Report", Some("r1"), true);

        assert_eq!(first, MessageOutcome::Appended);
        assert_eq!(second, MessageOutcome::Extended);
        assert_eq!(store.len(), 3);

        let merged = store.merged();
        // Extended entry keeps its original position
        assert_eq!(merged[1].content, "# Report");
        assert!(merged[1].is_final);
        assert_eq!(merged[2].content, "meanwhile");
    }

    #[test]
    fn test_final_message_is_immutable() {
        let mut store = TranscriptStore::new();
        store.apply_agent_message(AgentId::GapAnalyst, "done", Some("g1"), true);
        let outcome = store.apply_agent_message(AgentId::GapAnalyst, "changed", Some("g1"), true);

        assert_eq!(outcome, MessageOutcome::RejectedFinal);
        assert_eq!(store.merged()[0].content, "done");
    }

    #[test]
    fn test_same_id_from_different_agents_does_not_collide() {
        let mut store = TranscriptStore::new();
        store.apply_agent_message(AgentId::TopicRefiner, "a", Some("m"), false);
        let outcome = store.apply_agent_message(AgentId::PaperDiscoverer, "b", Some("m"), false);
        assert_eq!(outcome, MessageOutcome::Appended);
        assert_eq!(store.agent_entries().len(), 2);
    }

    #[test]
    fn test_error_entries_are_distinguishable() {
        let mut store = TranscriptStore::new();
        store.append_error(AgentId::System, "connection refused");
        let merged = store.merged();
        assert!(merged[0].is_error());
        assert_eq!(merged[0].origin, EntryOrigin::System);
        // System entries live with the remote entries
        assert!(store.user_entries().is_empty());
    }
}
