//! Per-user conversation state tracking.
//!
//! The tracker is the only owner of in-flight flow state. Entries are
//! transient: a restart drops every open flow by design, and starting a
//! new flow silently replaces whatever was active (last-flow-wins).

use std::sync::Arc;

use dashmap::DashMap;

/// What the next free-text message from a user means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    /// Waiting for the title of a new note.
    AddingTitle,
    /// Waiting for the content of a new note; the title is already in.
    AddingContent { title: String },
    /// Waiting for a numeric id naming the note to edit.
    EditingSelectId,
    /// Waiting for a numeric id naming the note to delete.
    DeletingSelectId,
    /// Waiting for a search query.
    Searching,
}

/// Concurrent map from user id to active state. Absent entry = no flow.
#[derive(Clone, Default)]
pub struct ConversationTracker {
    states: Arc<DashMap<i64, ConversationState>>,
}

impl ConversationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self, user_id: i64) -> Option<ConversationState> {
        self.states.get(&user_id).map(|entry| entry.clone())
    }

    pub fn is_active(&self, user_id: i64) -> bool {
        self.states.contains_key(&user_id)
    }

    /// Enter (or replace) the active flow for a user.
    pub fn begin(&self, user_id: i64, state: ConversationState) {
        self.states.insert(user_id, state);
    }

    /// Drop the active flow, if any.
    pub fn clear(&self, user_id: i64) {
        self.states.remove(&user_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_entry_means_no_flow() {
        let tracker = ConversationTracker::new();
        assert!(!tracker.is_active(1));
        assert_eq!(tracker.state(1), None);
    }

    #[test]
    fn test_begin_replaces_previous_state() {
        let tracker = ConversationTracker::new();
        tracker.begin(1, ConversationState::AddingTitle);
        tracker.begin(1, ConversationState::Searching);
        assert_eq!(tracker.state(1), Some(ConversationState::Searching));
    }

    #[test]
    fn test_states_are_per_user() {
        let tracker = ConversationTracker::new();
        tracker.begin(1, ConversationState::AddingTitle);
        tracker.begin(
            2,
            ConversationState::AddingContent {
                title: "Groceries".to_string(),
            },
        );
        tracker.clear(1);
        assert!(!tracker.is_active(1));
        assert_eq!(
            tracker.state(2),
            Some(ConversationState::AddingContent {
                title: "Groceries".to_string(),
            })
        );
    }

    #[test]
    fn test_concurrent_access_from_threads() {
        let tracker = ConversationTracker::new();
        let mut handles = Vec::new();
        for user_id in 0..8i64 {
            let tracker = tracker.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    tracker.begin(user_id, ConversationState::Searching);
                    tracker.clear(user_id);
                }
                tracker.begin(user_id, ConversationState::EditingSelectId);
            }));
        }
        for handle in handles {
            handle.join().expect("thread");
        }
        for user_id in 0..8i64 {
            assert_eq!(
                tracker.state(user_id),
                Some(ConversationState::EditingSelectId)
            );
        }
    }
}
