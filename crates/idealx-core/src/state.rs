//! In-process conversation state: reset markers and thread subscriptions.
//!
//! Everything here lives only as long as the process. Neither map is ever
//! evicted: one entry per scope that was cleared or subscribed. Production
//! parity with a long-running deployment needs external persistence or
//! periodic eviction, which this store does not do.

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};

use crate::types::{RawMessage, ThreadIdentity};

#[derive(Debug, Default)]
pub struct MemoryState {
    reset_markers: DashMap<String, DateTime<Utc>>,
    subscriptions: DashSet<String>,
}

impl MemoryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reset for `scope`. A later reset replaces the earlier one.
    pub fn set_reset_marker(&self, scope: &ThreadIdentity, at: DateTime<Utc>) {
        self.reset_markers.insert(scope.key(), at);
    }

    pub fn reset_marker(&self, scope: &ThreadIdentity) -> Option<DateTime<Utc>> {
        self.reset_markers.get(&scope.key()).map(|entry| *entry.value())
    }

    /// Drop every message that predates the reset marker for `scope`.
    pub fn retain_after_reset(&self, scope: &ThreadIdentity, messages: Vec<RawMessage>) -> Vec<RawMessage> {
        match self.reset_marker(scope) {
            Some(marker) => messages
                .into_iter()
                .filter(|m| m.timestamp >= marker)
                .collect(),
            None => messages,
        }
    }

    pub fn subscribe(&self, thread: &ThreadIdentity) -> bool {
        self.subscriptions.insert(thread.key())
    }

    pub fn is_subscribed(&self, thread: &ThreadIdentity) -> bool {
        self.subscriptions.contains(&thread.key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Author;
    use chrono::Duration;

    fn msg(text: &str, at: DateTime<Utc>) -> RawMessage {
        RawMessage {
            id: text.to_string(),
            text: text.to_string(),
            author: Author::default(),
            timestamp: at,
        }
    }

    #[test]
    fn no_marker_keeps_everything() {
        let state = MemoryState::new();
        let scope = ThreadIdentity::new(Some("1"), "2", None::<String>);
        let now = Utc::now();
        let kept = state.retain_after_reset(&scope, vec![msg("a", now), msg("b", now)]);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn marker_drops_older_messages() {
        let state = MemoryState::new();
        let scope = ThreadIdentity::new(Some("1"), "2", None::<String>);
        let marker = Utc::now();
        state.set_reset_marker(&scope, marker);

        let kept = state.retain_after_reset(
            &scope,
            vec![
                msg("before", marker - Duration::seconds(5)),
                msg("at", marker),
                msg("after", marker + Duration::seconds(5)),
            ],
        );
        let texts: Vec<_> = kept.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(texts, vec!["at", "after"]);
    }

    #[test]
    fn marker_is_scoped() {
        let state = MemoryState::new();
        let cleared = ThreadIdentity::new(Some("1"), "2", None::<String>);
        let other = ThreadIdentity::new(Some("1"), "3", None::<String>);
        state.set_reset_marker(&cleared, Utc::now());
        assert!(state.reset_marker(&cleared).is_some());
        assert!(state.reset_marker(&other).is_none());
    }

    #[test]
    fn subscribe_is_idempotent() {
        let state = MemoryState::new();
        let thread = ThreadIdentity::new(Some("1"), "2", Some("3"));
        assert!(!state.is_subscribed(&thread));
        assert!(state.subscribe(&thread));
        assert!(!state.subscribe(&thread));
        assert!(state.is_subscribed(&thread));
    }
}
