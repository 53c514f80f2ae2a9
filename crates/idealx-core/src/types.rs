use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Composite key for a conversation container: server + channel, plus the
/// thread when the conversation lives inside one.
///
/// For a thread inside a forum, `channel_id` is the parent forum channel and
/// `thread_id` is the thread itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ThreadIdentity {
    /// `None` for direct messages.
    pub server_id: Option<String>,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
}

impl ThreadIdentity {
    pub fn new(
        server_id: Option<impl Into<String>>,
        channel_id: impl Into<String>,
        thread_id: Option<impl Into<String>>,
    ) -> Self {
        Self {
            server_id: server_id.map(Into::into),
            channel_id: channel_id.into(),
            thread_id: thread_id.map(Into::into),
        }
    }

    /// Canonical serialization used as a map key.
    ///
    /// Format: `discord:{server}:{channel}` or `discord:{server}:{channel}:{thread}`,
    /// with `@me` standing in for the server of a direct message.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ThreadIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let server = self.server_id.as_deref().unwrap_or("@me");
        match self.thread_id {
            Some(ref thread) => write!(f, "discord:{}:{}:{}", server, self.channel_id, thread),
            None => write!(f, "discord:{}:{}", server, self.channel_id),
        }
    }
}

/// Servers and forum channels that receive unprompted responses.
///
/// Both lists are checked independently: an identity is in scope when its
/// server is listed AND its channel is listed.
#[derive(Debug, Clone, Default)]
pub struct TargetScope {
    server_ids: HashSet<String>,
    forum_channel_ids: HashSet<String>,
}

impl TargetScope {
    pub fn new<S, C>(server_ids: S, forum_channel_ids: C) -> Self
    where
        S: IntoIterator,
        S::Item: Into<String>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            server_ids: server_ids.into_iter().map(Into::into).collect(),
            forum_channel_ids: forum_channel_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn contains(&self, id: &ThreadIdentity) -> bool {
        let Some(ref server) = id.server_id else {
            return false;
        };
        self.server_ids.contains(server) && self.forum_channel_ids.contains(&id.channel_id)
    }

    pub fn is_empty(&self) -> bool {
        self.server_ids.is_empty() || self.forum_channel_ids.is_empty()
    }
}

/// Author flags attached to a message by the platform adapter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub user_id: String,
    /// The bot itself wrote this message.
    pub is_me: bool,
    /// `None` when the platform could not tell.
    pub is_bot: Option<bool>,
}

impl Author {
    pub fn is_bot_or_me(&self) -> bool {
        self.is_me || self.is_bot == Some(true)
    }
}

/// A message as delivered by the adapter for one fetch. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub text: String,
    pub author: Author,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One role-tagged unit of model input. `content` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forum_thread() -> ThreadIdentity {
        ThreadIdentity::new(Some("100"), "200", Some("300"))
    }

    #[test]
    fn key_includes_thread_when_present() {
        assert_eq!(forum_thread().key(), "discord:100:200:300");
        let channel = ThreadIdentity::new(Some("100"), "200", None::<String>);
        assert_eq!(channel.key(), "discord:100:200");
    }

    #[test]
    fn dm_key_uses_placeholder_server() {
        let dm = ThreadIdentity::new(None::<String>, "42", None::<String>);
        assert_eq!(dm.key(), "discord:@me:42");
    }

    #[test]
    fn scope_requires_server_and_channel() {
        let scope = TargetScope::new(["100"], ["200"]);
        assert!(scope.contains(&forum_thread()));
        assert!(!scope.contains(&ThreadIdentity::new(Some("101"), "200", Some("300"))));
        assert!(!scope.contains(&ThreadIdentity::new(Some("100"), "201", Some("300"))));
        assert!(!scope.contains(&ThreadIdentity::new(None::<String>, "200", None::<String>)));
    }

    #[test]
    fn empty_scope_matches_nothing() {
        let scope = TargetScope::default();
        assert!(scope.is_empty());
        assert!(!scope.contains(&forum_thread()));
    }

    #[test]
    fn unknown_bot_flag_is_not_a_bot() {
        let author = Author {
            user_id: "1".to_string(),
            is_me: false,
            is_bot: None,
        };
        assert!(!author.is_bot_or_me());
    }
}
