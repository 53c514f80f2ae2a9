//! Conversation window assembly: raw channel history into model turns.

use std::sync::LazyLock;

use regex::Regex;

use idealx_core::{ConversationTurn, RawMessage, Role};

/// `<@123>` or `<@!123>`.
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?\d+>").expect("mention pattern is valid"));

/// Remove every user mention token from `text`.
pub fn strip_mentions(text: &str) -> String {
    MENTION.replace_all(text, "").into_owned()
}

/// Build role-tagged turns from messages in oldest-first order.
///
/// Blank messages are dropped, the bot's own messages become assistant
/// turns, mention tokens are stripped, and anything left empty after
/// stripping is dropped. Order is preserved.
pub fn build_turns(messages: &[RawMessage]) -> Vec<ConversationTurn> {
    messages
        .iter()
        .filter(|m| !m.text.trim().is_empty())
        .filter_map(|m| {
            let content = strip_mentions(&m.text).trim().to_string();
            if content.is_empty() {
                return None;
            }
            let role = if m.author.is_me {
                Role::Assistant
            } else {
                Role::User
            };
            Some(ConversationTurn { role, content })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use idealx_core::Author;

    fn msg(text: &str, is_me: bool) -> RawMessage {
        RawMessage {
            id: "1".to_string(),
            text: text.to_string(),
            author: Author {
                user_id: if is_me { "bot" } else { "user" }.to_string(),
                is_me,
                is_bot: Some(is_me),
            },
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn maps_roles_and_strips_mentions() {
        let turns = build_turns(&[
            msg("<@123> こんにちは", false),
            msg("はい、どうぞ", true),
            msg("<@!456>続きを <@789>", false),
        ]);
        assert_eq!(
            turns,
            vec![
                ConversationTurn {
                    role: Role::User,
                    content: "こんにちは".to_string()
                },
                ConversationTurn {
                    role: Role::Assistant,
                    content: "はい、どうぞ".to_string()
                },
                ConversationTurn {
                    role: Role::User,
                    content: "続きを".to_string()
                },
            ]
        );
    }

    #[test]
    fn drops_blank_and_mention_only_messages() {
        let turns = build_turns(&[msg("   ", false), msg("<@123>", false), msg("\n<@!9> \t", false)]);
        assert!(turns.is_empty());
    }

    #[test]
    fn role_mentions_and_channel_links_are_kept() {
        // only user mentions are stripped
        let turns = build_turns(&[msg("<@&42> <#77> hi", false)]);
        assert_eq!(turns[0].content, "<@&42> <#77> hi");
    }

    #[test]
    fn every_turn_is_trimmed_and_mention_free() {
        let inputs = [
            " a ", "<@1>", "<@1> b <@!2> c", "\t", "d<@3>", "<@!4>\n e\n",
        ];
        let messages: Vec<_> = inputs.iter().map(|t| msg(t, false)).collect();
        for turn in build_turns(&messages) {
            assert!(!turn.content.is_empty());
            assert_eq!(turn.content, turn.content.trim());
            assert!(!MENTION.is_match(&turn.content));
        }
    }
}
