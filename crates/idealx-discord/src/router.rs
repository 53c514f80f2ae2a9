//! Event routing: classify inbound events and run the matching handler.
//!
//! Message categories are checked in a fixed order and the first match wins:
//! own messages are ignored, then subscribed threads, then mentions, then
//! free-text patterns. Every matching pattern runs, in declaration order.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use idealx_agent::{ForumContext, ModelResponder};
use idealx_core::{ConversationTurn, MemoryState, TargetScope};

use crate::card::Card;
use crate::commands::{CommandDispatcher, GENERIC_APOLOGY, SUMMARY_APOLOGY};
use crate::context::build_turns;
use crate::enrich::{extract_urls, UrlEnricher};
use crate::error::DiscordError;
use crate::event::{IncomingMessage, IncomingReaction, SlashCommand};
use crate::thread::ChatThread;

/// Messages read for a mention or a non-forum subscribed thread.
pub const MENTION_WINDOW: usize = 5;
/// Messages read for a forum thread.
pub const FORUM_WINDOW: usize = 100;
/// Messages inspected when a summary reaction arrives.
pub const REACTION_LOOKBACK: usize = 10;
/// Reactions that request a summary.
pub const SUMMARY_EMOJI: &[&str] = &["📝"];

const NO_MESSAGES: &str = "メッセージを取得できませんでした。";
const EASTER_EGG_REPLY: &str = "ガッ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Ignore,
    Subscribed,
    Mention,
    Pattern,
}

/// What the router knows about a message before choosing a route.
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFacts {
    pub is_self: bool,
    pub subscribed: bool,
    pub is_mention: bool,
}

fn is_self(f: &MessageFacts) -> bool {
    f.is_self
}

fn is_subscribed(f: &MessageFacts) -> bool {
    f.subscribed
}

fn is_mention(f: &MessageFacts) -> bool {
    f.is_mention
}

const ROUTES: &[(fn(&MessageFacts) -> bool, Route)] = &[
    (is_self, Route::Ignore),
    (is_subscribed, Route::Subscribed),
    (is_mention, Route::Mention),
];

pub fn classify(facts: &MessageFacts) -> Route {
    ROUTES
        .iter()
        .find(|(matches, _)| matches(facts))
        .map(|(_, route)| *route)
        .unwrap_or(Route::Pattern)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    Any,
    Contains(&'static str),
}

impl Pattern {
    fn matches(&self, text: &str) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Contains(needle) => text.contains(needle),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternAction {
    ForumAutoResponse,
    EasterEgg,
}

const PATTERNS: &[(Pattern, PatternAction)] = &[
    (Pattern::Any, PatternAction::ForumAutoResponse),
    (Pattern::Contains("ぬるぽ"), PatternAction::EasterEgg),
];

/// Pattern actions whose pattern matches `text`, in declaration order.
pub fn matching_patterns(text: &str) -> Vec<PatternAction> {
    PATTERNS
        .iter()
        .filter(|(pattern, _)| pattern.matches(text))
        .map(|(_, action)| *action)
        .collect()
}

/// Run a handler, turning any failure into a log line and an apology post.
async fn guarded<F>(thread: &dyn ChatThread, handler: &'static str, apology: &str, work: F)
where
    F: Future<Output = Result<(), DiscordError>>,
{
    if let Err(e) = work.await {
        error!(handler, thread = %thread.identity(), error = %e, "event handler failed");
        if let Err(e) = thread.post(apology.into()).await {
            warn!(handler, error = %e, "failed to post apology");
        }
    }
}

pub struct EventRouter {
    responder: Arc<ModelResponder>,
    state: Arc<MemoryState>,
    scope: TargetScope,
    enricher: UrlEnricher,
    commands: CommandDispatcher,
}

impl EventRouter {
    pub fn new(responder: Arc<ModelResponder>, state: Arc<MemoryState>, scope: TargetScope) -> Self {
        let commands = CommandDispatcher::new(Arc::clone(&responder), Arc::clone(&state));
        Self {
            responder,
            state,
            scope,
            enricher: UrlEnricher::new(),
            commands,
        }
    }

    pub fn state(&self) -> &MemoryState {
        &self.state
    }

    pub async fn handle_message(&self, thread: Arc<dyn ChatThread>, event: IncomingMessage) {
        let thread = thread.as_ref();
        let facts = MessageFacts {
            is_self: event.message.author.is_me,
            subscribed: self.state.is_subscribed(thread.identity()),
            is_mention: event.is_mention,
        };
        let route = classify(&facts);
        debug!(thread = %thread.identity(), ?route, "message routed");

        match route {
            Route::Ignore => {}
            Route::Subscribed => {
                guarded(thread, "subscribed", GENERIC_APOLOGY, self.on_subscribed(thread, &event)).await
            }
            Route::Mention => guarded(thread, "mention", GENERIC_APOLOGY, self.on_mention(thread)).await,
            Route::Pattern => {
                for action in matching_patterns(&event.message.text) {
                    match action {
                        PatternAction::ForumAutoResponse => {
                            guarded(
                                thread,
                                "forum_auto_response",
                                GENERIC_APOLOGY,
                                self.on_forum_message(thread, &event),
                            )
                            .await
                        }
                        PatternAction::EasterEgg => {
                            if let Err(e) = thread.post(EASTER_EGG_REPLY.into()).await {
                                warn!(error = %e, "easter egg reply failed");
                            }
                        }
                    }
                }
            }
        }
    }

    pub async fn handle_reaction(&self, thread: Arc<dyn ChatThread>, event: IncomingReaction) {
        if !SUMMARY_EMOJI.contains(&event.emoji.as_str()) {
            return;
        }
        let thread = thread.as_ref();
        guarded(thread, "reaction", SUMMARY_APOLOGY, self.on_summary_reaction(thread, &event)).await
    }

    pub async fn handle_command(&self, thread: Arc<dyn ChatThread>, command: SlashCommand) {
        self.commands.dispatch(thread.as_ref(), &command).await
    }

    async fn on_mention(&self, thread: &dyn ChatThread) -> Result<(), DiscordError> {
        let messages = thread.recent_messages(MENTION_WINDOW).await?;
        let turns = self.assemble(thread, messages);
        if turns.is_empty() {
            return thread.post(NO_MESSAGES.into()).await;
        }
        self.stream_reply(thread, &turns).await
    }

    async fn on_subscribed(&self, thread: &dyn ChatThread, event: &IncomingMessage) -> Result<(), DiscordError> {
        if event.message.author.is_bot_or_me() {
            return Ok(());
        }

        let messages = if self.scope.contains(thread.identity()) {
            thread.history(FORUM_WINDOW).await?
        } else {
            thread.recent_messages(MENTION_WINDOW).await?
        };
        let turns = self.assemble(thread, messages);
        if turns.is_empty() {
            return Ok(());
        }
        self.stream_reply(thread, &turns).await
    }

    async fn on_forum_message(&self, thread: &dyn ChatThread, event: &IncomingMessage) -> Result<(), DiscordError> {
        if !self.scope.contains(thread.identity())
            || event.message.author.is_bot_or_me()
            || event.is_mention
        {
            return Ok(());
        }

        if self.state.subscribe(thread.identity()) {
            info!(thread = %thread.identity(), "subscribed to forum thread");
        }

        let messages = thread.history(FORUM_WINDOW).await?;
        let turns = self.assemble(thread, messages);
        if turns.is_empty() {
            return Ok(());
        }
        self.stream_reply(thread, &turns).await
    }

    async fn on_summary_reaction(&self, thread: &dyn ChatThread, event: &IncomingReaction) -> Result<(), DiscordError> {
        let window = thread.recent_messages(REACTION_LOOKBACK).await?;
        let Some(target) = window
            .iter()
            .find(|m| m.id == event.message_id)
            .or_else(|| window.last())
        else {
            return Ok(());
        };

        let text = target.text.as_str();
        let urls = extract_urls(text);
        if urls.is_empty() && text.trim().is_empty() {
            return Ok(());
        }

        let contents = self.enricher.fetch_all(&urls).await;
        debug!(urls = urls.len(), fetched = contents.len(), "url enrichment done");

        let summary = self.responder.summarize_with_urls(text, &contents).await?;
        thread.post(Card::new("要約").text(summary).into()).await
    }

    /// Drop history from before the scope's reset marker, then build turns.
    fn assemble(&self, thread: &dyn ChatThread, messages: Vec<idealx_core::RawMessage>) -> Vec<ConversationTurn> {
        let messages = self.state.retain_after_reset(thread.identity(), messages);
        build_turns(&messages)
    }

    async fn forum_context(&self, thread: &dyn ChatThread) -> Option<ForumContext> {
        if self.scope.contains(thread.identity()) {
            thread.forum_context().await
        } else {
            None
        }
    }

    async fn stream_reply(&self, thread: &dyn ChatThread, turns: &[ConversationTurn]) -> Result<(), DiscordError> {
        let forum = self.forum_context(thread).await;
        let (tx, rx) = mpsc::channel(64);
        let (generated, posted) = tokio::join!(
            self.responder.respond(turns, forum.as_ref(), tx),
            thread.post_stream(rx),
        );
        generated?;
        posted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn facts(is_self: bool, subscribed: bool, is_mention: bool) -> MessageFacts {
        MessageFacts {
            is_self,
            subscribed,
            is_mention,
        }
    }

    #[test]
    fn own_messages_are_ignored_first() {
        assert_eq!(classify(&facts(true, true, true)), Route::Ignore);
    }

    #[test]
    fn subscription_beats_mention() {
        assert_eq!(classify(&facts(false, true, true)), Route::Subscribed);
        assert_eq!(classify(&facts(false, false, true)), Route::Mention);
        assert_eq!(classify(&facts(false, false, false)), Route::Pattern);
    }

    #[test]
    fn patterns_run_in_declaration_order() {
        assert_eq!(
            matching_patterns("今日もぬるぽ"),
            vec![PatternAction::ForumAutoResponse, PatternAction::EasterEgg]
        );
        assert_eq!(matching_patterns("hello"), vec![PatternAction::ForumAutoResponse]);
    }
}
