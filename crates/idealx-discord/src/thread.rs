//! Conversation containers: the surface the event engine posts to and reads from.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use futures_util::StreamExt;
use serenity::builder::{CreateMessage, EditInteractionResponse, EditMessage, GetMessages};
use serenity::http::Http;
use serenity::model::application::CommandInteraction;
use serenity::model::channel::{Channel, ChannelType, GuildChannel, Message};
use serenity::model::id::{ChannelId, GuildId, UserId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use idealx_agent::ForumContext;
use idealx_core::{Author, RawMessage, ThreadIdentity};

use crate::card::Card;
use crate::error::DiscordError;
use crate::send::split_chunks;
use crate::snowflake;

/// Minimum gap between edits of a streamed message.
pub const STREAM_EDIT_INTERVAL: Duration = Duration::from_secs(1);

/// Largest page Discord returns for one history request.
const PAGE_MAX: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Card(Card),
}

impl From<&str> for Reply {
    fn from(text: &str) -> Self {
        Reply::Text(text.to_string())
    }
}

impl From<Card> for Reply {
    fn from(card: Card) -> Self {
        Reply::Card(card)
    }
}

/// A channel or thread the bot can read history from and post into.
#[async_trait]
pub trait ChatThread: Send + Sync {
    fn identity(&self) -> &ThreadIdentity;

    /// The latest `limit` messages (single page), oldest first.
    async fn recent_messages(&self, limit: usize) -> Result<Vec<RawMessage>, DiscordError>;

    /// Walk history backwards until `limit` messages are collected, oldest first.
    async fn history(&self, limit: usize) -> Result<Vec<RawMessage>, DiscordError>;

    async fn post(&self, reply: Reply) -> Result<(), DiscordError>;

    /// Post text as it arrives on `rx`, editing in place while it grows.
    async fn post_stream(&self, rx: mpsc::Receiver<String>) -> Result<(), DiscordError>;

    /// Thread title and parent forum topic, when this is a forum thread.
    async fn forum_context(&self) -> Option<ForumContext>;
}

fn is_thread(kind: ChannelType) -> bool {
    matches!(
        kind,
        ChannelType::PublicThread | ChannelType::PrivateThread | ChannelType::NewsThread
    )
}

/// Resolves channel ids into thread identities, caching channel lookups.
pub struct ThreadResolver {
    http: Arc<Http>,
    channels: DashMap<ChannelId, GuildChannel>,
}

impl ThreadResolver {
    pub fn new(http: Arc<Http>) -> Self {
        Self {
            http,
            channels: DashMap::new(),
        }
    }

    async fn guild_channel(&self, id: ChannelId) -> Option<GuildChannel> {
        if let Some(cached) = self.channels.get(&id) {
            return Some(cached.clone());
        }
        match self.http.get_channel(id).await {
            Ok(Channel::Guild(channel)) => {
                self.channels.insert(id, channel.clone());
                Some(channel)
            }
            Ok(_) => None,
            Err(e) => {
                warn!(channel = %id, error = %e, "channel lookup failed");
                None
            }
        }
    }

    /// `{guild, parent, thread}` for threads, `{guild, channel}` otherwise.
    pub async fn identity(&self, channel_id: ChannelId, guild_id: Option<GuildId>) -> ThreadIdentity {
        let Some(guild_id) = guild_id else {
            return ThreadIdentity::new(None::<String>, channel_id.to_string(), None::<String>);
        };

        match self.guild_channel(channel_id).await {
            Some(channel) if is_thread(channel.kind) => {
                let parent = channel.parent_id.unwrap_or(channel_id);
                ThreadIdentity::new(
                    Some(guild_id.to_string()),
                    parent.to_string(),
                    Some(channel_id.to_string()),
                )
            }
            _ => ThreadIdentity::new(Some(guild_id.to_string()), channel_id.to_string(), None::<String>),
        }
    }

    pub async fn forum_context(&self, thread_id: ChannelId) -> Option<ForumContext> {
        let thread = self.guild_channel(thread_id).await?;
        if !is_thread(thread.kind) {
            return None;
        }
        let description = match thread.parent_id {
            Some(parent) => self.guild_channel(parent).await.and_then(|p| p.topic),
            None => None,
        };
        Some(ForumContext {
            title: Some(thread.name),
            description,
        })
    }
}

/// Serenity-backed [`ChatThread`].
///
/// When built for a slash command, the first post edits the deferred
/// interaction response; everything after goes to the channel.
pub struct DiscordThread {
    http: Arc<Http>,
    resolver: Arc<ThreadResolver>,
    channel_id: ChannelId,
    identity: ThreadIdentity,
    bot_user_id: UserId,
    interaction: Option<CommandInteraction>,
    interaction_used: AtomicBool,
}

impl DiscordThread {
    pub fn new(
        http: Arc<Http>,
        resolver: Arc<ThreadResolver>,
        channel_id: ChannelId,
        identity: ThreadIdentity,
        bot_user_id: UserId,
    ) -> Self {
        Self {
            http,
            resolver,
            channel_id,
            identity,
            bot_user_id,
            interaction: None,
            interaction_used: AtomicBool::new(false),
        }
    }

    pub fn with_interaction(mut self, command: CommandInteraction) -> Self {
        self.interaction = Some(command);
        self
    }

    fn pending_interaction(&self) -> Option<&CommandInteraction> {
        let command = self.interaction.as_ref()?;
        if self.interaction_used.swap(true, Ordering::SeqCst) {
            None
        } else {
            Some(command)
        }
    }

    async fn send_text(&self, text: &str) -> Result<Message, DiscordError> {
        Ok(self.channel_id.say(&*self.http, text).await?)
    }

    /// Bring the posted messages in line with `text`, editing changed chunks
    /// and appending new ones.
    async fn flush(&self, text: &str, posted: &mut Vec<(Message, String)>) -> Result<(), DiscordError> {
        if text.trim().is_empty() {
            return Ok(());
        }
        for (i, chunk) in split_chunks(text).into_iter().enumerate() {
            match posted.get_mut(i) {
                Some((message, sent)) => {
                    if *sent != chunk {
                        message
                            .edit(&*self.http, EditMessage::new().content(&chunk))
                            .await?;
                        *sent = chunk;
                    }
                }
                None => {
                    let message = self.send_text(&chunk).await?;
                    posted.push((message, chunk));
                }
            }
        }
        Ok(())
    }
}

/// Convert a serenity message into the engine's view of it.
pub fn to_raw_message(message: &Message, bot_user_id: UserId) -> RawMessage {
    let timestamp = snowflake::created_at(message.id.get()).unwrap_or_default();
    RawMessage {
        id: message.id.to_string(),
        text: message.content.clone(),
        author: Author {
            user_id: message.author.id.to_string(),
            is_me: message.author.id == bot_user_id,
            is_bot: Some(message.author.bot),
        },
        timestamp,
    }
}

#[async_trait]
impl ChatThread for DiscordThread {
    fn identity(&self) -> &ThreadIdentity {
        &self.identity
    }

    async fn recent_messages(&self, limit: usize) -> Result<Vec<RawMessage>, DiscordError> {
        let limit = limit.clamp(1, PAGE_MAX) as u8;
        let mut messages = self
            .channel_id
            .messages(&*self.http, GetMessages::new().limit(limit))
            .await?;
        // newest first from the API
        messages.reverse();
        Ok(messages
            .iter()
            .map(|m| to_raw_message(m, self.bot_user_id))
            .collect())
    }

    async fn history(&self, limit: usize) -> Result<Vec<RawMessage>, DiscordError> {
        let mut stream = Box::pin(self.channel_id.messages_iter(&*self.http).take(limit));
        let mut out = Vec::with_capacity(limit.min(PAGE_MAX));
        while let Some(message) = stream.next().await {
            out.push(to_raw_message(&message?, self.bot_user_id));
        }
        out.reverse();
        Ok(out)
    }

    async fn post(&self, reply: Reply) -> Result<(), DiscordError> {
        match reply {
            Reply::Card(card) => {
                debug!(thread = %self.identity, card = %card.title, "posting card");
                if let Some(command) = self.pending_interaction() {
                    command
                        .edit_response(
                            &*self.http,
                            EditInteractionResponse::new().embed(card.to_create_embed()),
                        )
                        .await?;
                } else {
                    self.channel_id
                        .send_message(&*self.http, CreateMessage::new().embed(card.to_create_embed()))
                        .await?;
                }
            }
            Reply::Text(text) => {
                let chunks = split_chunks(&text);
                let mut rest = chunks.iter().filter(|c| !c.trim().is_empty());
                if let Some(first) = rest.next() {
                    if let Some(command) = self.pending_interaction() {
                        command
                            .edit_response(&*self.http, EditInteractionResponse::new().content(first))
                            .await?;
                    } else {
                        self.send_text(first).await?;
                    }
                }
                for chunk in rest {
                    self.send_text(chunk).await?;
                }
            }
        }
        Ok(())
    }

    async fn post_stream(&self, mut rx: mpsc::Receiver<String>) -> Result<(), DiscordError> {
        if let Err(e) = self.channel_id.broadcast_typing(&*self.http).await {
            debug!(error = %e, "typing indicator failed");
        }

        let mut text = String::new();
        let mut posted: Vec<(Message, String)> = Vec::new();
        let mut last_flush: Option<Instant> = None;

        while let Some(delta) = rx.recv().await {
            text.push_str(&delta);
            if last_flush.is_none_or(|at| at.elapsed() >= STREAM_EDIT_INTERVAL) {
                self.flush(&text, &mut posted).await?;
                last_flush = Some(Instant::now());
            }
        }
        self.flush(&text, &mut posted).await
    }

    async fn forum_context(&self) -> Option<ForumContext> {
        self.resolver.forum_context(self.channel_id).await
    }
}
