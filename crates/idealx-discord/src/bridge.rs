//! Turns accepted Discord events into router calls.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::builder::{CreateInteractionResponse, CreateInteractionResponseMessage};
use serenity::http::Http;
use serenity::model::channel::ReactionType;
use serenity::model::id::{ChannelId, GuildId, RoleId, UserId};
use tokio::sync::OnceCell;
use tracing::error;

use crate::commands::command_text;
use crate::error::DiscordError;
use crate::event::{IncomingMessage, IncomingReaction, SlashCommand};
use crate::router::EventRouter;
use crate::thread::{to_raw_message, DiscordThread, ThreadResolver};
use crate::webhook::{EventSink, InboundEvent};

pub struct DiscordBridge {
    http: Arc<Http>,
    router: Arc<EventRouter>,
    resolver: Arc<ThreadResolver>,
    mention_roles: Vec<RoleId>,
    bot_user: OnceCell<UserId>,
}

impl DiscordBridge {
    pub fn new(http: Arc<Http>, router: Arc<EventRouter>, mention_role_ids: &[String]) -> Self {
        let mention_roles = mention_role_ids
            .iter()
            .filter_map(|id| id.parse::<u64>().ok())
            .filter(|id| *id != 0)
            .map(RoleId::new)
            .collect();
        Self {
            resolver: Arc::new(ThreadResolver::new(Arc::clone(&http))),
            http,
            router,
            mention_roles,
            bot_user: OnceCell::new(),
        }
    }

    async fn bot_user_id(&self) -> Result<UserId, DiscordError> {
        let id = self
            .bot_user
            .get_or_try_init(|| async {
                let me = self.http.get_current_user().await?;
                Ok::<_, DiscordError>(me.id)
            })
            .await?;
        Ok(*id)
    }

    async fn thread(&self, channel_id: ChannelId, guild_id: Option<GuildId>, bot: UserId) -> DiscordThread {
        let identity = self.resolver.identity(channel_id, guild_id).await;
        DiscordThread::new(
            Arc::clone(&self.http),
            Arc::clone(&self.resolver),
            channel_id,
            identity,
            bot,
        )
    }

    async fn route(&self, event: InboundEvent) -> Result<(), DiscordError> {
        let bot = self.bot_user_id().await?;

        match event {
            InboundEvent::Message(msg) => {
                let is_mention = msg.mentions_user_id(bot)
                    || msg.mention_roles.iter().any(|r| self.mention_roles.contains(r));
                let message = to_raw_message(&msg, bot);
                let thread = self.thread(msg.channel_id, msg.guild_id, bot).await;
                self.router
                    .handle_message(Arc::new(thread), IncomingMessage { message, is_mention })
                    .await;
            }
            InboundEvent::Reaction(reaction) => {
                let ReactionType::Unicode(ref emoji) = reaction.emoji else {
                    return Ok(());
                };
                let event = IncomingReaction {
                    emoji: emoji.clone(),
                    message_id: reaction.message_id.to_string(),
                    user_id: reaction.user_id.map(|u| u.to_string()).unwrap_or_default(),
                };
                let thread = self.thread(reaction.channel_id, reaction.guild_id, bot).await;
                self.router.handle_reaction(Arc::new(thread), event).await;
            }
            InboundEvent::Command { command, deferred } => {
                if !deferred {
                    command
                        .create_response(
                            &*self.http,
                            CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
                        )
                        .await?;
                }
                let slash = SlashCommand {
                    name: command.data.name.clone(),
                    text: command_text(&command.data.name, &command.data.options),
                    user_id: command.user.id.to_string(),
                };
                let thread = self
                    .thread(command.channel_id, command.guild_id, bot)
                    .await
                    .with_interaction(*command);
                self.router.handle_command(Arc::new(thread), slash).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl EventSink for DiscordBridge {
    async fn deliver(&self, event: InboundEvent) {
        if let Err(e) = self.route(event).await {
            error!(error = %e, "failed to route Discord event");
        }
    }
}
