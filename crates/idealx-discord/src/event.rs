//! Event types shared by the gateway forwarder, the webhook dispatcher and the router.

use serde::{Deserialize, Serialize};
use serenity::model::application::CommandInteraction;
use serenity::model::channel::{Message, Reaction};

use idealx_core::RawMessage;

/// Header carrying the bot token on forwarded gateway events.
pub const GATEWAY_TOKEN_HEADER: &str = "x-discord-gateway-token";

/// Envelope the gateway session POSTs to the local webhook endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GatewayEvent {
    MessageCreate(Box<Message>),
    MessageReactionAdd(Box<Reaction>),
    InteractionCreate(Box<CommandInteraction>),
}

impl GatewayEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayEvent::MessageCreate(_) => "MESSAGE_CREATE",
            GatewayEvent::MessageReactionAdd(_) => "MESSAGE_REACTION_ADD",
            GatewayEvent::InteractionCreate(_) => "INTERACTION_CREATE",
        }
    }
}

/// A new message, with mention detection already applied.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub message: RawMessage,
    /// The bot user or one of the configured mention roles was mentioned.
    pub is_mention: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingReaction {
    pub emoji: String,
    pub message_id: String,
    pub user_id: String,
}

/// A slash command invocation.
///
/// `text` holds the option values joined by single spaces in declaration
/// order, so `/translate language:french text:Hello world` arrives as
/// `"french Hello world"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    pub name: String,
    pub text: String,
    pub user_id: String,
}
