pub mod adapter;
pub mod bridge;
pub mod card;
pub mod commands;
pub mod context;
pub mod enrich;
pub mod error;
pub mod event;
pub mod handler;
pub mod router;
pub mod send;
pub mod snowflake;
pub mod supervisor;
pub mod thread;
pub mod webhook;

pub use adapter::DiscordGateway;
pub use bridge::DiscordBridge;
pub use card::Card;
pub use commands::CommandDispatcher;
pub use error::DiscordError;
pub use event::{IncomingMessage, IncomingReaction, SlashCommand};
pub use router::EventRouter;
pub use supervisor::GatewaySupervisor;
pub use thread::{ChatThread, Reply};
pub use webhook::{WebhookDispatcher, WebhookRequest, WebhookResponse};
