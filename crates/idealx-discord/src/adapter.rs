use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::gateway::GatewayIntents;
use serenity::Client;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::DiscordError;
use crate::handler::{Forwarder, ForwardingHandler};
use crate::supervisor::{GatewayConnector, GatewaySession};

/// Discord gateway connector.
///
/// Each session is a fresh serenity `Client` whose handler forwards every
/// push event to the local webhook endpoint.
pub struct DiscordGateway {
    token: String,
    forwarder: Forwarder,
}

impl DiscordGateway {
    /// Fails with [`DiscordError::NoToken`] when no bot token is configured.
    pub fn new(token: &str, webhook_url: String) -> Result<Self, DiscordError> {
        if token.trim().is_empty() {
            return Err(DiscordError::NoToken);
        }
        Ok(Self {
            token: token.to_string(),
            forwarder: Forwarder::new(webhook_url, token.to_string()),
        })
    }

    pub fn intents() -> GatewayIntents {
        GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::DIRECT_MESSAGES
            | GatewayIntents::MESSAGE_CONTENT
            | GatewayIntents::GUILD_MESSAGE_REACTIONS
    }
}

#[async_trait]
impl GatewayConnector for DiscordGateway {
    async fn connect(&self) -> Result<GatewaySession, DiscordError> {
        let mut client = Client::builder(&self.token, Self::intents())
            .event_handler(ForwardingHandler::new(self.forwarder.clone()))
            .await?;

        let shards = Arc::clone(&client.shard_manager);
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let (done_tx, done_rx) = oneshot::channel();

        tokio::spawn(async move {
            info!("Discord: gateway connecting");
            let result = tokio::select! {
                result = client.start() => result.map_err(DiscordError::from),
                _ = stop.cancelled() => {
                    shards.shutdown_all().await;
                    Ok(())
                }
            };
            let _ = done_tx.send(result);
        });

        Ok(GatewaySession::new(cancel, done_rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_token_is_rejected() {
        assert!(matches!(
            DiscordGateway::new("  ", "http://localhost:3000/api/webhooks/discord".to_string()),
            Err(DiscordError::NoToken)
        ));
    }

    #[test]
    fn intents_include_message_content_and_reactions() {
        let intents = DiscordGateway::intents();
        assert!(intents.contains(GatewayIntents::MESSAGE_CONTENT));
        assert!(intents.contains(GatewayIntents::GUILD_MESSAGE_REACTIONS));
    }
}
