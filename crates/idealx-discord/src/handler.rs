use serenity::all::ActivityData;
use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::channel::{Message, Reaction};
use serenity::model::gateway::Ready;
use serenity::model::user::OnlineStatus;
use serenity::prelude::{Context, EventHandler};
use tracing::{debug, info, warn};

use crate::event::{GatewayEvent, GATEWAY_TOKEN_HEADER};

const PRESENCE_ACTIVITY: &str = "Good Night";

/// POSTs gateway events to the local webhook endpoint.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    webhook_url: String,
    token: String,
}

impl Forwarder {
    pub fn new(webhook_url: String, token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
            token,
        }
    }

    pub fn webhook_url(&self) -> &str {
        &self.webhook_url
    }

    pub async fn forward<T: serde::Serialize + ?Sized>(&self, event: &T) -> Result<(), reqwest::Error> {
        self.client
            .post(&self.webhook_url)
            .header(GATEWAY_TOKEN_HEADER, &self.token)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Serenity event handler that turns every push event into a webhook call.
pub struct ForwardingHandler {
    forwarder: Forwarder,
}

impl ForwardingHandler {
    pub fn new(forwarder: Forwarder) -> Self {
        Self { forwarder }
    }

    async fn send(&self, event: GatewayEvent) {
        let kind = event.kind();
        match self.forwarder.forward(&event).await {
            Ok(()) => debug!(kind, "gateway event forwarded"),
            Err(e) => warn!(kind, error = %e, url = %self.forwarder.webhook_url(), "gateway event forward failed"),
        }
    }
}

#[async_trait]
impl EventHandler for ForwardingHandler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        ctx.set_presence(Some(ActivityData::playing(PRESENCE_ACTIVITY)), OnlineStatus::Idle);
        info!(name = %ready.user.name, id = %ready.user.id, "Discord bot connected");
    }

    async fn message(&self, _ctx: Context, msg: Message) {
        self.send(GatewayEvent::MessageCreate(Box::new(msg))).await;
    }

    async fn reaction_add(&self, _ctx: Context, reaction: Reaction) {
        self.send(GatewayEvent::MessageReactionAdd(Box::new(reaction))).await;
    }

    async fn interaction_create(&self, _ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command) = interaction {
            self.send(GatewayEvent::InteractionCreate(Box::new(command))).await;
        }
    }
}
