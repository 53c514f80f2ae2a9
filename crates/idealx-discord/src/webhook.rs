//! Webhook verification and dispatch.
//!
//! Two kinds of request reach `POST /api/webhooks/discord`:
//!
//! - events forwarded by our own gateway session, authenticated by the
//!   `x-discord-gateway-token` header;
//! - HTTP interactions sent by Discord, authenticated by an Ed25519
//!   signature over `timestamp || body`.
//!
//! Accepted events are handed to an [`EventSink`] on a spawned task; the
//! HTTP response never waits for the handler.

use std::sync::Arc;

use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde_json::{json, Value};
use serenity::model::application::{CommandInteraction, Interaction};
use serenity::model::channel::{Message, Reaction};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::DiscordError;
use crate::event::GatewayEvent;

/// An event accepted by the webhook.
#[derive(Debug, Clone)]
pub enum InboundEvent {
    Message(Box<Message>),
    Reaction(Box<Reaction>),
    /// `deferred` is true when the HTTP response already acknowledged it.
    Command {
        command: Box<CommandInteraction>,
        deferred: bool,
    },
}

impl From<GatewayEvent> for InboundEvent {
    fn from(event: GatewayEvent) -> Self {
        match event {
            GatewayEvent::MessageCreate(m) => InboundEvent::Message(m),
            GatewayEvent::MessageReactionAdd(r) => InboundEvent::Reaction(r),
            GatewayEvent::InteractionCreate(c) => InboundEvent::Command {
                command: c,
                deferred: false,
            },
        }
    }
}

/// Receives accepted events.
#[async_trait]
pub trait EventSink: Send + Sync + 'static {
    async fn deliver(&self, event: InboundEvent);
}

/// Transport-independent view of the inbound HTTP request.
#[derive(Debug, Clone, Default)]
pub struct WebhookRequest {
    pub gateway_token: Option<String>,
    pub signature: Option<String>,
    pub timestamp: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WebhookResponse {
    pub status: u16,
    pub body: Value,
}

impl WebhookResponse {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn from_error(err: &DiscordError) -> Self {
        let status = match err {
            DiscordError::Unauthorized(_) => 401,
            _ => 400,
        };
        Self {
            status,
            body: json!({"error": err.to_string()}),
        }
    }
}

/// Parse a hex-encoded Ed25519 application public key.
pub fn parse_public_key(hex_key: &str) -> Result<VerifyingKey, DiscordError> {
    let bytes = hex::decode(hex_key.trim())
        .map_err(|e| DiscordError::InvalidInput(format!("public key is not hex: {e}")))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| DiscordError::InvalidInput("public key must be 32 bytes".to_string()))?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|e| DiscordError::InvalidInput(format!("invalid public key: {e}")))
}

/// Check a Discord interaction signature.
pub fn verify_signature(
    key: &VerifyingKey,
    signature_hex: &str,
    timestamp: &str,
    body: &[u8],
) -> Result<(), DiscordError> {
    let sig_bytes = hex::decode(signature_hex)
        .map_err(|_| DiscordError::Unauthorized("signature is not valid hex".to_string()))?;
    let signature = Signature::from_slice(&sig_bytes)
        .map_err(|_| DiscordError::Unauthorized("malformed signature".to_string()))?;

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);

    key.verify(&message, &signature)
        .map_err(|_| DiscordError::Unauthorized("signature mismatch".to_string()))
}

/// Compare secrets without an early exit on the first differing byte.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes().zip(b.bytes()).fold(0, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub struct WebhookDispatcher {
    bot_token: String,
    public_key: Option<VerifyingKey>,
    sink: Arc<dyn EventSink>,
}

impl WebhookDispatcher {
    pub fn new(bot_token: String, public_key: Option<VerifyingKey>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            bot_token,
            public_key,
            sink,
        }
    }

    pub async fn handle(&self, req: WebhookRequest) -> WebhookResponse {
        let result = match req.gateway_token {
            Some(ref token) => self.accept_forwarded(token, &req.body),
            None => self.accept_interaction(&req),
        };
        match result {
            Ok(body) => WebhookResponse::ok(body),
            Err(e) => {
                warn!(error = %e, "webhook request rejected");
                WebhookResponse::from_error(&e)
            }
        }
    }

    fn accept_forwarded(&self, token: &str, body: &[u8]) -> Result<Value, DiscordError> {
        if self.bot_token.is_empty() || !constant_time_eq(token, &self.bot_token) {
            return Err(DiscordError::Unauthorized("gateway token mismatch".to_string()));
        }
        let event: GatewayEvent = serde_json::from_slice(body)
            .map_err(|e| DiscordError::InvalidPayload(e.to_string()))?;
        debug!(kind = event.kind(), "forwarded gateway event");
        self.spawn(event.into());
        Ok(json!({"ok": true}))
    }

    fn accept_interaction(&self, req: &WebhookRequest) -> Result<Value, DiscordError> {
        let key = self
            .public_key
            .as_ref()
            .ok_or_else(|| DiscordError::Unauthorized("no public key configured".to_string()))?;
        let signature = req
            .signature
            .as_deref()
            .ok_or_else(|| DiscordError::Unauthorized("missing X-Signature-Ed25519".to_string()))?;
        let timestamp = req
            .timestamp
            .as_deref()
            .ok_or_else(|| DiscordError::Unauthorized("missing X-Signature-Timestamp".to_string()))?;
        verify_signature(key, signature, timestamp, &req.body)?;

        let interaction: Interaction = serde_json::from_slice(&req.body)
            .map_err(|e| DiscordError::InvalidPayload(e.to_string()))?;
        match interaction {
            Interaction::Ping(_) => Ok(json!({"type": 1})),
            Interaction::Command(command) => {
                self.spawn(InboundEvent::Command {
                    command: Box::new(command),
                    deferred: true,
                });
                // deferred channel message with source
                Ok(json!({"type": 5}))
            }
            other => Err(DiscordError::InvalidPayload(format!(
                "unsupported interaction kind {:?}",
                other.kind()
            ))),
        }
    }

    fn spawn(&self, event: InboundEvent) {
        let sink = Arc::clone(&self.sink);
        let receipt = Uuid::new_v4();
        info!(%receipt, "event accepted");
        tokio::spawn(async move {
            sink.deliver(event).await;
            debug!(%receipt, "event handled");
        });
    }
}
