//! Discord webhook ingress: POST /api/webhooks/discord.
//!
//! Verification and dispatch live in `idealx_discord::webhook`; this handler
//! only lifts the relevant headers and the raw body out of the request and
//! returns the dispatcher's answer unchanged.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::app::AppState;
use idealx_discord::event::GATEWAY_TOKEN_HEADER;
use idealx_discord::WebhookRequest;

const SIGNATURE_HEADER: &str = "x-signature-ed25519";
const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

pub async fn discord_webhook_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let req = WebhookRequest {
        gateway_token: header(&headers, GATEWAY_TOKEN_HEADER),
        signature: header(&headers, SIGNATURE_HEADER),
        timestamp: header(&headers, TIMESTAMP_HEADER),
        body: body.to_vec(),
    };
    debug!(
        bytes = req.body.len(),
        forwarded = req.gateway_token.is_some(),
        "discord webhook arrived"
    );

    let resp = state.webhook.handle(req).await;
    let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(resp.body))
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}
