/// GET /: liveness text.
pub async fn root_handler() -> &'static str {
    "IdealX Bot is running"
}

/// GET /api/webhooks/discord: liveness text for the webhook path.
pub async fn webhook_probe_handler() -> &'static str {
    "Discord webhook endpoint active"
}
