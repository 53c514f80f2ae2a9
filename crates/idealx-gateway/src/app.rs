use axum::{routing::get, Router};
use std::sync::Arc;

use idealx_discord::WebhookDispatcher;

/// Shared state passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub webhook: WebhookDispatcher,
}

impl AppState {
    pub fn new(webhook: WebhookDispatcher) -> Self {
        Self { webhook }
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(crate::http::health::root_handler))
        .route(
            "/api/webhooks/discord",
            get(crate::http::health::webhook_probe_handler)
                .post(crate::http::webhooks::discord_webhook_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use ed25519_dalek::{Signer, SigningKey};
    use idealx_discord::webhook::{EventSink, InboundEvent};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    struct DropSink;

    #[async_trait]
    impl EventSink for DropSink {
        async fn deliver(&self, _event: InboundEvent) {}
    }

    fn signing_key() -> SigningKey {
        SigningKey::from_bytes(&[3u8; 32])
    }

    fn app() -> Router {
        let dispatcher = WebhookDispatcher::new(
            "bot-token".to_string(),
            Some(signing_key().verifying_key()),
            Arc::new(DropSink),
        );
        build_router(Arc::new(AppState::new(dispatcher)))
    }

    async fn body_text(resp: axum::response::Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn root_reports_liveness() {
        let resp = app()
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "IdealX Bot is running");
    }

    #[tokio::test]
    async fn webhook_path_answers_get() {
        let resp = app()
            .oneshot(Request::get("/api/webhooks/discord").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "Discord webhook endpoint active");
    }

    #[tokio::test]
    async fn signed_ping_gets_pong() {
        let body = r#"{"type":1,"id":"1","application_id":"2","token":"t","version":1}"#;
        let timestamp = "1700000000";
        let signature = signing_key().sign(format!("{timestamp}{body}").as_bytes());

        let req = Request::post("/api/webhooks/discord")
            .header("content-type", "application/json")
            .header("x-signature-ed25519", hex::encode(signature.to_bytes()))
            .header("x-signature-timestamp", timestamp)
            .body(Body::from(body))
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let value: Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(value, json!({"type": 1}));
    }

    #[tokio::test]
    async fn unsigned_post_is_unauthorized() {
        let req = Request::post("/api/webhooks/discord")
            .body(Body::from(r#"{"type":1}"#))
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forwarded_event_with_wrong_token_is_unauthorized() {
        let req = Request::post("/api/webhooks/discord")
            .header("x-discord-gateway-token", "nope")
            .body(Body::from("{}"))
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn forwarded_garbage_is_bad_request() {
        let req = Request::post("/api/webhooks/discord")
            .header("x-discord-gateway-token", "bot-token")
            .body(Body::from("not json"))
            .unwrap();
        let resp = app().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
