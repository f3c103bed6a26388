//! Axum Router Configuration
//!
//! Defines the HTTP routing for the service: the dialogue WebSocket endpoint
//! and a liveness probe.

use crate::{handlers, state::AppState, ws::ws_handler};

use axum::{Router, routing::get};
use std::sync::Arc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(handlers::health))
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode},
    };
    use jarvis_core::DialogueConfig;
    use tower::ServiceExt;
    use tracing::Level;

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            config: Arc::new(Config {
                bind_address: "127.0.0.1:0".parse().unwrap(),
                openai_api_key: None,
                openai_api_base: "https://api.openai.com/v1".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
                log_level: Level::INFO,
                dialogue: DialogueConfig::default(),
            }),
            responder: None,
        })
    }

    #[tokio::test]
    async fn test_health_route() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ok");
    }

    #[tokio::test]
    async fn test_ws_route_requires_upgrade() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::get("/ws").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn test_unknown_route_is_not_found() {
        let app = create_router(test_state());

        let response = app
            .oneshot(Request::get("/sessions").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
