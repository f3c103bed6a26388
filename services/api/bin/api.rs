//! Main Entrypoint for the JARVIS API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Building the live responder when an API key is configured.
//! 3. Constructing the Axum router and applying middleware.
//! 4. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use jarvis_api::{config::Config, router::create_router, state::AppState};
use jarvis_core::responder::{OpenAIResponder, Responder};
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to install Ctrl+C handler");
        return;
    }
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize the Responder ---
    let responder: Option<Arc<dyn Responder>> = match &config.openai_api_key {
        Some(api_key) => {
            info!(model = %config.chat_model, "Using live OpenAI responder.");
            let openai_config = OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(&config.openai_api_base);
            Some(Arc::new(OpenAIResponder::new(
                openai_config,
                config.chat_model.clone(),
            )))
        }
        None => {
            info!("No OPENAI_API_KEY set. Replies use the built-in templates.");
            None
        }
    };

    let app_state = Arc::new(AppState {
        config: Arc::new(config.clone()),
        responder,
    });

    // --- 4. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 5. Start Server ---
    info!(
        bind_address = %config.bind_address,
        busy_policy = ?config.dialogue.busy_policy,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
