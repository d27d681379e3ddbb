//! ReAct agent service
//!
//! An HTTP service that answers questions with a language model, letting it
//! call a clock, a date converter and a calculator before it answers.
//! Conversations are kept in memory per `thread_id`.

mod api;
mod config;
mod llm;
mod rate_limit;
mod runtime;
mod settings;
mod state_machine;
mod store;
mod system_prompt;
mod tools;

use api::{create_router, AppState};
use config::AppConfig;
use llm::{GeminiService, LlmService, LoggingService};
use rate_limit::{RateLimiter, WINDOW};
use runtime::{AgentRuntime, LlmClient, RuntimeOptions, ServiceLlmClient};
use settings::{is_known_timezone, SessionSettings, DEFAULT_TIMEZONE};
use std::net::SocketAddr;
use std::sync::Arc;
use store::MemoryStore;
use tools::ToolRegistry;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "react_agent=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = AppConfig::from_env();

    let timezone = if is_known_timezone(&config.timezone) {
        config.timezone.clone()
    } else {
        tracing::warn!(
            timezone = %config.timezone,
            "Unrecognized timezone, falling back to {DEFAULT_TIMEZONE}"
        );
        DEFAULT_TIMEZONE.to_string()
    };
    let settings = Arc::new(SessionSettings::new(timezone));

    // Model client
    let api_key = config.llm.api_key.clone().unwrap_or_else(|| {
        tracing::warn!("No model API key configured. Set GOOGLE_API_KEY; chat requests will fail.");
        String::new()
    });
    let gemini: Arc<dyn LlmService> = Arc::new(GeminiService::new(
        api_key,
        &config.llm.model,
        config.llm.gateway.as_deref(),
        config.llm.timeout,
    ));
    let llm_client: Arc<dyn LlmClient> =
        Arc::new(ServiceLlmClient::new(Arc::new(LoggingService::new(gemini))));

    let tools = Arc::new(ToolRegistry::standard());
    let system_prompt = system_prompt::build_system_prompt(&tools);

    let runtime = AgentRuntime::new(
        Arc::new(MemoryStore::new()),
        llm_client,
        tools,
        settings.clone(),
        RuntimeOptions {
            system_prompt,
            max_tool_rounds: config.max_tool_rounds,
            llm_timeout: config.llm.timeout,
        },
    );
    tracing::info!(
        model = %runtime.model_id(),
        timezone = %settings.timezone(),
        rate_limit = config.rate_limit_per_minute,
        max_tool_rounds = config.max_tool_rounds,
        "Agent runtime initialized"
    );

    let state = AppState::new(
        Arc::new(runtime),
        Arc::new(RateLimiter::new(config.rate_limit_per_minute, WINDOW)),
        settings,
    );

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("ReAct agent listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
