//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{GeminiAdapter, VolcEngineAdapter},
    config::{Config, Provider},
    error::ApiError,
    web::{chat_handler, rest::ApiDoc, state::AppState, summary_handler},
};
use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        Method,
    },
    routing::post,
    Router,
};
use sparklog_core::ports::{ChatService, SummaryService};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");
    if config.dev_mode {
        info!("Development mode: the chat route will answer with mock replies");
    }

    // --- 2. Initialize the Provider Adapters ---
    let (chat, summary): (Arc<dyn ChatService>, Arc<dyn SummaryService>) = match config.provider {
        Provider::Gemini => {
            info!("Using the Gemini provider (model {})", config.gemini_model);
            let adapter = Arc::new(GeminiAdapter::new(
                reqwest::Client::new(),
                config.gemini_api_key.clone(),
                config.gemini_model.clone(),
            ));
            (adapter.clone(), adapter)
        }
        Provider::VolcEngine => {
            info!(
                "Using the VolcEngine provider (model {}, endpoint {})",
                config.volcengine_model, config.volcengine_api_endpoint
            );
            let adapter = Arc::new(VolcEngineAdapter::new(
                config.volcengine_api_key.clone(),
                config.volcengine_api_endpoint.clone(),
                config.volcengine_model.clone(),
            ));
            (adapter.clone(), adapter)
        }
    };

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        config: config.clone(),
        chat,
        summary,
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    let api_router = Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/summary", post(summary_handler))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
