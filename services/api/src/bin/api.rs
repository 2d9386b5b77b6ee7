//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{DbAdapter, GeminiStoryAdapter, OpenAiStoryAdapter},
    config::{Config, PrimaryBackend},
    error::ApiError,
    web::{
        list_chapters_handler, mark_chapter_read_handler, next_chapter_handler, rest::ApiDoc,
        state::AppState, unlock_chapter_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{header::{ACCEPT, CONTENT_TYPE}, Method},
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use story_engine_core::{
    BackendRegistry, OrchestratorSettings, StoryBackend, StoryEngine, SystemClock,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Registers a backend for every configured API key and picks the primary.
fn build_registry(config: &Config) -> Result<BackendRegistry, ApiError> {
    let mut backends: Vec<(PrimaryBackend, Arc<dyn StoryBackend>)> = Vec::new();

    if let Some(api_key) = &config.openai_api_key {
        let client = Client::with_config(OpenAIConfig::new().with_api_key(api_key));
        backends.push((
            PrimaryBackend::OpenAi,
            Arc::new(OpenAiStoryAdapter::new(
                client,
                config.openai_models.clone(),
                config.backend_timeout,
            )),
        ));
    }
    if let Some(api_key) = &config.gemini_api_key {
        let adapter = GeminiStoryAdapter::new(
            config.gemini_base_url.clone(),
            api_key.clone(),
            config.gemini_models.clone(),
            config.gemini_api_versions.clone(),
            config.backend_timeout,
        )?;
        backends.push((PrimaryBackend::Gemini, Arc::new(adapter)));
    }

    if backends.is_empty() {
        warn!("No backend API keys configured; every chapter will use the curated fallback");
    }
    let default_index = backends
        .iter()
        .position(|(kind, _)| *kind == config.primary_backend)
        .unwrap_or(0);
    for (kind, backend) in &backends {
        info!(
            backend = backend.name(),
            primary = *kind == config.primary_backend,
            "Registered story backend"
        );
    }

    Ok(BackendRegistry::new(
        backends.into_iter().map(|(_, backend)| backend).collect(),
        default_index,
    ))
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Config::from_env()?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize the Story Engine ---
    let registry = build_registry(&config)?;
    let engine = Arc::new(StoryEngine::new(
        db_adapter.clone(),
        db_adapter,
        Arc::new(SystemClock::new(config.utc_offset)),
        registry,
        OrchestratorSettings {
            attempt_timeout: config.backend_timeout,
            backend_moderation: config.backend_moderation,
        },
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState { engine });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    let api_router = Router::new()
        .route("/children/{child_id}/chapters", get(list_chapters_handler))
        .route("/children/{child_id}/chapters/unlock", post(unlock_chapter_handler))
        .route("/children/{child_id}/chapters/next", post(next_chapter_handler))
        .route("/chapters/{chapter_id}/read", post(mark_chapter_read_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
