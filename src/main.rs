//! Mira site backend
//!
//! A small REST backend serving bilingual site content from flat JSON
//! files, with admin mutations authenticated by SSH signatures
//! (`ssh-keygen -Y sign/verify` against an allowed-signers registry).

mod api;
mod auth;
mod config;
mod errors;
mod models;
mod sanitize;
mod store;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::{SignatureVerifier, SshKeygenVerifier};
use config::Config;
use store::Store;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub verifier: Arc<dyn SignatureVerifier>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging first so configuration warnings (directory
    // fallbacks and the like) are not silently dropped
    dotenvy::dotenv().ok();
    let log_level = std::env::var("MIRA_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env();

    tracing::info!("Starting Mira site backend");
    tracing::info!("Admin root: {:?}", config.admin_root);
    tracing::info!("Data directory: {:?}", config.data_dir);
    tracing::info!("Keys directory: {:?}", config.keys_dir);
    tracing::info!("Allowed signers: {:?}", config.allowed_signers);
    tracing::info!("Bind address: {}", config.bind_addr);

    if !config.allowed_signers.is_file() {
        tracing::warn!(
            "No allowed-signers file at {:?}. Admin mutations will be rejected until one exists.",
            config.allowed_signers
        );
    }

    // Initialize the flat-file store and pull in any newer seed content
    let store = Arc::new(Store::new(config.data_dir.clone()));
    if let Some(seed_dir) = &config.seed_data_dir {
        store.sync_seed_data(seed_dir);
    }

    let verifier: Arc<dyn SignatureVerifier> = Arc::new(SshKeygenVerifier::new(
        config.allowed_signers.clone(),
        config.ssh_namespace.clone(),
    ));

    // Create application state
    let state = AppState {
        store,
        verifier,
        config: Arc::new(config.clone()),
    };

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let max_body_bytes = state.config.max_body_bytes;

    // API routes: every content type goes through the same dynamic pair
    let api_routes = Router::new()
        .route(
            "/api/{resource}",
            get(api::fetch_resource)
                .post(api::submit_resource)
                .put(api::merge_resource)
                .delete(api::remove_resource),
        )
        .route(
            "/api/{resource}/{id}",
            get(api::fetch_item)
                .post(api::submit_item)
                .put(api::update_item)
                .delete(api::remove_item),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(api_routes)
        .merge(health_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}
