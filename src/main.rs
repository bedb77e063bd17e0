//! Event Check-In Backend
//!
//! Validates scanned participant ids against the loaded roster, records
//! timestamped check-ins in SQLite and reports per-mode daily counts.

mod api;
mod auth;
mod config;
mod coordinator;
mod db;
mod errors;
mod export;
mod models;
mod roster;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use coordinator::{CheckInCoordinator, CheckInPolicy};
use db::Repository;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<Repository>,
    pub coordinator: Arc<CheckInCoordinator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(repo: Arc<Repository>, config: Config) -> Self {
        let coordinator = Arc::new(CheckInCoordinator::new(
            repo.clone(),
            CheckInPolicy::from(&config),
        ));
        Self {
            repo,
            coordinator,
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Event Check-In Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);
    tracing::info!(
        utc_offset_seconds = config.event_offset.local_minus_utc(),
        daily_reset = ?config.daily_reset,
        duplicate_policy = ?config.duplicate_policy,
        demo_export = ?config.demo_export,
        "Check-in policy"
    );

    if config.api_psk.is_none() {
        tracing::warn!("No API PSK configured (CHECKIN_API_PSK). Authentication is disabled!");
    }
    if config.admin_password.is_none() {
        tracing::warn!(
            "No admin password configured (CHECKIN_ADMIN_PASSWORD). Mode switches are not re-authorized!"
        );
    }

    let pool = db::init_database(&config.db_path).await?;
    let repo = Arc::new(Repository::new(pool));

    // The mode partition always starts from the configured default
    repo.set_mode(config.default_mode).await?;
    tracing::info!("Starting in {} mode", config.default_mode.as_str());

    let total_people = repo.count_participants().await?;
    tracing::info!("Roster loaded with {} participants", total_people);

    let bind_addr = config.bind_addr;
    let state = AppState::new(repo, config);

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let psk = state.config.api_psk.clone();

    let api_routes = Router::new()
        // Check-in
        .route("/check-in", post(api::check_in))
        // Roster
        .route("/participants", get(api::list_participants))
        .route("/participants/{id}", get(api::get_participant))
        .route("/upload-roster", post(api::upload_roster))
        .route("/clear-roster", post(api::clear_roster))
        .route("/total-people", get(api::total_people))
        .route("/current-activity", get(api::current_activity))
        // Export
        .route("/export-checkins", get(api::export_check_ins))
        // Mode
        .route("/mode", get(api::get_mode))
        .route("/set-mode", post(api::set_mode))
        // Daily counter
        .route("/daily-check-in-count", get(api::daily_check_in_count))
        .route(
            "/reset-daily-check-in-count",
            post(api::reset_daily_check_in_count),
        )
        .layer(middleware::from_fn(move |req, next| {
            auth::psk_auth_layer(psk.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
