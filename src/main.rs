//! Coupon Board Backend
//!
//! Community coupon sharing: submitted codes are verified with the game vendor,
//! stored in SQLite, and ranked by visitor votes.

mod api;
mod auth;
mod config;
mod db;
mod errors;
mod models;
mod service;
mod validation;
mod verifier;
mod votes;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use tokio::time::MissedTickBehavior;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use config::Config;
use db::Repository;
use service::{CouponService, ServiceSettings};
use verifier::HiveVerifier;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<CouponService>,
    pub config: Arc<Config>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Coupon Board Backend");
    tracing::info!("Database path: {:?}", config.db_path);
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.admin_psk.is_none() {
        tracing::warn!("No admin key configured (COUPONS_ADMIN_PSK). Admin routes are open!");
    }
    if !config.require_verification {
        tracing::warn!("Vendor verification is disabled; submitted codes are stored unchecked");
    }

    // Initialize database
    let pool = db::init_database(&config.db_path).await?;
    let repo = Repository::new(pool);

    let client = reqwest::Client::builder().build()?;
    let verifier = Arc::new(HiveVerifier::new(client, &config));

    let service = Arc::new(CouponService::new(
        repo,
        verifier,
        ServiceSettings::from(&config),
    ));

    if let Some(every) = config.expiry_sweep_interval {
        tracing::info!("Expiry sweep runs every {:?}", every);
        spawn_expiry_sweep(service.clone(), every);
    }

    let state = AppState {
        service,
        config: Arc::new(config.clone()),
    };

    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin_key = state.config.admin_psk.clone();

    // Each coupon route answers its own method, OPTIONS, and a JSON 405 for the rest.
    let coupon_routes = Router::new()
        .route(
            "/add-coupon",
            post(api::add_coupon)
                .options(api::preflight)
                .fallback(api::method_not_allowed),
        )
        .route(
            "/get-coupons",
            get(api::get_coupons)
                .options(api::preflight)
                .fallback(api::method_not_allowed),
        )
        .route(
            "/vote-coupon",
            put(api::vote_coupon)
                .options(api::preflight)
                .fallback(api::method_not_allowed),
        );

    let admin_routes = Router::new()
        .route("/expire-coupons", post(api::expire_coupons))
        .layer(middleware::from_fn(move |req, next| {
            auth::admin_auth_layer(admin_key.clone(), req, next)
        }));

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    Router::new()
        .merge(coupon_routes.clone())
        .nest("/.netlify/functions", coupon_routes)
        .nest("/admin", admin_routes)
        .merge(health_routes)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Run the expiry sweep on a fixed period for the life of the process.
fn spawn_expiry_sweep(service: Arc<CouponService>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = service.expire_stale(false).await {
                tracing::error!("Scheduled expiry sweep failed: {}", e);
            }
        }
    });
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
