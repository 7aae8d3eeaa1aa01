//! # vantage_api
//!
//! HTTP API library for Vantage.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::extract::{Request, State};
use axum::http::{HeaderValue, Method, header};
use axum::middleware::{Next, from_fn_with_state, map_response};
use axum::routing::{get, patch, post};
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tracing::warn;
use vantage_core::activity::{ActivitySink, ActivityStore, MemoryActivityStore, PgActivityStore};
use vantage_core::auth::{
    AuthError, CredentialStore, MemoryCredentialStore, PgCredentialStore, TokenConfig,
    TokenService,
};

use crate::config::ApiConfig;
use crate::handlers::{activity, auth, health, users};
use crate::middleware::auth::{ADMIN_ONLY, ADMIN_OR_MANAGER, authenticate, authorize};

/// Shared application state passed to all handlers.
///
/// Nothing in here is mutated per request; auth state lives entirely in the
/// tokens the client presents.
#[derive(Clone)]
pub struct AppState {
    /// User identities and password hashes.
    pub store: Arc<dyn CredentialStore>,
    /// Activity log reads.
    pub activity_store: Arc<dyn ActivityStore>,
    /// Fire-and-forget activity writes.
    pub activity: ActivitySink,
    /// Token issuance and verification.
    pub tokens: Arc<TokenService>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    /// Build state from explicit stores. Must be called inside a tokio runtime
    /// (the activity sink spawns its writer task).
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn CredentialStore>,
        activity_store: Arc<dyn ActivityStore>,
    ) -> Result<Self, AuthError> {
        let tokens = TokenService::new(TokenConfig::new(
            config.access_secret.clone(),
            config.refresh_secret.clone(),
        ))?;
        Ok(Self {
            store,
            activity: ActivitySink::spawn(activity_store.clone()),
            activity_store,
            tokens: Arc::new(tokens),
            config,
        })
    }

    /// State backed by PostgreSQL.
    pub fn postgres(config: ApiConfig, pool: PgPool) -> Result<Self, AuthError> {
        Self::new(
            config,
            Arc::new(PgCredentialStore::new(pool.clone())),
            Arc::new(PgActivityStore::new(pool)),
        )
    }

    /// State backed by in-memory stores.
    pub fn in_memory(config: ApiConfig) -> Result<Self, AuthError> {
        Self::new(
            config,
            Arc::new(MemoryCredentialStore::new()),
            Arc::new(MemoryActivityStore::new()),
        )
    }
}

/// Run embedded database migrations.
///
/// Delegates to `vantage_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    vantage_core::migrate::migrate(pool).await
}

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);
    match HeaderValue::from_str(&config.cors_origin) {
        Ok(origin) => layer.allow_origin(origin),
        Err(e) => {
            warn!(origin = %config.cors_origin, "ignoring invalid CORS origin: {e}");
            layer
        }
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Public routes (no auth required)
    let public = Router::new()
        .route("/health", get(health::health_handler))
        .route("/auth/register", post(auth::register_handler))
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Any authenticated user
    let authenticated = Router::new()
        .route("/auth/me", get(auth::me_handler))
        .layer(from_fn_with_state(state.clone(), authenticate));

    // Admins and managers
    let management = Router::new()
        .route("/activity", get(activity::recent_activity_handler))
        .layer(from_fn_with_state(
            state.clone(),
            |s: State<AppState>, r: Request, n: Next| authorize(s, ADMIN_OR_MANAGER, r, n),
        ))
        .layer(from_fn_with_state(state.clone(), authenticate));

    // Admins only
    let admin = Router::new()
        .route("/users/{id}/status", patch(users::toggle_status_handler))
        .layer(from_fn_with_state(
            state.clone(),
            |s: State<AppState>, r: Request, n: Next| authorize(s, ADMIN_ONLY, r, n),
        ))
        .layer(from_fn_with_state(state.clone(), authenticate));

    let expose_detail = !state.config.env.is_production();
    let cors = cors_layer(&state.config);

    let app = Router::new()
        .merge(public)
        .merge(authenticated)
        .merge(management)
        .merge(admin);

    let app = if expose_detail {
        app.layer(map_response(error::expose_error_detail))
    } else {
        app
    };

    app.layer(cors).with_state(state)
}
