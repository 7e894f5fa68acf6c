// src/api/mod.rs — HTTP gateway: document extraction, token minting, login proxy

pub mod auth;
pub mod handlers;
pub mod types;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;

use crate::auth::client::AuthClient;
use crate::infra::config::Config;
use crate::knowledge::extractor::{DocumentExtractor, ServiceExtractor};
use crate::provider::heygen::HeygenAccount;

/// Uploads larger than this are rejected before reaching a handler.
const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub extractor: Arc<dyn DocumentExtractor>,
    /// `None` when no provider API key is configured.
    pub account: Option<Arc<HeygenAccount>>,
    pub auth: Arc<AuthClient>,
    pub token_max_age_secs: i64,
}

impl ApiState {
    pub fn from_config(config: &Config) -> Self {
        let account = HeygenAccount::from_config(&config.provider).map(Arc::new);
        if account.is_none() {
            tracing::warn!("No provider API key configured; token and avatar routes will fail");
        }
        Self {
            extractor: Arc::new(ServiceExtractor::new(config.documents.clone())),
            account,
            auth: Arc::new(AuthClient::new(config.auth.clone())),
            token_max_age_secs: config.auth.token_max_age().num_seconds(),
        }
    }
}

/// Build the axum router with all routes.
pub fn build_router(state: ApiState, static_dir: Option<PathBuf>, cors_origins: &[String]) -> Router {
    let origins: Vec<HeaderValue> = cors_origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", o);
                None
            }
        })
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any);

    let router = Router::new()
        .route(
            "/api/process-document",
            post(handlers::process_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/get-access-token", post(handlers::get_access_token))
        .route("/api/avatars", get(handlers::list_avatars))
        .route("/api/login", post(handlers::login))
        .route("/api/logout", post(handlers::logout))
        .route("/api/health", get(handlers::health));

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router.fallback(handlers::not_found),
    };

    router
        .layer(middleware::from_fn(auth::require_auth))
        .layer(cors)
        .with_state(state)
}

/// Start the gateway (blocks until Ctrl-C).
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let state = ApiState::from_config(config);
    let static_dir = config.gateway.static_dir.as_ref().map(PathBuf::from);
    let router = build_router(state, static_dir, &config.gateway.cors_origins);

    let addr = &config.gateway.bind;
    tracing::info!("Gateway listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down gateway");
        })
        .await?;
    Ok(())
}
