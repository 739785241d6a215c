//! HTTP server built on axum.
//!
//! Routes:
//! - `GET /health` (public)
//! - `POST /price-analysis` (public)
//! - `POST /ai/chat` and `POST /ai/chat/stream` (optional bearer token)

pub mod auth;
pub mod error;
pub mod handlers;
pub mod sse;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, ProvidersConfig, ServerConfig};
use crate::providers::ProviderRouter;
use crate::services::Assistant;
use auth::{auth_middleware, TokenVerifier};

/// Shared state for request handlers. Everything here is read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub assistant: Arc<Assistant>,
    pub providers: Arc<ProviderRouter>,
    pub provider_config: Arc<ProvidersConfig>,
    pub verifier: TokenVerifier,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(providers: Arc<ProviderRouter>, config: &AppConfig) -> Self {
        Self {
            assistant: Arc::new(Assistant::from_config(providers.clone(), config)),
            providers,
            provider_config: Arc::new(config.providers.clone()),
            verifier: TokenVerifier::new(&config.auth.secret_key, config.auth.algorithm),
            started_at: Instant::now(),
        }
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) if value != "*" => Some(value),
            _ => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true)
}

pub fn build_app(state: AppState, cors_origins: &[String]) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route("/price-analysis", post(handlers::post_price_analysis))
        .with_state(state.clone());

    let chat_routes = Router::new()
        .route("/ai/chat", post(handlers::post_chat))
        .route("/ai/chat/stream", post(handlers::post_chat_stream))
        .route_layer(axum_middleware::from_fn_with_state(
            state.verifier.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(chat_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
}

/// Bind and serve until Ctrl-C.
pub async fn start_server(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = build_app(state, &config.cors_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
