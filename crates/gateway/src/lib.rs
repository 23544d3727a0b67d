//! HTTP gateway for biochat.
//!
//! Exposes the chat widget's two endpoints (`/api/createEmbedding` and
//! `/api/findNearestMatch`), a single-call `/api/chat`, and `/health`.
//!
//! Built on Axum; CORS, body limits, and request tracing are tower layers.

pub mod api;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{debug, info, warn};

use biochat_agent::{ChatPipeline, SessionStore};
use biochat_config::{AppConfig, GatewayConfig};

/// Request and response header carrying the visitor's session id.
pub const SESSION_HEADER: &str = "x-session-id";

/// Shared application state for the gateway.
pub struct GatewayState {
    pub pipeline: Arc<ChatPipeline>,
}

pub type SharedState = Arc<GatewayState>;

/// Build the router with every route and layer.
pub fn build_router(state: SharedState, gateway: &GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(api::health_handler))
        .route("/api/createEmbedding", post(api::create_embedding_handler))
        .route("/api/findNearestMatch", post(api::find_nearest_match_handler))
        .route("/api/chat", post(api::chat_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.body_limit_bytes))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS restricted to the configured origins. An empty list allows none.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparseable allowed origin");
                None
            }
        })
        .collect();

    let session = HeaderName::from_static(SESSION_HEADER);
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, session.clone()])
        .expose_headers([session])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// Refuses to start without the generation credential and the configured
/// index backend's settings.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate_for_serving()?;

    let provider = biochat_providers::build_from_config(&config)?;
    let index = biochat_index::build_from_config(&config)?;
    let pipeline = Arc::new(ChatPipeline::from_config(&config, provider, index)?);

    spawn_session_sweeper(pipeline.sessions().clone());

    let state = Arc::new(GatewayState {
        pipeline: pipeline.clone(),
    });
    let app = build_router(state, &config.gateway);

    let addr = config.bind_addr();
    info!(
        addr = %addr,
        model = %config.generation.model,
        index = %pipeline.index_name(),
        persona = %pipeline.persona().version,
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Gateway stopped");
    Ok(())
}

/// Periodically drop sessions idle past the TTL.
fn spawn_session_sweeper(sessions: Arc<SessionStore>) {
    let period = (sessions.idle_ttl() / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = sessions.evict_expired().await;
            if evicted > 0 {
                debug!(evicted, "Session sweep");
            }
        }
    });
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
