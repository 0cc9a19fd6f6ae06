//! HTTP gateway for kazpaGPT.
//!
//! Routes:
//! - `POST /api/chat`: one chat turn
//! - `GET /api/chat`: 405 with a JSON hint
//! - `GET /health`: liveness and version
//!
//! Built on Axum; CORS origins and the body size limit come from config.

pub mod chat;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method, header};
use axum::{Router, response::Json, routing::get};
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use kazpa_agent::ChatAssistant;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub assistant: Arc<ChatAssistant>,
}

impl GatewayState {
    pub fn new(assistant: Arc<ChatAssistant>) -> Self {
        Self { assistant }
    }
}

pub type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, gateway: &kazpa_config::GatewayConfig) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/chat",
            axum::routing::post(chat::chat_handler).get(chat::method_not_allowed),
        )
        .with_state(state)
        .layer(DefaultBodyLimit::max(gateway.max_body_bytes))
        .layer(cors_layer(&gateway.allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// CORS for the configured origins. `"*"` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(value) => Some(value),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(std::time::Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// A missing API key does not stop the server; chat requests report it.
pub async fn start(config: kazpa_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = kazpa_providers::build_from_config(&config)?;
    let assistant = Arc::new(ChatAssistant::from_config(&config, provider)?);

    // Build the first snapshot now so the first request does not pay for it.
    let snapshot = assistant.snapshot().await?;
    info!(
        knowledge_dir = %config.knowledge.dir.display(),
        files = snapshot.file_count,
        chunks = snapshot.chunks.len(),
        canon_files = snapshot.canon.loaded_files.len(),
        "Knowledge loaded"
    );

    let app = build_router(Arc::new(GatewayState::new(assistant)), &config.gateway);

    info!(addr = %addr, model = %config.model, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}
