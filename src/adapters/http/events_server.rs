//! Events HTTP listener.
//!
//! Feeds inbound events to the trigger engine of a running process:
//! `POST /events/{source}` with a JSON object body evaluates the event and
//! returns one history entry per firing.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::domain::models::{ServerConfig, TriggerEvent, TriggerHistoryEntry};
use crate::services::TriggerEngine;

/// Bind address of the listener.
#[derive(Debug, Clone)]
pub struct EventsHttpConfig {
    pub host: String,
    pub port: u16,
}

impl Default for EventsHttpConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for EventsHttpConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EmitResponse {
    pub source: String,
    pub fired: Vec<TriggerHistoryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub engine_running: bool,
    pub triggers: usize,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, code: &str, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.to_string(),
        }),
    )
}

pub struct EventsHttpServer {
    engine: Arc<TriggerEngine>,
    config: EventsHttpConfig,
}

impl EventsHttpServer {
    pub fn new(engine: Arc<TriggerEngine>, config: EventsHttpConfig) -> Self {
        Self { engine, config }
    }

    fn build_router(&self) -> Router {
        Router::new()
            .route("/events/{source}", post(emit_event))
            .route("/health", get(health_check))
            .with_state(self.engine.clone())
            .layer(TraceLayer::new_for_http())
    }

    /// Bind the configured address. Port 0 picks a free port.
    pub async fn bind(&self) -> std::io::Result<TcpListener> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        TcpListener::bind(addr).await
    }

    /// Serve on `listener` until `shutdown` resolves. In-flight requests finish first.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> std::io::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(%addr, "event listener accepting requests");
        }
        axum::serve(listener, router).with_graceful_shutdown(shutdown).await
    }
}

async fn emit_event(
    State(engine): State<Arc<TriggerEngine>>,
    Path(source): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<EmitResponse>, ApiError> {
    let source = source.trim().to_string();
    if source.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "invalid_source", "Event source cannot be empty"));
    }
    let Value::Object(fields) = body else {
        return Err(api_error(StatusCode::BAD_REQUEST, "invalid_body", "Event body must be a JSON object"));
    };
    if !engine.is_running() {
        return Err(api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "engine_stopped",
            "Trigger engine is not running",
        ));
    }

    let mut event = TriggerEvent::new(source.clone());
    event.fields = fields;
    let fired = engine.evaluate_event(&event).await;
    tracing::info!(source = %source, fired = fired.len(), "event received over HTTP");

    Ok(Json(EmitResponse { source, fired }))
}

async fn health_check(State(engine): State<Arc<TriggerEngine>>) -> Json<HealthResponse> {
    let engine_running = engine.is_running();
    Json(HealthResponse {
        status: if engine_running { "ok" } else { "stopped" }.to_string(),
        engine_running,
        triggers: engine.list_triggers(None).await.len(),
    })
}
