//! HTTP server for receiving pose frames from a capture front-end.
//!
//! This module provides an HTTP server that:
//! - Starts and stops recording sessions
//! - Accepts pose frames via POST /frames and feeds them to the orchestrator
//! - Exposes the published analysis state for polling
//!
//! # Architecture
//!
//! ```text
//! Pose estimator ──→ POST /frames ──→ form-agent ──→ reasoning service
//!                                         ↓
//!                                    GET /state
//! ```

use crate::analysis::{
    AnalysisOrchestrator, AnalysisResult, LiveTrigger, PublishedState, ReasoningService,
};
use crate::config::{AnalysisConfig, Config};
use crate::core::StabilityStatus;
use crate::pose::RawFrame;
use crate::transparency::{create_shared_log, SharedTransparencyLog};
use axum::{
    extract::State,
    http::HeaderValue,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use uuid::Uuid;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind to (0 for random)
    pub port: u16,
    /// Pipeline tunables
    pub analysis: AnalysisConfig,
    /// Activity log shared with the caller
    pub log: SharedTransparencyLog,
}

impl ServerConfig {
    /// Create a new server configuration
    pub fn new(port: u16, analysis: AnalysisConfig) -> Self {
        Self {
            port,
            analysis,
            log: create_shared_log(),
        }
    }

    /// Build from the persisted agent configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.server_port, config.analysis.clone())
    }

    pub fn with_log(mut self, log: SharedTransparencyLog) -> Self {
        self.log = log;
        self
    }
}

/// Shared server state
pub struct ServerState {
    orchestrator: Mutex<AnalysisOrchestrator>,
}

impl ServerState {
    /// Create new server state
    pub fn new(config: &ServerConfig, reasoning: Arc<dyn ReasoningService>) -> Self {
        Self {
            orchestrator: Mutex::new(AnalysisOrchestrator::with_log(
                config.analysis.clone(),
                reasoning,
                config.log.clone(),
            )),
        }
    }
}

/// One frame or a batch of frames
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FramesPayload {
    Batch { frames: Vec<RawFrame> },
    Single(RawFrame),
}

impl FramesPayload {
    fn into_frames(self) -> Vec<RawFrame> {
        match self {
            FramesPayload::Batch { frames } => frames,
            FramesPayload::Single(frame) => vec![frame],
        }
    }
}

/// Response from the frames endpoint
#[derive(Debug, Clone, Serialize)]
pub struct FramesResponse {
    pub accepted: usize,
    pub buffered: usize,
    pub live_started: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<StabilityStatus>,
    pub frames_in_session: usize,
}

/// Body of the stop endpoint
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StopRequest {
    #[serde(default)]
    pub exercise: String,
}

#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// GET /health
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /session/start
async fn start_session(State(state): State<Arc<ServerState>>) -> Json<SessionResponse> {
    let session_id = state.orchestrator.lock().await.start_new_session();
    Json(SessionResponse { session_id })
}

/// POST /frames
async fn ingest_frames(
    State(state): State<Arc<ServerState>>,
    Json(payload): Json<FramesPayload>,
) -> Json<FramesResponse> {
    let frames = payload.into_frames();
    let mut orchestrator = state.orchestrator.lock().await;

    let mut response = FramesResponse {
        accepted: frames.len(),
        buffered: 0,
        live_started: 0,
        status: None,
        frames_in_session: 0,
    };

    for frame in frames {
        let outcome = orchestrator.on_frame(&frame.joints, frame.timestamp);
        if outcome.buffered {
            response.buffered += 1;
        }
        if outcome.live == LiveTrigger::Started {
            response.live_started += 1;
        }
        response.status = Some(outcome.status);
    }
    response.frames_in_session = orchestrator.buffer().session_len();

    Json(response)
}

/// POST /session/stop
///
/// Runs the full analysis and returns its result. The orchestrator lock is
/// released before waiting so frames and state polls keep flowing.
async fn stop_session(
    State(state): State<Arc<ServerState>>,
    request: Option<Json<StopRequest>>,
) -> Json<AnalysisResult> {
    let exercise = request
        .map(|Json(request)| request.exercise)
        .unwrap_or_default();
    let handle = state
        .orchestrator
        .lock()
        .await
        .stop_session_and_analyze(&exercise);

    match handle.await {
        Ok(result) => Json(result),
        Err(e) => {
            tracing::error!("Full analysis task failed: {}", e);
            Json(AnalysisResult::interrupted(&e.to_string()))
        }
    }
}

/// GET /state
async fn published_state(State(state): State<Arc<ServerState>>) -> Json<PublishedState> {
    Json(state.orchestrator.lock().await.published())
}

/// Build the router
pub fn router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session/start", post(start_session))
        .route("/frames", post(ingest_frames))
        .route("/session/stop", post(stop_session))
        .route("/state", get(published_state))
        .layer(
            CorsLayer::new()
                .allow_origin([
                    HeaderValue::from_static("http://localhost"),
                    HeaderValue::from_static("http://127.0.0.1"),
                    // Allow chrome-extension origins
                    HeaderValue::from_static("chrome-extension://"),
                ])
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Run the HTTP server
pub async fn run(
    config: ServerConfig,
    reasoning: Arc<dyn ReasoningService>,
) -> anyhow::Result<(SocketAddr, tokio::sync::oneshot::Sender<()>)> {
    let state = Arc::new(ServerState::new(&config, reasoning));
    let app = router(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));
    let listener = TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    tracing::info!("Form agent server listening on http://{}", actual_addr);

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                tracing::info!("Server shutdown signal received");
            })
            .await
        {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok((actual_addr, shutdown_tx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames_payload_shapes() {
        let single: FramesPayload = serde_json::from_str(
            r#"{"timestamp": 1.0, "joints": {"leftWrist": {"x": 0.1, "y": 0.2, "confidence": 0.9}}}"#,
        )
        .unwrap();
        assert_eq!(single.into_frames().len(), 1);

        let batch: FramesPayload = serde_json::from_str(
            r#"{"frames": [{"timestamp": 1.0, "joints": {}}, {"timestamp": 1.1}]}"#,
        )
        .unwrap();
        let frames = batch.into_frames();
        assert_eq!(frames.len(), 2);
        assert!(frames[1].joints.is_empty());
    }
}
