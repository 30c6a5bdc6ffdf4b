use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::extract::{Path, Query, State};
use axum::http::header::{HeaderName, AUTHORIZATION};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::{Deserialize, Serialize};

use crate::engine::{EngineHandle, ShotSnapshot};
use crate::error::{EngineError, ErrorCode};

use super::sse;

/// Shared application state for HTTP handlers.
#[derive(Clone)]
pub struct DebugHttpState {
    pub handle: Arc<EngineHandle>,
    token: Arc<String>,
}

impl DebugHttpState {
    pub fn new(handle: Arc<EngineHandle>, token: String) -> Self {
        Self {
            handle,
            token: Arc::new(token),
        }
    }

    fn authorize(
        &self,
        headers: &HeaderMap,
        query_token: Option<&str>,
    ) -> Result<(), HttpServerError> {
        let provided = extract_token(headers, query_token);
        match provided {
            Some(value) if value == *self.token => Ok(()),
            _ => Err(HttpServerError::Unauthorized),
        }
    }
}

/// Query payload for extracting token from URL.
#[derive(Debug, Default, Deserialize)]
pub struct AuthQuery {
    pub token: Option<String>,
}

/// HTTP error variants mapped to JSON responses.
#[derive(Debug)]
pub enum HttpServerError {
    Unauthorized,
    BadRequest(&'static str),
    NotFound(String),
    Engine(EngineError),
}

impl From<EngineError> for HttpServerError {
    fn from(err: EngineError) -> Self {
        Self::Engine(err)
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "missing or invalid token".into()),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.to_string()),
            Self::NotFound(what) => (StatusCode::NOT_FOUND, format!("unknown {}", what)),
            Self::Engine(err) => (StatusCode::SERVICE_UNAVAILABLE, err.message()),
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

/// Health endpoint response payload.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine_running: bool,
    pub sensor_subscribed: bool,
    pub debug_mode: bool,
}

/// Parameter update request; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamPatch {
    #[serde(default)]
    pub sensitivity_level: Option<i32>,
    #[serde(default)]
    pub hysteresis: Option<u32>,
    #[serde(default)]
    pub pre_infusion_delay_ms: Option<u64>,
    #[serde(default)]
    pub debug_mode: Option<bool>,
}

impl ParamPatch {
    fn is_empty(&self) -> bool {
        self.sensitivity_level.is_none()
            && self.hysteresis.is_none()
            && self.pre_infusion_delay_ms.is_none()
            && self.debug_mode.is_none()
    }
}

/// Current detection parameters.
#[derive(Debug, Serialize)]
pub struct ParamDescriptor {
    pub supported: &'static [&'static str],
    pub baseline: f64,
    pub threshold: f64,
    pub sensitivity_level: i32,
    pub hysteresis: u32,
    pub pre_infusion_delay_ms: u64,
}

/// Command acknowledgement payload.
#[derive(Debug, Serialize)]
pub struct CommandAck {
    pub accepted: bool,
}

/// Build the Axum router with all handlers.
pub fn build_router(state: DebugHttpState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/snapshot", get(snapshot))
        .route("/events", get(events_stream_handler))
        .route("/params", get(list_params).post(apply_params))
        .route("/timer/:action", post(timer_action))
        .with_state(state)
}

/// Run the HTTP server loop.
pub async fn run_http_server(state: DebugHttpState, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("binding debug HTTP listener")?;
    let router = build_router(state);
    axum::serve(listener, router)
        .await
        .context("serving debug HTTP router")?;
    Ok(())
}

pub async fn health(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<HealthResponse>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    Ok(Json(HealthResponse {
        status: "ok",
        engine_running: state.handle.is_running(),
        sensor_subscribed: state.handle.snapshot().subscribed,
        debug_mode: state.handle.logger().is_enabled(),
    }))
}

pub async fn snapshot(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<ShotSnapshot>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(Json(state.handle.snapshot()))
}

pub async fn events_stream_handler(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<sse::SessionEventStream, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;
    Ok(sse::session_events(&state.handle))
}

pub async fn list_params(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<ParamDescriptor>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let snapshot = state.handle.snapshot();
    Ok(Json(ParamDescriptor {
        supported: &[
            "sensitivity_level",
            "hysteresis",
            "pre_infusion_delay_ms",
            "debug_mode",
        ],
        baseline: snapshot.baseline,
        threshold: snapshot.threshold,
        sensitivity_level: snapshot.sensitivity_level,
        hysteresis: snapshot.hysteresis_level,
        pre_infusion_delay_ms: snapshot.pre_infusion_delay_ms,
    }))
}

pub async fn apply_params(
    State(state): State<DebugHttpState>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
    Json(patch): Json<ParamPatch>,
) -> Result<Json<CommandAck>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    if patch.is_empty() {
        return Err(HttpServerError::BadRequest(
            "at least one parameter must be provided",
        ));
    }

    let handle = &state.handle;
    if let Some(level) = patch.sensitivity_level {
        handle.set_sensitivity_level(level)?;
    }
    if let Some(percent) = patch.hysteresis {
        handle.set_hysteresis(percent)?;
    }
    if let Some(delay_ms) = patch.pre_infusion_delay_ms {
        handle.set_pre_infusion_delay(delay_ms)?;
    }
    if let Some(enabled) = patch.debug_mode {
        handle.set_debug_mode(enabled)?;
    }

    Ok(Json(CommandAck { accepted: true }))
}

pub async fn timer_action(
    State(state): State<DebugHttpState>,
    Path(action): Path<String>,
    Query(query): Query<AuthQuery>,
    headers: HeaderMap,
) -> Result<Json<CommandAck>, HttpServerError> {
    state.authorize(&headers, query.token.as_deref())?;

    let handle = &state.handle;
    match action.as_str() {
        "start" => handle.start_timer()?,
        "stop" => handle.stop_timer()?,
        "reset" => handle.reset_timer()?,
        "calibrate" => handle.calibrate()?,
        "cancel-calibration" => handle.cancel_calibration()?,
        other => return Err(HttpServerError::NotFound(format!("timer action '{}'", other))),
    }

    Ok(Json(CommandAck { accepted: true }))
}

fn extract_token(headers: &HeaderMap, query_token: Option<&str>) -> Option<String> {
    if let Some(token) = query_token {
        return Some(token.to_string());
    }

    static X_DEBUG_TOKEN: HeaderName = HeaderName::from_static("x-debug-token");

    headers
        .get(&X_DEBUG_TOKEN)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string())
        .or_else(|| {
            headers
                .get(AUTHORIZATION)
                .and_then(|value| value.to_str().ok())
                .and_then(|raw| raw.strip_prefix("Bearer ").map(|v| v.to_string()))
        })
}
