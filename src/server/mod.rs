//! Operator control surface (axum).
//!
//! Baseline list/mark/select, active alerts, engine status, model reload.
//! These operate on the same managers the stream sessions use; baseline
//! mutations push control events onto the session's outbound stream.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::constants::APP_VERSION;
use crate::error::CoreError;
use crate::logic::events::{BaselineSummary, OutboundEvent};
use crate::logic::model::ModelManager;
use crate::logic::session::SessionContext;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.as_str()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.as_str()),
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg.as_str())
            }
        };
        let body = Json(json!({
            "error": message,
            "status": status.as_u16(),
        }));
        (status, body).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::BaselineNotFound(_) => ApiError::NotFound(err.to_string()),
            CoreError::Artifact(_) | CoreError::FeatureSchemaMismatch { .. } => {
                ApiError::Conflict(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelManager>,
    pub sessions: Arc<HashMap<String, Arc<SessionContext>>>,
}

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/status", get(status))
        .route("/api/v1/model/reload", post(reload_model))
        .route("/api/v1/structures/:structure/baselines", get(list_baselines))
        .route("/api/v1/structures/:structure/baselines", post(mark_baseline))
        .route(
            "/api/v1/structures/:structure/baselines/:id/select",
            put(select_baseline),
        )
        .route("/api/v1/structures/:structure/alerts", get(list_alerts))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": APP_VERSION }))
}

#[derive(Serialize)]
struct SessionStatus {
    structure_id: String,
    halted: bool,
    active_baseline_id: Option<Uuid>,
    baseline_count: usize,
}

async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut sessions: Vec<SessionStatus> = state
        .sessions
        .values()
        .map(|ctx| SessionStatus {
            structure_id: ctx.structure_id.clone(),
            halted: ctx.is_halted(),
            active_baseline_id: ctx.baselines.active().map(|b| b.id),
            baseline_count: ctx.baselines.list().len(),
        })
        .collect();
    sessions.sort_by(|a, b| a.structure_id.cmp(&b.structure_id));

    Json(json!({
        "engine": state.model.status(),
        "sessions": sessions,
    }))
}

async fn reload_model(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let version = state.model.reload()?;
    Ok(Json(json!({ "reloaded": true, "version": version })))
}

fn session_of(state: &AppState, structure: &str) -> ApiResult<Arc<SessionContext>> {
    state
        .sessions
        .get(structure)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("unknown structure: {}", structure)))
}

async fn list_baselines(
    State(state): State<AppState>,
    Path(structure): Path<String>,
) -> ApiResult<Json<Vec<BaselineSummary>>> {
    let ctx = session_of(&state, &structure)?;
    let baselines = ctx
        .baselines
        .list()
        .iter()
        .map(|b| BaselineSummary::from(b.as_ref()))
        .collect();
    Ok(Json(baselines))
}

#[derive(Debug, Deserialize)]
pub struct MarkBaselineRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

async fn mark_baseline(
    State(state): State<AppState>,
    Path(structure): Path<String>,
    Json(req): Json<MarkBaselineRequest>,
) -> ApiResult<Json<BaselineSummary>> {
    let ctx = session_of(&state, &structure)?;
    let window = ctx
        .last_window
        .read()
        .clone()
        .ok_or_else(|| ApiError::Conflict("no completed window available to mark".into()))?;

    let baseline = ctx.baselines.mark(&req.name, &req.description, &window);
    ctx.notify(OutboundEvent::BaselineMarked {
        baseline_id: baseline.id,
        name: baseline.name.clone(),
    });
    Ok(Json(BaselineSummary::from(baseline.as_ref())))
}

async fn select_baseline(
    State(state): State<AppState>,
    Path((structure, id)): Path<(String, Uuid)>,
) -> ApiResult<Json<serde_json::Value>> {
    let ctx = session_of(&state, &structure)?;
    ctx.baselines.select(id)?;
    ctx.notify(OutboundEvent::BaselineSelected { baseline_id: id });
    Ok(Json(json!({ "selected": id })))
}

async fn list_alerts(
    State(state): State<AppState>,
    Path(structure): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let ctx = session_of(&state, &structure)?;
    let alerts = ctx.recent_alerts.read().clone();
    Ok(Json(json!({ "alerts": alerts })))
}
