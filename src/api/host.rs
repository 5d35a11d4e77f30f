use crate::entity::{Entity, Snapshot};
use crate::forwarder::Forwarder;
use crate::pipeline::WriteOutcome;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct HostAppState {
    pub forwarder: Arc<Forwarder>,
}

/// Change notification from the host
#[derive(Deserialize)]
struct ChangeRequest {
    #[serde(default)]
    previous: Option<Snapshot>,
    current: Entity,
}

/// Response to a change notification
#[derive(Serialize)]
struct ChangeResponse {
    sent: bool,
    outcome: Option<WriteOutcome>,
}

/// Full enumeration from the host
#[derive(Deserialize)]
struct EntitiesRequest {
    entities: Vec<Entity>,
}

#[derive(Serialize)]
struct EntitiesResponse {
    registered: usize,
}

/// Error response
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Create API router with host notification endpoints
pub fn create_host_router(state: HostAppState) -> Router {
    Router::new()
        .route("/api/devices/changed", post(device_changed))
        .route("/api/variables/changed", post(variable_changed))
        .route("/api/entities", put(replace_entities))
        .with_state(Arc::new(state))
}

/// POST /api/devices/changed - Forward a device change
async fn device_changed(
    State(state): State<Arc<HostAppState>>,
    body: Result<Json<ChangeRequest>, JsonRejection>,
) -> Result<Json<ChangeResponse>, AppError> {
    let Json(request) = body.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let outcome = state
        .forwarder
        .on_device_changed(request.previous, request.current)
        .await;
    Ok(Json(ChangeResponse::from(outcome)))
}

/// POST /api/variables/changed - Forward a variable change
async fn variable_changed(
    State(state): State<Arc<HostAppState>>,
    body: Result<Json<ChangeRequest>, JsonRejection>,
) -> Result<Json<ChangeResponse>, AppError> {
    let Json(request) = body.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let outcome = state
        .forwarder
        .on_variable_changed(request.previous, request.current)
        .await;
    Ok(Json(ChangeResponse::from(outcome)))
}

/// PUT /api/entities - Replace the entity registry
async fn replace_entities(
    State(state): State<Arc<HostAppState>>,
    body: Result<Json<EntitiesRequest>, JsonRejection>,
) -> Result<Json<EntitiesResponse>, AppError> {
    let Json(request) = body.map_err(|e| AppError::ValidationError(e.body_text()))?;
    let registered = request.entities.len();
    state.forwarder.replace_entities(request.entities);

    info!(registered = registered, "Entity enumeration received");
    Ok(Json(EntitiesResponse { registered }))
}

impl From<Option<WriteOutcome>> for ChangeResponse {
    fn from(outcome: Option<WriteOutcome>) -> Self {
        Self {
            sent: outcome == Some(WriteOutcome::Sent),
            outcome,
        }
    }
}

/// Application errors
#[derive(Debug)]
enum AppError {
    ValidationError(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
        };
        let body = Json(ErrorResponse {
            error: error_message,
        });
        (status, body).into_response()
    }
}
