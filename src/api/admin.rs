use crate::config::BridgeConfig;
use crate::forwarder::{Forwarder, Reconfigured, Status};
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// State for the admin API.
#[derive(Clone)]
pub struct AdminAppState {
    pub forwarder: Arc<Forwarder>,
    /// Required bearer token for PUT /api/config. None = PUT unrestricted.
    pub admin_token: Option<String>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct ConfigResponse {
    config: BridgeConfig,
    #[serde(flatten)]
    result: Reconfigured,
}

pub fn create_admin_router(state: AdminAppState) -> Router {
    Router::new()
        .route("/api/config", get(get_config).put(put_config))
        .route("/api/status", get(get_status))
        .with_state(Arc::new(state))
}

/// GET /api/config - current settings, password redacted.
async fn get_config(State(state): State<Arc<AdminAppState>>) -> Response {
    let settings = state.forwarder.settings().await;
    Json(settings.redacted()).into_response()
}

/// PUT /api/config - apply a host preference map. Requires HOMEFLUX_ADMIN_TOKEN bearer.
async fn put_config(
    State(state): State<Arc<AdminAppState>>,
    headers: HeaderMap,
    Json(prefs): Json<HashMap<String, Value>>,
) -> Response {
    // Admin token check
    if !validate_admin_token(&headers, &state.admin_token) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Unauthorized".to_string(),
            }),
        )
            .into_response();
    }

    let result = state.forwarder.reconfigure(&prefs).await;
    let config = state.forwarder.settings().await.redacted();

    Json(ConfigResponse { config, result }).into_response()
}

/// GET /api/status - session readiness and cache sizes.
async fn get_status(State(state): State<Arc<AdminAppState>>) -> Json<Status> {
    Json(state.forwarder.status().await)
}

/// Returns true if the bearer token in `Authorization` matches the expected admin token.
/// Returns true (no restriction) when `expected` is None.
fn validate_admin_token(headers: &HeaderMap, expected: &Option<String>) -> bool {
    let Some(expected_token) = expected else {
        return true;
    };

    let Some(auth_header) = headers.get("Authorization") else {
        return false;
    };
    let Ok(value) = auth_header.to_str() else {
        return false;
    };
    let Some(token) = value.strip_prefix("Bearer ") else {
        return false;
    };

    token == expected_token
}
