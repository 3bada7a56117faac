//! ==============================================================================
//! api.rs - http boundary
//! ==============================================================================
//!
//! purpose:
//!     translates json requests from sensor nodes into registry / recorder
//!     calls, and hub errors back into status codes. no invariants live here.
//!
//! routes:
//!     POST /register        {"name", "location"}
//!     POST /unregister      {"name"}
//!     POST /update          {"name", "temperature", "humidity", ...}
//!     GET|POST /get_list    -> {"<name>": {device}, ...}
//!     GET  /devices/:name   -> {device}
//!     GET  /health          -> {"status": "ok", "devices": n}
//!
//! ==============================================================================

use crate::domain::{Device, DeviceName, Snapshot};
use crate::error::HubError;
use crate::config::HubConfig;
use crate::metrics::{MetricSet, Payload};
use crate::recorder::{LogFailurePolicy, Recorder};
use crate::registry::Registry;
use crate::storage::ReadingLog;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::warn;

// ==============================================================================
// shared state
// ==============================================================================
// created once in main and cloned into every handler. the registry is the
// only owner of device state; the recorder holds a second handle to it.

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<Registry>,
    pub recorder: Arc<Recorder>,
}

impl AppState {
    pub fn new(metrics: MetricSet, data_dir: impl Into<PathBuf>, policy: LogFailurePolicy) -> Self {
        let registry = Arc::new(Registry::new(metrics.clone()));
        let log = ReadingLog::new(data_dir, metrics);
        let recorder = Arc::new(Recorder::new(registry.clone(), log, policy));
        Self { registry, recorder }
    }

    /// State for a running hub, with every knob taken from `hub.toml`.
    pub fn from_config(config: &HubConfig) -> Self {
        let metrics = config.metrics.metric_set();
        let registry = Arc::new(Registry::new(metrics.clone()));
        let log = ReadingLog::new(&config.storage.data_dir, metrics);
        let recorder = Recorder::new(registry.clone(), log, config.storage.on_log_failure)
            .with_sensor_data_logging(config.logging.show_sensor_data);
        Self {
            registry,
            recorder: Arc::new(recorder),
        }
    }
}

// ==============================================================================
// requests / responses
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisterRequest {
    pub name: String,
}

/// A reading push: the device name plus one number per metric, flat.
///
/// Any other keys a node sends ride along and are ignored by the recorder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub name: String,
    #[serde(flatten)]
    pub readings: Payload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    fn reply(message: &str) -> Json<Self> {
        Json(Self {
            message: message.to_string(),
        })
    }
}

// ==============================================================================
// errors
// ==============================================================================

#[derive(Debug)]
pub struct ApiError(pub HubError);

impl From<HubError> for ApiError {
    fn from(err: HubError) -> Self {
        ApiError(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::JsonDataError(_)
            | JsonRejection::JsonSyntaxError(_)
            | JsonRejection::MissingJsonContentType(_) => {
                ApiError(HubError::validation(rejection.body_text()))
            }
            // body could not be buffered; nothing the sender got wrong
            other => ApiError(HubError::Unknown(other.body_text())),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match err {
            HubError::Validation(_) => StatusCode::BAD_REQUEST,
            HubError::NotFound(_) => StatusCode::NOT_FOUND,
            HubError::Persistence { .. } | HubError::Unknown(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let mut body = json!({
            "error": err.to_string(),
            "kind": err.kind(),
        });
        if let HubError::Persistence { rolled_back, .. } = err {
            body["partial"] = json!(!rolled_back);
            body["rolled_back"] = json!(rolled_back);
        }

        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

// ==============================================================================
// router
// ==============================================================================

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/register", post(register))
        .route("/unregister", post(unregister))
        .route("/update", post(update))
        .route("/get_list", get(list).post(list))
        .route("/devices/:name", get(get_device))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "devices": state.registry.len().await,
    }))
}

async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(req) = payload.inspect_err(|e| warn!(error = %e, "Rejected register request"))?;
    let name = DeviceName::parse(&req.name)?;

    state.registry.register(&name, &req.location).await;
    Ok(MessageResponse::reply("Sensor Registered Successfully"))
}

async fn unregister(
    State(state): State<AppState>,
    payload: Result<Json<UnregisterRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(req) = payload.inspect_err(|e| warn!(error = %e, "Rejected unregister request"))?;
    let name = DeviceName::parse(&req.name)?;

    state
        .registry
        .unregister(&name)
        .await
        .inspect_err(|e| warn!(error = %e, "Unregister failed"))?;
    Ok(MessageResponse::reply("Sensor Removed Successfully"))
}

async fn update(
    State(state): State<AppState>,
    payload: Result<Json<UpdateRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(req) = payload.inspect_err(|e| warn!(error = %e, "Rejected update request"))?;
    let name = DeviceName::parse(&req.name)?;

    state
        .recorder
        .record(&name, &req.readings)
        .await
        .inspect_err(|e| warn!(device = %name, kind = e.kind(), error = %e, "Update failed"))?;
    Ok(MessageResponse::reply("Data updated successfully"))
}

async fn list(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.registry.list().await)
}

async fn get_device(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> ApiResult<Json<Device>> {
    let name = DeviceName::parse(&name)?;
    Ok(Json(state.registry.get(&name).await?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_per_error_kind() {
        let cases = [
            (HubError::validation("bad"), StatusCode::BAD_REQUEST),
            (HubError::not_found("N"), StatusCode::NOT_FOUND),
            (
                HubError::Unknown("boom".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_from_config_applies_settings() {
        let config = HubConfig::parse(
            "[metrics]\ngas_sensor = true\n[storage]\non_log_failure = \"rollback\"\n[logging]\nshow_sensor_data = false\n",
        )
        .unwrap();
        let state = AppState::from_config(&config);

        assert_eq!(state.registry.metrics(), &MetricSet::with_gas());
        assert_eq!(state.recorder.policy(), LogFailurePolicy::Rollback);
        assert!(!state.recorder.shows_sensor_data());
    }
}
