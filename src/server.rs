//! HTTP surface over the coordinator.
//!
//! - `GET /groups/`: group association map
//! - `GET /:group/:period/`: timetable of one group and period
//! - `GET /`: timetable of the caller's own group

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Extension, Json, Router};
use serde::Serialize;

use crate::error::AppError;
use crate::models::{GroupAssociations, Timetable, TimetableKey};
use crate::pipeline::Coordinator;

/// Shared state behind every route.
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub associations: GroupAssociations,
}

/// Caller identity inserted as a request extension by the auth layer.
#[derive(Debug, Clone, Default)]
pub struct CallerProfile {
    pub group: Option<u32>,
}

/// Error body returned to clients.
#[derive(Debug, Serialize)]
struct ErrorBody {
    errors: Vec<String>,
    debug_errors: Vec<String>,
}

/// [`AppError`] rendered as a JSON response.
#[derive(Debug)]
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AppError::NoGroup => (StatusCode::BAD_REQUEST, self.0.to_string()),
            e if e.is_transient() => (
                StatusCode::BAD_GATEWAY,
                "could not reach the timetable service".to_string(),
            ),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "could not load the timetable".to_string(),
            ),
        };
        if status.is_server_error() {
            log::error!("Request failed: {}", self.0);
        }

        let body = ErrorBody {
            errors: vec![message],
            debug_errors: vec![self.0.to_string()],
        };
        (status, Json(body)).into_response()
    }
}

/// Creates a router that can be used by `axum`.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(get_own_timetable))
        .route("/groups/", get(get_groups))
        .route("/:group/:period/", get(get_timetable))
        .with_state(state)
}

/// GET /groups/
async fn get_groups(State(s): State<Arc<AppState>>) -> Json<GroupAssociations> {
    log::info!("GET /groups/");
    Json(s.associations.clone())
}

/// GET /:group/:period/
async fn get_timetable(
    Path((group, period)): Path<(u32, u32)>,
    State(s): State<Arc<AppState>>,
) -> Result<Json<Arc<Timetable>>, ApiError> {
    log::info!("GET /{}/{}/", group, period);
    let key = TimetableKey::new(group, period);
    let timetable = s.coordinator.lookup(Some(key), None).await?;
    Ok(Json(timetable))
}

/// GET /
async fn get_own_timetable(
    State(s): State<Arc<AppState>>,
    profile: Option<Extension<CallerProfile>>,
) -> Result<Json<Arc<Timetable>>, ApiError> {
    log::info!("GET /");
    let group = profile.and_then(|Extension(p)| p.group);
    let timetable = s.coordinator.lookup(None, group).await?;
    Ok(Json(timetable))
}
