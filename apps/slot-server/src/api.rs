/// REST endpoints for slot selections and per-calendar timezones.
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get},
    Json, Router,
};
use slots::wire::{
    ErrorResponse, MutationRequest, MutationResponse, SetTimezoneResponse, SuccessResponse,
    TimezoneRequest, TimezoneResponse,
};
use slots::{CalendarId, GridError, SlotKey, SlotMap, TimezoneOffset};
use std::path::Path as FsPath;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::storage::SlotStore;

pub type AppState = Arc<SlotStore>;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    NotFound(String),
    Storage(String),
}

impl From<GridError> for ApiError {
    fn from(e: GridError) -> Self {
        match e {
            GridError::Validation(msg) => ApiError::Validation(msg),
            GridError::NotFound(msg) => ApiError::NotFound(msg),
            GridError::Storage(msg) => ApiError::Storage(msg),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Storage(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Storage error: {}", msg),
            ),
        };

        let body = ErrorResponse {
            success: false,
            error,
        };
        (status, Json(body)).into_response()
    }
}

/// GET /api/slots/:calendar_id and /api/slots/:calendar_id/all
pub async fn list_slots(
    State(store): State<AppState>,
    Path(calendar): Path<String>,
) -> Json<SlotMap> {
    Json(store.list_all(&CalendarId::new(calendar)))
}

/// POST /api/slots/:calendar_id - add or remove one nickname at a slot
pub async fn mutate_slot(
    State(store): State<AppState>,
    Path(calendar): Path<String>,
    body: Result<Json<MutationRequest>, JsonRejection>,
) -> Result<Json<MutationResponse>, ApiError> {
    let Json(req) = body?;
    let key: SlotKey = req.slot_key.parse()?;
    let nickname = req.nickname.trim();
    if nickname.is_empty() {
        return Err(ApiError::Validation("nickname is required".to_string()));
    }

    let slots = store.mutate(&CalendarId::new(calendar), key, nickname, req.action);
    Ok(Json(MutationResponse {
        success: true,
        slots,
    }))
}

/// DELETE /api/slots - drop slot data for every calendar
pub async fn clear_slots(State(store): State<AppState>) -> Json<SuccessResponse> {
    store.clear_all();
    Json(SuccessResponse { success: true })
}

/// GET /api/timezone/:calendar_id
pub async fn get_timezone(
    State(store): State<AppState>,
    Path(calendar): Path<String>,
) -> Json<TimezoneResponse> {
    Json(TimezoneResponse {
        timezone: store.timezone(&CalendarId::new(calendar)),
    })
}

/// POST /api/timezone/:calendar_id - whole hours in [-4, +4]
pub async fn set_timezone(
    State(store): State<AppState>,
    Path(calendar): Path<String>,
    body: Result<Json<TimezoneRequest>, JsonRejection>,
) -> Result<Json<SetTimezoneResponse>, ApiError> {
    let Json(req) = body?;
    let offset = match req.timezone.as_i64() {
        Some(hours) => TimezoneOffset::new(hours)?,
        None => {
            return Err(ApiError::Validation(format!(
                "timezone must be a whole number between {} and +{}",
                TimezoneOffset::MIN,
                TimezoneOffset::MAX
            )))
        }
    };

    store.set_timezone(&CalendarId::new(calendar), offset);
    Ok(Json(SetTimezoneResponse {
        success: true,
        timezone: offset,
    }))
}

async fn api_not_found() -> ApiError {
    GridError::NotFound("Not found".to_string()).into()
}

/// Full application: `/api` routes, optional static client, open CORS.
pub fn router(store: AppState, static_dir: Option<&FsPath>) -> Router {
    let api = Router::new()
        .route("/slots", delete(clear_slots))
        .route("/slots/:calendar_id", get(list_slots).post(mutate_slot))
        .route("/slots/:calendar_id/all", get(list_slots))
        .route(
            "/timezone/:calendar_id",
            get(get_timezone).post(set_timezone),
        )
        .fallback(api_not_found);

    let app = Router::new().nest("/api", api);
    let app = match static_dir {
        Some(dir) => app.fallback_service(
            ServeDir::new(dir).fallback(ServeFile::new(dir.join("index.html"))),
        ),
        None => app.fallback(api_not_found),
    };

    app.layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(store)
}
