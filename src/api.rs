// IsItOpen REST API (Axum)
//
// Thin layer over the store and the core: parse the request, sample `now`
// once, call into assembly, wrap the answer in ApiResponse.

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::assembly::{place_detail, search, PlaceWithStatus, SearchPage};
use crate::config::Config;
use crate::db::SqliteStore;
use crate::error::{IsItOpenError, Result};
use crate::models::{NewPlace, NewStatusReport, Place, StatusReport};
use crate::policy::{Pagination, StatusPolicy};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    policy: StatusPolicy,
    page_size: u32,
}

impl AppState {
    pub fn new(store: SqliteStore, config: &Config) -> Self {
        AppState {
            store: Arc::new(Mutex::new(store)),
            policy: config.status_policy,
            page_size: config.page_size,
        }
    }

    fn store(&self) -> Result<MutexGuard<'_, SqliteStore>> {
        self.store
            .lock()
            .map_err(|_| IsItOpenError::Storage(anyhow::anyhow!("store lock poisoned")))
    }
}

/// API Response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

impl ApiResponse<serde_json::Value> {
    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: serde_json::Value::Null,
            error: Some(message.into()),
        }
    }
}

impl IntoResponse for IsItOpenError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            IsItOpenError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            IsItOpenError::InvalidInput(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            IsItOpenError::Storage(_) => {
                error!(error = %self, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal storage error".to_string())
            }
        };

        (status, Json(ApiResponse::err(message))).into_response()
    }
}

fn body_error(rejection: JsonRejection) -> IsItOpenError {
    IsItOpenError::invalid(rejection.body_text())
}

// ============================================================================
// API Handlers
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Health {
    pub status: String,
    pub message: String,
}

/// GET /api/health - Health check
async fn health_check() -> Json<ApiResponse<Health>> {
    Json(ApiResponse::ok(Health {
        status: "ok".to_string(),
        message: "IsItOpen API is running".to_string(),
    }))
}

/// Raw query string; numbers are parsed leniently
#[derive(Debug, Default, Deserialize)]
struct SearchParams {
    q: Option<String>,
    city: Option<String>,
    page: Option<String>,
    limit: Option<String>,
}

fn lenient_u32(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|v| v.trim().parse::<u32>().ok()).unwrap_or(default)
}

/// GET /api/search?q=&city=&page=&limit=
async fn search_places(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<ApiResponse<SearchPage>>> {
    let now = Utc::now();
    let pagination = Pagination::new(
        lenient_u32(params.page.as_deref(), 1),
        lenient_u32(params.limit.as_deref(), state.page_size),
    );

    let store = state.store()?;
    let page = search(
        &*store,
        params.q.as_deref().unwrap_or_default(),
        params.city.as_deref().unwrap_or_default(),
        pagination,
        &state.policy,
        now,
    )?;

    Ok(Json(ApiResponse::ok(page)))
}

#[derive(Debug, Deserialize)]
struct PlaceParams {
    id: Option<String>,
}

/// GET /api/place?id= - One place with its status
async fn get_place(
    State(state): State<AppState>,
    Query(params): Query<PlaceParams>,
) -> Result<Json<ApiResponse<PlaceWithStatus>>> {
    let id = params
        .id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| IsItOpenError::invalid("ID is required"))?;

    let now = Utc::now();
    let store = state.store()?;
    let detail = place_detail(&*store, id.trim(), &state.policy, now)?;

    Ok(Json(ApiResponse::ok(detail)))
}

/// POST /api/places - Create a place
async fn create_place(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewPlace>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Place>>)> {
    let Json(new_place) = payload.map_err(body_error)?;
    let place = new_place.into_place(Utc::now())?;

    state.store()?.insert_place(&place)?;
    info!(place_id = %place.id, name = %place.name, city = %place.city, "place added");

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(place))))
}

/// POST /api/status - File an OPEN/CLOSED report
async fn report_status(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewStatusReport>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<StatusReport>>)> {
    let Json(new_report) = payload.map_err(body_error)?;
    let report = new_report.into_report(Utc::now())?;

    state.store()?.insert_report(&report)?;
    info!(
        place_id = %report.place_id,
        status = report.status.as_str(),
        "status reported"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::ok(report))))
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/search", get(search_places))
        .route("/place", get(get_place))
        .route("/places", post(create_place))
        .route("/status", post(report_status))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
