// PIN Pool - HTTP API (Axum)
// Thin transport over PinService; store calls run on the blocking pool

use std::sync::Arc;

use axum::{
    extract::{rejection::PathRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tracing::error;

use crate::error::Error;
use crate::pin::Pin;
use crate::service::PinService;
use crate::store::{PinStore, PoolStats};

pub type SharedService = Arc<PinService<Arc<dyn PinStore>>>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: SharedService,
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    fn err(message: String) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message),
        }
    }
}

/// Maps library errors onto HTTP status codes
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        ApiError(Error::store(format!("store task failed: {}", err)))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            e if e.is_client_error() => StatusCode::BAD_REQUEST,
            Error::PoolNotInitialized => StatusCode::CONFLICT,
            Error::PoolExhausted { .. } => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }

        (status, Json(ApiResponse::err(self.0.to_string()))).into_response()
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /pin/initialize - Load the pool if the store is empty
async fn initialize(State(state): State<AppState>) -> Result<Json<bool>, ApiError> {
    let service = state.service.clone();
    let initialized = tokio::task::spawn_blocking(move || service.initialize()).await??;

    Ok(Json(initialized))
}

/// GET /pin/get-pins/:requested - Issue PINs
async fn get_pins(
    State(state): State<AppState>,
    requested: Result<Path<usize>, PathRejection>,
) -> Result<Json<Vec<Pin>>, ApiError> {
    let Path(requested) = requested.map_err(|rejection| Error::InvalidRequest {
        reason: rejection.body_text(),
    })?;
    let service = state.service.clone();
    let pins = tokio::task::spawn_blocking(move || service.get_pins(requested)).await??;

    Ok(Json(pins))
}

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// GET /api/stats - Pool counts
async fn get_stats(State(state): State<AppState>) -> Result<Json<ApiResponse<PoolStats>>, ApiError> {
    let service = state.service.clone();
    let stats = tokio::task::spawn_blocking(move || service.store().stats()).await??;

    Ok(Json(ApiResponse::ok(stats)))
}

pub fn router(service: SharedService) -> Router {
    let state = AppState { service };

    let pin_routes = Router::new()
        .route("/initialize", get(initialize))
        .route("/get-pins/:requested", get(get_pins));

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/stats", get(get_stats));

    Router::new()
        .nest("/pin", pin_routes)
        .nest("/api", api_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::service::RetrievalLimits;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(limits: RetrievalLimits) -> Router {
        let store: Arc<dyn PinStore> = Arc::new(MemoryStore::new());
        router(Arc::new(PinService::with_limits(store, limits)))
    }

    async fn call(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_initialize_then_get_pins() {
        let app = app(RetrievalLimits::default());

        let (status, body) = call(&app, "/pin/initialize").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!(true));

        let (status, body) = call(&app, "/pin/get-pins/4").await;
        assert_eq!(status, StatusCode::OK);
        let pins = body.as_array().unwrap();
        assert_eq!(pins.len(), 4);
        assert_eq!(pins[0]["allocated"], true);
        assert_eq!(pins[0]["code"].as_str().unwrap().len(), 4);

        let (status, body) = call(&app, "/api/stats").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["allocated"], 4);
        assert_eq!(body["data"]["total"], 9_580);
    }

    #[tokio::test]
    async fn test_get_pins_before_initialize() {
        let app = app(RetrievalLimits::default());

        let (status, body) = call(&app, "/pin/get-pins/1").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_request_too_large() {
        let app = app(RetrievalLimits {
            max_request: 10,
            max_rollovers: 2,
        });
        call(&app, "/pin/initialize").await;

        let (status, body) = call(&app, "/pin/get-pins/11").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("at most 10"));
    }

    #[tokio::test]
    async fn test_non_numeric_count_is_json_error() {
        let app = app(RetrievalLimits::default());

        let (status, body) = call(&app, "/pin/get-pins/abc").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request"));
    }

    #[tokio::test]
    async fn test_health() {
        let app = app(RetrievalLimits::default());

        let (status, body) = call(&app, "/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], "OK");
    }
}
