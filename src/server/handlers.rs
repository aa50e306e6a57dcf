//! HTTP request handlers for the item API.
//!
//! # Endpoints
//!
//! - `GET /` - Greeting
//! - `GET /health` - Health check
//! - `POST /deploy` - Fetch, re-encode and store an outfit
//! - `GET /items/{kind}/{uuid}` - Read back a stored item

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{DeployError, StoreError};
use crate::fetch::Fetcher;
use crate::service::{DeployRequest, DeployService};
use crate::store::{ItemKind, ItemStore};

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the deploy service.
pub struct AppState<F: Fetcher, S: ItemStore> {
    pub service: Arc<DeployService<F, S>>,
}

impl<F: Fetcher, S: ItemStore> AppState<F, S> {
    pub fn new(service: DeployService<F, S>) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

impl<F: Fetcher, S: ItemStore> Clone for AppState<F, S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Path parameters for item lookups: `/items/{kind}/{uuid}`.
#[derive(Debug, Deserialize)]
pub struct ItemPathParams {
    /// `avatar` or `outfit` (plural forms accepted)
    pub kind: String,

    pub uuid: String,
}

/// Query parameters for item lookups.
#[derive(Debug, Default, Deserialize)]
pub struct ItemQueryParams {
    /// Version to read; omitted or negative means latest
    #[serde(default)]
    pub version: Option<i64>,
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type identifier (e.g., "invalid_request", "download_failed")
    pub error: String,

    /// Human-readable error message
    pub message: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            message: message.into(),
        }
    }
}

/// Plain acknowledgement body.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Convert DeployError to HTTP response.
///
/// Client errors are logged at WARN (404 at DEBUG), server errors at ERROR.
/// Codec and storage details are only logged; the response carries a fixed
/// message.
impl IntoResponse for DeployError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            DeployError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request", msg.clone())
            }

            DeployError::Store(StoreError::InvalidId(_) | StoreError::UnknownKind(_)) => {
                (StatusCode::BAD_REQUEST, "invalid_request", self.to_string())
            }

            DeployError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Item not found: {}", what),
            ),

            DeployError::Fetch(err) => (
                StatusCode::BAD_GATEWAY,
                "download_failed",
                format!("Failed to download the file: {}", err),
            ),

            DeployError::Codec(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Failed to process the item".to_string(),
            ),

            DeployError::Store(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "Failed to access item storage".to_string(),
            ),
        };

        if status.is_server_error() {
            error!(
                error_type = error_type,
                status = status.as_u16(),
                "Server error: {}",
                self
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = error_type,
                status = status.as_u16(),
                "Resource not found: {}",
                message
            );
        } else {
            warn!(
                error_type = error_type,
                status = status.as_u16(),
                "Client error: {}",
                message
            );
        }

        (status, Json(ErrorResponse::new(error_type, message))).into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle `GET /`.
pub async fn root_handler() -> Json<MessageResponse> {
    Json(MessageResponse::new("Hello World!"))
}

/// Handle health check requests.
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Handle deploy requests.
///
/// # Endpoint
///
/// `POST /deploy`
///
/// # Request Body
///
/// ```json
/// {
///   "uuid": "0b7c11ee",
///   "url": "https://items.example.com/0b7c11ee.json",
///   "version": 3,
///   "master_idx": 0
/// }
/// ```
///
/// # Response
///
/// - `200 OK`: `{"message": "ok"}`
/// - `400 Bad Request`: Body is not JSON or a field is missing or invalid
/// - `502 Bad Gateway`: The document could not be downloaded
/// - `500 Internal Server Error`: Decode, encode or storage failure
///
/// The body is parsed here rather than through the `Json` extractor so that
/// a malformed body gets the same error shape as any other invalid request.
pub async fn deploy_handler<F: Fetcher + 'static, S: ItemStore + 'static>(
    State(state): State<AppState<F, S>>,
    body: Bytes,
) -> Result<Json<MessageResponse>, DeployError> {
    let request: DeployRequest = serde_json::from_slice(&body)
        .map_err(|e| DeployError::InvalidRequest(format!("Invalid request body: {}", e)))?;

    state.service.deploy(&request).await?;
    Ok(Json(MessageResponse::new("ok")))
}

/// Handle item lookups.
///
/// # Endpoint
///
/// `GET /items/{kind}/{uuid}?version={n}`
///
/// # Response
///
/// - `200 OK`: The stored encoded document, `Content-Type: application/json`,
///   with the resolved version in `X-Item-Version`
/// - `400 Bad Request`: Unknown kind or invalid identifier
/// - `404 Not Found`: No such item or version
pub async fn item_handler<F: Fetcher + 'static, S: ItemStore + 'static>(
    State(state): State<AppState<F, S>>,
    Path(params): Path<ItemPathParams>,
    Query(query): Query<ItemQueryParams>,
) -> Result<Response, DeployError> {
    let kind: ItemKind = params.kind.parse()?;
    let item = state
        .service
        .item(kind, &params.uuid, query.version)
        .await?;

    let mut response = Response::new(Body::from(item.data));
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    headers.insert("x-item-version", header::HeaderValue::from(item.record.version));
    Ok(response)
}
