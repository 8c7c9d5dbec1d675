//! Error types for the availability API.
//!
//! [`ApiError`] unifies the REST failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation. Stream
//! endpoints never return it: their failures travel in-band as `error`
//! events.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parkfeed_core::StorageError;
use parkfeed_types::ParseIdError;

/// Errors that can occur in the REST layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// A lot id could not be parsed from the request path.
    #[error(transparent)]
    InvalidLotId(#[from] ParseIdError),

    /// Storage could not answer the query.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            Self::InvalidLotId(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            Self::Storage(e) => {
                tracing::warn!(error = %e, "Availability query failed");
                (StatusCode::SERVICE_UNAVAILABLE, String::from("storage unavailable"))
            }
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
