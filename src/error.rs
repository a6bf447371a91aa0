use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::error;

pub const ACTIVITY_UNAVAILABLE: &str = "Unable to load call activity. Please retry later.";

/// Failure of the backing call store.  Every variant means the store could not be used and the
/// request may be retried.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("decode error: {0}")]
    Decode(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {}", .details.join(", "))]
    BadRequest { details: Vec<String> },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest { details } => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Bad Request", "details": details })),
            )
                .into_response(),
            ApiError::Storage(e) => {
                error!(error=%e, "call store unavailable");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": ACTIVITY_UNAVAILABLE })),
                )
                    .into_response()
            }
        }
    }
}

pub async fn handle_error(e: impl std::error::Error) {
    error!("ERROR: {e}")
}
