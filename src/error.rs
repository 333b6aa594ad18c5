use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Classified failure from a catalog lookup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Spotify API has a bad or expired token")]
    Unauthorized,
    #[error("Spotify API has bad OAuth request")]
    Forbidden,
    #[error("not found in catalog: {0}")]
    NotFound(String),
    #[error("Spotify API error: {0}")]
    Upstream(String),
}

impl CatalogError {
    /// Maps an HTTP status and body from the catalog to a classification.
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        match status.as_u16() {
            401 => CatalogError::Unauthorized,
            403 => CatalogError::Forbidden,
            404 => CatalogError::NotFound(body.to_string()),
            _ => CatalogError::Upstream(format!("{} - {}", status, body)),
        }
    }
}

/// Failure of an aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Upstream(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Unauthorized => AppError::Unauthorized(err.to_string()),
            CatalogError::Forbidden => AppError::Forbidden(err.to_string()),
            CatalogError::NotFound(_) | CatalogError::Upstream(_) => {
                AppError::Upstream(err.to_string())
            }
        }
    }
}

impl From<AggregateError> for AppError {
    fn from(err: AggregateError) -> Self {
        match err {
            AggregateError::InvalidInput(msg) => AppError::BadRequest(msg),
            AggregateError::Catalog(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (
            status,
            Json(json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}
