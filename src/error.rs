use axum::{
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::json;

use crate::services::pool_selector::InsufficientPool;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No target users matched the generation request")]
    NoTargets,

    #[error("{0}")]
    InsufficientPool(Box<InsufficientPool>),

    #[error("Database error: {0}")]
    Database(sqlx::Error),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),

    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let (status, body) = match self {
            Error::BadRequest(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            Error::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            Error::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            Error::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            Error::NoTargets => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "no_targets",
                    "message": "No target users matched the generation request",
                }),
            ),
            Error::InsufficientPool(diag) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "error": "insufficient_pool",
                    "message": diag.to_string(),
                    "diagnostics": *diag,
                }),
            ),
            Error::Validation(err) => {
                (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() }))
            }
            Error::Json(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Database(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": err.to_string() }),
            ),
            Error::Reqwest(err) => (
                StatusCode::BAD_GATEWAY,
                json!({ "error": format!("External service error: {}", err) }),
            ),
            Error::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": msg })),
            Error::Anyhow(err) => (StatusCode::BAD_REQUEST, json!({ "error": err.to_string() })),
            Error::Config(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "An unexpected error occurred" }),
            ),
        };

        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Error::NotFound("Resource not found".to_string()),
            other => Error::Database(other),
        }
    }
}

impl From<InsufficientPool> for Error {
    fn from(diag: InsufficientPool) -> Self {
        Error::InsufficientPool(Box::new(diag))
    }
}

impl From<sqlx::migrate::MigrateError> for Error {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Error::Internal(format!("Migration failed: {}", err))
    }
}
