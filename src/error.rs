//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("resource {resource}: unknown column '{column}'")]
    UnknownColumn { resource: &'static str, column: String },
}

/// The join result does not match the assembly spec (query/schema drift).
#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("row {row} has no value for parent id column '{column}'")]
    MissingParentId { column: &'static str, row: usize },
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("missing permission: {0}")]
    Forbidden(String),
    #[error("storage: {0}")]
    Storage(String),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl AppError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            AppError::Assemble(_) => (StatusCode::INTERNAL_SERVER_ERROR, "assembly_error"),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            AppError::Db(e) => match e {
                sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "not_found"),
                sqlx::Error::Database(db) if db.is_unique_violation() => (StatusCode::CONFLICT, "conflict"),
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "validation_error")
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            },
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AppError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Storage(_) => (StatusCode::BAD_GATEWAY, "storage_error"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status_and_code().0, StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden("Read banners".into()).status_and_code(), (StatusCode::FORBIDDEN, "forbidden"));
        assert_eq!(
            AppError::Db(sqlx::Error::RowNotFound).status_and_code(),
            (StatusCode::NOT_FOUND, "not_found")
        );
        let assemble = AppError::from(AssembleError::MissingParentId { column: "product_id", row: 0 });
        assert_eq!(assemble.status_and_code().1, "assembly_error");
    }

    #[test]
    fn envelope_has_code_and_message_only() {
        let body = ErrorBody {
            error: ErrorDetail { code: "not_found".into(), message: "not found: banner 3".into() },
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({"error": {"code": "not_found", "message": "not found: banner 3"}})
        );
    }

    #[test]
    fn forbidden_message_names_permission() {
        assert_eq!(AppError::Forbidden("Delete banners".into()).to_string(), "missing permission: Delete banners");
    }
}
