use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::error;

use crate::application::error::AppError;
use crate::application::sessions::SessionError;
use crate::domain::error::DomainError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const STORE: &str = "store_error";
    pub const UPLOAD: &str = "upload_error";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    hint: Option<String>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint,
        }
    }

    pub fn bad_request(message: impl Into<String>, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, codes::UNAUTHORIZED, message, None)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message, None)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn upload(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::UPLOAD, message, None)
    }

    pub fn internal() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Unexpected error occurred",
            None,
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
                hint: self.hint,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Domain(DomainError::Unauthorized { message }) => ApiError::forbidden(message),
            AppError::Domain(DomainError::NotFound { .. }) | AppError::NotFound => {
                ApiError::not_found("resource not found")
            }
            AppError::Domain(DomainError::Validation { message })
            | AppError::Validation(message) => ApiError::bad_request(message, None),
            AppError::Session(SessionError::Missing) => {
                ApiError::unauthorized("you must log in first")
            }
            AppError::Session(SessionError::Expired) => {
                ApiError::unauthorized("session expired, log in again")
            }
            AppError::Session(SessionError::Invalid) => {
                ApiError::unauthorized("invalid credentials")
            }
            AppError::Store(detail) => {
                // The write failed and rolled back; the caller gets a
                // definitive failure with no storage internals attached.
                error!(detail = %detail, "store error surfaced to API");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    codes::STORE,
                    "Persistent store rejected the operation",
                    None,
                )
            }
            other => {
                // Hashing failures, broken invariants, infra faults.
                error!(error = %other, "unexpected error surfaced to API");
                ApiError::internal()
            }
        }
    }
}
