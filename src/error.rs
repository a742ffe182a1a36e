use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    /// Не заданы параметры подключения (перечислены через запятую).
    #[error("Parse configuration missing ({0}). Please check your environment variables.")]
    Configuration(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0} is already in progress")]
    Busy(&'static str),

    /// Сообщение, которое вернул сервер (облачная функция или REST API).
    #[error("{0}")]
    Remote(String),

    #[error("Cannot connect to Parse Server. Please check your server URL and credentials.")]
    Transport(#[from] reqwest::Error),

    #[error("Image upload timed out after {0} seconds. Please check that the server is reachable.")]
    UploadTimeout(u64),

    #[error("Unexpected response from server")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Configuration(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Busy(_) => StatusCode::CONFLICT,
            AppError::Remote(_) => StatusCode::BAD_GATEWAY,
            AppError::Transport(_) => StatusCode::BAD_GATEWAY,
            AppError::UploadTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Serialization(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Configuration(_) => "CONFIGURATION_MISSING",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Busy(_) => "BUSY",
            AppError::Remote(_) => "REMOTE_ERROR",
            AppError::Transport(_) => "CONNECTION_ERROR",
            AppError::UploadTimeout(_) => "UPLOAD_TIMEOUT",
            AppError::Serialization(_) => "BAD_RESPONSE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Локальные ошибки, которые возникают до любого сетевого вызова.
    pub fn is_preflight(&self) -> bool {
        matches!(self, AppError::Configuration(_) | AppError::Validation(_))
    }

    /// Первое сообщение из ошибок `validator`, в порядке объявления полей формы.
    pub fn from_validation(errors: validator::ValidationErrors, field_order: &[&str]) -> Self {
        let fields = errors.field_errors();
        let message = field_order
            .iter()
            .filter_map(|name| fields.get(*name))
            .chain(fields.values())
            .flat_map(|list| list.iter())
            .map(|e| {
                e.message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| format!("Invalid value ({})", e.code))
            })
            .next()
            .unwrap_or_else(|| "Invalid form data".to_string());
        AppError::Validation(message)
    }

    fn log(&self) {
        match self {
            AppError::Transport(e) => error!(error = ?e, "Transport error"),
            AppError::Serialization(e) => error!(error = ?e, "Malformed response"),
            AppError::Internal(msg) => error!(message = %msg, "Internal error"),
            other => warn!(code = other.code(), message = %other, "Request failed"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.log();
        let status = self.status_code();
        let body = Json(json!({
            "success": false,
            "code": self.code(),
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}
