use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that stop the herald server from starting or running
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Configuration error: {0}")]
    Config(#[from] herald_config::ConfigError),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),

    #[error("Seeding accounts failed: {0}")]
    Seed(#[source] herald_core::Error),

    #[error("Shutdown timeout exceeded")]
    ShutdownTimeout,

    #[error("Signal handling error: {0}")]
    Signal(String),
}

impl ServerError {
    pub fn signal(message: impl Into<String>) -> Self {
        Self::Signal(message.into())
    }
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Error returned by HTTP handlers
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] herald_core::Error),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

/// JSON body of every error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub code: u16,
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// HTTP status for this error. Quota and permission failures must stay
    /// distinguishable so clients back off correctly.
    pub fn status_code(&self) -> StatusCode {
        use herald_core::Error;
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Core(error) => match error {
                Error::Forbidden { .. } => StatusCode::FORBIDDEN,
                Error::QuotaExceeded { .. } | Error::ReservationLimitExceeded { .. } => {
                    StatusCode::TOO_MANY_REQUESTS
                }
                Error::AdminCannotReserve | Error::Validation { .. } => StatusCode::BAD_REQUEST,
                Error::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
                Error::NotFound { .. } => StatusCode::NOT_FOUND,
                Error::Conflict { .. } => StatusCode::CONFLICT,
                Error::Unavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                Error::Store { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    pub fn error_code(&self) -> &'static str {
        use herald_core::Error;
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Core(error) => match error {
                Error::Forbidden { .. } => "FORBIDDEN",
                Error::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
                Error::ReservationLimitExceeded { .. } => "RESERVATION_LIMIT_EXCEEDED",
                Error::AdminCannotReserve => "ADMIN_CANNOT_RESERVE",
                Error::Validation { .. } => "VALIDATION_ERROR",
                Error::Unauthorized { .. } => "UNAUTHORIZED",
                Error::NotFound { .. } => "NOT_FOUND",
                Error::Conflict { .. } => "CONFLICT",
                Error::Unavailable { .. } => "UNAVAILABLE",
                Error::Store { .. } => "INTERNAL_ERROR",
            },
        }
    }

    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            error: self.error_code().to_string(),
            message: self.to_string(),
            code: self.status_code().as_u16(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, status = %status, "Request failed");
        } else {
            tracing::debug!(error = %self, status = %status, "Request rejected");
        }

        (status, Json(self.to_response())).into_response()
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
