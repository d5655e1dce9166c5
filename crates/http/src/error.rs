//! HTTP server errors

use thiserror::Error;

pub type HttpResult<T> = Result<T, HttpError>;

#[derive(Error, Debug)]
pub enum HttpError {
    #[error("Server startup failed: {message}")]
    StartupFailed { message: String },

    #[error("Server error: {message}")]
    ServeFailed { message: String },

    #[error("Database unavailable: {message}")]
    DatabaseUnavailable { message: String },
}

impl HttpError {
    pub fn startup<T: Into<String>>(message: T) -> Self {
        HttpError::StartupFailed {
            message: message.into(),
        }
    }

    pub fn serve<T: Into<String>>(message: T) -> Self {
        HttpError::ServeFailed {
            message: message.into(),
        }
    }

    pub fn database<T: Into<String>>(message: T) -> Self {
        HttpError::DatabaseUnavailable {
            message: message.into(),
        }
    }

    /// Stable code for logs and machine consumers
    pub fn error_code(&self) -> &'static str {
        match self {
            HttpError::StartupFailed { .. } => "SERVER_STARTUP_FAILED",
            HttpError::ServeFailed { .. } => "SERVER_ERROR",
            HttpError::DatabaseUnavailable { .. } => "DATABASE_UNAVAILABLE",
        }
    }
}
