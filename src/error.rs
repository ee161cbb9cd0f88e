/// Error types for the Warmgate API gateway
///
/// Every failure that can reach the HTTP layer is one of these variants and
/// renders as the `{error, mensaje}` JSON envelope.
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::constants::*;

/// Main error type for gateway operations
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration-related errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Validation errors
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// File I/O errors
    #[error("File I/O error: {message}")]
    Io { message: String },

    /// Network and connection errors
    #[error("Network error: {message}")]
    Network { message: String },

    /// Server startup/shutdown errors
    #[error("Server error: {message}")]
    Server { message: String },

    /// No configured prefix matches the inbound path
    #[error("No route configured for path: {path}")]
    RouteNotFound { path: String },

    /// The inbound request could not be turned into an upstream call
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// The inbound body is larger than the gateway buffers
    #[error("Request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    /// Anything else that escaped a handler
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// JSON body of every error response
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ErrorEnvelope {
    pub error: String,
    pub mensaje: String,
}

impl ErrorEnvelope {
    pub fn new<E: Into<String>, M: Into<String>>(error: E, mensaje: M) -> Self {
        Self {
            error: error.into(),
            mensaje: mensaje.into(),
        }
    }
}

impl GatewayError {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a new server error
    pub fn server<S: Into<String>>(message: S) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    pub fn route_not_found<S: Into<String>>(path: S) -> Self {
        Self::RouteNotFound { path: path.into() }
    }

    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidRequest { .. } => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            Self::RouteNotFound { path } => {
                ErrorEnvelope::new(MSG_ROUTE_NOT_FOUND, format!("No existe la ruta {}", path))
            }
            Self::InvalidRequest { message } => {
                ErrorEnvelope::new(MSG_INVALID_REQUEST, message.clone())
            }
            Self::PayloadTooLarge { .. } => {
                ErrorEnvelope::new(MSG_PAYLOAD_TOO_LARGE, self.to_string())
            }
            other => ErrorEnvelope::new(MSG_INTERNAL_ERROR, other.to_string()),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Error en API Gateway: {}", self);
        }
        (status, Json(self.envelope())).into_response()
    }
}

/// Convert standard I/O errors to gateway errors
impl From<std::io::Error> for GatewayError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
        }
    }
}

/// Convert TOML deserialization errors to gateway errors
impl From<toml::de::Error> for GatewayError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config {
            message: format!("TOML parsing error: {}", err),
        }
    }
}

/// Convert TOML serialization errors to gateway errors
impl From<toml::ser::Error> for GatewayError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Config {
            message: format!("TOML serialization error: {}", err),
        }
    }
}

/// Convert reqwest errors to gateway errors
impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network {
            message: err.to_string(),
        }
    }
}
