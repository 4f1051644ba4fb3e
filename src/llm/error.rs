//! Completion backend errors
//!
//! Every failure of a completion call maps to one `BackendError` variant. The
//! response generator treats all of them as a failed attempt; the variants
//! exist so logs can say *why* an attempt failed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Errors that can occur while talking to a completion endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackendError {
    /// Endpoint answered with a non-success status
    ApiError {
        message: String,
        status_code: Option<u16>,
    },

    /// Request did not complete within the allowed duration (in milliseconds)
    TimeoutError { millis: u64 },

    /// Connection refused, DNS failure, reset, ...
    NetworkError { message: String },

    /// Body could not be decoded or carried no usable content
    InvalidResponse {
        message: String,
        raw_response: Option<String>,
    },

    /// Endpoint does not serve the requested model
    ModelNotFound { model: String },

    /// Client could not be constructed from the given settings
    ConfigurationError { message: String },

    /// Generic error for other cases
    Other { message: String },
}

impl BackendError {
    /// Builds a timeout error from a duration
    pub fn timeout(duration: std::time::Duration) -> Self {
        BackendError::TimeoutError {
            millis: duration.as_millis() as u64,
        }
    }

    /// Short, stable name of the error kind for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::ApiError { .. } => "api",
            BackendError::TimeoutError { .. } => "timeout",
            BackendError::NetworkError { .. } => "network",
            BackendError::InvalidResponse { .. } => "invalid_response",
            BackendError::ModelNotFound { .. } => "model_not_found",
            BackendError::ConfigurationError { .. } => "configuration",
            BackendError::Other { .. } => "other",
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::ApiError {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "API error ({}): {}", code, message)
                } else {
                    write!(f, "API error: {}", message)
                }
            }
            BackendError::TimeoutError { millis } => {
                write!(f, "Request timed out after {} ms", millis)
            }
            BackendError::NetworkError { message } => {
                write!(f, "Network error: {}", message)
            }
            BackendError::InvalidResponse { message, .. } => {
                write!(f, "Invalid response from LLM: {}", message)
            }
            BackendError::ModelNotFound { model } => {
                write!(f, "Model '{}' is not available on the endpoint", model)
            }
            BackendError::ConfigurationError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            BackendError::Other { message } => {
                write!(f, "Error: {}", message)
            }
        }
    }
}

impl std::error::Error for BackendError {}
