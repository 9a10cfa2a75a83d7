//! Error types for queue operations.

use thiserror::Error;

/// Error type for every queue operation
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Queue not found: {message}")]
    QueueNotFound { message: String },

    #[error("Message not found or receipt handle invalid: {message}")]
    MessageNotFound { message: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Provider error: {code} - {message}")]
    Provider { code: String, message: String },

    #[error("Serialization failed: {0}")]
    Serialization(#[from] SerializationError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl QueueError {
    /// Check if error is transient and the caller may retry
    pub fn is_transient(&self) -> bool {
        match self {
            Self::QueueNotFound { .. } => false,
            Self::MessageNotFound { .. } => false,
            Self::AuthenticationFailed { .. } => false,
            Self::ConnectionFailed { .. } => true,
            Self::Provider { code, .. } => matches!(
                code.as_str(),
                "ThrottlingException"
                    | "RequestThrottled"
                    | "ServiceUnavailable"
                    | "InternalError"
                    | "InternalFailure"
            ),
            Self::Serialization(_) => false,
            Self::Configuration(_) => false,
            Self::Validation(_) => false,
        }
    }

    /// True for errors raised before any remote call was issued
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub(crate) fn required(field: impl Into<String>) -> Self {
        Self::Validation(ValidationError::Required {
            field: field.into(),
        })
    }
}

/// Errors while encoding or decoding message payloads
#[derive(Debug, Error)]
pub enum SerializationError {
    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML response could not be parsed: {message}")]
    Xml { message: String },

    #[error("Message attribute '{key}' has invalid value")]
    InvalidAttribute { key: String },
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },

    #[error("Configuration parsing failed: {message}")]
    Parsing { message: String },
}

/// Errors detected while normalizing call parameters
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    Required { field: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
