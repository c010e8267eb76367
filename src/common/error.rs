//! Error types for the recipe runner
//!
//! Errors are grouped by the stage that raised them. Engine-level failures
//! (a step or assertion that could not run) are never errors: they are
//! recorded inside the result report instead.

use std::io;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the recipe runner
#[derive(Error, Debug)]
pub enum Error {
    // === Type Resolution Errors ===
    #[error("Unknown {family} type '{tag}'. Run 'recipe tags' to list supported types")]
    UnknownTag { family: &'static str, tag: String },

    #[error("{family} record has no 'type' field")]
    MissingTag { family: &'static str },

    #[error("Malformed '{tag}' record: {message}")]
    MalformedRecord { tag: String, message: String },

    #[error("Type '{tag}' is already registered for {family} records")]
    DuplicateTag { family: &'static str, tag: String },

    // === Recipe Structure Errors ===
    #[error("Invalid recipe: {0}")]
    InvalidRecipe(String),

    #[error("A step has already been materialized for this assembler")]
    StepAlreadyMaterialized,

    #[error("'{step_type}' steps cannot carry assertions ({buffered} buffered)")]
    AssertionsNotSupported { step_type: String, buffered: usize },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    #[error("Invalid remote endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    // === Remote Execution Errors ===
    #[error("Failed to reach execution service at {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    #[error("Execution service rejected credentials for user '{user}' (HTTP {status})")]
    Authentication { user: String, status: u16 },

    #[error("Execution service returned HTTP {status}: {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("Execution service protocol error: {0}")]
    Protocol(String),

    // === Local Engine Errors ===
    #[error("Request failed: {0}")]
    Request(String),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an unknown tag error
    pub fn unknown_tag(family: &'static str, tag: &str) -> Self {
        Self::UnknownTag {
            family,
            tag: tag.to_string(),
        }
    }

    /// Create a malformed record error
    pub fn malformed(tag: &str, message: impl ToString) -> Self {
        Self::MalformedRecord {
            tag: tag.to_string(),
            message: message.to_string(),
        }
    }

    /// Create a transport error for an endpoint
    pub fn transport(endpoint: &str, message: impl ToString) -> Self {
        Self::Transport {
            endpoint: endpoint.to_string(),
            message: message.to_string(),
        }
    }

    /// Broad category, stable across message changes
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::UnknownTag { .. }
            | Error::MissingTag { .. }
            | Error::MalformedRecord { .. }
            | Error::DuplicateTag { .. }
            | Error::Yaml(_)
            | Error::Json(_) => ErrorCategory::Resolution,
            Error::InvalidRecipe(_)
            | Error::StepAlreadyMaterialized
            | Error::AssertionsNotSupported { .. } => ErrorCategory::Structural,
            Error::Config(_) | Error::ConfigParse(_) | Error::InvalidEndpoint { .. } => {
                ErrorCategory::Configuration
            }
            Error::Transport { .. } | Error::RemoteRejected { .. } | Error::Request(_) => {
                ErrorCategory::Transport
            }
            Error::Authentication { .. } => ErrorCategory::Authentication,
            Error::Protocol(_) => ErrorCategory::Protocol,
            Error::Io(_) | Error::FileRead { .. } | Error::Internal(_) => ErrorCategory::Internal,
        }
    }
}

/// Error categories surfaced to callers and mapped to CLI exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Resolution,
    Structural,
    Configuration,
    Transport,
    Authentication,
    Protocol,
    Internal,
}

impl ErrorCategory {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            ErrorCategory::Resolution => "RESOLUTION_ERROR",
            ErrorCategory::Structural => "INVALID_RECIPE",
            ErrorCategory::Configuration => "CONFIGURATION_ERROR",
            ErrorCategory::Transport => "TRANSPORT_ERROR",
            ErrorCategory::Authentication => "AUTHENTICATION_ERROR",
            ErrorCategory::Protocol => "PROTOCOL_ERROR",
            ErrorCategory::Internal => "INTERNAL_ERROR",
        }
    }

    /// Process exit code used by the CLI
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorCategory::Resolution => 3,
            ErrorCategory::Structural => 4,
            ErrorCategory::Configuration => 5,
            ErrorCategory::Transport => 6,
            ErrorCategory::Authentication => 7,
            ErrorCategory::Protocol => 8,
            ErrorCategory::Internal => 70,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_is_distinct_from_transport() {
        let auth = Error::Authentication {
            user: "admin".to_string(),
            status: 401,
        };
        let down = Error::transport("http://localhost:1", "connection refused");
        assert_eq!(auth.category(), ErrorCategory::Authentication);
        assert_eq!(down.category(), ErrorCategory::Transport);
        assert_ne!(auth.category().exit_code(), down.category().exit_code());
    }

    #[test]
    fn test_unknown_tag_message_names_tag() {
        let err = Error::unknown_tag("assertion", "Bogus Check");
        assert!(err.to_string().contains("Bogus Check"));
        assert_eq!(err.category().code(), "RESOLUTION_ERROR");
    }
}
