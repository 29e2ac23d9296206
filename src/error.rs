//! Error types for the query gateway.
//!
//! This module defines all error types using `thiserror`. Every rejection
//! path carries a structured, operator-facing reason; the end-user rendering
//! is deliberately generic (`user_message`) so blocked query internals are
//! never echoed back to the requester.

use thiserror::Error;

/// Errors raised while building the database registry from configuration.
///
/// Configuration errors are fatal at startup: a registry is either built
/// completely (possibly with per-entry skips reported separately) or not
/// at all.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid connection URL for '{name}': {message}")]
    InvalidUrl { name: String, message: String },

    #[error("Connection '{name}' has no database name in its URL")]
    MissingDatabase { name: String },

    #[error("Unknown connection scheme '{scheme}' for '{name}'")]
    UnknownScheme { name: String, scheme: String },

    #[error("More than one database is marked as default: {first} and {second}")]
    MultipleDefaults { first: String, second: String },

    #[error("Duplicate database name '{name}' in configuration")]
    DuplicateName { name: String },

    #[error("No database connections configured")]
    Empty,
}

impl ConfigError {
    pub fn invalid_url(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidUrl {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn missing_database(name: impl Into<String>) -> Self {
        Self::MissingDatabase { name: name.into() }
    }

    pub fn unknown_scheme(name: impl Into<String>, scheme: impl Into<String>) -> Self {
        Self::UnknownScheme {
            name: name.into(),
            scheme: scheme.into(),
        }
    }
}

/// Errors surfaced by the gateway's `answer` flow.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not determine a target database for the request")]
    RoutingAmbiguity {
        /// Non-sensitive hint for operator logs (e.g. "no rule matched, no default").
        hint: String,
    },

    #[error("Interpreter output could not be reduced to a query: {message}")]
    ParseFailure { message: String },

    #[error("Query blocked by safety validation ({categories:?})")]
    ValidationRejection {
        /// Blocked-reason categories only; never the query text itself.
        categories: Vec<String>,
    },

    #[error("Operation '{operation}' is not permitted on database '{database}'")]
    PermissionDenied { database: String, operation: String },

    #[error("Unknown database '{database}'")]
    UnknownDatabase { database: String },

    #[error("Store execution failed: {message}")]
    Execution { message: String, retryable: bool },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u64,
    },
}

impl GatewayError {
    pub fn routing_ambiguity(hint: impl Into<String>) -> Self {
        Self::RoutingAmbiguity { hint: hint.into() }
    }

    pub fn parse_failure(message: impl Into<String>) -> Self {
        Self::ParseFailure {
            message: message.into(),
        }
    }

    pub fn validation_rejection(categories: Vec<String>) -> Self {
        Self::ValidationRejection { categories }
    }

    pub fn permission_denied(database: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::PermissionDenied {
            database: database.into(),
            operation: operation.into(),
        }
    }

    pub fn unknown_database(database: impl Into<String>) -> Self {
        Self::UnknownDatabase {
            database: database.into(),
        }
    }

    pub fn execution(message: impl Into<String>, retryable: bool) -> Self {
        Self::Execution {
            message: message.into(),
            retryable,
        }
    }

    pub fn timeout(operation: impl Into<String>, elapsed_secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Whether the executor may retry the failed call once (read-only queries only).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Execution {
                retryable: true,
                ..
            } | Self::Timeout { .. }
        )
    }

    /// Generic user-facing message. Safety rejections and permission denials
    /// share one rendering so the response does not leak which check fired.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Config(_) => "The service is misconfigured. Please contact an operator.",
            Self::RoutingAmbiguity { .. } => {
                "I could not tell which data source your question refers to. \
                 Could you rephrase it?"
            }
            Self::ParseFailure { .. } => "I could not understand the request. Please rephrase it.",
            Self::ValidationRejection { .. }
            | Self::PermissionDenied { .. }
            | Self::UnknownDatabase { .. } => "The request could not be processed safely.",
            Self::Execution { .. } | Self::Timeout { .. } => {
                "The data source did not respond in time. Please try again."
            }
        }
    }
}

/// Convert sqlx errors into gateway execution errors.
impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => GatewayError::timeout("connection pool acquire", 30),
            sqlx::Error::Io(io_err) => {
                GatewayError::execution(format!("I/O error: {}", io_err), true)
            }
            sqlx::Error::PoolClosed => GatewayError::execution("connection pool is closed", true),
            sqlx::Error::Database(db_err) => {
                GatewayError::execution(db_err.message().to_string(), false)
            }
            other => GatewayError::execution(other.to_string(), false),
        }
    }
}

/// Result type alias for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GatewayError::permission_denied("sales", "insert");
        assert!(err.to_string().contains("sales"));
        assert!(err.to_string().contains("insert"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(GatewayError::timeout("query", 30).is_retryable());
        assert!(GatewayError::execution("socket closed", true).is_retryable());
        assert!(!GatewayError::execution("syntax error", false).is_retryable());
        assert!(!GatewayError::permission_denied("sales", "insert").is_retryable());
        assert!(!GatewayError::validation_rejection(vec!["ddl".into()]).is_retryable());
    }

    #[test]
    fn test_user_message_does_not_leak_categories() {
        let err = GatewayError::validation_rejection(vec!["statement-stacking".into()]);
        assert!(!err.user_message().contains("stacking"));
    }

    #[test]
    fn test_rejection_and_denial_share_user_message() {
        let rejected = GatewayError::validation_rejection(vec!["ddl".into()]);
        let denied = GatewayError::permission_denied("sales", "delete");
        assert_eq!(rejected.user_message(), denied.user_message());
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::MultipleDefaults {
            first: "sales".into(),
            second: "ops".into(),
        };
        assert!(err.to_string().contains("sales"));
        assert!(err.to_string().contains("ops"));
    }
}
