//! Error types for switchover operations
//!
//! Every failure belongs to one of four kinds. The kind carries the retry
//! classification, so callers decide what to do with `err.kind()` instead of
//! matching individual variants.

use thiserror::Error;

use crate::retry::is_retryable;
use crate::transport::TransportError;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Network, 5xx or 429-class failure that may clear up on its own
    Transient,
    /// Failure that retrying cannot resolve
    Fatal,
    /// Preflight validation failure
    Validation,
    /// Invalid run configuration or arguments
    Configuration,
}

impl ErrorKind {
    /// Whether an operation that failed with this kind is worth re-attempting
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transient)
    }

    /// Whether this kind belongs to the fatal family (fatal, validation, configuration)
    pub fn is_fatal(self) -> bool {
        !self.is_retryable()
    }
}

/// Main error type for switchover operations
#[derive(Debug, Error)]
pub enum Error {
    /// Retryable failure talking to a hub
    #[error("transient error [{context}]: {message}")]
    Transient {
        /// Kube context (or component) where the failure occurred
        context: String,
        /// Description of what failed
        message: String,
    },

    /// Non-retryable failure
    #[error("fatal error [{context}]: {message}")]
    Fatal {
        /// Kube context (or component) where the failure occurred
        context: String,
        /// Description of what failed
        message: String,
    },

    /// Preflight validation failed
    #[error("validation error: {message}")]
    Validation {
        /// Summary of the failure
        message: String,
        /// Names of the critical checks that failed
        failed_checks: Vec<String>,
    },

    /// Run configuration is invalid
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of what's invalid
        message: String,
        /// The offending field (e.g., "cycles")
        field: Option<String>,
    },
}

impl Error {
    /// Create a transient error without context
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient {
            context: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a transient error for a kube context
    pub fn transient_for(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Transient {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Create a fatal error without context
    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal {
            context: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a fatal error for a kube context
    pub fn fatal_for(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fatal {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Create a validation error with no check names attached
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            failed_checks: Vec::new(),
        }
    }

    /// Create a validation error listing the critical checks that failed
    pub fn validation_with_checks(msg: impl Into<String>, failed_checks: Vec<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            failed_checks,
        }
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            field: None,
        }
    }

    /// Create a configuration error for a specific field
    pub fn configuration_for_field(field: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
            field: Some(field.into()),
        }
    }

    /// Classify a transport failure observed while running `operation` against `context`.
    pub fn from_transport(
        context: impl Into<String>,
        operation: &str,
        err: &TransportError,
    ) -> Self {
        let context = context.into();
        let message = format!("{} failed: {}", operation, err);
        if is_retryable(err) {
            Self::Transient { context, message }
        } else {
            Self::Fatal { context, message }
        }
    }

    /// The kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Transient { .. } => ErrorKind::Transient,
            Error::Fatal { .. } => ErrorKind::Fatal,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Whether the failed operation may succeed if attempted again
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
