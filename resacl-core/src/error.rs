//! Unified error handling system
//!
//! Provides structured error types with context, recovery suggestions, and proper error chaining

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::{error, warn};

pub type ResaclResult<T> = Result<T, ResaclError>;

/// Field-level validation messages, keyed by field name
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Error context providing additional information for debugging and recovery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Unique error ID for tracking
    pub error_id: String,
    /// Timestamp when error occurred
    pub timestamp: DateTime<Utc>,
    /// Component where error originated
    pub component: String,
    /// Operation being performed when error occurred
    pub operation: Option<String>,
    /// Additional metadata
    pub metadata: HashMap<String, String>,
    /// Recovery suggestions
    pub recovery_suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            component: component.to_string(),
            operation: None,
            metadata: HashMap::new(),
            recovery_suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: &str) -> Self {
        self.recovery_suggestions.push(suggestion.to_string());
        self
    }
}

/// Main error type for the resource ACL system
#[derive(Error, Debug)]
pub enum ResaclError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        errors: FieldErrors,
        context: ErrorContext,
    },

    #[error("Not found: {resource}")]
    NotFound {
        resource: String,
        context: ErrorContext,
    },

    #[error("Not authorized: {message}")]
    NotAuthorized {
        message: String,
        context: ErrorContext,
    },

    #[error("Storage error: {message}")]
    Storage {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
        context: ErrorContext,
    },
}

impl ResaclError {
    /// Build a validation error from collected field messages
    pub fn validation(errors: FieldErrors, component: &str) -> Self {
        let message = errors
            .iter()
            .map(|(field, messages)| format!("{}: {}", field, messages.join(", ")))
            .collect::<Vec<_>>()
            .join("; ");

        ResaclError::Validation {
            message,
            errors,
            context: ErrorContext::new(component)
                .with_suggestion("Check the field values against the allowed sets"),
        }
    }

    /// Get the error context
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            ResaclError::Validation { context, .. } => Some(context),
            ResaclError::NotFound { context, .. } => Some(context),
            ResaclError::NotAuthorized { context, .. } => Some(context),
            ResaclError::Storage { context, .. } => Some(context),
            ResaclError::Config { context, .. } => Some(context),
            ResaclError::Internal { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Field-level messages for validation errors
    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            ResaclError::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }

    /// HTTP-equivalent status code for transport layers
    pub fn status_code(&self) -> u16 {
        match self {
            ResaclError::Validation { .. } => 409,
            ResaclError::NotFound { .. } => 404,
            ResaclError::NotAuthorized { .. } => 403,
            _ => 500,
        }
    }

    /// Check if error is recoverable.
    ///
    /// Nothing in the core retries; this only tells callers whether a retry
    /// could ever succeed without changing the request.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ResaclError::Storage { .. } => true,
            ResaclError::Io(_) => true,
            ResaclError::Validation { .. } => false,
            ResaclError::NotFound { .. } => false,
            ResaclError::NotAuthorized { .. } => false,
            ResaclError::Config { .. } => false,
            _ => false,
        }
    }

    /// Log the error with appropriate level
    pub fn log(&self) {
        match self {
            ResaclError::Internal { .. } | ResaclError::Storage { .. } => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Internal or storage error occurred"
                );
            }
            ResaclError::Validation { .. }
            | ResaclError::NotFound { .. }
            | ResaclError::NotAuthorized { .. } => {
                warn!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Request rejected"
                );
            }
            _ => {
                error!(
                    error_id = ?self.context().map(|c| &c.error_id),
                    error = %self,
                    "Error occurred"
                );
            }
        }
    }
}

/// Convenience macros for creating errors with context
#[macro_export]
macro_rules! config_error {
    ($msg:expr, $component:expr) => {
        $crate::ResaclError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check your configuration file")
                .with_suggestion("Run 'resacl config --init' to create default config"),
        }
    };
}

#[macro_export]
macro_rules! validation_error {
    ($msg:expr, $field:expr, $component:expr) => {
        $crate::ResaclError::Validation {
            message: format!("{}: {}", $field, $msg),
            errors: ::std::iter::once(($field.to_string(), vec![$msg.to_string()])).collect(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Check the field value and format"),
        }
    };
}

#[macro_export]
macro_rules! not_found_error {
    ($resource:expr, $component:expr) => {
        $crate::ResaclError::NotFound {
            resource: $resource.to_string(),
            context: $crate::ErrorContext::new($component)
                .with_suggestion("Verify the identifier"),
        }
    };
}

#[macro_export]
macro_rules! not_authorized_error {
    ($msg:expr, $component:expr) => {
        $crate::ResaclError::NotAuthorized {
            message: $msg.to_string(),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $component:expr) => {
        $crate::ResaclError::Storage {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new($component),
        }
    };
    ($msg:expr, $component:expr, $source:expr) => {
        $crate::ResaclError::Storage {
            message: $msg.to_string(),
            source: Some(Box::new($source)),
            context: $crate::ErrorContext::new($component),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_lists_fields() {
        let mut errors = FieldErrors::new();
        errors.insert(
            "auth_type".to_string(),
            vec!["Invalid auth_type admin".to_string()],
        );
        errors.insert("auth_id".to_string(), vec!["Missing value".to_string()]);

        let error = ResaclError::validation(errors, "schema");
        let message = error.to_string();
        assert!(message.contains("auth_id: Missing value"));
        assert!(message.contains("auth_type: Invalid auth_type admin"));
        assert_eq!(error.field_errors().map(|e| e.len()), Some(2));
        assert_eq!(error.status_code(), 409);
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(not_found_error!("acl <x>", "test").status_code(), 404);
        assert_eq!(not_authorized_error!("nope", "test").status_code(), 403);
        assert_eq!(storage_error!("down", "test").status_code(), 500);
    }

    #[test]
    fn test_recoverability() {
        assert!(storage_error!("connection reset", "test").is_recoverable());
        assert!(!not_found_error!("acl <x>", "test").is_recoverable());
        assert!(!not_authorized_error!("nope", "test").is_recoverable());
    }
}
