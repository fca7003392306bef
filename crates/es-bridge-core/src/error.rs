//! Error types for the ES event bridge
//!
//! Uses `thiserror` for ergonomic error handling with full context preservation.
//! Normalization never produces an error: payloads that cannot be persisted
//! are reported as [`SkipReason`](crate::normalize::SkipReason) instead.

use std::fmt;
use thiserror::Error;

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Primary error type for all bridge operations
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Elasticsearch connection or request errors
    #[error("Elasticsearch error: {message}")]
    Elasticsearch {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Document serialization/deserialization errors
    #[error("Serialization error: {message}")]
    Serialization {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl BridgeError {
    /// Create an Elasticsearch error
    pub fn elasticsearch(message: impl Into<String>) -> Self {
        Self::Elasticsearch {
            message: message.into(),
            source: None,
        }
    }

    /// Create an Elasticsearch error with source
    pub fn elasticsearch_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Elasticsearch {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Short label used for metrics and logs
    pub fn kind_label(&self) -> &'static str {
        match self {
            Self::Elasticsearch { .. } => "elasticsearch",
            Self::Serialization { .. } => "serialization",
            Self::Configuration { .. } => "configuration",
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
            source: Some(Box::new(err)),
        }
    }
}

impl From<config::ConfigError> for BridgeError {
    fn from(err: config::ConfigError) -> Self {
        Self::config(err.to_string())
    }
}

/// Error context for submission failure reports
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub component: &'static str,
    pub operation: String,
    pub document_id: Option<String>,
    pub index: Option<String>,
}

impl ErrorContext {
    pub fn new(component: &'static str, operation: impl Into<String>) -> Self {
        Self {
            component,
            operation: operation.into(),
            document_id: None,
            index: None,
        }
    }

    pub fn with_index(mut self, index: impl Into<String>) -> Self {
        self.index = Some(index.into());
        self
    }

    pub fn with_document_id(mut self, id: Option<impl Into<String>>) -> Self {
        self.document_id = id.map(Into::into);
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}::{}]", self.component, self.operation)?;
        if let Some(ref id) = self.document_id {
            write!(f, " doc={}", id)?;
        }
        if let Some(ref idx) = self.index {
            write!(f, " index={}", idx)?;
        }
        Ok(())
    }
}

/// Extension trait for reporting errors with context
pub trait ErrorContextExt<T> {
    /// Log the error with its context at `warn` and pass it through
    fn with_context(self, ctx: &ErrorContext) -> Result<T>;
}

impl<T> ErrorContextExt<T> for Result<T> {
    fn with_context(self, ctx: &ErrorContext) -> Result<T> {
        self.map_err(|e| {
            tracing::warn!(
                error = %e,
                component = ctx.component,
                operation = %ctx.operation,
                document_id = ?ctx.document_id,
                index = ?ctx.index,
                "Operation failed"
            );
            e
        })
    }
}
