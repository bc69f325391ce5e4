//! Configuration error types

use std::time::Duration;
use thiserror::Error;

/// Configuration error type
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// One or more `${NAME}` placeholders had neither a value nor a default
    #[error("unresolved environment variables: {}", names.join(", "))]
    UnresolvedVariable {
        /// Every unresolved name, in first-occurrence order
        names: Vec<String>,
    },

    /// Content could not be decoded by a parser
    #[error("failed to decode {format} content: {message}")]
    Decode {
        /// Parser format name
        format: String,
        /// Underlying parse failure
        message: String,
    },

    /// A mapping could not be encoded by a parser
    #[error("failed to encode {format} content: {message}")]
    Encode {
        /// Parser format name
        format: String,
        /// Underlying serialization failure
        message: String,
    },

    /// A provider failed to read its backend
    #[error("failed to fetch configuration from {provider}: {message}")]
    Fetch {
        /// Provider name
        provider: String,
        /// Underlying I/O failure
        message: String,
    },

    /// A provider was asked for an operation it does not implement
    #[error("{provider} does not support {operation}")]
    UnsupportedOperation {
        /// Concrete provider type
        provider: String,
        /// Operation that was requested
        operation: String,
    },

    /// `watch()` was invoked a second time on the same provider
    #[error("{provider} is already watching; watch may only be invoked once")]
    WatchAlreadyActive {
        /// Provider name
        provider: String,
    },

    /// The backend rejected the watch subscription
    #[error("failed to activate watch on {provider}: {message}")]
    WatchActivationFailed {
        /// Provider name
        provider: String,
        /// Reason reported by the backend
        message: String,
    },

    /// The initial synchronization of a watch did not finish in time
    #[error("timed out after {timeout:?} waiting for {provider} to sync")]
    CacheSyncTimeout {
        /// Provider name
        provider: String,
        /// Deadline that was exceeded
        timeout: Duration,
    },

    /// The watched resource was deleted
    #[error("{resource} watched by {provider} was removed")]
    SourceRemoved {
        /// Provider name
        provider: String,
        /// Resource that disappeared (path, key, ...)
        resource: String,
    },

    /// A backend reported a failure while delivering notifications
    #[error("watch error from {provider}: {message}")]
    Watch {
        /// Provider name
        provider: String,
        /// Backend failure
        message: String,
    },

    /// A key path could not be resolved in the snapshot
    #[error("configuration path error at '{path}': {message}")]
    Path {
        /// Description of what went wrong
        message: String,
        /// Full path that was requested
        path: String,
    },

    /// A value could not be converted into the requested type
    #[error("configuration type error: {message} (expected {expected})")]
    Type {
        /// Conversion failure
        message: String,
        /// Requested type
        expected: String,
    },
}

impl ConfigError {
    /// Create an unresolved variable error
    pub fn unresolved(names: Vec<String>) -> Self {
        Self::UnresolvedVariable { names }
    }

    /// Create a decode error
    pub fn decode(format: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            format: format.into(),
            message: message.to_string(),
        }
    }

    /// Create an encode error
    pub fn encode(format: impl Into<String>, message: impl ToString) -> Self {
        Self::Encode {
            format: format.into(),
            message: message.to_string(),
        }
    }

    /// Create a fetch error
    pub fn fetch(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Fetch {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Create an unsupported operation error
    pub fn unsupported(provider: impl Into<String>, operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation {
            provider: provider.into(),
            operation: operation.into(),
        }
    }

    /// Create an already-watching error
    pub fn already_watching(provider: impl Into<String>) -> Self {
        Self::WatchAlreadyActive {
            provider: provider.into(),
        }
    }

    /// Create a watch activation error
    pub fn activation_failed(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::WatchActivationFailed {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Create a sync timeout error
    pub fn sync_timeout(provider: impl Into<String>, timeout: Duration) -> Self {
        Self::CacheSyncTimeout {
            provider: provider.into(),
            timeout,
        }
    }

    /// Create a source removed error
    pub fn removed(provider: impl Into<String>, resource: impl Into<String>) -> Self {
        Self::SourceRemoved {
            provider: provider.into(),
            resource: resource.into(),
        }
    }

    /// Create a runtime watch error
    pub fn watch(provider: impl Into<String>, message: impl ToString) -> Self {
        Self::Watch {
            provider: provider.into(),
            message: message.to_string(),
        }
    }

    /// Create a path error
    pub fn path_error(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Path {
            message: message.into(),
            path: path.into(),
        }
    }

    /// Create a type error
    pub fn type_error(message: impl ToString, expected: impl Into<String>) -> Self {
        Self::Type {
            message: message.to_string(),
            expected: expected.into(),
        }
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnresolvedVariable { .. } => ErrorCategory::Substitution,
            Self::Decode { .. } | Self::Encode { .. } => ErrorCategory::Parse,
            Self::Fetch { .. } | Self::UnsupportedOperation { .. } => ErrorCategory::Io,
            Self::WatchAlreadyActive { .. }
            | Self::WatchActivationFailed { .. }
            | Self::CacheSyncTimeout { .. }
            | Self::SourceRemoved { .. }
            | Self::Watch { .. } => ErrorCategory::Watch,
            Self::Path { .. } | Self::Type { .. } => ErrorCategory::Access,
        }
    }

    /// Whether the error reports that a watched resource disappeared
    pub fn is_removal(&self) -> bool {
        matches!(self, Self::SourceRemoved { .. })
    }
}

/// Error category for grouping errors
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Placeholder resolution
    Substitution,
    /// Decoding or encoding
    Parse,
    /// Provider reads
    Io,
    /// Watch lifecycle and notifications
    Watch,
    /// Reading values out of a snapshot
    Access,
}
