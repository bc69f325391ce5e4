//! Error type for logger setup

/// Result alias for logger operations
pub type LogResult<T> = Result<T, LogError>;

/// Error raised while building or reloading the logger
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LogError {
    /// The filter directive string could not be parsed
    #[error("invalid filter: {0}")]
    Filter(String),

    /// Any other configuration problem
    #[error("configuration error: {0}")]
    Config(String),

    /// A global subscriber is already installed for this process
    #[error("a global subscriber has already been installed")]
    AlreadyInitialized,
}
