use thiserror::Error;

/// Failure modes of an external sensor or actuator.
///
/// `Unavailable` is fatal to the owning subsystem: the source could not be
/// opened (or died irrecoverably) and the subsystem degrades to disabled.
/// `Transient` covers a single failed read; producers retry it with backoff
/// and never surface it to consumers.
#[derive(Debug, Clone, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error("transient read failure: {0}")]
    Transient(String),
}

impl SourceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Transient(_))
    }
}

/// Configuration loading and validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Load(#[from] config::ConfigError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
