//! Error handling for the larp miner
//!
//! The scoring function itself is total and never fails. Errors only come
//! from the surrounding layers: configuration, input validation and the
//! mining workers.

use thiserror::Error;

/// Result type alias for miner operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the larp miner
#[derive(Error, Debug)]
pub enum Error {
    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Missing or rejected score parameters
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Worker errors
    #[error("Worker error: {worker_type}: {message}")]
    Worker { worker_type: String, message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create a worker error
    pub fn worker(worker_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Worker {
            worker_type: worker_type.into(),
            message: message.into(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            Error::Json(_) => "json",
            Error::Yaml(_) => "yaml",
            Error::Io(_) => "io",
            Error::Config { .. } => "config",
            Error::InvalidInput { .. } => "invalid_input",
            Error::Worker { .. } => "worker",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::worker("cpu", "thread panicked");
        assert_eq!(err.to_string(), "Worker error: cpu: thread panicked");

        let err = Error::invalid_input("Please fill all parameter fields.");
        assert_eq!(
            err.to_string(),
            "Invalid input: Please fill all parameter fields."
        );
    }

    #[test]
    fn test_error_category() {
        assert_eq!(Error::config("x").category(), "config");
        assert_eq!(Error::worker("cpu", "x").category(), "worker");

        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(Error::from(io).category(), "io");
    }
}
