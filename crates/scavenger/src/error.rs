//! Application Error Types

use geofence::ValidationError;
use storage::StorageError;
use thiserror::Error;

/// Errors surfaced to the front end
#[derive(Debug, Error)]
pub enum AppError {
    /// No location fix has been received yet
    #[error("Current location unavailable")]
    LocationUnavailable,

    /// Selected list position does not exist
    #[error("No fence at position {index} (list has {len})")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid fence: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Logging setup failed: {0}")]
    Logging(String),
}
