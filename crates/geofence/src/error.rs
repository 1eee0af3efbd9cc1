//! Validation Error Types

use thiserror::Error;

/// Errors raised when a fence record fails validation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Value out of allowed range
    #[error("{field} value {value} is out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    /// Value is NaN or infinite
    #[error("{field} must be a finite number")]
    NotFinite { field: &'static str },

    /// Radius must be strictly positive
    #[error("Radius must be positive, got {0}")]
    NonPositiveRadius(f32),

    /// Transition flags empty or carrying unknown bits
    #[error("Invalid transition type flags: {0:#x}")]
    InvalidTransition(i32),

    /// Negative sentinel other than never-expire, or a duration too long to store
    #[error("Invalid expiration duration: {0}")]
    InvalidExpiration(String),

    /// Missing required field
    #[error("Missing required field: {0}")]
    MissingField(&'static str),
}
