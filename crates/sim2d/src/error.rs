//! Error types for the 2D solvers.
//!
//! Fatal conditions are returned as [`SimError`]. Pressure solves that miss
//! their tolerance are not errors; see [`crate::grid::pressure::ConvergenceWarning`].

use thiserror::Error;

/// Result type used throughout the crate.
pub type SimResult<T> = Result<T, SimError>;

/// Fatal simulation errors.
#[derive(Error, Debug)]
pub enum SimError {
    /// Invalid grid geometry, time step or solver parameter.
    #[error("invalid configuration: {field}: {reason}")]
    Configuration { field: &'static str, reason: String },

    /// Array access outside of its extent.
    #[error("index {index} out of range for size {size}")]
    OutOfRange { index: String, size: String },

    /// Broken internal invariant (programming error on the caller side).
    #[error("invariant violated in {context}: {details}")]
    InvariantViolation {
        context: &'static str,
        details: String,
    },

    /// Reading or writing a configuration file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SimError {
    pub fn configuration(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Configuration {
            field,
            reason: reason.into(),
        }
    }

    pub fn out_of_range(index: impl std::fmt::Debug, size: impl std::fmt::Debug) -> Self {
        Self::OutOfRange {
            index: format!("{:?}", index),
            size: format!("{:?}", size),
        }
    }

    pub fn invariant(context: &'static str, details: impl Into<String>) -> Self {
        Self::InvariantViolation {
            context,
            details: details.into(),
        }
    }

    /// True for errors caused by invalid configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }
}
