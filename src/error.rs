//! Error types for formbind.
//!
//! Operation outcomes (`unavailable`, `validation_fault`) are not errors:
//! they travel in [`GetResult`](crate::binding::GetResult) and
//! [`SetResult`](crate::binding::SetResult). The types here cover the
//! failures that sit outside that taxonomy.

use std::fmt;

use thiserror::Error;

/// Which way a value was being converted when a transform failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Outer value to inner value.
    Forward,
    /// Inner value back to outer value.
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

/// Errors raised by formbind.
#[derive(Debug, Error)]
pub enum BindingError {
    /// A transform conversion function failed.
    #[error("{direction} conversion failed for '{field}': {source}")]
    Conversion {
        direction: Direction,
        field: String,
        #[source]
        source: anyhow::Error,
    },

    /// Invalid engine configuration.
    #[error("invalid configuration: {message}")]
    Config { message: String },

    /// Configuration JSON could not be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl BindingError {
    /// Build a [`BindingError::Conversion`].
    pub fn conversion(direction: Direction, field: impl Into<String>, source: anyhow::Error) -> Self {
        Self::Conversion {
            direction,
            field: field.into(),
            source,
        }
    }

    /// Build a [`BindingError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// Result alias for fallible formbind operations.
pub type Result<T> = std::result::Result<T, BindingError>;
