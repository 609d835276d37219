//! Error types for the simulation core.
//!
//! Simulation operations themselves never fail: stale ids, depleted nodes
//! and failed placements are silent no-ops. Errors only surface from loading
//! and validating configuration.

use thiserror::Error;

/// Result type alias using [`SimError`].
pub type Result<T> = std::result::Result<T, SimError>;

/// Top-level error type for the simulation core.
#[derive(Debug, Error)]
pub enum SimError {
    /// Configuration text could not be parsed.
    #[error("Failed to parse simulation config: {0}")]
    ConfigParse(#[from] ron::error::SpannedError),

    /// A parameter is outside its valid range.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Dotted path of the offending parameter.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },
}

impl SimError {
    /// Shorthand for [`SimError::InvalidParameter`].
    pub fn invalid(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }
}
