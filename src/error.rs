// src/error.rs
use std::fmt;

/// Errors raised by the simulation engine
#[derive(Debug, Clone, PartialEq)]
pub enum McError {
    /// Numeric parameter outside its allowed range
    InvalidParameters {
        parameter: String,
        value: f64,
        constraint: String,
    },

    /// Non-numeric or structural configuration problem (unknown kind, bad enum, bad seed)
    InvalidConfiguration { field: String, reason: String },

    /// A batch produced a value outside the estimator's numeric domain
    NumericDomain { estimator: String, reason: String },

    /// `start` was requested while the runner already has an active run
    AlreadyRunning,

    /// A run that was required to finish stopped early
    Cancelled { iteration: u64 },
}

impl McError {
    /// True for errors raised before a run starts because of a bad parameter record
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            McError::InvalidParameters { .. } | McError::InvalidConfiguration { .. }
        )
    }

    /// Name of the offending field for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            McError::InvalidParameters { parameter, .. } => Some(parameter),
            McError::InvalidConfiguration { field, .. } => Some(field),
            _ => None,
        }
    }

    pub(crate) fn numeric(estimator: &str, reason: impl Into<String>) -> Self {
        McError::NumericDomain {
            estimator: estimator.to_string(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for McError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McError::InvalidParameters {
                parameter,
                value,
                constraint,
            } => {
                write!(
                    f,
                    "Invalid parameter '{}' = {}: {}",
                    parameter, value, constraint
                )
            }
            McError::InvalidConfiguration { field, reason } => {
                write!(f, "Invalid configuration for '{}': {}", field, reason)
            }
            McError::NumericDomain { estimator, reason } => {
                write!(f, "Numeric domain error in {}: {}", estimator, reason)
            }
            McError::AlreadyRunning => {
                write!(f, "A simulation is already running on this runner")
            }
            McError::Cancelled { iteration } => {
                write!(f, "Simulation cancelled at iteration {}", iteration)
            }
        }
    }
}

impl std::error::Error for McError {}

/// Result type alias for engine operations
pub type McResult<T> = Result<T, McError>;

/// Validation utilities
pub mod validation {
    use super::{McError, McResult};

    /// Validate that a parameter is positive
    pub fn validate_positive(name: &str, value: f64) -> McResult<()> {
        validate_finite(name, value)?;
        if value <= 0.0 {
            Err(McError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be positive (> 0)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter is within a closed range
    pub fn validate_range(name: &str, value: f64, min: f64, max: f64) -> McResult<()> {
        if !(min..=max).contains(&value) {
            Err(McError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: format!("must be in range [{}, {}]", min, max),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a parameter lies strictly between two bounds
    pub fn validate_open_range(name: &str, value: f64, min: f64, max: f64) -> McResult<()> {
        if !(value > min && value < max) {
            Err(McError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: format!("must be in range ({}, {})", min, max),
            })
        } else {
            Ok(())
        }
    }

    /// Validate a range whose lower end is exclusive, e.g. volatility in (0, 2]
    pub fn validate_left_open_range(name: &str, value: f64, min: f64, max: f64) -> McResult<()> {
        if !(value > min && value <= max) {
            Err(McError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: format!("must be in range ({}, {}]", min, max),
            })
        } else {
            Ok(())
        }
    }

    /// Validate that a value is finite and not NaN
    pub fn validate_finite(name: &str, value: f64) -> McResult<()> {
        if !value.is_finite() {
            Err(McError::InvalidParameters {
                parameter: name.to_string(),
                value,
                constraint: "must be finite (not NaN or infinite)".to_string(),
            })
        } else {
            Ok(())
        }
    }

    /// Validate an integer count against inclusive bounds
    pub fn validate_count(name: &str, value: u64, min: u64, max: u64) -> McResult<()> {
        if value < min || value > max {
            Err(McError::InvalidConfiguration {
                field: name.to_string(),
                reason: format!("must be between {} and {} (got {})", min, max, value),
            })
        } else {
            Ok(())
        }
    }
}
