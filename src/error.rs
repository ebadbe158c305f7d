//! Error types for partial volume correction
//!
//! Structural problems (bad parameters, malformed inputs, mismatched
//! geometry) abort a call and come back as [`PvcError`]. Numeric edge cases
//! that are expected in real images (empty regions, division by a blurred
//! background close to zero) are recovered locally and reported as
//! [`RecoveredCondition`] values instead.

use thiserror::Error;

/// Errors returned by the correction routines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PvcError {
    /// A configuration value is out of range (negative FWHM, zero iterations, ...)
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// An input buffer cannot be used as given
    #[error("invalid input `{operand}`: {reason}")]
    InvalidInput { operand: String, reason: String },

    /// Two operands that must share geometry do not
    #[error("shape mismatch for `{operand}` along axis {axis}: expected {expected}, found {found}")]
    ShapeMismatch {
        operand: String,
        axis: usize,
        expected: String,
        found: String,
    },
}

pub type Result<T> = std::result::Result<T, PvcError>;

impl PvcError {
    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        PvcError::InvalidParameter { name, reason: reason.into() }
    }

    pub(crate) fn input(operand: impl Into<String>, reason: impl Into<String>) -> Self {
        PvcError::InvalidInput {
            operand: operand.into(),
            reason: reason.into(),
        }
    }
}

/// Numeric conditions handled with a fallback value instead of an error
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveredCondition {
    /// Region mask with (near) zero total weight; its mean was taken as 0
    DegenerateRegion { region: usize },
    /// Voxels whose denominator fell below epsilon; their ratio was taken as 0
    NumericGuard { voxels: usize },
}
