//! This module defines the error types used by the `omni-control` crate.

#![warn(missing_docs)]

/// Error type for controller and trajectory setup.
///
/// Controllers themselves are infallible once built; everything here is a
/// degenerate parameter caught at construction time.
#[derive(Debug, Clone, PartialEq)]
pub enum ControlError {
    /// Error for an invalid trajectory period.
    /// This variant is returned when the period is zero, negative or not finite.
    InvalidPeriod(&'static str),
    /// Error for an invalid saturation limit.
    /// This variant is returned when a velocity limit is zero, negative or NaN.
    InvalidSaturationLimit(&'static str),
    /// Error for an unrecognised trajectory shape name.
    UnknownShape(&'static str),
}

impl core::fmt::Display for ControlError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ControlError::InvalidPeriod(msg) => write!(f, "Invalid trajectory period: {}", msg),
            ControlError::InvalidSaturationLimit(msg) => {
                write!(f, "Invalid saturation limit: {}", msg)
            }
            ControlError::UnknownShape(msg) => write!(f, "Unknown trajectory shape: {}", msg),
        }
    }
}

impl core::error::Error for ControlError {}
