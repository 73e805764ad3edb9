#![warn(missing_docs)]

//! Error types for the kinematics library.
//!
//! These are all usage errors: the motion integrator refuses degenerate
//! numeric input up front instead of propagating NaN through the pose.

use core::fmt;

/// Errors that can occur when setting up or driving the motion integrator.
#[derive(Debug, Clone, PartialEq)]
pub enum KinematicsError {
    /// Error for an invalid integration time step.
    /// This variant is returned when `dt` is zero, negative or not finite.
    InvalidTimeStep(&'static str),
    /// Error for an invalid number of integration substeps.
    /// This variant is returned when zero substeps are requested.
    InvalidSubsteps(&'static str),
    /// Error for a pose with a NaN or infinite component.
    NonFinitePose(&'static str),
}

impl fmt::Display for KinematicsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KinematicsError::InvalidTimeStep(msg) => write!(f, "Invalid time step: {}", msg),
            KinematicsError::InvalidSubsteps(msg) => write!(f, "Invalid substep count: {}", msg),
            KinematicsError::NonFinitePose(msg) => write!(f, "Non-finite pose: {}", msg),
        }
    }
}

impl core::error::Error for KinematicsError {}
