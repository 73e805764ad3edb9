#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
//! Motion controllers for a 3-wheel omnidirectional robot.
//!
//! Two closed-loop laws are provided, both built on the body-to-world
//! Jacobian [`Rotation`](omni_kinematics::Rotation):
//!
//! * [`regulation`]: drive the robot to a fixed goal pose, `v = Jᵀ·K·e`.
//! * [`tracking`]: follow a time-parameterised [`trajectory`] with
//!   feedforward plus proportional feedback, `v = Jᵀ·(ṗ_ref + K·e)`,
//!   optionally saturated.
//!
//! The controllers are pure functions of their inputs. Pose and clock live in
//! [`MotionState`](omni_kinematics::MotionState), owned by the caller.

use core::fmt;

use libm::sqrt;
use omni_kinematics::Pose;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub mod regulation;
pub mod tracking;
pub mod trajectory;

pub use error::ControlError;
pub use tracking::{SaturationLimits, TrackingController};
pub use trajectory::{ReferenceState, Trajectory, TrajectoryShape};

/// Upper bound applied by [`ControlGain::clamped`].
pub const MAX_GAIN: f64 = 1.0;

/// Proportional gain `kp`, applied uniformly as `K = kp·I₃`.
///
/// The controllers accept any value; callers taking user input should go
/// through [`ControlGain::clamped`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlGain(f64);

impl ControlGain {
    /// Wrap a raw gain without clamping.
    pub const fn new(kp: f64) -> Self {
        ControlGain(kp)
    }

    /// Wrap a gain, capping it at [`MAX_GAIN`].
    pub fn clamped(kp: f64) -> Self {
        ControlGain(kp.min(MAX_GAIN))
    }

    /// The scalar gain.
    pub const fn kp(&self) -> f64 {
        self.0
    }

    /// `K·e`.
    pub fn apply(&self, e: [f64; 3]) -> [f64; 3] {
        [self.0 * e[0], self.0 * e[1], self.0 * e[2]]
    }
}

impl Default for ControlGain {
    fn default() -> Self {
        ControlGain(0.4)
    }
}

impl fmt::Display for ControlGain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "kp = {:.3}", self.0)
    }
}

/// World-frame pose error `target − current`.
///
/// The heading component is a raw difference and is not wrapped into
/// `[-π, π)`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseError {
    /// x error (m).
    pub x: f64,
    /// y error (m).
    pub y: f64,
    /// Heading error (rad).
    pub theta: f64,
}

impl PoseError {
    /// No error.
    pub const ZERO: PoseError = PoseError { x: 0.0, y: 0.0, theta: 0.0 };

    /// Componentwise `target − current`.
    pub fn between(target: Pose, current: Pose) -> Self {
        PoseError {
            x: target.x - current.x,
            y: target.y - current.y,
            theta: target.theta - current.theta,
        }
    }

    /// Euclidean distance of the position part.
    pub fn position_norm(&self) -> f64 {
        sqrt(self.x * self.x + self.y * self.y)
    }

    /// The error as an `[x, y, θ]` column.
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.theta]
    }
}

impl fmt::Display for PoseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(ex: {:.3}, ey: {:.3}, eθ: {:.3})", self.x, self.y, self.theta)
    }
}
