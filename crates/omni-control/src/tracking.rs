//! Trajectory tracking with feedforward and proportional feedback.
//!
//! ```text
//! v = Jᵀ(θ)·(ṗ_ref + K·(p_ref − p))
//! ```
//!
//! The reference heading is always zero, so the feedback term also turns the
//! robot back toward `θ = 0` while it follows the path.

use core::fmt;

use omni_kinematics::{BodyVelocity, Pose, Rotation};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{ControlError, ControlGain, PoseError, ReferenceState};

/// Per-component actuator limits. Each command component is clamped to
/// `[-limit, +limit]`.
///
/// Deserialization goes through [`SaturationLimits::new`], so a
/// deserialized value is always valid.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "UncheckedLimits"))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SaturationLimits {
    vx_max: f64,
    vy_max: f64,
    w_max: f64,
}

/// Wire form of [`SaturationLimits`] before validation.
#[cfg(feature = "serde")]
#[derive(Deserialize)]
struct UncheckedLimits {
    vx_max: f64,
    vy_max: f64,
    w_max: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<UncheckedLimits> for SaturationLimits {
    type Error = ControlError;

    fn try_from(raw: UncheckedLimits) -> Result<Self, Self::Error> {
        SaturationLimits::new(raw.vx_max, raw.vy_max, raw.w_max)
    }
}

impl SaturationLimits {
    /// Build a set of limits.
    ///
    /// # Errors
    ///
    /// Returns `Err(ControlError::InvalidSaturationLimit)` if any limit is not strictly positive.
    pub fn new(vx_max: f64, vy_max: f64, w_max: f64) -> Result<Self, ControlError> {
        // `!(x > 0.0)` also catches NaN.
        if !(vx_max > 0.0) || !(vy_max > 0.0) || !(w_max > 0.0) {
            return Err(ControlError::InvalidSaturationLimit("limits must be positive"));
        }
        Ok(SaturationLimits { vx_max, vy_max, w_max })
    }

    /// Maximum |vx| (m/s).
    pub fn vx_max(&self) -> f64 {
        self.vx_max
    }

    /// Maximum |vy| (m/s).
    pub fn vy_max(&self) -> f64 {
        self.vy_max
    }

    /// Maximum |w| (rad/s).
    pub fn w_max(&self) -> f64 {
        self.w_max
    }

    /// Clamp each component independently.
    pub fn apply(&self, v: BodyVelocity) -> BodyVelocity {
        BodyVelocity::new(
            v.vx.clamp(-self.vx_max, self.vx_max),
            v.vy.clamp(-self.vy_max, self.vy_max),
            v.w.clamp(-self.w_max, self.w_max),
        )
    }
}

impl fmt::Display for SaturationLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(|vx| ≤ {:.2} m/s, |vy| ≤ {:.2} m/s, |ω| ≤ {:.2} rad/s)",
            self.vx_max, self.vy_max, self.w_max
        )
    }
}

/// Unsaturated tracking law for a single tick.
pub fn compute_velocity(current_pose: Pose, reference: &ReferenceState, gain: ControlGain) -> BodyVelocity {
    let feedback = gain.apply(PoseError::between(reference.pose, current_pose).to_array());
    let world = [
        reference.velocity[0] + feedback[0],
        reference.velocity[1] + feedback[1],
        reference.velocity[2] + feedback[2],
    ];
    Rotation::from_heading(current_pose.theta).world_to_body(world)
}

/// Tracking law plus optional saturation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingController {
    gain: ControlGain,
    saturation: Option<SaturationLimits>,
}

impl TrackingController {
    /// A controller with gain `gain` and no saturation.
    pub const fn new(gain: ControlGain) -> Self {
        TrackingController { gain, saturation: None }
    }

    /// Clamp every command to `limits`.
    pub const fn with_saturation(mut self, limits: SaturationLimits) -> Self {
        self.saturation = Some(limits);
        self
    }

    /// The proportional gain.
    pub fn gain(&self) -> ControlGain {
        self.gain
    }

    /// The configured limits, if any.
    pub fn saturation(&self) -> Option<SaturationLimits> {
        self.saturation
    }

    /// Command for `current_pose` against `reference`, saturated if limits are set.
    pub fn compute_velocity(&self, current_pose: Pose, reference: &ReferenceState) -> BodyVelocity {
        let command = compute_velocity(current_pose, reference, self.gain);
        match self.saturation {
            Some(limits) => limits.apply(command),
            None => command,
        }
    }
}
