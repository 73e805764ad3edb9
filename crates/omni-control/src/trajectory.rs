//! Reference trajectories for tracking.
//!
//! A [`Trajectory`] is a closed curve around a fixed center, traversed once
//! per `period` seconds. For any time `t` it yields the reference position
//! and its time derivative (the feedforward velocity). Heading and yaw-rate
//! references are always zero; only position is tracked.

use core::f64::consts::PI;
use core::fmt;
use core::str::FromStr;

use libm::{cos, sin};
use omni_kinematics::Pose;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::ControlError;

/// World-frame x of the trajectory center (m).
pub const CENTER_X: f64 = 10.0;
/// World-frame y of the trajectory center (m).
pub const CENTER_Y: f64 = 10.0;
/// Trajectory radius (m).
pub const RADIUS: f64 = 8.0;

/// Supported reference shapes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrajectoryShape {
    /// Circle of radius `r`, starting at `(cx + r, cy)` and running counter-clockwise.
    Circle,
    /// Figure-eight (Lissajous 1:2) through the center.
    #[default]
    #[cfg_attr(feature = "serde", serde(alias = "lemniscata"))]
    Lemniscate,
}

impl TrajectoryShape {
    fn profile(self) -> Profile {
        match self {
            TrajectoryShape::Circle => Profile {
                position: circle_position,
                velocity: circle_velocity,
            },
            TrajectoryShape::Lemniscate => Profile {
                position: lemniscate_position,
                velocity: lemniscate_velocity,
            },
        }
    }
}

impl FromStr for TrajectoryShape {
    type Err = ControlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            c if c.eq_ignore_ascii_case("circle") => Ok(TrajectoryShape::Circle),
            l if l.eq_ignore_ascii_case("lemniscate") || l.eq_ignore_ascii_case("lemniscata") => {
                Ok(TrajectoryShape::Lemniscate)
            }
            _ => Err(ControlError::UnknownShape("expected `circle` or `lemniscate`")),
        }
    }
}

impl fmt::Display for TrajectoryShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrajectoryShape::Circle => write!(f, "circle"),
            TrajectoryShape::Lemniscate => write!(f, "lemniscate"),
        }
    }
}

/// Offset of the curve from its center, and its derivative, at phase `ωt`.
type ShapeFn = fn(r: f64, w: f64, t: f64) -> (f64, f64);

#[derive(Clone, Copy)]
struct Profile {
    position: ShapeFn,
    velocity: ShapeFn,
}

fn circle_position(r: f64, w: f64, t: f64) -> (f64, f64) {
    (r * cos(w * t), r * sin(w * t))
}

fn circle_velocity(r: f64, w: f64, t: f64) -> (f64, f64) {
    (-r * w * sin(w * t), r * w * cos(w * t))
}

fn lemniscate_position(r: f64, w: f64, t: f64) -> (f64, f64) {
    (r * sin(w * t), 0.8 * r * sin(2.0 * w * t))
}

fn lemniscate_velocity(r: f64, w: f64, t: f64) -> (f64, f64) {
    (r * w * cos(w * t), 1.6 * r * w * cos(2.0 * w * t))
}

/// Desired pose and world-frame velocity at one instant.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ReferenceState {
    /// Desired pose; `theta` is always `0`.
    pub pose: Pose,
    /// Feedforward `[ẋ, ẏ, θ̇]` in the world frame; `θ̇` is always `0`.
    pub velocity: [f64; 3],
}

/// A configured reference trajectory.
///
/// The shape's position and derivative functions are resolved once in
/// [`Trajectory::configure`]; [`Trajectory::reference_at`] only evaluates them.
#[derive(Clone, Copy)]
pub struct Trajectory {
    shape: TrajectoryShape,
    period: f64,
    angular_rate: f64,
    profile: Profile,
}

impl Trajectory {
    /// Build a trajectory that completes one loop of `shape` every `period` seconds.
    ///
    /// # Errors
    ///
    /// Returns `Err(ControlError::InvalidPeriod)` if `period` is not a positive, finite number.
    pub fn configure(shape: TrajectoryShape, period: f64) -> Result<Self, ControlError> {
        if !period.is_finite() || period <= 0.0 {
            return Err(ControlError::InvalidPeriod("must be positive and finite"));
        }
        Ok(Trajectory {
            shape,
            period,
            angular_rate: 2.0 * PI / period,
            profile: shape.profile(),
        })
    }

    /// The configured shape.
    pub fn shape(&self) -> TrajectoryShape {
        self.shape
    }

    /// Seconds per loop.
    pub fn period(&self) -> f64 {
        self.period
    }

    /// `ω = 2π / period` (rad/s).
    pub fn angular_rate(&self) -> f64 {
        self.angular_rate
    }

    /// Reference at time `t` (s). `t` is not clamped; past one period the
    /// reference keeps cycling.
    pub fn reference_at(&self, t: f64) -> ReferenceState {
        let (ox, oy) = (self.profile.position)(RADIUS, self.angular_rate, t);
        let (dx, dy) = (self.profile.velocity)(RADIUS, self.angular_rate, t);
        ReferenceState {
            pose: Pose::new(CENTER_X + ox, CENTER_Y + oy, 0.0),
            velocity: [dx, dy, 0.0],
        }
    }

    /// Where the reference starts, `reference_at(0).pose`.
    pub fn start_pose(&self) -> Pose {
        self.reference_at(0.0).pose
    }

    /// `samples` evenly spaced `(x, y)` points covering one full loop,
    /// both endpoints included.
    pub fn path_points(&self, samples: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
        let step = if samples > 1 {
            self.period / (samples - 1) as f64
        } else {
            0.0
        };
        (0..samples).map(move |i| {
            let pose = self.reference_at(i as f64 * step).pose;
            (pose.x, pose.y)
        })
    }
}

impl fmt::Debug for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trajectory")
            .field("shape", &self.shape)
            .field("period", &self.period)
            .field("angular_rate", &self.angular_rate)
            .finish()
    }
}

impl fmt::Display for Trajectory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (center: ({:.1}, {:.1}), r: {:.1} m, period: {:.1} s)",
            self.shape, CENTER_X, CENTER_Y, RADIUS, self.period
        )
    }
}
