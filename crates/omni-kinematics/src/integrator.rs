//! Motion integrator for an omnidirectional base.
//!
//! [`MotionState`] owns the robot pose and the simulation clock. Each call to
//! [`MotionState::step`] integrates
//!
//! ```text
//! ẋ = vx·cos θ − vy·sin θ
//! ẏ = vx·sin θ + vy·cos θ
//! θ̇ = w
//! ```
//!
//! over one time step with classic fourth-order Runge–Kutta. The step is split
//! into a fixed number of substeps so large `dt` values with fast rotation
//! still track the curved path.

use core::fmt;

use crate::{BodyVelocity, KinematicsError, Pose, Rotation};

/// RK4 substeps per `dt` unless overridden with [`MotionState::with_substeps`].
pub const DEFAULT_SUBSTEPS: u32 = 4;

/// Pose and clock of a running simulation.
///
/// `MotionState` is the only writer of the pose. The elapsed time is derived
/// from a tick counter, so it is always an exact multiple of `dt`.
#[derive(Debug, Clone, PartialEq)]
pub struct MotionState {
    pose: Pose,
    dt: f64,
    ticks: u64,
    substeps: u32,
}

impl MotionState {
    /// Start a new run at `initial_pose` with time step `dt` (s).
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidTimeStep)` if `dt` is not a positive, finite number.
    /// Returns `Err(KinematicsError::NonFinitePose)` if any pose component is NaN or infinite.
    pub fn new(initial_pose: Pose, dt: f64) -> Result<Self, KinematicsError> {
        validate(initial_pose, dt)?;
        Ok(MotionState {
            pose: initial_pose,
            dt,
            ticks: 0,
            substeps: DEFAULT_SUBSTEPS,
        })
    }

    /// Override the number of RK4 substeps taken per `dt`.
    ///
    /// # Errors
    ///
    /// Returns `Err(KinematicsError::InvalidSubsteps)` if `substeps` is zero.
    pub fn with_substeps(mut self, substeps: u32) -> Result<Self, KinematicsError> {
        if substeps == 0 {
            return Err(KinematicsError::InvalidSubsteps("must be at least one"));
        }
        self.substeps = substeps;
        Ok(self)
    }

    /// Re-initialize in place: new pose, new `dt`, clock back to zero.
    ///
    /// On error the state is left untouched.
    pub fn initialize(&mut self, initial_pose: Pose, dt: f64) -> Result<(), KinematicsError> {
        validate(initial_pose, dt)?;
        self.pose = initial_pose;
        self.dt = dt;
        self.ticks = 0;
        Ok(())
    }

    /// Current pose.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    /// Configured time step (s).
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Number of steps taken since the last initialize or reset.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated time since the last initialize or reset (s).
    pub fn time_elapsed(&self) -> f64 {
        self.ticks as f64 * self.dt
    }

    /// Zero the clock. The pose and `dt` are kept, so the next step continues
    /// from wherever the robot currently is.
    pub fn reset(&mut self) {
        self.ticks = 0;
    }

    /// Hold `velocity` constant for one `dt` and advance the pose.
    ///
    /// Returns the new pose.
    pub fn step(&mut self, velocity: BodyVelocity) -> Pose {
        let h = self.dt / self.substeps as f64;
        let mut state = self.pose.to_array();
        for _ in 0..self.substeps {
            state = rk4(state, velocity, h);
        }
        self.pose = Pose::from_array(state);
        self.ticks += 1;
        self.pose
    }
}

impl fmt::Display for MotionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MotionState (pose: {}, t: {:.2} s, dt: {:.3} s)", self.pose, self.time_elapsed(), self.dt)
    }
}

fn validate(pose: Pose, dt: f64) -> Result<(), KinematicsError> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(KinematicsError::InvalidTimeStep("must be positive and finite"));
    }
    if !pose.is_finite() {
        return Err(KinematicsError::NonFinitePose("all components must be finite"));
    }
    Ok(())
}

/// World-frame rates for a body command at the given state.
fn pose_rate(state: [f64; 3], velocity: BodyVelocity) -> [f64; 3] {
    Rotation::from_heading(state[2]).body_to_world(velocity)
}

fn rk4(s: [f64; 3], velocity: BodyVelocity, h: f64) -> [f64; 3] {
    let add_scaled = |k: [f64; 3], scale: f64| -> [f64; 3] {
        [s[0] + scale * k[0], s[1] + scale * k[1], s[2] + scale * k[2]]
    };

    let k1 = pose_rate(s, velocity);
    let k2 = pose_rate(add_scaled(k1, 0.5 * h), velocity);
    let k3 = pose_rate(add_scaled(k2, 0.5 * h), velocity);
    let k4 = pose_rate(add_scaled(k3, h), velocity);

    let mut next = s;
    for i in 0..3 {
        next[i] += (h / 6.0) * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
    }
    next
}
