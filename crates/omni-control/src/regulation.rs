//! Pose regulation: drive the robot from its current pose to a fixed goal.
//!
//! With `e = goal − current` in world coordinates and `K = kp·I₃`, the
//! command is `v = pinv(J(θ))·K·e = Jᵀ(θ)·K·e`. Each component of the error
//! then decays like `exp(−kp·t)`.

use omni_kinematics::{BodyVelocity, Pose, Rotation};

use crate::{ControlGain, PoseError};

/// Body-frame command that moves `current_pose` toward `goal_pose`.
///
/// Stateless; call once per tick with the latest pose.
pub fn compute_velocity(current_pose: Pose, goal_pose: Pose, gain: ControlGain) -> BodyVelocity {
    let error = PoseError::between(goal_pose, current_pose);
    Rotation::from_heading(current_pose.theta).world_to_body(gain.apply(error.to_array()))
}

/// A goal pose bundled with the gain used to reach it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PoseRegulator {
    goal: Pose,
    gain: ControlGain,
}

impl PoseRegulator {
    /// Regulate toward `goal` with gain `gain`.
    pub const fn new(goal: Pose, gain: ControlGain) -> Self {
        PoseRegulator { goal, gain }
    }

    /// The goal pose.
    pub fn goal(&self) -> Pose {
        self.goal
    }

    /// The proportional gain.
    pub fn gain(&self) -> ControlGain {
        self.gain
    }

    /// See [`compute_velocity`].
    pub fn compute_velocity(&self, current_pose: Pose) -> BodyVelocity {
        compute_velocity(current_pose, self.goal, self.gain)
    }

    /// Error between the goal and `current_pose`.
    pub fn error(&self, current_pose: Pose) -> PoseError {
        PoseError::between(self.goal, current_pose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::PI;
    use omni_kinematics::MotionState;
    const EPSILON: f64 = 1e-9;

    #[test]
    fn test_zero_error_zero_command() {
        let pose = Pose::new(3.0, -1.0, 0.7);
        let v = compute_velocity(pose, pose, ControlGain::new(0.4));
        assert_eq!(v, BodyVelocity::ZERO);
    }

    #[test]
    fn test_aligned_heading_is_scaled_error() {
        let v = compute_velocity(Pose::new(0.0, 0.0, 0.0), Pose::new(5.0, 5.0, 0.0), ControlGain::new(0.4));
        assert!((v.vx - 2.0).abs() < EPSILON);
        assert!((v.vy - 2.0).abs() < EPSILON);
        assert!(v.w.abs() < EPSILON);
    }

    #[test]
    fn test_error_resolved_into_body_frame() {
        // Robot faces +y, goal is straight ahead in world +y: body forward.
        let v = compute_velocity(Pose::new(0.0, 0.0, PI / 2.0), Pose::new(0.0, 2.0, PI / 2.0), ControlGain::new(0.5));
        assert!((v.vx - 1.0).abs() < EPSILON);
        assert!(v.vy.abs() < EPSILON);
        assert!(v.w.abs() < EPSILON);

        // Goal at world +x is to the robot's right.
        let v = compute_velocity(Pose::new(0.0, 0.0, PI / 2.0), Pose::new(2.0, 0.0, PI / 2.0), ControlGain::new(0.5));
        assert!(v.vx.abs() < EPSILON);
        assert!((v.vy - (-1.0)).abs() < EPSILON);
    }

    #[test]
    fn test_heading_error_not_wrapped() {
        // 350° of raw error is commanded the long way round.
        let current = Pose::from_degrees(0.0, 0.0, 5.0);
        let goal = Pose::from_degrees(0.0, 0.0, 355.0);
        let v = compute_velocity(current, goal, ControlGain::new(1.0));
        assert!((v.w - 350.0_f64.to_radians()).abs() < EPSILON);
    }

    #[test]
    fn test_gain_not_clamped_here() {
        let v = compute_velocity(Pose::default(), Pose::new(1.0, 0.0, 0.0), ControlGain::new(3.0));
        assert!((v.vx - 3.0).abs() < EPSILON);
    }

    #[test]
    fn test_regulation_converges() {
        let regulator = PoseRegulator::new(Pose::new(5.0, 5.0, 0.0), ControlGain::new(0.4));
        let mut state = MotionState::new(Pose::new(0.0, 0.0, 0.0), 0.1).unwrap();
        let mut previous = regulator.error(state.pose()).position_norm();
        let mut converged_at = None;
        for tick in 0..500 {
            state.step(regulator.compute_velocity(state.pose()));
            let distance = regulator.error(state.pose()).position_norm();
            assert!(distance <= previous + EPSILON, "diverged at tick {}", tick);
            previous = distance;
            if distance < 0.05 && converged_at.is_none() {
                converged_at = Some(tick);
            }
        }
        assert!(converged_at.is_some());
        assert!(previous < 1e-6);
    }

    #[test]
    fn test_regulation_converges_with_heading_change() {
        let regulator = PoseRegulator::new(Pose::new(-2.0, 4.0, 1.5), ControlGain::new(0.8));
        let mut state = MotionState::new(Pose::new(1.0, 1.0, -0.5), 0.1).unwrap();
        for _ in 0..400 {
            state.step(regulator.compute_velocity(state.pose()));
        }
        let e = regulator.error(state.pose());
        assert!(e.position_norm() < 1e-3);
        assert!(e.theta.abs() < 1e-3);
    }
}
