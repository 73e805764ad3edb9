#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![doc = "A `no_std` library for 2D omnidirectional robot kinematics."]
#![doc = ""]
#![doc = "This crate provides the robot pose and body-velocity types, the body-to-world"]
#![doc = "rotation used by the controllers, and a motion integrator that advances a pose"]
#![doc = "under a body-frame velocity command."]

use core::fmt;
use libm::{cos, fabs, sin};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub mod error;
pub mod integrator;

pub use error::KinematicsError;
pub use integrator::MotionState;

/// A 2‑D pose `(x, y, θ)` in meters and radians (θ measured counter‑clockwise
/// from the x‑axis in the world frame).
///
/// The heading is never wrapped: a robot that spins twice reports `θ ≈ 4π`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Pose {
    /// World‑frame x position (m).
    pub x: f64,
    /// World‑frame y position (m).
    pub y: f64,
    /// Heading (rad), unbounded.
    pub theta: f64,
}

impl Pose {
    /// Construct a new pose.
    ///
    /// # Arguments
    ///
    /// * `x`: World-frame x position in meters.
    /// * `y`: World-frame y position in meters.
    /// * `theta`: Heading in radians.
    pub const fn new(x: f64, y: f64, theta: f64) -> Self {
        Pose { x, y, theta }
    }

    /// Construct a pose whose heading is given in degrees.
    pub fn from_degrees(x: f64, y: f64, heading_deg: f64) -> Self {
        Pose::new(x, y, heading_deg.to_radians())
    }

    /// The pose as an `[x, y, θ]` column.
    pub const fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.theta]
    }

    /// Build a pose from an `[x, y, θ]` column.
    pub const fn from_array(a: [f64; 3]) -> Self {
        Pose::new(a[0], a[1], a[2])
    }

    /// Returns `true` if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.theta.is_finite()
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(x: {:.2}, y: {:.2}, θ: {:.2} rad)", self.x, self.y, self.theta)
    }
}

/// A velocity command for an omnidirectional base.
///
/// `vx` and `vy` are expressed in the robot's body frame (forward and
/// lateral axes); `w` is the yaw rate, which is the same in every frame.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BodyVelocity {
    /// Forward velocity (m/s) in the robot's body frame.
    pub vx: f64,
    /// Lateral velocity (m/s) in the robot's body frame.
    pub vy: f64,
    /// Angular velocity (rad/s).
    pub w: f64,
}

impl BodyVelocity {
    /// A velocity command that holds the robot still.
    pub const ZERO: BodyVelocity = BodyVelocity::new(0.0, 0.0, 0.0);

    /// Construct a new body velocity.
    ///
    /// # Arguments
    ///
    /// * `vx`: Velocity along the robot's forward axis (m/s).
    /// * `vy`: Velocity along the robot's lateral axis (m/s).
    /// * `w`: Angular velocity around the vertical axis (rad/s).
    pub const fn new(vx: f64, vy: f64, w: f64) -> Self {
        BodyVelocity { vx, vy, w }
    }

    /// The command as a `[vx, vy, w]` column.
    pub const fn to_array(self) -> [f64; 3] {
        [self.vx, self.vy, self.w]
    }

    /// Build a command from a `[vx, vy, w]` column.
    pub const fn from_array(a: [f64; 3]) -> Self {
        BodyVelocity::new(a[0], a[1], a[2])
    }
}

impl fmt::Display for BodyVelocity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(vx: {:.2} m/s, vy: {:.2} m/s, ω: {:.2} rad/s)", self.vx, self.vy, self.w)
    }
}

/// A 3×3 matrix stored row-major.
pub type Matrix3 = [[f64; 3]; 3];

/// The body‑to‑world Jacobian `J(θ)` of an omnidirectional base.
///
/// ```text
///        | cos θ  -sin θ  0 |
/// J(θ) = | sin θ   cos θ  0 |
///        |   0       0    1 |
/// ```
///
/// `J(θ)` is orthonormal for every θ, so `pinv(J) = J⁻¹ = Jᵀ`. The controllers
/// rely on this and map world-frame velocities back into the body frame with
/// [`Rotation::world_to_body`], which applies the transpose directly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    cos: f64,
    sin: f64,
}

impl Rotation {
    /// Build the Jacobian for heading `theta` (rad).
    pub fn from_heading(theta: f64) -> Self {
        Rotation {
            cos: cos(theta),
            sin: sin(theta),
        }
    }

    /// The full 3×3 matrix `J(θ)`.
    pub fn matrix(&self) -> Matrix3 {
        [
            [self.cos, -self.sin, 0.0],
            [self.sin, self.cos, 0.0],
            [0.0, 0.0, 1.0],
        ]
    }

    /// The transpose `Jᵀ(θ)`, which is also the inverse.
    pub fn transpose(&self) -> Matrix3 {
        transpose(self.matrix())
    }

    /// The Moore–Penrose pseudo-inverse computed the general way,
    /// `(JᵀJ)⁻¹Jᵀ`.
    ///
    /// Only used to check the transpose shortcut; returns `None` if `JᵀJ`
    /// is numerically singular.
    pub fn pseudo_inverse(&self) -> Option<Matrix3> {
        let j = self.matrix();
        let jt = transpose(j);
        let jtj_inv = invert(mat_mul(jt, j))?;
        Some(mat_mul(jtj_inv, jt))
    }

    /// Map a body-frame command into world-frame rates `[ẋ, ẏ, θ̇]`.
    pub fn body_to_world(&self, v: BodyVelocity) -> [f64; 3] {
        [
            v.vx * self.cos - v.vy * self.sin,
            v.vx * self.sin + v.vy * self.cos,
            v.w,
        ]
    }

    /// Map world-frame rates `[ẋ, ẏ, θ̇]` into a body-frame command, `Jᵀ·v`.
    pub fn world_to_body(&self, v: [f64; 3]) -> BodyVelocity {
        BodyVelocity::new(
            self.cos * v[0] + self.sin * v[1],
            -self.sin * v[0] + self.cos * v[1],
            v[2],
        )
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rotation (cos: {:.3}, sin: {:.3})", self.cos, self.sin)
    }
}

fn transpose(m: Matrix3) -> Matrix3 {
    let mut t = [[0.0; 3]; 3];
    for (i, row) in m.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            t[j][i] = *value;
        }
    }
    t
}

fn mat_mul(a: Matrix3, b: Matrix3) -> Matrix3 {
    let mut out = [[0.0; 3]; 3];
    for i in 0..3 {
        for j in 0..3 {
            out[i][j] = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

/// Invert a 3×3 matrix via cofactor expansion.
fn invert(m: Matrix3) -> Option<Matrix3> {
    let det = m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0]);
    if fabs(det) < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        [
            (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * inv_det,
            -(m[0][1] * m[2][2] - m[0][2] * m[2][1]) * inv_det,
            (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * inv_det,
        ],
        [
            -(m[1][0] * m[2][2] - m[1][2] * m[2][0]) * inv_det,
            (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * inv_det,
            -(m[0][0] * m[1][2] - m[0][2] * m[1][0]) * inv_det,
        ],
        [
            (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * inv_det,
            -(m[0][0] * m[2][1] - m[0][1] * m[2][0]) * inv_det,
            (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * inv_det,
        ],
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::f64::consts::PI;
    const EPSILON: f64 = 1e-9;

    fn assert_matrix_eq(a: Matrix3, b: Matrix3) {
        for i in 0..3 {
            for j in 0..3 {
                assert!(
                    (a[i][j] - b[i][j]).abs() < EPSILON,
                    "mismatch at ({}, {}): {} vs {}",
                    i,
                    j,
                    a[i][j],
                    b[i][j]
                );
            }
        }
    }

    #[test]
    fn test_pose_from_degrees() {
        let pose = Pose::from_degrees(1.0, 2.0, 90.0);
        assert_eq!(pose.x, 1.0);
        assert_eq!(pose.y, 2.0);
        assert!((pose.theta - PI / 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_pose_array_conversions() {
        let pose = Pose::new(1.0, -2.0, 0.5);
        assert_eq!(pose.to_array(), [1.0, -2.0, 0.5]);
        assert_eq!(Pose::from_array([1.0, -2.0, 0.5]), pose);
        assert!(pose.is_finite());
        assert!(!Pose::new(f64::NAN, 0.0, 0.0).is_finite());
    }

    #[test]
    fn test_rotation_identity_at_zero_heading() {
        let rotation = Rotation::from_heading(0.0);
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_matrix_eq(rotation.matrix(), identity);
    }

    #[test]
    fn test_body_to_world_quarter_turn() {
        // Facing +y, so "forward" is world +y and "left" is world -x.
        let rotation = Rotation::from_heading(PI / 2.0);
        let world = rotation.body_to_world(BodyVelocity::new(1.0, 2.0, 0.3));
        assert!((world[0] - (-2.0)).abs() < EPSILON);
        assert!((world[1] - 1.0).abs() < EPSILON);
        assert!((world[2] - 0.3).abs() < EPSILON);
    }

    #[test]
    fn test_world_to_body_inverts_body_to_world() {
        for k in 0..16 {
            let rotation = Rotation::from_heading(-3.0 + 0.4 * k as f64);
            let command = BodyVelocity::new(0.7, -1.3, 0.25);
            let back = rotation.world_to_body(rotation.body_to_world(command));
            assert!((back.vx - command.vx).abs() < EPSILON);
            assert!((back.vy - command.vy).abs() < EPSILON);
            assert!((back.w - command.w).abs() < EPSILON);
        }
    }

    #[test]
    fn test_transpose_equals_pseudo_inverse() {
        for k in 0..64 {
            let theta = -4.0 * PI + k as f64 * (8.0 * PI / 63.0);
            let rotation = Rotation::from_heading(theta);
            let pinv = rotation.pseudo_inverse().unwrap();
            assert_matrix_eq(rotation.transpose(), pinv);
        }
    }

    #[test]
    fn test_transpose_is_inverse() {
        let rotation = Rotation::from_heading(1.234);
        let product = mat_mul(rotation.transpose(), rotation.matrix());
        let identity = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        assert_matrix_eq(product, identity);
    }

    #[test]
    fn test_invert_singular_matrix() {
        let singular = [[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 0.0, 1.0]];
        assert!(invert(singular).is_none());
    }
}
