//! Pure 2D vector math used throughout the simulation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};
use thiserror::Error;

/// Tolerance used for near-zero and approximate-equality checks.
pub const EPSILON: f64 = 1e-9;

/// Errors raised by geometry operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeomError {
    /// Division by a scalar whose magnitude falls below [`EPSILON`].
    #[error("vector cannot be divided by a near-zero scalar")]
    DivByZero,
}

/// A 2D vector or point in cartesian space. Value semantics throughout; every
/// operation returns a new vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    /// The zero vector.
    pub const ZERO: Self = Self { x: 0.0, y: 0.0 };

    /// Construct a vector from cartesian components.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Construct a vector from polar coordinates (`theta` in radians).
    /// Components within [`EPSILON`] of zero are snapped to zero.
    #[must_use]
    pub fn from_polar(radius: f64, theta: f64) -> Self {
        let mut x = radius * theta.cos();
        let mut y = radius * theta.sin();
        if x.abs() < EPSILON {
            x = 0.0;
        }
        if y.abs() < EPSILON {
            y = 0.0;
        }
        Self { x, y }
    }

    /// Scale the vector by `scalar`.
    #[must_use]
    pub fn scale(self, scalar: f64) -> Self {
        Self::new(self.x * scalar, self.y * scalar)
    }

    /// Divide the vector by `scalar`, failing when the scalar magnitude is
    /// below [`EPSILON`]. The caller decides how to recover.
    pub fn try_div(self, scalar: f64) -> Result<Self, GeomError> {
        if scalar.abs() < EPSILON {
            return Err(GeomError::DivByZero);
        }
        Ok(Self::new(self.x / scalar, self.y / scalar))
    }

    /// Dot product.
    #[must_use]
    pub fn dot(self, other: Self) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z-component of the 3D cross product; sign encodes winding order.
    #[must_use]
    pub fn cross_z(self, other: Self) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Squared magnitude; preferred for comparisons since it avoids the root.
    #[must_use]
    pub fn length_squared(self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Magnitude of the vector.
    #[must_use]
    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Unit vector in the same direction, or zero for a sub-epsilon length.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len < EPSILON {
            return Self::ZERO;
        }
        self.scale(1.0 / len)
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        (self - other).length()
    }

    /// Squared Euclidean distance to `other`.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        (self - other).length_squared()
    }

    /// Angle of the vector relative to the x-axis, in `[-pi, pi]`.
    #[must_use]
    pub fn angle(self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Angle of the ray from this point toward `other`.
    #[must_use]
    pub fn angle_to(self, other: Self) -> f64 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    /// Rotate by `angle` radians around the origin.
    #[must_use]
    pub fn rotate(self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Rotate by `angle` radians around `center`.
    #[must_use]
    pub fn rotate_around(self, angle: f64, center: Self) -> Self {
        (self - center).rotate(angle) + center
    }

    /// Linear interpolation toward `target` by `t` (0 returns self, 1 returns target).
    #[must_use]
    pub fn lerp(self, target: Self, t: f64) -> Self {
        self + (target - self).scale(t)
    }

    /// Project this vector onto `on`.
    #[must_use]
    pub fn project(self, on: Self) -> Self {
        let denom = on.length_squared();
        if denom < EPSILON {
            return Self::ZERO;
        }
        on.scale(self.dot(on) / denom)
    }

    /// Approximate equality within [`EPSILON`] per component.
    #[must_use]
    pub fn approx_eq(self, other: Self) -> bool {
        (self.x - other.x).abs() <= EPSILON && (self.y - other.y).abs() <= EPSILON
    }

    /// True when both components are finite.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Vec2 {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Self) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    fn mul(self, rhs: f64) -> Self {
        self.scale(rhs)
    }
}

impl Neg for Vec2 {
    type Output = Self;

    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl fmt::Display for Vec2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2})", self.x, self.y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::{FRAC_PI_2, PI};

    #[test]
    fn arithmetic_round_trips() {
        let a = Vec2::new(3.0, -1.0);
        let b = Vec2::new(-2.0, 5.0);
        assert_eq!(a + b, Vec2::new(1.0, 4.0));
        assert_eq!(a - b, Vec2::new(5.0, -6.0));
        assert_eq!(a * 2.0, Vec2::new(6.0, -2.0));
        assert_eq!(-a, Vec2::new(-3.0, 1.0));
        let mut c = a;
        c += b;
        assert_eq!(c, a + b);
    }

    #[test]
    fn division_fails_below_epsilon() {
        let v = Vec2::new(4.0, 8.0);
        assert_eq!(v.try_div(2.0), Ok(Vec2::new(2.0, 4.0)));
        assert_eq!(v.try_div(0.0), Err(GeomError::DivByZero));
        assert_eq!(v.try_div(EPSILON / 2.0), Err(GeomError::DivByZero));
    }

    #[test]
    fn products_and_lengths() {
        let a = Vec2::new(3.0, 4.0);
        let b = Vec2::new(-4.0, 3.0);
        assert_eq!(a.dot(b), 0.0);
        assert_eq!(a.cross_z(b), 25.0);
        assert_eq!(a.length(), 5.0);
        assert_eq!(a.length_squared(), 25.0);
        assert_eq!(a.distance(Vec2::ZERO), 5.0);
        assert_eq!(a.distance_squared(Vec2::new(3.0, 0.0)), 16.0);
    }

    #[test]
    fn normalize_handles_degenerate_length() {
        let unit = Vec2::new(10.0, 0.0).normalized();
        assert!(unit.approx_eq(Vec2::new(1.0, 0.0)));
        assert_eq!(Vec2::ZERO.normalized(), Vec2::ZERO);
        assert_eq!(Vec2::new(EPSILON / 10.0, 0.0).normalized(), Vec2::ZERO);
    }

    #[test]
    fn rotation_quarter_turn() {
        let v = Vec2::new(1.0, 0.0).rotate(FRAC_PI_2);
        assert!(v.approx_eq(Vec2::new(0.0, 1.0)));

        let around = Vec2::new(2.0, 1.0).rotate_around(PI, Vec2::new(1.0, 1.0));
        assert!(around.approx_eq(Vec2::new(0.0, 1.0)));
    }

    #[test]
    fn polar_construction_snaps_tiny_components() {
        let v = Vec2::from_polar(1.0, FRAC_PI_2);
        assert_eq!(v.x, 0.0);
        assert!((v.y - 1.0).abs() <= EPSILON);
    }

    #[test]
    fn lerp_endpoints_and_midpoint() {
        let a = Vec2::new(0.0, 0.0);
        let b = Vec2::new(10.0, -4.0);
        assert!(a.lerp(b, 0.0).approx_eq(a));
        assert!(a.lerp(b, 1.0).approx_eq(b));
        assert!(a.lerp(b, 0.5).approx_eq(Vec2::new(5.0, -2.0)));
    }

    #[test]
    fn projection_onto_axis() {
        let v = Vec2::new(3.0, 4.0);
        assert!(v.project(Vec2::new(1.0, 0.0)).approx_eq(Vec2::new(3.0, 0.0)));
        assert_eq!(v.project(Vec2::ZERO), Vec2::ZERO);
    }

    #[test]
    fn angles_follow_atan2_conventions() {
        assert!((Vec2::new(0.0, 2.0).angle() - FRAC_PI_2).abs() <= EPSILON);
        let origin = Vec2::ZERO;
        assert!((origin.angle_to(Vec2::new(-1.0, 0.0)) - PI).abs() <= EPSILON);
    }
}
