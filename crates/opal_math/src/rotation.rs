//! Axis/angle rotations.
//!
//! The user-facing rotation representation consumed by the matrix
//! rotation+translation constructors. Angles are in degrees, matching
//! the convention of the scene formats this feeds.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::math::MIN_VECTOR_LENGTH;
use crate::quat::Quatd;
use crate::vec::Vec3d;

/// A rotation about a unit axis by an angle in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    axis: Vec3d,
    angle: f64,
}

impl Rotation {
    /// Create a rotation about `axis` (normalized internally) by
    /// `angle` degrees.
    pub fn new(axis: Vec3d, angle: f64) -> Self {
        Self { axis: axis.normalized(), angle }
    }

    /// The identity rotation (zero degrees about the x axis).
    pub const fn identity() -> Self {
        Self { axis: Vec3d::X_AXIS, angle: 0.0 }
    }

    /// Build the rotation equivalent to a (near-unit) quaternion.
    ///
    /// A quaternion with a degenerate imaginary part maps to the
    /// identity rotation.
    pub fn from_quat(q: Quatd) -> Self {
        let len = q.imaginary.length();
        if len < MIN_VECTOR_LENGTH {
            return Rotation::identity();
        }
        Self {
            axis: q.imaginary / len,
            angle: 2.0 * q.real.clamp(-1.0, 1.0).acos().to_degrees(),
        }
    }

    /// The rotation axis (unit length).
    pub fn axis(&self) -> Vec3d {
        self.axis
    }

    /// The rotation angle in degrees.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// The equivalent unit quaternion.
    pub fn quat(&self) -> Quatd {
        let half = self.angle.to_radians() / 2.0;
        Quatd::new(half.cos(), self.axis * half.sin())
    }

    /// The inverse rotation: same axis, negated angle.
    pub fn inverse(&self) -> Rotation {
        Rotation { axis: self.axis, angle: -self.angle }
    }

    /// Rotate a vector.
    pub fn transform(&self, v: Vec3d) -> Vec3d {
        self.quat().transform(v)
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Rotation::identity()
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {}]", self.axis, self.angle)
    }
}
