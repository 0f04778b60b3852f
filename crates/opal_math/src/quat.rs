//! Double-precision quaternions.
//!
//! The rotation-extraction output type of the matrix kernel. Stored as
//! a real scalar plus an imaginary 3-vector; not kept normalized
//! automatically, so `transform` uses the general form that divides by
//! the squared length.

use std::fmt;
use std::ops::{Add, Div, DivAssign, Mul, MulAssign};

use serde::{Deserialize, Serialize};

use crate::math::MIN_VECTOR_LENGTH;
use crate::vec::Vec3d;

/// A quaternion `real + imaginary.x*i + imaginary.y*j + imaginary.z*k`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quatd {
    pub real: f64,
    pub imaginary: Vec3d,
}

impl Quatd {
    /// Create a quaternion from its real and imaginary parts.
    pub const fn new(real: f64, imaginary: Vec3d) -> Self {
        Self { real, imaginary }
    }

    /// The identity rotation.
    pub const fn identity() -> Self {
        Self { real: 1.0, imaginary: Vec3d::ZERO }
    }

    /// The zero quaternion.
    pub const fn zero() -> Self {
        Self { real: 0.0, imaginary: Vec3d::ZERO }
    }

    /// Dot product of the two quaternions viewed as 4-vectors.
    pub fn dot(self, other: Quatd) -> f64 {
        self.real * other.real + self.imaginary.dot(other.imaginary)
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Normalize in place and return the pre-normalization length.
    ///
    /// A quaternion shorter than `eps` collapses to the identity.
    pub fn normalize(&mut self, eps: f64) -> f64 {
        let length = self.length();
        if length < eps {
            *self = Quatd::identity();
        } else {
            *self /= length;
        }
        length
    }

    /// Returns the normalized quaternion, with the default degeneracy
    /// threshold.
    pub fn normalized(self) -> Quatd {
        let mut q = self;
        q.normalize(MIN_VECTOR_LENGTH);
        q
    }

    /// The conjugate: same real part, negated imaginary part.
    pub fn conjugate(self) -> Quatd {
        Quatd::new(self.real, -self.imaginary)
    }

    /// The multiplicative inverse, `conjugate / length²`.
    pub fn inverse(self) -> Quatd {
        self.conjugate() / self.dot(self)
    }

    /// Rotate `point` by this quaternion.
    ///
    /// Evaluates `(q * (0, point) * q⁻¹).imaginary` in expanded form
    /// (22 multiplies), dividing by the squared length so non-unit
    /// quaternions still rotate correctly.
    pub fn transform(self, point: Vec3d) -> Vec3d {
        let tmp_dot = self.imaginary.dot(self.imaginary);
        let tmp_sqr = self.real * self.real;
        (2.0 * self.imaginary.dot(point) * self.imaginary
            + (tmp_sqr - tmp_dot) * point
            + 2.0 * self.real * self.imaginary.cross(point))
            / (tmp_sqr + tmp_dot)
    }

    /// Spherical linear interpolation from `q0` (alpha = 0) to `q1`
    /// (alpha = 1) along the shortest arc.
    ///
    /// When the two rotations are nearly identical the spherical
    /// weights degenerate, so the interpolation falls back to linear
    /// blending.
    pub fn slerp(alpha: f64, q0: Quatd, q1: Quatd) -> Quatd {
        let mut cos_theta = q0.dot(q1);
        let mut flip1 = false;

        if cos_theta < 0.0 {
            cos_theta = -cos_theta;
            flip1 = true;
        }

        let (scale0, mut scale1);
        if 1.0 - cos_theta > 0.00001 {
            // standard case
            let theta = cos_theta.acos();
            let sin_theta = theta.sin();
            scale0 = ((1.0 - alpha) * theta).sin() / sin_theta;
            scale1 = (alpha * theta).sin() / sin_theta;
        } else {
            // q0 and q1 very close - linear interp and renormalize
            scale0 = 1.0 - alpha;
            scale1 = alpha;
        }

        if flip1 {
            scale1 = -scale1;
        }

        q0 * scale0 + q1 * scale1
    }
}

impl Default for Quatd {
    fn default() -> Self {
        Quatd::identity()
    }
}

impl Mul for Quatd {
    type Output = Quatd;

    /// Hamilton product.
    fn mul(self, q: Quatd) -> Quatd {
        let r1 = self.real;
        let r2 = q.real;
        let i1 = self.imaginary;
        let i2 = q.imaginary;

        Quatd::new(
            r1 * r2 - i1.dot(i2),
            Vec3d::new(
                r1 * i2.x + r2 * i1.x + (i1.y * i2.z - i1.z * i2.y),
                r1 * i2.y + r2 * i1.y + (i1.z * i2.x - i1.x * i2.z),
                r1 * i2.z + r2 * i1.z + (i1.x * i2.y - i1.y * i2.x),
            ),
        )
    }
}

impl MulAssign for Quatd {
    fn mul_assign(&mut self, q: Quatd) {
        *self = *self * q;
    }
}

impl Add for Quatd {
    type Output = Quatd;
    fn add(self, q: Quatd) -> Quatd {
        Quatd::new(self.real + q.real, self.imaginary + q.imaginary)
    }
}

impl Mul<f64> for Quatd {
    type Output = Quatd;
    fn mul(self, s: f64) -> Quatd {
        Quatd::new(self.real * s, self.imaginary * s)
    }
}

impl Mul<Quatd> for f64 {
    type Output = Quatd;
    fn mul(self, q: Quatd) -> Quatd {
        q * self
    }
}

impl Div<f64> for Quatd {
    type Output = Quatd;
    fn div(self, s: f64) -> Quatd {
        Quatd::new(self.real / s, self.imaginary / s)
    }
}

impl DivAssign<f64> for Quatd {
    fn div_assign(&mut self, s: f64) {
        *self = *self / s;
    }
}

impl fmt::Display for Quatd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {}, {})",
            self.real, self.imaginary.x, self.imaginary.y, self.imaginary.z
        )
    }
}

impl From<Quatd> for glam::DQuat {
    fn from(q: Quatd) -> Self {
        glam::DQuat::from_xyzw(q.imaginary.x, q.imaginary.y, q.imaginary.z, q.real)
    }
}

impl From<glam::DQuat> for Quatd {
    fn from(q: glam::DQuat) -> Self {
        Quatd::new(q.w, Vec3d::new(q.x, q.y, q.z))
    }
}
