//! Double-precision 3- and 4-component vectors.
//!
//! `Vec3d` carries the cross/dot/normalize primitives the matrix kernel
//! is built on, plus the iterative basis orthogonalization used by
//! `Matrix4d::orthonormalize`. `Vec4d` exists mostly as the operand type
//! for the homogeneous matrix-vector products.

use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::math::{MIN_ORTHO_TOLERANCE, MIN_VECTOR_LENGTH};

/// A 3-component f64 vector.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
pub struct Vec3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3d {
    pub const ZERO: Vec3d = Vec3d { x: 0.0, y: 0.0, z: 0.0 };
    pub const X_AXIS: Vec3d = Vec3d { x: 1.0, y: 0.0, z: 0.0 };
    pub const Y_AXIS: Vec3d = Vec3d { x: 0.0, y: 1.0, z: 0.0 };
    pub const Z_AXIS: Vec3d = Vec3d { x: 0.0, y: 0.0, z: 1.0 };

    /// Create a vector from its three components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Create a vector with all components set to `v`.
    pub const fn splat(v: f64) -> Self {
        Self { x: v, y: v, z: v }
    }

    /// Dot product.
    pub fn dot(self, other: Vec3d) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product (right-handed).
    pub fn cross(self, other: Vec3d) -> Vec3d {
        Vec3d::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Squared Euclidean length.
    pub fn length_squared(self) -> f64 {
        self.dot(self)
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Normalize in place and return the pre-normalization length.
    ///
    /// A vector shorter than `eps` is divided by `eps` instead of its
    /// length, so degenerate input stays finite rather than producing
    /// infinities.
    pub fn normalize(&mut self, eps: f64) -> f64 {
        let length = self.length();
        *self /= if length > eps { length } else { eps };
        length
    }

    /// Returns the normalized vector, with the default degeneracy
    /// threshold.
    pub fn normalized(self) -> Vec3d {
        let mut v = self;
        v.normalize(MIN_VECTOR_LENGTH);
        v
    }

    /// True if the two vectors are within `tolerance` of each other,
    /// measured as the length of their difference.
    pub fn is_close(&self, other: &Vec3d, tolerance: f64) -> bool {
        (*self - *other).length() <= tolerance
    }

    /// Orthogonalize (and optionally normalize) three basis vectors in
    /// place using an iterative symmetric correction.
    ///
    /// Each iteration subtracts the pairwise projections and averages
    /// with the previous iterate, which converges quickly when the
    /// basis is already near-orthogonal. Returns false if the inputs
    /// start out pairwise colinear or the iteration cap is reached; the
    /// vectors still hold the best correction found.
    pub fn orthogonalize_basis(
        tx: &mut Vec3d,
        ty: &mut Vec3d,
        tz: &mut Vec3d,
        normalize: bool,
    ) -> bool {
        const MAX_ITERS: usize = 20;

        let mut a = *tx;
        let mut b = *ty;
        let mut c = *tz;

        if normalize {
            a = a.normalized();
            b = b.normalized();
            c = c.normalized();
        }

        // Colinear bases would make the convergence test below read as
        // success after one no-op iteration, so reject them up front.
        if a.is_close(&b, MIN_ORTHO_TOLERANCE)
            || a.is_close(&c, MIN_ORTHO_TOLERANCE)
            || b.is_close(&c, MIN_ORTHO_TOLERANCE)
        {
            return false;
        }

        let mut converged = false;
        for _ in 0..MAX_ITERS {
            let ax = a;
            let bx = b;
            let cx = c;

            let ay = ax - ax.dot(bx) * bx - ax.dot(cx) * cx;
            let by = bx - bx.dot(ax) * ax - bx.dot(cx) * cx;
            let cy = cx - cx.dot(ax) * ax - cx.dot(bx) * bx;

            a = 0.5 * (ax + ay);
            b = 0.5 * (bx + by);
            c = 0.5 * (cx + cy);

            if normalize {
                a = a.normalized();
                b = b.normalized();
                c = c.normalized();
            }

            if a.is_close(&ax, MIN_ORTHO_TOLERANCE)
                && b.is_close(&bx, MIN_ORTHO_TOLERANCE)
                && c.is_close(&cx, MIN_ORTHO_TOLERANCE)
            {
                converged = true;
                break;
            }
        }

        *tx = a;
        *ty = b;
        *tz = c;
        converged
    }
}

impl Index<usize> for Vec3d {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("Vec3d index out of range: {i}"),
        }
    }
}

impl IndexMut<usize> for Vec3d {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        match i {
            0 => &mut self.x,
            1 => &mut self.y,
            2 => &mut self.z,
            _ => panic!("Vec3d index out of range: {i}"),
        }
    }
}

impl Add for Vec3d {
    type Output = Vec3d;
    fn add(self, rhs: Vec3d) -> Vec3d {
        Vec3d::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3d {
    fn add_assign(&mut self, rhs: Vec3d) {
        *self = *self + rhs;
    }
}

impl Sub for Vec3d {
    type Output = Vec3d;
    fn sub(self, rhs: Vec3d) -> Vec3d {
        Vec3d::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl SubAssign for Vec3d {
    fn sub_assign(&mut self, rhs: Vec3d) {
        *self = *self - rhs;
    }
}

impl Neg for Vec3d {
    type Output = Vec3d;
    fn neg(self) -> Vec3d {
        Vec3d::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<f64> for Vec3d {
    type Output = Vec3d;
    fn mul(self, s: f64) -> Vec3d {
        Vec3d::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Mul<Vec3d> for f64 {
    type Output = Vec3d;
    fn mul(self, v: Vec3d) -> Vec3d {
        v * self
    }
}

impl MulAssign<f64> for Vec3d {
    fn mul_assign(&mut self, s: f64) {
        *self = *self * s;
    }
}

impl Div<f64> for Vec3d {
    type Output = Vec3d;
    fn div(self, s: f64) -> Vec3d {
        Vec3d::new(self.x / s, self.y / s, self.z / s)
    }
}

impl DivAssign<f64> for Vec3d {
    fn div_assign(&mut self, s: f64) {
        *self = *self / s;
    }
}

impl fmt::Display for Vec3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<Vec3d> for glam::DVec3 {
    fn from(v: Vec3d) -> Self {
        glam::DVec3::new(v.x, v.y, v.z)
    }
}

impl From<glam::DVec3> for Vec3d {
    fn from(v: glam::DVec3) -> Self {
        Vec3d::new(v.x, v.y, v.z)
    }
}

/// A 4-component f64 vector, primarily the operand type for the
/// homogeneous matrix-vector products.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
pub struct Vec4d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Vec4d {
    pub const ZERO: Vec4d = Vec4d { x: 0.0, y: 0.0, z: 0.0, w: 0.0 };

    /// Create a vector from its four components.
    pub const fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// Extend a 3-vector with an explicit homogeneous coordinate.
    pub const fn from_vec3(v: Vec3d, w: f64) -> Self {
        Self { x: v.x, y: v.y, z: v.z, w }
    }

    /// Drop the homogeneous coordinate.
    pub const fn truncate(self) -> Vec3d {
        Vec3d { x: self.x, y: self.y, z: self.z }
    }

    /// Dot product.
    pub fn dot(self, other: Vec4d) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z + self.w * other.w
    }

    /// Euclidean length.
    pub fn length(self) -> f64 {
        self.dot(self).sqrt()
    }
}

impl Index<usize> for Vec4d {
    type Output = f64;

    fn index(&self, i: usize) -> &f64 {
        match i {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            3 => &self.w,
            _ => panic!("Vec4d index out of range: {i}"),
        }
    }
}

impl IndexMut<usize> for Vec4d {
    fn index_mut(&mut self, i: usize) -> &mut f64 {
        match i {
            0 => &mut self.x,
            1 => &mut self.y,
            2 => &mut self.z,
            3 => &mut self.w,
            _ => panic!("Vec4d index out of range: {i}"),
        }
    }
}

impl Add for Vec4d {
    type Output = Vec4d;
    fn add(self, rhs: Vec4d) -> Vec4d {
        Vec4d::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z, self.w + rhs.w)
    }
}

impl Sub for Vec4d {
    type Output = Vec4d;
    fn sub(self, rhs: Vec4d) -> Vec4d {
        Vec4d::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z, self.w - rhs.w)
    }
}

impl Neg for Vec4d {
    type Output = Vec4d;
    fn neg(self) -> Vec4d {
        Vec4d::new(-self.x, -self.y, -self.z, -self.w)
    }
}

impl Mul<f64> for Vec4d {
    type Output = Vec4d;
    fn mul(self, s: f64) -> Vec4d {
        Vec4d::new(self.x * s, self.y * s, self.z * s, self.w * s)
    }
}

impl Mul<Vec4d> for f64 {
    type Output = Vec4d;
    fn mul(self, v: Vec4d) -> Vec4d {
        v * self
    }
}

impl fmt::Display for Vec4d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.z, self.w)
    }
}

impl From<Vec4d> for glam::DVec4 {
    fn from(v: Vec4d) -> Self {
        glam::DVec4::new(v.x, v.y, v.z, v.w)
    }
}

impl From<glam::DVec4> for Vec4d {
    fn from(v: glam::DVec4) -> Self {
        Vec4d::new(v.x, v.y, v.z, v.w)
    }
}
