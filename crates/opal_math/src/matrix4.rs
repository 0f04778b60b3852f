//! Double-precision 4×4 transform matrix.
//!
//! Row-major storage (`m[row][col]`) with row-vector semantics:
//! a point transforms as `p * M`, and the translation of an affine
//! transform lives in the last row. The type is a plain value: every
//! operation either returns a new matrix or mutates `self` in place,
//! and nothing here allocates.
//!
//! Besides the usual algebra this carries the numeric workhorses of a
//! transform stack: cofactor-based inversion with a singular sentinel,
//! a cyclic Jacobi eigensolver, polar factorization into
//! rotation/scale/shear/translation, and rotation extraction.

use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, MulAssign, Neg, Sub, SubAssign};
use std::str::FromStr;

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::math::{self, MIN_VECTOR_LENGTH};
use crate::matrix3::Matrix3d;
use crate::quat::Quatd;
use crate::range3::Range3d;
use crate::rotation::Rotation;
use crate::vec::{Vec3d, Vec4d};

/// Default epsilon for [`Matrix4d::factor`].
const FACTOR_EPS: f64 = 1e-10;

/// Inversion of a matrix whose determinant is within epsilon of zero.
///
/// Returned by [`Matrix4d::try_inverse`]; the legacy
/// [`Matrix4d::inverse`] path signals the same condition with a
/// max-magnitude diagonal sentinel instead.
#[derive(Error, Debug, Clone, Copy, PartialEq)]
#[error("matrix is singular (determinant {determinant:e})")]
pub struct SingularMatrix {
    pub determinant: f64,
}

/// Errors from parsing the textual matrix form.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseMatrixError {
    #[error("expected {expected} at byte {pos}")]
    Expected { expected: &'static str, pos: usize },

    #[error("invalid number {0:?}")]
    InvalidNumber(String),

    #[error("unexpected trailing characters")]
    TrailingInput,
}

/// Result of [`Matrix4d::factor`]: the polar decomposition of an
/// affine transform.
///
/// For non-singular input, `rotation * diag(scale) * rotationᵀ * shear`
/// reconstructs the upper 3×3 block, and `translation` is the last
/// row. `projection` is reserved for perspective terms and is always
/// identity in this decomposition. When `is_singular` is set the
/// factors are still populated (degenerate scales are clamped) but may
/// be numerically unstable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Factorization {
    pub rotation: Matrix4d,
    pub scale: Vec3d,
    pub shear: Matrix4d,
    pub translation: Vec3d,
    pub projection: Matrix4d,
    pub is_singular: bool,
}

/// A 4×4 f64 matrix with row-major storage and row-vector transform
/// semantics.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
pub struct Matrix4d {
    m: [[f64; 4]; 4],
}

impl Matrix4d {
    pub const IDENTITY: Matrix4d = Matrix4d {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub const ZERO: Matrix4d = Matrix4d { m: [[0.0; 4]; 4] };

    /// Create a matrix from sixteen scalars in row-major order.
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        m00: f64, m01: f64, m02: f64, m03: f64,
        m10: f64, m11: f64, m12: f64, m13: f64,
        m20: f64, m21: f64, m22: f64, m23: f64,
        m30: f64, m31: f64, m32: f64, m33: f64,
    ) -> Self {
        Self {
            m: [
                [m00, m01, m02, m03],
                [m10, m11, m12, m13],
                [m20, m21, m22, m23],
                [m30, m31, m32, m33],
            ],
        }
    }

    /// Create a matrix from row-major nested arrays.
    pub const fn from_rows(rows: [[f64; 4]; 4]) -> Self {
        Self { m: rows }
    }

    /// Create a matrix from ragged row slices: entries beyond the
    /// provided rows/columns keep their identity defaults.
    pub fn from_rows_ragged(rows: &[&[f64]]) -> Self {
        let mut out = Matrix4d::IDENTITY;
        for (i, row) in rows.iter().take(4).enumerate() {
            for (j, &v) in row.iter().take(4).enumerate() {
                out.m[i][j] = v;
            }
        }
        out
    }

    /// Create a matrix with `s` across the whole diagonal.
    pub fn from_diagonal(s: f64) -> Self {
        let mut out = Matrix4d::ZERO;
        out.set_diagonal(s);
        out
    }

    /// Create a matrix with `v` on the diagonal.
    pub fn from_diagonal_vec(v: Vec4d) -> Self {
        let mut out = Matrix4d::ZERO;
        out.set_diagonal_vec(v);
        out
    }

    /// Create a uniform scale transform (the `[3][3]` entry stays 1).
    pub fn from_scale(s: f64) -> Self {
        let mut out = Matrix4d::ZERO;
        out.set_scale(s);
        out
    }

    /// Create a per-axis scale transform.
    pub fn from_scale_vec(s: Vec3d) -> Self {
        let mut out = Matrix4d::ZERO;
        out.set_scale_vec(s);
        out
    }

    /// Create a translation transform.
    pub fn from_translate(t: Vec3d) -> Self {
        let mut out = Matrix4d::ZERO;
        out.set_translate(t);
        out
    }

    /// Create a rotation transform from a (near-unit) quaternion.
    pub fn from_quat(q: Quatd) -> Self {
        let mut out = Matrix4d::ZERO;
        out.set_rotate(q);
        out
    }

    /// Create a rotation transform from an axis/angle rotation.
    pub fn from_rotation(rot: &Rotation) -> Self {
        Matrix4d::from_quat(rot.quat())
    }

    /// Create a rotation transform from a 3×3 rotation block.
    pub fn from_matrix3(rot: &Matrix3d) -> Self {
        let mut out = Matrix4d::ZERO;
        out.set_rotate_mat(rot);
        out
    }

    /// Create a rotation followed by a translation.
    pub fn from_rotate_translate(rot: &Rotation, t: Vec3d) -> Self {
        let mut out = Matrix4d::ZERO;
        out.set_transform(rot, t);
        out
    }

    /// Create a transform from a 3×3 rotation block and a translation.
    pub fn from_matrix3_translate(rot: &Matrix3d, t: Vec3d) -> Self {
        let mut out = Matrix4d::ZERO;
        out.set_transform_mat(rot, t);
        out
    }

    /// Create a world-to-eye transform for a camera at `eye_point`
    /// looking at `center_point`.
    pub fn from_look_at(eye_point: Vec3d, center_point: Vec3d, up_direction: Vec3d) -> Self {
        let mut out = Matrix4d::ZERO;
        out.set_look_at(eye_point, center_point, up_direction);
        out
    }

    /// Create a world-to-eye transform for a camera at `eye_point`
    /// with the given orientation.
    pub fn from_look_at_rotation(eye_point: Vec3d, orientation: &Rotation) -> Self {
        // Translate the eye to the origin, then rotate by the inverse
        // orientation to bring the view direction to (0, 0, -1).
        Matrix4d::from_translate(-eye_point)
            * Matrix4d::from_rotation(&orientation.inverse())
    }

    /// Overwrite all sixteen entries, row-major.
    #[allow(clippy::too_many_arguments)]
    pub fn set(
        &mut self,
        m00: f64, m01: f64, m02: f64, m03: f64,
        m10: f64, m11: f64, m12: f64, m13: f64,
        m20: f64, m21: f64, m22: f64, m23: f64,
        m30: f64, m31: f64, m32: f64, m33: f64,
    ) -> &mut Self {
        self.m = [
            [m00, m01, m02, m03],
            [m10, m11, m12, m13],
            [m20, m21, m22, m23],
            [m30, m31, m32, m33],
        ];
        self
    }

    /// Overwrite all entries from row-major nested arrays.
    pub fn set_rows(&mut self, rows: [[f64; 4]; 4]) -> &mut Self {
        self.m = rows;
        self
    }

    /// Set to the identity matrix.
    pub fn set_identity(&mut self) -> &mut Self {
        self.set_diagonal(1.0)
    }

    /// Set all entries to zero.
    pub fn set_zero(&mut self) -> &mut Self {
        self.set_diagonal(0.0)
    }

    /// Set to a matrix with `s` on the whole diagonal, zero elsewhere.
    pub fn set_diagonal(&mut self, s: f64) -> &mut Self {
        self.m = [
            [s, 0.0, 0.0, 0.0],
            [0.0, s, 0.0, 0.0],
            [0.0, 0.0, s, 0.0],
            [0.0, 0.0, 0.0, s],
        ];
        self
    }

    /// Set to a matrix with `v` on the diagonal, zero elsewhere.
    pub fn set_diagonal_vec(&mut self, v: Vec4d) -> &mut Self {
        self.m = [
            [v.x, 0.0, 0.0, 0.0],
            [0.0, v.y, 0.0, 0.0],
            [0.0, 0.0, v.z, 0.0],
            [0.0, 0.0, 0.0, v.w],
        ];
        self
    }

    /// Set to a uniform scale transform; leaves the `[3][3]` entry as 1.
    pub fn set_scale(&mut self, s: f64) -> &mut Self {
        self.set_scale_vec(Vec3d::splat(s))
    }

    /// Set to a per-axis scale transform.
    pub fn set_scale_vec(&mut self, s: Vec3d) -> &mut Self {
        self.m = [
            [s.x, 0.0, 0.0, 0.0],
            [0.0, s.y, 0.0, 0.0],
            [0.0, 0.0, s.z, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ];
        self
    }

    /// Set to a translation transform.
    pub fn set_translate(&mut self, t: Vec3d) -> &mut Self {
        self.m = [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [t.x, t.y, t.z, 1.0],
        ];
        self
    }

    /// Overwrite only the translation row, leaving the rotation/scale
    /// block untouched.
    pub fn set_translate_only(&mut self, t: Vec3d) -> &mut Self {
        self.m[3][0] = t.x;
        self.m[3][1] = t.y;
        self.m[3][2] = t.z;
        self.m[3][3] = 1.0;
        self
    }

    /// Set to a pure rotation from a (near-unit) quaternion.
    pub fn set_rotate(&mut self, q: Quatd) -> &mut Self {
        self.set_rotate_only(q);

        self.m[0][3] = 0.0;
        self.m[1][3] = 0.0;
        self.m[2][3] = 0.0;

        self.m[3][0] = 0.0;
        self.m[3][1] = 0.0;
        self.m[3][2] = 0.0;
        self.m[3][3] = 1.0;

        self
    }

    /// Overwrite only the upper 3×3 block with the quaternion's
    /// rotation; translation and last column keep their values.
    pub fn set_rotate_only(&mut self, q: Quatd) -> &mut Self {
        self.set_rotate_from_quat(q.real, q.imaginary);
        self
    }

    /// Set to a pure rotation from a 3×3 rotation block.
    pub fn set_rotate_mat(&mut self, mx3: &Matrix3d) -> &mut Self {
        self.set_rotate_only_mat(mx3);

        self.m[0][3] = 0.0;
        self.m[1][3] = 0.0;
        self.m[2][3] = 0.0;

        self.m[3][0] = 0.0;
        self.m[3][1] = 0.0;
        self.m[3][2] = 0.0;
        self.m[3][3] = 1.0;

        self
    }

    /// Overwrite only the upper 3×3 block.
    pub fn set_rotate_only_mat(&mut self, mx3: &Matrix3d) -> &mut Self {
        for i in 0..3 {
            for j in 0..3 {
                self.m[i][j] = mx3[i][j];
            }
        }
        self
    }

    /// Set to a rotation followed by a translation.
    pub fn set_transform(&mut self, rotate: &Rotation, translate: Vec3d) -> &mut Self {
        self.set_rotate(rotate.quat());
        self.set_translate_only(translate)
    }

    /// Set to a transform from a 3×3 rotation block and a translation.
    pub fn set_transform_mat(&mut self, rotate: &Matrix3d, translate: Vec3d) -> &mut Self {
        self.set_rotate_mat(rotate);
        self.set_translate_only(translate)
    }

    /// Set to a world-to-eye transform: rotate the world frame so the
    /// view direction lands on (0, 0, -1), translating `eye_point` to
    /// the origin.
    pub fn set_look_at(
        &mut self,
        eye_point: Vec3d,
        center_point: Vec3d,
        up_direction: Vec3d,
    ) -> &mut Self {
        let view = (center_point - eye_point).normalized();
        let right = view.cross(up_direction).normalized();
        let real_up = right.cross(view);

        self.m[0][0] = right.x;
        self.m[1][0] = right.y;
        self.m[2][0] = right.z;
        self.m[3][0] = -right.dot(eye_point);

        self.m[0][1] = real_up.x;
        self.m[1][1] = real_up.y;
        self.m[2][1] = real_up.z;
        self.m[3][1] = -real_up.dot(eye_point);

        self.m[0][2] = -view.x;
        self.m[1][2] = -view.y;
        self.m[2][2] = -view.z;
        self.m[3][2] = view.dot(eye_point);

        self.m[0][3] = 0.0;
        self.m[1][3] = 0.0;
        self.m[2][3] = 0.0;
        self.m[3][3] = 1.0;

        self
    }

    /// The raw row-major storage.
    pub const fn rows(&self) -> [[f64; 4]; 4] {
        self.m
    }

    /// Row `i` as a vector.
    pub fn row(&self, i: usize) -> Vec4d {
        Vec4d::new(self.m[i][0], self.m[i][1], self.m[i][2], self.m[i][3])
    }

    /// Overwrite row `i`.
    pub fn set_row(&mut self, i: usize, v: Vec4d) {
        self.m[i] = [v.x, v.y, v.z, v.w];
    }

    /// Column `j` as a vector.
    pub fn column(&self, j: usize) -> Vec4d {
        Vec4d::new(self.m[0][j], self.m[1][j], self.m[2][j], self.m[3][j])
    }

    /// Overwrite column `j`.
    pub fn set_column(&mut self, j: usize, v: Vec4d) {
        self.m[0][j] = v.x;
        self.m[1][j] = v.y;
        self.m[2][j] = v.z;
        self.m[3][j] = v.w;
    }

    /// The transposed matrix.
    pub fn transpose(&self) -> Matrix4d {
        let m = &self.m;
        Matrix4d::new(
            m[0][0], m[1][0], m[2][0], m[3][0],
            m[0][1], m[1][1], m[2][1], m[3][1],
            m[0][2], m[1][2], m[2][2], m[3][2],
            m[0][3], m[1][3], m[2][3], m[3][3],
        )
    }

    /// Determinant of the 3×3 submatrix picked out by three row and
    /// three column indices. Shared by the full determinant, the
    /// upper-block determinant and the factorization.
    fn determinant3_sub(
        &self,
        r1: usize, r2: usize, r3: usize,
        c1: usize, c2: usize, c3: usize,
    ) -> f64 {
        let m = &self.m;
        m[r1][c1] * m[r2][c2] * m[r3][c3]
            + m[r1][c2] * m[r2][c3] * m[r3][c1]
            + m[r1][c3] * m[r2][c1] * m[r3][c2]
            - m[r1][c1] * m[r2][c3] * m[r3][c2]
            - m[r1][c2] * m[r2][c1] * m[r3][c3]
            - m[r1][c3] * m[r2][c2] * m[r3][c1]
    }

    /// The 4×4 determinant, by cofactor expansion along the last
    /// column.
    pub fn determinant(&self) -> f64 {
        -self.m[0][3] * self.determinant3_sub(1, 2, 3, 0, 1, 2)
            + self.m[1][3] * self.determinant3_sub(0, 2, 3, 0, 1, 2)
            - self.m[2][3] * self.determinant3_sub(0, 1, 3, 0, 1, 2)
            + self.m[3][3] * self.determinant3_sub(0, 1, 2, 0, 1, 2)
    }

    /// Determinant of the upper-left 3×3 block.
    pub fn determinant3(&self) -> f64 {
        self.determinant3_sub(0, 1, 2, 0, 1, 2)
    }

    /// Sign of the upper-block determinant: 1.0 for right-handed
    /// bases, -1.0 for left-handed, 0.0 for degenerate.
    ///
    /// This could use fewer operations via a cross and dot product,
    /// but it matters more that the result stays consistent with how
    /// the determinant is computed.
    pub fn handedness(&self) -> f64 {
        math::sgn(self.determinant3())
    }

    /// True if the row basis is right-handed.
    pub fn is_right_handed(&self) -> bool {
        self.handedness() == 1.0
    }

    /// True if the row basis is left-handed.
    pub fn is_left_handed(&self) -> bool {
        self.handedness() == -1.0
    }

    /// The inverse, with the zero-determinant threshold at exactly
    /// zero. See [`Matrix4d::inverse_det`] for the sentinel contract.
    pub fn inverse(&self) -> Matrix4d {
        self.inverse_det(0.0).0
    }

    /// The inverse and the determinant.
    ///
    /// If `|det| > eps` the result is the adjugate scaled by `1/det`.
    /// Otherwise the matrix is treated as singular and the result is a
    /// sentinel with the maximum representable magnitude on the scale
    /// diagonal; callers that need to distinguish must check the
    /// returned determinant (or use [`Matrix4d::try_inverse`]).
    pub fn inverse_det(&self, eps: f64) -> (Matrix4d, f64) {
        // Pickle the 1st two columns of the matrix into locals.
        let x00 = self.m[0][0];
        let x01 = self.m[0][1];
        let x10 = self.m[1][0];
        let x11 = self.m[1][1];
        let x20 = self.m[2][0];
        let x21 = self.m[2][1];
        let x30 = self.m[3][0];
        let x31 = self.m[3][1];

        // All six 2x2 determinants of the 1st two columns.
        let mut y01 = x00 * x11 - x10 * x01;
        let mut y02 = x00 * x21 - x20 * x01;
        let mut y03 = x00 * x31 - x30 * x01;
        let mut y12 = x10 * x21 - x20 * x11;
        let mut y13 = x10 * x31 - x30 * x11;
        let mut y23 = x20 * x31 - x30 * x21;

        // Pickle the 2nd two columns of the matrix into locals.
        let x02 = self.m[0][2];
        let x03 = self.m[0][3];
        let x12 = self.m[1][2];
        let x13 = self.m[1][3];
        let x22 = self.m[2][2];
        let x23 = self.m[2][3];
        let x32 = self.m[3][2];
        let x33 = self.m[3][3];

        // All 3x3 cofactors for the 2nd two columns.
        let z33 = x02 * y12 - x12 * y02 + x22 * y01;
        let z23 = x12 * y03 - x32 * y01 - x02 * y13;
        let z13 = x02 * y23 - x22 * y03 + x32 * y02;
        let z03 = x22 * y13 - x32 * y12 - x12 * y23;
        let z32 = x13 * y02 - x23 * y01 - x03 * y12;
        let z22 = x03 * y13 - x13 * y03 + x33 * y01;
        let z12 = x23 * y03 - x33 * y02 - x03 * y23;
        let z02 = x13 * y23 - x23 * y13 + x33 * y12;

        // All six 2x2 determinants of the 2nd two columns.
        y01 = x02 * x13 - x12 * x03;
        y02 = x02 * x23 - x22 * x03;
        y03 = x02 * x33 - x32 * x03;
        y12 = x12 * x23 - x22 * x13;
        y13 = x12 * x33 - x32 * x13;
        y23 = x22 * x33 - x32 * x23;

        // All 3x3 cofactors for the 1st two columns.
        let z30 = x11 * y02 - x21 * y01 - x01 * y12;
        let z20 = x01 * y13 - x11 * y03 + x31 * y01;
        let z10 = x21 * y03 - x31 * y02 - x01 * y23;
        let z00 = x11 * y23 - x21 * y13 + x31 * y12;
        let z31 = x00 * y12 - x10 * y02 + x20 * y01;
        let z21 = x10 * y03 - x30 * y01 - x00 * y13;
        let z11 = x00 * y23 - x20 * y03 + x30 * y02;
        let z01 = x20 * y13 - x30 * y12 - x10 * y23;

        // 4x4 determinant as the sum of four cofactor products.
        let det = x30 * z30 + x20 * z20 + x10 * z10 + x00 * z00;

        let mut inverse = Matrix4d::ZERO;

        if det.abs() > eps {
            let rcp = 1.0 / det;
            // Scale all 3x3 cofactors by the reciprocal and place them
            // transposed (adjugate transpose).
            inverse.m[0][0] = z00 * rcp;
            inverse.m[0][1] = z10 * rcp;
            inverse.m[1][0] = z01 * rcp;
            inverse.m[0][2] = z20 * rcp;
            inverse.m[2][0] = z02 * rcp;
            inverse.m[0][3] = z30 * rcp;
            inverse.m[3][0] = z03 * rcp;
            inverse.m[1][1] = z11 * rcp;
            inverse.m[1][2] = z21 * rcp;
            inverse.m[2][1] = z12 * rcp;
            inverse.m[1][3] = z31 * rcp;
            inverse.m[3][1] = z13 * rcp;
            inverse.m[2][2] = z22 * rcp;
            inverse.m[2][3] = z32 * rcp;
            inverse.m[3][2] = z23 * rcp;
            inverse.m[3][3] = z33 * rcp;
        } else {
            inverse.set_scale(f64::MAX);
        }

        (inverse, det)
    }

    /// The inverse as an explicit result: `Err` carries the
    /// determinant when it is within `eps` of zero. The `Ok` path is
    /// numerically identical to [`Matrix4d::inverse_det`].
    pub fn try_inverse(&self, eps: f64) -> Result<Matrix4d, SingularMatrix> {
        let (inverse, det) = self.inverse_det(eps);
        if det.abs() > eps {
            Ok(inverse)
        } else {
            Err(SingularMatrix { determinant: det })
        }
    }

    /// Eigenvalues and eigenvectors of the symmetric upper 3×3 block,
    /// by cyclic Jacobi rotation (Numerical Recipes §11.1).
    ///
    /// Runs at most 50 sweeps, returning early once the off-diagonal
    /// sum underflows to exactly zero. If the sweeps run out the
    /// current approximation is returned as-is; for the
    /// positive-semi-definite Gram matrices the factorization feeds in,
    /// convergence is fast and the cap is never the limiting factor.
    fn jacobi3(&self) -> (Vec3d, [Vec3d; 3]) {
        let mut eigenvalues = Vec3d::new(self.m[0][0], self.m[1][1], self.m[2][2]);
        let mut eigenvectors = [Vec3d::X_AXIS, Vec3d::Y_AXIS, Vec3d::Z_AXIS];

        let mut a = self.m;
        let mut b = eigenvalues;
        let mut z = Vec3d::ZERO;

        for i in 0..50 {
            let mut sm = 0.0;
            for p in 0..2 {
                for q in (p + 1)..3 {
                    sm += a[p][q].abs();
                }
            }

            if sm == 0.0 {
                return (eigenvalues, eigenvectors);
            }

            // Skip small entries during the early sweeps.
            let thresh = if i < 3 { 0.2 * sm / 9.0 } else { 0.0 };

            for p in 0..3 {
                for q in (p + 1)..3 {
                    let mut g = 100.0 * a[p][q].abs();

                    // Once an off-diagonal entry is too small to move
                    // either eigenvalue, zero it directly.
                    if i > 3
                        && eigenvalues[p].abs() + g == eigenvalues[p].abs()
                        && eigenvalues[q].abs() + g == eigenvalues[q].abs()
                    {
                        a[p][q] = 0.0;
                    } else if a[p][q].abs() > thresh {
                        let mut h = eigenvalues[q] - eigenvalues[p];

                        // Tangent of the rotation angle via the stable
                        // half-angle form.
                        let t = if h.abs() + g == h.abs() {
                            a[p][q] / h
                        } else {
                            let theta = 0.5 * h / a[p][q];
                            let t = 1.0 / (theta.abs() + (1.0 + theta * theta).sqrt());
                            if theta < 0.0 {
                                -t
                            } else {
                                t
                            }
                        };

                        let c = 1.0 / (1.0 + t * t).sqrt();
                        let s = t * c;
                        let tau = s / (1.0 + c);
                        h = t * a[p][q];
                        z[p] -= h;
                        z[q] += h;
                        eigenvalues[p] -= h;
                        eigenvalues[q] += h;
                        a[p][q] = 0.0;

                        for j in 0..p {
                            g = a[j][p];
                            h = a[j][q];
                            a[j][p] = g - s * (h + g * tau);
                            a[j][q] = h + s * (g - h * tau);
                        }
                        for j in (p + 1)..q {
                            g = a[p][j];
                            h = a[j][q];
                            a[p][j] = g - s * (h + g * tau);
                            a[j][q] = h + s * (g - h * tau);
                        }
                        for j in (q + 1)..3 {
                            g = a[p][j];
                            h = a[q][j];
                            a[p][j] = g - s * (h + g * tau);
                            a[q][j] = h + s * (g - h * tau);
                        }
                        for vec in eigenvectors.iter_mut() {
                            g = vec[p];
                            h = vec[q];
                            vec[p] = g - s * (h + g * tau);
                            vec[q] = h + s * (g - h * tau);
                        }
                    }
                }
            }

            for p in 0..3 {
                b[p] += z[p];
                eigenvalues[p] = b[p];
                z[p] = 0.0;
            }
        }

        (eigenvalues, eigenvectors)
    }

    /// Polar factorization with the default epsilon.
    pub fn factor(&self) -> Factorization {
        self.factor_with_eps(FACTOR_EPS)
    }

    /// Decompose the transform into rotation × scale × shear ×
    /// translation (plus an identity perspective term).
    ///
    /// The rotation comes from the eigenframe of the Gram matrix
    /// `a·aᵗ` of the upper 3×3 block, the scales are the signed square
    /// roots of its eigenvalues, and the shear is what remains after
    /// dividing the scales back out. Eigenvalues under `eps` are
    /// clamped so singular input still produces a usable (if
    /// unstable) factorization; such input is flagged with
    /// `is_singular` rather than an error.
    pub fn factor_with_eps(&self, eps: f64) -> Factorization {
        let projection = Matrix4d::IDENTITY;

        // Split the upper 3x3 block from the translation row.
        let mut a = Matrix4d::IDENTITY;
        let mut translation = Vec3d::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                a.m[i][j] = self.m[i][j];
            }
            a.m[3][i] = 0.0;
            a.m[i][3] = 0.0;
            translation[i] = self.m[3][i];
        }
        a.m[3][3] = 1.0;

        let det = a.determinant3();
        let det_sign = if det < 0.0 { -1.0 } else { 1.0 };
        let is_singular = det * det_sign < eps;

        // The eigenvectors of b = a * a-transpose become the rows of
        // the rotation factor.
        let b = a * a.transpose();
        let (eigenvalues, eigenvectors) = b.jacobi3();
        let rotation = Matrix4d::new(
            eigenvectors[0].x, eigenvectors[0].y, eigenvectors[0].z, 0.0,
            eigenvectors[1].x, eigenvectors[1].y, eigenvectors[1].z, 0.0,
            eigenvectors[2].x, eigenvectors[2].y, eigenvectors[2].z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        // scale = signed sqrt of the eigenvalues; eigenvalues below
        // eps clamp to eps so the reciprocal stays finite.
        let mut scale = Vec3d::ZERO;
        let mut s_inv = Matrix4d::IDENTITY;
        for i in 0..3 {
            if eigenvalues[i] < eps {
                scale[i] = det_sign * eps;
            } else {
                scale[i] = det_sign * eigenvalues[i].sqrt();
            }
            s_inv.m[i][i] = 1.0 / scale[i];
        }

        // shear = R * S-inverse * R-transpose * A
        let shear = rotation * s_inv * rotation.transpose() * a;

        Factorization {
            rotation,
            scale,
            shear,
            translation,
            projection,
            is_singular,
        }
    }

    /// Extract the rotation of the upper 3×3 block as a quaternion,
    /// using Shoemake's closed form branched on the largest diagonal
    /// term.
    ///
    /// The block must already be (near-)orthonormal, typically the
    /// output of [`Matrix4d::orthonormalize`] or a factorization. No
    /// normalization is applied here, so feeding a scaled or sheared
    /// block produces a correspondingly invalid quaternion.
    pub fn extract_rotation_quat(&self) -> Quatd {
        let m = &self.m;

        // Largest diagonal term keeps the divisions well away from
        // zero.
        let i = if m[0][0] > m[1][1] {
            if m[0][0] > m[2][2] {
                0
            } else {
                2
            }
        } else if m[1][1] > m[2][2] {
            1
        } else {
            2
        };

        let mut im = Vec3d::ZERO;
        let r;

        if m[0][0] + m[1][1] + m[2][2] > m[i][i] {
            r = 0.5 * (m[0][0] + m[1][1] + m[2][2] + m[3][3]).sqrt();
            im = Vec3d::new(
                (m[1][2] - m[2][1]) / (4.0 * r),
                (m[2][0] - m[0][2]) / (4.0 * r),
                (m[0][1] - m[1][0]) / (4.0 * r),
            );
        } else {
            let j = (i + 1) % 3;
            let k = (i + 2) % 3;
            let q = 0.5 * (m[i][i] - m[j][j] - m[k][k] + m[3][3]).sqrt();

            im[i] = q;
            im[j] = (m[i][j] + m[j][i]) / (4.0 * q);
            im[k] = (m[k][i] + m[i][k]) / (4.0 * q);
            r = (m[j][k] - m[k][j]) / (4.0 * q);
        }

        Quatd::new(r.clamp(-1.0, 1.0), im)
    }

    /// Extract the rotation as an axis/angle value. Same orthonormal
    /// precondition as [`Matrix4d::extract_rotation_quat`].
    pub fn extract_rotation(&self) -> Rotation {
        Rotation::from_quat(self.extract_rotation_quat())
    }

    /// The upper 3×3 block as a matrix.
    pub fn extract_rotation_matrix(&self) -> Matrix3d {
        Matrix3d::new(
            self.m[0][0], self.m[0][1], self.m[0][2],
            self.m[1][0], self.m[1][1], self.m[1][2],
            self.m[2][0], self.m[2][1], self.m[2][2],
        )
    }

    /// The translation row as a vector.
    pub fn extract_translation(&self) -> Vec3d {
        Vec3d::new(self.m[3][0], self.m[3][1], self.m[3][2])
    }

    /// Make the rotation block orthonormal in place using the
    /// iterative basis correction; potentially slow if the rows start
    /// out close to colinear, but as cheap as a plain Gram-Schmidt in
    /// the common near-orthonormal case.
    ///
    /// The translation is left intact, except that a homogeneous
    /// coordinate (a non-unity `[3][3]`) is divided out unless it is
    /// close to zero. Returns false if the basis correction did not
    /// converge; the matrix then holds the partial correction, and a
    /// warning is logged when `warn` is set.
    pub fn orthonormalize(&mut self, warn: bool) -> bool {
        let mut r0 = Vec3d::new(self.m[0][0], self.m[0][1], self.m[0][2]);
        let mut r1 = Vec3d::new(self.m[1][0], self.m[1][1], self.m[1][2]);
        let mut r2 = Vec3d::new(self.m[2][0], self.m[2][1], self.m[2][2]);
        let result = Vec3d::orthogonalize_basis(&mut r0, &mut r1, &mut r2, true);
        self.m[0][0] = r0.x;
        self.m[0][1] = r0.y;
        self.m[0][2] = r0.z;
        self.m[1][0] = r1.x;
        self.m[1][1] = r1.y;
        self.m[1][2] = r1.z;
        self.m[2][0] = r2.x;
        self.m[2][1] = r2.y;
        self.m[2][2] = r2.z;

        // Divide out any homogeneous coordinate - unless it's zero.
        if self.m[3][3] != 1.0 && !math::is_close(self.m[3][3], 0.0, MIN_VECTOR_LENGTH) {
            self.m[3][0] /= self.m[3][3];
            self.m[3][1] /= self.m[3][3];
            self.m[3][2] /= self.m[3][3];
            self.m[3][3] = 1.0;
        }

        if !result && warn {
            log::warn!("orthogonalize_basis did not converge, matrix may not be orthonormal");
        }

        result
    }

    /// Returns the orthonormalized matrix; see
    /// [`Matrix4d::orthonormalize`].
    pub fn orthonormalized(&self, warn: bool) -> Matrix4d {
        let mut result = *self;
        result.orthonormalize(warn);
        result
    }

    /// The transform with scale and shear factored out: rotation and
    /// translation only. Returns `self` unchanged if the factorization
    /// reports singular input.
    pub fn remove_scale_shear(&self) -> Matrix4d {
        let f = self.factor();
        if f.is_singular {
            return *self;
        }

        let mut rot = f.shear;
        rot.orthonormalize(true);
        rot * Matrix4d::from_translate(f.translation)
    }

    /// Transform a point (row vector, w = 1), dividing out the
    /// homogeneous coordinate unless it comes out zero.
    pub fn transform_point(&self, p: Vec3d) -> Vec3d {
        let h = Vec4d::from_vec3(p, 1.0) * *self;
        if h.w != 0.0 {
            Vec3d::new(h.x / h.w, h.y / h.w, h.z / h.w)
        } else {
            h.truncate()
        }
    }

    /// Transform a direction (w = 0): rotation and scale apply,
    /// translation does not.
    pub fn transform_dir(&self, v: Vec3d) -> Vec3d {
        (Vec4d::from_vec3(v, 0.0) * *self).truncate()
    }

    /// Transform a point assuming the matrix is affine (last column
    /// (0, 0, 0, 1)); skips the homogeneous divide.
    pub fn transform_affine(&self, p: Vec3d) -> Vec3d {
        let m = &self.m;
        Vec3d::new(
            p.x * m[0][0] + p.y * m[1][0] + p.z * m[2][0] + m[3][0],
            p.x * m[0][1] + p.y * m[1][1] + p.z * m[2][1] + m[3][1],
            p.x * m[0][2] + p.y * m[1][2] + p.z * m[2][2] + m[3][2],
        )
    }

    /// Transform an axis-aligned range: the bound of its eight
    /// transformed corners.
    pub fn transform_range(&self, r: &Range3d) -> Range3d {
        if r.is_empty() {
            return Range3d::EMPTY;
        }

        let mut out = Range3d::EMPTY;
        for corner in 0..8 {
            let p = Vec3d::new(
                if corner & 1 == 0 { r.min.x } else { r.max.x },
                if corner & 2 == 0 { r.min.y } else { r.max.y },
                if corner & 4 == 0 { r.min.z } else { r.max.z },
            );
            out.extend_by(self.transform_point(p));
        }
        out
    }

    /// True if every one of the sixteen entry pairs differs by at most
    /// `tolerance` (entrywise, not a matrix norm).
    pub fn is_close(&self, other: &Matrix4d, tolerance: f64) -> bool {
        for row in 0..4 {
            for col in 0..4 {
                if !math::is_close(self.m[row][col], other.m[row][col], tolerance) {
                    return false;
                }
            }
        }
        true
    }

    fn set_rotate_from_quat(&mut self, r: f64, i: Vec3d) {
        self.m[0][0] = 1.0 - 2.0 * (i.y * i.y + i.z * i.z);
        self.m[0][1] = 2.0 * (i.x * i.y + i.z * r);
        self.m[0][2] = 2.0 * (i.z * i.x - i.y * r);

        self.m[1][0] = 2.0 * (i.x * i.y - i.z * r);
        self.m[1][1] = 1.0 - 2.0 * (i.z * i.z + i.x * i.x);
        self.m[1][2] = 2.0 * (i.y * i.z + i.x * r);

        self.m[2][0] = 2.0 * (i.z * i.x + i.y * r);
        self.m[2][1] = 2.0 * (i.y * i.z - i.x * r);
        self.m[2][2] = 1.0 - 2.0 * (i.y * i.y + i.x * i.x);
    }
}

impl Default for Matrix4d {
    fn default() -> Self {
        Matrix4d::IDENTITY
    }
}

impl Index<usize> for Matrix4d {
    type Output = [f64; 4];

    fn index(&self, row: usize) -> &[f64; 4] {
        &self.m[row]
    }
}

impl IndexMut<usize> for Matrix4d {
    fn index_mut(&mut self, row: usize) -> &mut [f64; 4] {
        &mut self.m[row]
    }
}

impl MulAssign for Matrix4d {
    fn mul_assign(&mut self, rhs: Matrix4d) {
        // Read from a copy so `m *= m` computes the right product.
        let tmp = *self;
        for row in 0..4 {
            for col in 0..4 {
                self.m[row][col] = tmp.m[row][0] * rhs.m[0][col]
                    + tmp.m[row][1] * rhs.m[1][col]
                    + tmp.m[row][2] * rhs.m[2][col]
                    + tmp.m[row][3] * rhs.m[3][col];
            }
        }
    }
}

impl Mul for Matrix4d {
    type Output = Matrix4d;

    fn mul(self, rhs: Matrix4d) -> Matrix4d {
        let mut out = self;
        out *= rhs;
        out
    }
}

impl AddAssign for Matrix4d {
    fn add_assign(&mut self, rhs: Matrix4d) {
        for row in 0..4 {
            for col in 0..4 {
                self.m[row][col] += rhs.m[row][col];
            }
        }
    }
}

impl Add for Matrix4d {
    type Output = Matrix4d;

    fn add(self, rhs: Matrix4d) -> Matrix4d {
        let mut out = self;
        out += rhs;
        out
    }
}

impl SubAssign for Matrix4d {
    fn sub_assign(&mut self, rhs: Matrix4d) {
        for row in 0..4 {
            for col in 0..4 {
                self.m[row][col] -= rhs.m[row][col];
            }
        }
    }
}

impl Sub for Matrix4d {
    type Output = Matrix4d;

    fn sub(self, rhs: Matrix4d) -> Matrix4d {
        let mut out = self;
        out -= rhs;
        out
    }
}

impl Neg for Matrix4d {
    type Output = Matrix4d;

    fn neg(self) -> Matrix4d {
        let mut out = self;
        for row in 0..4 {
            for col in 0..4 {
                out.m[row][col] = -out.m[row][col];
            }
        }
        out
    }
}

impl MulAssign<f64> for Matrix4d {
    fn mul_assign(&mut self, s: f64) {
        for row in 0..4 {
            for col in 0..4 {
                self.m[row][col] *= s;
            }
        }
    }
}

impl Mul<f64> for Matrix4d {
    type Output = Matrix4d;

    fn mul(self, s: f64) -> Matrix4d {
        let mut out = self;
        out *= s;
        out
    }
}

impl Mul<Matrix4d> for f64 {
    type Output = Matrix4d;

    fn mul(self, m: Matrix4d) -> Matrix4d {
        m * self
    }
}

/// Row vector times matrix: `v'ⱼ = Σᵢ vᵢ·m[i][j]`. This is the
/// convention under which the translation row applies to points.
impl Mul<Matrix4d> for Vec4d {
    type Output = Vec4d;

    fn mul(self, m: Matrix4d) -> Vec4d {
        Vec4d::new(
            self.x * m.m[0][0] + self.y * m.m[1][0] + self.z * m.m[2][0] + self.w * m.m[3][0],
            self.x * m.m[0][1] + self.y * m.m[1][1] + self.z * m.m[2][1] + self.w * m.m[3][1],
            self.x * m.m[0][2] + self.y * m.m[1][2] + self.z * m.m[2][2] + self.w * m.m[3][2],
            self.x * m.m[0][3] + self.y * m.m[1][3] + self.z * m.m[2][3] + self.w * m.m[3][3],
        )
    }
}

/// Matrix times column vector: `v'ᵢ = Σⱼ m[i][j]·vⱼ`.
impl Mul<Vec4d> for Matrix4d {
    type Output = Vec4d;

    fn mul(self, v: Vec4d) -> Vec4d {
        Vec4d::new(
            v.x * self.m[0][0] + v.y * self.m[0][1] + v.z * self.m[0][2] + v.w * self.m[0][3],
            v.x * self.m[1][0] + v.y * self.m[1][1] + v.z * self.m[1][2] + v.w * self.m[1][3],
            v.x * self.m[2][0] + v.y * self.m[2][1] + v.z * self.m[2][2] + v.w * self.m[2][3],
            v.x * self.m[3][0] + v.y * self.m[3][1] + v.z * self.m[3][2] + v.w * self.m[3][3],
        )
    }
}

impl fmt::Display for Matrix4d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.m;
        write!(
            f,
            "( ({}, {}, {}, {}), ({}, {}, {}, {}), ({}, {}, {}, {}), ({}, {}, {}, {}) )",
            m[0][0], m[0][1], m[0][2], m[0][3],
            m[1][0], m[1][1], m[1][2], m[1][3],
            m[2][0], m[2][1], m[2][2], m[2][3],
            m[3][0], m[3][1], m[3][2], m[3][3],
        )
    }
}

struct Cursor<'a> {
    s: &'a str,
    pos: usize,
}

impl Cursor<'_> {
    fn skip_ws(&mut self) {
        let bytes = self.s.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn expect(&mut self, c: u8) -> Result<(), ParseMatrixError> {
        self.skip_ws();
        let bytes = self.s.as_bytes();
        if self.pos < bytes.len() && bytes[self.pos] == c {
            self.pos += 1;
            Ok(())
        } else {
            let expected = match c {
                b'(' => "'('",
                b')' => "')'",
                b',' => "','",
                _ => "delimiter",
            };
            Err(ParseMatrixError::Expected { expected, pos: self.pos })
        }
    }

    fn number(&mut self) -> Result<f64, ParseMatrixError> {
        self.skip_ws();
        let bytes = self.s.as_bytes();
        let start = self.pos;
        while self.pos < bytes.len()
            && matches!(bytes[self.pos],
                b'0'..=b'9' | b'+' | b'-' | b'.' | b'e' | b'E'
                | b'i' | b'n' | b'f' | b'a' | b'N')
        {
            self.pos += 1;
        }
        if self.pos == start {
            return Err(ParseMatrixError::Expected { expected: "number", pos: start });
        }
        let tok = &self.s[start..self.pos];
        tok.parse()
            .map_err(|_| ParseMatrixError::InvalidNumber(tok.to_string()))
    }
}

/// Parses the same `( (..), (..), (..), (..) )` form that `Display`
/// produces.
impl FromStr for Matrix4d {
    type Err = ParseMatrixError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut cur = Cursor { s, pos: 0 };
        cur.expect(b'(')?;
        let mut m = [[0.0; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            if i > 0 {
                cur.expect(b',')?;
            }
            cur.expect(b'(')?;
            for (j, v) in row.iter_mut().enumerate() {
                if j > 0 {
                    cur.expect(b',')?;
                }
                *v = cur.number()?;
            }
            cur.expect(b')')?;
        }
        cur.expect(b')')?;
        cur.skip_ws();
        if cur.pos != s.len() {
            return Err(ParseMatrixError::TrailingInput);
        }
        Ok(Matrix4d::from_rows(m))
    }
}

// The row-vector convention stores a transform transposed relative to
// glam's column-vector convention, so the row-major flattening of this
// matrix is exactly the column array DMat4 expects. The conversion is
// a reinterpretation, not a transpose:
// `DMat4::from(m).transform_point3(p) == m.transform_point(p)`.
impl From<Matrix4d> for glam::DMat4 {
    fn from(m: Matrix4d) -> Self {
        glam::DMat4::from_cols_array_2d(&m.m)
    }
}

impl From<glam::DMat4> for Matrix4d {
    fn from(m: glam::DMat4) -> Self {
        Matrix4d::from_rows(m.to_cols_array_2d())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quat_about(axis: Vec3d, degrees: f64) -> Quatd {
        Rotation::new(axis, degrees).quat()
    }

    /// An arbitrary well-conditioned affine transform.
    fn composite() -> Matrix4d {
        Matrix4d::from_scale_vec(Vec3d::new(2.0, 3.0, 4.0))
            * Matrix4d::from_quat(quat_about(Vec3d::new(1.0, 2.0, -1.0), 37.0))
            * Matrix4d::from_translate(Vec3d::new(1.0, -2.0, 3.0))
    }

    #[test]
    fn test_identity_determinant() {
        assert_eq!(Matrix4d::from_diagonal(1.0).determinant(), 1.0);
        assert_eq!(Matrix4d::IDENTITY.determinant(), 1.0);
    }

    #[test]
    fn test_diagonal_vs_scale_inverse() {
        // from_diagonal(2) scales the whole diagonal, so its inverse
        // halves all four entries; from_scale(2) leaves [3][3] at 1.
        let d = Matrix4d::from_diagonal(2.0).inverse();
        for i in 0..4 {
            assert_eq!(d[i][i], 0.5);
        }

        let s = Matrix4d::from_scale(2.0).inverse();
        assert_eq!(s[0][0], 0.5);
        assert_eq!(s[1][1], 0.5);
        assert_eq!(s[2][2], 0.5);
        assert_eq!(s[3][3], 1.0);
    }

    #[test]
    fn test_inverse_round_trip() {
        let m = composite();
        let round = m * m.inverse();
        assert!(round.is_close(&Matrix4d::IDENTITY, 1e-9));

        let round2 = m.inverse() * m;
        assert!(round2.is_close(&Matrix4d::IDENTITY, 1e-9));
    }

    #[test]
    fn test_inverse_matches_glam() {
        let m = composite();
        let ours = m.inverse();
        let glams = Matrix4d::from(glam::DMat4::from(m).inverse());
        assert!(ours.is_close(&glams, 1e-9));
    }

    #[test]
    fn test_determinant_multiplicative() {
        let a = composite();
        let b = Matrix4d::from_rows_ragged(&[
            &[3.0, 1.0, 0.0, 0.0],
            &[-1.0, 2.0, 0.5, 0.0],
            &[0.0, 0.25, 4.0, 0.0],
            &[5.0, -6.0, 7.0, 1.0],
        ]);
        let lhs = (a * b).determinant();
        let rhs = a.determinant() * b.determinant();
        assert!((lhs - rhs).abs() <= 1e-9 * rhs.abs().max(1.0));
    }

    #[test]
    fn test_determinant_matches_glam() {
        let m = composite();
        let g = glam::DMat4::from(m).determinant();
        assert!((m.determinant() - g).abs() < 1e-9 * g.abs().max(1.0));
    }

    #[test]
    fn test_transpose_involution_exact() {
        let m = Matrix4d::new(
            1.0, 2.0, 3.0, 4.0,
            5.0, 6.0, 7.0, 8.0,
            9.0, 10.0, 11.0, 12.0,
            13.0, 14.0, 15.0, 16.0,
        );
        assert_eq!(m.transpose().transpose(), m);
    }

    #[test]
    fn test_singular_sentinel() {
        let m = Matrix4d::new(
            1.0, 2.0, 3.0, 4.0,
            0.0, 0.0, 0.0, 0.0,
            5.0, 6.0, 7.0, 8.0,
            9.0, 10.0, 11.0, 12.0,
        );

        let (inv, det) = m.inverse_det(0.0);
        assert_eq!(det, 0.0);
        assert_eq!(inv[0][0], f64::MAX);
        assert_eq!(inv[1][1], f64::MAX);
        assert_eq!(inv[2][2], f64::MAX);
        assert_eq!(inv[3][3], 1.0);
        assert_eq!(inv[0][1], 0.0);

        assert_eq!(
            m.try_inverse(0.0),
            Err(SingularMatrix { determinant: 0.0 })
        );
        assert!(Matrix4d::IDENTITY.try_inverse(0.0).is_ok());
    }

    #[test]
    fn test_mul_assign_self_is_safe() {
        let mut m = composite();
        let expected = m * m;
        m *= m;
        assert_eq!(m, expected);
    }

    #[test]
    fn test_vector_conventions() {
        let t = Matrix4d::from_translate(Vec3d::new(1.0, 2.0, 3.0));

        // A row vector picks up the translation row through its w.
        let p = Vec4d::new(0.0, 0.0, 0.0, 1.0) * t;
        assert_eq!(p, Vec4d::new(1.0, 2.0, 3.0, 1.0));

        // A column vector does not: the last column is (0,0,0,1).
        let q = t * Vec4d::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!(q, Vec4d::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_transform_helpers() {
        let t = Matrix4d::from_translate(Vec3d::new(1.0, 2.0, 3.0));
        let p = Vec3d::new(1.0, 1.0, 1.0);
        assert_eq!(t.transform_point(p), Vec3d::new(2.0, 3.0, 4.0));
        assert_eq!(t.transform_affine(p), Vec3d::new(2.0, 3.0, 4.0));
        assert_eq!(t.transform_dir(p), p);

        // The affine path and the glam interop agree on points.
        let m = composite();
        let g = glam::DMat4::from(m);
        let gp: Vec3d = g.transform_point3(p.into()).into();
        assert!(m.transform_point(p).is_close(&gp, 1e-12));
    }

    #[test]
    fn test_transform_range() {
        let t = Matrix4d::from_translate(Vec3d::new(10.0, 0.0, 0.0));
        let r = Range3d::new(Vec3d::ZERO, Vec3d::splat(1.0));
        let out = t.transform_range(&r);
        assert_eq!(out.min, Vec3d::new(10.0, 0.0, 0.0));
        assert_eq!(out.max, Vec3d::new(11.0, 1.0, 1.0));

        // Rotating a box grows the bound to cover the corners.
        let rot = Matrix4d::from_quat(quat_about(Vec3d::Z_AXIS, 45.0));
        let spun = rot.transform_range(&Range3d::new(Vec3d::splat(-1.0), Vec3d::splat(1.0)));
        assert!((spun.max.x - 2.0f64.sqrt()).abs() < 1e-12);

        assert!(t.transform_range(&Range3d::EMPTY).is_empty());
    }

    #[test]
    fn test_jacobi_reconstruction() {
        // A symmetric positive-definite Gram matrix with mixed terms.
        let a = Matrix4d::from_quat(quat_about(Vec3d::new(0.3, 1.0, -0.5), 28.0))
            * Matrix4d::from_scale_vec(Vec3d::new(2.0, 3.0, 4.0));
        let b = a * a.transpose();

        let (eigenvalues, eigenvectors) = b.jacobi3();

        // Eigenvalues of a Gram matrix are non-negative.
        for i in 0..3 {
            assert!(eigenvalues[i] >= 0.0);
        }

        // Eigenvectors are orthonormal.
        for i in 0..3 {
            assert!((eigenvectors[i].length() - 1.0).abs() < 1e-9);
            for j in (i + 1)..3 {
                assert!(eigenvectors[i].dot(eigenvectors[j]).abs() < 1e-9);
            }
        }

        // V diag(w) V-transpose reproduces the input.
        let v = Matrix4d::new(
            eigenvectors[0].x, eigenvectors[0].y, eigenvectors[0].z, 0.0,
            eigenvectors[1].x, eigenvectors[1].y, eigenvectors[1].z, 0.0,
            eigenvectors[2].x, eigenvectors[2].y, eigenvectors[2].z, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        let d = Matrix4d::from_diagonal_vec(Vec4d::new(
            eigenvalues.x, eigenvalues.y, eigenvalues.z, 1.0,
        ));
        let recon = v * d * v.transpose();
        let scale = b[0][0].abs().max(b[1][1].abs()).max(b[2][2].abs());
        assert!(recon.is_close(&b, 1e-6 * scale));
    }

    #[test]
    fn test_factor_reconstruction() {
        let scale = Vec3d::new(2.0, 3.0, 4.0);
        let q = quat_about(Vec3d::new(1.0, 0.5, 0.25), 42.0);
        let t = Vec3d::new(1.0, -2.0, 3.0);
        let m = Matrix4d::from_scale_vec(scale)
            * Matrix4d::from_quat(q)
            * Matrix4d::from_translate(t);

        let f = m.factor();
        assert!(!f.is_singular);
        assert_eq!(f.projection, Matrix4d::IDENTITY);

        // Translation is recovered exactly: it passes through the
        // product untouched.
        assert_eq!(f.translation, t);

        // Scales match up to eigensolver tolerance (handedness is
        // positive here, so all signs are positive).
        for i in 0..3 {
            assert!((f.scale[i] - scale[i]).abs() < 1e-6);
        }

        // rotation * diag(scale) * rotation-transpose * shear
        // reconstructs the linear block.
        let s4 = Matrix4d::from_diagonal_vec(Vec4d::new(f.scale.x, f.scale.y, f.scale.z, 1.0));
        let recon = f.rotation * s4 * f.rotation.transpose() * f.shear;
        let mut linear = m;
        linear.set_translate_only(Vec3d::ZERO);
        assert!(recon.is_close(&linear, 1e-6));
    }

    #[test]
    fn test_factor_negative_handedness() {
        let m = Matrix4d::from_scale_vec(Vec3d::new(-2.0, 3.0, 4.0));
        assert!(m.is_left_handed());

        let f = m.factor();
        assert!(!f.is_singular);
        // All scale signs follow the handedness of the input.
        for i in 0..3 {
            assert!(f.scale[i] < 0.0);
        }
        let product = f.scale.x * f.scale.y * f.scale.z;
        assert!((product - m.determinant3()).abs() < 1e-6);
    }

    #[test]
    fn test_factor_singular_input_clamps() {
        let m = Matrix4d::from_scale_vec(Vec3d::new(2.0, 3.0, 0.0));
        let f = m.factor();
        assert!(f.is_singular);
        // The collapsed axis clamps to eps instead of zero, so every
        // factor stays finite.
        assert!((f.scale.z - 1e-10).abs() < 1e-25);
        for row in 0..4 {
            for col in 0..4 {
                assert!(f.shear[row][col].is_finite());
            }
        }
    }

    #[test]
    fn test_extract_rotation_quat_round_trip() {
        let quats = [
            quat_about(Vec3d::Z_AXIS, 30.0),
            quat_about(Vec3d::new(1.0, 1.0, 1.0), 120.0),
            quat_about(Vec3d::X_AXIS, 180.0), // negative-trace branch
            quat_about(Vec3d::new(-0.5, 2.0, 0.1), 179.0),
            quat_about(Vec3d::Y_AXIS, 0.0),
        ];
        for q in quats {
            let m = Matrix4d::from_quat(q);
            let e = m.extract_rotation_quat();
            // q and -q encode the same rotation; rebuilding the matrix
            // removes the sign ambiguity.
            assert!(Matrix4d::from_quat(e).is_close(&m, 1e-12));
        }
    }

    #[test]
    fn test_extract_rotation_and_translation() {
        let rot = Rotation::new(Vec3d::new(0.0, 1.0, 0.0), 90.0);
        let t = Vec3d::new(5.0, 6.0, 7.0);
        let m = Matrix4d::from_rotate_translate(&rot, t);

        assert_eq!(m.extract_translation(), t);

        let back = m.extract_rotation();
        assert!(back.axis().is_close(&rot.axis(), 1e-12));
        assert!((back.angle() - rot.angle()).abs() < 1e-10);

        let block = m.extract_rotation_matrix();
        assert!((block.determinant() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_orthonormalize_scaled_rotation() {
        let q = quat_about(Vec3d::new(1.0, 2.0, 3.0), 55.0);
        let t = Vec3d::new(4.0, 5.0, 6.0);
        let mut m = Matrix4d::from_scale(2.0)
            * Matrix4d::from_quat(q)
            * Matrix4d::from_translate(t);

        assert!(m.orthonormalize(false));

        // Rows of the rotation block are unit and orthogonal.
        let pure = Matrix4d::from_quat(q);
        assert!((m.extract_rotation_matrix().determinant() - 1.0).abs() < 1e-9);
        for i in 0..3 {
            let row = Vec3d::new(m[i][0], m[i][1], m[i][2]);
            assert!((row.length() - 1.0).abs() < 1e-9);
            let expect = Vec3d::new(pure[i][0], pure[i][1], pure[i][2]);
            assert!(row.is_close(&expect, 1e-6));
        }

        // Translation is untouched.
        assert_eq!(m.extract_translation(), t);
    }

    #[test]
    fn test_orthonormalize_divides_homogeneous() {
        let mut m = Matrix4d::IDENTITY;
        m.set_translate_only(Vec3d::new(2.0, 4.0, 6.0));
        m[3][3] = 2.0;

        assert!(m.orthonormalize(false));
        assert_eq!(m.extract_translation(), Vec3d::new(1.0, 2.0, 3.0));
        assert_eq!(m[3][3], 1.0);
    }

    #[test]
    fn test_orthonormalize_colinear_rows_fail() {
        let mut m = Matrix4d::new(
            1.0, 0.0, 0.0, 0.0,
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );
        assert!(!m.orthonormalize(false));
    }

    #[test]
    fn test_remove_scale_shear() {
        let q = quat_about(Vec3d::new(2.0, -1.0, 0.5), 33.0);
        let t = Vec3d::new(1.0, 2.0, 3.0);
        let m = Matrix4d::from_scale_vec(Vec3d::new(2.0, 5.0, 0.5))
            * Matrix4d::from_quat(q)
            * Matrix4d::from_translate(t);

        let clean = m.remove_scale_shear();
        assert_eq!(clean.extract_translation(), t);

        // The remaining block is a pure rotation.
        let block = clean.extract_rotation_matrix();
        assert!((block.determinant() - 1.0).abs() < 1e-6);
        let prod = block * block.transpose();
        for i in 0..3 {
            for j in 0..3 {
                let expect = if i == j { 1.0 } else { 0.0 };
                assert!((prod[i][j] - expect).abs() < 1e-6);
            }
        }

        // Singular input comes back unchanged.
        let degenerate = Matrix4d::from_scale_vec(Vec3d::new(1.0, 1.0, 0.0));
        assert_eq!(degenerate.remove_scale_shear(), degenerate);
    }

    #[test]
    fn test_look_at() {
        let eye = Vec3d::new(0.0, 0.0, 5.0);
        let m = Matrix4d::from_look_at(eye, Vec3d::ZERO, Vec3d::Y_AXIS);

        // The eye maps to the origin, the origin to 5 units down -z.
        assert!(m.transform_point(eye).is_close(&Vec3d::ZERO, 1e-12));
        assert!(m
            .transform_point(Vec3d::ZERO)
            .is_close(&Vec3d::new(0.0, 0.0, -5.0), 1e-12));

        // Same camera expressed as an orientation: identity rotation,
        // since the view already points down -z.
        let m2 = Matrix4d::from_look_at_rotation(eye, &Rotation::identity());
        assert!(m.is_close(&m2, 1e-12));
    }

    #[test]
    fn test_is_close_boundary() {
        let m = composite();
        let mut ones = Matrix4d::ZERO;
        for row in 0..4 {
            for col in 0..4 {
                ones[row][col] = 1.0;
            }
        }
        let perturbed = m + ones * 1e-5;

        assert!(m.is_close(&perturbed, 2e-5));
        assert!(!m.is_close(&perturbed, 5e-6));
        assert!(m.is_close(&m, 0.0));
    }

    #[test]
    fn test_ragged_rows_keep_identity() {
        let m = Matrix4d::from_rows_ragged(&[&[1.0, 2.0], &[3.0]]);
        assert_eq!(m[0], [1.0, 2.0, 0.0, 0.0]);
        assert_eq!(m[1], [3.0, 1.0, 0.0, 0.0]);
        assert_eq!(m[2], [0.0, 0.0, 1.0, 0.0]);
        assert_eq!(m[3], [0.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_rows_columns() {
        let m = Matrix4d::new(
            1.0, 2.0, 3.0, 4.0,
            5.0, 6.0, 7.0, 8.0,
            9.0, 10.0, 11.0, 12.0,
            13.0, 14.0, 15.0, 16.0,
        );
        assert_eq!(m.row(1), Vec4d::new(5.0, 6.0, 7.0, 8.0));
        assert_eq!(m.column(2), Vec4d::new(3.0, 7.0, 11.0, 15.0));

        let mut m2 = m;
        m2.set_row(0, Vec4d::new(0.0, 0.0, 0.0, 0.0));
        assert_eq!(m2.row(0), Vec4d::ZERO);
        m2.set_column(3, Vec4d::new(1.0, 2.0, 3.0, 4.0));
        assert_eq!(m2.column(3), Vec4d::new(1.0, 2.0, 3.0, 4.0));
    }

    #[test]
    fn test_display_and_parse_round_trip() {
        let m = Matrix4d::IDENTITY;
        assert_eq!(
            m.to_string(),
            "( (1, 0, 0, 0), (0, 1, 0, 0), (0, 0, 1, 0), (0, 0, 0, 1) )"
        );

        let m2 = composite();
        let parsed: Matrix4d = m2.to_string().parse().unwrap();
        assert_eq!(parsed, m2);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            "nonsense".parse::<Matrix4d>(),
            Err(ParseMatrixError::Expected { .. })
        ));
        assert!(matches!(
            "( (1, 2, 3) )".parse::<Matrix4d>(),
            Err(ParseMatrixError::Expected { .. })
        ));
        let trailing = "( (1,0,0,0), (0,1,0,0), (0,0,1,0), (0,0,0,1) ) junk";
        assert_eq!(
            trailing.parse::<Matrix4d>(),
            Err(ParseMatrixError::TrailingInput)
        );
    }

    #[test]
    fn test_serde_round_trip() {
        let m = composite();
        let json = serde_json::to_string(&m).unwrap();
        let back: Matrix4d = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_scalar_ops() {
        let m = Matrix4d::IDENTITY * 3.0;
        assert_eq!(m[0][0], 3.0);
        assert_eq!((2.0 * Matrix4d::IDENTITY)[1][1], 2.0);
        assert_eq!((-Matrix4d::IDENTITY)[2][2], -1.0);
        assert_eq!((m - Matrix4d::IDENTITY)[0][0], 2.0);
        assert_eq!((m + Matrix4d::IDENTITY)[0][0], 4.0);
    }
}
