//! Double-precision 3×3 matrix, row-major.
//!
//! Mostly the exchange type for the rotation block of `Matrix4d`
//! (`set_rotate_mat`, `extract_rotation_matrix`); carries just the
//! algebra those paths need.

use std::fmt;
use std::ops::{Index, IndexMut, Mul};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::vec::Vec3d;

/// A 3×3 f64 matrix with row-major storage (`m[row][col]`).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Pod, Zeroable)]
pub struct Matrix3d {
    m: [[f64; 3]; 3],
}

impl Matrix3d {
    pub const IDENTITY: Matrix3d = Matrix3d {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Create a matrix from nine scalars in row-major order.
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        m00: f64, m01: f64, m02: f64,
        m10: f64, m11: f64, m12: f64,
        m20: f64, m21: f64, m22: f64,
    ) -> Self {
        Self {
            m: [[m00, m01, m02], [m10, m11, m12], [m20, m21, m22]],
        }
    }

    /// Create a matrix from row-major nested arrays.
    pub const fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self { m: rows }
    }

    /// Create a matrix with `s` on the diagonal and zeros elsewhere.
    pub const fn from_diagonal(s: f64) -> Self {
        Self {
            m: [[s, 0.0, 0.0], [0.0, s, 0.0], [0.0, 0.0, s]],
        }
    }

    /// The raw row-major storage.
    pub const fn rows(&self) -> [[f64; 3]; 3] {
        self.m
    }

    /// Row `i` as a vector.
    pub fn row(&self, i: usize) -> Vec3d {
        Vec3d::new(self.m[i][0], self.m[i][1], self.m[i][2])
    }

    /// The transposed matrix.
    pub fn transpose(&self) -> Matrix3d {
        let m = &self.m;
        Matrix3d::new(
            m[0][0], m[1][0], m[2][0],
            m[0][1], m[1][1], m[2][1],
            m[0][2], m[1][2], m[2][2],
        )
    }

    /// The determinant, by cofactor expansion along the first row.
    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }
}

impl Index<usize> for Matrix3d {
    type Output = [f64; 3];

    fn index(&self, row: usize) -> &[f64; 3] {
        &self.m[row]
    }
}

impl IndexMut<usize> for Matrix3d {
    fn index_mut(&mut self, row: usize) -> &mut [f64; 3] {
        &mut self.m[row]
    }
}

impl Mul for Matrix3d {
    type Output = Matrix3d;

    fn mul(self, rhs: Matrix3d) -> Matrix3d {
        let mut out = [[0.0; 3]; 3];
        for (row, out_row) in out.iter_mut().enumerate() {
            for (col, out_elem) in out_row.iter_mut().enumerate() {
                *out_elem = self.m[row][0] * rhs.m[0][col]
                    + self.m[row][1] * rhs.m[1][col]
                    + self.m[row][2] * rhs.m[2][col];
            }
        }
        Matrix3d { m: out }
    }
}

/// Row vector times matrix: `v'ⱼ = Σᵢ vᵢ·m[i][j]`.
impl Mul<Matrix3d> for Vec3d {
    type Output = Vec3d;

    fn mul(self, m: Matrix3d) -> Vec3d {
        Vec3d::new(
            self.x * m.m[0][0] + self.y * m.m[1][0] + self.z * m.m[2][0],
            self.x * m.m[0][1] + self.y * m.m[1][1] + self.z * m.m[2][1],
            self.x * m.m[0][2] + self.y * m.m[1][2] + self.z * m.m[2][2],
        )
    }
}

/// Matrix times column vector: `v'ᵢ = Σⱼ m[i][j]·vⱼ`.
impl Mul<Vec3d> for Matrix3d {
    type Output = Vec3d;

    fn mul(self, v: Vec3d) -> Vec3d {
        Vec3d::new(
            self.m[0][0] * v.x + self.m[0][1] * v.y + self.m[0][2] * v.z,
            self.m[1][0] * v.x + self.m[1][1] * v.y + self.m[1][2] * v.z,
            self.m[2][0] * v.x + self.m[2][1] * v.y + self.m[2][2] * v.z,
        )
    }
}

impl fmt::Display for Matrix3d {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let m = &self.m;
        write!(
            f,
            "( ({}, {}, {}), ({}, {}, {}), ({}, {}, {}) )",
            m[0][0], m[0][1], m[0][2],
            m[1][0], m[1][1], m[1][2],
            m[2][0], m[2][1], m[2][2],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_determinant() {
        assert_eq!(Matrix3d::IDENTITY.determinant(), 1.0);
    }

    #[test]
    fn test_determinant_scale() {
        let m = Matrix3d::from_diagonal(2.0);
        assert_eq!(m.determinant(), 8.0);
    }

    #[test]
    fn test_transpose_involution() {
        let m = Matrix3d::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        assert_eq!(m.transpose().transpose(), m);
    }

    #[test]
    fn test_product_with_identity() {
        let m = Matrix3d::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0);
        assert_eq!(m * Matrix3d::IDENTITY, m);
        assert_eq!(Matrix3d::IDENTITY * m, m);
    }

    #[test]
    fn test_vector_conventions_differ() {
        let m = Matrix3d::new(0.0, 1.0, 0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 1.0);
        let v = Vec3d::X_AXIS;
        // Row vector picks up row 0 of the matrix, column vector column 0.
        assert_eq!(v * m, Vec3d::new(0.0, 1.0, 0.0));
        assert_eq!(m * v, Vec3d::new(0.0, -1.0, 0.0));
    }
}
