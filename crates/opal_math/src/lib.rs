//! Opal Math - double-precision transform math for scene pipelines.
//!
//! This crate provides:
//!
//! - **Value types**: `Matrix4d`, `Matrix3d`, `Vec3d`, `Vec4d`, `Quatd`,
//!   `Rotation`, `Range3d`
//! - **Transform analysis**: cofactor inversion with a singular
//!   sentinel, polar factorization into rotation/scale/shear/translation,
//!   rotation extraction, iterative orthonormalization
//!
//! Matrices are row-major with row-vector semantics (`p * M`,
//! translation in the last row) and convert losslessly to and from the
//! `glam` double-precision types for use in a render stack.
//!
//! # Example
//!
//! ```
//! use opal_math::{Matrix4d, Rotation, Vec3d};
//!
//! let m = Matrix4d::from_rotate_translate(
//!     &Rotation::new(Vec3d::Z_AXIS, 90.0),
//!     Vec3d::new(1.0, 2.0, 3.0),
//! );
//!
//! let f = m.factor();
//! assert!(!f.is_singular);
//! assert_eq!(f.translation, Vec3d::new(1.0, 2.0, 3.0));
//! ```

pub mod math;
pub mod matrix3;
pub mod matrix4;
pub mod quat;
pub mod range3;
pub mod rotation;
pub mod vec;

// Re-export commonly used types
pub use math::{is_close, MIN_VECTOR_LENGTH};
pub use matrix3::Matrix3d;
pub use matrix4::{Factorization, Matrix4d, ParseMatrixError, SingularMatrix};
pub use quat::Quatd;
pub use range3::Range3d;
pub use rotation::Rotation;
pub use vec::{Vec3d, Vec4d};
