//! Axis-aligned 3D range (bounding box).
//!
//! A min/max corner pair per axis. The empty range is represented with
//! inverted infinities so that union-with-point works without a
//! special case.

use serde::{Deserialize, Serialize};

use crate::vec::Vec3d;

/// An axis-aligned range of 3D space, bounded by `min` and `max`
/// corners (inclusive).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range3d {
    pub min: Vec3d,
    pub max: Vec3d,
}

impl Range3d {
    /// The empty range (min > max on every axis, contains nothing).
    pub const EMPTY: Range3d = Range3d {
        min: Vec3d::splat(f64::INFINITY),
        max: Vec3d::splat(f64::NEG_INFINITY),
    };

    /// Create a range from its two corners.
    pub const fn new(min: Vec3d, max: Vec3d) -> Self {
        Self { min, max }
    }

    /// A degenerate range holding a single point.
    pub const fn from_point(p: Vec3d) -> Self {
        Self { min: p, max: p }
    }

    /// True if the range contains nothing.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Extent per axis (max - min).
    pub fn size(&self) -> Vec3d {
        self.max - self.min
    }

    /// Center of the range.
    pub fn midpoint(&self) -> Vec3d {
        0.5 * (self.min + self.max)
    }

    /// True if `p` lies inside the range (inclusive).
    pub fn contains_point(&self, p: Vec3d) -> bool {
        self.min.x <= p.x
            && p.x <= self.max.x
            && self.min.y <= p.y
            && p.y <= self.max.y
            && self.min.z <= p.z
            && p.z <= self.max.z
    }

    /// True if `other` lies entirely inside this range.
    pub fn contains_range(&self, other: &Range3d) -> bool {
        self.contains_point(other.min) && self.contains_point(other.max)
    }

    /// Grow the range to include `p`.
    pub fn extend_by(&mut self, p: Vec3d) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// The smallest range containing both inputs.
    pub fn union_with(&self, other: &Range3d) -> Range3d {
        let mut out = *self;
        out.extend_by(other.min);
        out.extend_by(other.max);
        out
    }

    /// The overlap of the two ranges (empty if they are disjoint).
    pub fn intersection(&self, other: &Range3d) -> Range3d {
        Range3d::new(
            Vec3d::new(
                self.min.x.max(other.min.x),
                self.min.y.max(other.min.y),
                self.min.z.max(other.min.z),
            ),
            Vec3d::new(
                self.max.x.min(other.max.x),
                self.max.y.min(other.max.y),
                self.max.z.min(other.max.z),
            ),
        )
    }
}

impl Default for Range3d {
    fn default() -> Self {
        Range3d::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_contains_nothing() {
        let r = Range3d::EMPTY;
        assert!(r.is_empty());
        assert!(!r.contains_point(Vec3d::ZERO));
    }

    #[test]
    fn test_extend_from_empty() {
        let mut r = Range3d::EMPTY;
        r.extend_by(Vec3d::new(1.0, 2.0, 3.0));
        r.extend_by(Vec3d::new(-1.0, 0.0, 5.0));
        assert_eq!(r.min, Vec3d::new(-1.0, 0.0, 3.0));
        assert_eq!(r.max, Vec3d::new(1.0, 2.0, 5.0));
    }

    #[test]
    fn test_union_and_intersection() {
        let a = Range3d::new(Vec3d::ZERO, Vec3d::splat(2.0));
        let b = Range3d::new(Vec3d::splat(1.0), Vec3d::splat(3.0));

        let u = a.union_with(&b);
        assert_eq!(u.min, Vec3d::ZERO);
        assert_eq!(u.max, Vec3d::splat(3.0));

        let i = a.intersection(&b);
        assert_eq!(i.min, Vec3d::splat(1.0));
        assert_eq!(i.max, Vec3d::splat(2.0));
    }

    #[test]
    fn test_disjoint_intersection_is_empty() {
        let a = Range3d::new(Vec3d::ZERO, Vec3d::splat(1.0));
        let b = Range3d::new(Vec3d::splat(2.0), Vec3d::splat(3.0));
        assert!(a.intersection(&b).is_empty());
    }

    #[test]
    fn test_size_and_midpoint() {
        let r = Range3d::new(Vec3d::ZERO, Vec3d::new(2.0, 4.0, 6.0));
        assert_eq!(r.size(), Vec3d::new(2.0, 4.0, 6.0));
        assert_eq!(r.midpoint(), Vec3d::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_contains_range() {
        let outer = Range3d::new(Vec3d::ZERO, Vec3d::splat(10.0));
        let inner = Range3d::new(Vec3d::splat(1.0), Vec3d::splat(2.0));
        assert!(outer.contains_range(&inner));
        assert!(!inner.contains_range(&outer));
    }
}
