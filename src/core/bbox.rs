//! Axis-aligned bounding volume for the reconstruction.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl BoundingBox {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    /// Cube `[-half_extent, half_extent]³`.
    pub fn cube(half_extent: f32) -> Self {
        Self::new(Vector3::repeat(-half_extent), Vector3::repeat(half_extent))
    }

    /// Per-axis min/max of `points`, each corner multiplied by `enlarge`.
    ///
    /// The multiplication is about the origin, not the box center, so a box
    /// that does not straddle the origin shifts as well as grows. Returns
    /// `None` for an empty point set.
    pub fn from_points_enlarged(points: &[Vector3<f32>], enlarge: f32) -> Option<Self> {
        let first = points.first()?;
        let (min, max) = points.iter().fold((*first, *first), |(lo, hi), p| {
            (lo.inf(p), hi.sup(p))
        });
        Some(Self::new(min * enlarge, max * enlarge))
    }

    /// True when *any* coordinate of `p` lies within that axis' range.
    ///
    /// This is deliberately weaker than full containment; see
    /// [`crate::tetra::filter_points_in_bounding_box`].
    pub fn contains_any_axis(&self, p: &Vector3<f32>) -> bool {
        (0..3).any(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }

    /// True when every coordinate of `p` lies within range.
    pub fn contains(&self, p: &Vector3<f32>) -> bool {
        (0..3).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }

    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    pub fn extent(&self) -> Vector3<f32> {
        self.max - self.min
    }
}
