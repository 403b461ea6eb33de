//! Closed-form fields, used for scenes with a known surface and in tests.

use super::{FieldError, ScalarField};
use nalgebra::Vector3;
use rayon::prelude::*;

/// Sphere SDF: |p - center| - radius.
#[derive(Clone, Copy, Debug)]
pub struct SphereField {
    pub center: Vector3<f32>,
    pub radius: f32,
}

impl SphereField {
    pub fn new(center: Vector3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn distance(&self, p: &Vector3<f32>) -> f32 {
        (p - self.center).norm() - self.radius
    }
}

impl ScalarField for SphereField {
    fn query_sdf(&self, points: &[Vector3<f32>]) -> Result<Vec<f32>, FieldError> {
        Ok(points.par_iter().map(|p| self.distance(p)).collect())
    }
}

/// Adapts a per-point closure into a field.
pub struct FnField<F> {
    f: F,
}

impl<F> FnField<F>
where
    F: Fn(&Vector3<f32>) -> f32 + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> ScalarField for FnField<F>
where
    F: Fn(&Vector3<f32>) -> f32 + Sync,
{
    fn query_sdf(&self, points: &[Vector3<f32>]) -> Result<Vec<f32>, FieldError> {
        Ok(points.par_iter().map(|p| (self.f)(p)).collect())
    }
}
