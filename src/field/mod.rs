//! Scalar field oracles.
//!
//! Extraction never looks inside a field: it hands over a batch of points and
//! gets back one signed distance per point (negative inside, positive outside,
//! zero on the surface). Fields may also report per-point Gaussian shape
//! (scale, rotation) and opacity, which the tetra point generator can use in
//! place of stored Gaussian parameters.

mod analytic;
mod mlp;

pub use analytic::{FnField, SphereField};
pub use mlp::{DenseLayer, MlpField};

use nalgebra::{UnitQuaternion, Vector3};
use thiserror::Error;

/// Errors raised by a field query.
#[derive(Debug, Error)]
pub enum FieldError {
    #[error("network input width {expected} does not match point dimension {got}")]
    InputDimension { expected: usize, got: usize },

    #[error("invalid network: {0}")]
    InvalidNetwork(String),

    /// Failure inside a field backed by an external evaluator.
    #[error("field evaluation failed: {0}")]
    Evaluation(String),
}

/// Full result of a field query.
///
/// `sdf` is always present; the auxiliary channels are `None` when the field
/// does not produce them.
#[derive(Clone, Debug, Default)]
pub struct FieldOutput {
    pub sdf: Vec<f32>,
    pub opacity: Option<Vec<f32>>,
    pub scale: Option<Vec<Vector3<f32>>>,
    pub rotation: Option<Vec<UnitQuaternion<f32>>>,
}

/// A queryable signed-distance function.
///
/// Implementations must be deterministic for identical input within one
/// extraction run; the binary search relies on re-querying.
pub trait ScalarField: Sync {
    /// Signed distance at every point, same length and order as `points`.
    fn query_sdf(&self, points: &[Vector3<f32>]) -> Result<Vec<f32>, FieldError>;

    /// Signed distance plus whatever auxiliary outputs the field has.
    fn query(&self, points: &[Vector3<f32>]) -> Result<FieldOutput, FieldError> {
        Ok(FieldOutput {
            sdf: self.query_sdf(points)?,
            ..FieldOutput::default()
        })
    }
}

impl<T: ScalarField + ?Sized> ScalarField for &T {
    fn query_sdf(&self, points: &[Vector3<f32>]) -> Result<Vec<f32>, FieldError> {
        (**self).query_sdf(points)
    }

    fn query(&self, points: &[Vector3<f32>]) -> Result<FieldOutput, FieldError> {
        (**self).query(points)
    }
}

impl<T: ScalarField + ?Sized> ScalarField for Box<T> {
    fn query_sdf(&self, points: &[Vector3<f32>]) -> Result<Vec<f32>, FieldError> {
        (**self).query_sdf(points)
    }

    fn query(&self, points: &[Vector3<f32>]) -> Result<FieldOutput, FieldError> {
        (**self).query(points)
    }
}
