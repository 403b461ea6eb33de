//! Gaussian representation and cloud data structure.
//!
//! A Gaussian is parameterized by:
//! - Position (center μ)
//! - Scale (actual, positive per-axis extent)
//! - Rotation (unit quaternion)
//! - Opacity (logit-space: sigmoid(opacity) gives actual opacity)
//! - Spherical harmonics coefficients (color features, carried through I/O only)

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D Gaussian primitive.
///
/// `scale` holds the activated (positive) extent; see
/// [`Gaussian::from_log_scale`] for log-space input.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Gaussian {
    /// Center (mean μ)
    pub position: Vector3<f32>,

    /// Per-axis scale (all components > 0)
    pub scale: Vector3<f32>,

    /// Orientation of the scale axes
    pub rotation: UnitQuaternion<f32>,

    /// Opacity in logit-space
    pub opacity: f32,

    /// SH coefficients, DC first. Length is (degree + 1)².
    pub sh_coeffs: Vec<[f32; 3]>,
}

impl Gaussian {
    /// Create a new Gaussian with given parameters.
    pub fn new(
        position: Vector3<f32>,
        scale: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        opacity: f32,
        sh_coeffs: Vec<[f32; 3]>,
    ) -> Self {
        Self {
            position,
            scale,
            rotation,
            opacity,
            sh_coeffs,
        }
    }

    /// A geometry-only Gaussian (no color, fully opaque).
    pub fn from_shape(
        position: Vector3<f32>,
        scale: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
    ) -> Self {
        Self::new(position, scale, rotation, crate::core::inverse_sigmoid(1.0), Vec::new())
    }

    /// Build from optimizer-space scale (actual scale = exp(log_scale)).
    pub fn from_log_scale(
        position: Vector3<f32>,
        log_scale: Vector3<f32>,
        rotation: UnitQuaternion<f32>,
        opacity: f32,
        sh_coeffs: Vec<[f32; 3]>,
    ) -> Self {
        let scale = log_scale.map(f32::exp);
        Self::new(position, scale, rotation, opacity, sh_coeffs)
    }

    /// Scale in log-space, for writing optimizer-compatible files.
    pub fn log_scale(&self) -> Vector3<f32> {
        self.scale.map(f32::ln)
    }

    /// Compute the 3D covariance matrix Σ = R · S · S^T · R^T
    pub fn covariance_matrix(&self) -> Matrix3<f32> {
        use crate::core::quaternion_to_matrix;

        let rotation_matrix = quaternion_to_matrix(&self.rotation);

        // S · S^T for diagonal matrix is just diag(sx², sy², sz²)
        let s_squared = Matrix3::from_diagonal(&self.scale.component_mul(&self.scale));

        rotation_matrix * s_squared * rotation_matrix.transpose()
    }

    /// Get the actual opacity value (sigmoid of stored logit value)
    pub fn actual_opacity(&self) -> f32 {
        crate::core::sigmoid(self.opacity)
    }

    /// Largest of the three axis scales.
    ///
    /// This is the footprint attached to every tetra point the Gaussian emits.
    pub fn max_scale(&self) -> f32 {
        self.scale.x.max(self.scale.y).max(self.scale.z)
    }
}

/// A collection of Gaussians, addressed by stable index.
///
/// Structural edits never happen in place: pruning produces a filtered copy
/// and densification appends, so indices of surviving Gaussians keep their
/// relative order.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GaussianCloud {
    pub gaussians: Vec<Gaussian>,
}

impl GaussianCloud {
    /// Create a new empty Gaussian cloud.
    pub fn new() -> Self {
        Self {
            gaussians: Vec::new(),
        }
    }

    /// Create a cloud from a vector of Gaussians.
    pub fn from_gaussians(gaussians: Vec<Gaussian>) -> Self {
        Self { gaussians }
    }

    /// Number of Gaussians in the cloud.
    pub fn len(&self) -> usize {
        self.gaussians.len()
    }

    /// Check if the cloud is empty.
    pub fn is_empty(&self) -> bool {
        self.gaussians.is_empty()
    }

    /// Add a Gaussian to the cloud.
    pub fn push(&mut self, gaussian: Gaussian) {
        self.gaussians.push(gaussian);
    }

    /// Get a reference to the Gaussians.
    pub fn as_slice(&self) -> &[Gaussian] {
        &self.gaussians
    }

    /// Centers of all Gaussians, in index order.
    pub fn positions(&self) -> Vec<Vector3<f32>> {
        self.gaussians.iter().map(|g| g.position).collect()
    }

    /// Copy out the Gaussians whose `keep` flag is set.
    ///
    /// Returns `None` when the mask length does not match the cloud.
    pub fn prune(&self, keep: &[bool]) -> Option<Self> {
        if keep.len() != self.len() {
            return None;
        }
        let gaussians = self
            .gaussians
            .iter()
            .zip(keep)
            .filter(|(_, &k)| k)
            .map(|(g, _)| g.clone())
            .collect();
        Some(Self { gaussians })
    }

    /// Append new Gaussians after the existing ones.
    pub fn densify(&mut self, new_gaussians: impl IntoIterator<Item = Gaussian>) {
        self.gaussians.extend(new_gaussians);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn at(x: f32) -> Gaussian {
        Gaussian::from_shape(
            Vector3::new(x, 0.0, 0.0),
            Vector3::new(1.0, 2.0, 3.0),
            UnitQuaternion::identity(),
        )
    }

    #[test]
    fn test_max_scale() {
        assert_relative_eq!(at(0.0).max_scale(), 3.0);
    }

    #[test]
    fn test_log_scale_roundtrip() {
        let g = Gaussian::from_log_scale(
            Vector3::zeros(),
            Vector3::new(0.0, -1.0, 0.5),
            UnitQuaternion::identity(),
            0.0,
            Vec::new(),
        );
        assert_relative_eq!(g.scale.x, 1.0, epsilon = 1e-6);
        assert_relative_eq!(g.log_scale(), Vector3::new(0.0, -1.0, 0.5), epsilon = 1e-6);
    }

    #[test]
    fn test_covariance_is_diagonal_without_rotation() {
        let cov = at(0.0).covariance_matrix();
        let expected = Matrix3::from_diagonal(&Vector3::new(1.0, 4.0, 9.0));
        assert_relative_eq!(cov, expected, epsilon = 1e-6);
    }

    #[test]
    fn test_prune_keeps_order() {
        let cloud = GaussianCloud::from_gaussians(vec![at(0.0), at(1.0), at(2.0)]);
        let pruned = cloud.prune(&[true, false, true]).unwrap();
        assert_eq!(pruned.len(), 2);
        assert_relative_eq!(pruned.gaussians[1].position.x, 2.0);
        assert!(cloud.prune(&[true]).is_none());
    }

    #[test]
    fn test_densify_appends() {
        let mut cloud = GaussianCloud::from_gaussians(vec![at(0.0)]);
        cloud.densify(vec![at(5.0), at(6.0)]);
        assert_eq!(cloud.len(), 3);
        assert_relative_eq!(cloud.gaussians[0].position.x, 0.0);
        assert_relative_eq!(cloud.gaussians[2].position.x, 6.0);
    }
}
