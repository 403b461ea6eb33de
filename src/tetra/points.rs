//! Tetrahedralization candidate points from Gaussians.
//!
//! Each Gaussian contributes the 8 corners of its oriented, scaled cube
//! (half-extent 1 along each local axis before scaling) plus its center.
//! Layout of the output is corners first, then centers:
//!
//! ```text
//! [g0.c0 .. g0.c7, g1.c0 .. g1.c7, ..., gN.c7, g0.center, g1.center, ..., gN.center]
//! ```
//!
//! Every point carries the max axis scale of its Gaussian.

use crate::core::{quaternion_to_matrix, Gaussian};
use crate::field::ScalarField;
use crate::tetra::ExtractError;
use nalgebra::{UnitQuaternion, Vector3};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Canonical cube corners, half-extent 1, in the order of a unit box mesh.
pub const CUBE_CORNERS: [[f32; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, 1.0, 1.0],
    [1.0, -1.0, -1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, -1.0],
    [1.0, 1.0, 1.0],
];

/// Points emitted per Gaussian (8 corners + center).
pub const POINTS_PER_GAUSSIAN: usize = 9;

/// Ordered candidate points with a parallel per-point scale.
#[derive(Clone, Debug, Default)]
pub struct TetraPoints {
    pub points: Vec<Vector3<f32>>,
    pub scales: Vec<f32>,
}

impl TetraPoints {
    pub fn new(points: Vec<Vector3<f32>>, scales: Vec<f32>) -> Result<Self, ExtractError> {
        if points.len() != scales.len() {
            return Err(ExtractError::LengthMismatch {
                what: "point scales",
                expected: points.len(),
                got: scales.len(),
            });
        }
        Ok(Self { points, scales })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Where the per-Gaussian scale and rotation come from.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeSource {
    /// Query the field at the Gaussian centers; fail if it has no shape outputs.
    Field,
    /// Use the parameters stored on each Gaussian.
    Stored,
    /// Field outputs when available, stored parameters otherwise.
    #[default]
    Auto,
}

/// Corner points of one Gaussian's oriented cube.
pub fn gaussian_cube_corners(
    center: &Vector3<f32>,
    scale: &Vector3<f32>,
    rotation: &UnitQuaternion<f32>,
) -> [Vector3<f32>; 8] {
    let r = quaternion_to_matrix(rotation);
    CUBE_CORNERS.map(|[x, y, z]| r * Vector3::new(x, y, z).component_mul(scale) + center)
}

/// Generate the 9N candidate points for N Gaussians.
pub fn generate_tetra_points(gaussians: &[Gaussian]) -> TetraPoints {
    let shapes: Vec<_> = gaussians
        .iter()
        .map(|g| (g.position, g.scale, g.rotation))
        .collect();
    tetra_points_from_shapes(&shapes)
}

/// Same as [`generate_tetra_points`], but with scale/rotation resolved
/// according to `source`.
pub fn generate_tetra_points_with_field<F: ScalarField + ?Sized>(
    gaussians: &[Gaussian],
    field: &F,
    source: ShapeSource,
) -> Result<TetraPoints, ExtractError> {
    if source == ShapeSource::Stored || gaussians.is_empty() {
        return Ok(generate_tetra_points(gaussians));
    }

    let centers: Vec<Vector3<f32>> = gaussians.iter().map(|g| g.position).collect();
    let out = field.query(&centers)?;

    match (out.scale, out.rotation) {
        (Some(scale), Some(rotation)) => {
            if scale.len() != centers.len() || rotation.len() != centers.len() {
                return Err(ExtractError::LengthMismatch {
                    what: "field shape outputs",
                    expected: centers.len(),
                    got: scale.len().min(rotation.len()),
                });
            }
            let shapes: Vec<_> = centers
                .into_iter()
                .zip(scale)
                .zip(rotation)
                .map(|((c, s), r)| (c, s, r))
                .collect();
            Ok(tetra_points_from_shapes(&shapes))
        }
        _ if source == ShapeSource::Field => Err(ExtractError::MissingShapeOutputs),
        _ => {
            log::info!("field has no shape outputs, using stored Gaussian scale/rotation");
            Ok(generate_tetra_points(gaussians))
        }
    }
}

fn tetra_points_from_shapes(
    shapes: &[(Vector3<f32>, Vector3<f32>, UnitQuaternion<f32>)],
) -> TetraPoints {
    let corners: Vec<[Vector3<f32>; 8]> = shapes
        .par_iter()
        .map(|(c, s, r)| gaussian_cube_corners(c, s, r))
        .collect();
    let max_scales: Vec<f32> = shapes
        .iter()
        .map(|(_, s, _)| s.x.max(s.y).max(s.z))
        .collect();

    let n = shapes.len();
    let mut points = Vec::with_capacity(n * POINTS_PER_GAUSSIAN);
    let mut scales = Vec::with_capacity(n * POINTS_PER_GAUSSIAN);

    for (cube, &s) in corners.iter().zip(&max_scales) {
        points.extend_from_slice(cube);
        scales.extend(std::iter::repeat(s).take(8));
    }
    for ((c, _, _), &s) in shapes.iter().zip(&max_scales) {
        points.push(*c);
        scales.push(s);
    }

    TetraPoints { points, scales }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::{FnField, SphereField};
    use approx::assert_relative_eq;

    fn gaussian(center: Vector3<f32>, scale: Vector3<f32>) -> Gaussian {
        Gaussian::from_shape(center, scale, UnitQuaternion::identity())
    }

    fn unit_at_origin() -> Vec<Gaussian> {
        vec![gaussian(Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0))]
    }

    #[test]
    fn test_nine_points_per_gaussian() {
        let gs = vec![
            gaussian(Vector3::zeros(), Vector3::new(1.0, 1.0, 1.0)),
            gaussian(Vector3::new(5.0, 0.0, 0.0), Vector3::new(0.1, 0.2, 0.3)),
        ];
        let tp = generate_tetra_points(&gs);
        assert_eq!(tp.len(), 18);
        assert_eq!(tp.scales.len(), 18);

        // Corners of the second Gaussian share its max scale.
        for s in &tp.scales[8..16] {
            assert_relative_eq!(*s, 0.3);
        }
        // Centers come last.
        assert_relative_eq!(tp.points[16], Vector3::zeros());
        assert_relative_eq!(tp.points[17], Vector3::new(5.0, 0.0, 0.0));
        assert_relative_eq!(tp.scales[17], 0.3);
    }

    #[test]
    fn test_corners_are_scaled_then_rotated_then_translated() {
        let rot = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f32::consts::FRAC_PI_2);
        let center = Vector3::new(1.0, 2.0, 3.0);
        let corners = gaussian_cube_corners(&center, &Vector3::new(2.0, 1.0, 0.5), &rot);

        // Local (+2, +1, +0.5) rotated 90° about z becomes (-1, +2, +0.5).
        assert_relative_eq!(corners[7], center + Vector3::new(-1.0, 2.0, 0.5), epsilon = 1e-5);
        for c in &corners {
            let local = rot.inverse() * (c - center);
            assert_relative_eq!(local.x.abs(), 2.0, epsilon = 1e-5);
            assert_relative_eq!(local.y.abs(), 1.0, epsilon = 1e-5);
            assert_relative_eq!(local.z.abs(), 0.5, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_empty_input() {
        let tp = generate_tetra_points(&[]);
        assert!(tp.is_empty());
    }

    #[test]
    fn test_field_source_requires_shape_outputs() {
        let gs = unit_at_origin();
        let field = SphereField::new(Vector3::zeros(), 0.5);

        let err = generate_tetra_points_with_field(&gs, &field, ShapeSource::Field);
        assert!(matches!(err, Err(ExtractError::MissingShapeOutputs)));

        let auto = generate_tetra_points_with_field(&gs, &field, ShapeSource::Auto).unwrap();
        assert_eq!(auto.len(), 9);
    }

    #[test]
    fn test_stored_source_never_queries() {
        let gs = unit_at_origin();
        let field = FnField::new(|_: &Vector3<f32>| f32::NAN);
        let tp = generate_tetra_points_with_field(&gs, &field, ShapeSource::Stored).unwrap();
        assert_eq!(tp.len(), 9);
    }

    #[test]
    fn test_mismatched_scales_rejected() {
        assert!(TetraPoints::new(vec![Vector3::zeros()], vec![]).is_err());
    }
}
