//! Long-edge rejection and mesh assembly.

use super::ExtractError;
use crate::core::Mesh;
use nalgebra::Vector3;

/// An edge survives when its original bracket is no longer than the combined
/// footprint of its two Gaussians.
pub fn edge_keep_mask(original_distance: &[f32], original_scale_sum: &[f32]) -> Vec<bool> {
    original_distance
        .iter()
        .zip(original_scale_sum)
        .map(|(d, s)| d <= s)
        .collect()
}

/// Assemble a mesh from crossing points and faces over edge indices.
///
/// With `keep` set, vertices whose edge fails the mask are dropped together
/// with every face touching them, and the survivors are reindexed in order.
pub fn assemble_mesh(
    points: &[Vector3<f32>],
    faces: &[[u32; 3]],
    keep: Option<&[bool]>,
) -> Result<Mesh, ExtractError> {
    if let Some(keep) = keep {
        if keep.len() != points.len() {
            return Err(ExtractError::LengthMismatch {
                what: "edge keep mask",
                expected: points.len(),
                got: keep.len(),
            });
        }
    }
    for (f, face) in faces.iter().enumerate() {
        if let Some(&index) = face.iter().find(|&&i| i as usize >= points.len()) {
            return Err(ExtractError::FaceIndexOutOfRange {
                face: f,
                index,
                len: points.len(),
            });
        }
    }

    let Some(keep) = keep else {
        return Ok(Mesh::new(points.to_vec(), faces.to_vec()));
    };

    let mut remap = vec![u32::MAX; points.len()];
    let mut vertices = Vec::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        if keep[i] {
            remap[i] = vertices.len() as u32;
            vertices.push(*p);
        }
    }
    let faces = faces
        .iter()
        .filter(|face| face.iter().all(|&i| keep[i as usize]))
        .map(|face| face.map(|i| remap[i as usize]))
        .collect();

    Ok(Mesh::new(vertices, faces))
}

/// Drop faces with any edge whose bracket was wider than its scale bound.
pub fn filter_mesh(
    points: &[Vector3<f32>],
    faces: &[[u32; 3]],
    original_distance: &[f32],
    original_scale_sum: &[f32],
) -> Result<Mesh, ExtractError> {
    if original_distance.len() != points.len() {
        return Err(ExtractError::LengthMismatch {
            what: "edge distances",
            expected: points.len(),
            got: original_distance.len(),
        });
    }
    if original_scale_sum.len() != points.len() {
        return Err(ExtractError::LengthMismatch {
            what: "edge scale sums",
            expected: points.len(),
            got: original_scale_sum.len(),
        });
    }
    let keep = edge_keep_mask(original_distance, original_scale_sum);
    assemble_mesh(points, faces, Some(&keep))
}
