//! Mesh extraction from Gaussians and a signed field.
//!
//! Pipeline:
//! 1. Cube corners + centers of every Gaussian ([`points`])
//! 2. Bounding-box culling ([`bbox`])
//! 3. Delaunay tetrahedralization ([`delaunay`])
//! 4. Marching tetrahedra on the field signs ([`marching`])
//! 5. Binary search of every crossing edge ([`refine`])
//! 6. Long-edge rejection ([`filter`])

pub mod bbox;
pub mod delaunay;
pub mod filter;
pub mod marching;
pub mod points;
pub mod refine;

pub use bbox::filter_points_in_bounding_box;
pub use delaunay::{BowyerWatson, Tetrahedralizer};
pub use filter::{assemble_mesh, edge_keep_mask, filter_mesh};
pub use marching::{marching_tetrahedra, CrossingEdge, EdgeEndpoint, MarchingTets};
pub use points::{generate_tetra_points, generate_tetra_points_with_field, ShapeSource, TetraPoints};
pub use refine::{refine, EdgeBrackets};

use crate::core::{BoundingBox, Gaussian, Mesh};
use crate::field::{FieldError, ScalarField};
use crate::io::LoadError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("{what}: expected {expected} entries, got {got}")]
    LengthMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("tetrahedron {tet} references point {index}, but there are only {len} points")]
    IndexOutOfRange { tet: usize, index: u32, len: usize },

    #[error("face {face} references vertex {index}, but there are only {len} vertices")]
    FaceIndexOutOfRange { face: usize, index: u32, len: usize },

    #[error("edge ({a}, {b}) of a triangle does not cross the surface")]
    UnmatchedEdge { a: u32, b: u32 },

    #[error("field value {index} is not finite")]
    NonFiniteField { index: usize },

    #[error("point {index} has a non-finite coordinate")]
    NonFinitePoint { index: usize },

    #[error("field returned no scale/rotation outputs")]
    MissingShapeOutputs,

    #[error("tetrahedralization failed: {0}")]
    Triangulation(String),

    #[error("field query failed: {0}")]
    Field(#[from] FieldError),

    #[error("mesh export failed: {0}")]
    Export(#[from] LoadError),
}

/// Extraction settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    pub binary_search_steps: usize,
    /// Zero-based steps that produce a snapshot. The last step always does.
    pub export_steps: Vec<usize>,
    /// Enlargement for a bounding box derived from Gaussian centers.
    pub bbox_enlarge: f32,
    pub filter_long_edges: bool,
    pub shape_source: ShapeSource,
    /// Also build a mesh from the linear zero-crossing estimates.
    pub interpolated_mesh: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            binary_search_steps: 8,
            export_steps: vec![7],
            bbox_enlarge: 1.1,
            filter_long_edges: true,
            shape_source: ShapeSource::Auto,
            interpolated_mesh: false,
        }
    }
}

impl ExtractConfig {
    /// Steps that produce a snapshot, ascending and deduplicated.
    pub fn snapshot_steps(&self) -> Vec<usize> {
        let steps = self.binary_search_steps;
        let mut out: Vec<usize> = self
            .export_steps
            .iter()
            .copied()
            .filter(|&k| k < steps)
            .collect();
        if steps > 0 {
            out.push(steps - 1);
        }
        out.sort_unstable();
        out.dedup();
        out
    }
}

/// Counters from one extraction run.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractStats {
    pub gaussians: usize,
    pub candidate_points: usize,
    pub points_in_bbox: usize,
    pub tetrahedra: usize,
    pub crossing_edges: usize,
    pub faces_before_filter: usize,
    pub vertices: usize,
    pub faces: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Extraction {
    pub mesh: Mesh,
    /// Mesh on the interpolated crossings, when requested.
    pub interpolated: Option<Mesh>,
    pub stats: ExtractStats,
}

/// Run the full pipeline and return the final mesh.
pub fn extract_mesh<F, T>(
    gaussians: &[Gaussian],
    bbox: Option<&BoundingBox>,
    field: &F,
    tetrahedralizer: &T,
    config: &ExtractConfig,
) -> Result<Extraction, ExtractError>
where
    F: ScalarField + ?Sized,
    T: Tetrahedralizer + ?Sized,
{
    extract_mesh_with_snapshots(gaussians, bbox, field, tetrahedralizer, config, |_, _| Ok(()))
}

/// Run the full pipeline, handing a mesh to `on_snapshot(step, mesh)` at every
/// snapshot step of `config`.
///
/// Without a bounding box, one is derived from the Gaussian centers with
/// `config.bbox_enlarge`. Fewer than four surviving points, or no tetrahedra,
/// yield an empty mesh rather than an error.
pub fn extract_mesh_with_snapshots<F, T, S>(
    gaussians: &[Gaussian],
    bbox: Option<&BoundingBox>,
    field: &F,
    tetrahedralizer: &T,
    config: &ExtractConfig,
    mut on_snapshot: S,
) -> Result<Extraction, ExtractError>
where
    F: ScalarField + ?Sized,
    T: Tetrahedralizer + ?Sized,
    S: FnMut(usize, &Mesh) -> Result<(), ExtractError>,
{
    let mut stats = ExtractStats {
        gaussians: gaussians.len(),
        ..Default::default()
    };

    let derived;
    let bbox = match bbox {
        Some(b) => b,
        None => {
            let centers: Vec<_> = gaussians.iter().map(|g| g.position).collect();
            match BoundingBox::from_points_enlarged(&centers, config.bbox_enlarge) {
                Some(b) => {
                    derived = b;
                    &derived
                }
                None => {
                    log::warn!("no Gaussians to extract from");
                    return Ok(Extraction {
                        stats,
                        ..Default::default()
                    });
                }
            }
        }
    };

    let candidates = generate_tetra_points_with_field(gaussians, field, config.shape_source)?;
    stats.candidate_points = candidates.len();

    let (tetra_points, _) = filter_points_in_bounding_box(&candidates, bbox);
    stats.points_in_bbox = tetra_points.len();
    log::info!(
        "{} tetra points ({} inside bounding box)",
        stats.candidate_points,
        stats.points_in_bbox
    );

    if tetra_points.len() < 4 {
        log::warn!(
            "only {} points survive the bounding box, nothing to extract",
            tetra_points.len()
        );
        return Ok(Extraction {
            stats,
            ..Default::default()
        });
    }

    let cells = tetrahedralizer.tetrahedralize(&tetra_points.points)?;
    stats.tetrahedra = cells.len();
    log::info!("{} tetrahedra", cells.len());
    if cells.is_empty() {
        log::warn!("tetrahedralization produced no cells, nothing to extract");
        return Ok(Extraction {
            stats,
            ..Default::default()
        });
    }

    let values = field.query_sdf(&tetra_points.points)?;
    let marched = marching_tetrahedra(&tetra_points.points, &cells, &values, &tetra_points.scales)?;
    stats.crossing_edges = marched.edges.len();
    stats.faces_before_filter = marched.faces.len();
    log::info!(
        "marching tetrahedra: {} crossing edges, {} faces",
        marched.edges.len(),
        marched.faces.len()
    );

    let mut brackets = EdgeBrackets::from_edges(&marched.edges);
    let keep = config
        .filter_long_edges
        .then(|| edge_keep_mask(&brackets.original_distance, &brackets.original_scale_sum));
    let build = |b: &EdgeBrackets| assemble_mesh(&b.midpoints(), &marched.faces, keep.as_deref());
    let interpolated = if config.interpolated_mesh {
        Some(assemble_mesh(
            &marched.interpolated_points(),
            &marched.faces,
            keep.as_deref(),
        )?)
    } else {
        None
    };

    let snapshot_steps = config.snapshot_steps();
    let mut last = None;
    refine(&mut brackets, field, config.binary_search_steps, |k, b| {
        if snapshot_steps.binary_search(&k).is_ok() {
            let mesh = build(b)?;
            log::info!(
                "step {}: {} vertices, {} faces",
                k,
                mesh.vertices.len(),
                mesh.faces.len()
            );
            on_snapshot(k, &mesh)?;
            last = Some(mesh);
        }
        Ok(())
    })?;

    let mesh = match last {
        Some(mesh) => mesh,
        None => build(&brackets)?,
    };
    stats.vertices = mesh.vertices.len();
    stats.faces = mesh.faces.len();
    Ok(Extraction {
        mesh,
        interpolated,
        stats,
    })
}
