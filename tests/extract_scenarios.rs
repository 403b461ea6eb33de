//! End-to-end extraction scenarios
//!
//! Runs the full pipeline (tetra points → Delaunay → marching tetrahedra →
//! binary search → edge filter) against analytic fields with known surfaces.

use approx::assert_relative_eq;
use gsdf_rs::field::{DenseLayer, FnField, MlpField, ScalarField, SphereField};
use gsdf_rs::tetra::{
    extract_mesh, marching_tetrahedra, BowyerWatson, ExtractConfig, Extraction, ShapeSource,
};
use gsdf_rs::{BoundingBox, ExtractError, Gaussian, Mesh};
use nalgebra::{DMatrix, DVector, UnitQuaternion, Vector3};
use std::collections::HashMap;

fn unit_gaussian(center: Vector3<f32>) -> Gaussian {
    Gaussian::from_shape(center, Vector3::new(1.0, 1.0, 1.0), UnitQuaternion::identity())
}

fn run<F: ScalarField>(
    gaussians: &[Gaussian],
    bbox: &BoundingBox,
    field: &F,
    config: &ExtractConfig,
) -> Result<Extraction, ExtractError> {
    extract_mesh(gaussians, Some(bbox), field, &BowyerWatson::default(), config)
}

/// Every undirected edge is used by exactly two faces.
fn is_closed(mesh: &Mesh) -> bool {
    let mut uses: HashMap<(u32, u32), usize> = HashMap::new();
    for f in &mesh.faces {
        for (a, b) in [(f[0], f[1]), (f[1], f[2]), (f[2], f[0])] {
            *uses.entry((a.min(b), a.max(b))).or_default() += 1;
        }
    }
    uses.values().all(|&n| n == 2)
}

#[test]
fn test_unit_sphere_after_eight_steps() {
    let field = SphereField::new(Vector3::zeros(), 0.5);
    let bbox = BoundingBox::cube(10.0);
    let config = ExtractConfig::default();

    let out = run(&[unit_gaussian(Vector3::zeros())], &bbox, &field, &config).unwrap();

    assert!(!out.mesh.is_empty());
    assert!(out.mesh.indices_in_range());
    assert!(is_closed(&out.mesh), "surface around a single Gaussian is closed");

    // Center-to-corner brackets start at √3; after 8 halvings the midpoint is
    // within half the remaining width of the crossing.
    let tolerance = 3f32.sqrt() / 512.0 + 1e-5;
    for v in &out.mesh.vertices {
        assert!((v.norm() - 0.5).abs() <= tolerance, "vertex {} at radius {}", v, v.norm());
    }
}

#[test]
fn test_unit_sphere_converges_further_with_more_steps() {
    let field = SphereField::new(Vector3::zeros(), 0.5);
    let config = ExtractConfig {
        binary_search_steps: 12,
        ..Default::default()
    };
    let out = run(
        &[unit_gaussian(Vector3::zeros())],
        &BoundingBox::cube(10.0),
        &field,
        &config,
    )
    .unwrap();

    assert!(!out.mesh.is_empty());
    for v in &out.mesh.vertices {
        assert_relative_eq!(v.norm(), 0.5, epsilon = 1e-3);
    }
}

#[test]
fn test_distant_gaussians_give_disjoint_components() {
    let a = Vector3::zeros();
    let b = Vector3::new(100.0, 0.0, 0.0);
    let field = FnField::new(move |p: &Vector3<f32>| {
        ((p - a).norm() - 0.5).min((p - b).norm() - 0.5)
    });
    let gaussians = [unit_gaussian(a), unit_gaussian(b)];
    let bbox = BoundingBox::cube(200.0);

    let out = run(&gaussians, &bbox, &field, &ExtractConfig::default()).unwrap();

    assert!(out.stats.faces_before_filter >= out.mesh.faces.len());
    for face in 0..out.mesh.faces.len() {
        let tri = out.mesh.triangle(face);
        let left = tri.iter().filter(|p| p.x < 50.0).count();
        assert!(left == 0 || left == 3, "face {} spans both Gaussians", face);
    }
    assert!(out.mesh.vertices.iter().any(|p| p.x < 50.0));
    assert!(out.mesh.vertices.iter().any(|p| p.x > 50.0));
    assert_eq!(out.mesh.connected_components(), 2);
}

#[test]
fn test_uniform_sign_tetrahedra_contribute_nothing() {
    let points = vec![
        Vector3::new(0.0, 0.0, 0.0),
        Vector3::new(1.0, 0.0, 0.0),
        Vector3::new(0.0, 1.0, 0.0),
        Vector3::new(0.0, 0.0, 1.0),
        Vector3::new(5.0, 5.0, 5.0),
        Vector3::new(6.0, 5.0, 5.0),
        Vector3::new(5.0, 6.0, 5.0),
        Vector3::new(5.0, 5.0, 6.0),
    ];
    let tets = [[0, 1, 2, 3], [4, 5, 6, 7]];
    let values = [1.0, 2.0, 0.5, 3.0, -1.0, -2.0, -0.5, -3.0];
    let out = marching_tetrahedra(&points, &tets, &values, &[1.0; 8]).unwrap();
    assert!(out.faces.is_empty());
    assert!(out.edges.is_empty());
}

#[test]
fn test_field_supplied_shapes() {
    // One linear layer: sdf = x / 2 over the box [-2, 2]³, log-scale 0
    // (unit scale), identity rotation, opacity logit 0.
    let mut w = DMatrix::zeros(9, 3);
    w[(0, 0)] = 1.0;
    let mut b = DVector::zeros(9);
    b[4] = 1.0;
    let layer = DenseLayer::new(w, b).unwrap();
    let field = MlpField::new(BoundingBox::cube(2.0), vec![layer]).unwrap();

    // Stored shape is tiny; the field's unit scale must win.
    let g = Gaussian::from_shape(
        Vector3::zeros(),
        Vector3::new(0.01, 0.01, 0.01),
        UnitQuaternion::identity(),
    );
    let config = ExtractConfig {
        shape_source: ShapeSource::Field,
        ..Default::default()
    };
    let out = run(&[g], &BoundingBox::cube(2.0), &field, &config).unwrap();

    assert!(!out.mesh.is_empty());
    for v in &out.mesh.vertices {
        assert!(v.x.abs() < 0.01, "vertex {} off the x = 0 plane", v);
        assert!(v.y.abs() <= 1.0 + 1e-5 && v.z.abs() <= 1.0 + 1e-5);
    }
}

#[test]
fn test_field_shape_source_requires_network_outputs() {
    let field = SphereField::new(Vector3::zeros(), 0.5);
    let config = ExtractConfig {
        shape_source: ShapeSource::Field,
        ..Default::default()
    };
    let err = extract_mesh(
        &[unit_gaussian(Vector3::zeros())],
        None,
        &field,
        &BowyerWatson::default(),
        &config,
    );
    assert!(err.is_err());
}

#[test]
fn test_filter_drops_faces_bridging_distant_gaussians() {
    // Sphere around `a`, negative everywhere past x = 50. Crossing edges run
    // between the sphere's outside corners and the far Gaussian, ~100 long.
    let a = Vector3::zeros();
    let field = FnField::new(move |p: &Vector3<f32>| ((p - a).norm() - 0.5).min(50.0 - p.x));
    let gaussians = [unit_gaussian(a), unit_gaussian(Vector3::new(100.0, 0.0, 0.0))];
    let bbox = BoundingBox::cube(200.0);

    let filtered = run(&gaussians, &bbox, &field, &ExtractConfig::default()).unwrap();
    let raw_config = ExtractConfig {
        filter_long_edges: false,
        ..Default::default()
    };
    let raw = run(&gaussians, &bbox, &field, &raw_config).unwrap();

    assert_eq!(raw.mesh.faces.len(), raw.stats.faces_before_filter);
    assert!(raw.mesh.vertices.iter().any(|v| v.x > 10.0));
    assert!(
        filtered.mesh.faces.len() < raw.mesh.faces.len(),
        "filter kept {} of {} faces",
        filtered.mesh.faces.len(),
        raw.mesh.faces.len()
    );

    // Only the sphere survives: short center-to-corner brackets.
    assert!(!filtered.mesh.is_empty());
    assert!(is_closed(&filtered.mesh));
    assert_eq!(filtered.mesh.connected_components(), 1);
    let tolerance = 3f32.sqrt() / 512.0 + 1e-5;
    for v in &filtered.mesh.vertices {
        assert!((v.norm() - 0.5).abs() <= tolerance, "vertex {} off the sphere", v);
    }
}

#[test]
fn test_interpolated_mesh_is_exact_for_linear_field() {
    let field = FnField::new(|p: &Vector3<f32>| 0.5 * p.x);
    let config = ExtractConfig {
        interpolated_mesh: true,
        ..Default::default()
    };
    let out = run(
        &[unit_gaussian(Vector3::zeros())],
        &BoundingBox::cube(2.0),
        &field,
        &config,
    )
    .unwrap();

    let interpolated = out.interpolated.expect("interpolated mesh requested");
    assert_eq!(interpolated.faces, out.mesh.faces);
    assert_eq!(interpolated.vertices.len(), out.mesh.vertices.len());
    assert!(!interpolated.is_empty());
    for v in &interpolated.vertices {
        assert!(v.x.abs() < 1e-5, "vertex {} off the x = 0 plane", v);
    }

    let plain = run(
        &[unit_gaussian(Vector3::zeros())],
        &BoundingBox::cube(2.0),
        &field,
        &ExtractConfig::default(),
    )
    .unwrap();
    assert!(plain.interpolated.is_none());
}
