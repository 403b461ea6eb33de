//! Marching tetrahedra over a signed field.
//!
//! A vertex is "positive" when its value is strictly greater than zero; zero
//! counts as non-positive. Each tetrahedron's sign pattern indexes a 16-entry
//! table:
//!
//! - 0 or 4 positive vertices: no surface
//! - 1 or 3 positive vertices: one triangle over 3 crossing edges
//! - 2 positive vertices: a quad over 4 crossing edges, split along a fixed
//!   diagonal into two triangles
//!
//! Crossing edges are shared by every tetrahedron that contains them, so the
//! surface is assembled over a deduplicated edge list and stays watertight.

use super::ExtractError;
use nalgebra::Vector3;

/// Local edges of a tetrahedron as vertex pairs.
const TET_EDGES: [[usize; 2]; 6] = [[0, 1], [0, 2], [0, 3], [1, 2], [1, 3], [2, 3]];

/// Triangles per sign configuration (bit k set = vertex k positive).
const NUM_TRIANGLES: [usize; 16] = [0, 1, 1, 2, 1, 2, 2, 1, 1, 2, 2, 1, 2, 1, 1, 0];

/// Local edge indices forming the triangles of each configuration.
const TRIANGLE_TABLE: [[i8; 6]; 16] = [
    [-1, -1, -1, -1, -1, -1],
    [1, 0, 2, -1, -1, -1],
    [4, 0, 3, -1, -1, -1],
    [1, 4, 2, 1, 3, 4],
    [3, 1, 5, -1, -1, -1],
    [2, 3, 0, 2, 5, 3],
    [1, 4, 0, 1, 5, 4],
    [4, 2, 5, -1, -1, -1],
    [4, 5, 2, -1, -1, -1],
    [4, 1, 0, 4, 5, 1],
    [3, 2, 0, 3, 5, 2],
    [1, 3, 5, -1, -1, -1],
    [4, 1, 2, 4, 3, 1],
    [3, 0, 4, -1, -1, -1],
    [2, 0, 1, -1, -1, -1],
    [-1, -1, -1, -1, -1, -1],
];

/// One side of a crossing edge.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EdgeEndpoint {
    pub position: Vector3<f32>,
    pub value: f32,
    pub scale: f32,
}

/// A tetrahedron edge whose endpoints have opposite sign.
///
/// `left` is always the non-positive endpoint and `right` the positive one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CrossingEdge {
    /// Point indices of `[left, right]`.
    pub vertices: [u32; 2],
    pub left: EdgeEndpoint,
    pub right: EdgeEndpoint,
}

impl CrossingEdge {
    pub fn midpoint(&self) -> Vector3<f32> {
        (self.left.position + self.right.position) * 0.5
    }

    /// Linear estimate of the zero crossing from the endpoint values.
    pub fn interpolated(&self) -> Vector3<f32> {
        let wl = self.right.value.abs();
        let wr = self.left.value.abs();
        let denom = wl + wr;
        if denom <= f32::EPSILON {
            return self.midpoint();
        }
        (self.left.position * wl + self.right.position * wr) / denom
    }

    /// Distance between the endpoints.
    pub fn span(&self) -> f32 {
        (self.right.position - self.left.position).norm()
    }

    /// Combined Gaussian footprint of the endpoints.
    pub fn scale_sum(&self) -> f32 {
        self.left.scale + self.right.scale
    }
}

/// Surface extracted from a tetrahedral complex.
#[derive(Clone, Debug, Default)]
pub struct MarchingTets {
    /// Deduplicated crossing edges, ordered by (min vertex, max vertex).
    pub edges: Vec<CrossingEdge>,
    /// Triangles as indices into `edges`.
    pub faces: Vec<[u32; 3]>,
}

impl MarchingTets {
    /// Crossing-point estimate per edge.
    pub fn interpolated_points(&self) -> Vec<Vector3<f32>> {
        self.edges.iter().map(CrossingEdge::interpolated).collect()
    }
}

#[inline]
fn is_positive(value: f32) -> bool {
    value > 0.0
}

/// Sign configuration of one tetrahedron.
fn tet_code(tet: &[u32; 4], values: &[f32]) -> usize {
    tet.iter()
        .enumerate()
        .filter(|(_, &v)| is_positive(values[v as usize]))
        .fold(0, |acc, (k, _)| acc | (1 << k))
}

fn edge_key(a: u32, b: u32) -> (u32, u32) {
    (a.min(b), a.max(b))
}

/// Extract the iso-surface `value = 0`.
///
/// `points`, `values`, and `scales` are parallel arrays; `tets` index into
/// them. Non-finite values are rejected rather than classified.
pub fn marching_tetrahedra(
    points: &[Vector3<f32>],
    tets: &[[u32; 4]],
    values: &[f32],
    scales: &[f32],
) -> Result<MarchingTets, ExtractError> {
    if values.len() != points.len() {
        return Err(ExtractError::LengthMismatch {
            what: "field values",
            expected: points.len(),
            got: values.len(),
        });
    }
    if scales.len() != points.len() {
        return Err(ExtractError::LengthMismatch {
            what: "point scales",
            expected: points.len(),
            got: scales.len(),
        });
    }
    if let Some(index) = values.iter().position(|v| !v.is_finite()) {
        return Err(ExtractError::NonFiniteField { index });
    }
    for (t, tet) in tets.iter().enumerate() {
        if let Some(&v) = tet.iter().find(|&&v| v as usize >= points.len()) {
            return Err(ExtractError::IndexOutOfRange {
                tet: t,
                index: v,
                len: points.len(),
            });
        }
    }

    // Pass 1: collect and deduplicate crossing edges of mixed tets.
    let mut keys: Vec<(u32, u32)> = Vec::new();
    for tet in tets {
        let code = tet_code(tet, values);
        if NUM_TRIANGLES[code] == 0 {
            continue;
        }
        for [a, b] in TET_EDGES {
            let (va, vb) = (tet[a], tet[b]);
            if is_positive(values[va as usize]) != is_positive(values[vb as usize]) {
                keys.push(edge_key(va, vb));
            }
        }
    }
    keys.sort_unstable();
    keys.dedup();

    let edges: Vec<CrossingEdge> = keys
        .iter()
        .map(|&(a, b)| {
            let (l, r) = if is_positive(values[a as usize]) { (b, a) } else { (a, b) };
            let endpoint = |i: u32| EdgeEndpoint {
                position: points[i as usize],
                value: values[i as usize],
                scale: scales[i as usize],
            };
            CrossingEdge {
                vertices: [l, r],
                left: endpoint(l),
                right: endpoint(r),
            }
        })
        .collect();

    // Pass 2: emit triangles over the shared edge list.
    let mut faces = Vec::new();
    for tet in tets {
        let code = tet_code(tet, values);
        let count = NUM_TRIANGLES[code];
        if count == 0 {
            continue;
        }

        // Outward reference direction: from negative corners toward positive ones.
        let (mut pos_sum, mut neg_sum) = (Vector3::zeros(), Vector3::zeros());
        let (mut pos_n, mut neg_n) = (0.0f32, 0.0f32);
        for (k, &v) in tet.iter().enumerate() {
            if code & (1 << k) != 0 {
                pos_sum += points[v as usize];
                pos_n += 1.0;
            } else {
                neg_sum += points[v as usize];
                neg_n += 1.0;
            }
        }
        let outward = pos_sum / pos_n - neg_sum / neg_n;

        let row = &TRIANGLE_TABLE[code];
        for tri in 0..count {
            let mut face = [0u32; 3];
            for c in 0..3 {
                let [a, b] = TET_EDGES[row[tri * 3 + c] as usize];
                face[c] = crossing_index(&keys, tet[a], tet[b])?;
            }
            let [p0, p1, p2] = face.map(|e| edges[e as usize].midpoint());
            if (p1 - p0).cross(&(p2 - p0)).dot(&outward) < 0.0 {
                face.swap(1, 2);
            }
            faces.push(face);
        }
    }

    Ok(MarchingTets { edges, faces })
}

/// Position of edge `(a, b)` in the sorted crossing-edge keys.
fn crossing_index(keys: &[(u32, u32)], a: u32, b: u32) -> Result<u32, ExtractError> {
    keys.binary_search(&edge_key(a, b))
        .map(|i| i as u32)
        .map_err(|_| ExtractError::UnmatchedEdge { a, b })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::collections::HashSet;

    fn unit_tet() -> Vec<Vector3<f32>> {
        vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(1.0, 0.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
            Vector3::new(0.0, 0.0, 1.0),
        ]
    }

    fn run(values: [f32; 4]) -> MarchingTets {
        marching_tetrahedra(&unit_tet(), &[[0, 1, 2, 3]], &values, &[1.0; 4]).unwrap()
    }

    fn values_for(code: usize) -> [f32; 4] {
        let mut v = [-1.0; 4];
        for (k, slot) in v.iter_mut().enumerate() {
            if code & (1 << k) != 0 {
                *slot = 1.0;
            }
        }
        v
    }

    #[test]
    fn test_table_uses_exactly_the_crossing_edges() {
        for code in 0..16 {
            let positives = (0..4).filter(|k| code & (1 << k) != 0).count();
            let crossing: HashSet<usize> = TET_EDGES
                .iter()
                .enumerate()
                .filter(|(_, [a, b])| ((code >> a) & 1) != ((code >> b) & 1))
                .map(|(i, _)| i)
                .collect();
            let used: HashSet<usize> = TRIANGLE_TABLE[code][..NUM_TRIANGLES[code] * 3]
                .iter()
                .map(|&e| e as usize)
                .collect();
            assert_eq!(used, crossing, "configuration {code}");
            let expected = match positives {
                0 | 4 => 0,
                1 | 3 => 1,
                _ => 2,
            };
            assert_eq!(NUM_TRIANGLES[code], expected);
        }
    }

    #[test]
    fn test_single_positive_gives_one_triangle() {
        for code in [1, 2, 4, 8, 7, 11, 13, 14] {
            let out = run(values_for(code));
            assert_eq!(out.faces.len(), 1);
            assert_eq!(out.edges.len(), 3);
        }
    }

    #[test]
    fn test_two_positive_gives_quad_with_shared_diagonal() {
        for code in [3, 5, 6, 9, 10, 12] {
            let out = run(values_for(code));
            assert_eq!(out.faces.len(), 2, "configuration {code}");
            assert_eq!(out.edges.len(), 4);

            let a: HashSet<u32> = out.faces[0].iter().copied().collect();
            let b: HashSet<u32> = out.faces[1].iter().copied().collect();
            assert_eq!(a.intersection(&b).count(), 2, "triangles share one diagonal");
            assert_eq!(a.union(&b).count(), 4);

            // The two halves tile the quad: their areas add up to the quad area
            // computed along the other diagonal.
            let p: Vec<Vector3<f32>> = out.edges.iter().map(|e| e.midpoint()).collect();
            let area = |f: &[u32; 3]| {
                let [x, y, z] = f.map(|i| p[i as usize]);
                (y - x).cross(&(z - x)).norm() * 0.5
            };
            let shared: Vec<u32> = a.intersection(&b).copied().collect();
            let apex_a = *a.difference(&b).next().unwrap();
            let apex_b = *b.difference(&a).next().unwrap();
            let other = area(&[apex_a, apex_b, shared[0]]) + area(&[apex_a, apex_b, shared[1]]);
            assert_relative_eq!(area(&out.faces[0]) + area(&out.faces[1]), other, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_uniform_sign_gives_nothing() {
        assert!(run([1.0, 2.0, 3.0, 4.0]).faces.is_empty());
        assert!(run([-1.0, -2.0, -3.0, -4.0]).faces.is_empty());
    }

    #[test]
    fn test_zero_counts_as_non_positive() {
        // All zero: nothing positive, no surface.
        assert!(run([0.0; 4]).faces.is_empty());
        // Zero with one positive vertex behaves like a negative vertex.
        let out = run([0.0, 1.0, 0.0, 0.0]);
        assert_eq!(out.faces.len(), 1);
        for e in &out.edges {
            assert_eq!(e.vertices[1], 1);
            assert!(e.left.value <= 0.0 && e.right.value > 0.0);
        }
    }

    #[test]
    fn test_shared_edges_are_deduplicated() {
        // Two tets sharing face (1, 2, 3); vertex 0 and 4 on opposite sides.
        let mut points = unit_tet();
        points.push(Vector3::new(1.0, 1.0, 1.0));
        let tets = [[0, 1, 2, 3], [4, 1, 3, 2]];
        let values = [-1.0, 1.0, 1.0, 1.0, 1.0];
        let out = marching_tetrahedra(&points, &tets, &values, &[0.5; 5]).unwrap();
        // Only tet 0 is mixed.
        assert_eq!(out.faces.len(), 1);

        let values = [-1.0, -1.0, 1.0, 1.0, -1.0];
        let out = marching_tetrahedra(&points, &tets, &values, &[0.5; 5]).unwrap();
        assert_eq!(out.faces.len(), 4);
        // Crossing edges: (0,2), (0,3), (1,2), (1,3), (4,2), (4,3); (1,2), (1,3) shared.
        assert_eq!(out.edges.len(), 6);
    }

    #[test]
    fn test_faces_point_toward_positive_side() {
        let out = run([-1.0, 1.0, 1.0, 1.0]);
        let [a, b, c] = out.faces[0].map(|i| out.edges[i as usize].midpoint());
        let n = (b - a).cross(&(c - a));
        assert!(n.dot(&Vector3::new(1.0, 1.0, 1.0)) > 0.0);
    }

    #[test]
    fn test_interpolated_crossing() {
        let out = run([-1.0, 3.0, -1.0, -1.0]);
        let e = out.edges.iter().find(|e| e.vertices == [0, 1]).unwrap();
        assert_relative_eq!(e.interpolated(), Vector3::new(0.25, 0.0, 0.0), epsilon = 1e-6);
        assert_relative_eq!(e.span(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(e.scale_sum(), 2.0, epsilon = 1e-6);
    }

    #[test]
    fn test_missing_crossing_edge_is_an_error() {
        let keys = [(0, 1), (0, 3), (2, 3)];
        assert_eq!(crossing_index(&keys, 3, 0).unwrap(), 1);
        assert!(matches!(
            crossing_index(&keys, 1, 2),
            Err(ExtractError::UnmatchedEdge { a: 1, b: 2 })
        ));
    }

    #[test]
    fn test_preconditions() {
        let pts = unit_tet();
        assert!(matches!(
            marching_tetrahedra(&pts, &[[0, 1, 2, 3]], &[1.0; 3], &[1.0; 4]),
            Err(ExtractError::LengthMismatch { .. })
        ));
        assert!(matches!(
            marching_tetrahedra(&pts, &[[0, 1, 2, 9]], &[1.0; 4], &[1.0; 4]),
            Err(ExtractError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            marching_tetrahedra(&pts, &[[0, 1, 2, 3]], &[1.0, f32::NAN, 1.0, 1.0], &[1.0; 4]),
            Err(ExtractError::NonFiniteField { index: 1 })
        ));
    }
}
