//! Indexed triangle mesh produced by extraction.

use nalgebra::Vector3;

/// Vertex list plus triangle index triples.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vector3<f32>>,
    pub faces: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vector3<f32>>, faces: Vec<[u32; 3]>) -> Self {
        Self { vertices, faces }
    }

    pub fn is_empty(&self) -> bool {
        self.faces.is_empty()
    }

    /// Every face index points at an existing vertex.
    pub fn indices_in_range(&self) -> bool {
        let n = self.vertices.len();
        self.faces
            .iter()
            .all(|f| f.iter().all(|&i| (i as usize) < n))
    }

    /// Positions of the three corners of face `face`.
    pub fn triangle(&self, face: usize) -> [Vector3<f32>; 3] {
        let [a, b, c] = self.faces[face];
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Number of connected components over shared vertices.
    ///
    /// Vertices not referenced by any face do not count as components.
    pub fn connected_components(&self) -> usize {
        let n = self.vertices.len();
        let mut parent: Vec<usize> = (0..n).collect();

        fn find(parent: &mut [usize], mut i: usize) -> usize {
            while parent[i] != i {
                parent[i] = parent[parent[i]];
                i = parent[i];
            }
            i
        }

        let mut used = vec![false; n];
        for face in &self.faces {
            let [a, b, c] = face.map(|i| i as usize);
            used[a] = true;
            used[b] = true;
            used[c] = true;
            for (x, y) in [(a, b), (b, c)] {
                let rx = find(&mut parent, x);
                let ry = find(&mut parent, y);
                if rx != ry {
                    parent[rx] = ry;
                }
            }
        }

        (0..n).filter(|&i| used[i] && find(&mut parent, i) == i).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_components_of_two_triangles() {
        let vertices = (0..6).map(|i| Vector3::new(i as f32, 0.0, 0.0)).collect();
        let mesh = Mesh::new(vertices, vec![[0, 1, 2], [3, 4, 5]]);
        assert_eq!(mesh.connected_components(), 2);
        assert!(mesh.indices_in_range());
    }

    #[test]
    fn test_shared_vertex_joins_components() {
        let vertices = (0..5).map(|i| Vector3::new(i as f32, 0.0, 0.0)).collect();
        let mesh = Mesh::new(vertices, vec![[0, 1, 2], [2, 3, 4]]);
        assert_eq!(mesh.connected_components(), 1);
    }
}
