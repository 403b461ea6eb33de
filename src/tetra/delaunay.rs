//! 3D Delaunay tetrahedralization.
//!
//! Extraction only needs the capability "points in, tetrahedra out", so it
//! talks to a [`Tetrahedralizer`]. [`BowyerWatson`] is the built-in
//! implementation:
//!
//! 1. Normalize points into [-1, 1]³ and add a tiny deterministic jitter. The
//!    8 cube corners of every Gaussian are co-spherical by construction, and
//!    exact ties in the in-sphere test make the cavity ill-defined.
//! 2. Seed with one tetrahedron of 4 affinely independent points. Each of its
//!    faces is closed off by a ghost cell whose fourth vertex is the point at
//!    infinity, so the hull is always covered.
//! 3. Insert the remaining points in Morton order: walk to the containing
//!    cell, grow the cavity of cells in conflict with the point, and re-star
//!    the cavity boundary from the new point.
//! 4. Return the finite cells.
//!
//! Predicates are adaptive-exact (`robust`). Finite cells are stored
//! positively oriented (`orient3d > 0`). A ghost cell is oriented as if its
//! infinite vertex were a point beyond its hull face. `neighbors[i]` is the
//! cell across the face opposite `vertices[i]`.

use super::ExtractError;
use nalgebra::Vector3;
use robust::Coord3D;
use std::collections::HashMap;

/// Something that can produce a 3D Delaunay tetrahedralization.
pub trait Tetrahedralizer {
    /// Cells as 4-tuples of indices into `points`.
    ///
    /// Must return an empty list (not an error) for fewer than 4 points.
    fn tetrahedralize(&self, points: &[Vector3<f32>]) -> Result<Vec<[u32; 4]>, ExtractError>;
}

/// Incremental Bowyer-Watson tetrahedralizer.
#[derive(Clone, Copy, Debug)]
pub struct BowyerWatson {
    /// Jitter amplitude in normalized coordinates.
    pub jitter: f64,
}

impl Default for BowyerWatson {
    fn default() -> Self {
        Self { jitter: 1e-9 }
    }
}

impl Tetrahedralizer for BowyerWatson {
    fn tetrahedralize(&self, points: &[Vector3<f32>]) -> Result<Vec<[u32; 4]>, ExtractError> {
        if points.len() < 4 {
            return Ok(Vec::new());
        }
        if let Some(index) = points.iter().position(|p| !p.iter().all(|c| c.is_finite())) {
            return Err(ExtractError::NonFinitePoint { index });
        }
        if points.len() > u32::MAX as usize {
            return Err(ExtractError::Triangulation(format!(
                "{} points exceed the u32 index range",
                points.len()
            )));
        }

        // Coplanar input has no volume to fill; the jitter must not invent one.
        let input: Vec<[f64; 3]> = points
            .iter()
            .map(|p| [p.x as f64, p.y as f64, p.z as f64])
            .collect();
        let identity: Vec<usize> = (0..input.len()).collect();
        if find_seed(&input, &identity).is_none() {
            log::warn!(
                "delaunay: {} points span less than 3 dimensions, no tetrahedra",
                points.len()
            );
            return Ok(Vec::new());
        }

        let normalized = normalize(points, self.jitter);
        let order = morton_order(&normalized);
        let seed = find_seed(&normalized, &order).ok_or_else(|| {
            ExtractError::Triangulation("jittered points are degenerate".to_string())
        })?;

        let mut mesh = TetMesh::new(normalized, seed);
        for idx in order.into_iter().filter(|i| !seed.contains(i)) {
            mesh.insert(idx)?;
        }

        let cells: Vec<[u32; 4]> = mesh
            .tets
            .iter()
            .filter(|t| t.alive && t.infinite_slot().is_none())
            .map(|t| t.vertices.map(|v| v as u32))
            .collect();

        log::debug!(
            "delaunay: {} points -> {} tetrahedra ({} cells created in total)",
            points.len(),
            cells.len(),
            mesh.tets.len()
        );
        Ok(cells)
    }
}

const NONE: usize = usize::MAX;
/// Vertex index of the point at infinity.
const INFINITE: usize = usize::MAX - 1;

#[derive(Clone, Debug)]
struct Tet {
    vertices: [usize; 4],
    neighbors: [usize; 4],
    alive: bool,
}

impl Tet {
    fn infinite_slot(&self) -> Option<usize> {
        self.vertices.iter().position(|&v| v == INFINITE)
    }
}

struct TetMesh {
    /// Normalized, jittered points.
    points: Vec<[f64; 3]>,
    tets: Vec<Tet>,
    /// Stamp per cell marking cavity membership for the current insertion.
    stamp: Vec<u32>,
    generation: u32,
    /// Recently created cell, start of the next walk.
    last: usize,
    /// xorshift state for choosing the first face tested during the walk.
    rng: u64,
}

impl TetMesh {
    /// One finite cell on `seed` plus its 4 ghost cells.
    fn new(points: Vec<[f64; 3]>, seed: [usize; 4]) -> Self {
        let mut first = seed;
        let [a, b, c, d] = first.map(|v| &points[v]);
        if orient3d(a, b, c, d) < 0.0 {
            first.swap(0, 1);
        }

        let mut tets = vec![Tet {
            vertices: first,
            neighbors: [NONE; 4],
            alive: true,
        }];
        for i in 0..4 {
            let mut vertices = first;
            vertices[i] = INFINITE;
            // Flip so that the infinite vertex sits on the outer side.
            let (j, k) = match i {
                0 => (1, 2),
                1 => (0, 2),
                _ => (0, 1),
            };
            vertices.swap(j, k);
            tets.push(Tet {
                vertices,
                neighbors: [NONE; 4],
                alive: true,
            });
        }

        let mut open_faces: HashMap<[usize; 3], (usize, usize)> = HashMap::new();
        for t in 0..tets.len() {
            for i in 0..4 {
                let mut key = [0usize; 3];
                let mut k = 0;
                for m in (0..4).filter(|&m| m != i) {
                    key[k] = tets[t].vertices[m];
                    k += 1;
                }
                key.sort_unstable();
                match open_faces.remove(&key) {
                    Some((other, other_face)) => {
                        tets[t].neighbors[i] = other;
                        tets[other].neighbors[other_face] = t;
                    }
                    None => {
                        open_faces.insert(key, (t, i));
                    }
                }
            }
        }

        let stamp = vec![0; tets.len()];
        Self {
            points,
            tets,
            stamp,
            generation: 0,
            last: 0,
            rng: 0x9E37_79B9_7F4A_7C15,
        }
    }

    fn next_random(&mut self) -> usize {
        self.rng ^= self.rng << 13;
        self.rng ^= self.rng >> 7;
        self.rng ^= self.rng << 17;
        self.rng as usize
    }

    /// Orientation of `vertices`, all of which must be finite.
    fn orient(&self, vertices: [usize; 4]) -> f64 {
        let [a, b, c, d] = vertices.map(|v| &self.points[v]);
        orient3d(a, b, c, d)
    }

    /// Orientation of cell `t` with vertex `i` replaced by point `p`.
    ///
    /// For a finite cell, negative means `p` lies beyond the face opposite
    /// vertex `i`. For a ghost cell with `i` its infinite slot, positive means
    /// `p` lies outside the hull face.
    fn orient_replaced(&self, t: usize, i: usize, p: usize) -> f64 {
        let mut v = self.tets[t].vertices;
        v[i] = p;
        self.orient(v)
    }

    /// Whether inserting `p` destroys cell `t`.
    fn in_conflict(&self, t: usize, p: usize) -> bool {
        let tet = &self.tets[t];
        match tet.infinite_slot() {
            None => {
                let [a, b, c, d] = tet.vertices.map(|v| &self.points[v]);
                insphere(a, b, c, d, &self.points[p]) > 0.0
            }
            Some(k) => {
                let o = self.orient_replaced(t, k, p);
                // On the hull plane: defer to the finite cell behind the face.
                o > 0.0 || (o == 0.0 && self.in_conflict(tet.neighbors[k], p))
            }
        }
    }

    /// Visibility walk from the last created cell towards `p`.
    ///
    /// Returns a cell in conflict with `p`: the finite cell containing it, or
    /// a ghost cell whose hull face `p` lies beyond.
    fn locate(&mut self, p: usize) -> Result<usize, ExtractError> {
        let mut t = self.last;
        if !self.tets[t].alive {
            t = self.tets.iter().rposition(|t| t.alive).unwrap_or(0);
        }
        if let Some(k) = self.tets[t].infinite_slot() {
            t = self.tets[t].neighbors[k];
        }

        let max_steps = self.tets.len() + 16;
        'walk: for _ in 0..max_steps {
            let start = self.next_random() % 4;
            for k in 0..4 {
                let i = (start + k) % 4;
                if self.orient_replaced(t, i, p) < 0.0 {
                    let next = self.tets[t].neighbors[i];
                    if next == NONE {
                        break 'walk;
                    }
                    if self.tets[next].infinite_slot().is_some() {
                        return Ok(next);
                    }
                    t = next;
                    continue 'walk;
                }
            }
            return Ok(t);
        }

        // Any conflicting cell seeds the cavity.
        (0..self.tets.len())
            .find(|&t| self.tets[t].alive && self.in_conflict(t, p))
            .ok_or_else(|| ExtractError::Triangulation(format!("could not locate point {}", p)))
    }

    fn insert(&mut self, p: usize) -> Result<(), ExtractError> {
        let start = self.locate(p)?;

        self.generation += 1;
        let mark = self.generation;

        // Grow the cavity: connected cells in conflict with p.
        let mut cavity = vec![start];
        self.stamp[start] = mark;
        let mut stack = vec![start];
        while let Some(t) = stack.pop() {
            for i in 0..4 {
                let nb = self.tets[t].neighbors[i];
                if nb == NONE || self.stamp[nb] == mark {
                    continue;
                }
                if self.in_conflict(nb, p) {
                    self.stamp[nb] = mark;
                    cavity.push(nb);
                    stack.push(nb);
                }
            }
        }

        // Every finite cell of the new star must be positively oriented.
        // Exactly degenerate input can break that; absorb the offending
        // neighbor and retry until it holds.
        let boundary = loop {
            let mut boundary = Vec::new();
            let mut absorbed = false;
            for &t in &cavity {
                for i in 0..4 {
                    let nb = self.tets[t].neighbors[i];
                    if nb != NONE && self.stamp[nb] == mark {
                        continue;
                    }
                    let mut vertices = self.tets[t].vertices;
                    vertices[i] = p;
                    let flat = !vertices.contains(&INFINITE) && self.orient(vertices) <= 0.0;
                    if flat && nb != NONE {
                        self.stamp[nb] = mark;
                        absorbed = true;
                    } else {
                        boundary.push((t, i, nb));
                    }
                }
            }
            if !absorbed {
                break boundary;
            }
            cavity = (0..self.tets.len())
                .filter(|&t| self.stamp[t] == mark)
                .collect();
        };

        // Re-star the cavity from p.
        let mut open_faces: HashMap<(usize, usize), (usize, usize)> = HashMap::new();
        for (t, i, outer) in boundary {
            let mut vertices = self.tets[t].vertices;
            vertices[i] = p;
            let new_id = self.tets.len();

            let mut neighbors = [NONE; 4];
            neighbors[i] = outer;
            if outer != NONE {
                if let Some(slot) = self.tets[outer].neighbors.iter().position(|&n| n == t) {
                    self.tets[outer].neighbors[slot] = new_id;
                }
            }

            self.tets.push(Tet {
                vertices,
                neighbors,
                alive: true,
            });
            self.stamp.push(0);

            // Faces through p are shared with sibling cells of this insertion.
            for j in (0..4).filter(|&j| j != i) {
                let mut key = [0usize; 2];
                let mut k = 0;
                for m in (0..4).filter(|&m| m != i && m != j) {
                    key[k] = vertices[m];
                    k += 1;
                }
                let key = (key[0].min(key[1]), key[0].max(key[1]));
                match open_faces.remove(&key) {
                    Some((other, other_face)) => {
                        self.tets[new_id].neighbors[j] = other;
                        self.tets[other].neighbors[other_face] = new_id;
                    }
                    None => {
                        open_faces.insert(key, (new_id, j));
                    }
                }
            }
            self.last = new_id;
        }

        for t in cavity {
            self.tets[t].alive = false;
        }
        Ok(())
    }
}

fn coord(p: &[f64; 3]) -> Coord3D<f64> {
    Coord3D {
        x: p[0],
        y: p[1],
        z: p[2],
    }
}

/// Positive when `d` lies below the plane of `a, b, c` (with `a, b, c`
/// counter-clockwise seen from above), zero when coplanar.
fn orient3d(a: &[f64; 3], b: &[f64; 3], c: &[f64; 3], d: &[f64; 3]) -> f64 {
    robust::orient3d(coord(a), coord(b), coord(c), coord(d))
}

/// Positive when `e` lies inside the circumsphere of a positively oriented
/// `a, b, c, d`, zero when co-spherical.
fn insphere(a: &[f64; 3], b: &[f64; 3], c: &[f64; 3], d: &[f64; 3], e: &[f64; 3]) -> f64 {
    robust::insphere(coord(a), coord(b), coord(c), coord(d), coord(e))
}

/// First 4 affinely independent points, scanning in `order`.
fn find_seed(points: &[[f64; 3]], order: &[usize]) -> Option<[usize; 4]> {
    let a = *order.first()?;
    let pa = points[a];
    let b = order.iter().copied().find(|&i| points[i] != pa)?;
    let ab = Vector3::from(points[b]) - Vector3::from(pa);

    // Farthest from the line ab. The exact test below decides independence.
    let c = order.iter().copied().max_by(|&i, &j| {
        let di = ab.cross(&(Vector3::from(points[i]) - Vector3::from(pa))).norm_squared();
        let dj = ab.cross(&(Vector3::from(points[j]) - Vector3::from(pa))).norm_squared();
        di.total_cmp(&dj)
    })?;
    let d = order
        .iter()
        .copied()
        .find(|&i| orient3d(&pa, &points[b], &points[c], &points[i]) != 0.0)?;
    Some([a, b, c, d])
}

/// Map into [-1, 1]³ (aspect preserved) and apply per-point jitter.
fn normalize(points: &[Vector3<f32>], jitter: f64) -> Vec<[f64; 3]> {
    let mut min = [f64::INFINITY; 3];
    let mut max = [f64::NEG_INFINITY; 3];
    for p in points {
        for a in 0..3 {
            min[a] = min[a].min(p[a] as f64);
            max[a] = max[a].max(p[a] as f64);
        }
    }
    let center = [
        0.5 * (min[0] + max[0]),
        0.5 * (min[1] + max[1]),
        0.5 * (min[2] + max[2]),
    ];
    let half = (0..3).map(|a| 0.5 * (max[a] - min[a])).fold(0.0, f64::max);
    let inv = if half > 0.0 { 1.0 / half } else { 1.0 };

    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let mut q = [0.0; 3];
            for a in 0..3 {
                let h = splitmix64((i as u64) * 3 + a as u64);
                // Uniform in [-1, 1).
                let u = (h >> 11) as f64 / (1u64 << 52) as f64 - 1.0;
                q[a] = (p[a] as f64 - center[a]) * inv + jitter * u;
            }
            q
        })
        .collect()
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

/// Insertion order along a Z-order curve for walk locality.
fn morton_order(points: &[[f64; 3]]) -> Vec<usize> {
    fn spread(mut v: u64) -> u64 {
        v &= 0x1f_ffff;
        v = (v | v << 32) & 0x1f_0000_0000_ffff;
        v = (v | v << 16) & 0x1f_0000_ff00_00ff;
        v = (v | v << 8) & 0x100f_00f0_0f00_f00f;
        v = (v | v << 4) & 0x10c3_0c30_c30c_30c3;
        v = (v | v << 2) & 0x1249_2492_4924_9249;
        v
    }
    let quantize = |x: f64| (((x + 1.0) * 0.5).clamp(0.0, 1.0) * 1_048_575.0) as u64;

    let mut keyed: Vec<(u64, usize)> = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let code = spread(quantize(p[0]))
                | spread(quantize(p[1])) << 1
                | spread(quantize(p[2])) << 2;
            (code, i)
        })
        .collect();
    keyed.sort_unstable();
    keyed.into_iter().map(|(_, i)| i).collect()
}
