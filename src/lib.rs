//! # gsdf-rs: Mesh extraction from SDF-guided Gaussian Splatting
//!
//! This crate turns a trained set of 3D Gaussians plus a signed distance field
//! into a triangle mesh. Every Gaussian contributes the corners and center of
//! its oriented box as candidate points; the points are tetrahedralized, the
//! field sign is marched over the tetrahedra, and every crossing edge is
//! refined by binary search on the field before long edges are filtered out.
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - `core`: Fundamental data structures (Gaussians, bounding box, mesh, math)
//! - `field`: Signed distance oracles (analytic shapes, MLP networks)
//! - `tetra`: Extraction pipeline (tetra points, Delaunay, marching tetrahedra,
//!   binary search, edge filter)
//! - `io`: File I/O (Gaussian PLY, mesh PLY/OBJ, network weights, model layout)

// Core data structures and math
pub mod core;

// Signed distance fields
pub mod field;

// Marching tetrahedra extraction
pub mod tetra;

// I/O operations (PLY, OBJ, network blobs)
pub mod io;

// Re-export commonly used types at crate root for convenience
pub use self::core::{BoundingBox, Gaussian, GaussianCloud, Mesh};
pub use field::{FieldError, ScalarField};
pub use io::LoadError;
pub use tetra::{extract_mesh, ExtractConfig, ExtractError, Extraction};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
