//! Core data structures and mathematical operations.
//!
//! This module contains the fundamental types used throughout the system:
//! - `Gaussian` / `GaussianCloud`: 3D Gaussian primitives
//! - `BoundingBox`: the reconstruction volume
//! - `Mesh`: extracted triangle surface
//! - Math utilities: quaternions, activations
//!
//! All types here are "pure data" - no I/O, no extraction logic.

mod bbox;
mod gaussian;
pub mod math;
mod mesh;

// Re-export public types
pub use bbox::BoundingBox;
pub use gaussian::{Gaussian, GaussianCloud};
pub use math::{inverse_sigmoid, quaternion_from_wxyz, quaternion_to_matrix, sigmoid, softplus};
pub use mesh::Mesh;
