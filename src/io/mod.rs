//! I/O operations for loading and saving data.
//!
//! This module handles all file format parsing and export:
//! - PLY format (Gaussian clouds and meshes)
//! - OBJ format (mesh export)
//! - `.gsdf` field network blobs
//! - Trained model directory layout

mod model;
mod model_dir;
mod obj;
mod ply;

// Re-export public types and functions
pub use model::{
    load_field_model, read_field_model, save_field_model, write_field_model, Compression,
    ModelError,
};
pub use model_dir::{
    interpolated_mesh_path, snapshot_file_name, snapshot_path, ModelDir, FIELD_MODEL_FILE,
    POINT_CLOUD_FILE,
};
pub use obj::save_obj;
pub use ply::{
    load_gaussian_ply, load_mesh_ply, save_gaussian_ply, save_mesh_ply, LoadError, PlyEncoding,
};
