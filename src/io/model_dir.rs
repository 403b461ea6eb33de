//! Trained model directory layout.
//!
//! ```text
//! <model>/
//!   point_cloud/iteration_<N>/point_cloud.ply   Gaussian centers + features
//!   point_cloud/iteration_<N>/model.gsdf        field network + bounding box
//!   test/ours_<N>/fusion/                       extracted meshes
//! ```

use crate::core::GaussianCloud;
use crate::field::MlpField;
use crate::io::{load_field_model, load_gaussian_ply, LoadError, ModelError};
use std::path::{Path, PathBuf};

pub const POINT_CLOUD_FILE: &str = "point_cloud.ply";
pub const FIELD_MODEL_FILE: &str = "model.gsdf";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelDir {
    pub root: PathBuf,
}

impl ModelDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn iteration_dir(&self, iteration: u32) -> PathBuf {
        self.root
            .join("point_cloud")
            .join(format!("iteration_{}", iteration))
    }

    pub fn point_cloud_path(&self, iteration: u32) -> PathBuf {
        self.iteration_dir(iteration).join(POINT_CLOUD_FILE)
    }

    pub fn field_model_path(&self, iteration: u32) -> PathBuf {
        self.iteration_dir(iteration).join(FIELD_MODEL_FILE)
    }

    /// Default mesh output directory for an iteration.
    pub fn fusion_dir(&self, iteration: u32) -> PathBuf {
        self.root
            .join("test")
            .join(format!("ours_{}", iteration))
            .join("fusion")
    }

    pub fn load_gaussians(&self, iteration: u32) -> Result<GaussianCloud, LoadError> {
        load_gaussian_ply(&self.point_cloud_path(iteration))
    }

    pub fn load_field(&self, iteration: u32) -> Result<MlpField, ModelError> {
        let path = self.field_model_path(iteration);
        if !path.exists() {
            return Err(ModelError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} does not exist", path.display()),
            )));
        }
        load_field_model(&path)
    }
}

/// File name of the mesh written at binary-search step `step`.
pub fn snapshot_file_name(step: usize, extension: &str) -> String {
    format!("mesh_binary_search_{}.{}", step, extension)
}

/// Path of a snapshot inside `dir`.
pub fn snapshot_path(dir: &Path, step: usize, extension: &str) -> PathBuf {
    dir.join(snapshot_file_name(step, extension))
}

/// Path of the mesh on interpolated crossings inside `dir`.
pub fn interpolated_mesh_path(dir: &Path, extension: &str) -> PathBuf {
    dir.join(format!("mesh_binary_search_interp.{}", extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout() {
        let dir = ModelDir::new("/data/garden");
        assert_eq!(
            dir.point_cloud_path(30000),
            PathBuf::from("/data/garden/point_cloud/iteration_30000/point_cloud.ply")
        );
        assert_eq!(
            dir.field_model_path(7000),
            PathBuf::from("/data/garden/point_cloud/iteration_7000/model.gsdf")
        );
        assert_eq!(
            snapshot_path(&dir.fusion_dir(30000), 7, "ply"),
            PathBuf::from("/data/garden/test/ours_30000/fusion/mesh_binary_search_7.ply")
        );
        assert_eq!(
            interpolated_mesh_path(Path::new("/out"), "obj"),
            PathBuf::from("/out/mesh_binary_search_interp.obj")
        );
    }

    #[test]
    fn test_missing_model_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = ModelDir::new(tmp.path());
        assert!(matches!(dir.load_gaussians(1), Err(LoadError::NotFound(_))));
        assert!(matches!(dir.load_field(1), Err(ModelError::Io(_))));
    }
}
