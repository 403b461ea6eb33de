//! OBJ export for extracted meshes.
//!
//! ```text
//! v x y z           # vertex positions
//! f i j k           # triangles, 1-based
//! ```

use crate::core::Mesh;
use crate::io::LoadError;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub fn save_obj(mesh: &Mesh, path: &Path) -> Result<(), LoadError> {
    let mut w = BufWriter::new(File::create(path)?);
    write_obj(mesh, &mut w)?;
    w.flush()?;
    Ok(())
}

fn write_obj<W: Write>(mesh: &Mesh, w: &mut W) -> Result<(), LoadError> {
    writeln!(w, "# {} vertices, {} faces", mesh.vertices.len(), mesh.faces.len())?;
    for v in &mesh.vertices {
        writeln!(w, "v {} {} {}", v.x, v.y, v.z)?;
    }
    for [a, b, c] in &mesh.faces {
        writeln!(w, "f {} {} {}", a + 1, b + 1, c + 1)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Vector3;

    #[test]
    fn test_faces_are_one_based() {
        let mesh = Mesh::new(
            vec![Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 0.5, 0.0)],
            vec![[0, 1, 2]],
        );
        let mut buf = Vec::new();
        write_obj(&mesh, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("v 0 0.5 0\n"));
        assert!(text.contains("f 1 2 3\n"));
        assert_eq!(text.lines().filter(|l| l.starts_with("v ")).count(), 3);
    }
}
