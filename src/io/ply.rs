//! PLY I/O for Gaussian clouds and extracted meshes.
//!
//! Gaussian files follow the usual splatting layout: one `vertex` element with
//! `x, y, z`, optional normals, `f_dc_*`, `f_rest_*` (channel-major), `opacity`
//! (logit), `scale_*` (log) and `rot_*` (w, x, y, z).
//!
//! Meshes are written as `float x, y, z` vertices and `list uchar int
//! vertex_indices` faces, binary little endian or ASCII.

use crate::core::{inverse_sigmoid, quaternion_from_wxyz, Gaussian, GaussianCloud, Mesh};
use byteorder::{LittleEndian, WriteBytesExt};
use nalgebra::{UnitQuaternion, Vector3};
use ply_rs::parser::Parser;
use ply_rs::ply::{
    Addable, DefaultElement, ElementDef, Encoding, Ply, Property, PropertyDef, PropertyType,
    ScalarType,
};
use ply_rs::writer::Writer;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when reading or writing point and mesh files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid PLY format: {0}")]
    InvalidFormat(String),

    #[error("element '{element}' is missing property '{property}'")]
    MissingProperty { element: String, property: String },
}

/// On-disk encoding of a mesh PLY.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PlyEncoding {
    #[default]
    BinaryLittleEndian,
    Ascii,
}

fn open(path: &Path) -> Result<BufReader<File>, LoadError> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            LoadError::NotFound(path.to_path_buf())
        } else {
            LoadError::Io(e)
        }
    })?;
    Ok(BufReader::new(file))
}

fn read_ply(path: &Path) -> Result<Ply<DefaultElement>, LoadError> {
    let mut reader = open(path)?;
    let parser = Parser::<DefaultElement>::new();
    parser
        .read_ply(&mut reader)
        .map_err(|e| LoadError::InvalidFormat(format!("{}: {}", path.display(), e)))
}

fn scalar(element: &DefaultElement, key: &str) -> Option<f32> {
    match element.get(key)? {
        Property::Float(v) => Some(*v),
        Property::Double(v) => Some(*v as f32),
        Property::Char(v) => Some(*v as f32),
        Property::UChar(v) => Some(*v as f32),
        Property::Short(v) => Some(*v as f32),
        Property::UShort(v) => Some(*v as f32),
        Property::Int(v) => Some(*v as f32),
        Property::UInt(v) => Some(*v as f32),
        _ => None,
    }
}

fn required(element: &DefaultElement, key: &str) -> Result<f32, LoadError> {
    scalar(element, key).ok_or_else(|| LoadError::MissingProperty {
        element: "vertex".to_string(),
        property: key.to_string(),
    })
}

fn index_list(element: &DefaultElement) -> Option<Vec<i64>> {
    ["vertex_indices", "vertex_index"].iter().find_map(|key| match element.get(*key)? {
        Property::ListInt(v) => Some(v.iter().map(|&i| i as i64).collect()),
        Property::ListUInt(v) => Some(v.iter().map(|&i| i as i64).collect()),
        Property::ListUChar(v) => Some(v.iter().map(|&i| i as i64).collect()),
        Property::ListChar(v) => Some(v.iter().map(|&i| i as i64).collect()),
        Property::ListShort(v) => Some(v.iter().map(|&i| i as i64).collect()),
        Property::ListUShort(v) => Some(v.iter().map(|&i| i as i64).collect()),
        _ => None,
    })
}

/// Count of `prefix<N>` properties declared on an element, requiring N to be
/// contiguous from zero.
fn indexed_property_count(element: &DefaultElement, prefix: &str) -> usize {
    (0..).take_while(|i| element.contains_key(&format!("{prefix}{i}"))).count()
}

/// Load a Gaussian cloud from a splatting PLY.
///
/// Only `x, y, z` are required. Missing `scale_*` gives unit scale, missing
/// `rot_*` gives identity, missing `opacity` gives fully opaque.
pub fn load_gaussian_ply(path: &Path) -> Result<GaussianCloud, LoadError> {
    let ply = read_ply(path)?;
    let vertices = ply
        .payload
        .get("vertex")
        .ok_or_else(|| LoadError::InvalidFormat("no vertex element".to_string()))?;

    let Some(first) = vertices.first() else {
        return Ok(GaussianCloud::new());
    };
    let has_dc = indexed_property_count(first, "f_dc_") >= 3;
    let rest = indexed_property_count(first, "f_rest_");
    if rest % 3 != 0 {
        return Err(LoadError::InvalidFormat(format!(
            "{} f_rest properties is not a multiple of 3",
            rest
        )));
    }
    let rest_per_channel = rest / 3;
    let has_scale = indexed_property_count(first, "scale_") >= 3;
    let has_rot = indexed_property_count(first, "rot_") >= 4;
    let has_opacity = first.contains_key("opacity");

    let mut cloud = GaussianCloud::new();
    for v in vertices {
        let position = Vector3::new(required(v, "x")?, required(v, "y")?, required(v, "z")?);

        let mut sh_coeffs = Vec::new();
        if has_dc {
            sh_coeffs.push([
                required(v, "f_dc_0")?,
                required(v, "f_dc_1")?,
                required(v, "f_dc_2")?,
            ]);
            for j in 0..rest_per_channel {
                let mut c = [0.0; 3];
                for (ch, slot) in c.iter_mut().enumerate() {
                    *slot = required(v, &format!("f_rest_{}", ch * rest_per_channel + j))?;
                }
                sh_coeffs.push(c);
            }
        }

        let log_scale = if has_scale {
            Vector3::new(required(v, "scale_0")?, required(v, "scale_1")?, required(v, "scale_2")?)
        } else {
            Vector3::zeros()
        };
        let rotation = if has_rot {
            quaternion_from_wxyz(
                required(v, "rot_0")?,
                required(v, "rot_1")?,
                required(v, "rot_2")?,
                required(v, "rot_3")?,
            )
        } else {
            UnitQuaternion::identity()
        };
        let opacity = if has_opacity {
            required(v, "opacity")?
        } else {
            inverse_sigmoid(1.0)
        };

        cloud.push(Gaussian::from_log_scale(position, log_scale, rotation, opacity, sh_coeffs));
    }

    log::info!("loaded {} Gaussians from {}", cloud.len(), path.display());
    Ok(cloud)
}

/// Save a Gaussian cloud as a binary little endian splatting PLY.
///
/// All Gaussians must carry the same number of SH coefficients.
pub fn save_gaussian_ply(cloud: &GaussianCloud, path: &Path) -> Result<(), LoadError> {
    let sh_len = cloud.gaussians.first().map(|g| g.sh_coeffs.len()).unwrap_or(0);
    if let Some(i) = cloud.gaussians.iter().position(|g| g.sh_coeffs.len() != sh_len) {
        return Err(LoadError::InvalidFormat(format!(
            "Gaussian {} has {} SH coefficients, expected {}",
            i,
            cloud.gaussians[i].sh_coeffs.len(),
            sh_len
        )));
    }
    let rest_per_channel = sh_len.saturating_sub(1);

    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "ply")?;
    writeln!(w, "format binary_little_endian 1.0")?;
    writeln!(w, "element vertex {}", cloud.len())?;
    for name in ["x", "y", "z", "nx", "ny", "nz"] {
        writeln!(w, "property float {}", name)?;
    }
    if sh_len > 0 {
        for i in 0..3 {
            writeln!(w, "property float f_dc_{}", i)?;
        }
        for i in 0..rest_per_channel * 3 {
            writeln!(w, "property float f_rest_{}", i)?;
        }
    }
    writeln!(w, "property float opacity")?;
    for i in 0..3 {
        writeln!(w, "property float scale_{}", i)?;
    }
    for i in 0..4 {
        writeln!(w, "property float rot_{}", i)?;
    }
    writeln!(w, "end_header")?;

    for g in &cloud.gaussians {
        for c in g.position.iter() {
            w.write_f32::<LittleEndian>(*c)?;
        }
        for _ in 0..3 {
            w.write_f32::<LittleEndian>(0.0)?;
        }
        if let Some(dc) = g.sh_coeffs.first() {
            for c in dc {
                w.write_f32::<LittleEndian>(*c)?;
            }
            for ch in 0..3 {
                for coeff in &g.sh_coeffs[1..] {
                    w.write_f32::<LittleEndian>(coeff[ch])?;
                }
            }
        }
        w.write_f32::<LittleEndian>(g.opacity)?;
        for c in g.log_scale().iter() {
            w.write_f32::<LittleEndian>(*c)?;
        }
        let q = g.rotation.quaternion();
        for c in [q.w, q.i, q.j, q.k] {
            w.write_f32::<LittleEndian>(c)?;
        }
    }
    w.flush()?;
    Ok(())
}

/// Write a triangle mesh.
pub fn save_mesh_ply(mesh: &Mesh, path: &Path, encoding: PlyEncoding) -> Result<(), LoadError> {
    let mut writer = BufWriter::new(File::create(path)?);
    match encoding {
        PlyEncoding::BinaryLittleEndian => write_mesh_binary(mesh, &mut writer)?,
        PlyEncoding::Ascii => write_mesh_ascii(mesh, &mut writer)?,
    }
    writer.flush()?;
    Ok(())
}

// ply-rs writes the element count instead of the list length for binary
// lists, so the binary body is written by hand.
fn write_mesh_binary<W: Write>(mesh: &Mesh, w: &mut W) -> Result<(), LoadError> {
    writeln!(w, "ply")?;
    writeln!(w, "format binary_little_endian 1.0")?;
    writeln!(w, "element vertex {}", mesh.vertices.len())?;
    writeln!(w, "property float x")?;
    writeln!(w, "property float y")?;
    writeln!(w, "property float z")?;
    writeln!(w, "element face {}", mesh.faces.len())?;
    writeln!(w, "property list uchar int vertex_indices")?;
    writeln!(w, "end_header")?;

    for v in &mesh.vertices {
        w.write_f32::<LittleEndian>(v.x)?;
        w.write_f32::<LittleEndian>(v.y)?;
        w.write_f32::<LittleEndian>(v.z)?;
    }
    for face in &mesh.faces {
        w.write_u8(3)?;
        for &i in face {
            w.write_i32::<LittleEndian>(i as i32)?;
        }
    }
    Ok(())
}

fn write_mesh_ascii<W: Write>(mesh: &Mesh, w: &mut W) -> Result<(), LoadError> {
    let mut ply = Ply::<DefaultElement>::new();
    ply.header.encoding = Encoding::Ascii;

    let mut vertex_def = ElementDef::new("vertex".to_string());
    for name in ["x", "y", "z"] {
        vertex_def.properties.add(PropertyDef::new(
            name.to_string(),
            PropertyType::Scalar(ScalarType::Float),
        ));
    }
    vertex_def.count = mesh.vertices.len();
    ply.header.elements.add(vertex_def);

    let mut face_def = ElementDef::new("face".to_string());
    face_def.properties.add(PropertyDef::new(
        "vertex_indices".to_string(),
        PropertyType::List(ScalarType::UChar, ScalarType::Int),
    ));
    face_def.count = mesh.faces.len();
    ply.header.elements.add(face_def);

    let vertices = mesh
        .vertices
        .iter()
        .map(|v| {
            let mut e = DefaultElement::new();
            e.insert("x".to_string(), Property::Float(v.x));
            e.insert("y".to_string(), Property::Float(v.y));
            e.insert("z".to_string(), Property::Float(v.z));
            e
        })
        .collect();
    ply.payload.insert("vertex".to_string(), vertices);

    let faces = mesh
        .faces
        .iter()
        .map(|f| {
            let mut e = DefaultElement::new();
            e.insert(
                "vertex_indices".to_string(),
                Property::ListInt(f.iter().map(|&i| i as i32).collect()),
            );
            e
        })
        .collect();
    ply.payload.insert("face".to_string(), faces);

    Writer::new()
        .write_ply(w, &mut ply)
        .map_err(|e| LoadError::InvalidFormat(format!("failed to write PLY: {}", e)))?;
    Ok(())
}

/// Read a triangle mesh. Polygons with more than three corners are fanned.
pub fn load_mesh_ply(path: &Path) -> Result<Mesh, LoadError> {
    let ply = read_ply(path)?;
    let mut mesh = Mesh::default();

    if let Some(vertices) = ply.payload.get("vertex") {
        mesh.vertices.reserve(vertices.len());
        for v in vertices {
            mesh.vertices
                .push(Vector3::new(required(v, "x")?, required(v, "y")?, required(v, "z")?));
        }
    }

    let n = mesh.vertices.len() as i64;
    if let Some(faces) = ply.payload.get("face") {
        for (f, element) in faces.iter().enumerate() {
            let indices = index_list(element).ok_or_else(|| LoadError::MissingProperty {
                element: "face".to_string(),
                property: "vertex_indices".to_string(),
            })?;
            if let Some(bad) = indices.iter().find(|&&i| i < 0 || i >= n) {
                return Err(LoadError::InvalidFormat(format!(
                    "face {} references vertex {} of {}",
                    f, bad, n
                )));
            }
            for k in 1..indices.len().saturating_sub(1) {
                mesh.faces
                    .push([indices[0] as u32, indices[k] as u32, indices[k + 1] as u32]);
            }
        }
    }

    Ok(mesh)
}
