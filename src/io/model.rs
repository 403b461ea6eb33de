//! Binary format for SDF network weights.
//!
//! File format: `.gsdf`
//!
//! Layout (all little endian):
//! ```text
//! Header:
//!   - Magic: "GSDFNET\0" (8 bytes)
//!   - Version: u32
//!   - Bounding box min: 3 × f32
//!   - Bounding box max: 3 × f32
//!   - Layer count: u32
//!   - Compression: u32 - 0=none, 1=lz4
//!
//! Payload (per layer, lz4-compressed as a whole when requested):
//!   - Inputs: u32
//!   - Outputs: u32
//!   - Weights: outputs × inputs × f32, row major
//!   - Biases: outputs × f32
//! ```

use crate::core::BoundingBox;
use crate::field::{DenseLayer, FieldError, MlpField};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use nalgebra::{DMatrix, DVector, Vector3};
use std::io::{Read, Write};
use std::path::Path;

const MAGIC: &[u8; 8] = b"GSDFNET\0";
const VERSION: u32 = 1;

/// Largest layer width accepted on load.
const MAX_WIDTH: u32 = 1 << 16;

/// Compression method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None = 0,
    #[cfg(feature = "lz4")]
    Lz4 = 1,
}

/// Error type for field model I/O
#[derive(Debug)]
pub enum ModelError {
    Io(std::io::Error),
    InvalidMagic,
    UnsupportedVersion(u32),
    UnsupportedCompression(u32),
    InvalidData(String),
    Network(FieldError),
}

impl From<std::io::Error> for ModelError {
    fn from(e: std::io::Error) -> Self {
        ModelError::Io(e)
    }
}

impl From<FieldError> for ModelError {
    fn from(e: FieldError) -> Self {
        ModelError::Network(e)
    }
}

impl std::fmt::Display for ModelError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelError::Io(e) => write!(f, "I/O error: {}", e),
            ModelError::InvalidMagic => write!(f, "Invalid file magic (not a .gsdf file)"),
            ModelError::UnsupportedVersion(v) => write!(f, "Unsupported version: {}", v),
            ModelError::UnsupportedCompression(c) => write!(f, "Unsupported compression: {}", c),
            ModelError::InvalidData(msg) => write!(f, "Invalid data: {}", msg),
            ModelError::Network(e) => write!(f, "Invalid network: {}", e),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ModelError::Io(e) => Some(e),
            ModelError::Network(e) => Some(e),
            _ => None,
        }
    }
}

/// Save a field network to a .gsdf file
pub fn save_field_model<P: AsRef<Path>>(
    path: P,
    field: &MlpField,
    compression: Compression,
) -> Result<(), ModelError> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);
    write_field_model(&mut writer, field, compression)?;
    writer.flush()?;
    Ok(())
}

/// Load a field network from a .gsdf file
pub fn load_field_model<P: AsRef<Path>>(path: P) -> Result<MlpField, ModelError> {
    let file = std::fs::File::open(path)?;
    let mut reader = std::io::BufReader::new(file);
    read_field_model(&mut reader)
}

pub fn write_field_model<W: Write>(
    writer: &mut W,
    field: &MlpField,
    compression: Compression,
) -> Result<(), ModelError> {
    writer.write_all(MAGIC)?;
    writer.write_u32::<LittleEndian>(VERSION)?;
    for c in field.bounding_box.min.iter().chain(field.bounding_box.max.iter()) {
        writer.write_f32::<LittleEndian>(*c)?;
    }
    writer.write_u32::<LittleEndian>(field.layers.len() as u32)?;
    writer.write_u32::<LittleEndian>(compression as u32)?;

    let mut data = Vec::new();
    for layer in &field.layers {
        write_layer(&mut data, layer)?;
    }

    match compression {
        Compression::None => writer.write_all(&data)?,
        #[cfg(feature = "lz4")]
        Compression::Lz4 => writer.write_all(&lz4_flex::compress_prepend_size(&data))?,
    }
    Ok(())
}

pub fn read_field_model<R: Read>(reader: &mut R) -> Result<MlpField, ModelError> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(ModelError::InvalidMagic);
    }
    let version = reader.read_u32::<LittleEndian>()?;
    if version != VERSION {
        return Err(ModelError::UnsupportedVersion(version));
    }

    let mut bounds = [0.0f32; 6];
    reader.read_f32_into::<LittleEndian>(&mut bounds)?;
    let bounding_box = BoundingBox::new(
        Vector3::new(bounds[0], bounds[1], bounds[2]),
        Vector3::new(bounds[3], bounds[4], bounds[5]),
    );

    let layer_count = reader.read_u32::<LittleEndian>()?;
    let compression = match reader.read_u32::<LittleEndian>()? {
        0 => Compression::None,
        #[cfg(feature = "lz4")]
        1 => Compression::Lz4,
        other => return Err(ModelError::UnsupportedCompression(other)),
    };

    let data = match compression {
        Compression::None => {
            let mut data = Vec::new();
            reader.read_to_end(&mut data)?;
            data
        }
        #[cfg(feature = "lz4")]
        Compression::Lz4 => {
            let mut compressed = Vec::new();
            reader.read_to_end(&mut compressed)?;
            lz4_flex::decompress_size_prepended(&compressed)
                .map_err(|e| ModelError::InvalidData(format!("LZ4 decompression failed: {}", e)))?
        }
    };

    let mut cursor = std::io::Cursor::new(data);
    let layers = (0..layer_count)
        .map(|i| read_layer(&mut cursor, i))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MlpField::new(bounding_box, layers)?)
}

fn write_layer<W: Write>(writer: &mut W, layer: &DenseLayer) -> Result<(), ModelError> {
    writer.write_u32::<LittleEndian>(layer.inputs() as u32)?;
    writer.write_u32::<LittleEndian>(layer.outputs() as u32)?;
    for r in 0..layer.outputs() {
        for c in 0..layer.inputs() {
            writer.write_f32::<LittleEndian>(layer.weights[(r, c)])?;
        }
    }
    for b in layer.bias.iter() {
        writer.write_f32::<LittleEndian>(*b)?;
    }
    Ok(())
}

fn read_layer<R: Read>(reader: &mut R, index: u32) -> Result<DenseLayer, ModelError> {
    let inputs = reader.read_u32::<LittleEndian>()?;
    let outputs = reader.read_u32::<LittleEndian>()?;
    if inputs == 0 || outputs == 0 || inputs > MAX_WIDTH || outputs > MAX_WIDTH {
        return Err(ModelError::InvalidData(format!(
            "layer {} has shape {}x{}",
            index, outputs, inputs
        )));
    }
    let (inputs, outputs) = (inputs as usize, outputs as usize);

    let mut weights = vec![0.0f32; inputs * outputs];
    reader.read_f32_into::<LittleEndian>(&mut weights)?;
    let mut bias = vec![0.0f32; outputs];
    reader.read_f32_into::<LittleEndian>(&mut bias)?;

    Ok(DenseLayer::new(
        DMatrix::from_row_slice(outputs, inputs, &weights),
        DVector::from_vec(bias),
    )?)
}
