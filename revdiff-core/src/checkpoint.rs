//! Binary persistence of [`ModelLayer`]s.
//!
//! A checkpoint is a directory named `{hex_id}_{iteration}` holding one
//! `{layer_name}.bin` file per layer. Each file is little-endian:
//!
//! ```text
//! magic:    [u8; 4] = b"RVDL"
//! version:  u32     = 1
//! count:    u32     = number of elements
//! per element:
//!   key_len: u32, key: [u8; key_len] (UTF-8)
//!   rank:    u32, dims: [u64; rank]
//!   weight, first moment, second moment: [f64; numel] each
//! ```
//!
//! Gradients are not stored; they are rebuilt by the next backward pass.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use log::debug;
use rand::Rng;

use crate::error::RevDiffError;
use crate::nn::ModelLayer;
use crate::tensor::Tensor;

const MAGIC: &[u8; 4] = b"RVDL";
const VERSION: u32 = 1;
const EXTENSION: &str = "bin";

// --- Low-level IO helpers ---

fn write_u32(w: &mut impl Write, v: u32) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_u64(w: &mut impl Write, v: u64) -> std::io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

fn write_f64s(w: &mut impl Write, tensor: &Tensor) -> std::io::Result<()> {
    for v in tensor.to_vec() {
        w.write_all(&v.to_le_bytes())?;
    }
    Ok(())
}

fn read_u32(r: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64(r: &mut impl Read) -> std::io::Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_f64s(r: &mut impl Read, len: usize) -> std::io::Result<Vec<f64>> {
    let mut buf = [0u8; 8];
    (0..len)
        .map(|_| {
            r.read_exact(&mut buf)?;
            Ok(f64::from_le_bytes(buf))
        })
        .collect()
}

fn to_u32(value: usize, what: &str) -> Result<u32, RevDiffError> {
    u32::try_from(value).map_err(|_| RevDiffError::CheckpointFormat(format!("{what} {value} does not fit in u32")))
}

// --- Single layer ---

/// Writes one layer's weights and moments.
pub fn write_layer(writer: &mut impl Write, layer: &ModelLayer) -> Result<(), RevDiffError> {
    writer.write_all(MAGIC)?;
    write_u32(writer, VERSION)?;
    write_u32(writer, to_u32(layer.len(), "element count")?)?;

    for (key, element) in layer.elements() {
        write_u32(writer, to_u32(key.len(), "key length")?)?;
        writer.write_all(key.as_bytes())?;
        write_u32(writer, to_u32(element.shape().len(), "rank")?)?;
        for &dim in element.shape() {
            write_u64(writer, dim as u64)?;
        }
        write_f64s(writer, element.weight())?;
        write_f64s(writer, element.first_moment())?;
        write_f64s(writer, element.second_moment())?;
    }
    Ok(())
}

/// Reads a layer file into the existing tensors of `layer`.
///
/// Every element of `layer` must appear in the file exactly once, with the
/// same shape.
/// Nothing is modified unless the whole file is valid.
pub fn read_layer(reader: &mut impl Read, layer: &ModelLayer) -> Result<(), RevDiffError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(RevDiffError::CheckpointFormat(format!(
            "expected magic {MAGIC:?}, got {magic:?}"
        )));
    }
    let version = read_u32(reader)?;
    if version != VERSION {
        return Err(RevDiffError::CheckpointFormat(format!(
            "unsupported version {version} (expected {VERSION})"
        )));
    }

    let count = read_u32(reader)? as usize;
    if count != layer.len() {
        return Err(RevDiffError::CheckpointFormat(format!(
            "layer '{}' has {} elements, file has {}",
            layer.name(),
            layer.len(),
            count
        )));
    }

    let mut staged = Vec::with_capacity(count);
    let mut seen = HashSet::with_capacity(count);
    for _ in 0..count {
        let key_len = read_u32(reader)? as usize;
        let mut key_bytes = vec![0u8; key_len];
        reader.read_exact(&mut key_bytes)?;
        let key = String::from_utf8(key_bytes)
            .map_err(|e| RevDiffError::CheckpointFormat(format!("invalid UTF-8 key: {e}")))?;

        if !seen.insert(key.clone()) {
            return Err(RevDiffError::CheckpointFormat(format!(
                "element '{}' of layer '{}' appears more than once",
                key,
                layer.name()
            )));
        }

        let rank = read_u32(reader)? as usize;
        let dims = (0..rank)
            .map(|_| read_u64(reader).map(|d| d as usize))
            .collect::<Result<Vec<_>, _>>()?;

        let element = layer.element(&key)?;
        if dims != element.shape() {
            return Err(RevDiffError::CheckpointFormat(format!(
                "element '{}' of layer '{}' has shape {:?}, file has {:?}",
                key,
                layer.name(),
                element.shape(),
                dims
            )));
        }
        let numel: usize = dims.iter().product();
        let weight = read_f64s(reader, numel)?;
        let first = read_f64s(reader, numel)?;
        let second = read_f64s(reader, numel)?;
        staged.push((element, weight, first, second));
    }

    for (element, weight, first, second) in staged {
        element.weight().copy_from_slice(&weight)?;
        element.first_moment().copy_from_slice(&first)?;
        element.second_moment().copy_from_slice(&second)?;
    }
    Ok(())
}

// --- Checkpoint directories ---

/// Saves every layer under a new directory `{hex_id}_{iteration}` in `root`.
///
/// # Returns
/// The path of the created directory.
pub fn save_checkpoint(
    root: impl AsRef<Path>,
    layers: &[&ModelLayer],
    iteration: u64,
) -> Result<PathBuf, RevDiffError> {
    let id: u64 = rand::thread_rng().gen();
    let dir = root.as_ref().join(format!("{id:016x}_{iteration}"));
    fs::create_dir_all(&dir)?;
    for layer in layers {
        let file = File::create(layer_path(&dir, layer)?)?;
        let mut writer = BufWriter::new(file);
        write_layer(&mut writer, layer)?;
        writer.flush()?;
    }
    debug!(
        "Checkpoint: saved {} layers at iteration {} to {}",
        layers.len(),
        iteration,
        dir.display()
    );
    Ok(dir)
}

/// Loads every layer from a directory written by [`save_checkpoint`].
///
/// # Returns
/// The iteration encoded in the directory name, for
/// [`AdamOptimizer::set_iterations`](crate::optim::AdamOptimizer::set_iterations).
pub fn load_checkpoint(dir: impl AsRef<Path>, layers: &[&ModelLayer]) -> Result<u64, RevDiffError> {
    let dir = dir.as_ref();
    let iteration = parse_iteration(dir)?;
    for layer in layers {
        let file = File::open(layer_path(dir, layer)?)?;
        read_layer(&mut BufReader::new(file), layer)?;
    }
    debug!(
        "Checkpoint: loaded {} layers at iteration {} from {}",
        layers.len(),
        iteration,
        dir.display()
    );
    Ok(iteration)
}

/// The iteration suffix of a checkpoint directory name.
pub fn parse_iteration(dir: impl AsRef<Path>) -> Result<u64, RevDiffError> {
    let dir = dir.as_ref();
    dir.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.rsplit_once('_'))
        .and_then(|(_, iteration)| iteration.parse().ok())
        .ok_or_else(|| {
            RevDiffError::CheckpointFormat(format!(
                "'{}' is not named {{id}}_{{iteration}}",
                dir.display()
            ))
        })
}

fn layer_path(dir: &Path, layer: &ModelLayer) -> Result<PathBuf, RevDiffError> {
    let name = layer.name();
    if name.is_empty() || name.contains(|c: char| c == '/' || c == '\\') || name == "." || name == ".." {
        return Err(RevDiffError::ConfigurationError(format!(
            "layer name '{name}' cannot be used as a file name"
        )));
    }
    Ok(dir.join(format!("{name}.{EXTENSION}")))
}

#[cfg(test)]
#[path = "checkpoint_test.rs"]
mod tests;
