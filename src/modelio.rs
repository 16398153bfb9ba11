//! Saving/loading of learnable parameters.
//!
//! # `.bpat` Serialization Format
//!
//! A `.bpat` file stores one or more `f64` tensors, e.g. the values returned by
//! [`crate::layers::Correlate2d::parameters`].
//!
//! ```text
//! ┌────────────┬────────────┬─────────────────────┐
//! │ Header     │ Tensor N   │ Tensor N+1 …        │
//! ├────────────┼────────────┼─────────────────────┤
//! │ "bpat"[4]  │ u64: ndim  │ u64: ndim           │
//! │ u8: count  │ [u64; ndim] shape                │
//! │            │ [f64; prod(shape)] data          │
//! └────────────┴──────────────────────────────────┘
//! ```
//!
//! All integers and floats are little-endian. Decoded tensors are checked with
//! `briny`'s [`Validate`] before they are handed out.
//!
//! # Limitations
//! - Maximum 255 tensors per file (due to `u8` count limit)
//! - No per-tensor metadata (names, dtypes, etc.)
//!
//! # Example
//!
//! ```rust
//! use briny_spectral::layers::Correlate2d;
//! use briny_spectral::modelio::{load_model, save_model};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let path = std::env::temp_dir().join("briny_spectral_doc.bpat");
//!     let op = Correlate2d::new(3, 3)?.with_bias(0.5);
//!
//!     save_model(&path, &op.parameters())?;
//!     let restored = Correlate2d::from_parameters(&load_model(&path)?)?;
//!     assert_eq!(restored.parameters(), op.parameters());
//!
//!     std::fs::remove_file(path)?;
//!     Ok(())
//! }
//! ```

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use briny::prelude::{TrustedData, Validate, ValidationError};
use log::debug;

use crate::error::ModelIoError;
use crate::tensors::{Ten64, Tensor};

const BPAT_MAGIC: &[u8; 4] = b"bpat";

/// A tensor as read from disk, before validation.
struct PackedTensor {
    shape: Vec<u64>,
    data: Vec<f64>,
}

impl Validate for PackedTensor {
    fn validate(&self) -> Result<(), ValidationError> {
        let expected = self
            .shape
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .ok_or(ValidationError)?;
        if self.data.len() as u64 != expected || self.data.iter().any(|v| !v.is_finite()) {
            return Err(ValidationError);
        }
        Ok(())
    }
}

/// Saves tensors to a `.bpat` file.
///
/// # Errors
/// - [`ModelIoError::TooManyTensors`] for more than 255 tensors
/// - [`ModelIoError::Io`] if creating or writing the file fails
pub fn save_model(path: impl AsRef<Path>, tensors: &[Ten64]) -> Result<(), ModelIoError> {
    let count = u8::try_from(tensors.len()).map_err(|_| ModelIoError::TooManyTensors(tensors.len()))?;
    let path = path.as_ref();
    let mut file = BufWriter::new(File::create(path)?);

    file.write_all(BPAT_MAGIC)?;
    file.write_all(&[count])?;

    for tensor in tensors {
        file.write_all(&(tensor.shape.len() as u64).to_le_bytes())?;
        for &dim in &tensor.shape {
            file.write_all(&(dim as u64).to_le_bytes())?;
        }
        for &val in &tensor.data {
            file.write_all(&val.to_le_bytes())?;
        }
    }
    file.flush()?;

    debug!("saved {count} tensors to {}", path.display());
    Ok(())
}

fn read_u64(reader: &mut impl Read) -> Result<u64, ModelIoError> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

/// Loads every tensor from a `.bpat` file.
///
/// # Errors
/// - [`ModelIoError::BadMagic`] if the file does not start with `bpat`
/// - [`ModelIoError::Invalid`] if a tensor's shape and data disagree or hold
///   non-finite values
/// - [`ModelIoError::Io`] on read failure, including truncated files
pub fn load_model(path: impl AsRef<Path>) -> Result<Vec<Ten64>, ModelIoError> {
    let path = path.as_ref();
    let mut file = BufReader::new(File::open(path)?);

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic)?;
    if &magic != BPAT_MAGIC {
        return Err(ModelIoError::BadMagic);
    }

    let mut count = [0u8; 1];
    file.read_exact(&mut count)?;
    let count = usize::from(count[0]);

    let mut tensors = Vec::with_capacity(count);
    for index in 0..count {
        let ndim = read_u64(&mut file)?;
        let shape = (0..ndim)
            .map(|_| read_u64(&mut file))
            .collect::<Result<Vec<_>, _>>()?;

        let size = shape
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .ok_or(ModelIoError::Invalid { index })?;
        let data = (0..size)
            .map(|_| read_u64(&mut file).map(f64::from_bits))
            .collect::<Result<Vec<_>, _>>()?;

        let trusted = TrustedData::new(PackedTensor { shape, data })
            .map_err(|_| ModelIoError::Invalid { index })?;
        let inner = trusted.into_inner();
        let shape = inner
            .shape
            .iter()
            .map(|&d| usize::try_from(d).map_err(|_| ModelIoError::Invalid { index }))
            .collect::<Result<Vec<_>, _>>()?;
        tensors.push(Tensor::new(shape, inner.data));
    }

    debug!("loaded {} tensors from {}", tensors.len(), path.display());
    Ok(tensors)
}
