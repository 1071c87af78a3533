// src/tensor/mod.rs

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::RevDiffError;

pub mod create;
pub mod matrix;

pub use create::{full, zeros, zeros_like};

/// Internal storage and metadata for a Tensor.
///
/// Always contiguous and row-major. Wrapped in `Arc<RwLock<TensorData>>` by
/// [`Tensor`] so that many nodes, time steps and layers can share one buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorData {
    /// The shape (dimensions) of the tensor.
    pub(crate) shape: Vec<usize>,
    /// Flat element buffer, `shape.iter().product()` long.
    pub(crate) buffer: Vec<f64>,
}

/// Represents a multi-dimensional array of `f64` values.
///
/// `Tensor` is a handle: cloning it shares the underlying buffer, and two
/// handles compare equal only when they point at the same storage. This is
/// what lets a weight bound by name in the graph builder be updated in place
/// by the optimizer and seen by every node that references it.
///
/// Use [`Tensor::deep_clone`] to copy the values into fresh storage.
pub struct Tensor {
    /// Arc for shared ownership, RwLock for interior mutability of TensorData.
    pub(crate) data: Arc<RwLock<TensorData>>,
}

impl Tensor {
    /// Creates a new Tensor with the given data and shape.
    ///
    /// # Errors
    /// Returns `RevDiffError::TensorCreationError` if the length of `data_vec` does not match
    /// the number of elements described by `shape`.
    pub fn new(data_vec: Vec<f64>, shape: Vec<usize>) -> Result<Self, RevDiffError> {
        let numel: usize = shape.iter().product();
        if data_vec.len() != numel {
            return Err(RevDiffError::TensorCreationError {
                data_len: data_vec.len(),
                shape,
            });
        }
        Ok(Self::from_data(TensorData {
            shape,
            buffer: data_vec,
        }))
    }

    /// Creates a 2-D tensor from a list of equally long rows.
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self, RevDiffError> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some(bad) = rows.iter().find(|r| r.len() != cols) {
            return Err(RevDiffError::ShapeMismatch {
                expected: vec![cols],
                actual: vec![bad.len()],
                operation: "from_rows".to_string(),
            });
        }
        let buffer: Vec<f64> = rows.iter().flatten().copied().collect();
        Tensor::new(buffer, vec![rows.len(), cols])
    }

    /// A `[1, 1]` tensor holding `value`.
    pub fn scalar(value: f64) -> Self {
        Self::from_data(TensorData {
            shape: vec![1, 1],
            buffer: vec![value],
        })
    }

    /// A tensor with no elements. Node slots start out like this until the
    /// first forward pass sizes them.
    pub fn empty() -> Self {
        Self::from_data(TensorData {
            shape: vec![0],
            buffer: Vec::new(),
        })
    }

    pub(crate) fn from_data(data: TensorData) -> Self {
        Tensor {
            data: Arc::new(RwLock::new(data)),
        }
    }

    pub(crate) fn read_data(&self) -> RwLockReadGuard<'_, TensorData> {
        self.data.read().unwrap_or_else(|poisoned: PoisonError<_>| {
            log::warn!("Tensor RwLock was poisoned. Recovering read guard.");
            poisoned.into_inner()
        })
    }

    pub(crate) fn write_data(&self) -> RwLockWriteGuard<'_, TensorData> {
        self.data.write().unwrap_or_else(|poisoned: PoisonError<_>| {
            log::warn!("Tensor RwLock was poisoned. Recovering write guard.");
            poisoned.into_inner()
        })
    }

    // --- Accessors ---

    /// Returns a copy of the shape.
    pub fn shape(&self) -> Vec<usize> {
        self.read_data().shape.clone()
    }

    /// Number of dimensions.
    pub fn rank(&self) -> usize {
        self.read_data().shape.len()
    }

    /// Total number of elements.
    pub fn numel(&self) -> usize {
        self.read_data().buffer.len()
    }

    /// Copies the elements out in row-major order.
    pub fn to_vec(&self) -> Vec<f64> {
        self.read_data().buffer.clone()
    }

    /// Reads one element by multi-dimensional index.
    pub fn get(&self, index: &[usize]) -> Result<f64, RevDiffError> {
        let guard = self.read_data();
        let out_of_bounds = || RevDiffError::IndexOutOfBounds {
            index: index.to_vec(),
            shape: guard.shape.clone(),
        };
        if index.len() != guard.shape.len() {
            return Err(out_of_bounds());
        }
        let mut flat = 0;
        for (&i, &dim) in index.iter().zip(guard.shape.iter()) {
            if i >= dim {
                return Err(out_of_bounds());
            }
            flat = flat * dim + i;
        }
        Ok(guard.buffer[flat])
    }

    /// True when both handles share the same storage.
    pub fn ptr_eq(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Address of the shared storage. Equal for handles that `ptr_eq`.
    pub(crate) fn storage_id(&self) -> usize {
        Arc::as_ptr(&self.data) as usize
    }

    /// Copies shape and values into new, unshared storage.
    pub fn deep_clone(&self) -> Tensor {
        Self::from_data(self.read_data().clone())
    }

    /// Returns `false` if any element is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.read_data().buffer.iter().all(|v| v.is_finite())
    }

    /// Population mean and standard deviation over all elements.
    pub fn mean_and_std(&self) -> (f64, f64) {
        let guard = self.read_data();
        let n = guard.buffer.len();
        if n == 0 {
            return (0.0, 0.0);
        }
        let mean = guard.buffer.iter().sum::<f64>() / n as f64;
        let variance = guard
            .buffer
            .iter()
            .map(|v| (v - mean) * (v - mean))
            .sum::<f64>()
            / n as f64;
        (mean, variance.sqrt())
    }

    // --- In-place mutation ---

    /// Overwrites this tensor's shape and values with `source`'s.
    ///
    /// The existing allocation is reused when the element count matches, so
    /// repeated forward passes do not reallocate node outputs.
    pub fn assign(&self, source: &Tensor) {
        if self.ptr_eq(source) {
            return;
        }
        let src = source.read_data();
        let mut dst = self.write_data();
        if dst.buffer.len() == src.buffer.len() {
            dst.buffer.copy_from_slice(&src.buffer);
        } else {
            dst.buffer.clone_from(&src.buffer);
        }
        dst.shape.clone_from(&src.shape);
    }

    /// Overwrites the values, keeping the shape.
    ///
    /// # Errors
    /// Returns `RevDiffError::TensorCreationError` if `values` has the wrong length.
    pub fn copy_from_slice(&self, values: &[f64]) -> Result<(), RevDiffError> {
        let mut guard = self.write_data();
        if guard.buffer.len() != values.len() {
            return Err(RevDiffError::TensorCreationError {
                data_len: values.len(),
                shape: guard.shape.clone(),
            });
        }
        guard.buffer.copy_from_slice(values);
        Ok(())
    }

    /// Sets every element to `value`.
    pub fn fill(&self, value: f64) {
        self.write_data().buffer.iter_mut().for_each(|v| *v = value);
    }

    /// Element-wise `self += other`.
    ///
    /// # Errors
    /// Returns `RevDiffError::ShapeMismatch` if the shapes differ.
    pub fn add_assign(&self, other: &Tensor) -> Result<(), RevDiffError> {
        if self.ptr_eq(other) {
            self.map_inplace(|v| v + v);
            return Ok(());
        }
        let src = other.read_data();
        let mut dst = self.write_data();
        if dst.shape != src.shape {
            return Err(RevDiffError::ShapeMismatch {
                expected: dst.shape.clone(),
                actual: src.shape.clone(),
                operation: "add_assign".to_string(),
            });
        }
        dst.buffer
            .iter_mut()
            .zip(src.buffer.iter())
            .for_each(|(d, s)| *d += s);
        Ok(())
    }

    /// Applies `f` to every element in place.
    pub fn map_inplace(&self, f: impl Fn(f64) -> f64) {
        self.write_data().buffer.iter_mut().for_each(|v| *v = f(*v));
    }
}

impl Clone for Tensor {
    /// Shallow clone: the new handle shares storage with `self`.
    fn clone(&self) -> Self {
        Tensor {
            data: Arc::clone(&self.data),
        }
    }
}

impl PartialEq for Tensor {
    /// Identity comparison, not value comparison.
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.read_data();
        f.debug_struct("Tensor")
            .field("shape", &guard.shape)
            .field("data", &guard.buffer)
            .finish()
    }
}

#[cfg(test)]
#[path = "tensor_test.rs"]
mod tests;
