//! Dense 2-D kernels used by the built-in operations.
//!
//! Every function allocates its result; node outputs are then copied into
//! their persistent slots by the forward executor.

use crate::error::RevDiffError;
use crate::tensor::{Tensor, TensorData};

/// Returns `(rows, cols)` or a `RankMismatch` naming `operation`.
pub fn dims2(tensor: &Tensor, operation: &str) -> Result<(usize, usize), RevDiffError> {
    let shape = tensor.shape();
    match shape.as_slice() {
        [rows, cols] => Ok((*rows, *cols)),
        _ => Err(RevDiffError::RankMismatch {
            expected: 2,
            actual: shape.len(),
            operation: operation.to_string(),
        }),
    }
}

/// `a · b` for `[m, k] x [k, n]`.
pub fn matmul(a: &Tensor, b: &Tensor) -> Result<Tensor, RevDiffError> {
    let (m, k) = dims2(a, "matmul")?;
    let (k2, n) = dims2(b, "matmul")?;
    if k != k2 {
        return Err(RevDiffError::ShapeMismatch {
            expected: vec![k, n],
            actual: vec![k2, n],
            operation: "matmul".to_string(),
        });
    }
    let lhs = a.read_data();
    let rhs = b.read_data();
    let mut out = vec![0.0; m * n];
    for i in 0..m {
        for p in 0..k {
            let l = lhs.buffer[i * k + p];
            if l == 0.0 {
                continue;
            }
            let row = &rhs.buffer[p * n..(p + 1) * n];
            let dst = &mut out[i * n..(i + 1) * n];
            dst.iter_mut().zip(row).for_each(|(d, r)| *d += l * r);
        }
    }
    Ok(Tensor::from_data(TensorData {
        shape: vec![m, n],
        buffer: out,
    }))
}

/// Swaps the two axes of a matrix.
pub fn transpose(a: &Tensor) -> Result<Tensor, RevDiffError> {
    let (rows, cols) = dims2(a, "transpose")?;
    let src = a.read_data();
    let mut out = vec![0.0; rows * cols];
    for r in 0..rows {
        for c in 0..cols {
            out[c * rows + r] = src.buffer[r * cols + c];
        }
    }
    Ok(Tensor::from_data(TensorData {
        shape: vec![cols, rows],
        buffer: out,
    }))
}

/// Element-wise `f(x)` into a new tensor.
pub fn map(a: &Tensor, f: impl Fn(f64) -> f64) -> Tensor {
    let src = a.read_data();
    Tensor::from_data(TensorData {
        shape: src.shape.clone(),
        buffer: src.buffer.iter().map(|&v| f(v)).collect(),
    })
}

/// Element-wise `f(a, b)` for identically shaped tensors.
pub fn zip_map(
    a: &Tensor,
    b: &Tensor,
    operation: &str,
    f: impl Fn(f64, f64) -> f64,
) -> Result<Tensor, RevDiffError> {
    let lhs = a.read_data();
    // Same handle on both sides: a second read guard on one RwLock is fine.
    let rhs = b.read_data();
    if lhs.shape != rhs.shape {
        return Err(RevDiffError::ShapeMismatch {
            expected: lhs.shape.clone(),
            actual: rhs.shape.clone(),
            operation: operation.to_string(),
        });
    }
    Ok(Tensor::from_data(TensorData {
        shape: lhs.shape.clone(),
        buffer: lhs
            .buffer
            .iter()
            .zip(rhs.buffer.iter())
            .map(|(&x, &y)| f(x, y))
            .collect(),
    }))
}

/// Element-wise `f(a, b, c)` for identically shaped tensors.
pub fn zip_map3(
    a: &Tensor,
    b: &Tensor,
    c: &Tensor,
    operation: &str,
    f: impl Fn(f64, f64, f64) -> f64,
) -> Result<Tensor, RevDiffError> {
    let x = a.read_data();
    let y = b.read_data();
    let z = c.read_data();
    if let Some(other) = [&y.shape, &z.shape].into_iter().find(|s| **s != x.shape) {
        return Err(RevDiffError::ShapeMismatch {
            expected: x.shape.clone(),
            actual: other.clone(),
            operation: operation.to_string(),
        });
    }
    let buffer = x
        .buffer
        .iter()
        .zip(y.buffer.iter())
        .zip(z.buffer.iter())
        .map(|((&p, &q), &r)| f(p, q, r))
        .collect();
    Ok(Tensor::from_data(TensorData {
        shape: x.shape.clone(),
        buffer,
    }))
}

/// `a[m, n] + bias[1, n]`, broadcasting the bias row over every row of `a`.
pub fn add_row_broadcast(a: &Tensor, bias: &Tensor) -> Result<Tensor, RevDiffError> {
    let (rows, cols) = dims2(a, "add_row_broadcast")?;
    let (bias_rows, bias_cols) = dims2(bias, "add_row_broadcast")?;
    if bias_rows != 1 || bias_cols != cols {
        return Err(RevDiffError::ShapeMismatch {
            expected: vec![1, cols],
            actual: vec![bias_rows, bias_cols],
            operation: "add_row_broadcast".to_string(),
        });
    }
    let src = a.read_data();
    let b = bias.read_data();
    let mut out = src.buffer.clone();
    for r in 0..rows {
        out[r * cols..(r + 1) * cols]
            .iter_mut()
            .zip(b.buffer.iter())
            .for_each(|(o, v)| *o += v);
    }
    Ok(Tensor::from_data(TensorData {
        shape: vec![rows, cols],
        buffer: out,
    }))
}

/// Column sums of a matrix, as a `[1, cols]` row.
pub fn sum_rows(a: &Tensor) -> Result<Tensor, RevDiffError> {
    let (rows, cols) = dims2(a, "sum_rows")?;
    let src = a.read_data();
    let mut out = vec![0.0; cols];
    for r in 0..rows {
        out.iter_mut()
            .zip(&src.buffer[r * cols..(r + 1) * cols])
            .for_each(|(o, v)| *o += v);
    }
    Ok(Tensor::from_data(TensorData {
        shape: vec![1, cols],
        buffer: out,
    }))
}
