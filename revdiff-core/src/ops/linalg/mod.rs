// src/ops/linalg/mod.rs

pub mod matmul;
pub mod transpose;

pub use matmul::MatrixMultiplyOp;
pub use transpose::MatrixTransposeOp;
