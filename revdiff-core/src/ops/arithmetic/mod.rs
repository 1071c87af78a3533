// src/ops/arithmetic/mod.rs

//! Element-wise arithmetic operations on matrices.

pub mod add;
pub mod identity;
pub mod mul;
pub mod sub;

pub use add::{MatrixAddBroadcastingOp, MatrixAddOp};
pub use identity::IdentityOp;
pub use mul::HadamardProductOp;
pub use sub::MatrixSubtractOp;
