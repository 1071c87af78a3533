// src/ops/activation/mod.rs

//! # Activation Functions
//!
//! Element-wise non-linearities. Backward transforms reuse the node output
//! where the derivative is expressible in it (sigmoid, tanh) and the input
//! otherwise (leaky ReLU).

pub mod leaky_relu;
pub mod sigmoid;
pub mod tanh;

pub use leaky_relu::LeakyReluOp;
pub use sigmoid::SigmoidOp;
pub use tanh::TanhOp;

#[cfg(test)]
#[path = "activation_test.rs"]
mod tests;
