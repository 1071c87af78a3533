use crate::error::RevDiffError;
use crate::ops::arithmetic::HadamardProductOp;
use crate::ops::grad_check::check_grad;
use crate::ops::Operation;
use crate::utils::testing::check_tensor_near;
use crate::Tensor;

#[test]
fn test_hadamard_forward() {
    let a = Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    let b = Tensor::from_rows(&[vec![2.0, 0.5], vec![-1.0, 0.0]]).unwrap();
    let out = HadamardProductOp.forward(&[a, b]).unwrap();
    check_tensor_near(&out, &[2, 2], &[2.0, 1.0, -3.0, 0.0], 1e-12);
}

#[test]
fn test_hadamard_backward_matches_finite_differences() {
    let a = Tensor::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    let b = Tensor::from_rows(&[vec![2.0, 0.5], vec![-1.0, 0.3]]).unwrap();
    let grad = Tensor::from_rows(&[vec![1.0, -1.0], vec![0.5, 2.0]]).unwrap();
    check_grad(&HadamardProductOp, &[a, b], &grad, 1e-6, 1e-6).unwrap();
}

#[test]
fn test_hadamard_shape_mismatch() {
    let a = Tensor::from_rows(&[vec![1.0, 2.0]]).unwrap();
    let b = Tensor::from_rows(&[vec![1.0], vec![2.0]]).unwrap();
    assert!(matches!(
        HadamardProductOp.forward(&[a, b]),
        Err(RevDiffError::ShapeMismatch { .. })
    ));
}
