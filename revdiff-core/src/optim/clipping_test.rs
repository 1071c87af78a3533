use approx::assert_relative_eq;

use crate::error::RevDiffError;
use crate::optim::GradientClipper;
use crate::tensor::Tensor;
use crate::utils::testing::check_tensor_near;

fn row(values: &[f64]) -> Tensor {
    Tensor::new(values.to_vec(), vec![1, values.len()]).unwrap()
}

#[test]
fn test_gradient_at_bound_is_unchanged() {
    // mean 0, std 2: z = ±1, bound = min(2, 2) = 2.
    let g = row(&[2.0, -2.0]);
    GradientClipper::new(2.0, 1e-6).unwrap().clip(&g);
    check_tensor_near(&g, &[1, 2], &[2.0, -2.0], 1e-12);
}

#[test]
fn test_gradient_above_bound_is_clamped_with_sign() {
    // mean 0, std 3: z = ±1, bound = min(5, 2) = 2.
    let g = row(&[3.0, -3.0]);
    GradientClipper::new(5.0, 1e-6).unwrap().clip(&g);
    check_tensor_near(&g, &[1, 2], &[2.0, -2.0], 1e-12);
}

#[test]
fn test_clip_value_caps_outliers() {
    let g = row(&[100.0, 0.0, 0.0, 0.0]);
    GradientClipper::new(1.5, 0.0).unwrap().clip(&g);
    assert_relative_eq!(g.to_vec()[0], 1.5);
}

#[test]
fn test_tiny_nonzero_gradients_are_raised_to_floor() {
    let g = row(&[1e-9, -1e-9, 0.0, 0.5]);
    GradientClipper::new(10.0, 1e-6).unwrap().clip(&g);
    check_tensor_near(&g, &[1, 4], &[1e-6, -1e-6, 0.0, 0.5], 1e-15);
}

#[test]
fn test_zero_variance_standardizes_to_zero() {
    // std 0: z = 0 for every element, so the bound is min(clip, 1) = 1.
    let g = Tensor::new(vec![4.0; 6], vec![2, 3]).unwrap();
    GradientClipper::new(3.0, 0.0).unwrap().clip(&g);
    check_tensor_near(&g, &[2, 3], &[1.0; 6], 1e-12);
}

#[test]
fn test_invalid_configuration() {
    for (clip, floor) in [(0.0, 0.0), (-1.0, 0.0), (f64::NAN, 0.0), (1.0, -0.1), (1.0, 1.0)] {
        assert!(matches!(
            GradientClipper::new(clip, floor),
            Err(RevDiffError::ConfigurationError(_))
        ));
    }
}
