//! Tensor bridge: conversions between plain index/score vectors and burn
//! tensors.
//!
//! Tuples arrive as `usize` indices from `concept-data`; burn row lookups
//! need `Tensor<B, 1, Int>`. Scores leave the model as `f64`s for decoding
//! and logging.

use burn::prelude::*;
use burn::tensor::TensorData;

/// Convert a slice of indices to a burn 1D integer tensor.
///
/// # Panics
/// Panics if `indices` is empty.
pub fn indices_to_tensor<B: Backend>(indices: &[usize], device: &B::Device) -> Tensor<B, 1, Int> {
    assert!(!indices.is_empty(), "indices must not be empty");
    let values: Vec<i64> = indices.iter().map(|&i| i as i64).collect();
    Tensor::from_data(TensorData::new(values, [indices.len()]), device)
}

/// Build a `(rows, cols)` float tensor from row-major `f32` values.
pub fn matrix_from_values<B: Backend>(
    values: Vec<f32>,
    rows: usize,
    cols: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    assert_eq!(
        values.len(),
        rows * cols,
        "expected {rows}x{cols} values, got {}",
        values.len()
    );
    Tensor::from_data(TensorData::new(values, [rows, cols]), device)
}

/// Extract f64 values from a burn 1D tensor.
pub fn tensor_to_vec<B: Backend>(tensor: Tensor<B, 1>) -> Vec<f64> {
    tensor.into_data().iter::<f64>().collect()
}

/// Extract a single f64 scalar from a burn 1D tensor.
///
/// # Panics
/// Panics if the tensor does not contain exactly one element.
pub fn tensor_to_f64<B: Backend>(tensor: Tensor<B, 1>) -> f64 {
    tensor.into_scalar().elem::<f64>()
}
