// --- File: src/functional/mse.rs ---

//! Mean squared error and its square root.
//!
//! Formula: `MSE = sum((y_pred - y_true)^2) / n`, `RMSE = sqrt(MSE)`.

use super::check_same_shape;
use crate::config::{NumOutputs, ReduceDims};
use crate::metrics::{MetricError, Result};
use crate::tensor::{numel, Element, MetricOutput};
use ndarray::{ArrayD, ArrayViewD, Axis, IxDyn, ShapeError};

fn reshape_error(err: ShapeError) -> MetricError {
    MetricError::InvalidArgument(format!("cannot reshape squared error: {}", err))
}

/// Sums the squared error of one batch.
///
/// # Arguments
///
/// * `preds` - Model predictions.
/// * `target` - Ground truth, same shape as `preds`.
/// * `num_outputs` - Shape of the per-output result.
/// * `reduce_dims` - Axes to sum over. With `ReduceDims::All` a scalar output
///   sums every element, while a multi-output input must be shaped
///   `[rows, *num_outputs]` and is summed over the rows.
///
/// # Returns
///
/// The summed squared error, shaped like `num_outputs` (0-d for a scalar
/// output), and the number of elements that contributed to each output slot.
pub fn mean_squared_error_update<T: Element>(
    preds: ArrayViewD<'_, T>,
    target: ArrayViewD<'_, T>,
    num_outputs: &NumOutputs,
    reduce_dims: &ReduceDims,
) -> Result<(ArrayD<T>, u64)> {
    check_same_shape(&preds, &target)?;

    let out_shape = num_outputs.shape();
    let out_size = num_outputs.size();
    let squared = (&preds - &target).mapv_into(|d| d * d);

    match reduce_dims.resolve(preds.ndim())? {
        None if out_shape.is_empty() => {
            let sum = ArrayD::from_elem(IxDyn(&[]), squared.sum());
            Ok((sum, numel(&preds)))
        }
        None => {
            // Rows along axis 0, one output slot per trailing index.
            let shape = preds.shape();
            if shape.len() < 2 || shape[1..] != out_shape[..] {
                return Err(MetricError::OutputShape {
                    expected: out_shape,
                    actual: shape.to_vec(),
                });
            }
            let rows = shape[0];
            Ok((squared.sum_axis(Axis(0)), rows as u64))
        }
        Some(axes) => {
            let mut sum = squared;
            let mut n_obs = 1u64;
            // Highest axis first so the remaining indices stay valid.
            for &axis in axes.iter().rev() {
                n_obs *= sum.len_of(Axis(axis)) as u64;
                sum = sum.sum_axis(Axis(axis));
            }
            let kept = sum.shape().to_vec();
            if kept.iter().product::<usize>() != out_size {
                return Err(MetricError::OutputShape {
                    expected: out_shape,
                    actual: kept,
                });
            }
            let sum = sum
                .into_shape_with_order(IxDyn(&out_shape))
                .map_err(reshape_error)?;
            Ok((sum, n_obs))
        }
    }
}

/// Divides the accumulated squared error by the observation count.
///
/// With `squared == false` the elementwise square root (RMSE) is returned.
/// A zero count yields NaN.
pub fn mean_squared_error_compute<T: Element>(
    sum_squared_error: &ArrayD<T>,
    n_obs: u64,
    squared: bool,
) -> ArrayD<T> {
    let n = T::from_count(n_obs);
    let mse = sum_squared_error.mapv(|s| s / n);
    if squared {
        mse
    } else {
        mse.mapv_into(|v| v.sqrt())
    }
}

/// One-shot MSE (or RMSE) over all axes.
///
/// With `num_outputs > 1` the input must be shaped `[rows, num_outputs]`.
pub fn mean_squared_error<T: Element>(
    preds: ArrayViewD<'_, T>,
    target: ArrayViewD<'_, T>,
    squared: bool,
    num_outputs: usize,
) -> Result<MetricOutput<T>> {
    let num_outputs = NumOutputs::Count(num_outputs);
    num_outputs.validate()?;
    let (sum, n_obs) = mean_squared_error_update(preds, target, &num_outputs, &ReduceDims::All)?;
    Ok(MetricOutput::from_array(mean_squared_error_compute(
        &sum, n_obs, squared,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array3};

    #[test]
    fn test_mse_scalar() {
        let preds = array![3.0f32, 5.0, 2.5, 7.0].into_dyn();
        let target = array![2.5f32, 5.0, 4.0, 8.0].into_dyn();

        let out = mean_squared_error(preds.view(), target.view(), true, 1).unwrap();
        assert_abs_diff_eq!(out.as_scalar().unwrap(), 0.875, epsilon = 1e-6);
    }

    #[test]
    fn test_rmse_scalar() {
        let preds = array![1.0f64, 2.0, 3.0, 4.0].into_dyn();
        let target = array![2.0f64, 3.0, 4.0, 5.0].into_dyn();

        let out = mean_squared_error(preds.view(), target.view(), false, 1).unwrap();
        assert_abs_diff_eq!(out.as_scalar().unwrap(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_mse_multioutput() {
        let preds = array![[1.0f32, 2.0, 3.0], [1.0, 2.0, 3.0]].into_dyn();
        let target = ArrayD::<f32>::zeros(IxDyn(&[2, 3]));

        let out = mean_squared_error(preds.view(), target.view(), true, 3).unwrap();
        let values = out.as_tensor().unwrap();
        assert_eq!(values.shape(), &[3]);
        assert_eq!(values.as_slice().unwrap(), &[1.0, 4.0, 9.0]);
    }

    #[test]
    fn test_update_counts_rows_for_multioutput() {
        let preds = array![[1.0f64, 2.0], [3.0, 4.0], [5.0, 6.0]].into_dyn();
        let target = ArrayD::<f64>::zeros(IxDyn(&[3, 2]));

        let (sum, n_obs) = mean_squared_error_update(
            preds.view(),
            target.view(),
            &NumOutputs::Count(2),
            &ReduceDims::All,
        )
        .unwrap();
        assert_eq!(n_obs, 3);
        assert_eq!(sum.as_slice().unwrap(), &[35.0, 56.0]);
    }

    #[test]
    fn test_reduce_selected_axes() {
        let target = Array3::<f64>::from_shape_fn((2, 5, 7), |(i, j, k)| (i + j * k) as f64 * 0.1)
            .into_dyn();
        let preds = target.mapv(|t| t + 2.0);

        let (sum, n_obs) = mean_squared_error_update(
            preds.view(),
            target.view(),
            &NumOutputs::Count(5),
            &ReduceDims::Axes(vec![0, 2]),
        )
        .unwrap();
        assert_eq!(n_obs, 14);
        assert_eq!(sum.shape(), &[5]);

        let mse = mean_squared_error_compute(&sum, n_obs, true);
        for v in mse.iter() {
            assert_abs_diff_eq!(*v, 4.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_reduce_single_negative_axis() {
        let preds = array![[1.0f64, 3.0], [2.0, 2.0]].into_dyn();
        let target = array![[0.0f64, 1.0], [0.0, 0.0]].into_dyn();

        let (sum, n_obs) = mean_squared_error_update(
            preds.view(),
            target.view(),
            &NumOutputs::Count(2),
            &ReduceDims::Axis(-1),
        )
        .unwrap();
        assert_eq!(n_obs, 2);
        assert_eq!(sum.as_slice().unwrap(), &[5.0, 8.0]);
    }

    #[test]
    fn test_kept_dims_must_match_num_outputs() {
        let preds = ArrayD::<f32>::zeros(IxDyn(&[4, 3]));
        let target = ArrayD::<f32>::zeros(IxDyn(&[4, 3]));

        let err = mean_squared_error_update(
            preds.view(),
            target.view(),
            &NumOutputs::Count(4),
            &ReduceDims::Axis(0),
        )
        .unwrap_err();
        assert_eq!(
            err,
            MetricError::OutputShape {
                expected: vec![4],
                actual: vec![3]
            }
        );
    }

    #[test]
    fn test_multioutput_trailing_axis_must_match() {
        let preds = array![[1.0f64, 2.0], [3.0, 4.0], [5.0, 6.0]].into_dyn();
        let target = ArrayD::<f64>::zeros(IxDyn(&[3, 2]));

        let err = mean_squared_error_update(
            preds.view(),
            target.view(),
            &NumOutputs::Count(3),
            &ReduceDims::All,
        )
        .unwrap_err();
        assert_eq!(
            err,
            MetricError::OutputShape {
                expected: vec![3],
                actual: vec![3, 2]
            }
        );

        let flat = ArrayD::<f64>::zeros(IxDyn(&[6]));
        let err = mean_squared_error(flat.view(), flat.view(), true, 3).unwrap_err();
        assert!(matches!(err, MetricError::OutputShape { .. }));
    }

    #[test]
    fn test_multioutput_nested_shape() {
        let preds = ArrayD::<f64>::from_elem(IxDyn(&[4, 2, 3]), 2.0);
        let target = ArrayD::<f64>::zeros(IxDyn(&[4, 2, 3]));

        let (sum, n_obs) = mean_squared_error_update(
            preds.view(),
            target.view(),
            &NumOutputs::Shape(vec![2, 3]),
            &ReduceDims::All,
        )
        .unwrap();
        assert_eq!(n_obs, 4);
        assert_eq!(sum.shape(), &[2, 3]);
        assert!(sum.iter().all(|&v| v == 16.0));
    }

    #[test]
    fn test_indivisible_multioutput_rejected() {
        let preds = ArrayD::<f32>::zeros(IxDyn(&[5]));
        let target = ArrayD::<f32>::zeros(IxDyn(&[5]));

        let err = mean_squared_error(preds.view(), target.view(), true, 3).unwrap_err();
        assert!(matches!(err, MetricError::OutputShape { .. }));
    }

    #[test]
    fn test_shape_mismatch() {
        let preds = ArrayD::<f32>::zeros(IxDyn(&[100]));
        let target = ArrayD::<f32>::zeros(IxDyn(&[50]));

        let err = mean_squared_error(preds.view(), target.view(), true, 1).unwrap_err();
        assert!(matches!(err, MetricError::ShapeMismatch { .. }));
    }

    #[test]
    fn test_compute_zero_count_is_nan() {
        let sum = ArrayD::<f64>::zeros(IxDyn(&[]));
        let mse = mean_squared_error_compute(&sum, 0, true);
        assert!(mse.iter().all(|v| v.is_nan()));
    }
}
