// --- File: src/functional/mod.rs ---

//! Stateless metric functions.
//!
//! Each metric is split into an `*_update` step, which turns one batch into a
//! partial aggregate (sums and observation counts), and a `*_compute` step,
//! which turns an aggregate into the final statistic. The stateful metrics in
//! [`crate::metrics`] call exactly these functions, so a one-shot call over the
//! full data and a streamed accumulation give the same result.
//!
//! # Available Functions
//!
//! - **MSE / RMSE**: `mean_squared_error_update`, `mean_squared_error_compute`, `mean_squared_error`
//! - **Tweedie deviance**: `tweedie_deviance_score_update`, `tweedie_deviance_score_compute`,
//!   `tweedie_deviance_score`

pub mod mse;
pub mod tweedie;

pub use mse::{mean_squared_error, mean_squared_error_compute, mean_squared_error_update};
pub use tweedie::{
    tweedie_deviance_score, tweedie_deviance_score_compute, tweedie_deviance_score_update,
};

use crate::metrics::{MetricError, Result};
use ndarray::ArrayViewD;

/// Fails with `ShapeMismatch` unless `preds` and `target` have identical shapes.
pub fn check_same_shape<T>(preds: &ArrayViewD<'_, T>, target: &ArrayViewD<'_, T>) -> Result<()> {
    if preds.shape() != target.shape() {
        return Err(MetricError::ShapeMismatch {
            preds: preds.shape().to_vec(),
            target: target.shape().to_vec(),
        });
    }
    Ok(())
}
