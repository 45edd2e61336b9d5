// --- File: src/metrics/mod.rs ---

//! Stateful, mergeable metrics.
//!
//! A metric owns a [`MetricState`]: named fields seeded with identity values,
//! each registered with a [`Reduction`]. `update` runs the functional update
//! rule on one batch and folds the partial aggregate into the state, `compute`
//! runs the functional compute rule on the accumulated state. Partial states
//! of instances that saw different shards can be combined with `merge`, so
//! the final value does not depend on how the data was split.
//!
//! - **Regression**: [`MeanSquaredError`], [`TweedieDevianceScore`]
//! - **Runtime selection**: [`RegressionMetric`]
//!
//! # Example
//!
//! ```rust
//! use ndarray::{array, ArrayD};
//! use rustymetrics::config::MseConfig;
//! use rustymetrics::metrics::{MeanSquaredError, Metric};
//!
//! let mut mse = MeanSquaredError::<f32>::new(MseConfig::default()).unwrap();
//! let preds: ArrayD<f32> = array![3.0, 5.0, 2.5, 7.0].into_dyn();
//! let target: ArrayD<f32> = array![2.5, 5.0, 4.0, 8.0].into_dyn();
//! mse.update(preds.view(), target.view()).unwrap();
//! assert_eq!(mse.compute().as_scalar(), Some(0.875));
//! mse.reset();
//! ```

pub mod collection;
pub mod regression;
pub mod state;

pub use collection::RegressionMetric;
pub use regression::{MeanSquaredError, TweedieDevianceScore};
pub use state::{MetricState, Reduction, StateField, StateValue};

use crate::tensor::Element;
use log::{debug, trace};
use ndarray::ArrayViewD;
use thiserror::Error;

/// Errors raised by metric construction, update and merge.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MetricError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Predictions and targets are expected to have the same shape, but got {preds:?} and {target:?}")]
    ShapeMismatch {
        preds: Vec<usize>,
        target: Vec<usize>,
    },

    #[error("Expected the kept dimensions to match num_outputs {expected:?}, but got {actual:?}")]
    OutputShape {
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("For power={power}, {requirement}.")]
    DomainViolation { power: f64, requirement: String },

    #[error("Cannot merge metric state: {0}")]
    StateMismatch(String),
}

pub type Result<T> = std::result::Result<T, MetricError>;

/// Base trait of every streaming metric.
///
/// Implementors provide the per-batch partial aggregate ([`Metric::batch_state`])
/// and the final statistic of a state ([`Metric::compute_state`]); the
/// reset/update/merge/compute life cycle is shared.
pub trait Metric: Send + Sync {
    /// Floating-point type the metric accumulates in.
    type Elem: Element;
    /// Result type of `compute`.
    type Output;

    /// Short metric name.
    fn name(&self) -> &str;

    /// Accumulated state.
    fn state(&self) -> &MetricState<Self::Elem>;

    /// Mutable access to the accumulated state. Only the life-cycle methods
    /// below should need it.
    fn state_mut(&mut self) -> &mut MetricState<Self::Elem>;

    /// Applies the functional update rule to one batch and returns the result
    /// as a state with the metric's layout. Does not touch `self`.
    fn batch_state(
        &self,
        preds: ArrayViewD<'_, Self::Elem>,
        target: ArrayViewD<'_, Self::Elem>,
    ) -> Result<MetricState<Self::Elem>>;

    /// Applies the functional compute rule to a state.
    fn compute_state(&self, state: &MetricState<Self::Elem>) -> Self::Output;

    /// Folds one batch into the state. The state is unchanged on error.
    fn update(
        &mut self,
        preds: ArrayViewD<'_, Self::Elem>,
        target: ArrayViewD<'_, Self::Elem>,
    ) -> Result<()> {
        let delta = self.batch_state(preds, target)?;
        self.state_mut().merge(&delta)?;
        trace!(
            "{}: folded batch #{}",
            self.name(),
            self.state().update_count()
        );
        Ok(())
    }

    /// Final statistic of everything observed since the last reset.
    fn compute(&self) -> Self::Output {
        self.compute_state(self.state())
    }

    /// Folds one batch into the state and returns the metric value of that
    /// batch alone.
    fn forward(
        &mut self,
        preds: ArrayViewD<'_, Self::Elem>,
        target: ArrayViewD<'_, Self::Elem>,
    ) -> Result<Self::Output> {
        let delta = self.batch_state(preds, target)?;
        let batch_value = self.compute_state(&delta);
        self.state_mut().merge(&delta)?;
        Ok(batch_value)
    }

    /// Restores every state field to its identity value.
    fn reset(&mut self) {
        self.state_mut().reset();
        debug!("{}: state reset", self.name());
    }

    /// Merges state produced by a peer instance (e.g. another worker).
    ///
    /// Only the layout of `state` (field names, kinds, shapes) is checked: a
    /// bare state does not record the configuration it was accumulated
    /// under. Use [`Metric::merge`], or `RegressionMetric::merge_snapshot`
    /// for serialized peers, to also require an identical configuration.
    fn merge_state(&mut self, state: &MetricState<Self::Elem>) -> Result<()> {
        self.state_mut().merge(state)?;
        debug!(
            "{}: merged peer state ({} batches)",
            self.name(),
            state.update_count()
        );
        Ok(())
    }

    /// Merges the state of another instance of the same metric.
    fn merge(&mut self, other: &Self) -> Result<()>
    where
        Self: Sized,
    {
        self.merge_state(other.state())
    }

    /// Number of batches folded in since the last reset, including merged peers.
    fn update_count(&self) -> usize {
        self.state().update_count()
    }

    fn higher_is_better(&self) -> bool {
        false
    }

    fn is_differentiable(&self) -> bool {
        true
    }
}

/// Merges a set of metrics (e.g. one per worker) into the first of them.
///
/// Returns `Ok(None)` for an empty input.
pub fn merge_all<M, I>(metrics: I) -> Result<Option<M>>
where
    M: Metric,
    I: IntoIterator<Item = M>,
{
    let mut iter = metrics.into_iter();
    let Some(mut acc) = iter.next() else {
        return Ok(None);
    };
    for peer in iter {
        acc.merge(&peer)?;
    }
    Ok(Some(acc))
}
