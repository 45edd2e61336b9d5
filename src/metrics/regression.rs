// --- File: src/metrics/regression.rs ---

//! Regression metrics.

use super::state::{MetricState, Reduction, StateValue};
use super::{Metric, MetricError, Result};
use crate::config::{MseConfig, TweedieConfig};
use crate::functional::{mse, tweedie};
use crate::tensor::{Element, MetricOutput};
use log::debug;
use ndarray::{ArrayD, ArrayViewD, IxDyn};

const SUM_SQUARED_ERROR: &str = "sum_squared_error";
const TOTAL: &str = "total";
const SUM_DEVIANCE_SCORE: &str = "sum_deviance_score";
const NUM_OBSERVATIONS: &str = "num_observations";

/// Mean Squared Error (MSE), or RMSE with `squared = false`.
///
/// MSE = (1/n) * Σ(y_pred - y_true)²
///
/// State: `sum_squared_error` (shaped like `num_outputs`) and `total`, both
/// merged with `Sum`.
#[derive(Debug, Clone)]
pub struct MeanSquaredError<T: Element> {
    config: MseConfig,
    state: MetricState<T>,
}

impl<T: Element> MeanSquaredError<T> {
    pub fn new(config: MseConfig) -> Result<Self> {
        config.validate()?;
        let out_shape = config.num_outputs.shape();

        let mut state = MetricState::new();
        state.add_state(
            SUM_SQUARED_ERROR,
            StateValue::Tensor(ArrayD::zeros(IxDyn(&out_shape))),
            Reduction::Sum,
        )?;
        state.add_state(TOTAL, StateValue::Count(0), Reduction::Sum)?;

        debug!("MSE: created with {:?}", config);
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &MseConfig {
        &self.config
    }

    /// Accumulated sum of squared errors.
    pub fn sum_squared_error(&self) -> Option<&ArrayD<T>> {
        self.state.tensor(SUM_SQUARED_ERROR)
    }

    /// Accumulated number of observations per output slot.
    pub fn total(&self) -> u64 {
        self.state.count(TOTAL).unwrap_or(0)
    }
}

impl<T: Element> Metric for MeanSquaredError<T> {
    type Elem = T;
    type Output = MetricOutput<T>;

    fn name(&self) -> &str {
        if self.config.squared {
            "MSE"
        } else {
            "RMSE"
        }
    }

    fn state(&self) -> &MetricState<T> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MetricState<T> {
        &mut self.state
    }

    fn batch_state(
        &self,
        preds: ArrayViewD<'_, T>,
        target: ArrayViewD<'_, T>,
    ) -> Result<MetricState<T>> {
        let (sum, n_obs) = mse::mean_squared_error_update(
            preds,
            target,
            &self.config.num_outputs,
            &self.config.reduce_dims,
        )?;
        self.state.partial(vec![
            (SUM_SQUARED_ERROR, StateValue::Tensor(sum)),
            (TOTAL, StateValue::Count(n_obs)),
        ])
    }

    fn compute_state(&self, state: &MetricState<T>) -> MetricOutput<T> {
        let n_obs = state.count(TOTAL).unwrap_or(0);
        let values = match state.tensor(SUM_SQUARED_ERROR) {
            Some(sum) => mse::mean_squared_error_compute(sum, n_obs, self.config.squared),
            None => ArrayD::from_elem(IxDyn(&self.config.num_outputs.shape()), T::nan()),
        };
        MetricOutput::from_array(values)
    }

    fn merge(&mut self, other: &Self) -> Result<()> {
        if self.config != other.config {
            return Err(MetricError::StateMismatch(format!(
                "MSE configs differ: {:?} vs {:?}",
                self.config, other.config
            )));
        }
        self.merge_state(other.state())
    }
}

/// Tweedie Deviance Score.
///
/// Mean of the per-element Tweedie deviance for the configured `power`.
///
/// State: `sum_deviance_score` and `num_observations`, both merged with `Sum`.
#[derive(Debug, Clone)]
pub struct TweedieDevianceScore<T: Element> {
    config: TweedieConfig,
    state: MetricState<T>,
}

impl<T: Element> TweedieDevianceScore<T> {
    pub fn new(config: TweedieConfig) -> Result<Self> {
        config.validate()?;

        let mut state = MetricState::new();
        state.add_state(
            SUM_DEVIANCE_SCORE,
            StateValue::Tensor(ArrayD::zeros(IxDyn(&[]))),
            Reduction::Sum,
        )?;
        state.add_state(NUM_OBSERVATIONS, StateValue::Count(0), Reduction::Sum)?;

        debug!("TweedieDevianceScore: created with power={}", config.power);
        Ok(Self { config, state })
    }

    /// Shortcut for `new(TweedieConfig::new().with_power(power))`.
    pub fn with_power(power: f64) -> Result<Self> {
        Self::new(TweedieConfig::new().with_power(power))
    }

    pub fn power(&self) -> f64 {
        self.config.power
    }

    pub fn config(&self) -> &TweedieConfig {
        &self.config
    }
}

impl<T: Element> Metric for TweedieDevianceScore<T> {
    type Elem = T;
    type Output = T;

    fn name(&self) -> &str {
        "TweedieDevianceScore"
    }

    fn state(&self) -> &MetricState<T> {
        &self.state
    }

    fn state_mut(&mut self) -> &mut MetricState<T> {
        &mut self.state
    }

    fn batch_state(
        &self,
        preds: ArrayViewD<'_, T>,
        target: ArrayViewD<'_, T>,
    ) -> Result<MetricState<T>> {
        let (sum, n_obs) =
            tweedie::tweedie_deviance_score_update(preds, target, self.config.power)?;
        self.state.partial(vec![
            (
                SUM_DEVIANCE_SCORE,
                StateValue::Tensor(ArrayD::from_elem(IxDyn(&[]), sum)),
            ),
            (NUM_OBSERVATIONS, StateValue::Count(n_obs)),
        ])
    }

    fn compute_state(&self, state: &MetricState<T>) -> T {
        let sum = state
            .tensor(SUM_DEVIANCE_SCORE)
            .and_then(|arr| arr.iter().next().copied())
            .unwrap_or_else(T::nan);
        let n_obs = state.count(NUM_OBSERVATIONS).unwrap_or(0);
        tweedie::tweedie_deviance_score_compute(sum, n_obs)
    }

    fn merge(&mut self, other: &Self) -> Result<()> {
        if self.config != other.config {
            return Err(MetricError::StateMismatch(format!(
                "Tweedie powers differ: {} vs {}",
                self.config.power, other.config.power
            )));
        }
        self.merge_state(other.state())
    }
}
