// --- File: src/metrics/collection.rs ---

//! Runtime selection over the closed set of metrics in this crate.

use super::regression::{MeanSquaredError, TweedieDevianceScore};
use super::state::MetricState;
use super::{Metric, MetricError, Result};
use crate::config::{MetricConfig, MseConfig, TweedieConfig};
use crate::tensor::{Element, MetricOutput};
use ndarray::ArrayViewD;

/// Any metric of this crate, chosen at construction.
///
/// Every variant wraps its metric type directly and delegates the whole
/// accumulator life cycle to it. Use it when the metric comes from a
/// [`MetricConfig`] (e.g. a JSON file) instead of being fixed in code.
#[derive(Debug, Clone)]
pub enum RegressionMetric<T: Element> {
    MeanSquaredError(MeanSquaredError<T>),
    TweedieDevianceScore(TweedieDevianceScore<T>),
}

impl<T: Element> RegressionMetric<T> {
    pub fn mean_squared_error(config: MseConfig) -> Result<Self> {
        Ok(Self::MeanSquaredError(MeanSquaredError::new(config)?))
    }

    pub fn tweedie_deviance_score(config: TweedieConfig) -> Result<Self> {
        Ok(Self::TweedieDevianceScore(TweedieDevianceScore::new(
            config,
        )?))
    }

    pub fn from_config(config: &MetricConfig) -> Result<Self> {
        match config {
            MetricConfig::MeanSquaredError(cfg) => Self::mean_squared_error(cfg.clone()),
            MetricConfig::TweedieDevianceScore(cfg) => Self::tweedie_deviance_score(cfg.clone()),
        }
    }

    /// Configuration this metric was built from.
    pub fn config(&self) -> MetricConfig {
        match self {
            Self::MeanSquaredError(inner) => MetricConfig::MeanSquaredError(inner.config().clone()),
            Self::TweedieDevianceScore(inner) => {
                MetricConfig::TweedieDevianceScore(inner.config().clone())
            }
        }
    }
}

impl<T: Element> From<MeanSquaredError<T>> for RegressionMetric<T> {
    fn from(metric: MeanSquaredError<T>) -> Self {
        Self::MeanSquaredError(metric)
    }
}

impl<T: Element> From<TweedieDevianceScore<T>> for RegressionMetric<T> {
    fn from(metric: TweedieDevianceScore<T>) -> Self {
        Self::TweedieDevianceScore(metric)
    }
}

impl<T: Element> Metric for RegressionMetric<T> {
    type Elem = T;
    type Output = MetricOutput<T>;

    fn name(&self) -> &str {
        match self {
            Self::MeanSquaredError(inner) => inner.name(),
            Self::TweedieDevianceScore(inner) => inner.name(),
        }
    }

    fn state(&self) -> &MetricState<T> {
        match self {
            Self::MeanSquaredError(inner) => inner.state(),
            Self::TweedieDevianceScore(inner) => inner.state(),
        }
    }

    fn state_mut(&mut self) -> &mut MetricState<T> {
        match self {
            Self::MeanSquaredError(inner) => inner.state_mut(),
            Self::TweedieDevianceScore(inner) => inner.state_mut(),
        }
    }

    fn batch_state(
        &self,
        preds: ArrayViewD<'_, T>,
        target: ArrayViewD<'_, T>,
    ) -> Result<MetricState<T>> {
        match self {
            Self::MeanSquaredError(inner) => inner.batch_state(preds, target),
            Self::TweedieDevianceScore(inner) => inner.batch_state(preds, target),
        }
    }

    fn compute_state(&self, state: &MetricState<T>) -> MetricOutput<T> {
        match self {
            Self::MeanSquaredError(inner) => inner.compute_state(state),
            Self::TweedieDevianceScore(inner) => MetricOutput::Scalar(inner.compute_state(state)),
        }
    }

    fn merge(&mut self, other: &Self) -> Result<()> {
        match (self, other) {
            (Self::MeanSquaredError(mine), Self::MeanSquaredError(theirs)) => mine.merge(theirs),
            (Self::TweedieDevianceScore(mine), Self::TweedieDevianceScore(theirs)) => {
                mine.merge(theirs)
            }
            (mine, theirs) => Err(MetricError::StateMismatch(format!(
                "cannot merge {} into {}",
                theirs.name(),
                mine.name()
            ))),
        }
    }

    fn higher_is_better(&self) -> bool {
        match self {
            Self::MeanSquaredError(inner) => inner.higher_is_better(),
            Self::TweedieDevianceScore(inner) => inner.higher_is_better(),
        }
    }

    fn is_differentiable(&self) -> bool {
        match self {
            Self::MeanSquaredError(inner) => inner.is_differentiable(),
            Self::TweedieDevianceScore(inner) => inner.is_differentiable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, ArrayD, IxDyn};

    #[test]
    fn test_from_config() {
        let cfg = MetricConfig::from_json(r#"{"metric": "tweedie_deviance_score", "power": 2.0}"#)
            .unwrap();
        let mut metric = RegressionMetric::<f64>::from_config(&cfg).unwrap();
        assert_eq!(metric.name(), "TweedieDevianceScore");
        assert_eq!(metric.config(), cfg);

        let preds = array![1.0, 2.0].into_dyn();
        metric.update(preds.view(), preds.view()).unwrap();
        assert_eq!(metric.compute().as_scalar(), Some(0.0));
    }

    #[test]
    fn test_invalid_config_fails_construction() {
        let cfg = MetricConfig::TweedieDevianceScore(TweedieConfig::new().with_power(0.5));
        assert!(matches!(
            cfg.build::<f32>(),
            Err(MetricError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_mse_variant_delegates() {
        let mut metric: RegressionMetric<f32> = MetricConfig::from(MseConfig::new().with_num_outputs(3))
            .build()
            .unwrap();
        let preds = array![[1.0f32, 2.0, 3.0], [1.0, 2.0, 3.0]].into_dyn();
        let targets = ArrayD::<f32>::zeros(IxDyn(&[2, 3]));

        let out = metric.forward(preds.view(), targets.view()).unwrap();
        assert_eq!(out.as_tensor().unwrap().as_slice().unwrap(), &[1.0, 4.0, 9.0]);
        assert_eq!(metric.update_count(), 1);
    }

    #[test]
    fn test_merge_across_variants_fails() {
        let mut mse = RegressionMetric::<f32>::mean_squared_error(MseConfig::default()).unwrap();
        let tweedie =
            RegressionMetric::<f32>::tweedie_deviance_score(TweedieConfig::default()).unwrap();

        let err = mse.merge(&tweedie).unwrap_err();
        assert!(matches!(err, MetricError::StateMismatch(_)));
    }
}
