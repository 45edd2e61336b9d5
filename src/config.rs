// --- File: src/config.rs ---

//! Metric configuration.
//!
//! Every metric is built from a small serde-serializable config struct with
//! builder-style setters. [`MetricConfig`] selects one of the metrics at
//! runtime and can be read from JSON:
//!
//! ```json
//! { "metric": "mean_squared_error", "squared": false, "num_outputs": 5, "reduce_dims": [0, 2] }
//! { "metric": "tweedie_deviance_score", "power": 1.5 }
//! ```

use crate::metrics::{MetricError, RegressionMetric};
use crate::tensor::Element;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors while loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Invalid(#[from] MetricError),
}

type Result<T> = std::result::Result<T, MetricError>;

// ============================================================================
// Output shape
// ============================================================================

/// Shape of the metric output in the multi-output setting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum NumOutputs {
    /// `1` gives a scalar result, `n > 1` a vector of length `n`.
    Count(usize),
    /// Explicit output shape.
    Shape(Vec<usize>),
}

impl Default for NumOutputs {
    fn default() -> Self {
        NumOutputs::Count(1)
    }
}

impl NumOutputs {
    /// Output shape; empty for the scalar case.
    pub fn shape(&self) -> Vec<usize> {
        match self {
            NumOutputs::Count(1) => Vec::new(),
            NumOutputs::Count(n) => vec![*n],
            NumOutputs::Shape(dims) => dims.clone(),
        }
    }

    /// Total number of output slots.
    pub fn size(&self) -> usize {
        match self {
            NumOutputs::Count(n) => *n,
            NumOutputs::Shape(dims) => dims.iter().product(),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, NumOutputs::Count(1))
    }

    pub fn validate(&self) -> Result<()> {
        let valid = match self {
            NumOutputs::Count(n) => *n > 0,
            NumOutputs::Shape(dims) => !dims.is_empty() && dims.iter().all(|&d| d > 0),
        };
        if valid {
            Ok(())
        } else {
            Err(MetricError::InvalidArgument(format!(
                "Expected num_outputs to be a positive integer or a tuple of positive integers but got {:?}",
                self
            )))
        }
    }
}

impl From<usize> for NumOutputs {
    fn from(n: usize) -> Self {
        NumOutputs::Count(n)
    }
}

impl From<Vec<usize>> for NumOutputs {
    fn from(dims: Vec<usize>) -> Self {
        NumOutputs::Shape(dims)
    }
}

// ============================================================================
// Reduced dimensions
// ============================================================================

/// Axes the squared error is summed over. Negative axes count from the end.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ReduceDimsRepr", into = "ReduceDimsRepr")]
pub enum ReduceDims {
    #[default]
    All,
    Axis(isize),
    Axes(Vec<isize>),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum ReduceDimsRepr {
    Keyword(String),
    Axis(isize),
    Axes(Vec<isize>),
}

impl TryFrom<ReduceDimsRepr> for ReduceDims {
    type Error = MetricError;

    fn try_from(repr: ReduceDimsRepr) -> Result<Self> {
        match repr {
            ReduceDimsRepr::Keyword(word) if word == "all" => Ok(ReduceDims::All),
            ReduceDimsRepr::Keyword(word) => Err(reduce_dims_error(&word)),
            ReduceDimsRepr::Axis(axis) => Ok(ReduceDims::Axis(axis)),
            ReduceDimsRepr::Axes(axes) => Ok(ReduceDims::Axes(axes)),
        }
    }
}

impl From<ReduceDims> for ReduceDimsRepr {
    fn from(dims: ReduceDims) -> Self {
        match dims {
            ReduceDims::All => ReduceDimsRepr::Keyword("all".to_string()),
            ReduceDims::Axis(axis) => ReduceDimsRepr::Axis(axis),
            ReduceDims::Axes(axes) => ReduceDimsRepr::Axes(axes),
        }
    }
}

fn reduce_dims_error(got: &str) -> MetricError {
    MetricError::InvalidArgument(format!(
        "Expected reduce_dims to be an integer, a tuple of integers or \"all\" but got {}",
        got
    ))
}

impl ReduceDims {
    pub fn validate(&self) -> Result<()> {
        if let ReduceDims::Axes(axes) = self {
            if axes.is_empty() {
                return Err(reduce_dims_error("an empty tuple"));
            }
            let mut seen = axes.clone();
            seen.sort_unstable();
            seen.dedup();
            if seen.len() != axes.len() {
                return Err(reduce_dims_error(&format!("{:?} (duplicate axes)", axes)));
            }
        }
        Ok(())
    }

    /// Resolves the axes against an input of `ndim` dimensions.
    ///
    /// Returns `None` for `All`, otherwise the sorted, non-negative axes.
    pub fn resolve(&self, ndim: usize) -> Result<Option<Vec<usize>>> {
        let raw: &[isize] = match self {
            ReduceDims::All => return Ok(None),
            ReduceDims::Axis(axis) => std::slice::from_ref(axis),
            ReduceDims::Axes(axes) => axes,
        };
        let mut resolved = Vec::with_capacity(raw.len());
        for &axis in raw {
            let idx = if axis < 0 { axis + ndim as isize } else { axis };
            if idx < 0 || idx >= ndim as isize {
                return Err(MetricError::InvalidArgument(format!(
                    "reduce axis {} is out of range for an input with {} dimensions",
                    axis, ndim
                )));
            }
            resolved.push(idx as usize);
        }
        resolved.sort_unstable();
        let before = resolved.len();
        resolved.dedup();
        if resolved.len() != before {
            return Err(reduce_dims_error(&format!("{:?} (duplicate axes)", raw)));
        }
        Ok(Some(resolved))
    }
}

// ============================================================================
// Per-metric configs
// ============================================================================

/// Configuration of [`crate::metrics::MeanSquaredError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MseConfig {
    /// `true` returns MSE, `false` returns RMSE.
    pub squared: bool,
    pub num_outputs: NumOutputs,
    pub reduce_dims: ReduceDims,
}

impl Default for MseConfig {
    fn default() -> Self {
        Self {
            squared: true,
            num_outputs: NumOutputs::default(),
            reduce_dims: ReduceDims::All,
        }
    }
}

impl MseConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_squared(mut self, squared: bool) -> Self {
        self.squared = squared;
        self
    }

    pub fn with_num_outputs(mut self, num_outputs: impl Into<NumOutputs>) -> Self {
        self.num_outputs = num_outputs.into();
        self
    }

    pub fn with_reduce_dims(mut self, reduce_dims: ReduceDims) -> Self {
        self.reduce_dims = reduce_dims;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.num_outputs.validate()?;
        self.reduce_dims.validate()
    }
}

/// Configuration of [`crate::metrics::TweedieDevianceScore`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TweedieConfig {
    pub power: f64,
}

impl Default for TweedieConfig {
    fn default() -> Self {
        Self { power: 0.0 }
    }
}

impl TweedieConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_power(mut self, power: f64) -> Self {
        self.power = power;
        self
    }

    pub fn validate(&self) -> Result<()> {
        crate::functional::tweedie::validate_power(self.power)
    }
}

// ============================================================================
// Runtime selection
// ============================================================================

/// Configuration of any metric in the crate, tagged by metric name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metric", rename_all = "snake_case")]
pub enum MetricConfig {
    MeanSquaredError(MseConfig),
    TweedieDevianceScore(TweedieConfig),
}

impl MetricConfig {
    pub fn validate(&self) -> Result<()> {
        match self {
            MetricConfig::MeanSquaredError(cfg) => cfg.validate(),
            MetricConfig::TweedieDevianceScore(cfg) => cfg.validate(),
        }
    }

    /// Builds the configured metric.
    pub fn build<T: Element>(&self) -> Result<RegressionMetric<T>> {
        RegressionMetric::from_config(self)
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> std::result::Result<Self, ConfigError> {
        let config: MetricConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and validates a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::result::Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> std::result::Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl From<MseConfig> for MetricConfig {
    fn from(cfg: MseConfig) -> Self {
        MetricConfig::MeanSquaredError(cfg)
    }
}

impl From<TweedieConfig> for MetricConfig {
    fn from(cfg: TweedieConfig) -> Self {
        MetricConfig::TweedieDevianceScore(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_num_outputs_validation() {
        assert!(NumOutputs::Count(3).validate().is_ok());
        assert!(NumOutputs::Shape(vec![2, 3]).validate().is_ok());

        let err = NumOutputs::Count(0).validate().unwrap_err();
        assert!(matches!(err, MetricError::InvalidArgument(_)));
        assert!(NumOutputs::Shape(vec![]).validate().is_err());
        assert!(NumOutputs::Shape(vec![4, 0]).validate().is_err());
    }

    #[test]
    fn test_num_outputs_shape() {
        assert!(NumOutputs::Count(1).shape().is_empty());
        assert_eq!(NumOutputs::Count(3).shape(), vec![3]);
        assert_eq!(NumOutputs::Shape(vec![2, 3]).size(), 6);
        assert!(!NumOutputs::Shape(vec![1]).is_scalar());
    }

    #[test]
    fn test_reduce_dims_resolve() {
        assert_eq!(ReduceDims::All.resolve(3).unwrap(), None);
        assert_eq!(ReduceDims::Axis(-1).resolve(3).unwrap(), Some(vec![2]));
        assert_eq!(
            ReduceDims::Axes(vec![2, 0]).resolve(3).unwrap(),
            Some(vec![0, 2])
        );
        assert!(ReduceDims::Axis(3).resolve(3).is_err());
        // -1 and 2 name the same axis of a 3-d input.
        assert!(ReduceDims::Axes(vec![-1, 2]).resolve(3).is_err());
    }

    #[test]
    fn test_reduce_dims_validate() {
        assert!(ReduceDims::Axes(vec![0, 0]).validate().is_err());
        assert!(ReduceDims::Axes(vec![]).validate().is_err());
        assert!(ReduceDims::Axes(vec![0, 2]).validate().is_ok());
    }

    #[test]
    fn test_mse_config_from_json() {
        let cfg = MetricConfig::from_json(
            r#"{"metric": "mean_squared_error", "squared": false, "num_outputs": 5, "reduce_dims": [0, 2]}"#,
        )
        .unwrap();
        assert_eq!(
            cfg,
            MetricConfig::MeanSquaredError(
                MseConfig::new()
                    .with_squared(false)
                    .with_num_outputs(5)
                    .with_reduce_dims(ReduceDims::Axes(vec![0, 2]))
            )
        );
    }

    #[test]
    fn test_defaults_from_json() {
        let cfg = MetricConfig::from_json(r#"{"metric": "mean_squared_error"}"#).unwrap();
        assert_eq!(cfg, MetricConfig::MeanSquaredError(MseConfig::default()));

        let cfg = MetricConfig::from_json(r#"{"metric": "tweedie_deviance_score"}"#).unwrap();
        assert_eq!(cfg, MetricConfig::TweedieDevianceScore(TweedieConfig::default()));
    }

    #[test]
    fn test_reduce_dims_keyword() {
        let cfg = MetricConfig::from_json(
            r#"{"metric": "mean_squared_error", "reduce_dims": "all"}"#,
        )
        .unwrap();
        assert_eq!(cfg, MetricConfig::MeanSquaredError(MseConfig::default()));

        assert!(MetricConfig::from_json(
            r#"{"metric": "mean_squared_error", "reduce_dims": "some"}"#
        )
        .is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = MetricConfig::from_json(r#"{"metric": "tweedie_deviance_score", "power": 0.5}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(err.to_string().contains("0.5"));

        let err = MetricConfig::from_json(r#"{"metric": "mean_squared_error", "num_outputs": 0}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(MetricError::InvalidArgument(_))));
    }

    #[test]
    fn test_config_json_roundtrip() {
        let cfg: MetricConfig = MseConfig::new()
            .with_num_outputs(vec![2, 3])
            .with_reduce_dims(ReduceDims::Axis(0))
            .into();
        let json = cfg.to_json().unwrap();
        assert!(json.contains("\"metric\": \"mean_squared_error\""));
        assert_eq!(MetricConfig::from_json(&json).unwrap(), cfg);
    }
}
