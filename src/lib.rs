//! # RustyMetrics: Streaming, Mergeable Regression Metrics
//!
//! **RustyMetrics** computes regression metrics over data that arrives in
//! batches. Every metric keeps a small accumulator state that can be updated
//! batch by batch, reset, and merged with the state of other instances, so a
//! metric computed over shards on several workers equals the metric computed
//! over the whole dataset.
//!
//! Each metric exists in two forms:
//!
//! - **Functional** ([`functional`]): pure `*_update` / `*_compute` pairs and
//!   one-shot helpers.
//! - **Accumulator** ([`metrics`]): types implementing [`metrics::Metric`].
//!
//! ## Usage Example
//!
//! ```
//! use ndarray::array;
//! use rustymetrics::config::TweedieConfig;
//! use rustymetrics::metrics::{Metric, TweedieDevianceScore};
//!
//! // 1. Two workers, each seeing a shard of the data
//! let mut worker_a = TweedieDevianceScore::<f64>::new(TweedieConfig::new().with_power(1.0)).unwrap();
//! let mut worker_b = worker_a.clone();
//!
//! worker_a.update(array![0.5, 1.0].into_dyn().view(), array![1.0, 1.0].into_dyn().view()).unwrap();
//! worker_b.update(array![2.0].into_dyn().view(), array![3.0].into_dyn().view()).unwrap();
//!
//! // 2. Merge the partial states and compute the global value
//! worker_a.merge(&worker_b).unwrap();
//! let score = worker_a.compute();
//! assert!(score.is_finite());
//! ```

// Declare public modules that constitute the core library API.
pub mod config;
pub mod functional;
pub mod metrics;
pub mod serialization;
pub mod tensor;

pub use config::{MetricConfig, MseConfig, NumOutputs, ReduceDims, TweedieConfig};
pub use metrics::{
    MeanSquaredError, Metric, MetricError, MetricState, RegressionMetric, TweedieDevianceScore,
};
pub use serialization::{load_state, save_state, SnapshotError, StateSnapshot};
pub use tensor::{Element, MetricOutput};
