// --- File: src/serialization/mod.rs ---

//! Persisting and shipping metric state.
//!
//! - **Snapshots**: [`StateSnapshot`], a serde form of config + state for
//!   sending partial results between workers
//! - **SafeTensors**: state fields stored as tensors, in the metric's precision
//! - **Directories**: [`save_state`] / [`load_state`] write and read
//!   `config.json` plus `state.safetensors`
//!
//! # Example
//!
//! ```rust,no_run
//! use rustymetrics::config::MseConfig;
//! use rustymetrics::metrics::RegressionMetric;
//! use rustymetrics::serialization::{load_state, save_state};
//!
//! let metric = RegressionMetric::<f32>::mean_squared_error(MseConfig::default()).unwrap();
//! save_state("mse_state", &metric).unwrap();
//! let restored = load_state::<f32, _>("mse_state").unwrap();
//! ```

pub mod safetensors_io;
pub mod snapshot;

pub use safetensors_io::{list_tensors, load_state_tensors, save_state_tensors};
pub use snapshot::{load_state, save_state, SnapshotMeta, StateSnapshot, FORMAT_VERSION};

use crate::metrics::MetricError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while saving or loading metric state.
#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SafeTensors error: {0}")]
    SafeTensorsError(#[from] safetensors::SafeTensorError),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error("Snapshot directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Tensor '{0}' not found")]
    TensorNotFound(String),

    #[error("Tensor '{name}' has {actual} bytes, expected {expected}")]
    CorruptTensor {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDtype(String),

    #[error("Invalid snapshot format: {0}")]
    InvalidFormat(String),
}
