// --- File: src/serialization/snapshot.rs ---

//! Snapshots of a metric's configuration and accumulated state.
//!
//! A snapshot is what a worker ships to an aggregator: the aggregator rebuilds
//! (or already owns) a metric with the same configuration and merges the
//! snapshot's state into it.
//!
//! On disk a snapshot is a directory:
//!
//! ```text
//! snapshot_dir/
//! ├── config.json          # metric config, update count, format version
//! └── state.safetensors    # state fields
//! ```

use super::safetensors_io::{load_state_tensors, save_state_tensors};
use super::SnapshotError;
use crate::config::MetricConfig;
use crate::metrics::{Metric, MetricError, MetricState, RegressionMetric, StateValue};
use crate::tensor::Element;
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

type Result<T> = std::result::Result<T, SnapshotError>;

/// Version written to `config.json`.
pub const FORMAT_VERSION: &str = "1.0";

const CONFIG_FILE: &str = "config.json";
const STATE_FILE: &str = "state.safetensors";

/// Serializable configuration plus accumulated state of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Element")]
pub struct StateSnapshot<T: Element> {
    pub config: MetricConfig,
    pub state: MetricState<T>,
}

impl<T: Element> StateSnapshot<T> {
    /// Number of batches folded into the captured state.
    pub fn update_count(&self) -> usize {
        self.state.update_count()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Self = serde_json::from_str(json)?;
        snapshot.config.validate()?;
        Ok(snapshot)
    }
}

impl<T: Element> RegressionMetric<T> {
    /// Captures the configuration and current state.
    pub fn snapshot(&self) -> StateSnapshot<T> {
        StateSnapshot {
            config: self.config(),
            state: self.state().clone(),
        }
    }

    /// Rebuilds a metric holding exactly the snapshot's state.
    pub fn from_snapshot(snapshot: &StateSnapshot<T>) -> std::result::Result<Self, MetricError> {
        let mut metric = Self::from_config(&snapshot.config)?;
        metric.merge_state(&snapshot.state)?;
        Ok(metric)
    }

    /// Merges a peer's snapshot. The configurations must be identical.
    pub fn merge_snapshot(
        &mut self,
        snapshot: &StateSnapshot<T>,
    ) -> std::result::Result<(), MetricError> {
        let config = self.config();
        if config != snapshot.config {
            return Err(MetricError::StateMismatch(format!(
                "snapshot config {:?} differs from {:?}",
                snapshot.config, config
            )));
        }
        self.merge_state(&snapshot.state)
    }
}

/// Contents of `config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub version: String,
    pub dtype: String,
    pub update_count: usize,
    pub config: MetricConfig,
}

/// Writes `metric`'s configuration and state to `dir`, creating it if needed.
pub fn save_state<T: Element, P: AsRef<Path>>(dir: P, metric: &RegressionMetric<T>) -> Result<()> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let meta = SnapshotMeta {
        version: FORMAT_VERSION.to_string(),
        dtype: format!("{:?}", T::DTYPE),
        update_count: metric.update_count(),
        config: metric.config(),
    };
    let meta_json = serde_json::to_string_pretty(&meta)?;
    let mut meta_file = File::create(dir.join(CONFIG_FILE))?;
    meta_file.write_all(meta_json.as_bytes())?;

    save_state_tensors(dir.join(STATE_FILE), metric.state())?;

    debug!(
        "{}: saved state of {} batches to {}",
        metric.name(),
        meta.update_count,
        dir.display()
    );
    Ok(())
}

/// Rebuilds a metric from a directory written by [`save_state`].
pub fn load_state<T: Element, P: AsRef<Path>>(dir: P) -> Result<RegressionMetric<T>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Err(SnapshotError::DirectoryNotFound(dir.to_path_buf()));
    }

    let meta_path = dir.join(CONFIG_FILE);
    if !meta_path.exists() {
        return Err(SnapshotError::FileNotFound(meta_path));
    }
    let mut meta_str = String::new();
    File::open(&meta_path)?.read_to_string(&mut meta_str)?;
    let meta: SnapshotMeta = serde_json::from_str(&meta_str)?;

    if meta.version != FORMAT_VERSION {
        return Err(SnapshotError::InvalidFormat(format!(
            "unsupported format version {}",
            meta.version
        )));
    }
    let dtype = format!("{:?}", T::DTYPE);
    if meta.dtype != dtype {
        return Err(SnapshotError::UnsupportedDtype(format!(
            "state was saved as {}, requested {}",
            meta.dtype, dtype
        )));
    }

    let state_path = dir.join(STATE_FILE);
    if !state_path.exists() {
        return Err(SnapshotError::FileNotFound(state_path));
    }
    let mut stored = load_state_tensors::<T, _>(&state_path)?;

    let mut metric = RegressionMetric::from_config(&meta.config)?;
    let mut values: Vec<(String, StateValue<T>)> = Vec::with_capacity(metric.state().len());
    for field in metric.state().fields() {
        let value = stored
            .remove(field.name())
            .ok_or_else(|| SnapshotError::TensorNotFound(field.name().to_string()))?;
        values.push((field.name().to_string(), value));
    }
    if let Some(extra) = stored.keys().next() {
        return Err(SnapshotError::InvalidFormat(format!(
            "unexpected tensor '{}' for {}",
            extra,
            metric.name()
        )));
    }

    let restored = metric
        .state()
        .partial(values.iter().map(|(n, v)| (n.as_str(), v.clone())).collect())?
        .with_update_count(meta.update_count);
    metric.merge_state(&restored)?;

    debug!(
        "{}: loaded state of {} batches from {}",
        metric.name(),
        meta.update_count,
        dir.display()
    );
    Ok(metric)
}
