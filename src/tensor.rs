// --- File: src/tensor.rs ---

//! Element types and small array helpers shared by the functional and the
//! accumulator layers.
//!
//! All arithmetic is delegated to `ndarray`. This module only fixes which
//! floating-point types a metric may be instantiated with (`f32`, `f64`) and
//! how those types are laid out on disk when state is exported to SafeTensors.

use ndarray::{ArrayD, ArrayViewD, IxDyn, NdFloat};
use num_traits::FromPrimitive;
use safetensors::Dtype;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Floating-point element type a metric accumulates in.
///
/// Sums are kept in the precision of the inputs, so an `f32` metric
/// accumulates `f32` partial sums and an `f64` metric `f64` ones.
pub trait Element: NdFloat + FromPrimitive + Serialize + DeserializeOwned {
    /// SafeTensors dtype used when state is written to disk.
    const DTYPE: Dtype;

    /// Size of one element in bytes.
    const BYTES: usize;

    /// Appends the little-endian encoding of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decodes one element from exactly `Self::BYTES` little-endian bytes.
    fn read_le(bytes: &[u8]) -> Self;

    /// Converts an observation count into the element type.
    fn from_count(count: u64) -> Self {
        Self::from_u64(count).unwrap_or_else(Self::nan)
    }
}

impl Element for f32 {
    const DTYPE: Dtype = Dtype::F32;
    const BYTES: usize = 4;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 4];
        buf.copy_from_slice(&bytes[..4]);
        f32::from_le_bytes(buf)
    }
}

impl Element for f64 {
    const DTYPE: Dtype = Dtype::F64;
    const BYTES: usize = 8;

    fn write_le(self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }

    fn read_le(bytes: &[u8]) -> Self {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&bytes[..8]);
        f64::from_le_bytes(buf)
    }
}

/// Result of `compute()`: either a single value or a per-output array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Element")]
pub enum MetricOutput<T: Element> {
    Scalar(T),
    Tensor(ArrayD<T>),
}

impl<T: Element> MetricOutput<T> {
    /// Wraps a computed array, collapsing 0-d arrays into `Scalar`.
    pub fn from_array(values: ArrayD<T>) -> Self {
        if values.ndim() == 0 {
            let value = values.iter().next().copied().unwrap_or_else(T::nan);
            MetricOutput::Scalar(value)
        } else {
            MetricOutput::Tensor(values)
        }
    }

    /// Returns the value when the result is a scalar.
    pub fn as_scalar(&self) -> Option<T> {
        match self {
            MetricOutput::Scalar(v) => Some(*v),
            MetricOutput::Tensor(_) => None,
        }
    }

    /// Returns the per-output values when the result is an array.
    pub fn as_tensor(&self) -> Option<&ArrayD<T>> {
        match self {
            MetricOutput::Scalar(_) => None,
            MetricOutput::Tensor(arr) => Some(arr),
        }
    }

    /// Converts the result into an array; a scalar becomes a 0-d array.
    pub fn into_array(self) -> ArrayD<T> {
        match self {
            MetricOutput::Scalar(v) => ArrayD::from_elem(IxDyn(&[]), v),
            MetricOutput::Tensor(arr) => arr,
        }
    }

    /// `true` if every value is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            MetricOutput::Scalar(v) => v.is_finite(),
            MetricOutput::Tensor(arr) => arr.iter().all(|v| v.is_finite()),
        }
    }
}

impl<T: Element> fmt::Display for MetricOutput<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricOutput::Scalar(v) => write!(f, "{:.4}", v),
            MetricOutput::Tensor(arr) => write!(f, "{:.4}", arr),
        }
    }
}

/// Number of elements in a view as an observation count.
pub(crate) fn numel<T>(values: &ArrayViewD<'_, T>) -> u64 {
    values.len() as u64
}
