// --- File: src/serialization/safetensors_io.rs ---

//! Metric state in the SafeTensors format.
//!
//! Tensor fields are written in the metric's element type (`F32` / `F64`),
//! count fields as 0-d `U64` tensors. Field names are the state names.

use super::SnapshotError;
use crate::metrics::{MetricState, StateValue};
use crate::tensor::Element;
use ndarray::{ArrayD, IxDyn};
use safetensors::tensor::{SafeTensors, TensorView};
use safetensors::{serialize_to_file, Dtype};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

type Result<T> = std::result::Result<T, SnapshotError>;

/// Writes every field of `state` to a SafeTensors file.
pub fn save_state_tensors<T: Element, P: AsRef<Path>>(path: P, state: &MetricState<T>) -> Result<()> {
    // Encode first: the views below borrow these buffers.
    let mut encoded: Vec<(String, Dtype, Vec<usize>, Vec<u8>)> = Vec::with_capacity(state.len());
    for field in state.fields() {
        match field.value() {
            StateValue::Tensor(arr) => {
                let mut bytes = Vec::with_capacity(arr.len() * T::BYTES);
                for &v in arr.iter() {
                    v.write_le(&mut bytes);
                }
                encoded.push((field.name().to_string(), T::DTYPE, arr.shape().to_vec(), bytes));
            }
            StateValue::Count(n) => {
                encoded.push((
                    field.name().to_string(),
                    Dtype::U64,
                    Vec::new(),
                    n.to_le_bytes().to_vec(),
                ));
            }
        }
    }

    let mut views: Vec<(&str, TensorView<'_>)> = Vec::with_capacity(encoded.len());
    for (name, dtype, shape, bytes) in &encoded {
        views.push((name.as_str(), TensorView::new(*dtype, shape.clone(), bytes)?));
    }

    serialize_to_file(views, &None, path.as_ref())?;
    Ok(())
}

/// Reads state fields from a SafeTensors file written by [`save_state_tensors`].
pub fn load_state_tensors<T: Element, P: AsRef<Path>>(
    path: P,
) -> Result<HashMap<String, StateValue<T>>> {
    let buffer = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&buffer)?;

    let mut result = HashMap::new();
    for (name, tensor) in tensors.tensors() {
        let shape = tensor.shape().to_vec();
        let data = tensor.data();

        let value = match tensor.dtype() {
            Dtype::U64 => {
                if !shape.is_empty() {
                    return Err(SnapshotError::InvalidFormat(format!(
                        "count '{}' must be 0-d, got shape {:?}",
                        name, shape
                    )));
                }
                if data.len() != 8 {
                    return Err(SnapshotError::CorruptTensor {
                        name,
                        expected: 8,
                        actual: data.len(),
                    });
                }
                let mut buf = [0u8; 8];
                buf.copy_from_slice(data);
                StateValue::Count(u64::from_le_bytes(buf))
            }
            dtype if dtype == T::DTYPE => {
                let values: Vec<T> = data.chunks_exact(T::BYTES).map(T::read_le).collect();
                let expected: usize = shape.iter().product();
                if values.len() != expected {
                    return Err(SnapshotError::CorruptTensor {
                        name,
                        expected: expected * T::BYTES,
                        actual: data.len(),
                    });
                }
                let arr = ArrayD::from_shape_vec(IxDyn(&shape), values).map_err(|_| {
                    SnapshotError::CorruptTensor {
                        name: name.clone(),
                        expected: expected * T::BYTES,
                        actual: data.len(),
                    }
                })?;
                StateValue::Tensor(arr)
            }
            other => {
                return Err(SnapshotError::UnsupportedDtype(format!(
                    "tensor '{}' is {:?}, expected {:?} or U64",
                    name,
                    other,
                    T::DTYPE
                )));
            }
        };
        result.insert(name, value);
    }

    Ok(result)
}

/// Returns the names of the tensors stored in a SafeTensors file.
pub fn list_tensors<P: AsRef<Path>>(path: P) -> Result<Vec<String>> {
    let buffer = fs::read(path)?;
    let tensors = SafeTensors::deserialize(&buffer)?;
    Ok(tensors.names().iter().map(|s| s.to_string()).collect())
}
