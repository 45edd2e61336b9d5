// --- File: src/metrics/state.rs ---

//! Named accumulator slots and the reductions used to merge them.
//!
//! Every metric registers its state fields here together with an identity
//! value and a [`Reduction`]. The same reduction folds a batch's partial
//! aggregate into the running state and merges the state of peer instances
//! that observed other shards of the data.

use super::{MetricError, Result};
use crate::tensor::Element;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

/// Associative, commutative operator used to merge a state field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reduction {
    Sum,
}

impl Reduction {
    /// Folds `incoming` into the field `name` holding `acc`. Values of a
    /// different kind or shape are rejected and `acc` is left as is.
    fn apply<T: Element>(
        self,
        name: &str,
        acc: &mut StateValue<T>,
        incoming: &StateValue<T>,
    ) -> Result<()> {
        match (self, acc, incoming) {
            (Reduction::Sum, StateValue::Tensor(acc), StateValue::Tensor(other))
                if acc.shape() == other.shape() =>
            {
                acc.zip_mut_with(other, |a, &b| *a += b);
                Ok(())
            }
            (Reduction::Sum, StateValue::Count(acc), StateValue::Count(other)) => {
                *acc += *other;
                Ok(())
            }
            (_, acc, incoming) => Err(MetricError::StateMismatch(format!(
                "state `{}` is {}, peer has {}",
                name,
                acc.describe(),
                incoming.describe()
            ))),
        }
    }
}

/// Current value of a state field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Element")]
pub enum StateValue<T: Element> {
    /// Floating-point sums, kept in the input precision.
    Tensor(ArrayD<T>),
    /// Integer observation counts.
    Count(u64),
}

impl<T: Element> StateValue<T> {
    /// `true` if both values have the same kind and, for tensors, the same shape.
    pub fn is_compatible(&self, other: &StateValue<T>) -> bool {
        match (self, other) {
            (StateValue::Tensor(a), StateValue::Tensor(b)) => a.shape() == b.shape(),
            (StateValue::Count(_), StateValue::Count(_)) => true,
            _ => false,
        }
    }

    fn describe(&self) -> String {
        match self {
            StateValue::Tensor(arr) => format!("tensor{:?}", arr.shape()),
            StateValue::Count(_) => "count".to_string(),
        }
    }
}

/// A named accumulator slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "T: Element")]
pub struct StateField<T: Element> {
    name: String,
    default: StateValue<T>,
    value: StateValue<T>,
    reduction: Reduction,
}

impl<T: Element> StateField<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &StateValue<T> {
        &self.value
    }

    pub fn default_value(&self) -> &StateValue<T> {
        &self.default
    }

    pub fn reduction(&self) -> Reduction {
        self.reduction
    }
}

/// Ordered collection of state fields plus the number of folded batches.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(bound = "T: Element")]
pub struct MetricState<T: Element> {
    fields: Vec<StateField<T>>,
    update_count: usize,
}

impl<T: Element> MetricState<T> {
    pub fn new() -> Self {
        Self {
            fields: Vec::new(),
            update_count: 0,
        }
    }

    /// Registers a field, seeded with its identity value.
    pub fn add_state(
        &mut self,
        name: &str,
        default: StateValue<T>,
        reduction: Reduction,
    ) -> Result<()> {
        if self.fields.iter().any(|f| f.name == name) {
            return Err(MetricError::InvalidArgument(format!(
                "state `{}` is already registered",
                name
            )));
        }
        self.fields.push(StateField {
            name: name.to_string(),
            value: default.clone(),
            default,
            reduction,
        });
        Ok(())
    }

    /// Restores every field to its identity value.
    pub fn reset(&mut self) {
        for field in &mut self.fields {
            field.value = field.default.clone();
        }
        self.update_count = 0;
    }

    pub fn fields(&self) -> impl Iterator<Item = &StateField<T>> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&StateValue<T>> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn tensor(&self, name: &str) -> Option<&ArrayD<T>> {
        match self.get(name)? {
            StateValue::Tensor(arr) => Some(arr),
            StateValue::Count(_) => None,
        }
    }

    pub fn count(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            StateValue::Count(n) => Some(*n),
            StateValue::Tensor(_) => None,
        }
    }

    /// Number of batches folded into this state since the last reset.
    pub fn update_count(&self) -> usize {
        self.update_count
    }

    /// Builds a state with the same layout as `self`, holding a single batch's
    /// partial aggregate. Fields missing from `partials` keep their identity.
    pub fn partial(&self, partials: Vec<(&str, StateValue<T>)>) -> Result<MetricState<T>> {
        let mut delta = self.clone();
        delta.reset();
        for (name, value) in partials {
            let field = delta
                .fields
                .iter_mut()
                .find(|f| f.name == name)
                .ok_or_else(|| MetricError::StateMismatch(format!("unknown state `{}`", name)))?;
            if !field.default.is_compatible(&value) {
                return Err(MetricError::StateMismatch(format!(
                    "state `{}` expects {}, got {}",
                    name,
                    field.default.describe(),
                    value.describe()
                )));
            }
            field.value = value;
        }
        delta.update_count = 1;
        Ok(delta)
    }

    /// Overrides the batch counter, e.g. when restoring a stored state.
    pub(crate) fn with_update_count(mut self, update_count: usize) -> Self {
        self.update_count = update_count;
        self
    }

    /// Checks that `other` has the same fields, in the same order, with
    /// matching kinds, shapes and reductions.
    pub fn check_compatible(&self, other: &MetricState<T>) -> Result<()> {
        if self.fields.len() != other.fields.len() {
            return Err(MetricError::StateMismatch(format!(
                "expected {} state fields, got {}",
                self.fields.len(),
                other.fields.len()
            )));
        }
        for (mine, theirs) in self.fields.iter().zip(other.fields.iter()) {
            if mine.name != theirs.name {
                return Err(MetricError::StateMismatch(format!(
                    "expected state `{}`, got `{}`",
                    mine.name, theirs.name
                )));
            }
            if mine.reduction != theirs.reduction {
                return Err(MetricError::StateMismatch(format!(
                    "state `{}` uses {:?}, peer uses {:?}",
                    mine.name, mine.reduction, theirs.reduction
                )));
            }
            if !mine.value.is_compatible(&theirs.value) {
                return Err(MetricError::StateMismatch(format!(
                    "state `{}` is {}, peer has {}",
                    mine.name,
                    mine.value.describe(),
                    theirs.value.describe()
                )));
            }
        }
        Ok(())
    }

    /// Merges `other` into `self` field by field. Nothing is modified unless
    /// every field is compatible.
    pub fn merge(&mut self, other: &MetricState<T>) -> Result<()> {
        self.check_compatible(other)?;
        for (mine, theirs) in self.fields.iter_mut().zip(other.fields.iter()) {
            mine.reduction
                .apply(&mine.name, &mut mine.value, &theirs.value)?;
        }
        self.update_count += other.update_count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn sum_and_count() -> MetricState<f64> {
        let mut state = MetricState::new();
        state
            .add_state(
                "sum",
                StateValue::Tensor(ArrayD::zeros(IxDyn(&[2]))),
                Reduction::Sum,
            )
            .unwrap();
        state
            .add_state("total", StateValue::Count(0), Reduction::Sum)
            .unwrap();
        state
    }

    fn vec2(a: f64, b: f64) -> StateValue<f64> {
        StateValue::Tensor(ArrayD::from_shape_vec(IxDyn(&[2]), vec![a, b]).unwrap())
    }

    #[test]
    fn test_duplicate_state_rejected() {
        let mut state = sum_and_count();
        let err = state
            .add_state("total", StateValue::Count(0), Reduction::Sum)
            .unwrap_err();
        assert!(matches!(err, MetricError::InvalidArgument(_)));
    }

    #[test]
    fn test_partial_then_merge_sums_fields() {
        let mut state = sum_and_count();
        let a = state
            .partial(vec![("sum", vec2(1.0, 2.0)), ("total", StateValue::Count(3))])
            .unwrap();
        let b = state
            .partial(vec![("sum", vec2(0.5, 0.5)), ("total", StateValue::Count(1))])
            .unwrap();

        state.merge(&a).unwrap();
        state.merge(&b).unwrap();

        let sum = state.tensor("sum").unwrap();
        assert_eq!(sum.as_slice().unwrap(), &[1.5, 2.5]);
        assert_eq!(state.count("total"), Some(4));
        assert_eq!(state.update_count(), 2);
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let base = sum_and_count();
        let a = base
            .partial(vec![("sum", vec2(1.0, 2.0)), ("total", StateValue::Count(3))])
            .unwrap();
        let b = base
            .partial(vec![("sum", vec2(4.0, 8.0)), ("total", StateValue::Count(5))])
            .unwrap();

        let mut ab = base.clone();
        ab.merge(&a).unwrap();
        ab.merge(&b).unwrap();

        let mut ba = base.clone();
        ba.merge(&b).unwrap();
        ba.merge(&a).unwrap();

        assert_eq!(ab, ba);
    }

    #[test]
    fn test_incompatible_shape_leaves_state_untouched() {
        let mut state = sum_and_count();
        let good = state
            .partial(vec![("sum", vec2(1.0, 1.0)), ("total", StateValue::Count(2))])
            .unwrap();
        state.merge(&good).unwrap();
        let before = state.clone();

        let mut other = MetricState::new();
        other
            .add_state(
                "sum",
                StateValue::Tensor(ArrayD::zeros(IxDyn(&[3]))),
                Reduction::Sum,
            )
            .unwrap();
        other
            .add_state("total", StateValue::Count(7), Reduction::Sum)
            .unwrap();

        let err = state.merge(&other).unwrap_err();
        assert!(matches!(err, MetricError::StateMismatch(_)));
        assert_eq!(state, before);
    }

    #[test]
    fn test_partial_rejects_wrong_kind() {
        let state = sum_and_count();
        let err = state
            .partial(vec![("total", vec2(1.0, 1.0))])
            .unwrap_err();
        assert!(matches!(err, MetricError::StateMismatch(_)));
    }

    #[test]
    fn test_reduction_rejects_mismatched_values() {
        let mut acc = vec2(1.0, 2.0);
        let err = Reduction::Sum
            .apply("sum", &mut acc, &StateValue::Count(3))
            .unwrap_err();
        assert!(matches!(err, MetricError::StateMismatch(_)));

        let wider = StateValue::Tensor(ArrayD::zeros(IxDyn(&[3])));
        assert!(Reduction::Sum.apply("sum", &mut acc, &wider).is_err());
        assert_eq!(acc, vec2(1.0, 2.0));
    }

    #[test]
    fn test_reset_restores_identity() {
        let mut state = sum_and_count();
        let a = state
            .partial(vec![("sum", vec2(1.0, 2.0)), ("total", StateValue::Count(3))])
            .unwrap();
        state.merge(&a).unwrap();
        state.reset();

        assert_eq!(state.tensor("sum").unwrap().sum(), 0.0);
        assert_eq!(state.count("total"), Some(0));
        assert_eq!(state.update_count(), 0);
    }
}
