// --- File: src/functional/tweedie.rs ---

//! Tweedie deviance score.
//!
//! The power parameter selects the assumed distribution:
//!
//! | power     | distribution      | per-element deviance                                  |
//! |-----------|-------------------|-------------------------------------------------------|
//! | 0         | normal            | `(y - ŷ)²`                                            |
//! | 1         | Poisson           | `2 (y ln(y/ŷ) + ŷ - y)`                               |
//! | 2         | gamma             | `2 (ln(ŷ/y) + y/ŷ - 1)`                               |
//! | otherwise | compound / stable | `2 (y^(2-p)/((1-p)(2-p)) - y ŷ^(1-p)/(1-p) + ŷ^(2-p)/(2-p))` |
//!
//! Powers strictly between 0 and 1 do not define a distribution.

use super::check_same_shape;
use crate::metrics::{MetricError, Result};
use crate::tensor::{numel, Element};
use ndarray::{ArrayViewD, Zip};

/// Rejects powers for which the deviance is undefined.
pub fn validate_power(power: f64) -> Result<()> {
    if !power.is_finite() {
        return Err(MetricError::InvalidArgument(format!(
            "Expected power to be a finite number but got {}",
            power
        )));
    }
    if 0.0 < power && power < 1.0 {
        return Err(MetricError::InvalidArgument(format!(
            "Deviance Score is not defined for power={}.",
            power
        )));
    }
    Ok(())
}

fn require(holds: bool, power: f64, requirement: &str) -> Result<()> {
    if holds {
        Ok(())
    } else {
        Err(MetricError::DomainViolation {
            power,
            requirement: requirement.to_string(),
        })
    }
}

/// `x * ln(y)`, defined as 0 where `x == 0`.
fn xlogy<T: Element>(x: T, y: T) -> T {
    if x == T::zero() && !y.is_nan() {
        T::zero()
    } else {
        x * y.ln()
    }
}

/// Checks the input domain required by `power`.
fn check_domain<T: Element>(
    preds: &ArrayViewD<'_, T>,
    target: &ArrayViewD<'_, T>,
    power: f64,
) -> Result<()> {
    let zero = T::zero();
    let preds_positive = || preds.iter().all(|&p| p > zero);
    let target_non_negative = || target.iter().all(|&t| t >= zero);
    let target_positive = || target.iter().all(|&t| t > zero);

    if power == 0.0 {
        Ok(())
    } else if power == 1.0 {
        require(
            preds_positive() && target_non_negative(),
            power,
            "'preds' has to be strictly positive and 'targets' cannot be negative",
        )
    } else if power == 2.0 {
        require(
            preds_positive() && target_positive(),
            power,
            "both 'preds' and 'targets' have to be strictly positive",
        )
    } else if power < 0.0 {
        require(preds_positive(), power, "'preds' has to be strictly positive")
    } else if power < 2.0 {
        require(
            preds_positive() && target_non_negative(),
            power,
            "'preds' has to be strictly positive and 'targets' cannot be negative",
        )
    } else {
        require(
            preds_positive() && target_positive(),
            power,
            "both 'preds' and 'targets' have to be strictly positive",
        )
    }
}

/// Sums the per-element deviance of one batch.
///
/// # Returns
///
/// The summed deviance and the number of elements.
pub fn tweedie_deviance_score_update<T: Element>(
    preds: ArrayViewD<'_, T>,
    target: ArrayViewD<'_, T>,
    power: f64,
) -> Result<(T, u64)> {
    check_same_shape(&preds, &target)?;
    validate_power(power)?;
    check_domain(&preds, &target, power)?;

    let zero = T::zero();
    let one = T::one();
    let two = one + one;
    let p = T::from_f64(power).ok_or_else(|| {
        MetricError::InvalidArgument(format!("power {} is not representable", power))
    })?;

    let sum = if power == 0.0 {
        Zip::from(&preds)
            .and(&target)
            .fold(zero, |acc, &y_hat, &y| acc + (y - y_hat) * (y - y_hat))
    } else if power == 1.0 {
        Zip::from(&preds).and(&target).fold(zero, |acc, &y_hat, &y| {
            acc + two * (xlogy(y, y / y_hat) + y_hat - y)
        })
    } else if power == 2.0 {
        Zip::from(&preds).and(&target).fold(zero, |acc, &y_hat, &y| {
            acc + two * ((y_hat / y).ln() + y / y_hat - one)
        })
    } else {
        let one_minus_p = one - p;
        let two_minus_p = two - p;
        Zip::from(&preds).and(&target).fold(zero, |acc, &y_hat, &y| {
            let term_1 = y.max(zero).powf(two_minus_p) / (one_minus_p * two_minus_p);
            let term_2 = y * y_hat.powf(one_minus_p) / one_minus_p;
            let term_3 = y_hat.powf(two_minus_p) / two_minus_p;
            acc + two * (term_1 - term_2 + term_3)
        })
    };

    Ok((sum, numel(&preds)))
}

/// Mean deviance; a zero count yields NaN.
pub fn tweedie_deviance_score_compute<T: Element>(sum_deviance_score: T, n_obs: u64) -> T {
    sum_deviance_score / T::from_count(n_obs)
}

/// One-shot Tweedie deviance score.
pub fn tweedie_deviance_score<T: Element>(
    preds: ArrayViewD<'_, T>,
    target: ArrayViewD<'_, T>,
    power: f64,
) -> Result<T> {
    let (sum, n_obs) = tweedie_deviance_score_update(preds, target, power)?;
    Ok(tweedie_deviance_score_compute(sum, n_obs))
}
