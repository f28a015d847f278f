//! Minor-currency-unit arithmetic
//!
//! Stored and reported money is always `i64` minor units. Averages and
//! percentages may pass through `f64`, but come back through
//! [`to_minor_units`], which rounds half away from zero and refuses
//! non-finite input.

use crate::error::{Error, Result};

/// Round an `f64` amount to whole minor units
pub fn to_minor_units(value: f64) -> Result<i64> {
    if !value.is_finite() {
        return Err(Error::Computation(format!(
            "non-finite monetary value: {}",
            value
        )));
    }
    if value.abs() > i64::MAX as f64 {
        return Err(Error::Computation(format!(
            "monetary value out of range: {}",
            value
        )));
    }
    Ok(value.round() as i64)
}

/// Integer mean, rounded half away from zero. `None` for an empty slice.
pub fn average(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let sum: i128 = values.iter().map(|&v| v as i128).sum();
    i64::try_from(div_round(sum, values.len() as i128)).ok()
}

/// `amount * numerator / denominator`, rounded; `None` when `denominator` is 0
pub fn scale(amount: i64, numerator: i64, denominator: i64) -> Option<i64> {
    if denominator == 0 {
        return None;
    }
    let product = amount as i128 * numerator as i128;
    let scaled = div_round(product, denominator as i128);
    i64::try_from(scaled).ok()
}

/// `amount * rate`, e.g. a 7% discount is `apply_rate(spend, 0.07)`
pub fn apply_rate(amount: i64, rate: f64) -> Result<i64> {
    to_minor_units(amount as f64 * rate)
}

/// Display form with two decimal places, e.g. `123456` -> `"1,234.56"`
pub fn format_minor(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let whole = (abs / 100).to_string();
    let cents = abs % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}.{:02}", sign, grouped, cents)
}

fn div_round(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;
    if remainder.abs() * 2 >= denominator.abs() {
        if (numerator < 0) != (denominator < 0) {
            quotient - 1
        } else {
            quotient + 1
        }
    } else {
        quotient
    }
}
