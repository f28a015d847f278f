//! Descriptive statistics shared by the detectors
//!
//! Every function guards its own divisions and returns `None` instead of
//! producing NaN or infinity.

/// Arithmetic mean
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (divides by `n`, not `n - 1`)
pub fn population_std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

/// Standard deviation divided by mean; `None` when the mean is not positive
pub fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    if m <= 0.0 {
        return None;
    }
    Some(population_std_dev(values)? / m)
}

/// `(current - baseline) / baseline`; `None` unless the baseline is positive
pub fn relative_change(current: f64, baseline: f64) -> Option<f64> {
    if baseline.is_nan() || baseline <= 0.0 || !current.is_finite() {
        return None;
    }
    Some((current - baseline) / baseline)
}

/// `part / whole`; `None` unless the whole is positive
pub fn share(part: f64, whole: f64) -> Option<f64> {
    if whole.is_nan() || whole <= 0.0 {
        return None;
    }
    Some(part / whole)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std_dev() {
        let gaps = [31.0, 28.0];
        assert_eq!(mean(&gaps), Some(29.5));
        assert!((population_std_dev(&gaps).unwrap() - 1.5).abs() < 1e-9);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_zero_variance() {
        let values = [20.0, 20.0, 20.0];
        assert_eq!(population_std_dev(&values), Some(0.0));
        assert_eq!(coefficient_of_variation(&values), Some(0.0));
    }

    #[test]
    fn test_guards() {
        assert_eq!(coefficient_of_variation(&[0.0, 0.0]), None);
        assert_eq!(relative_change(10.0, 0.0), None);
        assert_eq!(relative_change(115.0, 100.0).map(|c| (c * 100.0).round()), Some(15.0));
        assert_eq!(share(1.0, 0.0), None);
    }
}
