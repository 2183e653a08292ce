//! Small numeric helpers with guarded denominators.

use statrs::distribution::{ContinuousCDF, StudentsT};

/// Two-sided 95% critical value of the standard normal distribution.
pub const NORMAL_CRITICAL_95: f64 = 1.96;

/// From this many degrees of freedom on, the normal value is used.
pub const NORMAL_APPROXIMATION_DF: u32 = 30;

/// Arithmetic mean; 0 for an empty slice.
#[must_use]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n - 1 denominator); 0 for fewer than two values.
#[must_use]
pub fn variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let sum_sq: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    sum_sq / (values.len() - 1) as f64
}

#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

/// `numerator / denominator`, or 0 when the denominator is 0.
#[must_use]
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    numerator / denominator
}

/// Two-sided 95% critical value of Student's t for `df` degrees of freedom.
///
/// `df` below 1 is treated as 1; 30 and above use the normal value.
#[must_use]
pub fn t_critical_95(df: u32) -> f64 {
    let df = df.max(1);
    if df >= NORMAL_APPROXIMATION_DF {
        return NORMAL_CRITICAL_95;
    }
    StudentsT::new(0.0, 1.0, f64::from(df)).map_or(NORMAL_CRITICAL_95, |t| t.inverse_cdf(0.975))
}
