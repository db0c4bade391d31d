/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the sample standard deviation (n - 1 denominator) given a
/// pre-computed mean. Undefined for fewer than two values.
pub fn sample_stddev(values: &[f64], mean: f64) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;

    Some(variance.sqrt())
}

/// `(value - mean) / std`, forced to 0 when the deviation is zero, undefined,
/// or the quotient is not finite.
pub fn z_score(value: f64, mean: f64, std: Option<f64>) -> f64 {
    match std {
        Some(sd) if sd > 0.0 => {
            let z = (value - mean) / sd;
            if z.is_finite() { z } else { 0.0 }
        }
        _ => 0.0,
    }
}
