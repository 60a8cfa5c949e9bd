/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Returns the non-zero entries of `values`, preserving order.
///
/// Reporting uses this to skip bins that never received a sample, since an
/// empty bin reports a mean of exactly zero.
pub fn non_zero(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| *v != 0.0).collect()
}
