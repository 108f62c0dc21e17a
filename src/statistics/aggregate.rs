//! NaN-aware aggregation across bootstrap replicas.
//!
//! Replicas whose fit failed carry NaN; these helpers skip them so that a
//! handful of failures does not poison the whole estimate.

/// Mean of the finite entries of `values`, or NaN if there are none.
pub fn nan_mean(values: &[f64]) -> f64 {
    let (sum, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + v, c + 1));
    if count == 0 {
        f64::NAN
    } else {
        sum / count as f64
    }
}

/// Population standard deviation (denominator n) of the non-NaN entries.
///
/// Matches the convention used for bootstrap errors: the spread of the
/// replicas is itself the uncertainty of the estimate, so no Bessel
/// correction is applied.
pub fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let (sum_sq, count) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(s, c), &v| (s + (v - mean).powi(2), c + 1));
    (sum_sq / count as f64).sqrt()
}

/// Number of NaN entries.
pub fn nan_count(values: &[f64]) -> usize {
    values.iter().filter(|v| v.is_nan()).count()
}

/// Round to a fixed number of decimal places (NaN passes through).
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Column-wise NaN-aware mean and standard deviation of a set of rows.
///
/// All rows must have the same length; the result has one entry per column.
pub fn column_mean_std(rows: &[Vec<f64>]) -> (Vec<f64>, Vec<f64>) {
    let width = rows.first().map_or(0, Vec::len);
    let mut means = Vec::with_capacity(width);
    let mut stds = Vec::with_capacity(width);
    let mut column = Vec::with_capacity(rows.len());
    for j in 0..width {
        column.clear();
        column.extend(rows.iter().map(|row| row[j]));
        means.push(nan_mean(&column));
        stds.push(nan_std(&column));
    }
    (means, stds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_mean_skips_nan() {
        let values = [1.0, f64::NAN, 3.0];
        assert!((nan_mean(&values) - 2.0).abs() < 1e-12);
        assert_eq!(nan_count(&values), 1);
    }

    #[test]
    fn test_all_nan() {
        let values = [f64::NAN, f64::NAN];
        assert!(nan_mean(&values).is_nan());
        assert!(nan_std(&values).is_nan());
    }

    #[test]
    fn test_nan_std_population() {
        // Population std of [1, 3] is 1.
        let values = [1.0, 3.0, f64::NAN];
        assert!((nan_std(&values) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(1.23456, 2), 1.23);
        assert_eq!(round_to(0.995, 1), 1.0);
        assert!(round_to(f64::NAN, 2).is_nan());
    }

    #[test]
    fn test_column_mean_std() {
        let rows = vec![vec![1.0, 10.0], vec![3.0, f64::NAN], vec![2.0, 20.0]];
        let (means, stds) = column_mean_std(&rows);
        assert!((means[0] - 2.0).abs() < 1e-12);
        assert!((means[1] - 15.0).abs() < 1e-12);
        assert!((stds[1] - 5.0).abs() < 1e-12);
    }
}
