//! Trailing rolling-window statistics.
//!
//! Positions with fewer than `window` preceding observations yield NaN,
//! matching the convention of dataframe rolling operations; feature
//! builders substitute a neutral value for the NaN prefix.

/// Compute trailing rolling mean.
pub fn rolling_mean(series: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(series, window, |s| {
        s.iter().sum::<f64>() / s.len() as f64
    })
}

/// Compute trailing rolling sample variance.
pub fn rolling_var(series: &[f64], window: usize) -> Vec<f64> {
    if window < 2 {
        return vec![f64::NAN; series.len()];
    }
    rolling_apply(series, window, |s| {
        let mean = s.iter().sum::<f64>() / s.len() as f64;
        s.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (s.len() - 1) as f64
    })
}

/// Compute trailing rolling standard deviation.
pub fn rolling_std(series: &[f64], window: usize) -> Vec<f64> {
    rolling_var(series, window).iter().map(|v| v.sqrt()).collect()
}

/// Compute trailing rolling minimum.
pub fn rolling_min(series: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(series, window, |s| {
        s.iter().copied().fold(f64::INFINITY, f64::min)
    })
}

/// Compute trailing rolling maximum.
pub fn rolling_max(series: &[f64], window: usize) -> Vec<f64> {
    rolling_apply(series, window, |s| {
        s.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    })
}

/// Generic trailing rolling application.
fn rolling_apply<F>(series: &[f64], window: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    if series.is_empty() || window == 0 {
        return vec![f64::NAN; series.len()];
    }

    let n = series.len();
    let mut result = vec![f64::NAN; n];

    for i in 0..n {
        if i + 1 < window {
            continue;
        }
        result[i] = f(&series[i + 1 - window..i + 1]);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn rolling_mean_has_nan_prefix() {
        let result = rolling_mean(&[1.0, 2.0, 3.0, 4.0], 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_relative_eq!(result[2], 2.0, epsilon = 1e-12);
        assert_relative_eq!(result[3], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn rolling_std_matches_sample_formula() {
        let result = rolling_std(&[2.0, 4.0, 6.0], 3);
        // sample std of [2,4,6] = 2
        assert_relative_eq!(result[2], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn rolling_extrema() {
        let series = [5.0, 1.0, 4.0, 2.0];
        let mins = rolling_min(&series, 2);
        let maxs = rolling_max(&series, 2);
        assert_relative_eq!(mins[1], 1.0);
        assert_relative_eq!(maxs[2], 4.0);
        assert_relative_eq!(mins[3], 2.0);
    }

    #[test]
    fn zero_window_yields_all_nan() {
        assert!(rolling_mean(&[1.0, 2.0], 0).iter().all(|v| v.is_nan()));
    }
}
