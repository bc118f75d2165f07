//! Slice arithmetic shared by the statistics and accessor modules
//!
//! Missing values are `f64::NAN` throughout. The `nan*` helpers skip them the
//! way a tabular library's column reductions do; the plain helpers propagate.

/// Initialize a result vector with NaN values
#[inline]
pub fn nan_vec(len: usize) -> Vec<f64> {
    vec![f64::NAN; len]
}

/// Check if we have enough data for the given period
#[inline]
pub fn has_enough_data(len: usize, period: usize) -> bool {
    len >= period && period > 0
}

/// Arithmetic mean, NaN when empty
#[inline]
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator), NaN below two observations
pub fn sample_std(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (n - 1) as f64;
    variance.sqrt()
}

fn non_nan(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| !v.is_nan()).collect()
}

/// Mean over the non-NaN entries
pub fn nanmean(values: &[f64]) -> f64 {
    mean(&non_nan(values))
}

/// Sample standard deviation over the non-NaN entries
pub fn nanstd(values: &[f64]) -> f64 {
    sample_std(&non_nan(values))
}

/// Minimum over the non-NaN entries, NaN if there are none
pub fn nanmin(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
        .unwrap_or(f64::NAN)
}

/// First and last non-NaN entries
pub fn first_valid(values: &[f64]) -> Option<f64> {
    values.iter().find(|v| !v.is_nan()).copied()
}

pub fn last_valid(values: &[f64]) -> Option<f64> {
    values.iter().rev().find(|v| !v.is_nan()).copied()
}

/// Rolling window operation that only fires on complete windows.
///
/// Output has the input's length. Position `i` holds `f(values[i+1-period..=i])`
/// when that window contains no NaN, otherwise NaN.
pub fn rolling_complete<F>(values: &[f64], period: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let n = values.len();
    let mut result = nan_vec(n);
    if !has_enough_data(n, period) {
        return result;
    }

    for i in (period - 1)..n {
        let window = &values[(i + 1 - period)..=i];
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = f(window);
    }
    result
}

/// Percent change over `periods` positions; the first `periods` entries are NaN
pub fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = nan_vec(n);
    if periods == 0 {
        return values.iter().map(|v| if v.is_nan() { f64::NAN } else { 0.0 }).collect();
    }
    for i in periods..n {
        result[i] = values[i] / values[i - periods] - 1.0;
    }
    result
}

/// Cumulative product that leaves NaN positions as NaN and carries on past them
pub fn cum_prod(values: &[f64]) -> Vec<f64> {
    let mut acc = 1.0;
    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                f64::NAN
            } else {
                acc *= v;
                acc
            }
        })
        .collect()
}

/// Running maximum with the same NaN handling as [`cum_prod`]
pub fn cum_max(values: &[f64]) -> Vec<f64> {
    let mut peak = f64::NEG_INFINITY;
    values
        .iter()
        .map(|&v| {
            if v.is_nan() {
                f64::NAN
            } else {
                peak = peak.max(v);
                peak
            }
        })
        .collect()
}

/// Mean across several aligned columns, skipping NaN per position
pub fn row_nanmean(columns: &[&[f64]]) -> Vec<f64> {
    let n = columns.first().map_or(0, |c| c.len());
    (0..n)
        .map(|i| {
            let row: Vec<f64> = columns.iter().filter_map(|c| c.get(i).copied()).collect();
            nanmean(&row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_vec() {
        let v = nan_vec(5);
        assert_eq!(v.len(), 5);
        assert!(v.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[2.0, 4.0, 6.0]), 4.0);
        assert!(mean(&[]).is_nan());
    }

    #[test]
    fn test_sample_std() {
        // var = ((1-2)^2 + 0 + (3-2)^2) / 2 = 1
        assert_eq!(sample_std(&[1.0, 2.0, 3.0]), 1.0);
        assert!(sample_std(&[1.0]).is_nan());
    }

    #[test]
    fn test_nan_skipping_reductions() {
        let v = [f64::NAN, 1.0, 3.0, f64::NAN];
        assert_eq!(nanmean(&v), 2.0);
        assert!((nanstd(&v) - 2.0_f64.sqrt()).abs() < 1e-12);
        assert_eq!(nanmin(&v), 1.0);
        assert!(nanmin(&[f64::NAN]).is_nan());
        assert!(nanmean(&[f64::NAN, f64::NAN]).is_nan());
    }

    #[test]
    fn test_nanmean_keeps_infinity() {
        assert_eq!(nanmean(&[1.0, f64::INFINITY]), f64::INFINITY);
    }

    #[test]
    fn test_first_last_valid() {
        let v = [f64::NAN, 2.0, 5.0, f64::NAN];
        assert_eq!(first_valid(&v), Some(2.0));
        assert_eq!(last_valid(&v), Some(5.0));
        assert_eq!(last_valid(&[f64::NAN]), None);
    }

    #[test]
    fn test_rolling_complete_skips_windows_with_nan() {
        let v = vec![f64::NAN, 2.0, 3.0, 4.0, 5.0];
        let result = rolling_complete(&v, 2, mean);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_eq!(result[2], 2.5);
        assert_eq!(result[3], 3.5);
        assert_eq!(result[4], 4.5);
    }

    #[test]
    fn test_rolling_complete_short_input() {
        let result = rolling_complete(&[1.0, 2.0], 3, mean);
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|x| x.is_nan()));
    }

    #[test]
    fn test_pct_change() {
        let v = vec![100.0, 110.0, 99.0];
        let p = pct_change(&v, 1);
        assert!(p[0].is_nan());
        assert!((p[1] - 0.1).abs() < 1e-12);
        assert!((p[2] + 0.1).abs() < 1e-12);

        let p2 = pct_change(&v, 2);
        assert!(p2[1].is_nan());
        assert!((p2[2] + 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_cum_prod_and_max_skip_nan() {
        let v = vec![f64::NAN, 2.0, 0.5, 3.0];
        assert!(cum_prod(&v)[0].is_nan());
        assert_eq!(&cum_prod(&v)[1..], &[2.0, 1.0, 3.0]);
        assert_eq!(&cum_max(&[f64::NAN, 2.0, 1.0, 3.0])[1..], &[2.0, 2.0, 3.0]);
    }

    #[test]
    fn test_row_nanmean() {
        let a = [1.0, f64::NAN];
        let b = [3.0, f64::NAN];
        let c = [5.0, 4.0];
        let m = row_nanmean(&[&a, &b, &c]);
        assert_eq!(m, vec![3.0, 4.0]);
    }
}
