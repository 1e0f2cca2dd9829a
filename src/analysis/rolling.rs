/// N-day trailing windows over a daily series.
///
/// The series is indexed by position on the aligned date axis, so a missing
/// day is a `None` placeholder rather than a gap. The window for day `i`
/// covers `i + 1 - window ..= i`, truncated at the start of the series.

use crate::config::RollingStat;

/// Aggregate one window's values. Returns `None` when fewer than `min_valid`
/// values are present. A mean divides by the number of present values.
pub fn aggregate(values: &[Option<f64>], min_valid: usize, stat: RollingStat) -> Option<f64> {
    let mut count = 0usize;
    let mut sum = 0.0;
    for v in values.iter().flatten() {
        count += 1;
        sum += v;
    }
    if count == 0 || count < min_valid {
        return None;
    }
    match stat {
        RollingStat::Sum => Some(sum),
        RollingStat::Mean => Some(sum / count as f64),
    }
}

/// Trailing rolling statistic for every position of `series`.
pub fn rolling(series: &[Option<f64>], window: usize, min_valid: usize, stat: RollingStat) -> Vec<Option<f64>> {
    if window == 0 {
        return vec![None; series.len()];
    }
    (0..series.len())
        .map(|i| {
            let start = (i + 1).saturating_sub(window);
            aggregate(&series[start..=i], min_valid, stat)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_full_window_mean_is_arithmetic_mean() {
        let series: Vec<Option<f64>> = (1..=7).map(|v| Some(v as f64)).collect();
        let out = rolling(&series, 7, 5, RollingStat::Mean);
        assert_relative_eq!(out[6].unwrap(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn test_three_missing_of_seven_below_minimum_is_null() {
        let series = vec![Some(2.0), None, Some(1.0), None, Some(4.0), None, Some(3.0)];
        let out = rolling(&series, 7, 5, RollingStat::Sum);
        assert_eq!(out[6], None);
    }

    #[test]
    fn test_mean_divides_by_present_count() {
        let series = vec![Some(2.0), None, Some(4.0), Some(6.0), Some(8.0), Some(10.0), None];
        let out = rolling(&series, 7, 5, RollingStat::Mean);
        assert_relative_eq!(out[6].unwrap(), 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sum_over_available_values() {
        let series = vec![Some(1.0), Some(2.0), None, Some(3.0), Some(4.0), Some(5.0), Some(6.0)];
        let out = rolling(&series, 7, 5, RollingStat::Sum);
        assert_relative_eq!(out[6].unwrap(), 21.0, epsilon = 1e-12);
    }

    #[test]
    fn test_window_truncated_at_series_start() {
        let series = vec![Some(1.0), Some(1.0), Some(1.0)];
        let out = rolling(&series, 7, 2, RollingStat::Sum);
        assert_eq!(out, vec![None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_window_slides() {
        let series = vec![Some(10.0), Some(0.0), Some(0.0), Some(0.0)];
        let out = rolling(&series, 2, 1, RollingStat::Sum);
        assert_eq!(out, vec![Some(10.0), Some(10.0), Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_all_null_window_is_null_even_with_min_zero() {
        assert_eq!(aggregate(&[None, None], 0, RollingStat::Mean), None);
    }
}
