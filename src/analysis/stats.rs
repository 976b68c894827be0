//! Descriptive statistics over a set of samples.
//!
//! All functions return `None` for an empty input; callers decide whether an
//! empty set is an error.

use std::cmp::Ordering;

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    sorted
}

/// Arithmetic mean.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Median; the average of the two middle values for even-length input.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let s = sorted(values);
    let mid = s.len() / 2;
    if s.len() % 2 == 0 {
        Some((s[mid - 1] + s[mid]) / 2.0)
    } else {
        Some(s[mid])
    }
}

/// Percentile `q` in `[0, 100]`, linearly interpolated between the closest
/// ranks (rank = q/100 * (n - 1)).
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let s = sorted(values);
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (s.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let fraction = rank - lower as f64;

    Some(s[lower] + (s[upper] - s[lower]) * fraction)
}

/// Population standard deviation (divisor N). Zero for a single value.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(mean(&[]), None);
        assert_eq!(median(&[]), None);
        assert_eq!(percentile(&[], 50.0), None);
        assert_eq!(std_dev(&[]), None);
    }

    #[test]
    fn test_median_odd_and_even() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn test_percentile_interpolation() {
        let values = [7.0, 5.0, 6.0];
        assert!(approx(percentile(&values, 16.0).unwrap(), 5.32));
        assert!(approx(percentile(&values, 84.0).unwrap(), 6.68));
        assert_eq!(percentile(&values, 0.0), Some(5.0));
        assert_eq!(percentile(&values, 100.0), Some(7.0));
    }

    #[test]
    fn test_single_value_has_no_spread() {
        assert_eq!(percentile(&[4.2], 16.0), Some(4.2));
        assert_eq!(percentile(&[4.2], 84.0), Some(4.2));
        assert_eq!(std_dev(&[4.2]), Some(0.0));
    }

    #[test]
    fn test_std_dev_population_form() {
        let sd = std_dev(&[5.0, 6.0, 7.0]).unwrap();
        assert!(approx(sd, (2.0f64 / 3.0).sqrt()));
    }
}
