//! Sample reduction for benchmark runs.
//!
//! All latencies are in milliseconds. Percentiles use the nearest-rank
//! rule (`ceil(n * q) - 1`), so ties round up to the next sample.

/// Critical value used when no small-sample table applies.
pub const NORMAL_CRITICAL_VALUE: f64 = 1.96;

/// Confidence level the t-distribution table is keyed for.
pub const TABLE_CONFIDENCE: f64 = 0.95;

/// Summary of a non-empty sample set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reduction {
    pub mean: f64,
    pub median: f64,
    pub p95: f64,
    pub std_dev: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// Arithmetic mean. Zero for an empty slice.
pub fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

/// Population standard deviation around `mean`.
pub fn population_std_dev(samples: &[f64], mean: f64) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    let variance = samples
        .iter()
        .map(|s| {
            let d = s - mean;
            d * d
        })
        .sum::<f64>()
        / samples.len() as f64;
    variance.sqrt()
}

/// Nearest-rank percentile over an already sorted slice.
///
/// `quantile` is in `[0, 1]`. Returns 0 for an empty slice.
pub fn nearest_rank(sorted: &[f64], quantile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    let rank = (n as f64 * quantile).ceil() as usize;
    let idx = rank.saturating_sub(1).min(n - 1);
    sorted[idx]
}

/// Two-sided critical value for the given degrees of freedom.
///
/// The bucketed t-table only applies to 95% confidence; every other level
/// falls back to the normal approximation.
pub fn t_critical(degrees_of_freedom: usize, confidence: f64) -> f64 {
    if (confidence - TABLE_CONFIDENCE).abs() > f64::EPSILON {
        return NORMAL_CRITICAL_VALUE;
    }
    match degrees_of_freedom {
        df if df > 120 => 1.96,
        df if df > 60 => 2.0,
        df if df > 30 => 2.042,
        df if df > 15 => 2.131,
        _ => 2.262,
    }
}

/// Reduce raw samples to summary statistics.
///
/// Returns `None` for an empty sample set; callers decide what "no data"
/// means for them.
pub fn reduce(samples: &[f64], confidence: f64) -> Option<Reduction> {
    if samples.is_empty() {
        return None;
    }

    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = sorted.len();
    let mean = mean(&sorted);
    let std_dev = population_std_dev(&sorted, mean);
    let t = t_critical(n - 1, confidence);
    let margin = t * std_dev / (n as f64).sqrt();

    Some(Reduction {
        mean,
        median: nearest_rank(&sorted, 0.5),
        p95: nearest_rank(&sorted, 0.95),
        std_dev,
        ci_lower: mean - margin,
        ci_upper: mean + margin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std_dev() {
        let samples = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let m = mean(&samples);
        assert!((m - 5.0).abs() < 1e-12);
        assert!((population_std_dev(&samples, m) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_nearest_rank_rounds_up() {
        let sorted: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        // ceil(20 * 0.95) - 1 = 18 -> value 19
        assert_eq!(nearest_rank(&sorted, 0.95), 19.0);
        // ceil(20 * 0.5) - 1 = 9 -> value 10
        assert_eq!(nearest_rank(&sorted, 0.5), 10.0);

        let odd = [1.0, 2.0, 3.0];
        assert_eq!(nearest_rank(&odd, 0.5), 2.0);
        assert_eq!(nearest_rank(&odd, 0.95), 3.0);
    }

    #[test]
    fn test_nearest_rank_single_and_empty() {
        assert_eq!(nearest_rank(&[42.0], 0.95), 42.0);
        assert_eq!(nearest_rank(&[], 0.5), 0.0);
    }

    #[test]
    fn test_t_table_buckets() {
        assert_eq!(t_critical(500, 0.95), 1.96);
        assert_eq!(t_critical(121, 0.95), 1.96);
        assert_eq!(t_critical(120, 0.95), 2.0);
        assert_eq!(t_critical(61, 0.95), 2.0);
        assert_eq!(t_critical(60, 0.95), 2.042);
        assert_eq!(t_critical(31, 0.95), 2.042);
        assert_eq!(t_critical(30, 0.95), 2.131);
        assert_eq!(t_critical(16, 0.95), 2.131);
        assert_eq!(t_critical(15, 0.95), 2.262);
        assert_eq!(t_critical(0, 0.95), 2.262);
    }

    #[test]
    fn test_other_confidence_uses_normal_approximation() {
        assert_eq!(t_critical(5, 0.99), NORMAL_CRITICAL_VALUE);
        assert_eq!(t_critical(500, 0.9), NORMAL_CRITICAL_VALUE);
    }

    #[test]
    fn test_reduce_orders_interval_around_mean() {
        let samples = [3.0, 1.0, 2.0, 5.0, 4.0];
        let r = reduce(&samples, 0.95).unwrap();
        assert!((r.mean - 3.0).abs() < 1e-12);
        assert_eq!(r.median, 3.0);
        assert_eq!(r.p95, 5.0);
        assert!(r.ci_lower <= r.mean && r.mean <= r.ci_upper);
        let expected_margin = 2.262 * r.std_dev / 5f64.sqrt();
        assert!((r.ci_upper - r.mean - expected_margin).abs() < 1e-12);
    }

    #[test]
    fn test_reduce_empty_is_none() {
        assert!(reduce(&[], 0.95).is_none());
    }

    #[test]
    fn test_reduce_constant_samples_has_zero_width_interval() {
        let r = reduce(&[1.5; 10], 0.95).unwrap();
        assert_eq!(r.std_dev, 0.0);
        assert_eq!(r.ci_lower, r.ci_upper);
    }
}
