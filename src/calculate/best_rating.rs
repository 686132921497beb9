//! Best-rating estimation.
//!
//! A player's ladder rating wanders around their real skill. The
//! estimator sorts the rating history, slides a fixed-size window over
//! it, and picks the window with the smallest sample standard
//! deviation. The median of that window is the representative rating.

use crate::models::BestRatingEstimate;

/// A history shorter than `window_size * factor` has too little signal
/// for a stable window.
pub const DEFAULT_MIN_HISTORY_FACTOR: f64 = 1.5;

/// Sample standard deviation (n-1 denominator). Zero for a single
/// observation.
pub fn sample_stdev(values: &[u32]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }

    let n = values.len() as f64;
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n;
    let variance = values
        .iter()
        .map(|v| {
            let diff = *v as f64 - mean;
            diff * diff
        })
        .sum::<f64>()
        / (n - 1.0);
    variance.sqrt()
}

fn median(sorted: &[u32]) -> f64 {
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2] as f64
    } else {
        (sorted[n / 2 - 1] as f64 + sorted[n / 2] as f64) / 2.0
    }
}

/// Find the most stable rating window with the default history margin.
///
/// The input is the player's rating series already stripped of
/// placement-noise values; order does not matter.
pub fn best_window(ratings: &[u32], window_size: usize) -> Option<BestRatingEstimate> {
    best_window_with(ratings, window_size, DEFAULT_MIN_HISTORY_FACTOR)
}

/// Find the most stable rating window.
///
/// Returns `None` when the history is shorter than
/// `window_size * min_history_factor`. Ties on the standard deviation
/// go to the later window, so of two equally stable clusters the
/// higher-valued one wins.
pub fn best_window_with(
    ratings: &[u32],
    window_size: usize,
    min_history_factor: f64,
) -> Option<BestRatingEstimate> {
    if window_size == 0 {
        return None;
    }
    if (ratings.len() as f64) < window_size as f64 * min_history_factor {
        return None;
    }

    let mut sorted = ratings.to_vec();
    sorted.sort_unstable();

    let mut best_stdev = f64::INFINITY;
    let mut best_start = 0;
    for start in 0..=sorted.len() - window_size {
        let stdev = sample_stdev(&sorted[start..start + window_size]);
        if stdev <= best_stdev {
            best_stdev = stdev;
            best_start = start;
        }
    }

    Some(BestRatingEstimate {
        median: median(&sorted[best_start..best_start + window_size]),
        stdev: best_stdev,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_later_window_wins_ties() {
        // Both [10,10] and [20,20] have zero stdev; the later one wins.
        let estimate = best_window(&[10, 10, 20, 20], 2).unwrap();

        assert_eq!(estimate.median, 20.0);
        assert_eq!(estimate.stdev, 0.0);
    }

    #[test]
    fn test_two_clusters() {
        let estimate = best_window(&[103, 104, 105, 1015, 1016, 1017], 3).unwrap();

        assert_eq!(estimate.median, 1016.0);
    }

    #[test]
    fn test_short_history_is_undefined() {
        // Six ratings, window of five: 6 < 7.5.
        assert_eq!(best_window(&[103, 104, 105, 1015, 1016, 1017], 5), None);
        assert_eq!(best_window(&[], 3), None);
        assert_eq!(best_window(&[1000], 1), None);
    }

    #[test]
    fn test_tight_cluster_beats_outliers() {
        // Caller has already dropped the 100 sentinel.
        let estimate = best_window(&[120, 118, 500, 600, 121], 3).unwrap();

        assert_eq!(estimate.median, 120.0);
    }

    #[test]
    fn test_all_equal_values() {
        for window_size in [2, 3] {
            let estimate = best_window(&[1000, 1000, 1000, 1000, 1000], window_size).unwrap();
            assert_eq!(estimate.median, 1000.0);
            assert_eq!(estimate.stdev, 0.0);
        }
    }

    #[test]
    fn test_window_of_one_takes_highest() {
        // Every window of one has zero stdev; the tie-break walks to
        // the top of the sorted series.
        let estimate = best_window(&[900, 1200, 1100], 1).unwrap();

        assert_eq!(estimate.median, 1200.0);
        assert_eq!(estimate.stdev, 0.0);
    }

    #[test]
    fn test_input_order_is_irrelevant() {
        let a = best_window(&[1015, 103, 1017, 104, 1016, 105], 3).unwrap();
        let b = best_window(&[103, 104, 105, 1015, 1016, 1017], 3).unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_stdev() {
        assert_eq!(sample_stdev(&[]), 0.0);
        assert_eq!(sample_stdev(&[42]), 0.0);
        assert_eq!(sample_stdev(&[10, 10, 10]), 0.0);
        // Sample stdev of [2, 4] is sqrt(2).
        assert!((sample_stdev(&[2, 4]) - 2.0_f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_zero_window_is_undefined() {
        assert_eq!(best_window(&[1000, 1001, 1002], 0), None);
    }
}
