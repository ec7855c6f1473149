//! SIMD window kernels.
//!
//! These use the `wide` crate for portable SIMD. Lane layout is fixed, so
//! results are identical for identical input on every target.

use wide::f64x4;

/// Vectorized sum of a slice.
pub fn sum_simd(data: &[f64]) -> f64 {
    let len = data.len();
    let chunks = len / 4;

    let mut simd_sum = f64x4::splat(0.0);

    for i in 0..chunks {
        let idx = i * 4;
        let values = f64x4::new([data[idx], data[idx + 1], data[idx + 2], data[idx + 3]]);
        simd_sum += values;
    }

    let mut result = simd_sum.reduce_add();

    for &value in &data[(chunks * 4)..] {
        result += value;
    }

    result
}

/// Arithmetic mean of a slice, `None` when empty.
pub fn mean_simd(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(sum_simd(data) / data.len() as f64)
}

/// Population standard deviation of a slice around a known mean.
pub fn std_dev_simd(data: &[f64], mean: f64) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let len = data.len();
    let chunks = len / 4;
    let mean_vec = f64x4::splat(mean);
    let mut sum_sq = f64x4::splat(0.0);

    for i in 0..chunks {
        let idx = i * 4;
        let values = f64x4::new([data[idx], data[idx + 1], data[idx + 2], data[idx + 3]]);
        let diff = values - mean_vec;
        sum_sq += diff * diff;
    }

    let mut result = sum_sq.reduce_add();

    for &value in &data[(chunks * 4)..] {
        let diff = value - mean;
        result += diff * diff;
    }

    (result / len as f64).sqrt()
}

/// SIMD-optimized min/max finder.
pub fn minmax_simd(data: &[f64]) -> Option<(f64, f64)> {
    if data.is_empty() {
        return None;
    }

    let chunks = data.len() / 4;
    let mut min_vec = f64x4::splat(f64::INFINITY);
    let mut max_vec = f64x4::splat(f64::NEG_INFINITY);

    for i in 0..chunks {
        let idx = i * 4;
        let values = f64x4::new([data[idx], data[idx + 1], data[idx + 2], data[idx + 3]]);
        min_vec = min_vec.min(values);
        max_vec = max_vec.max(values);
    }

    let min_arr = min_vec.to_array();
    let max_arr = max_vec.to_array();

    let mut min = min_arr[0].min(min_arr[1]).min(min_arr[2]).min(min_arr[3]);
    let mut max = max_arr[0].max(max_arr[1]).max(max_arr[2]).max(max_arr[3]);

    for &value in &data[(chunks * 4)..] {
        min = min.min(value);
        max = max.max(value);
    }

    Some((min, max))
}

/// Trailing window means, aligned with `data`.
///
/// Each window is summed from scratch, so the value at `i` depends only on
/// `data[i + 1 - period..=i]` and never accumulates drift from earlier bars.
pub fn rolling_mean(data: &[f64], period: usize) -> Vec<Option<f64>> {
    (0..data.len())
        .map(|i| {
            if period == 0 || i + 1 < period {
                None
            } else {
                mean_simd(&data[i + 1 - period..=i])
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum_simd_with_remainder() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0];
        assert!((sum_simd(&data) - 28.0).abs() < 1e-10);
        assert_eq!(sum_simd(&[]), 0.0);
    }

    #[test]
    fn test_std_dev_simd() {
        let data = vec![2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let mean = mean_simd(&data).unwrap();
        assert!((mean - 5.0).abs() < 1e-10);
        assert!((std_dev_simd(&data, mean) - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_minmax_simd() {
        let data = vec![5.0, 2.0, 8.0, 1.0, 9.0, 3.0];
        let (min, max) = minmax_simd(&data).unwrap();

        assert_eq!(min, 1.0);
        assert_eq!(max, 9.0);
        assert!(minmax_simd(&[]).is_none());
    }

    #[test]
    fn test_rolling_mean_alignment() {
        let data = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let result = rolling_mean(&data, 3);

        assert_eq!(result.len(), 10);
        assert!(result[0].is_none() && result[1].is_none());
        assert!((result[2].unwrap() - 2.0).abs() < 1e-10);
        assert!((result[9].unwrap() - 9.0).abs() < 1e-10);
    }
}
