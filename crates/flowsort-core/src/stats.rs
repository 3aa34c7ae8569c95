use num_traits::ToPrimitive;

/// Percentile with linear interpolation between closest ranks.
///
/// `pct` is in [0, 100]. Returns `None` for an empty input. Values that do not
/// convert to f64 (NaN-producing) are skipped.
pub fn percentile<T: ToPrimitive + Copy>(values: &[T], pct: f64) -> Option<f64> {
    let mut buf: Vec<f64> = values
        .iter()
        .filter_map(|v| v.to_f64())
        .filter(|v| !v.is_nan())
        .collect();
    percentile_in_place(&mut buf, pct)
}

/// Same as [`percentile`] but reorders `values` instead of copying.
pub fn percentile_in_place(values: &mut [f64], pct: f64) -> Option<f64> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let rank = pct.clamp(0.0, 100.0) / 100.0 * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    let frac = rank - lo as f64;

    let (_, lo_val, upper) = values.select_nth_unstable_by(lo, f64::total_cmp);
    let lo_val = *lo_val;
    if hi == lo {
        return Some(lo_val);
    }
    // hi == lo + 1, which is the minimum of the upper partition.
    let hi_val = upper.iter().copied().fold(f64::INFINITY, f64::min);
    Some(lo_val + (hi_val - lo_val) * frac)
}

pub fn median<T: ToPrimitive + Copy>(values: &[T]) -> Option<f64> {
    percentile(values, 50.0)
}

pub fn mean<T: ToPrimitive + Copy>(values: &[T]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().filter_map(|v| v.to_f64()).sum();
    Some(sum / values.len() as f64)
}
