use ndarray::Array2;

use crate::stats::percentile_in_place;

/// Intensity at `pct` percent of `data`, floored to whole sensor counts.
pub fn percentile_threshold(data: &Array2<f32>, pct: f64) -> f32 {
    let mut values: Vec<f64> = data.iter().map(|&v| v as f64).collect();
    percentile_in_place(&mut values, pct)
        .map(|t| t.floor() as f32)
        .unwrap_or(0.0)
}

/// Percentile floor: pixels below the `pct` percentile become background,
/// pixels at or above it become foreground.
///
/// A zero-valued pixel is never foreground, so a frame identical to its
/// background yields an empty mask instead of a full one.
pub fn percentile_floor(data: &Array2<f32>, pct: f64) -> Array2<bool> {
    let threshold = percentile_threshold(data, pct);
    data.mapv(|v| v >= threshold && v > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_keeps_top_percent() {
        let data = Array2::from_shape_fn((10, 10), |(r, c)| (r * 10 + c) as f32);
        let mask = percentile_floor(&data, 99.0);
        // p99 of 0..=99 is 98.01, floored to 98.
        assert_eq!(mask.iter().filter(|&&m| m).count(), 2);
        assert!(mask[[9, 9]]);
        assert!(mask[[9, 8]]);
    }

    #[test]
    fn test_floor_of_blank_frame_is_empty() {
        let data = Array2::<f32>::zeros((8, 8));
        let mask = percentile_floor(&data, 99.0);
        assert!(mask.iter().all(|&m| !m));
    }
}
