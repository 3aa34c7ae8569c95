use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ndarray::Array2;
use tracing::trace;

use crate::error::{Result, SortError};
use crate::frame::Illumination;
use crate::segmentation::components::label_components;
use crate::segmentation::Connectivity;
use crate::stats::percentile;

use super::{Classifier, Metric, SpecimenView};

/// Counts discrete fluorescent aggregates inside the specimen.
///
/// Both thresholds are percentiles of the masked, background-subtracted
/// channel: pixels at or above `low_percentile` form the flood region and
/// pixels at or above `high_percentile` seed one basin each.
pub struct AggregateClassifier {
    pub channel: Illumination,
    pub low_percentile: f64,
    pub high_percentile: f64,
    pub connectivity: Connectivity,
}

impl Classifier for AggregateClassifier {
    fn name(&self) -> &'static str {
        "aggregates"
    }

    fn channels(&self) -> Vec<Illumination> {
        vec![self.channel]
    }

    fn extract_metric(&self, view: &SpecimenView) -> Result<Metric> {
        let image = &view.channel(self.channel)?.subtracted;
        let mask = view.mask.mask();
        if image.dim() != mask.dim() {
            return Err(SortError::ShapeMismatch {
                expected: mask.dim(),
                actual: image.dim(),
            });
        }
        let sampled = mask.indexed_iter().map(|((r, c), &m)| m && view.sampling.contains(r, c));
        let region = Array2::from_shape_vec(mask.dim(), sampled.collect())
            .map_err(|e| SortError::InvalidConfig(e.to_string()))?;
        if !region.iter().any(|&m| m) {
            return Ok(Metric::default());
        }

        let (count, _) = count_aggregates(
            image,
            &region,
            self.low_percentile,
            self.high_percentile,
            self.connectivity,
        );
        Ok(Metric::scalar(count as f64))
    }

    fn record_fields(&self) -> Vec<String> {
        vec!["aggregates".into()]
    }
}

/// Heap entry for the priority flood. Brighter pixels pop first; ties go to
/// the earlier push so the result does not depend on heap internals.
#[derive(PartialEq)]
struct FloodEntry {
    value: f32,
    order: u64,
    row: usize,
    col: usize,
    label: u32,
}

impl Eq for FloodEntry {}

impl Ord for FloodEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value
            .total_cmp(&other.value)
            .then_with(|| other.order.cmp(&self.order))
    }
}

impl PartialOrd for FloodEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Marker-based watershed over `image` restricted to `mask`.
///
/// Returns the number of basins and the basin label image (0 outside every
/// basin). Seeds are connected components of the high-threshold pixels; each
/// one floods downhill through the low-threshold region until basins meet.
pub fn count_aggregates(
    image: &Array2<f32>,
    mask: &Array2<bool>,
    low_percentile: f64,
    high_percentile: f64,
    connectivity: Connectivity,
) -> (usize, Array2<u32>) {
    let dim = image.dim();
    let values: Vec<f32> = mask
        .iter()
        .zip(image.iter())
        .filter_map(|(&m, &v)| m.then_some(v))
        .collect();
    let (Some(low), Some(high)) = (
        percentile(&values, low_percentile),
        percentile(&values, high_percentile),
    ) else {
        return (0, Array2::zeros(dim));
    };

    let region = Array2::from_shape_fn(dim, |(r, c)| {
        mask[[r, c]] && image[[r, c]] as f64 >= low && image[[r, c]] > 0.0
    });
    let seeds = Array2::from_shape_fn(dim, |(r, c)| region[[r, c]] && image[[r, c]] as f64 >= high);
    let seed_labels = label_components(&seeds, connectivity);
    let basins = seed_labels.components.len();
    if basins == 0 {
        return (0, Array2::zeros(dim));
    }

    let mut labels = seed_labels.labels;
    let mut heap = BinaryHeap::new();
    let mut order = 0u64;
    for ((row, col), &label) in labels.indexed_iter() {
        if label != 0 {
            heap.push(FloodEntry {
                value: image[[row, col]],
                order,
                row,
                col,
                label,
            });
            order += 1;
        }
    }

    while let Some(entry) = heap.pop() {
        for (nr, nc) in neighbours(entry.row, entry.col, dim, connectivity) {
            if region[[nr, nc]] && labels[[nr, nc]] == 0 {
                labels[[nr, nc]] = entry.label;
                heap.push(FloodEntry {
                    value: image[[nr, nc]],
                    order,
                    row: nr,
                    col: nc,
                    label: entry.label,
                });
                order += 1;
            }
        }
    }

    trace!(basins, low, high, "Aggregate watershed");
    (basins, labels)
}

fn neighbours(
    row: usize,
    col: usize,
    (h, w): (usize, usize),
    connectivity: Connectivity,
) -> impl Iterator<Item = (usize, usize)> {
    const EDGE: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];
    const CORNER: [(i64, i64); 4] = [(-1, -1), (-1, 1), (1, -1), (1, 1)];
    let corners: &[(i64, i64)] = match connectivity {
        Connectivity::Four => &[],
        Connectivity::Eight => &CORNER,
    };
    EDGE.iter()
        .chain(corners.iter())
        .filter_map(move |&(dr, dc)| {
            let nr = row as i64 + dr;
            let nc = col as i64 + dc;
            (nr >= 0 && nc >= 0 && nr < h as i64 && nc < w as i64).then_some((nr as usize, nc as usize))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat specimen body with Gaussian-ish bright spots at `spots`.
    fn spotted(spots: &[(usize, usize)]) -> (Array2<f32>, Array2<bool>) {
        let mask = Array2::from_shape_fn((40, 40), |(r, c)| (5..35).contains(&r) && (5..35).contains(&c));
        let image = Array2::from_shape_fn((40, 40), |(r, c)| {
            let mut v = if mask[[r, c]] { 10.0 } else { 0.0 };
            for &(sr, sc) in spots {
                let d2 = (r as f32 - sr as f32).powi(2) + (c as f32 - sc as f32).powi(2);
                v += 500.0 * (-d2 / 4.0).exp();
            }
            v
        });
        (image, mask)
    }

    #[test]
    fn test_counts_separate_spots() {
        let (image, mask) = spotted(&[(10, 10), (10, 28), (28, 18)]);
        let (count, labels) = count_aggregates(&image, &mask, 97.0, 99.5, Connectivity::Four);
        assert_eq!(count, 3);
        assert_ne!(labels[[10, 10]], labels[[10, 28]]);
        assert_ne!(labels[[10, 28]], labels[[28, 18]]);
    }

    #[test]
    fn test_empty_mask_has_no_aggregates() {
        let image = Array2::from_elem((8, 8), 5.0f32);
        let mask = Array2::from_elem((8, 8), false);
        let (count, _) = count_aggregates(&image, &mask, 99.0, 99.99, Connectivity::Four);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_flood_stays_inside_region() {
        let (image, mask) = spotted(&[(20, 20)]);
        let (_, labels) = count_aggregates(&image, &mask, 90.0, 99.9, Connectivity::Eight);
        assert_eq!(labels[[0, 0]], 0);
        assert_eq!(labels[[6, 6]], 0, "flat body pixels are below the low percentile");
    }
}
