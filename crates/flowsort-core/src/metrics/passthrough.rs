use crate::calibration::RoutingThresholds;
use crate::error::Result;
use crate::record::Direction;

use super::{Classifier, Metric, SpecimenView};

/// Sends everything straight. Useful for counting and for priming the device.
pub struct NoSortClassifier;

impl Classifier for NoSortClassifier {
    fn name(&self) -> &'static str {
        "no_sort"
    }

    fn uses_thresholds(&self) -> bool {
        false
    }

    fn extract_metric(&self, _view: &SpecimenView) -> Result<Metric> {
        Ok(Metric::default())
    }

    fn decide_direction(
        &self,
        _metric: &Metric,
        _thresholds: Option<&RoutingThresholds>,
        _sequence: u64,
    ) -> Direction {
        Direction::Straight
    }

    fn record_fields(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Cycles straight, up, down by sequence number. Exercises every outlet.
pub struct AlternateClassifier;

impl Classifier for AlternateClassifier {
    fn name(&self) -> &'static str {
        "alternate"
    }

    fn uses_thresholds(&self) -> bool {
        false
    }

    fn extract_metric(&self, _view: &SpecimenView) -> Result<Metric> {
        Ok(Metric::default())
    }

    fn decide_direction(
        &self,
        _metric: &Metric,
        _thresholds: Option<&RoutingThresholds>,
        sequence: u64,
    ) -> Direction {
        match sequence % 3 {
            0 => Direction::Straight,
            1 => Direction::Up,
            _ => Direction::Down,
        }
    }

    fn record_fields(&self) -> Vec<String> {
        Vec::new()
    }
}
