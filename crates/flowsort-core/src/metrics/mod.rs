//! Sort-parameter extraction, one strategy per assay.
//!
//! The sort controller is a single loop parameterised by a [`Classifier`]:
//! the classifier names the extra channels it needs, turns a mask plus those
//! channel images into a [`Metric`], runs its own health checks, and picks a
//! direction from the metric and the current routing thresholds.

pub mod aggregates;
pub mod config;
pub mod fluorescence;
pub mod passthrough;
pub mod shape;

use ndarray::Array2;

use crate::calibration::RoutingThresholds;
use crate::error::{Result, SortError};
use crate::frame::{Frame, Illumination};
use crate::geometry::Roi;
use crate::record::{Direction, RejectReason};
use crate::segmentation::SpecimenMask;

pub use config::ClassifierConfig;

/// Scalar or vector sort parameter. The first value is the one that feeds
/// calibration and threshold routing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Metric {
    pub values: Vec<f64>,
}

impl Metric {
    pub fn scalar(value: f64) -> Self {
        Self {
            values: vec![value],
        }
    }

    pub fn primary(&self) -> Option<f64> {
        self.values.first().copied()
    }
}

/// A fluorescence capture and its background-subtracted, non-negative copy.
#[derive(Clone, Debug)]
pub struct ChannelImage {
    pub frame: Frame,
    pub subtracted: Array2<f32>,
}

impl ChannelImage {
    pub fn illumination(&self) -> Illumination {
        self.frame.illumination()
    }
}

/// Everything a classifier may look at for one positioned specimen.
pub struct SpecimenView<'a> {
    pub sequence: u64,
    pub mask: &'a SpecimenMask,
    pub channels: &'a [ChannelImage],
    /// Fluorescence is only sampled inside this window.
    pub sampling: Roi,
}

impl SpecimenView<'_> {
    pub fn channel(&self, illumination: Illumination) -> Result<&ChannelImage> {
        self.channels
            .iter()
            .find(|c| c.illumination() == illumination)
            .ok_or(SortError::MissingReference(illumination))
    }

    /// Subtracted pixel values of `illumination` under the mask and inside the
    /// sampling window.
    pub fn masked_values(&self, illumination: Illumination) -> Result<Vec<f32>> {
        let image = &self.channel(illumination)?.subtracted;
        let mask = self.mask.mask();
        if image.dim() != mask.dim() {
            return Err(SortError::ShapeMismatch {
                expected: mask.dim(),
                actual: image.dim(),
            });
        }
        Ok(mask
            .indexed_iter()
            .filter(|&((r, c), &m)| m && self.sampling.contains(r, c))
            .map(|((r, c), _)| image[[r, c]])
            .collect())
    }
}

/// Pluggable assay strategy driven by the sort controller.
pub trait Classifier: Send {
    fn name(&self) -> &'static str;

    /// Fluorescence channels to capture once the specimen is positioned.
    fn channels(&self) -> Vec<Illumination> {
        Vec::new()
    }

    /// Whether routing uses calibrated thresholds. Classifiers that route on
    /// their own fixed rules skip the calibration phase.
    fn uses_thresholds(&self) -> bool {
        true
    }

    /// Metric values in `record_fields` order. Fewer values than fields
    /// means the specimen could not be measured.
    fn extract_metric(&self, view: &SpecimenView) -> Result<Metric>;

    /// Health checks beyond size, in the classifier's fixed order.
    fn reject_checks(&self, _view: &SpecimenView, _metric: &Metric) -> Option<RejectReason> {
        None
    }

    fn decide_direction(
        &self,
        metric: &Metric,
        thresholds: Option<&RoutingThresholds>,
        _sequence: u64,
    ) -> Direction {
        route_by_thresholds(metric.primary(), thresholds)
    }

    /// Column names for the metric values, in order.
    fn record_fields(&self) -> Vec<String>;
}

/// `up` at or above the upper threshold, `down` at or below the lower one,
/// otherwise `straight`. No thresholds or no value means `straight`.
pub fn route_by_thresholds(value: Option<f64>, thresholds: Option<&RoutingThresholds>) -> Direction {
    match (value, thresholds) {
        (Some(v), Some(t)) if v >= t.upper => Direction::Up,
        (Some(v), Some(t)) if v <= t.lower => Direction::Down,
        _ => Direction::Straight,
    }
}
