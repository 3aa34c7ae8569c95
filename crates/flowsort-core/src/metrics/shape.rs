use crate::error::Result;
use crate::record::RejectReason;

use super::{Classifier, Metric, SpecimenView};

/// Routes on body length taken from the mask's bounding box.
///
/// Metric values: `[length, width, aspect_ratio]`. A curled specimen has a
/// short box and a low aspect ratio, and its length says nothing about its
/// true size, so it is rejected as bent.
pub struct LengthClassifier {
    pub min_aspect_ratio: f64,
}

impl Classifier for LengthClassifier {
    fn name(&self) -> &'static str {
        "length"
    }

    fn extract_metric(&self, view: &SpecimenView) -> Result<Metric> {
        let Some(component) = view.mask.component() else {
            return Ok(Metric::default());
        };
        let (h, w) = (component.bbox_height(), component.bbox_width());
        let length = h.max(w) as f64;
        let width = h.min(w) as f64;
        let aspect = if width > 0.0 { length / width } else { 0.0 };
        Ok(Metric {
            values: vec![length, width, aspect],
        })
    }

    fn reject_checks(&self, _view: &SpecimenView, metric: &Metric) -> Option<RejectReason> {
        match metric.values.get(2) {
            Some(&aspect) if aspect < self.min_aspect_ratio => Some(RejectReason::BentWorm),
            _ => None,
        }
    }

    fn record_fields(&self) -> Vec<String> {
        vec!["length".into(), "width".into(), "aspect_ratio".into()]
    }
}
