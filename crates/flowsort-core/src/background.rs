use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2, Zip};
use tracing::{debug, info};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{Result, SortError};
use crate::frame::{Frame, Illumination};
use crate::geometry::{DeviceGeometry, Roi};

/// Sensor-noise baselines for the three watched regions: the ROI pixel sum of
/// |a - b| for two consecutive empty brightfield captures.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoiseBaselines {
    pub detection: f64,
    pub position: f64,
    pub clearing: f64,
}

/// Reference frames per illumination channel plus the noise baselines.
///
/// Owned by the sort controller. A refresh replaces the whole model.
#[derive(Clone, Debug)]
pub struct BackgroundModel {
    references: BTreeMap<Illumination, Frame>,
    noise: NoiseBaselines,
}

impl BackgroundModel {
    pub fn from_parts(references: Vec<Frame>, noise: NoiseBaselines) -> Self {
        let references = references
            .into_iter()
            .map(|f| (f.illumination(), f))
            .collect();
        Self { references, noise }
    }

    /// Capture a fresh model with no specimen in view.
    ///
    /// Two brightfield frames give the noise baselines; the second one becomes
    /// the brightfield reference. Every other channel in `channels` gets one
    /// reference capture.
    pub fn build<F>(geometry: &DeviceGeometry, channels: &[Illumination], mut capture: F) -> Result<Self>
    where
        F: FnMut(Illumination) -> Result<Frame>,
    {
        let first = capture(Illumination::Brightfield)?;
        let second = capture(Illumination::Brightfield)?;
        check_shape(&first, &second)?;

        let (a, b) = (first.data(), second.data());
        let (detection, (position, clearing)) = rayon::join(
            || roi_abs_diff_sum(a, b, &geometry.detection),
            || {
                rayon::join(
                    || roi_abs_diff_sum(a, b, &geometry.position),
                    || roi_abs_diff_sum(a, b, &geometry.clearing),
                )
            },
        );
        let noise = NoiseBaselines {
            detection,
            position,
            clearing,
        };
        debug!(
            detection = noise.detection,
            position = noise.position,
            clearing = noise.clearing,
            "Noise baselines"
        );

        let mut references = BTreeMap::new();
        references.insert(Illumination::Brightfield, second);
        for &channel in channels {
            if references.contains_key(&channel) {
                continue;
            }
            let frame = capture(channel)?;
            check_shape(&frame, &references[&Illumination::Brightfield])?;
            references.insert(channel, frame);
        }

        info!(channels = references.len(), "Background model captured");
        Ok(Self { references, noise })
    }

    pub fn noise(&self) -> &NoiseBaselines {
        &self.noise
    }

    pub fn reference(&self, illumination: Illumination) -> Result<&Frame> {
        self.references
            .get(&illumination)
            .ok_or(SortError::MissingReference(illumination))
    }

    pub fn references(&self) -> impl Iterator<Item = &Frame> {
        self.references.values()
    }

    /// |frame - reference| for the frame's own channel.
    pub fn difference(&self, frame: &Frame) -> Result<Array2<f32>> {
        let reference = self.reference(frame.illumination())?;
        check_shape(frame, reference)?;
        Ok(abs_difference(frame.data(), reference.data()))
    }

    /// max(frame - reference, 0) for the frame's own channel. Used for
    /// fluorescence, where only added signal is meaningful.
    pub fn subtract_clamped(&self, frame: &Frame) -> Result<Array2<f32>> {
        let reference = self.reference(frame.illumination())?;
        check_shape(frame, reference)?;
        Ok(zip_map(frame.data(), reference.data(), |a, b| (a - b).max(0.0)))
    }

    /// ROI sum of |frame - reference| over `roi`.
    pub fn roi_difference(&self, frame: &Frame, roi: &Roi) -> Result<f64> {
        let reference = self.reference(frame.illumination())?;
        check_shape(frame, reference)?;
        Ok(roi_abs_diff_sum(frame.data(), reference.data(), roi))
    }
}

/// Pixel sum of |a - b| over `roi`, accumulated in f64.
pub fn roi_abs_diff_sum(a: &Array2<f32>, b: &Array2<f32>, roi: &Roi) -> f64 {
    sum_abs_diff(roi.view(a), roi.view(b))
}

fn sum_abs_diff(a: ArrayView2<f32>, b: ArrayView2<f32>) -> f64 {
    let mut total = 0.0_f64;
    Zip::from(&a).and(&b).for_each(|&x, &y| total += (x - y).abs() as f64);
    total
}

/// Whole-frame |a - b|.
pub fn abs_difference(a: &Array2<f32>, b: &Array2<f32>) -> Array2<f32> {
    zip_map(a, b, |x, y| (x - y).abs())
}

fn zip_map(a: &Array2<f32>, b: &Array2<f32>, f: impl Fn(f32, f32) -> f32 + Sync + Send) -> Array2<f32> {
    let zip = Zip::from(a).and(b);
    if a.len() >= PARALLEL_PIXEL_THRESHOLD {
        zip.par_map_collect(|&x, &y| f(x, y))
    } else {
        zip.map_collect(|&x, &y| f(x, y))
    }
}

pub(crate) fn check_shape(a: &Frame, b: &Frame) -> Result<()> {
    if a.dim() != b.dim() {
        return Err(SortError::ShapeMismatch {
            expected: b.dim(),
            actual: a.dim(),
        });
    }
    Ok(())
}
