use ndarray::Array2;
use tracing::debug;

use crate::error::{Result, SortError};
use crate::geometry::DeviceGeometry;

use super::components::{largest_component, ComponentStats};
use super::config::SegmentationConfig;
use super::morphology::{fill_holes, morphological_opening};
use super::threshold::percentile_floor;

/// Binary specimen mask for one specimen's processing.
#[derive(Clone, Debug, PartialEq)]
pub struct SpecimenMask {
    mask: Array2<bool>,
    size: usize,
    component: Option<ComponentStats>,
}

impl SpecimenMask {
    pub fn mask(&self) -> &Array2<bool> {
        &self.mask
    }

    /// Pixel count of the final mask.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Statistics of the retained blob, `None` when nothing was segmented.
    pub fn component(&self) -> Option<&ComponentStats> {
        self.component.as_ref()
    }

    /// Values of `image` under the mask.
    pub fn sample(&self, image: &Array2<f32>) -> Vec<f32> {
        self.mask
            .iter()
            .zip(image.iter())
            .filter_map(|(&m, &v)| m.then_some(v))
            .collect()
    }
}

/// Turns background-subtracted brightfield frames into specimen masks.
pub struct SegmentationEngine {
    config: SegmentationConfig,
    exclusion: Array2<bool>,
}

impl SegmentationEngine {
    pub fn new(geometry: &DeviceGeometry, config: &SegmentationConfig) -> Self {
        Self {
            config: config.clone(),
            exclusion: geometry.exclusion_mask(),
        }
    }

    pub fn config(&self) -> &SegmentationConfig {
        &self.config
    }

    /// Segment a background-subtracted frame.
    ///
    /// Pipeline: percentile floor -> exclusion -> largest component ->
    /// hole filling -> opening -> size. Deterministic for a fixed input and
    /// configuration.
    pub fn segment(&self, subtracted: &Array2<f32>) -> Result<SpecimenMask> {
        if subtracted.dim() != self.exclusion.dim() {
            return Err(SortError::ShapeMismatch {
                expected: self.exclusion.dim(),
                actual: subtracted.dim(),
            });
        }

        // Step 1: Percentile floor adapts to the frame's own brightness.
        let mut mask = percentile_floor(subtracted, self.config.percentile);

        // Step 2: Drop permanently excluded pixels.
        ndarray::Zip::from(&mut mask)
            .and(&self.exclusion)
            .for_each(|m, &excluded| *m &= !excluded);

        // Step 3: Keep the largest blob only.
        let (mask, _) = largest_component(&mask, self.config.connectivity);

        // Step 4: Solidify partially transparent bodies.
        let mut mask = fill_holes(&mask, self.config.max_hole_area, self.config.connectivity);

        // Step 5: Smooth the outline. Opening can split a thin blob, so the
        // largest piece is taken again (this also refreshes the stats after
        // hole filling).
        if self.config.smoothing_iterations > 0 {
            mask = morphological_opening(&mask, self.config.smoothing_iterations);
        }
        let (mask, component) = largest_component(&mask, self.config.connectivity);

        // Step 6: Size.
        let size = component.as_ref().map_or(0, |c| c.area);
        debug!(size, "Segmented specimen");

        Ok(SpecimenMask {
            mask,
            size,
            component,
        })
    }
}
