use ndarray::{s, Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::consts::DEFAULT_IMAGE_SIZE;
use crate::error::{Result, SortError};

/// Rectangular region of interest in frame coordinates.
///
/// Rows and columns are half-open: `row_start..row_end`, `col_start..col_end`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roi {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}

impl Roi {
    pub const fn new(row_start: usize, row_end: usize, col_start: usize, col_end: usize) -> Self {
        Self {
            row_start,
            row_end,
            col_start,
            col_end,
        }
    }

    pub fn height(&self) -> usize {
        self.row_end.saturating_sub(self.row_start)
    }

    pub fn width(&self) -> usize {
        self.col_end.saturating_sub(self.col_start)
    }

    pub fn area(&self) -> usize {
        self.height() * self.width()
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.row_start..self.row_end).contains(&row) && (self.col_start..self.col_end).contains(&col)
    }

    /// Borrow the ROI window of `data`, clipped to the array bounds.
    pub fn view<'a, T>(&self, data: &'a Array2<T>) -> ArrayView2<'a, T> {
        let (h, w) = data.dim();
        let r0 = self.row_start.min(h);
        let r1 = self.row_end.min(h).max(r0);
        let c0 = self.col_start.min(w);
        let c1 = self.col_end.min(w).max(c0);
        data.slice(s![r0..r1, c0..c1])
    }

    fn validate(&self, name: &str, image_size: (usize, usize)) -> Result<()> {
        if self.row_start >= self.row_end || self.col_start >= self.col_end {
            return Err(SortError::InvalidConfig(format!("ROI `{name}` is empty or inverted")));
        }
        if self.row_end > image_size.0 || self.col_end > image_size.1 {
            return Err(SortError::InvalidConfig(format!(
                "ROI `{name}` extends past the {}x{} image",
                image_size.0, image_size.1
            )));
        }
        Ok(())
    }
}

/// Fixed optical geometry of one rig. Set once per device and never mutated
/// during a run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeviceGeometry {
    /// Frame shape as (rows, cols).
    #[serde(default = "default_image_size")]
    pub image_size: (usize, usize),
    /// Window watched for a specimen entering the viewing area.
    #[serde(default = "default_detection")]
    pub detection: Roi,
    /// Window watched while the specimen settles.
    #[serde(default = "default_position")]
    pub position: Roi,
    /// Window that must return to background after actuation.
    #[serde(default = "default_position")]
    pub clearing: Roi,
    /// Window from which fluorescence is sampled.
    #[serde(default = "default_position")]
    pub fluorescence_sampling: Roi,
    /// The channel itself; pixels outside it never belong to a specimen.
    /// Set it to the full frame to disable.
    #[serde(default = "default_channel")]
    pub channel: Roi,
    /// Additional permanently excluded rectangles (tubing shadows, fixtures).
    #[serde(default)]
    pub exclusion: Vec<Roi>,
    /// Upstream queue window. When set, loading waits for a queued specimen
    /// and pushes it in instead of watching the detection window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<Roi>,
}

fn default_image_size() -> (usize, usize) {
    DEFAULT_IMAGE_SIZE
}
fn default_detection() -> Roi {
    Roi::new(100, 950, 535, 585)
}
fn default_position() -> Roi {
    Roi::new(100, 640, 535, 585)
}
fn default_channel() -> Roi {
    Roi::new(100, 750, 530, 590)
}

impl Default for DeviceGeometry {
    fn default() -> Self {
        Self {
            image_size: DEFAULT_IMAGE_SIZE,
            detection: default_detection(),
            position: default_position(),
            clearing: default_position(),
            fluorescence_sampling: default_position(),
            channel: default_channel(),
            exclusion: Vec::new(),
            queue: None,
        }
    }
}

impl DeviceGeometry {
    /// Build the permanent exclusion mask: `true` marks a pixel that is never
    /// considered part of a specimen.
    pub fn exclusion_mask(&self) -> Array2<bool> {
        let (h, w) = self.image_size;
        Array2::from_shape_fn((h, w), |(row, col)| {
            !self.channel.contains(row, col) || self.exclusion.iter().any(|r| r.contains(row, col))
        })
    }

    pub fn validate(&self) -> Result<()> {
        let (h, w) = self.image_size;
        if h == 0 || w == 0 {
            return Err(SortError::InvalidConfig(format!("image size {h}x{w}")));
        }
        self.detection.validate("detection", self.image_size)?;
        self.position.validate("position", self.image_size)?;
        self.clearing.validate("clearing", self.image_size)?;
        self.fluorescence_sampling
            .validate("fluorescence_sampling", self.image_size)?;
        self.channel.validate("channel", self.image_size)?;
        for roi in &self.exclusion {
            roi.validate("exclusion", self.image_size)?;
        }
        if let Some(queue) = &self.queue {
            queue.validate("queue", self.image_size)?;
        }
        Ok(())
    }
}
