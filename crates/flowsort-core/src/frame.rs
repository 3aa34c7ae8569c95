use std::time::SystemTime;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Named lighting configuration used for a capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Illumination {
    /// Transmitted-light lamp. All motion detection and segmentation runs on it.
    Brightfield,
    /// Cyan excitation (GFP).
    Cyan,
    /// Green-yellow excitation (mCherry).
    GreenYellow,
}

impl Illumination {
    pub const ALL: [Illumination; 3] = [Self::Brightfield, Self::Cyan, Self::GreenYellow];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Brightfield => "brightfield",
            Self::Cyan => "cyan",
            Self::GreenYellow => "green_yellow",
        }
    }
}

impl std::fmt::Display for Illumination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single captured intensity image.
///
/// Pixel values are raw sensor counts (16-bit range) stored as f32 so that
/// differences and sums need no further conversion. A frame never changes
/// after capture; everything downstream works on borrowed views or copies.
#[derive(Clone, Debug)]
pub struct Frame {
    data: Array2<f32>,
    illumination: Illumination,
    captured_at: SystemTime,
}

impl Frame {
    pub fn new(data: Array2<f32>, illumination: Illumination) -> Self {
        Self::with_timestamp(data, illumination, SystemTime::now())
    }

    pub fn with_timestamp(
        data: Array2<f32>,
        illumination: Illumination,
        captured_at: SystemTime,
    ) -> Self {
        Self {
            data,
            illumination,
            captured_at,
        }
    }

    pub fn data(&self) -> &Array2<f32> {
        &self.data
    }

    pub fn illumination(&self) -> Illumination {
        self.illumination
    }

    pub fn captured_at(&self) -> SystemTime {
        self.captured_at
    }

    pub fn dim(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}
