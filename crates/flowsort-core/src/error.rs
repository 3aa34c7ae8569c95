use thiserror::Error;

use crate::frame::Illumination;

#[derive(Error, Debug)]
pub enum SortError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Frame capture failed: {0}")]
    Capture(String),

    #[error("Valve actuation failed: {0}")]
    Actuation(String),

    #[error("Calibration sample set is empty")]
    EmptyCalibration,

    #[error("Not enough calibration samples: have {have}, need {need}")]
    InsufficientSamples { have: usize, need: usize },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Frame shape mismatch: {expected:?} vs {actual:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },

    #[error("No background reference for {0} illumination")]
    MissingReference(Illumination),
}

impl SortError {
    /// Faults in the camera or valve link. These are the only errors allowed
    /// to terminate the control loop.
    pub fn is_hardware_fault(&self) -> bool {
        matches!(self, Self::Capture(_) | Self::Actuation(_) | Self::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, SortError>;
