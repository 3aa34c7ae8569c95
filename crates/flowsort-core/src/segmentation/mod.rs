pub mod components;
pub mod config;
mod engine;
pub mod morphology;
pub mod threshold;

pub use config::{Connectivity, SegmentationConfig};
pub use engine::{SegmentationEngine, SpecimenMask};
