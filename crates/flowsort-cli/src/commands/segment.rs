use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use flowsort_core::background::{BackgroundModel, NoiseBaselines};
use flowsort_core::frame::Illumination;
use flowsort_core::geometry::Roi;
use flowsort_core::io::image_io::{load_frame, save_mask};
use flowsort_core::segmentation::SegmentationEngine;

use super::load_config;

#[derive(Args)]
pub struct SegmentArgs {
    /// Brightfield frame with a specimen in view
    pub frame: PathBuf,

    /// Brightfield background frame of the empty channel
    pub background: PathBuf,

    /// Sort config file (TOML); its geometry and segmentation sections are used
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output mask path (8-bit PNG)
    #[arg(short, long, default_value = "mask.png")]
    pub output: PathBuf,
}

pub fn run(args: &SegmentArgs) -> Result<()> {
    let frame = load_frame(&args.frame, Illumination::Brightfield)
        .with_context(|| format!("Failed to read {}", args.frame.display()))?;
    let reference = load_frame(&args.background, Illumination::Brightfield)
        .with_context(|| format!("Failed to read {}", args.background.display()))?;

    let mut config = load_config(args.config.as_deref())?;
    if args.config.is_none() {
        // No rig geometry given: the whole frame is channel.
        let (h, w) = frame.dim();
        config.geometry.image_size = (h, w);
        config.geometry.channel = Roi::new(0, h, 0, w);
    }

    let noise = NoiseBaselines {
        detection: 0.0,
        position: 0.0,
        clearing: 0.0,
    };
    let background = BackgroundModel::from_parts(vec![reference], noise);
    let difference = background.difference(&frame)?;
    let engine = SegmentationEngine::new(&config.geometry, &config.segmentation);
    let mask = engine.segment(&difference)?;

    save_mask(mask.mask(), &args.output)
        .with_context(|| format!("Failed to write mask to {}", args.output.display()))?;

    println!("Size:        {} px", mask.size());
    if let Some(component) = mask.component() {
        println!(
            "Bounding box: {}x{} at ({}, {})",
            component.bbox_height(),
            component.bbox_width(),
            component.bbox.0,
            component.bbox.2
        );
    }
    let limits = config.size;
    let verdict = if mask.size() > limits.max {
        "too large"
    } else if mask.size() < limits.min {
        "too small"
    } else {
        "within limits"
    };
    println!("Size limits: {}..={} ({verdict})", limits.min, limits.max);
    println!("Mask saved to {}", args.output.display());

    Ok(())
}
