use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use flowsort_core::calibration::RoutingThresholds;
use flowsort_core::controller::{ControlHandle, Devices, RunObserver, SortController};
use flowsort_core::hardware::{LogNotifier, Notifier, SystemClock, ValveActuator};
use flowsort_core::io::{FileNotifier, LineValveActuator, ReplayFrameSource, RunDirectoryRecorder};
use flowsort_core::record::SpecimenRecord;

use super::load_config;
use crate::summary::{print_run_header, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Directory of saved frames to replay (brightfield images, plus optional
    /// `cyan/` and `green_yellow/` subdirectories)
    #[arg(long)]
    pub replay: PathBuf,

    /// Sort config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Parent directory for the timestamped run directory
    #[arg(short, long, default_value = "runs")]
    pub output: PathBuf,

    /// Write valve commands to this file instead of stdout
    #[arg(long)]
    pub valves: Option<PathBuf>,

    /// Append operator alerts to this file instead of only logging them
    #[arg(long)]
    pub alerts: Option<PathBuf>,

    /// Override the number of calibration samples
    #[arg(long)]
    pub calibrate: Option<usize>,

    /// Stop after this many specimens
    #[arg(long)]
    pub max_specimens: Option<u64>,

    /// Do not save per-specimen images
    #[arg(long)]
    pub no_images: bool,
}

/// Drives the calibration progress bar and the optional specimen limit.
struct ProgressObserver {
    bar: ProgressBar,
    control: ControlHandle,
    limit: Option<u64>,
    seen: AtomicU64,
}

impl RunObserver for ProgressObserver {
    fn calibration_progress(&self, collected: usize, target: usize) {
        self.bar.set_length(target as u64);
        self.bar.set_position(collected as u64);
    }

    fn calibration_complete(&self, thresholds: &RoutingThresholds) {
        self.bar.finish_with_message(format!(
            "lower {:.2}, upper {:.2}",
            thresholds.lower, thresholds.upper
        ));
    }

    fn specimen(&self, _record: &SpecimenRecord) {
        let seen = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        if self.limit.is_some_and(|limit| seen >= limit) {
            info!(specimens = seen, "Specimen limit reached");
            self.control.stop();
        }
    }
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(samples) = args.calibrate {
        config.calibration.sample_count = samples;
        config.calibration.min_samples = config.calibration.min_samples.min(samples);
    }
    config.validate().context("Invalid sort config")?;

    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
    let run_dir = args.output.join(format!("run_{stamp}"));
    let mut recorder = RunDirectoryRecorder::create(&run_dir)
        .with_context(|| format!("Failed to create run directory {}", run_dir.display()))?;
    if args.no_images {
        recorder = recorder.without_specimen_images();
    }
    std::fs::write(run_dir.join("config.toml"), toml::to_string_pretty(&config)?)
        .context("Failed to save run config")?;

    let camera = ReplayFrameSource::open(&args.replay)
        .with_context(|| format!("Failed to open replay directory {}", args.replay.display()))?;
    let valves: Box<dyn ValveActuator> = match &args.valves {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(LineValveActuator::new(BufWriter::new(file), config.valves.clone()))
        }
        None => Box::new(LineValveActuator::new(std::io::stdout(), config.valves.clone())),
    };
    let notifier: Box<dyn Notifier> = match &args.alerts {
        Some(path) => Box::new(FileNotifier::new(path)),
        None => Box::new(LogNotifier),
    };

    print_run_header(&config, &args.replay, &run_dir);

    let control = ControlHandle::new();
    let handle = control.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        handle.stop();
    })
    .context("Failed to install Ctrl-C handler")?;

    let calibrating = config.classifier.build().uses_thresholds() && !config.calibration.is_fixed();
    let bar = if calibrating {
        let bar = ProgressBar::new(config.calibration.sample_count as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:20} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        bar.set_message("Calibrating");
        bar
    } else {
        ProgressBar::hidden()
    };
    let observer = Arc::new(ProgressObserver {
        bar: bar.clone(),
        control: control.clone(),
        limit: args.max_specimens,
        seen: AtomicU64::new(0),
    });

    let devices = Devices {
        camera: Box::new(camera),
        valves,
        notifier,
        recorder: Box::new(recorder),
        clock: Arc::new(SystemClock::new()),
    };
    let mut controller = SortController::new(config, devices, control)?.with_observer(observer);
    let result = controller.run();
    if !bar.is_finished() {
        bar.abandon();
    }
    let summary = result?;

    print_run_summary(&summary, &run_dir);
    Ok(())
}
