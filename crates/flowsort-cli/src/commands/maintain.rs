use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tracing::info;

use flowsort_core::consts::DEFAULT_BUBBLE_HALF_CYCLE_MS;
use flowsort_core::controller::{run_maintenance, ControlHandle, Maintenance};
use flowsort_core::hardware::{SystemClock, ValveActuator};
use flowsort_core::io::LineValveActuator;

use super::load_config;
use crate::summary::print_maintenance_report;

#[derive(Clone, ValueEnum)]
pub enum TaskArg {
    /// Alternate blowing and sucking to dislodge bubbles
    Bubbles,
    /// Pressurise every line to flush debris
    Tubes,
}

#[derive(Args)]
pub struct MaintainArgs {
    /// Maintenance task
    #[arg(value_enum)]
    pub task: TaskArg,

    /// Sort config file (TOML), used for the valve pin map
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Write valve commands to this file instead of stdout
    #[arg(long)]
    pub valves: Option<PathBuf>,

    /// Blow/suck cycles to run (default: until Ctrl-C)
    #[arg(long)]
    pub cycles: Option<usize>,

    /// Length of each blow and suck half-cycle in milliseconds
    #[arg(long, default_value_t = DEFAULT_BUBBLE_HALF_CYCLE_MS)]
    pub half_cycle_ms: u64,

    /// How long to hold pressure when flushing tubes, in seconds
    #[arg(long, default_value = "5")]
    pub seconds: u64,
}

pub fn run(args: &MaintainArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    config.validate().context("Invalid sort config")?;

    let mut valves: Box<dyn ValveActuator> = match &args.valves {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Box::new(LineValveActuator::new(BufWriter::new(file), config.valves.clone()))
        }
        None => Box::new(LineValveActuator::new(std::io::stdout(), config.valves.clone())),
    };

    let control = ControlHandle::new();
    let handle = control.clone();
    ctrlc::set_handler(move || {
        info!("Shutdown signal received");
        handle.stop();
    })
    .context("Failed to install Ctrl-C handler")?;

    let task = match args.task {
        TaskArg::Bubbles => Maintenance::ClearBubbles {
            cycles: args.cycles,
            half_cycle: Duration::from_millis(args.half_cycle_ms),
        },
        TaskArg::Tubes => Maintenance::ClearTubes {
            duration: Duration::from_secs(args.seconds),
        },
    };
    let report = run_maintenance(task, valves.as_mut(), &SystemClock::new(), &control)?;

    print_maintenance_report(&task, &report);
    Ok(())
}
