//! Manifold upkeep between runs: bubble clearing and tube flushing.

use std::time::Duration;

use tracing::{error, info};

use crate::error::Result;
use crate::hardware::{Clock, ValveActuator};

use super::control::ControlHandle;
use super::valves;

/// Granularity at which a maintenance wait notices a stop request.
const STOP_POLL: Duration = Duration::from_millis(100);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Maintenance {
    /// Alternate blow and suck, `half_cycle` each. With `cycles: None` it
    /// keeps going until stopped.
    ClearBubbles {
        cycles: Option<usize>,
        half_cycle: Duration,
    },
    /// Pressurise every line for `duration`.
    ClearTubes { duration: Duration },
}

impl Maintenance {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ClearBubbles { .. } => "clear_bubbles",
            Self::ClearTubes { .. } => "clear_tubes",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaintenanceReport {
    /// Completed blow/suck cycles. Always 0 for tube flushing.
    pub cycles: usize,
    /// A stop request ended the task early.
    pub interrupted: bool,
}

/// Run one maintenance task, then leave the valves safe whatever happened.
pub fn run_maintenance(
    task: Maintenance,
    actuator: &mut dyn ValveActuator,
    clock: &dyn Clock,
    control: &ControlHandle,
) -> Result<MaintenanceReport> {
    info!(task = task.name(), "Maintenance starting");
    let result = match task {
        Maintenance::ClearBubbles { cycles, half_cycle } => {
            clear_bubbles(cycles, half_cycle, actuator, clock, control)
        }
        Maintenance::ClearTubes { duration } => {
            actuator.execute(&valves::clear_tubes()).map(|()| MaintenanceReport {
                cycles: 0,
                interrupted: !wait(duration, clock, control),
            })
        }
    };
    if let Err(e) = actuator.execute(&valves::safe()) {
        error!(error = %e, "Failed to set valves safe");
        return result.and(Err(e));
    }
    if let Ok(report) = &result {
        info!(
            task = task.name(),
            cycles = report.cycles,
            interrupted = report.interrupted,
            "Maintenance finished"
        );
    }
    result
}

fn clear_bubbles(
    limit: Option<usize>,
    half_cycle: Duration,
    actuator: &mut dyn ValveActuator,
    clock: &dyn Clock,
    control: &ControlHandle,
) -> Result<MaintenanceReport> {
    let mut report = MaintenanceReport::default();
    while limit.map_or(true, |n| report.cycles < n) {
        if control.is_stopped() {
            report.interrupted = true;
            break;
        }
        actuator.execute(&valves::bubble_blow())?;
        if !wait(half_cycle, clock, control) {
            report.interrupted = true;
            break;
        }
        actuator.execute(&valves::bubble_suck())?;
        if !wait(half_cycle, clock, control) {
            report.interrupted = true;
            break;
        }
        report.cycles += 1;
    }
    Ok(report)
}

/// Sleep for `duration` in short slices. False when a stop cut it short.
fn wait(duration: Duration, clock: &dyn Clock, control: &ControlHandle) -> bool {
    let end = clock.now() + duration;
    loop {
        if control.is_stopped() {
            return false;
        }
        let now = clock.now();
        if now >= end {
            return true;
        }
        clock.sleep((end - now).min(STOP_POLL));
    }
}
