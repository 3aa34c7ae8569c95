use std::time::Duration;

use crate::frame::Frame;
use crate::record::{Direction, SpecimenRecord};

use super::watchdog::ClearanceWatchdog;

/// Sort controller state. One loop iteration captures one brightfield frame
/// and makes at most one transition.
#[derive(Clone, Debug)]
pub enum SortState {
    /// Input open, waiting for a detection (or, with a queue window, for a
    /// queued specimen).
    Loading,
    /// Relief pressurised behind a queued specimen until it reaches the
    /// detection window or the push times out.
    Pushing { since: Duration },
    /// Input just closed behind a specimen.
    Detected { detected_at: Duration },
    /// Waiting for the specimen to stop moving.
    Positioning {
        previous: Frame,
        detected_at: Duration,
    },
    /// Specimen classified, outlet chosen.
    Actuating { direction: Direction },
    /// Waiting for the specimen to leave the window.
    Clearing {
        direction: Direction,
        watchdog: ClearanceWatchdog,
    },
}

impl SortState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Loading => "loading",
            Self::Pushing { .. } => "pushing",
            Self::Detected { .. } => "detected",
            Self::Positioning { .. } => "positioning",
            Self::Actuating { .. } => "actuating",
            Self::Clearing { .. } => "clearing",
        }
    }
}

/// What happened in one loop iteration.
#[derive(Clone, Debug, PartialEq)]
pub enum StepOutcome {
    /// Nothing in view.
    Idle,
    /// Specimen waiting in the queue window; push started.
    Queued,
    /// Push under way, specimen not yet in the detection window.
    Pushing,
    Detected,
    /// Specimen still moving.
    Positioning,
    /// Specimen vanished before it settled. No record.
    Lost,
    /// Specimen positioned and classified.
    Processed(SpecimenRecord),
    Actuated(Direction),
    /// Still in view after actuation.
    Clearing,
    ClearRetry,
    Cleared,
    /// Clearance gave up: alert sent, background rebuilt, treated as cleared.
    StuckReset,
    /// Operator clear handled.
    ForcedClear,
    Paused,
    Stopped,
}
