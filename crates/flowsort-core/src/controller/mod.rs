pub mod control;
mod machine;
pub mod maintenance;
pub mod observer;
pub mod state;
pub mod summary;
pub mod valves;
pub mod watchdog;

pub use control::ControlHandle;
pub use machine::{Devices, SortController};
pub use maintenance::{run_maintenance, Maintenance, MaintenanceReport};
pub use observer::RunObserver;
pub use state::{SortState, StepOutcome};
pub use summary::RunSummary;
