use crate::calibration::RoutingThresholds;
use crate::record::SpecimenRecord;

/// Thread-safe hooks for progress display.
///
/// All methods have default no-op implementations.
pub trait RunObserver: Send + Sync {
    /// A calibration sample was collected.
    fn calibration_progress(&self, _collected: usize, _target: usize) {}

    fn calibration_complete(&self, _thresholds: &RoutingThresholds) {}

    /// A record was emitted for a positioned specimen.
    fn specimen(&self, _record: &SpecimenRecord) {}
}

/// Used when nobody is watching.
pub(crate) struct NoOpObserver;
impl RunObserver for NoOpObserver {}
