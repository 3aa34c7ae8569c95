use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::calibration::RoutingThresholds;
use crate::record::{Direction, Disposition, RejectReason, SpecimenRecord};

/// Totals for one run. Returned from the controller and written to the run
/// directory on shutdown.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunSummary {
    /// Specimens that reached the positioned state.
    pub specimens: u64,
    pub up: u64,
    pub straight: u64,
    pub down: u64,
    /// Specimens routed straight while seeding calibration.
    pub calibration: u64,
    pub rejected: BTreeMap<RejectReason, u64>,
    pub lost: u64,
    pub stuck_resets: u64,
    pub background_refreshes: u64,
    pub mean_interval: Option<Duration>,
    pub mean_positioning: Option<Duration>,
    pub thresholds: Option<RoutingThresholds>,
    pub run_time: Duration,
}

impl RunSummary {
    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().sum()
    }

    pub fn count(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Up => self.up,
            Direction::Straight => self.straight,
            Direction::Down => self.down,
        }
    }
}

/// Running accumulator behind [`RunSummary`].
#[derive(Clone, Debug, Default)]
pub(crate) struct SummaryBuilder {
    summary: RunSummary,
    interval_total: Duration,
    intervals: u32,
    positioning_total: Duration,
    positionings: u32,
}

impl SummaryBuilder {
    pub fn record(&mut self, record: &SpecimenRecord, positioning: Duration) {
        let s = &mut self.summary;
        s.specimens += 1;
        match record.direction {
            Direction::Up => s.up += 1,
            Direction::Straight => s.straight += 1,
            Direction::Down => s.down += 1,
        }
        match record.disposition {
            Disposition::Calibration => s.calibration += 1,
            Disposition::Rejected(reason) => *s.rejected.entry(reason).or_default() += 1,
            Disposition::Sorted => {}
        }
        // The first specimen has no predecessor.
        if record.sequence > 1 {
            self.interval_total += record.elapsed;
            self.intervals += 1;
        }
        self.positioning_total += positioning;
        self.positionings += 1;
    }

    pub fn lost(&mut self) {
        self.summary.lost += 1;
    }

    pub fn stuck_reset(&mut self) {
        self.summary.stuck_resets += 1;
    }

    pub fn background_refresh(&mut self) {
        self.summary.background_refreshes += 1;
    }

    pub fn snapshot(&self, thresholds: Option<RoutingThresholds>, run_time: Duration) -> RunSummary {
        let mut out = self.summary.clone();
        out.mean_interval = (self.intervals > 0).then(|| self.interval_total / self.intervals);
        out.mean_positioning =
            (self.positionings > 0).then(|| self.positioning_total / self.positionings);
        out.thresholds = thresholds;
        out.run_time = run_time;
        out
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "run_time_s: {:.1}", self.run_time.as_secs_f64())?;
        writeln!(f, "specimens: {}", self.specimens)?;
        writeln!(f, "up: {}", self.up)?;
        writeln!(f, "straight: {}", self.straight)?;
        writeln!(f, "down: {}", self.down)?;
        writeln!(f, "calibration: {}", self.calibration)?;
        for (reason, n) in &self.rejected {
            writeln!(f, "{reason}: {n}")?;
        }
        writeln!(f, "lost: {}", self.lost)?;
        writeln!(f, "stuck_resets: {}", self.stuck_resets)?;
        writeln!(f, "background_refreshes: {}", self.background_refreshes)?;
        if let Some(d) = self.mean_interval {
            writeln!(f, "mean_interval_s: {:.3}", d.as_secs_f64())?;
        }
        if let Some(d) = self.mean_positioning {
            writeln!(f, "mean_positioning_s: {:.3}", d.as_secs_f64())?;
        }
        if let Some(t) = self.thresholds {
            writeln!(f, "lower_threshold: {}", t.lower)?;
            writeln!(f, "upper_threshold: {}", t.upper)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(sequence: u64, direction: Direction, disposition: Disposition) -> SpecimenRecord {
        SpecimenRecord {
            sequence,
            size: 3000,
            metrics: vec![],
            elapsed: Duration::from_secs(4),
            direction,
            disposition,
        }
    }

    #[test]
    fn test_counts_and_means() {
        let mut b = SummaryBuilder::default();
        b.record(&record(1, Direction::Straight, Disposition::Calibration), Duration::from_secs(1));
        b.record(&record(2, Direction::Up, Disposition::Sorted), Duration::from_secs(3));
        b.record(
            &record(3, Direction::Straight, Disposition::Rejected(RejectReason::SmallWorm)),
            Duration::from_secs(2),
        );
        b.lost();
        let s = b.snapshot(None, Duration::from_secs(60));
        assert_eq!(s.specimens, 3);
        assert_eq!(s.count(Direction::Straight), 2);
        assert_eq!(s.up, 1);
        assert_eq!(s.calibration, 1);
        assert_eq!(s.rejected_total(), 1);
        assert_eq!(s.lost, 1);
        assert_eq!(s.mean_interval, Some(Duration::from_secs(4)));
        assert_eq!(s.mean_positioning, Some(Duration::from_secs(2)));
        assert!(s.to_string().contains("small_worm: 1"));
    }
}
