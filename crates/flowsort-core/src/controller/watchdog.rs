use std::time::Duration;

use crate::config::WatchdogConfig;

/// What the clearance watchdog wants done this iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClearanceAction {
    Wait,
    /// Flutter the outlet and re-issue the sort command.
    Retry,
    /// Budget exhausted: alert, reset the background, declare cleared.
    GiveUp,
}

/// Bounded-retry guard over one clearance episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClearanceWatchdog {
    started: Duration,
    last_retry: Duration,
}

impl ClearanceWatchdog {
    pub fn start(now: Duration) -> Self {
        Self {
            started: now,
            last_retry: now,
        }
    }

    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.started)
    }

    pub fn poll(&mut self, now: Duration, config: &WatchdogConfig) -> ClearanceAction {
        if self.elapsed(now) >= config.stuck_timeout() {
            return ClearanceAction::GiveUp;
        }
        if now.saturating_sub(self.last_retry) >= config.clear_retry() {
            self.last_retry = now;
            return ClearanceAction::Retry;
        }
        ClearanceAction::Wait
    }
}

/// Fires one alert per idle stretch. Re-armed by the next detection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IdleWatchdog {
    last_activity: Duration,
    alerted: bool,
}

impl IdleWatchdog {
    pub fn new(now: Duration) -> Self {
        Self {
            last_activity: now,
            alerted: false,
        }
    }

    pub fn activity(&mut self, now: Duration) {
        self.last_activity = now;
        self.alerted = false;
    }

    pub fn is_alerted(&self) -> bool {
        self.alerted
    }

    /// True exactly once when the idle timeout is first exceeded.
    pub fn check(&mut self, now: Duration, timeout: Duration) -> bool {
        if self.alerted || now.saturating_sub(self.last_activity) < timeout {
            return false;
        }
        self.alerted = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_clearance_retries_then_gives_up() {
        let config = WatchdogConfig::default();
        let mut wd = ClearanceWatchdog::start(secs(10));
        assert_eq!(wd.poll(secs(10), &config), ClearanceAction::Wait);
        assert_eq!(wd.poll(secs(11), &config), ClearanceAction::Retry);
        assert_eq!(wd.poll(secs(11), &config), ClearanceAction::Wait);
        assert_eq!(wd.poll(secs(70), &config), ClearanceAction::GiveUp);
    }

    #[test]
    fn test_idle_alerts_once_until_activity() {
        let mut wd = IdleWatchdog::new(secs(0));
        let timeout = secs(150);
        assert!(!wd.check(secs(149), timeout));
        assert!(wd.check(secs(150), timeout));
        assert!(!wd.check(secs(400), timeout));
        wd.activity(secs(400));
        assert!(!wd.is_alerted());
        assert!(wd.check(secs(550), timeout));
    }
}
