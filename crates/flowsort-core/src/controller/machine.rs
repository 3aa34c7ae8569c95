use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::background::BackgroundModel;
use crate::calibration::{AdaptiveCalibrator, RoutingThresholds};
use crate::config::{IlluminationConfig, SizeLimits, SortConfig};
use crate::consts::FLUTTER_PULSE_MS;
use crate::error::{Result, SortError};
use crate::frame::{Frame, Illumination};
use crate::hardware::{CaptureRequest, Clock, FrameSource, Notifier, Recorder, ValveActuator};
use crate::metrics::{ChannelImage, Classifier, SpecimenView};
use crate::motion::MotionDetector;
use crate::record::{Direction, Disposition, ImageCategory, RejectReason, SpecimenRecord};
use crate::segmentation::{SegmentationEngine, SpecimenMask};

use super::control::ControlHandle;
use super::observer::{NoOpObserver, RunObserver};
use super::state::{SortState, StepOutcome};
use super::summary::{RunSummary, SummaryBuilder};
use super::valves::{self, ValveCommand};
use super::watchdog::{ClearanceAction, ClearanceWatchdog, IdleWatchdog};

/// The rig's I/O collaborators.
pub struct Devices {
    pub camera: Box<dyn FrameSource>,
    pub valves: Box<dyn ValveActuator>,
    pub notifier: Box<dyn Notifier>,
    pub recorder: Box<dyn Recorder>,
    pub clock: Arc<dyn Clock>,
}

/// Single-threaded detection, positioning, classification and actuation loop.
///
/// Owns the background model and the calibrator; nothing else mutates them.
/// Only faults from the camera or the valves end the loop. Recorder and
/// notifier failures are logged and dropped.
pub struct SortController {
    config: SortConfig,
    devices: Devices,
    control: ControlHandle,
    observer: Arc<dyn RunObserver>,
    motion: MotionDetector,
    segmentation: SegmentationEngine,
    classifier: Box<dyn Classifier>,
    calibrator: AdaptiveCalibrator,
    background: Option<BackgroundModel>,
    size_limits: SizeLimits,
    state: SortState,
    sequence: u64,
    last_specimen_at: Option<Duration>,
    accepted_since_refresh: usize,
    refresh_pending: bool,
    idle: IdleWatchdog,
    lit: Option<Illumination>,
    summary: SummaryBuilder,
    started_at: Duration,
    started: bool,
}

impl SortController {
    pub fn new(config: SortConfig, devices: Devices, control: ControlHandle) -> Result<Self> {
        config.validate()?;
        let now = devices.clock.now();
        Ok(Self {
            motion: MotionDetector::new(&config.geometry, &config.motion),
            segmentation: SegmentationEngine::new(&config.geometry, &config.segmentation),
            classifier: config.classifier.build(),
            calibrator: AdaptiveCalibrator::new(&config.calibration),
            size_limits: config.size,
            config,
            devices,
            control,
            observer: Arc::new(NoOpObserver),
            background: None,
            state: SortState::Loading,
            sequence: 0,
            last_specimen_at: None,
            accepted_since_refresh: 0,
            refresh_pending: false,
            idle: IdleWatchdog::new(now),
            lit: None,
            summary: SummaryBuilder::default(),
            started_at: now,
            started: false,
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn control(&self) -> &ControlHandle {
        &self.control
    }

    pub fn state(&self) -> &SortState {
        &self.state
    }

    /// Specimens that have reached the positioned state so far.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn size_limits(&self) -> SizeLimits {
        self.size_limits
    }

    pub fn calibrator(&self) -> &AdaptiveCalibrator {
        &self.calibrator
    }

    pub fn background(&self) -> Option<&BackgroundModel> {
        self.background.as_ref()
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    /// Thresholds currently used for routing, if any.
    pub fn thresholds(&self) -> Option<RoutingThresholds> {
        if !self.classifier.uses_thresholds() {
            return None;
        }
        self.calibrator.thresholds().ok()
    }

    pub fn summary(&self) -> RunSummary {
        let run_time = self.devices.clock.now().saturating_sub(self.started_at);
        self.summary.snapshot(self.thresholds(), run_time)
    }

    /// Open the record stream, capture the first background and start
    /// loading. Called implicitly by the first `step`.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        let fields = self.classifier.record_fields();
        let begun = self.devices.recorder.begin(&fields);
        log_recorder(begun, "begin");

        self.started_at = self.devices.clock.now();
        self.idle = IdleWatchdog::new(self.started_at);
        self.refresh_background()?;
        if self.classifier.uses_thresholds() && !self.config.calibration.is_fixed() {
            self.calibrator.seed(self.config.calibration.sample_count);
        }
        info!(
            classifier = self.classifier.name(),
            calibration = %self.config.calibration.mode,
            min_size = self.size_limits.min,
            max_size = self.size_limits.max,
            "Sort loop starting"
        );
        self.actuate(&valves::start_load())?;
        self.started = true;
        Ok(())
    }

    /// Run until stopped or a hardware fault. Valves are set safe and the
    /// recorder is flushed on every exit path.
    pub fn run(&mut self) -> Result<RunSummary> {
        let result = self.run_loop();
        if let Err(e) = &result {
            error!(error = %e, "Sort loop terminated by fault");
        }
        let summary = self.shutdown();
        result.map(|_| summary)
    }

    fn run_loop(&mut self) -> Result<()> {
        self.start()?;
        loop {
            if matches!(self.step()?, StepOutcome::Stopped) {
                return Ok(());
            }
        }
    }

    /// Collect `count` calibration samples, routing every accepted specimen
    /// straight. Returns the resulting thresholds, or `None` when stopped
    /// first.
    ///
    /// `count` below `calibration.min_samples` could never yield thresholds
    /// and is rejected up front.
    pub fn calibrate(&mut self, count: usize) -> Result<Option<RoutingThresholds>> {
        let min = self.config.calibration.min_samples;
        if count < min {
            return Err(SortError::InvalidConfig(format!(
                "calibration needs at least {min} samples, asked for {count}"
            )));
        }
        self.start()?;
        self.calibrator.seed(count);
        while self.calibrator.is_calibrating() {
            if matches!(self.step()?, StepOutcome::Stopped) {
                return Ok(None);
            }
        }
        Ok(self.thresholds())
    }

    /// Put the valves in their safe state and close out the record stream.
    pub fn shutdown(&mut self) -> RunSummary {
        info!(specimens = self.sequence, "Shutting down");
        if let Err(e) = self.actuate(&valves::safe()) {
            error!(error = %e, "Failed to set valves safe");
        }
        let summary = self.summary();
        let written = self.devices.recorder.write_summary(&summary);
        log_recorder(written, "summary");
        let flushed = self.devices.recorder.flush();
        log_recorder(flushed, "flush");
        summary
    }

    /// One loop iteration: one brightfield capture and at most one state
    /// transition.
    pub fn step(&mut self) -> Result<StepOutcome> {
        self.start()?;
        if self.control.is_stopped() {
            return Ok(StepOutcome::Stopped);
        }

        let frame = self.capture(Illumination::Brightfield)?;
        if self.control.is_paused() {
            return Ok(StepOutcome::Paused);
        }
        if self.control.take_clear() {
            return self.forced_clear();
        }

        let now = self.devices.clock.now();
        let state = std::mem::replace(&mut self.state, SortState::Loading);
        let (next, outcome) = match state {
            SortState::Loading => self.poll_loading(&frame, now)?,
            SortState::Pushing { since } => self.poll_pushing(&frame, since, now)?,
            SortState::Detected { detected_at } => (
                SortState::Positioning {
                    previous: frame,
                    detected_at,
                },
                StepOutcome::Positioning,
            ),
            SortState::Positioning {
                previous,
                detected_at,
            } => self.poll_positioning(frame, previous, detected_at, now)?,
            SortState::Actuating { direction } => {
                self.actuate(&valves::sort(direction))?;
                debug!(seq = self.sequence, direction = %direction, "Outlet opened");
                (
                    SortState::Clearing {
                        direction,
                        watchdog: ClearanceWatchdog::start(now),
                    },
                    StepOutcome::Actuated(direction),
                )
            }
            SortState::Clearing {
                direction,
                watchdog,
            } => self.poll_clearing(&frame, direction, watchdog, now)?,
        };
        self.state = next;
        Ok(outcome)
    }

    fn poll_loading(&mut self, frame: &Frame, now: Duration) -> Result<(SortState, StepOutcome)> {
        if self.config.geometry.queue.is_some() {
            if self.motion.queued(frame, self.model()?)? {
                self.actuate(&valves::push_queue())?;
                self.arrival(now);
                debug!(seq = self.sequence + 1, "Pushing queue");
                return Ok((SortState::Pushing { since: now }, StepOutcome::Queued));
            }
        } else if self.motion.detected(frame, self.model()?)? {
            self.actuate(&valves::hold())?;
            self.arrival(now);
            debug!(seq = self.sequence + 1, "Specimen detected");
            return Ok((SortState::Detected { detected_at: now }, StepOutcome::Detected));
        }

        let timeout = self.config.watchdog.idle_timeout();
        if self.idle.check(now, timeout) {
            warn!(idle_secs = timeout.as_secs(), "No specimen detected");
            self.notify(&format!(
                "No specimen detected for {} s",
                timeout.as_secs()
            ));
        }
        Ok((SortState::Loading, StepOutcome::Idle))
    }

    /// Close the input once the pushed specimen shows up in the detection
    /// window, or once the push has run for `max_push`.
    fn poll_pushing(
        &mut self,
        frame: &Frame,
        since: Duration,
        now: Duration,
    ) -> Result<(SortState, StepOutcome)> {
        let arrived = self.motion.pushed_forwards(frame, self.model()?)?;
        let timed_out = now.saturating_sub(since) > self.config.watchdog.max_push();
        if !arrived && !timed_out {
            return Ok((SortState::Pushing { since }, StepOutcome::Pushing));
        }
        self.actuate(&valves::hold())?;
        debug!(seq = self.sequence + 1, arrived, "Specimen pushed in");
        Ok((SortState::Detected { detected_at: now }, StepOutcome::Detected))
    }

    fn arrival(&mut self, now: Duration) {
        if self.idle.is_alerted() {
            info!("Specimens arriving again");
        }
        self.idle.activity(now);
    }

    fn poll_positioning(
        &mut self,
        frame: Frame,
        previous: Frame,
        detected_at: Duration,
        now: Duration,
    ) -> Result<(SortState, StepOutcome)> {
        let background = self.model()?;
        if self.motion.lost(&frame, background)? {
            info!("Specimen lost before positioning");
            self.summary.lost();
            self.actuate(&valves::sort(Direction::Straight))?;
            self.devices.clock.sleep(self.config.watchdog.sort_settle());
            self.actuate(&valves::start_load())?;
            return Ok((SortState::Loading, StepOutcome::Lost));
        }
        if self.motion.positioned(&frame, &previous, background)? {
            let record = self.process(&frame, detected_at, now)?;
            let direction = record.direction;
            return Ok((
                SortState::Actuating { direction },
                StepOutcome::Processed(record),
            ));
        }
        Ok((
            SortState::Positioning {
                previous: frame,
                detected_at,
            },
            StepOutcome::Positioning,
        ))
    }

    fn poll_clearing(
        &mut self,
        frame: &Frame,
        direction: Direction,
        mut watchdog: ClearanceWatchdog,
        now: Duration,
    ) -> Result<(SortState, StepOutcome)> {
        if self.motion.cleared(frame, self.model()?)? {
            debug!(
                seq = self.sequence,
                clear_ms = watchdog.elapsed(now).as_millis() as u64,
                "Outlet clear"
            );
            self.resume_loading()?;
            return Ok((SortState::Loading, StepOutcome::Cleared));
        }

        match watchdog.poll(now, &self.config.watchdog) {
            ClearanceAction::Wait => Ok((
                SortState::Clearing {
                    direction,
                    watchdog,
                },
                StepOutcome::Clearing,
            )),
            ClearanceAction::Retry => {
                debug!(seq = self.sequence, direction = %direction, "Clearance retry");
                self.actuate(&valves::flutter(direction))?;
                self.devices
                    .clock
                    .sleep(Duration::from_millis(FLUTTER_PULSE_MS));
                self.actuate(&valves::sort(direction))?;
                Ok((
                    SortState::Clearing {
                        direction,
                        watchdog,
                    },
                    StepOutcome::ClearRetry,
                ))
            }
            ClearanceAction::GiveUp => {
                let secs = watchdog.elapsed(now).as_secs();
                warn!(seq = self.sequence, secs, "Specimen stuck, resetting background");
                self.notify(&format!(
                    "Specimen {} stuck in the {} outlet for {} s; background reset",
                    self.sequence, direction, secs
                ));
                self.summary.stuck_reset();
                self.refresh_pending = true;
                self.resume_loading()?;
                Ok((SortState::Loading, StepOutcome::StuckReset))
            }
        }
    }

    /// Operator request: push whatever is in view out straight and start over
    /// with a fresh background.
    fn forced_clear(&mut self) -> Result<StepOutcome> {
        info!(state = self.state.name(), "Operator clear");
        self.actuate(&valves::sort(Direction::Straight))?;
        self.refresh_pending = true;
        self.resume_loading()?;
        self.state = SortState::Loading;
        Ok(StepOutcome::ForcedClear)
    }

    /// After a specimen has left: settle, refresh the background when due and
    /// reopen the input.
    fn resume_loading(&mut self) -> Result<()> {
        self.devices.clock.sleep(self.config.watchdog.sort_settle());
        let interval = self.config.refresh_interval;
        let periodic = interval > 0 && self.accepted_since_refresh >= interval;
        if self.refresh_pending || periodic {
            self.refresh_background()?;
        }
        self.actuate(&valves::start_load())
    }

    /// Replace the background model wholesale. Only called with the viewing
    /// window presumed empty.
    fn refresh_background(&mut self) -> Result<()> {
        let mut channels = self.classifier.channels();
        channels.sort();
        channels.dedup();

        let geometry = &self.config.geometry;
        let illumination = &self.config.illumination;
        let devices = &mut self.devices;
        let lit = &mut self.lit;
        let model = BackgroundModel::build(geometry, &channels, |channel| {
            capture_frame(devices, lit, illumination, channel)
        })?;

        for reference in model.references() {
            let saved = self
                .devices
                .recorder
                .save_reference(reference, reference.illumination().as_str());
            log_recorder(saved, "reference");
        }
        info!(
            accepted_since_refresh = self.accepted_since_refresh,
            "Background refreshed"
        );
        self.background = Some(model);
        self.accepted_since_refresh = 0;
        self.refresh_pending = false;
        self.summary.background_refresh();
        Ok(())
    }

    /// Segment, check, classify and record a positioned specimen.
    fn process(
        &mut self,
        frame: &Frame,
        detected_at: Duration,
        now: Duration,
    ) -> Result<SpecimenRecord> {
        self.sequence += 1;
        let sequence = self.sequence;
        let elapsed = self
            .last_specimen_at
            .map_or(Duration::ZERO, |t| detected_at.saturating_sub(t));
        self.last_specimen_at = Some(detected_at);
        let positioning = now.saturating_sub(detected_at);

        let subtracted = self.model()?.difference(frame)?;
        let mask = self.segmentation.segment(&subtracted)?;
        let size = mask.size();

        let (metrics, direction, disposition) = match self.size_reject(size) {
            Some(reason) => (Vec::new(), Direction::Straight, Disposition::Rejected(reason)),
            None => self.classify(sequence, &mask)?,
        };

        let record = SpecimenRecord {
            sequence,
            size,
            metrics,
            elapsed,
            direction,
            disposition,
        };
        info!(
            seq = sequence,
            size,
            direction = %direction,
            reason = disposition.reason(),
            metric = ?record.metrics.first(),
            "Specimen processed"
        );

        let category = match disposition {
            Disposition::Rejected(reason) => reason.image_category(),
            _ => ImageCategory::Accepted,
        };
        let appended = self.devices.recorder.append(&record);
        log_recorder(appended, "record");
        let saved = self.devices.recorder.save_specimen(sequence, category, frame);
        log_recorder(saved, "specimen image");

        self.summary.record(&record, positioning);
        self.observer.specimen(&record);
        Ok(record)
    }

    fn classify(
        &mut self,
        sequence: u64,
        mask: &SpecimenMask,
    ) -> Result<(Vec<f64>, Direction, Disposition)> {
        let size = mask.size();
        let mut images = Vec::new();
        for channel in self.classifier.channels() {
            let frame = self.capture(channel)?;
            let subtracted = self.model()?.subtract_clamped(&frame)?;
            images.push(ChannelImage { frame, subtracted });
        }

        let view = SpecimenView {
            sequence,
            mask,
            channels: &images,
            sampling: self.config.geometry.fluorescence_sampling,
        };
        let metric = self.classifier.extract_metric(&view)?;
        let mut reasons: Vec<RejectReason> =
            self.classifier.reject_checks(&view, &metric).into_iter().collect();
        if metric.values.len() < self.classifier.record_fields().len() {
            reasons.push(RejectReason::Unsampled);
        }

        // Size again on a fresh frame: a second specimen may have drifted in
        // during the fluorescence exposures.
        if self.size_limits.recheck_after_imaging && !images.is_empty() {
            let check = self.capture(Illumination::Brightfield)?;
            let rechecked = self
                .segmentation
                .segment(&self.model()?.difference(&check)?)?;
            if let Some(reason) = self.size_reject(rechecked.size()) {
                debug!(seq = sequence, size = rechecked.size(), %reason, "Size re-check failed");
                reasons.push(reason);
            }
        }

        if let Some(reason) = reasons.into_iter().min() {
            return Ok((metric.values, Direction::Straight, Disposition::Rejected(reason)));
        }

        let uses_thresholds = self.classifier.uses_thresholds();
        let primary = metric.primary();
        self.accepted_since_refresh += 1;

        if uses_thresholds && self.calibrator.is_calibrating() {
            if let Some(value) = primary {
                self.seed_calibration(value, size);
            }
            return Ok((metric.values, Direction::Straight, Disposition::Calibration));
        }

        let thresholds = if uses_thresholds {
            match self.calibrator.thresholds() {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!(error = %e, "Routing thresholds unavailable, restarting calibration");
                    self.calibrator.seed(self.config.calibration.sample_count);
                    if let Some(value) = primary {
                        self.seed_calibration(value, size);
                    }
                    return Ok((metric.values, Direction::Straight, Disposition::Calibration));
                }
            }
        } else {
            None
        };
        let direction = self
            .classifier
            .decide_direction(&metric, thresholds.as_ref(), sequence);
        if let (true, Some(value)) = (uses_thresholds, primary) {
            self.calibrator.update(value);
        }
        Ok((metric.values, direction, Disposition::Sorted))
    }

    fn seed_calibration(&mut self, value: f64, size: usize) {
        match self.calibrator.record_seed(value, size) {
            Ok(Some(done)) => {
                if let Some(limits) = done.size_limits {
                    self.size_limits = SizeLimits {
                        recheck_after_imaging: self.size_limits.recheck_after_imaging,
                        ..limits
                    };
                    info!(min = limits.min, max = limits.max, "Size limits derived from calibration");
                }
                self.observer.calibration_complete(&done.thresholds);
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Calibration finished without usable thresholds"),
        }
        let collected = self.calibrator.samples().len();
        self.observer
            .calibration_progress(collected, collected + self.calibrator.remaining());
    }

    /// Size rejection, larger-than-max first.
    fn size_reject(&self, size: usize) -> Option<RejectReason> {
        if size > self.size_limits.max {
            Some(RejectReason::DoubledWorm)
        } else if size < self.size_limits.min {
            Some(RejectReason::SmallWorm)
        } else {
            None
        }
    }

    fn model(&self) -> Result<&BackgroundModel> {
        self.background
            .as_ref()
            .ok_or(SortError::MissingReference(Illumination::Brightfield))
    }

    fn capture(&mut self, illumination: Illumination) -> Result<Frame> {
        capture_frame(
            &mut self.devices,
            &mut self.lit,
            &self.config.illumination,
            illumination,
        )
    }

    fn actuate(&mut self, commands: &[ValveCommand]) -> Result<()> {
        self.devices.valves.execute(commands)
    }

    fn notify(&mut self, message: &str) {
        if let Err(e) = self.devices.notifier.send(message) {
            warn!(error = %e, "Notifier failed");
        }
    }
}

/// Capture under `illumination`, waiting out the lamp settle delay when the
/// channel changes.
fn capture_frame(
    devices: &mut Devices,
    lit: &mut Option<Illumination>,
    config: &IlluminationConfig,
    illumination: Illumination,
) -> Result<Frame> {
    if lit.is_some_and(|current| current != illumination) {
        devices.clock.sleep(config.settle_delay());
    }
    *lit = Some(illumination);
    devices.camera.capture(&CaptureRequest {
        illumination,
        exposure_ms: config.exposure_ms(illumination),
    })
}

fn log_recorder(result: Result<()>, what: &'static str) {
    if let Err(e) = result {
        warn!(error = %e, what, "Recorder failed");
    }
}
