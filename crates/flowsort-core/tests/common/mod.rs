#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ndarray::Array2;

use flowsort_core::config::SortConfig;
use flowsort_core::controller::valves::{FlowChannel, ValveCommand};
use flowsort_core::controller::{
    ControlHandle, Devices, RunObserver, RunSummary, SortController, StepOutcome,
};
use flowsort_core::error::{Result, SortError};
use flowsort_core::frame::{Frame, Illumination};
use flowsort_core::geometry::{DeviceGeometry, Roi};
use flowsort_core::hardware::{
    CaptureRequest, Clock, FrameSource, Notifier, Recorder, ValveActuator,
};
use flowsort_core::record::{ImageCategory, SpecimenRecord};

pub const ROWS: usize = 200;
pub const COLS: usize = 120;
pub const BRIGHTFIELD_LEVEL: f32 = 1000.0;
pub const SPECIMEN_CONTRAST: f32 = 500.0;
pub const FLUORESCENCE_BACKGROUND: f32 = 100.0;

// ---------------------------------------------------------------------------
// Geometry and frames
// ---------------------------------------------------------------------------

/// Small rig: 200x120 frame, specimen channel covers the whole frame.
pub fn test_geometry() -> DeviceGeometry {
    DeviceGeometry {
        image_size: (ROWS, COLS),
        detection: Roi::new(20, 180, 30, 90),
        position: Roi::new(20, 160, 30, 90),
        clearing: Roi::new(20, 160, 30, 90),
        fluorescence_sampling: Roi::new(20, 160, 30, 90),
        channel: Roi::new(0, ROWS, 0, COLS),
        exclusion: Vec::new(),
        queue: None,
    }
}

pub fn test_config() -> SortConfig {
    SortConfig {
        geometry: test_geometry(),
        ..SortConfig::default()
    }
}

/// Rectangular stand-in for a specimen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Specimen {
    pub row: usize,
    pub col: usize,
    pub height: usize,
    pub width: usize,
    /// Added counts in every fluorescence channel.
    pub fluorescence: f32,
}

impl Specimen {
    /// 60 x 50 = 3000 px, inside the default size limits.
    pub fn normal(fluorescence: f32) -> Self {
        Self {
            row: 40,
            col: 40,
            height: 60,
            width: 50,
            fluorescence,
        }
    }

    /// 100 x 60 = 6000 px, above the default upper size limit.
    pub fn double() -> Self {
        Self {
            row: 40,
            col: 30,
            height: 100,
            width: 60,
            fluorescence: 50.0,
        }
    }

    /// 30 x 50 = 1500 px, below the default lower size limit.
    pub fn small() -> Self {
        Self {
            row: 40,
            col: 40,
            height: 30,
            width: 50,
            fluorescence: 50.0,
        }
    }

    pub fn area(&self) -> usize {
        self.height * self.width
    }

    pub fn contains(&self, r: usize, c: usize) -> bool {
        (self.row..self.row + self.height).contains(&r) && (self.col..self.col + self.width).contains(&c)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Scene {
    Empty,
    Specimen(Specimen),
}

pub fn render(scene: Scene, illumination: Illumination) -> Array2<f32> {
    let base = match illumination {
        Illumination::Brightfield => BRIGHTFIELD_LEVEL,
        _ => FLUORESCENCE_BACKGROUND,
    };
    Array2::from_shape_fn((ROWS, COLS), |(r, c)| match scene {
        Scene::Specimen(s) if s.contains(r, c) => match illumination {
            Illumination::Brightfield => base - SPECIMEN_CONTRAST,
            _ => base + s.fluorescence,
        },
        _ => base,
    })
}

pub fn frame(scene: Scene, illumination: Illumination) -> Frame {
    Frame::new(render(scene, illumination), illumination)
}

// ---------------------------------------------------------------------------
// Fake devices
// ---------------------------------------------------------------------------

/// Clock that only advances when told to. `sleep` advances it instantly.
#[derive(Default)]
pub struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }
}

/// Renders whatever scene is currently set.
pub struct SceneSource {
    scene: Arc<Mutex<Scene>>,
    captures: Arc<Mutex<Vec<Illumination>>>,
    fail: Arc<AtomicBool>,
}

impl FrameSource for SceneSource {
    fn capture(&mut self, request: &CaptureRequest) -> Result<Frame> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SortError::Capture("camera disconnected".into()));
        }
        self.captures.lock().unwrap().push(request.illumination);
        let scene = *self.scene.lock().unwrap();
        Ok(frame(scene, request.illumination))
    }
}

/// Records every command set. With a flow queue attached it also moves
/// specimens: a sort command carries the one in view away and opening the
/// input brings in the next queued one.
pub struct RecordingValves {
    log: Arc<Mutex<Vec<Vec<ValveCommand>>>>,
    scene: Arc<Mutex<Scene>>,
    flow: Arc<Mutex<Option<VecDeque<Specimen>>>>,
}

impl ValveActuator for RecordingValves {
    fn execute(&mut self, commands: &[ValveCommand]) -> Result<()> {
        self.log.lock().unwrap().push(commands.to_vec());
        if let Some(queue) = self.flow.lock().unwrap().as_mut() {
            let mut scene = self.scene.lock().unwrap();
            if commands.contains(&ValveCommand::high(FlowChannel::Sewer)) {
                *scene = Scene::Empty;
            } else if commands.contains(&ValveCommand::low(FlowChannel::Push)) {
                *scene = queue.pop_front().map_or(Scene::Empty, Scene::Specimen);
            }
        }
        Ok(())
    }
}

pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    fail: Arc<AtomicBool>,
}

impl Notifier for RecordingNotifier {
    fn send(&mut self, message: &str) -> Result<()> {
        self.sent.lock().unwrap().push(message.to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(SortError::Io(std::io::Error::other("mail server down")));
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct RecorderLog {
    pub fields: Vec<String>,
    pub references: Vec<String>,
    pub images: Vec<(u64, ImageCategory)>,
    pub records: Vec<SpecimenRecord>,
    pub summary: Option<RunSummary>,
    pub flushes: usize,
}

pub struct MemoryRecorder {
    log: Arc<Mutex<RecorderLog>>,
    fail: Arc<AtomicBool>,
}

impl MemoryRecorder {
    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SortError::Io(std::io::Error::other("disk full")));
        }
        Ok(())
    }
}

impl Recorder for MemoryRecorder {
    fn begin(&mut self, metric_fields: &[String]) -> Result<()> {
        self.check()?;
        self.log.lock().unwrap().fields = metric_fields.to_vec();
        Ok(())
    }

    fn save_reference(&mut self, _frame: &Frame, tag: &str) -> Result<()> {
        self.check()?;
        self.log.lock().unwrap().references.push(tag.to_string());
        Ok(())
    }

    fn save_specimen(&mut self, sequence: u64, category: ImageCategory, _frame: &Frame) -> Result<()> {
        self.check()?;
        self.log.lock().unwrap().images.push((sequence, category));
        Ok(())
    }

    fn append(&mut self, record: &SpecimenRecord) -> Result<()> {
        self.check()?;
        self.log.lock().unwrap().records.push(record.clone());
        Ok(())
    }

    fn write_summary(&mut self, summary: &RunSummary) -> Result<()> {
        self.check()?;
        self.log.lock().unwrap().summary = Some(summary.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.log.lock().unwrap().flushes += 1;
        self.check()
    }
}

// ---------------------------------------------------------------------------
// Rig: handles onto every fake device
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct Rig {
    pub scene: Arc<Mutex<Scene>>,
    pub captures: Arc<Mutex<Vec<Illumination>>>,
    pub camera_fail: Arc<AtomicBool>,
    pub valves: Arc<Mutex<Vec<Vec<ValveCommand>>>>,
    pub flow: Arc<Mutex<Option<VecDeque<Specimen>>>>,
    pub alerts: Arc<Mutex<Vec<String>>>,
    pub notifier_fail: Arc<AtomicBool>,
    pub recorder: Arc<Mutex<RecorderLog>>,
    pub recorder_fail: Arc<AtomicBool>,
    pub clock: Arc<ManualClock>,
    pub control: ControlHandle,
}

impl Rig {
    pub fn new() -> Self {
        Self {
            scene: Arc::new(Mutex::new(Scene::Empty)),
            captures: Arc::default(),
            camera_fail: Arc::default(),
            valves: Arc::default(),
            flow: Arc::default(),
            alerts: Arc::default(),
            notifier_fail: Arc::default(),
            recorder: Arc::default(),
            recorder_fail: Arc::default(),
            clock: Arc::new(ManualClock::new()),
            control: ControlHandle::new(),
        }
    }

    pub fn devices(&self) -> Devices {
        let clock: Arc<dyn Clock> = self.clock.clone();
        Devices {
            camera: Box::new(SceneSource {
                scene: self.scene.clone(),
                captures: self.captures.clone(),
                fail: self.camera_fail.clone(),
            }),
            valves: Box::new(RecordingValves {
                log: self.valves.clone(),
                scene: self.scene.clone(),
                flow: self.flow.clone(),
            }),
            notifier: Box::new(RecordingNotifier {
                sent: self.alerts.clone(),
                fail: self.notifier_fail.clone(),
            }),
            recorder: Box::new(MemoryRecorder {
                log: self.recorder.clone(),
                fail: self.recorder_fail.clone(),
            }),
            clock,
        }
    }

    pub fn controller(&self, config: SortConfig) -> SortController {
        SortController::new(config, self.devices(), self.control.clone()).unwrap()
    }

    /// Let the valves move `specimens` through the rig one at a time.
    pub fn enable_flow(&self, specimens: impl IntoIterator<Item = Specimen>) {
        *self.flow.lock().unwrap() = Some(specimens.into_iter().collect());
    }

    pub fn set_scene(&self, scene: Scene) {
        *self.scene.lock().unwrap() = scene;
    }

    pub fn alerts(&self) -> Vec<String> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn last_valves(&self) -> Option<Vec<ValveCommand>> {
        self.valves.lock().unwrap().last().cloned()
    }

    pub fn valve_count(&self) -> usize {
        self.valves.lock().unwrap().len()
    }

    pub fn records(&self) -> Vec<SpecimenRecord> {
        self.recorder.lock().unwrap().records.clone()
    }
}

// ---------------------------------------------------------------------------
// Driving helpers
// ---------------------------------------------------------------------------

/// Step until `pred` matches, advancing the clock by `tick` before each step.
pub fn step_until(
    ctrl: &mut SortController,
    rig: &Rig,
    tick: Duration,
    max_steps: usize,
    pred: impl Fn(&StepOutcome) -> bool,
) -> Vec<StepOutcome> {
    let mut seen = Vec::new();
    for _ in 0..max_steps {
        rig.clock.advance(tick);
        let outcome = ctrl.step().unwrap();
        let done = pred(&outcome);
        seen.push(outcome);
        if done {
            return seen;
        }
    }
    panic!("condition not reached in {max_steps} steps; saw {seen:?}");
}

/// Put `specimen` in view, step until it is processed, then empty the view
/// and step until it has cleared. Returns the record.
///
/// A fresh controller is started first so its background is captured on an
/// empty view.
pub fn pass_specimen(ctrl: &mut SortController, rig: &Rig, specimen: Specimen) -> SpecimenRecord {
    let tick = Duration::from_millis(100);
    ctrl.start().unwrap();
    rig.set_scene(Scene::Specimen(specimen));
    let seen = step_until(ctrl, rig, tick, 10, |o| matches!(o, StepOutcome::Processed(_)));
    let Some(StepOutcome::Processed(record)) = seen.last().cloned() else {
        unreachable!()
    };
    step_until(ctrl, rig, tick, 5, |o| matches!(o, StepOutcome::Actuated(_)));
    rig.set_scene(Scene::Empty);
    step_until(ctrl, rig, tick, 5, |o| matches!(o, StepOutcome::Cleared));
    record
}

/// Requests a stop once `limit` records have been emitted.
pub struct StopAfter {
    pub limit: usize,
    pub seen: AtomicUsize,
    pub control: ControlHandle,
}

impl RunObserver for StopAfter {
    fn specimen(&self, _record: &SpecimenRecord) {
        if self.seen.fetch_add(1, Ordering::SeqCst) + 1 >= self.limit {
            self.control.stop();
        }
    }
}
