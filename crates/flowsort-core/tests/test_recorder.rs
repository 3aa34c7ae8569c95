use std::fs;
use std::time::Duration;

use ndarray::Array2;

use flowsort_core::calibration::RoutingThresholds;
use flowsort_core::controller::valves::{sort, start_load, ValveMap};
use flowsort_core::controller::RunSummary;
use flowsort_core::error::SortError;
use flowsort_core::frame::{Frame, Illumination};
use flowsort_core::hardware::{CaptureRequest, FrameSource, Notifier, Recorder, ValveActuator};
use flowsort_core::io::image_io::{load_counts, save_png};
use flowsort_core::io::recorder::{RECORDS_FILE, SUMMARY_FILE};
use flowsort_core::io::{FileNotifier, LineValveActuator, ReplayFrameSource, RunDirectoryRecorder};
use flowsort_core::record::{Direction, Disposition, ImageCategory, RejectReason, SpecimenRecord};

fn record(sequence: u64, metrics: Vec<f64>, direction: Direction, disposition: Disposition) -> SpecimenRecord {
    SpecimenRecord {
        sequence,
        size: 3000,
        metrics,
        elapsed: Duration::from_millis(2500),
        direction,
        disposition,
    }
}

fn flat(value: f32, illumination: Illumination) -> Frame {
    Frame::new(Array2::from_elem((8, 6), value), illumination)
}

#[test]
fn test_record_stream_layout() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = RunDirectoryRecorder::create(dir.path()).unwrap();
    recorder
        .begin(&["gfp".to_string(), "mcherry".to_string()])
        .unwrap();
    recorder
        .append(&record(1, vec![12.5, 3.0], Direction::Up, Disposition::Sorted))
        .unwrap();
    recorder
        .append(&record(
            2,
            vec![],
            Direction::Straight,
            Disposition::Rejected(RejectReason::DoubledWorm),
        ))
        .unwrap();
    recorder.flush().unwrap();

    let text = fs::read_to_string(dir.path().join(RECORDS_FILE)).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        vec![
            "sequence,size,gfp,mcherry,elapsed_s,direction,reason",
            "1,3000,12.5,3,2.500,up,sorted",
            "2,3000,,,2.500,straight,doubled_worm",
        ]
    );
}

#[test]
fn test_images_and_references() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = RunDirectoryRecorder::create(dir.path()).unwrap();
    recorder
        .save_reference(&flat(1000.0, Illumination::Brightfield), "brightfield")
        .unwrap();
    recorder
        .save_specimen(7, ImageCategory::Dead, &flat(321.0, Illumination::Brightfield))
        .unwrap();

    let reference = load_counts(&dir.path().join("references/brightfield.png")).unwrap();
    assert_eq!(reference.dim(), (8, 6));
    assert_eq!(reference[[0, 0]], 1000.0);

    let specimen = load_counts(&dir.path().join("images/dead/000007.png")).unwrap();
    assert_eq!(specimen[[3, 3]], 321.0);
}

#[test]
fn test_specimen_images_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = RunDirectoryRecorder::create(dir.path())
        .unwrap()
        .without_specimen_images();
    recorder
        .save_specimen(1, ImageCategory::Accepted, &flat(5.0, Illumination::Brightfield))
        .unwrap();
    assert!(!dir.path().join("images").exists());
}

#[test]
fn test_summary_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut recorder = RunDirectoryRecorder::create(dir.path()).unwrap();
    let mut summary = RunSummary {
        specimens: 4,
        up: 1,
        straight: 2,
        down: 1,
        thresholds: Some(RoutingThresholds {
            lower: 19.0,
            upper: 91.0,
        }),
        ..RunSummary::default()
    };
    summary.rejected.insert(RejectReason::SmallWorm, 1);
    recorder.write_summary(&summary).unwrap();

    let text = fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap();
    assert!(text.contains("specimens: 4\n"));
    assert!(text.contains("small_worm: 1\n"));
    assert!(text.contains("upper_threshold: 91\n"));
    assert!(!text.contains("mean_interval_s"));
}

#[test]
fn test_replay_cycles_per_channel() {
    let dir = tempfile::tempdir().unwrap();
    save_png(&Array2::from_elem((4, 4), 10.0), &dir.path().join("a.png")).unwrap();
    save_png(&Array2::from_elem((4, 4), 20.0), &dir.path().join("b.png")).unwrap();
    fs::create_dir(dir.path().join("cyan")).unwrap();
    save_png(&Array2::from_elem((4, 4), 99.0), &dir.path().join("cyan/x.png")).unwrap();

    let mut source = ReplayFrameSource::open(dir.path()).unwrap();
    assert_eq!(source.frame_count(Illumination::Brightfield), 2);
    assert_eq!(source.frame_count(Illumination::Cyan), 1);
    assert_eq!(source.frame_count(Illumination::GreenYellow), 0);

    let bright = CaptureRequest {
        illumination: Illumination::Brightfield,
        exposure_ms: 2.0,
    };
    let seen: Vec<f32> = (0..3)
        .map(|_| source.capture(&bright).unwrap().data()[[0, 0]])
        .collect();
    assert_eq!(seen, vec![10.0, 20.0, 10.0]);

    let cyan = CaptureRequest {
        illumination: Illumination::Cyan,
        exposure_ms: 50.0,
    };
    let frame = source.capture(&cyan).unwrap();
    assert_eq!(frame.illumination(), Illumination::Cyan);
    assert_eq!(frame.data()[[1, 1]], 99.0);

    let missing = CaptureRequest {
        illumination: Illumination::GreenYellow,
        exposure_ms: 8.0,
    };
    assert!(matches!(source.capture(&missing), Err(SortError::Capture(_))));
}

#[test]
fn test_replay_requires_brightfield() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        ReplayFrameSource::open(dir.path()),
        Err(SortError::Capture(_))
    ));
}

#[test]
fn test_valve_lines_use_pin_map() {
    let mut actuator = LineValveActuator::new(Vec::new(), ValveMap::default());
    actuator.execute(&start_load()).unwrap();
    actuator.execute(&sort(Direction::Up)).unwrap();
    let text = String::from_utf8(actuator.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1], "sh D7 sl D3 sh D4 sh D5 sl D2");
}

#[test]
fn test_file_notifier_appends() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("alerts.log");
    let mut notifier = FileNotifier::new(&path);
    notifier.send("clog").unwrap();
    notifier.send("idle").unwrap();

    let text = fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].ends_with(" clog"));
    assert!(lines[1].ends_with(" idle"));
}
