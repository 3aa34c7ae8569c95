use ndarray::Array2;

use flowsort_core::background::{BackgroundModel, NoiseBaselines};
use flowsort_core::error::SortError;
use flowsort_core::frame::{Frame, Illumination};
use flowsort_core::geometry::{DeviceGeometry, Roi};
use flowsort_core::motion::{MotionConfig, MotionDetector};

const SIZE: usize = 10;

fn geometry() -> DeviceGeometry {
    let full = Roi::new(0, SIZE, 0, SIZE);
    DeviceGeometry {
        image_size: (SIZE, SIZE),
        detection: full,
        position: full,
        clearing: full,
        fluorescence_sampling: full,
        channel: full,
        exclusion: Vec::new(),
        queue: None,
    }
}

fn background(noise: f64) -> BackgroundModel {
    BackgroundModel::from_parts(
        vec![Frame::new(Array2::zeros((SIZE, SIZE)), Illumination::Brightfield)],
        NoiseBaselines {
            detection: noise,
            position: noise,
            clearing: noise,
        },
    )
}

/// Frame whose total difference from a zero background is `sum`.
fn frame_with_sum(sum: f32) -> Frame {
    let mut data = Array2::zeros((SIZE, SIZE));
    data[[5, 5]] = sum;
    Frame::new(data, Illumination::Brightfield)
}

#[test]
fn test_detection_example() {
    // noise 100, K_d 4, sum 600: 500 > 400.
    let detector = MotionDetector::new(&geometry(), &MotionConfig::default());
    assert!(detector.detected(&frame_with_sum(600.0), &background(100.0)).unwrap());
}

#[test]
fn test_detection_boundary_is_strict() {
    let detector = MotionDetector::new(&geometry(), &MotionConfig::default());
    let bg = background(100.0);
    for sum in [0.0, 250.0, 499.0, 500.0] {
        assert!(!detector.detected(&frame_with_sum(sum), &bg).unwrap(), "sum {sum}");
    }
    for sum in [501.0, 800.0, 10_000.0] {
        assert!(detector.detected(&frame_with_sum(sum), &bg).unwrap(), "sum {sum}");
    }
}

#[test]
fn test_lost_and_cleared_use_their_multipliers() {
    // K_l = K_c = 1.5: fires while sum - 100 < 150.
    let detector = MotionDetector::new(&geometry(), &MotionConfig::default());
    let bg = background(100.0);
    assert!(detector.lost(&frame_with_sum(249.0), &bg).unwrap());
    assert!(!detector.lost(&frame_with_sum(250.0), &bg).unwrap());
    assert!(detector.cleared(&frame_with_sum(249.0), &bg).unwrap());
    assert!(!detector.cleared(&frame_with_sum(400.0), &bg).unwrap());
}

#[test]
fn test_positioned_compares_successive_frames() {
    // K_p = 3: settled while |frame - previous| - 100 < 300.
    let detector = MotionDetector::new(&geometry(), &MotionConfig::default());
    let bg = background(100.0);
    let previous = frame_with_sum(5000.0);
    assert!(detector.positioned(&frame_with_sum(5000.0), &previous, &bg).unwrap());
    assert!(detector.positioned(&frame_with_sum(5399.0), &previous, &bg).unwrap());
    assert!(!detector.positioned(&frame_with_sum(5400.0), &previous, &bg).unwrap());
}

#[test]
fn test_zero_noise_uses_floor() {
    let detector = MotionDetector::new(&geometry(), &MotionConfig::default());
    let bg = background(0.0);
    // Baseline floored to 1: detected once sum - 1 > 4.
    assert!(!detector.detected(&frame_with_sum(5.0), &bg).unwrap());
    assert!(detector.detected(&frame_with_sum(6.0), &bg).unwrap());
    assert!(detector.cleared(&frame_with_sum(0.0), &bg).unwrap());
}

#[test]
fn test_custom_multiplier() {
    let config = MotionConfig {
        detection_multiplier: 1.0,
        ..MotionConfig::default()
    };
    let detector = MotionDetector::new(&geometry(), &config);
    assert!(detector.detected(&frame_with_sum(201.0), &background(100.0)).unwrap());
}

#[test]
fn test_detection_ignores_pixels_outside_roi() {
    let mut geometry = geometry();
    geometry.detection = Roi::new(0, 4, 0, 4);
    let detector = MotionDetector::new(&geometry, &MotionConfig::default());
    // The changed pixel at (5, 5) is outside the window.
    assert!(!detector.detected(&frame_with_sum(10_000.0), &background(100.0)).unwrap());
}

#[test]
fn test_shape_mismatch_is_an_error() {
    let detector = MotionDetector::new(&geometry(), &MotionConfig::default());
    let wrong = Frame::new(Array2::zeros((SIZE + 1, SIZE)), Illumination::Brightfield);
    let err = detector.detected(&wrong, &background(100.0)).unwrap_err();
    assert!(matches!(err, SortError::ShapeMismatch { .. }));
}

#[test]
fn test_background_build_measures_noise() {
    let geometry = geometry();
    let mut frames = vec![
        frame_with_sum(0.0),
        frame_with_sum(30.0),
        Frame::new(Array2::from_elem((SIZE, SIZE), 7.0), Illumination::Cyan),
    ]
    .into_iter();
    let model = BackgroundModel::build(&geometry, &[Illumination::Cyan], |_| {
        Ok(frames.next().unwrap())
    })
    .unwrap();

    assert_eq!(model.noise().detection, 30.0);
    assert_eq!(model.noise().clearing, 30.0);
    assert_eq!(model.reference(Illumination::Brightfield).unwrap().data()[[5, 5]], 30.0);
    assert_eq!(model.references().count(), 2);
    assert!(matches!(
        model.reference(Illumination::GreenYellow),
        Err(SortError::MissingReference(Illumination::GreenYellow))
    ));
}

#[test]
fn test_queue_needs_a_window() {
    let detector = MotionDetector::new(&geometry(), &MotionConfig::default());
    assert!(!detector.queued(&frame_with_sum(10_000.0), &background(100.0)).unwrap());
}

#[test]
fn test_queue_threshold_is_a_fraction_of_detection_noise() {
    // K_q = 0.6 against the detection baseline, no baseline subtracted.
    let mut geometry = geometry();
    geometry.queue = Some(Roi::new(4, 8, 4, 8));
    let detector = MotionDetector::new(&geometry, &MotionConfig::default());
    let bg = background(100.0);
    assert!(!detector.queued(&frame_with_sum(60.0), &bg).unwrap());
    assert!(detector.queued(&frame_with_sum(61.0), &bg).unwrap());

    geometry.queue = Some(Roi::new(0, 4, 0, 4));
    let detector = MotionDetector::new(&geometry, &MotionConfig::default());
    assert!(!detector.queued(&frame_with_sum(10_000.0), &bg).unwrap());
}

#[test]
fn test_pushed_forwards_is_looser_than_detection() {
    // Push multiplier 2.5: fires once sum - 100 > 250, where detection needs 400.
    let detector = MotionDetector::new(&geometry(), &MotionConfig::default());
    let bg = background(100.0);
    assert!(!detector.pushed_forwards(&frame_with_sum(350.0), &bg).unwrap());
    assert!(detector.pushed_forwards(&frame_with_sum(351.0), &bg).unwrap());
    assert!(!detector.detected(&frame_with_sum(351.0), &bg).unwrap());
}
