/// Minimum pixel count (h*w) to use Rayon parallelism for whole-frame arithmetic.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Default sensor dimensions after 2x2 binning: (rows, cols).
pub const DEFAULT_IMAGE_SIZE: (usize, usize) = (1280, 1080);

/// Detection multiplier K_d: ROI difference must exceed the noise baseline by
/// this many baselines before a specimen is declared present.
pub const DEFAULT_DETECTION_MULTIPLIER: f64 = 4.0;

/// Lost multiplier K_l: below this many baselines over background the
/// specimen is presumed gone.
pub const DEFAULT_LOST_MULTIPLIER: f64 = 1.5;

/// Position multiplier K_p: frame-to-frame change below this many baselines
/// means the specimen has stopped moving.
pub const DEFAULT_POSITION_MULTIPLIER: f64 = 3.0;

/// Queue multiplier K_q: a queued specimen raises the queue ROI difference
/// above this fraction of the detection noise baseline.
pub const DEFAULT_QUEUE_MULTIPLIER: f64 = 0.6;

/// Push multiplier: detection-window change that ends a queue push early.
pub const DEFAULT_PUSH_MULTIPLIER: f64 = 2.5;

/// Clearing multiplier K_c applied over the clearing ROI after actuation.
pub const DEFAULT_CLEARING_MULTIPLIER: f64 = 1.5;

/// Smallest noise baseline used in comparisons. A perfectly static source
/// otherwise produces zero baselines and the strict comparisons never fire.
pub const DEFAULT_MIN_NOISE_BASELINE: f64 = 1.0;

/// Percentile of the subtracted frame used as the foreground floor.
pub const DEFAULT_SEGMENTATION_PERCENTILE: f64 = 99.0;

/// Enclosed background holes smaller than this (pixels) are filled.
pub const DEFAULT_MAX_HOLE_AREA: usize = 90_000;

/// Erosion/dilation repeat count used to smooth the mask outline.
pub const DEFAULT_SMOOTHING_ITERATIONS: usize = 3;

/// Default specimen size limits in mask pixels.
pub const DEFAULT_MIN_SIZE: usize = 2_300;
pub const DEFAULT_MAX_SIZE: usize = 5_500;

/// Default number of accepted specimens collected during calibration.
pub const DEFAULT_CALIBRATION_SAMPLES: usize = 100;

/// Minimum calibration sample count before thresholds may be used.
pub const DEFAULT_MIN_CALIBRATION_SAMPLES: usize = 10;

/// Routing threshold percentiles.
pub const DEFAULT_LOWER_PERCENTILE: f64 = 10.0;
pub const DEFAULT_UPPER_PERCENTILE: f64 = 90.0;

/// Size-limit derivation after calibration: min = p10 * factor, max = p90 * factor.
pub const CALIBRATED_MIN_SIZE_FACTOR: f64 = 0.5;
pub const CALIBRATED_MAX_SIZE_FACTOR: f64 = 1.3;

/// Fluorescence percentile for the percentile classifier.
pub const DEFAULT_FLUORESCENCE_PERCENTILE: f64 = 95.0;

/// Percentile above which masked pixels are averaged by the top-mean classifier.
pub const DEFAULT_TOP_MEAN_PERCENTILE: f64 = 99.0;

/// Aspect ratio (length / width) below which a specimen counts as bent.
pub const DEFAULT_BENT_ASPECT_RATIO: f64 = 6.0;

/// Watershed percentiles for aggregate counting (foreground, seeds).
pub const DEFAULT_AGGREGATE_LOW_PERCENTILE: f64 = 99.0;
pub const DEFAULT_AGGREGATE_HIGH_PERCENTILE: f64 = 99.99;

/// Default exposures in milliseconds.
pub const DEFAULT_BRIGHTFIELD_EXPOSURE_MS: f64 = 2.0;
pub const DEFAULT_CYAN_EXPOSURE_MS: f64 = 50.0;
pub const DEFAULT_GREEN_YELLOW_EXPOSURE_MS: f64 = 8.0;

/// Wait after switching illumination before the next capture is valid.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 10;

/// Interval between clearance retries (flutter + re-sort).
pub const DEFAULT_CLEAR_RETRY_MS: u64 = 500;

/// Stuck-clearance timeout before alert and forced reset.
pub const DEFAULT_STUCK_TIMEOUT_SECS: u64 = 60;

/// No-detection duration before the idle alert.
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 150;

/// Pause after clearance before loading resumes.
pub const DEFAULT_SORT_SETTLE_MS: u64 = 50;

/// Longest queue push before the input is closed regardless of detection.
pub const DEFAULT_MAX_PUSH_MS: u64 = 200;

/// Length of each blow and suck half-cycle when clearing bubbles.
pub const DEFAULT_BUBBLE_HALF_CYCLE_MS: u64 = 1_000;

/// Outlet pressure pulse length during a flutter.
pub const FLUTTER_PULSE_MS: u64 = 50;

/// Accepted specimens between periodic background refreshes.
pub const DEFAULT_REFRESH_INTERVAL: usize = 100;
