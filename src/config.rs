// THEORY:
// All tunable behavior of a session lives in plain config structs with `Default`
// impls carrying the stock constants. Nothing is read from files; the console
// binary overrides individual fields from its command line before building the
// session.

use crate::core_modules::zone::{Zone, ZoneRegistry};
use std::path::PathBuf;
use std::time::Duration;

pub const CAPTURE_WIDTH: u32 = 1280;
pub const CAPTURE_HEIGHT: u32 = 720;
pub const CAMERA_PROBE_RANGE: std::ops::Range<i32> = 0..5;

/// Rates and thresholds for the per-zone accumulators.
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerParams {
    /// Added to a zone's accumulator on every tick with enough motion.
    pub accumulation_rate: u32,
    /// Subtracted (floored at zero) on every tick without enough motion.
    pub decay_rate: u32,
    /// A zone fires once its accumulator is strictly greater than this.
    pub trigger_threshold: u32,
    /// Fraction of a zone's area that must be foreground to count as motion.
    pub motion_area_fraction: f64,
}

impl Default for TriggerParams {
    fn default() -> Self {
        Self {
            accumulation_rate: 1,
            decay_rate: 2,
            trigger_threshold: 30,
            motion_area_fraction: 0.1,
        }
    }
}

/// Sensitivity of the background model and its mask post-processing.
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundParams {
    /// Number of frames the model averages over once warmed up.
    pub history: u32,
    /// Squared-distance-over-variance cutoff for a pixel to be foreground.
    pub var_threshold: f64,
    pub detect_shadows: bool,
    /// Side of the square Gaussian smoothing kernel applied before the model.
    pub blur_kernel: u32,
    pub erode_iterations: u32,
    pub dilate_iterations: u32,
}

impl Default for BackgroundParams {
    fn default() -> Self {
        Self {
            history: 500,
            var_threshold: 75.0,
            detect_shadows: false,
            blur_kernel: 5,
            erode_iterations: 2,
            dilate_iterations: 2,
        }
    }
}

/// Single-character keys polled from the presentation surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyBindings {
    pub start: char,
    pub edit: char,
    pub quit: char,
    /// Saves the layout and leaves the editor.
    pub commit: char,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            start: 's',
            edit: 'e',
            quit: 'q',
            commit: 's',
        }
    }
}

/// Optional features wired into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether the edit key opens the layout editor from the idle phase.
    pub editing: bool,
    /// Whether a `Capture` trigger writes the frame to disk.
    pub capture_to_file: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            editing: true,
            capture_to_file: true,
        }
    }
}

/// Configuration for a `ZoneSession`.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub capture_width: u32,
    pub capture_height: u32,
    pub zones: ZoneRegistry,
    pub trigger: TriggerParams,
    pub background: BackgroundParams,
    pub keys: KeyBindings,
    pub capabilities: Capabilities,
    pub get_ready: Duration,
    pub calibration: Duration,
    pub camera_ready_timeout: Duration,
    /// Sleep between polls while waiting on the camera or after a missed frame.
    pub poll_interval: Duration,
    /// Flip frames horizontally so the view behaves like a mirror.
    pub mirror: bool,
    pub output_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_width: CAPTURE_WIDTH,
            capture_height: CAPTURE_HEIGHT,
            zones: default_zones(),
            trigger: TriggerParams::default(),
            background: BackgroundParams::default(),
            keys: KeyBindings::default(),
            capabilities: Capabilities::default(),
            get_ready: Duration::from_secs(3),
            calibration: Duration::from_secs(3),
            camera_ready_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(100),
            mirror: true,
            output_dir: PathBuf::from("captured_photos"),
        }
    }
}

/// The stock layout: a column of three buttons down the left side of the frame.
pub fn default_zones() -> ZoneRegistry {
    [
        ("Capture", 100, 150),
        ("Play Video", 100, 300),
        ("Exit", 100, 450),
    ]
    .into_iter()
    .filter_map(|(name, x, y)| Zone::new(name, x, y, 200, 100).ok())
    .collect::<Vec<_>>()
    .into()
}
