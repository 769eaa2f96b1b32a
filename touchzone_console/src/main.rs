mod camera;
mod mog2;
mod window;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use touchzone::config::CAMERA_PROBE_RANGE;
use touchzone::device::{discover_cameras, select_camera};
use touchzone::{GaussianBackground, MotionModel, SessionConfig, SystemClock, Termination, ZoneSession};
use tracing::info;
use tracing_subscriber::EnvFilter;

use camera::{OpenCvCamera, OpenCvProbe};
use mog2::Mog2Model;
use window::HighGuiSurface;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Backend {
    /// OpenCV's MOG2 subtractor.
    Mog2,
    /// The built-in single-Gaussian model.
    Gaussian,
}

/// Trigger on-screen zones by holding a hand over them in front of a webcam.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Camera index to use. Probes 0..5 and asks when omitted.
    #[arg(short, long)]
    camera: Option<i32>,

    /// Where the Capture zone saves photos.
    #[arg(short, long, default_value = "captured_photos")]
    output_dir: PathBuf,

    #[arg(long, default_value_t = touchzone::config::CAPTURE_WIDTH)]
    width: u32,

    #[arg(long, default_value_t = touchzone::config::CAPTURE_HEIGHT)]
    height: u32,

    /// Seconds of countdown before calibration.
    #[arg(long, default_value_t = 3)]
    get_ready: u64,

    /// Seconds spent learning the empty background.
    #[arg(long, default_value_t = 3)]
    calibration: u64,

    #[arg(long, value_enum, default_value_t = Backend::Mog2)]
    backend: Backend,

    /// Disable the drag-and-drop layout editor.
    #[arg(long)]
    no_edit: bool,

    /// Fire the Capture zone without writing photos.
    #[arg(long)]
    no_capture: bool,

    /// Show frames as the camera delivers them instead of mirrored.
    #[arg(long)]
    no_mirror: bool,

    /// Do not open the foreground mask window.
    #[arg(long)]
    hide_mask: bool,
}

fn main() -> anyhow::Result<()> {
    // --- 1. Logging & Argument Parsing ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("touchzone=info,touchzone_console=info")))
        .init();
    let args = Args::parse();

    let mut config = SessionConfig {
        capture_width: args.width,
        capture_height: args.height,
        get_ready: Duration::from_secs(args.get_ready),
        calibration: Duration::from_secs(args.calibration),
        mirror: !args.no_mirror,
        output_dir: args.output_dir.clone(),
        ..SessionConfig::default()
    };
    config.capabilities.editing = !args.no_edit;
    config.capabilities.capture_to_file = !args.no_capture;

    // --- 2. Camera Discovery & Selection ---
    let index = match args.camera {
        Some(index) => index,
        None => {
            let available = discover_cameras(&mut OpenCvProbe, CAMERA_PROBE_RANGE);
            let stdin = std::io::stdin();
            select_camera(&available, CAMERA_PROBE_RANGE, &mut stdin.lock(), &mut std::io::stdout())?
        }
    };
    let camera = OpenCvCamera::open(index).with_context(|| format!("opening camera {index}"))?;

    // --- 3. Engine Initialization ---
    let model: Box<dyn MotionModel> = match args.backend {
        Backend::Mog2 => Box::new(Mog2Model::new(&config.background).context("creating MOG2 subtractor")?),
        Backend::Gaussian => Box::new(GaussianBackground::new(&config.background)),
    };
    let surface = HighGuiSurface::new(!args.hide_mask);
    let mut session = ZoneSession::new(config, camera, surface, SystemClock::default(), model);
    session.prepare(index)?;

    // --- 4. Main Loop ---
    let report = session.run();

    // --- 5. Summary ---
    match report.termination {
        Termination::QuitKey(phase) => info!(%phase, "quit by key"),
        Termination::ExitCommand => info!("exit zone triggered"),
        Termination::StreamEnded => info!("camera stream ended"),
    }
    for photo in &report.photos {
        println!("Saved {}", photo.display());
    }
    println!(
        "Session finished: {} trigger(s), {} photo(s).",
        report.triggers.len(),
        report.photos.len()
    );
    Ok(())
}
