// THEORY:
// This file is the main entry point for the `touchzone` library crate. It exposes
// the `ZoneSession` state machine and its configuration as the high-level API,
// together with the collaborator traits (`FrameSource`, `CameraProbe`, `Surface`,
// `MotionModel`, `PhotoSink`, `Clock`) a host application implements to plug in a
// real camera, windows and a segmentation backend.
//
// The detection core (zones, layout editor, background model adapter, trigger
// engine, calibration phases) lives in `core_modules` and is usable on its own.

pub mod clock;
pub mod config;
pub mod core_modules;
pub mod device;
pub mod error;
pub mod session;
pub mod surface;

pub use clock::{Clock, SystemClock};
pub use config::{BackgroundParams, Capabilities, KeyBindings, SessionConfig, TriggerParams};
pub use core_modules::background_model::{BackgroundModelAdapter, GaussianBackground, MotionModel};
pub use core_modules::calibration::Phase;
pub use core_modules::overlay::DrawOp;
pub use core_modules::trigger_engine::{Command, TriggerEvent, ZoneTriggerEngine};
pub use core_modules::utils::photo_writer::photo_writer::{JpegPhotoWriter, PhotoSink};
pub use core_modules::zone::{Point, Zone, ZoneRegistry};
pub use device::{CameraProbe, FrameSource};
pub use error::{PhotoError, SessionError, SessionResult, ZoneError};
pub use session::{PhaseTransition, SessionReport, Termination, ZoneSession};
pub use surface::{PointerEvent, Surface};
