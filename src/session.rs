// THEORY:
// The `session` module is the top-level API of the engine. A `ZoneSession` is the
// calibration state machine: it owns the camera, the presentation surface, the
// zone registry, the background model and the trigger engine, and walks them
// through Idle -> GetReady -> Calibrating -> Active until the run ends.
//
// Key architectural principles:
// 1.  **One Loop, One Thread**: Every phase is a poll loop of the same shape: read a
//     frame, process it, present it, poll one key (and, while editing, one batch of
//     pointer events). Nothing runs in the background and a quit key is only seen
//     at the next tick.
// 2.  **Phase-Local Failure Policy**: A missed frame while idle, counting down or
//     calibrating skips the tick after a short sleep. The same miss while detecting
//     is the end of the stream and ends the run normally.
// 3.  **Optional Capabilities**: Layout editing and photo capture are switches in
//     `Capabilities`, so the plain detector and the full-featured variant are the
//     same state machine.
// 4.  **Release on Every Path**: Shutdown runs when `run` finishes and again from
//     `Drop` (as a no-op if already done), so the camera is given back and views
//     closed even if startup fails or the caller drops the session early.

use crate::clock::Clock;
use crate::config::SessionConfig;
use crate::core_modules::background_model::{BackgroundModelAdapter, MotionModel};
use crate::core_modules::calibration::{Phase, PhaseTimer};
use crate::core_modules::layout_editor::{self, EditorExit};
use crate::core_modules::overlay::{self, ALERT_COLOR, GET_READY_COLOR, PROMPT_COLOR};
use crate::core_modules::trigger_engine::{Command, TriggerEvent, ZoneTriggerEngine};
use crate::core_modules::utils::photo_writer::photo_writer::{JpegPhotoWriter, PhotoSink};
use crate::core_modules::zone::ZoneRegistry;
use crate::device::{self, CaptureGuard, FrameSource};
use crate::error::SessionResult;
use crate::surface::Surface;
use image::RgbImage;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Why a session stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// The quit key was pressed in the given phase.
    QuitKey(Phase),
    /// A zone bound to `Exit` fired.
    ExitCommand,
    /// A frame read failed while detecting.
    StreamEnded,
}

/// A phase change and the clock time it happened at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTransition {
    pub from: Phase,
    pub to: Phase,
    pub at: Duration,
}

/// What happened during a run.
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub termination: Termination,
    pub transitions: Vec<PhaseTransition>,
    /// Every zone firing, in order, including the one that ended the run.
    pub triggers: Vec<TriggerEvent>,
    pub photos: Vec<PathBuf>,
    /// Clock time of the first detection tick, if detection was reached.
    pub detection_started_at: Option<Duration>,
    /// The registry as it stood at the end, including layout edits.
    pub zones: ZoneRegistry,
}

pub struct ZoneSession<S: FrameSource, W: Surface, C: Clock> {
    config: SessionConfig,
    source: CaptureGuard<S>,
    surface: W,
    clock: C,
    registry: ZoneRegistry,
    background: BackgroundModelAdapter,
    engine: ZoneTriggerEngine,
    photo_sink: Option<Box<dyn PhotoSink>>,
    phase: Phase,
    termination: Option<Termination>,
    transitions: Vec<PhaseTransition>,
    triggers: Vec<TriggerEvent>,
    photos: Vec<PathBuf>,
    detection_started_at: Option<Duration>,
    closed: bool,
}

impl<S: FrameSource, W: Surface, C: Clock> ZoneSession<S, W, C> {
    pub fn new(config: SessionConfig, source: S, surface: W, clock: C, model: Box<dyn MotionModel>) -> Self {
        let registry = config.zones.clone();
        let background = BackgroundModelAdapter::new(config.background.clone(), model);
        let engine = ZoneTriggerEngine::new(config.trigger.clone(), registry.len());
        let photo_sink: Option<Box<dyn PhotoSink>> = if config.capabilities.capture_to_file {
            Some(Box::new(JpegPhotoWriter::new(config.output_dir.clone())))
        } else {
            None
        };
        Self {
            config,
            source: CaptureGuard::new(source),
            surface,
            clock,
            registry,
            background,
            engine,
            photo_sink,
            phase: Phase::Idle,
            termination: None,
            transitions: Vec::new(),
            triggers: Vec::new(),
            photos: Vec::new(),
            detection_started_at: None,
            closed: false,
        }
    }

    /// Replaces where captured photos go. Ignored if capture is disabled.
    pub fn with_photo_sink(mut self, sink: Box<dyn PhotoSink>) -> Self {
        if self.config.capabilities.capture_to_file {
            self.photo_sink = Some(sink);
        }
        self
    }

    /// Waits for the camera to deliver a first frame, then requests the capture size.
    pub fn prepare(&mut self, camera_index: i32) -> SessionResult<()> {
        device::wait_until_ready(
            &mut *self.source,
            &self.clock,
            camera_index,
            self.config.camera_ready_timeout,
            self.config.poll_interval,
        )?;
        self.source
            .set_resolution(self.config.capture_width, self.config.capture_height);
        Ok(())
    }

    /// Runs the state machine to completion and releases every resource.
    pub fn run(mut self) -> SessionReport {
        info!(zones = self.registry.len(), "session started");
        while self.phase != Phase::Terminated {
            let next = match self.phase {
                Phase::Idle => self.run_idle(),
                Phase::EditingLayout => self.run_editor(),
                Phase::GetReady => self.run_get_ready(),
                Phase::Calibrating => self.run_calibration(),
                Phase::Active => self.run_active(),
                Phase::Terminated => Phase::Terminated,
            };
            self.transition(next);
        }
        self.shutdown();

        SessionReport {
            termination: self.termination.unwrap_or(Termination::StreamEnded),
            transitions: std::mem::take(&mut self.transitions),
            triggers: std::mem::take(&mut self.triggers),
            photos: std::mem::take(&mut self.photos),
            detection_started_at: self.detection_started_at,
            zones: std::mem::take(&mut self.registry),
        }
    }

    fn transition(&mut self, to: Phase) {
        let from = self.phase;
        let at = self.clock.now();
        info!(%from, %to, at_ms = at.as_millis() as u64, "phase transition");
        self.transitions.push(PhaseTransition { from, to, at });
        self.phase = to;
    }

    fn next_frame(&mut self) -> Option<RgbImage> {
        device::read_frame(&mut *self.source, self.config.mirror)
    }

    fn skip_tick(&self) {
        debug!(phase = %self.phase, "frame read failed, skipping tick");
        self.clock.sleep(self.config.poll_interval);
    }

    fn run_idle(&mut self) -> Phase {
        let keys = self.config.keys.clone();
        let editing = self.config.capabilities.editing;
        let mut lines = vec![format!("Press '{}' to start calibration", keys.start)];
        if editing {
            lines.push(format!("Press '{}' to edit layout", keys.edit));
        }

        loop {
            let Some(frame) = self.next_frame() else {
                self.skip_tick();
                continue;
            };
            let mut ops = overlay::prompt_lines(&lines, PROMPT_COLOR);
            ops.extend(overlay::zone_outlines(&self.registry));
            self.surface.present(&frame, &ops);

            match self.surface.poll_key() {
                Some(key) if key == keys.start => {
                    info!("start requested, get ready");
                    return Phase::GetReady;
                }
                Some(key) if editing && key == keys.edit => return Phase::EditingLayout,
                Some(key) if key == keys.quit => {
                    self.termination = Some(Termination::QuitKey(Phase::Idle));
                    return Phase::Terminated;
                }
                _ => {}
            }
        }
    }

    fn run_editor(&mut self) -> Phase {
        let registry = std::mem::take(&mut self.registry);
        let (registry, exit) = layout_editor::run_layout_editor(
            registry,
            &mut *self.source,
            &mut self.surface,
            self.config.keys.commit,
            self.config.mirror,
        );
        if exit == EditorExit::CaptureFailed {
            warn!("layout editor aborted, keeping edits made so far");
        }
        self.registry = registry;
        self.engine.reset(self.registry.len());
        Phase::Idle
    }

    /// Shared loop for the two timed setup phases.
    fn run_timed<F>(&mut self, duration: Duration, label: &str, color: overlay::Color, mut on_frame: F)
    where
        F: FnMut(&mut Self, &RgbImage),
    {
        let timer = PhaseTimer::start(&self.clock, duration);
        while !timer.is_done(&self.clock) {
            let Some(frame) = self.next_frame() else {
                self.skip_tick();
                continue;
            };
            let remaining = timer.remaining_seconds(&self.clock);
            let mut ops = overlay::prompt_lines(&[format!("{label}{remaining}")], color);
            ops.extend(overlay::zone_outlines(&self.registry));
            self.surface.present(&frame, &ops);
            let _ = self.surface.poll_key();
            on_frame(self, &frame);
        }
    }

    fn run_get_ready(&mut self) -> Phase {
        let duration = self.config.get_ready;
        self.run_timed(duration, "Get Ready! Calibration starts in: ", GET_READY_COLOR, |_, _| {});
        info!(seconds = self.config.calibration.as_secs_f64(), "calibrating background, keep still");
        Phase::Calibrating
    }

    fn run_calibration(&mut self) -> Phase {
        let duration = self.config.calibration;
        self.run_timed(duration, "Calibrating... Keep Still: ", ALERT_COLOR, |session, frame| {
            session.background.learn(frame);
        });
        info!(frames = self.background.frames_learned(), "calibration complete");
        Phase::Active
    }

    fn run_active(&mut self) -> Phase {
        self.engine.reset(self.registry.len());
        self.detection_started_at = Some(self.clock.now());

        loop {
            let Some(frame) = self.next_frame() else {
                warn!("frame read failed during detection, ending session");
                self.termination = Some(Termination::StreamEnded);
                return Phase::Terminated;
            };

            let mask = self.background.apply(&frame);
            let events = self.engine.update(&mask, &self.registry);
            for event in events {
                let command = event.command;
                self.triggers.push(event);
                match command {
                    Some(Command::Exit) => {
                        info!("exit zone triggered");
                        self.termination = Some(Termination::ExitCommand);
                        return Phase::Terminated;
                    }
                    Some(Command::Capture) => self.capture(&frame),
                    None => debug!("zone has no bound command"),
                }
            }

            let ops = overlay::zone_progress(&self.registry, &self.engine.progress());
            self.surface.present(&frame, &ops);
            self.surface.present_mask(&mask);

            if self.surface.poll_key() == Some(self.config.keys.quit) {
                self.termination = Some(Termination::QuitKey(Phase::Active));
                return Phase::Terminated;
            }
        }
    }

    fn capture(&mut self, frame: &RgbImage) {
        let Some(sink) = self.photo_sink.as_mut() else {
            debug!("capture triggered but photo capture is disabled");
            return;
        };
        match sink.save(frame) {
            Ok(path) => self.photos.push(path),
            Err(err) => warn!(error = %err, "failed to save photo"),
        }
    }

    fn shutdown(&mut self) {
        if self.closed {
            return;
        }
        self.source.release();
        self.surface.close();
        self.closed = true;
        info!("session closed");
    }
}

impl<S: FrameSource, W: Surface, C: Clock> Drop for ZoneSession<S, W, C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
