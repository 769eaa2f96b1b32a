// THEORY:
// The `device` module is the camera side of the I/O shell. It knows nothing about
// OpenCV or V4L; it defines the two capabilities the engine consumes (`FrameSource`
// to read frames, `CameraProbe` to find devices) and the startup procedures built
// on them: discovery, interactive selection and the wait for a first frame.
//
// Key architectural principles:
// 1.  **Not Ready vs. Missed Frame**: A source that is not opened yet is "not
//     ready"; an opened source whose `read` returns `None` missed a frame. Startup
//     waits through both until a timeout, the session loop decides per phase what a
//     missed frame means.
// 2.  **Guaranteed Release**: `CaptureGuard` owns the source for the whole run and
//     releases it in `Drop`, so every exit path, including early errors, gives the
//     camera back.
// 3.  **Forgiving Selection**: Bad input at the selection prompt only re-prompts.

use crate::clock::Clock;
use crate::error::{SessionError, SessionResult};
use image::RgbImage;
use std::io::{BufRead, Write};
use std::ops::{Deref, DerefMut, Range};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A camera or any other producer of RGB frames.
pub trait FrameSource {
    /// Whether the device has been opened and may produce frames.
    fn is_opened(&self) -> bool;

    /// Reads the next frame. `None` means the read failed this time.
    fn read(&mut self) -> Option<RgbImage>;

    /// Requests a capture resolution. Devices may pick the nearest they support.
    fn set_resolution(&mut self, width: u32, height: u32);

    /// Gives the device back to the system. Must be safe to call twice.
    fn release(&mut self);
}

/// Checks whether a device index answers with a frame.
pub trait CameraProbe {
    fn probe(&mut self, index: i32) -> bool;
}

/// Reads a frame and optionally mirrors it horizontally.
pub fn read_frame<S: FrameSource + ?Sized>(source: &mut S, mirror: bool) -> Option<RgbImage> {
    let mut frame = source.read()?;
    if mirror {
        image::imageops::flip_horizontal_in_place(&mut frame);
    }
    Some(frame)
}

/// Probes every index in `range` and returns those that answered.
pub fn discover_cameras<P: CameraProbe>(probe: &mut P, range: Range<i32>) -> Vec<i32> {
    let found: Vec<i32> = range.filter(|&index| probe.probe(index)).collect();
    info!(cameras = ?found, "camera discovery finished");
    found
}

/// Picks one of `available`.
///
/// No device is an error, a single device is taken without asking, otherwise the
/// user is prompted on `output` until a listed index is read from `input`.
pub fn select_camera<R: BufRead, W: Write>(
    available: &[i32],
    probe_range: Range<i32>,
    input: &mut R,
    output: &mut W,
) -> SessionResult<i32> {
    match available {
        [] => Err(SessionError::NoCameraFound {
            first: probe_range.start,
            end: probe_range.end,
        }),
        [only] => {
            info!(index = only, "using the only available camera");
            Ok(*only)
        }
        _ => {
            writeln!(output, "Available cameras: {available:?}")?;
            loop {
                write!(output, "Select a camera index: ")?;
                output.flush()?;

                let mut line = String::new();
                if input.read_line(&mut line)? == 0 {
                    return Err(SessionError::SelectionAborted);
                }
                match line.trim().parse::<i32>() {
                    Ok(index) if available.contains(&index) => return Ok(index),
                    Ok(index) => {
                        writeln!(output, "Camera {index} is not in {available:?}, try again.")?;
                    }
                    Err(_) => {
                        writeln!(output, "'{}' is not a number, try again.", line.trim())?;
                    }
                }
            }
        }
    }
}

/// Polls `source` until it is opened and returns a frame, or `timeout` passes.
pub fn wait_until_ready<S: FrameSource + ?Sized, C: Clock>(
    source: &mut S,
    clock: &C,
    index: i32,
    timeout: Duration,
    poll_interval: Duration,
) -> SessionResult<()> {
    info!(index, timeout_secs = timeout.as_secs(), "waiting for camera to start");
    let started = clock.now();
    while clock.now().saturating_sub(started) < timeout {
        if source.is_opened() && source.read().is_some() {
            info!(index, "camera ready");
            return Ok(());
        }
        debug!(index, "camera not ready yet");
        clock.sleep(poll_interval);
    }
    warn!(index, "camera produced no frame before the timeout");
    Err(SessionError::DeviceUnavailable {
        index,
        timeout_secs: timeout.as_secs(),
    })
}

/// Owns a `FrameSource` and releases it when dropped.
pub struct CaptureGuard<S: FrameSource> {
    source: S,
    released: bool,
}

impl<S: FrameSource> CaptureGuard<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            released: false,
        }
    }

    pub fn release(&mut self) {
        if !self.released {
            self.source.release();
            self.released = true;
            info!("camera released");
        }
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<S: FrameSource> Deref for CaptureGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.source
    }
}

impl<S: FrameSource> DerefMut for CaptureGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.source
    }
}

impl<S: FrameSource> Drop for CaptureGuard<S> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::cell::Cell;
    use std::io::Cursor;
    use std::rc::Rc;

    struct StepClock(Cell<Duration>);

    impl Clock for StepClock {
        fn now(&self) -> Duration {
            self.0.get()
        }
        fn sleep(&self, duration: Duration) {
            self.0.set(self.0.get() + duration);
        }
    }

    struct SlowCamera {
        reads_until_ready: u32,
        releases: Rc<Cell<u32>>,
    }

    impl FrameSource for SlowCamera {
        fn is_opened(&self) -> bool {
            true
        }
        fn read(&mut self) -> Option<RgbImage> {
            if self.reads_until_ready == 0 {
                let mut frame = RgbImage::new(2, 1);
                frame.put_pixel(0, 0, Rgb([255, 0, 0]));
                Some(frame)
            } else {
                self.reads_until_ready -= 1;
                None
            }
        }
        fn set_resolution(&mut self, _width: u32, _height: u32) {}
        fn release(&mut self) {
            self.releases.set(self.releases.get() + 1);
        }
    }

    fn camera(reads_until_ready: u32) -> (SlowCamera, Rc<Cell<u32>>) {
        let releases = Rc::new(Cell::new(0));
        let cam = SlowCamera {
            reads_until_ready,
            releases: releases.clone(),
        };
        (cam, releases)
    }

    struct ListedProbe(Vec<i32>);

    impl CameraProbe for ListedProbe {
        fn probe(&mut self, index: i32) -> bool {
            self.0.contains(&index)
        }
    }

    #[test]
    fn discovery_keeps_probe_order() {
        let mut probe = ListedProbe(vec![3, 0]);
        assert_eq!(discover_cameras(&mut probe, 0..5), [0, 3]);
    }

    #[test]
    fn single_camera_is_selected_without_prompting() {
        let mut out = Vec::new();
        let index = select_camera(&[2], 0..5, &mut Cursor::new(""), &mut out).unwrap();
        assert_eq!(index, 2);
        assert!(out.is_empty());
    }

    #[test]
    fn no_camera_is_an_error() {
        let err = select_camera(&[], 0..5, &mut Cursor::new(""), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, SessionError::NoCameraFound { first: 0, end: 5 }));
    }

    #[test]
    fn invalid_selections_reprompt() {
        let mut out = Vec::new();
        let mut input = Cursor::new("abc\n7\n\n1\n");
        let index = select_camera(&[0, 1], 0..5, &mut input, &mut out).unwrap();
        assert_eq!(index, 1);
        let prompts = String::from_utf8(out).unwrap().matches("Select a camera index").count();
        assert_eq!(prompts, 4);
    }

    #[test]
    fn closed_input_aborts_selection() {
        let err = select_camera(&[0, 1], 0..5, &mut Cursor::new("9\n"), &mut Vec::new()).unwrap_err();
        assert!(matches!(err, SessionError::SelectionAborted));
    }

    #[test]
    fn wait_succeeds_once_a_frame_arrives() {
        let clock = StepClock(Cell::new(Duration::ZERO));
        let (mut cam, _) = camera(3);
        let poll = Duration::from_millis(100);
        wait_until_ready(&mut cam, &clock, 0, Duration::from_secs(10), poll).unwrap();
        assert_eq!(clock.now(), poll * 3);
    }

    #[test]
    fn wait_times_out() {
        let clock = StepClock(Cell::new(Duration::ZERO));
        let (mut cam, _) = camera(u32::MAX);
        let err = wait_until_ready(&mut cam, &clock, 4, Duration::from_secs(1), Duration::from_millis(100))
            .unwrap_err();
        assert!(matches!(err, SessionError::DeviceUnavailable { index: 4, timeout_secs: 1 }));
    }

    #[test]
    fn guard_releases_once_on_drop() {
        let (cam, releases) = camera(0);
        {
            let mut guard = CaptureGuard::new(cam);
            guard.release();
            assert!(guard.is_released());
        }
        assert_eq!(releases.get(), 1);

        let (cam, releases) = camera(0);
        drop(CaptureGuard::new(cam));
        assert_eq!(releases.get(), 1);
    }

    #[test]
    fn read_frame_mirrors() {
        let (mut cam, _) = camera(0);
        let frame = read_frame(&mut cam, true).unwrap();
        assert_eq!(frame.get_pixel(1, 0).0, [255, 0, 0]);
        let frame = read_frame(&mut cam, false).unwrap();
        assert_eq!(frame.get_pixel(0, 0).0, [255, 0, 0]);
    }
}
