use image::RgbImage;
use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use touchzone::{CameraProbe, FrameSource};
use tracing::{debug, warn};

/// A V4L/DirectShow/AVFoundation camera opened through OpenCV.
pub struct OpenCvCamera {
    capture: VideoCapture,
    frame: Mat,
    rgb: Mat,
}

impl OpenCvCamera {
    pub fn open(index: i32) -> opencv::Result<Self> {
        let capture = VideoCapture::new(index, videoio::CAP_ANY)?;
        Ok(Self {
            capture,
            frame: Mat::default(),
            rgb: Mat::default(),
        })
    }

    /// Converts the last BGR frame into an owned RGB image.
    fn to_rgb(&mut self) -> opencv::Result<Option<RgbImage>> {
        imgproc::cvt_color(&self.frame, &mut self.rgb, imgproc::COLOR_BGR2RGB, 0)?;
        let (width, height) = (self.rgb.cols() as u32, self.rgb.rows() as u32);
        let bytes = if self.rgb.is_continuous() {
            self.rgb.data_bytes()?.to_vec()
        } else {
            self.rgb.try_clone()?.data_bytes()?.to_vec()
        };
        Ok(RgbImage::from_raw(width, height, bytes))
    }
}

impl FrameSource for OpenCvCamera {
    fn is_opened(&self) -> bool {
        self.capture.is_opened().unwrap_or(false)
    }

    fn read(&mut self) -> Option<RgbImage> {
        match self.capture.read(&mut self.frame) {
            Ok(true) if !self.frame.empty() => {}
            Ok(_) => return None,
            Err(err) => {
                debug!(error = %err, "camera read failed");
                return None;
            }
        }
        self.to_rgb().unwrap_or_else(|err| {
            warn!(error = %err, "could not convert camera frame");
            None
        })
    }

    fn set_resolution(&mut self, width: u32, height: u32) {
        let requested = [
            (videoio::CAP_PROP_FRAME_WIDTH, width),
            (videoio::CAP_PROP_FRAME_HEIGHT, height),
        ];
        for (prop, value) in requested {
            if let Err(err) = self.capture.set(prop, f64::from(value)) {
                warn!(error = %err, prop, value, "camera rejected resolution");
            }
        }
    }

    fn release(&mut self) {
        if let Err(err) = self.capture.release() {
            warn!(error = %err, "camera release failed");
        }
    }
}

/// Opens each index briefly and checks for a frame.
pub struct OpenCvProbe;

impl CameraProbe for OpenCvProbe {
    fn probe(&mut self, index: i32) -> bool {
        let Ok(mut capture) = VideoCapture::new(index, videoio::CAP_ANY) else {
            return false;
        };
        let mut frame = Mat::default();
        let answered = capture.is_opened().unwrap_or(false)
            && capture.read(&mut frame).unwrap_or(false)
            && !frame.empty();
        let _ = capture.release();
        debug!(index, answered, "probed camera");
        answered
    }
}
