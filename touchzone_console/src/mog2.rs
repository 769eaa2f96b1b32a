use image::{GrayImage, RgbImage};
use opencv::{
    core::{self, Mat, Ptr, Scalar},
    imgproc,
    prelude::*,
    video,
};
use touchzone::{BackgroundParams, MotionModel};
use tracing::warn;

/// OpenCV's mixture-of-Gaussians subtractor behind the engine's `MotionModel`.
pub struct Mog2Model {
    subtractor: Ptr<video::BackgroundSubtractorMOG2>,
}

impl Mog2Model {
    pub fn new(params: &BackgroundParams) -> opencv::Result<Self> {
        let subtractor =
            video::create_background_subtractor_mog2(params.history as i32, params.var_threshold, params.detect_shadows)?;
        Ok(Self { subtractor })
    }

    fn try_segment(&mut self, frame: &RgbImage) -> opencv::Result<GrayImage> {
        let mut rgb = Mat::new_rows_cols_with_default(
            frame.height() as i32,
            frame.width() as i32,
            core::CV_8UC3,
            Scalar::all(0.0),
        )?;
        rgb.data_bytes_mut()?.copy_from_slice(frame.as_raw());
        let mut bgr = Mat::default();
        imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;

        let mut mask = Mat::default();
        self.subtractor.apply(&bgr, &mut mask, -1.0)?;
        let bytes = mask.data_bytes()?.to_vec();
        Ok(GrayImage::from_raw(frame.width(), frame.height(), bytes)
            .unwrap_or_else(|| GrayImage::new(frame.width(), frame.height())))
    }
}

impl MotionModel for Mog2Model {
    fn segment(&mut self, frame: &RgbImage) -> GrayImage {
        self.try_segment(frame).unwrap_or_else(|err| {
            warn!(error = %err, "background subtraction failed, treating frame as still");
            GrayImage::new(frame.width(), frame.height())
        })
    }
}
