// THEORY:
// The `background_model` module is the boundary between the engine and whatever
// actually separates a moving user from a static scene. The engine never looks at
// raw pixels itself; it only consumes the binary foreground mask produced here.
//
// Key architectural principles:
// 1.  **Pluggable Segmentation**: `MotionModel` is the seam. The console wires in
//     OpenCV's MOG2; `GaussianBackground` is a dependency-free per-pixel model that
//     keeps the crate usable (and testable) without a native vision library.
// 2.  **Fixed Pipeline Around the Model**: `BackgroundModelAdapter` owns the parts
//     that must not vary between backends: a Gaussian pre-filter on the raw frame,
//     then erosion followed by dilation on the mask (a morphological opening).
//     Eroding first lets noise removal dominate hole filling; the order is part of
//     the detector's sensitivity and must not be swapped.
// 3.  **Learn vs. Apply**: During calibration frames are only learned, the mask is
//     thrown away. During detection the post-processed mask is the trigger
//     engine's only per-frame input.
// 4.  **One Model Per Run**: The adapter is built once with fixed sensitivity and is
//     never reset; re-calibration means restarting the session.

use crate::config::BackgroundParams;
use crate::core_modules::morphology::{self, MASK_OFF, MASK_ON};
use image::{GrayImage, Luma, RgbImage};
use tracing::{debug, warn};

/// Initial per-pixel variance for a freshly seen pixel.
const VAR_INIT: f32 = 15.0;
const VAR_MIN: f32 = 4.0;
const VAR_MAX: f32 = 5.0 * VAR_INIT;

/// A stateful foreground/background segmentation primitive.
pub trait MotionModel {
    /// Feeds one frame to the model and returns a 0/255 mask of the same size,
    /// where 255 marks pixels that differ from the learned background.
    fn segment(&mut self, frame: &RgbImage) -> GrayImage;
}

/// A single running Gaussian per pixel.
///
/// The learning rate is `1 / min(frames_seen, history)`, so the first frames
/// converge quickly and the model then settles into a `history`-frame average.
/// Shadows are not modelled; `detect_shadows` is accepted for parity with other
/// backends and ignored.
pub struct GaussianBackground {
    history: u32,
    var_threshold: f32,
    width: u32,
    height: u32,
    mean: Vec<[f32; 3]>,
    variance: Vec<f32>,
    frames_seen: u32,
}

impl GaussianBackground {
    pub fn new(params: &BackgroundParams) -> Self {
        Self {
            history: params.history.max(1),
            var_threshold: params.var_threshold as f32,
            width: 0,
            height: 0,
            mean: Vec::new(),
            variance: Vec::new(),
            frames_seen: 0,
        }
    }

    pub fn frames_seen(&self) -> u32 {
        self.frames_seen
    }

    fn initialize(&mut self, frame: &RgbImage) {
        let (width, height) = frame.dimensions();
        self.width = width;
        self.height = height;
        self.mean = frame
            .pixels()
            .map(|p| [p.0[0] as f32, p.0[1] as f32, p.0[2] as f32])
            .collect();
        self.variance = vec![VAR_INIT; (width * height) as usize];
        self.frames_seen = 1;
    }
}

impl MotionModel for GaussianBackground {
    fn segment(&mut self, frame: &RgbImage) -> GrayImage {
        let (width, height) = frame.dimensions();
        if self.frames_seen == 0 || (width, height) != (self.width, self.height) {
            if self.frames_seen != 0 {
                warn!(
                    old_width = self.width,
                    old_height = self.height,
                    width,
                    height,
                    "frame size changed, relearning background"
                );
            }
            self.initialize(frame);
            return GrayImage::new(width, height);
        }

        self.frames_seen = self.frames_seen.saturating_add(1);
        let alpha = 1.0 / self.frames_seen.min(self.history) as f32;
        let mut mask = GrayImage::new(width, height);

        for (i, (pixel, out)) in frame.pixels().zip(mask.pixels_mut()).enumerate() {
            let mean = &mut self.mean[i];
            let var = &mut self.variance[i];

            let mut dist2 = 0f32;
            let mut diff = [0f32; 3];
            for c in 0..3 {
                diff[c] = pixel.0[c] as f32 - mean[c];
                dist2 += diff[c] * diff[c];
            }

            *out = Luma([if dist2 > self.var_threshold * *var { MASK_ON } else { MASK_OFF }]);

            for c in 0..3 {
                mean[c] += alpha * diff[c];
            }
            *var = (*var + alpha * (dist2 - *var)).clamp(VAR_MIN, VAR_MAX);
        }
        mask
    }
}

/// Smoothing, segmentation and mask clean-up behind one call.
pub struct BackgroundModelAdapter {
    params: BackgroundParams,
    model: Box<dyn MotionModel>,
    frames_learned: u64,
}

impl BackgroundModelAdapter {
    pub fn new(params: BackgroundParams, model: Box<dyn MotionModel>) -> Self {
        debug!(
            history = params.history,
            var_threshold = params.var_threshold,
            detect_shadows = params.detect_shadows,
            "background model constructed"
        );
        Self {
            params,
            model,
            frames_learned: 0,
        }
    }

    /// An adapter over the built-in `GaussianBackground`.
    pub fn with_gaussian(params: BackgroundParams) -> Self {
        let model = GaussianBackground::new(&params);
        Self::new(params, Box::new(model))
    }

    pub fn frames_learned(&self) -> u64 {
        self.frames_learned
    }

    /// Updates the background statistics with a frame; the mask is discarded.
    pub fn learn(&mut self, frame: &RgbImage) {
        let _ = self.segment_smoothed(frame);
    }

    /// Returns the cleaned foreground mask for a frame.
    pub fn apply(&mut self, frame: &RgbImage) -> GrayImage {
        let raw = self.segment_smoothed(frame);
        let opened = morphology::erode(&raw, self.params.erode_iterations);
        morphology::dilate(&opened, self.params.dilate_iterations)
    }

    fn segment_smoothed(&mut self, frame: &RgbImage) -> GrayImage {
        let smoothed = morphology::gaussian_smooth(frame, self.params.blur_kernel);
        let mask = self.model.segment(&smoothed);
        self.frames_learned += 1;
        if mask.dimensions() != frame.dimensions() {
            warn!(
                mask_width = mask.width(),
                mask_height = mask.height(),
                "motion model returned a mask of the wrong size, treating frame as still"
            );
            return GrayImage::new(frame.width(), frame.height());
        }
        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    /// Marks every pixel brighter than mid-grey, ignoring history.
    struct BrightnessModel;

    impl MotionModel for BrightnessModel {
        fn segment(&mut self, frame: &RgbImage) -> GrayImage {
            GrayImage::from_fn(frame.width(), frame.height(), |x, y| {
                Luma([if frame.get_pixel(x, y).0[0] > 128 { MASK_ON } else { MASK_OFF }])
            })
        }
    }

    fn nonzero(mask: &GrayImage) -> u64 {
        morphology::count_nonzero_in(mask, (0, 0, mask.width(), mask.height()))
    }

    #[test]
    fn static_scene_learns_to_empty_mask() {
        let mut adapter = BackgroundModelAdapter::with_gaussian(BackgroundParams::default());
        let scene = RgbImage::from_pixel(32, 24, Rgb([90, 90, 90]));
        for _ in 0..10 {
            adapter.learn(&scene);
        }
        assert_eq!(nonzero(&adapter.apply(&scene)), 0);
        assert_eq!(adapter.frames_learned(), 11);
    }

    #[test]
    fn large_change_shows_up_in_mask() {
        let mut adapter = BackgroundModelAdapter::with_gaussian(BackgroundParams::default());
        let scene = RgbImage::from_pixel(40, 40, Rgb([20, 20, 20]));
        for _ in 0..10 {
            adapter.learn(&scene);
        }
        let mut moved = scene.clone();
        for y in 10..30 {
            for x in 10..30 {
                moved.put_pixel(x, y, Rgb([230, 230, 230]));
            }
        }
        let mask = adapter.apply(&moved);
        assert_eq!(mask.dimensions(), (40, 40));
        assert_eq!(mask.get_pixel(20, 20).0[0], MASK_ON);
        assert_eq!(mask.get_pixel(2, 2).0[0], MASK_OFF);
    }

    #[test]
    fn opening_removes_specks_but_keeps_blocks() {
        let mut adapter = BackgroundModelAdapter::new(BackgroundParams::default(), Box::new(BrightnessModel));
        let mut frame = RgbImage::new(40, 40);
        // An isolated bright dot is softened below threshold or eroded away.
        frame.put_pixel(3, 3, Rgb([255, 255, 255]));
        for y in 15..35 {
            for x in 15..35 {
                frame.put_pixel(x, y, Rgb([255, 255, 255]));
            }
        }
        let mask = adapter.apply(&frame);
        assert_eq!(mask.get_pixel(3, 3).0[0], MASK_OFF);
        assert_eq!(mask.get_pixel(25, 25).0[0], MASK_ON);
    }

    #[test]
    fn mask_is_eroded_before_it_is_dilated() {
        let params = BackgroundParams {
            blur_kernel: 1,
            ..BackgroundParams::default()
        };
        let mut adapter = BackgroundModelAdapter::new(params, Box::new(BrightnessModel));
        let white = Rgb([255, 255, 255]);
        let mut frame = RgbImage::new(24, 24);
        for y in 1..=3 {
            for x in 1..=3 {
                frame.put_pixel(x, y, white);
            }
        }
        for y in 8..=19 {
            for x in 8..=19 {
                frame.put_pixel(x, y, white);
            }
        }
        frame.put_pixel(13, 13, Rgb([0, 0, 0]));
        frame.put_pixel(14, 13, Rgb([0, 0, 0]));

        let mask = adapter.apply(&frame);
        // A closing would keep the speck and fill the hole.
        assert_eq!(mask.get_pixel(2, 2).0[0], MASK_OFF);
        assert_eq!(mask.get_pixel(13, 13).0[0], MASK_OFF);
        assert_eq!(mask.get_pixel(14, 13).0[0], MASK_OFF);
        assert_eq!(mask.get_pixel(10, 10).0[0], MASK_ON);
    }

    #[test]
    fn resized_frames_restart_the_model() {
        let mut model = GaussianBackground::new(&BackgroundParams::default());
        model.segment(&RgbImage::new(8, 8));
        model.segment(&RgbImage::new(8, 8));
        assert_eq!(model.frames_seen(), 2);
        let mask = model.segment(&RgbImage::new(4, 4));
        assert_eq!(mask.dimensions(), (4, 4));
        assert_eq!(model.frames_seen(), 1);
    }
}
