use image::{GrayImage, RgbImage};
use opencv::{
    core::{self, Mat, Rect, Scalar},
    highgui, imgproc,
    prelude::*,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use touchzone::{DrawOp, Point, PointerEvent, Surface};
use tracing::warn;

pub const MAIN_WINDOW: &str = "Hand Gesture Interface";
pub const MASK_WINDOW: &str = "Foreground Mask";

type PointerQueue = Arc<Mutex<VecDeque<PointerEvent>>>;

/// The main camera view plus an optional mask view, shown with highgui.
pub struct HighGuiSurface {
    show_mask: bool,
    pointer: PointerQueue,
    windows_open: bool,
}

impl HighGuiSurface {
    pub fn new(show_mask: bool) -> Self {
        Self {
            show_mask,
            pointer: Arc::default(),
            windows_open: false,
        }
    }

    fn ensure_windows(&mut self) -> opencv::Result<()> {
        if !self.windows_open {
            highgui::named_window(MAIN_WINDOW, highgui::WINDOW_AUTOSIZE)?;
            if self.show_mask {
                highgui::named_window(MASK_WINDOW, highgui::WINDOW_AUTOSIZE)?;
            }
            self.windows_open = true;
        }
        Ok(())
    }

    fn try_present(&mut self, frame: &RgbImage, overlay: &[DrawOp]) -> opencv::Result<()> {
        self.ensure_windows()?;
        let mut canvas = rgb_to_bgr(frame)?;
        for op in overlay {
            draw(&mut canvas, op)?;
        }
        highgui::imshow(MAIN_WINDOW, &canvas)
    }

    fn try_present_mask(&mut self, mask: &GrayImage) -> opencv::Result<()> {
        self.ensure_windows()?;
        let mut view = Mat::new_rows_cols_with_default(
            mask.height() as i32,
            mask.width() as i32,
            core::CV_8UC1,
            Scalar::all(0.0),
        )?;
        view.data_bytes_mut()?.copy_from_slice(mask.as_raw());
        highgui::imshow(MASK_WINDOW, &view)
    }
}

fn rgb_to_bgr(frame: &RgbImage) -> opencv::Result<Mat> {
    let mut rgb = Mat::new_rows_cols_with_default(
        frame.height() as i32,
        frame.width() as i32,
        core::CV_8UC3,
        Scalar::all(0.0),
    )?;
    rgb.data_bytes_mut()?.copy_from_slice(frame.as_raw());
    let mut bgr = Mat::default();
    imgproc::cvt_color(&rgb, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
    Ok(bgr)
}

fn scalar([r, g, b]: [u8; 3]) -> Scalar {
    Scalar::new(f64::from(b), f64::from(g), f64::from(r), 0.0)
}

fn draw(canvas: &mut Mat, op: &DrawOp) -> opencv::Result<()> {
    match op {
        DrawOp::Outline {
            origin,
            width,
            height,
            color,
            thickness,
        } => {
            let rect = Rect::new(origin.x, origin.y, *width, *height);
            imgproc::rectangle(canvas, rect, scalar(*color), *thickness, imgproc::LINE_8, 0)
        }
        DrawOp::Fill {
            origin,
            width,
            height,
            color,
        } => {
            let rect = Rect::new(origin.x, origin.y, *width, *height);
            imgproc::rectangle(canvas, rect, scalar(*color), imgproc::FILLED, imgproc::LINE_8, 0)
        }
        DrawOp::Text {
            text,
            origin,
            color,
            scale,
            thickness,
        } => imgproc::put_text(
            canvas,
            text,
            core::Point::new(origin.x, origin.y),
            imgproc::FONT_HERSHEY_SIMPLEX,
            *scale,
            scalar(*color),
            *thickness,
            imgproc::LINE_8,
            false,
        ),
    }
}

impl Surface for HighGuiSurface {
    fn present(&mut self, frame: &RgbImage, overlay: &[DrawOp]) {
        if let Err(err) = self.try_present(frame, overlay) {
            warn!(error = %err, "failed to show frame");
        }
    }

    fn present_mask(&mut self, mask: &GrayImage) {
        if self.show_mask {
            if let Err(err) = self.try_present_mask(mask) {
                warn!(error = %err, "failed to show mask");
            }
        }
    }

    fn poll_key(&mut self) -> Option<char> {
        match highgui::wait_key(1) {
            Ok(-1) | Err(_) => None,
            Ok(code) => Some(char::from((code & 0xFF) as u8)),
        }
    }

    fn attach_pointer(&mut self) {
        if let Err(err) = self.ensure_windows() {
            warn!(error = %err, "cannot open window for pointer input");
            return;
        }
        let queue = Arc::clone(&self.pointer);
        let callback: Box<dyn FnMut(i32, i32, i32, i32) + Send + Sync> = Box::new(move |event, x, y, _flags| {
            let p = Point::new(x, y);
            let event = match event {
                highgui::EVENT_LBUTTONDOWN => PointerEvent::Press(p),
                highgui::EVENT_MOUSEMOVE => PointerEvent::Move(p),
                highgui::EVENT_LBUTTONUP => PointerEvent::Release(p),
                _ => return,
            };
            if let Ok(mut queue) = queue.lock() {
                queue.push_back(event);
            }
        });
        if let Err(err) = highgui::set_mouse_callback(MAIN_WINDOW, Some(callback)) {
            warn!(error = %err, "failed to attach mouse callback");
        }
    }

    fn poll_pointer(&mut self) -> Vec<PointerEvent> {
        match self.pointer.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => Vec::new(),
        }
    }

    fn detach_pointer(&mut self) {
        if self.windows_open {
            if let Err(err) = highgui::set_mouse_callback(MAIN_WINDOW, None) {
                warn!(error = %err, "failed to detach mouse callback");
            }
        }
        if let Ok(mut queue) = self.pointer.lock() {
            queue.clear();
        }
    }

    fn close(&mut self) {
        if self.windows_open {
            if let Err(err) = highgui::destroy_all_windows() {
                warn!(error = %err, "failed to close windows");
            }
            self.windows_open = false;
        }
    }
}
