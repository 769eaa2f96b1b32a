//! The presentation boundary: windows, key polling and pointer input.

use crate::core_modules::overlay::DrawOp;
use crate::core_modules::zone::Point;
use image::{GrayImage, RgbImage};

/// A pointer event in frame-pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerEvent {
    Press(Point),
    Move(Point),
    Release(Point),
}

/// Where frames are shown and input is read from.
///
/// A tick presents one frame, then polls at most one key and drains whatever
/// pointer events arrived since the previous drain. Implementations that receive
/// pointer input through callbacks only queue events there; the engine applies
/// them when it calls `poll_pointer`.
pub trait Surface {
    /// Shows `frame` with `overlay` drawn on top, in order.
    fn present(&mut self, frame: &RgbImage, overlay: &[DrawOp]);

    /// Shows the foreground mask in an auxiliary view, if the surface has one.
    fn present_mask(&mut self, _mask: &GrayImage) {}

    /// Returns the key pressed since the last poll, if any.
    fn poll_key(&mut self) -> Option<char>;

    /// Starts delivering pointer events for the main view.
    fn attach_pointer(&mut self) {}

    /// Drains pointer events queued since the last call.
    fn poll_pointer(&mut self) -> Vec<PointerEvent> {
        Vec::new()
    }

    /// Stops delivering pointer events and drops any still queued.
    fn detach_pointer(&mut self) {}

    /// Closes every view. Called exactly once when the session ends.
    fn close(&mut self);
}
