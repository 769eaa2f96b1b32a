// THEORY:
// The engine does not rasterize anything. Each phase describes what should be
// drawn on top of the camera frame as an ordered list of `DrawOp`s, and the
// presentation surface replays that list with its own primitives. Keeping the
// list as data makes the draw order part of the testable contract: zone borders
// and labels are always emitted before any progress fill.

use crate::core_modules::zone::{Point, Zone, ZoneRegistry};

/// An RGB color.
pub type Color = [u8; 3];

pub const BOX_COLOR: Color = [255, 0, 255];
pub const LABEL_COLOR: Color = [255, 255, 255];
pub const PROMPT_COLOR: Color = [255, 255, 0];
pub const GET_READY_COLOR: Color = [0, 255, 0];
pub const ALERT_COLOR: Color = [255, 0, 0];

const BORDER_THICKNESS: i32 = 3;
const LABEL_SCALE: f64 = 0.6;
const PROMPT_SCALE: f64 = 1.0;
const TEXT_THICKNESS: i32 = 2;
const PROMPT_ORIGIN: Point = Point::new(50, 50);
const PROMPT_LINE_HEIGHT: i32 = 40;

/// One drawing instruction in frame-pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// An unfilled rectangle with its top-left at `origin`.
    Outline {
        origin: Point,
        width: i32,
        height: i32,
        color: Color,
        thickness: i32,
    },
    /// A solid rectangle with its top-left at `origin`.
    Fill {
        origin: Point,
        width: i32,
        height: i32,
        color: Color,
    },
    /// Text whose baseline starts at `origin`.
    Text {
        text: String,
        origin: Point,
        color: Color,
        scale: f64,
        thickness: i32,
    },
}

fn border_and_label(zone: &Zone, ops: &mut Vec<DrawOp>) {
    ops.push(DrawOp::Outline {
        origin: zone.top_left,
        width: zone.width(),
        height: zone.height(),
        color: BOX_COLOR,
        thickness: BORDER_THICKNESS,
    });
    ops.push(DrawOp::Text {
        text: zone.name.clone(),
        origin: Point::new(zone.top_left.x + 10, zone.top_left.y + zone.height() - 15),
        color: LABEL_COLOR,
        scale: LABEL_SCALE,
        thickness: TEXT_THICKNESS,
    });
}

/// Borders and labels for every zone, no progress.
pub fn zone_outlines(zones: &ZoneRegistry) -> Vec<DrawOp> {
    let mut ops = Vec::with_capacity(zones.len() * 2);
    for zone in zones.list() {
        border_and_label(zone, &mut ops);
    }
    ops
}

/// Borders and labels for every zone, then one progress fill per zone.
///
/// `progress[i]` is clamped to `0.0..=1.0`; a zero-width fill is skipped.
pub fn zone_progress(zones: &ZoneRegistry, progress: &[f64]) -> Vec<DrawOp> {
    let mut ops = zone_outlines(zones);
    for (zone, &fraction) in zones.list().iter().zip(progress) {
        let width = (zone.width() as f64 * fraction.clamp(0.0, 1.0)) as i32;
        if width > 0 {
            ops.push(DrawOp::Fill {
                origin: zone.top_left,
                width,
                height: zone.height(),
                color: BOX_COLOR,
            });
        }
    }
    ops
}

/// Instruction lines stacked from the top-left of the frame.
pub fn prompt_lines<S: AsRef<str>>(lines: &[S], color: Color) -> Vec<DrawOp> {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| DrawOp::Text {
            text: line.as_ref().to_string(),
            origin: Point::new(PROMPT_ORIGIN.x, PROMPT_ORIGIN.y + PROMPT_LINE_HEIGHT * i as i32),
            color,
            scale: PROMPT_SCALE,
            thickness: TEXT_THICKNESS,
        })
        .collect()
}
