// THEORY:
// The `zone` module holds the only geometry the engine knows about: a short,
// ordered list of named rectangles laid over the camera frame. Each rectangle is
// a "button" the user presses by moving inside it.
//
// Key architectural principles:
// 1.  **Ordered Identity**: A zone's position in the `ZoneRegistry` is its identity
//     for the rest of the system. The trigger engine keeps one accumulator per
//     index, so the order must stay stable for the lifetime of a run.
// 2.  **First Match Wins**: Hit-testing walks the list front to back and returns the
//     first zone that contains the point. Earlier zones shadow later ones where
//     they overlap, which decides which zone a drag grabs in the layout editor.
// 3.  **No Clamping**: Geometry is free-form frame-pixel space. A zone may be
//     dragged partly or fully off the frame; consumers clip when they sample.
// 4.  **Explicit Ownership**: The registry is a plain value. The layout editor
//     takes it by value and hands it back, the trigger engine borrows it. There is
//     no global zone list.

use crate::error::ZoneError;

/// An integer coordinate in frame-pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// A named rectangular hit-region bound to a command by its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zone {
    /// The human-readable label, also used as the command identifier.
    pub name: String,
    /// The top-left corner in frame pixels. May lie outside the frame.
    pub top_left: Point,
    /// Width in pixels, always positive.
    width: i32,
    /// Height in pixels, always positive.
    height: i32,
}

impl Zone {
    pub fn new(
        name: impl Into<String>,
        x: i32,
        y: i32,
        width: i32,
        height: i32,
    ) -> Result<Self, ZoneError> {
        let name = name.into();
        if width <= 0 || height <= 0 {
            return Err(ZoneError::EmptyGeometry { name, width, height });
        }
        Ok(Self {
            name,
            top_left: Point::new(x, y),
            width,
            height,
        })
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    /// The area in pixels, used as the denominator of the motion threshold.
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.top_left.x
            && p.x < self.top_left.x + self.width
            && p.y >= self.top_left.y
            && p.y < self.top_left.y + self.height
    }

    /// The zone rectangle intersected with a `frame_width` x `frame_height` frame,
    /// as `(x0, y0, x1, y1)` with exclusive upper bounds. `None` if fully off-frame.
    pub fn clip_to(&self, frame_width: u32, frame_height: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.top_left.x.max(0) as i64;
        let y0 = self.top_left.y.max(0) as i64;
        let x1 = (self.top_left.x as i64 + self.width as i64).min(frame_width as i64);
        let y1 = (self.top_left.y as i64 + self.height as i64).min(frame_height as i64);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

/// The ordered set of zones shared by the layout editor and the trigger engine.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ZoneRegistry {
    zones: Vec<Zone>,
}

impl ZoneRegistry {
    pub fn new(zones: Vec<Zone>) -> Self {
        Self { zones }
    }

    pub fn list(&self) -> &[Zone] {
        &self.zones
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Zone> {
        self.zones.get(index)
    }

    /// Returns the index of the first zone containing `p`.
    pub fn hit_test(&self, p: Point) -> Option<usize> {
        self.zones.iter().position(|zone| zone.contains(p))
    }

    /// Moves a zone so its top-left corner sits at `top_left`. Size is unchanged.
    pub fn replace_geometry(&mut self, index: usize, top_left: Point) -> Result<(), ZoneError> {
        let len = self.zones.len();
        let zone = self
            .zones
            .get_mut(index)
            .ok_or(ZoneError::IndexOutOfRange { index, len })?;
        zone.top_left = top_left;
        Ok(())
    }
}

impl From<Vec<Zone>> for ZoneRegistry {
    fn from(zones: Vec<Zone>) -> Self {
        Self::new(zones)
    }
}
