// THEORY:
// The `layout_editor` lets the user rearrange zones by dragging them over the
// live camera view before detection starts. It is a small, pointer-driven
// interaction loop with exactly two pieces of state.
//
// Key architectural principles:
// 1.  **Explicit Session State**: `EditorSession` holds the selected zone and the
//     grab offset between the pointer and the zone's top-left corner. It lives for
//     one editing session and is the only thing pointer events mutate besides the
//     registry itself.
// 2.  **1:1 Tracking**: A move while a zone is selected sets its top-left to
//     `pointer - grab_offset` immediately. There is no smoothing, so after any
//     sequence of moves the zone sits exactly where the last one puts it.
// 3.  **Single Writer**: Pointer callbacks on the presentation side only queue
//     events. The editor loop drains the queue once per tick and applies it, so the
//     registry is never mutated while a frame is being drawn.
// 4.  **Soft Failure**: If the camera stops producing frames the editor gives up,
//     but every edit made so far is kept in the registry it hands back.

use crate::core_modules::overlay::{self, ALERT_COLOR};
use crate::core_modules::zone::{Point, ZoneRegistry};
use crate::device::{self, FrameSource};
use crate::surface::{PointerEvent, Surface};
use tracing::{debug, info, warn};

/// Drag state for one editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditorSession {
    selected: Option<usize>,
    grab_offset: Point,
}

impl EditorSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn grab_offset(&self) -> Point {
        self.grab_offset
    }

    /// Grabs the first zone under `p`, remembering where inside it the grab happened.
    pub fn press(&mut self, p: Point, registry: &ZoneRegistry) {
        let Some(index) = registry.hit_test(p) else {
            return;
        };
        if let Some(zone) = registry.get(index) {
            self.selected = Some(index);
            self.grab_offset = p - zone.top_left;
            debug!(zone = %zone.name, index, "zone grabbed");
        }
    }

    /// Moves the grabbed zone so it keeps the same offset to the pointer.
    pub fn drag(&mut self, p: Point, registry: &mut ZoneRegistry) {
        if let Some(index) = self.selected {
            // The selection always comes from `hit_test` on the same registry.
            let _ = registry.replace_geometry(index, p - self.grab_offset);
        }
    }

    pub fn release(&mut self) {
        self.selected = None;
    }

    pub fn handle(&mut self, event: PointerEvent, registry: &mut ZoneRegistry) {
        match event {
            PointerEvent::Press(p) => self.press(p, registry),
            PointerEvent::Move(p) => self.drag(p, registry),
            PointerEvent::Release(_) => self.release(),
        }
    }
}

/// How an editing session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorExit {
    /// The user pressed the commit key.
    Committed,
    /// A frame read failed; edits made before the failure are kept.
    CaptureFailed,
}

/// Runs the editor until the commit key or a failed read, returning the registry.
pub fn run_layout_editor<S, W>(
    mut registry: ZoneRegistry,
    source: &mut S,
    surface: &mut W,
    commit_key: char,
    mirror: bool,
) -> (ZoneRegistry, EditorExit)
where
    S: FrameSource + ?Sized,
    W: Surface + ?Sized,
{
    info!("entering layout editor");
    let mut session = EditorSession::new();
    let instructions = [
        "Editing Layout... Drag boxes with mouse.".to_string(),
        format!("Press '{commit_key}' to save and exit."),
    ];
    surface.attach_pointer();

    let exit = loop {
        let Some(frame) = device::read_frame(source, mirror) else {
            warn!("camera read failed, leaving layout editor");
            break EditorExit::CaptureFailed;
        };

        let mut ops = overlay::prompt_lines(&instructions, ALERT_COLOR);
        ops.extend(overlay::zone_outlines(&registry));
        surface.present(&frame, &ops);

        let key = surface.poll_key();
        for event in surface.poll_pointer() {
            session.handle(event, &mut registry);
        }
        if key == Some(commit_key) {
            info!("layout saved");
            break EditorExit::Committed;
        }
    };

    surface.detach_pointer();
    (registry, exit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::zone::Zone;

    fn registry() -> ZoneRegistry {
        ZoneRegistry::new(vec![
            Zone::new("A", 0, 0, 100, 100).unwrap(),
            Zone::new("B", 50, 50, 100, 100).unwrap(),
        ])
    }

    #[test]
    fn press_grabs_the_first_overlapping_zone() {
        let registry = registry();
        let mut session = EditorSession::new();
        session.press(Point::new(75, 75), &registry);
        assert_eq!(session.selected(), Some(0));
        assert_eq!(session.grab_offset(), Point::new(75, 75));
    }

    #[test]
    fn press_on_empty_space_selects_nothing() {
        let registry = registry();
        let mut session = EditorSession::new();
        session.press(Point::new(500, 500), &registry);
        assert_eq!(session.selected(), None);
    }

    #[test]
    fn drag_tracks_the_pointer_exactly() {
        let mut registry = registry();
        let mut session = EditorSession::new();
        session.handle(PointerEvent::Press(Point::new(120, 130)), &mut registry);
        assert_eq!(session.selected(), Some(1));
        assert_eq!(session.grab_offset(), Point::new(70, 80));

        let path = [Point::new(121, 131), Point::new(400, 10), Point::new(-30, 600)];
        for p in path {
            session.handle(PointerEvent::Move(p), &mut registry);
        }
        assert_eq!(registry.get(1).unwrap().top_left, Point::new(-100, 520));
        assert_eq!(registry.get(0).unwrap().top_left, Point::new(0, 0));
    }

    #[test]
    fn moves_without_a_grab_do_nothing() {
        let mut registry = registry();
        let before = registry.clone();
        let mut session = EditorSession::new();
        session.handle(PointerEvent::Move(Point::new(10, 10)), &mut registry);
        assert_eq!(registry, before);
    }

    #[test]
    fn release_is_idempotent() {
        let mut registry = registry();
        let mut session = EditorSession::new();
        session.handle(PointerEvent::Release(Point::default()), &mut registry);
        session.handle(PointerEvent::Press(Point::new(10, 10)), &mut registry);
        session.handle(PointerEvent::Release(Point::new(10, 10)), &mut registry);
        session.handle(PointerEvent::Release(Point::new(10, 10)), &mut registry);
        assert_eq!(session.selected(), None);

        session.handle(PointerEvent::Move(Point::new(300, 300)), &mut registry);
        assert_eq!(registry.get(0).unwrap().top_left, Point::new(0, 0));
    }
}
