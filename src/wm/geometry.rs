//! Geometry Module
//!
//! The single path through which frame, client and buffer geometry change.
//! Updates can be blocked re-entrantly; while blocked only the severity of
//! the pending change is recorded and one commit happens when the last block
//! is lifted.

use tracing::debug;

use crate::shared::{Geometry, Point, Size};
use crate::wm::Workspace;
use crate::wm::client::{ClientId, PendingGeometry};
use crate::wm::client_flags::MaximizeMode;
use crate::wm::events::ClientEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceGeometry {
    No,
    Yes,
}

/// Kinds of screen area a window can be fitted into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AreaKind {
    /// Work area of the output, minus struts
    Placement,
    Maximize,
    /// Whole output
    FullScreen,
    Screen,
    /// Union of all outputs
    Full,
}

/// One physical output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Output {
    pub geometry: Geometry,
    pub work_area: Geometry,
}

impl Output {
    pub fn new(geometry: Geometry) -> Self {
        Self { geometry, work_area: geometry }
    }
}

impl Workspace {
    pub fn block_geometry_updates(&mut self, id: ClientId) {
        if let Some(c) = self.clients.get_mut(&id) {
            c.block_geometry_updates += 1;
        }
    }

    pub fn unblock_geometry_updates(&mut self, id: ClientId) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        debug_assert!(c.block_geometry_updates > 0, "unbalanced geometry unblock");
        c.block_geometry_updates = c.block_geometry_updates.saturating_sub(1);
        if c.block_geometry_updates > 0 {
            return;
        }
        match std::mem::take(&mut c.pending_geometry) {
            PendingGeometry::None => {}
            PendingGeometry::Normal => self.update_server_geometry(id, false),
            PendingGeometry::Forced => self.update_server_geometry(id, true),
        }
    }

    /// Run `f` with geometry updates of `id` deferred
    pub fn with_geometry_updates_blocked<R>(
        &mut self,
        id: ClientId,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.block_geometry_updates(id);
        let result = f(self);
        self.unblock_geometry_updates(id);
        result
    }

    pub(crate) fn are_geometry_updates_blocked(&self, id: ClientId) -> bool {
        self.clients
            .get(&id)
            .is_some_and(|c| c.block_geometry_updates > 0)
    }

    pub fn set_frame_geometry(&mut self, id: ClientId, frame: Geometry, force: ForceGeometry) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let client = if c.is_shade() && c.is_decorated() {
            // Shaded frames only show the title bar; the client keeps its size
            Geometry::from_parts(c.frame_pos_to_client_pos(frame.position()), c.client_geometry.size())
        } else {
            c.frame_rect_to_client_rect(frame)
        };
        c.frame_geometry = frame;
        c.client_geometry = client;
        c.buffer_geometry = if c.is_decorated() { frame } else { client };

        if c.block_geometry_updates > 0 {
            let severity = match force {
                ForceGeometry::Yes => PendingGeometry::Forced,
                ForceGeometry::No => PendingGeometry::Normal,
            };
            c.pending_geometry = c.pending_geometry.max(severity);
            return;
        }
        self.update_server_geometry(id, force == ForceGeometry::Yes);
    }

    pub fn move_frame(&mut self, id: ClientId, pos: Point, force: ForceGeometry) {
        if let Some(c) = self.clients.get(&id) {
            let frame = c.frame_geometry.with_position(pos);
            self.set_frame_geometry(id, frame, force);
        }
    }

    /// Resize keeping the top-left corner
    pub fn resize_frame(&mut self, id: ClientId, size: Size, force: ForceGeometry) {
        if let Some(c) = self.clients.get(&id) {
            let frame = c.frame_geometry.with_size(size);
            self.set_frame_geometry(id, frame, force);
        }
    }

    fn update_server_geometry(&mut self, id: ClientId, forced: bool) {
        debug_assert!(!self.are_geometry_updates_blocked(id), "geometry commit while blocked");
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let old = c.server_geometry;
        let new = c.frame_geometry;
        if !forced && old == new {
            return;
        }
        c.server_geometry = new;
        if let Some(frame) = c.frame {
            let display = &self.services.display;
            display.configure_window(frame.frame, new);
            let client = c.client_geometry;
            let wrapper = Geometry::new(client.x - new.x, client.y - new.y, client.width, client.height);
            display.configure_window(frame.wrapper, wrapper);
            display.configure_window(c.window, Geometry::from_parts(Point::default(), client.size()));
        }
        if old != new {
            self.events.push(ClientEvent::GeometryChanged { client: id, old, new });
        }
        self.update_input_window(id);
    }

    /// The client asked to move or resize its own window. The result is
    /// always pushed, so the client learns where it ended up even when the
    /// request was refused.
    pub fn configure_request(&mut self, id: ClientId, pos: Option<Point>, size: Option<Size>) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let mut client = c.client_geometry;
        if c.move_resize.is_none() {
            if let Some(pos) = pos.filter(|_| c.is_movable()) {
                client = client.with_position(pos);
            }
            if let Some(size) = size.filter(|_| c.is_resizable()) {
                client = client.with_size(c.size_hints.constrain(size));
            }
        }
        let frame = c.client_rect_to_frame_rect(client);
        self.set_frame_geometry(id, frame, ForceGeometry::Yes);
    }

    pub fn client_area(&self, kind: AreaKind, at: Point) -> Geometry {
        if kind == AreaKind::Full {
            return self
                .outputs
                .iter()
                .fold(Geometry::default(), |acc, o| acc.united(&o.geometry));
        }
        let output = self
            .outputs
            .iter()
            .find(|o| o.geometry.contains(at))
            .or_else(|| self.outputs.first());
        match (output, kind) {
            (None, _) => Geometry::default(),
            (Some(o), AreaKind::Placement | AreaKind::Maximize) => o.work_area,
            (Some(o), _) => o.geometry,
        }
    }

    pub fn maximize(&mut self, id: ClientId, mode: MaximizeMode) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if !mode.is_empty() && !c.is_maximizable() {
            return;
        }
        let mode = c.rules.check_maximize(mode, false);
        let old = c.max_mode;
        if mode == old {
            return;
        }
        let current = c.frame_geometry;
        // Remember each axis as it becomes maximized
        if mode.contains(MaximizeMode::HORIZONTAL) && !old.contains(MaximizeMode::HORIZONTAL) {
            c.geometry_restore.x = current.x;
            c.geometry_restore.width = current.width;
        }
        if mode.contains(MaximizeMode::VERTICAL) && !old.contains(MaximizeMode::VERTICAL) {
            c.geometry_restore.y = current.y;
            c.geometry_restore.height = current.height;
        }
        let restore = c.geometry_restore;
        let was_decorated = c.is_decorated();
        c.max_mode = mode;
        debug!("Window {:#x} maximize {:?} -> {:?}", c.window, old, mode);

        let area = self.client_area(AreaKind::Maximize, current.center());
        let mut target = current;
        if mode.contains(MaximizeMode::HORIZONTAL) {
            target.x = area.x;
            target.width = area.width;
        } else if old.contains(MaximizeMode::HORIZONTAL) {
            target.x = restore.x;
            target.width = restore.width;
        }
        if mode.contains(MaximizeMode::VERTICAL) {
            target.y = area.y;
            target.height = area.height;
        } else if old.contains(MaximizeMode::VERTICAL) {
            target.y = restore.y;
            target.height = restore.height;
        }

        self.with_geometry_updates_blocked(id, |ws| {
            if was_decorated {
                // Border sizes may depend on the maximize state
                ws.update_decoration(id, true);
            }
            ws.set_frame_geometry(id, target, ForceGeometry::No);
        });
        self.export_net_state(id);
        self.update_allowed_actions(id, false);
        self.events.push(ClientEvent::MaximizeChanged(id));
    }

    pub fn set_full_screen(&mut self, id: ClientId, on: bool) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        if on == c.fullscreen || (on && !c.is_full_screenable()) {
            return;
        }
        let on = c.rules.check_full_screen(on, false);
        if on == c.fullscreen {
            return;
        }
        let center = c.frame_geometry.center();
        self.with_geometry_updates_blocked(id, |ws| {
            let Some(c) = ws.clients.get_mut(&id) else {
                return;
            };
            let target = if on {
                c.fullscreen_restore = c.frame_geometry;
                c.fullscreen = true;
                ws.client_area(AreaKind::FullScreen, center)
            } else {
                c.fullscreen = false;
                c.fullscreen_restore
            };
            ws.update_decoration(id, false);
            ws.set_frame_geometry(id, target, ForceGeometry::No);
        });
        self.export_net_state(id);
        self.update_layer(id);
        self.update_allowed_actions(id, false);
        self.events.push(ClientEvent::FullScreenChanged(id));
    }

    /// Move the frame into `area`, shrinking it first when it does not fit.
    /// A partial keep only requires 100 pixels of the frame to stay inside.
    pub fn keep_in_area(&mut self, id: ClientId, area: Geometry, partial: bool) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        if area.is_empty() {
            return;
        }
        let mut frame = c.frame_geometry;
        let mut area = area;
        if partial {
            let left = area.x.min(area.x - frame.width as i32 + 100);
            let top = area.y.min(area.y - frame.height as i32 + 100);
            let right = area.right().max(area.right() + frame.width as i32 - 100);
            let bottom = area.bottom().max(area.bottom() + frame.height as i32 - 100);
            area = Geometry::new(left, top, (right - left) as u32, (bottom - top) as u32);
        } else if frame.width > area.width || frame.height > area.height {
            let fitted = Size::new(frame.width.min(area.width), frame.height.min(area.height));
            let client = c.size_hints.constrain(c.frame_size_to_client_size(fitted));
            frame = frame.with_size(c.client_size_to_frame_size(client));
        }

        if frame.right() > area.right() && frame.width <= area.width {
            frame.x = area.right() - frame.width as i32;
        }
        if frame.bottom() > area.bottom() && frame.height <= area.height {
            frame.y = area.bottom() - frame.height as i32;
        }
        if frame.x < area.x {
            frame.x = area.x;
        }
        if frame.y < area.y {
            frame.y = area.y;
        }
        if frame != c.frame_geometry {
            debug!("Window {:#x} kept in {:?}", c.window, area);
            self.set_frame_geometry(id, frame, ForceGeometry::No);
        }
    }

    /// Re-check that a window still fits its area after screen changes
    pub fn check_workspace_position(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        if c.is_special_window() || c.fullscreen {
            return;
        }
        let frame = c.frame_geometry;
        let area = self.client_area(AreaKind::Placement, frame.center());
        if area.is_empty() {
            return;
        }
        let x = frame.x.min(area.right() - frame.width as i32).max(area.x);
        let y = frame.y.min(area.bottom() - frame.height as i32).max(area.y);
        if (x, y) != (frame.x, frame.y) {
            self.move_frame(id, Point::new(x, y), ForceGeometry::No);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::testing::{TestSetup, WindowSpec};

    #[test]
    fn test_blocked_updates_commit_once() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        let frame = t.ws.client(id).unwrap().frame.unwrap().frame;
        t.display.clear();

        t.ws.with_geometry_updates_blocked(id, |ws| {
            ws.move_frame(id, Point::new(10, 10), ForceGeometry::No);
            ws.block_geometry_updates(id);
            ws.move_frame(id, Point::new(20, 20), ForceGeometry::No);
            ws.unblock_geometry_updates(id);
            ws.move_frame(id, Point::new(30, 30), ForceGeometry::No);
        });

        let configures = t.display.configures_of(frame);
        assert_eq!(configures.len(), 1);
        assert_eq!(configures[0].position(), Point::new(30, 30));
    }

    #[test]
    fn test_configure_request_respects_size_hints() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        t.ws.client_mut(id).unwrap().size_hints.flags = 1 << 5;
        t.ws.client_mut(id).unwrap().size_hints.max_width = 300;
        t.ws.client_mut(id).unwrap().size_hints.max_height = 200;
        t.display.clear();

        t.ws.configure_request(id, Some(Point::new(40, 50)), Some(Size::new(800, 600)));

        let c = t.ws.client(id).unwrap();
        assert_eq!(c.client_geometry.position(), Point::new(40, 50));
        assert_eq!(c.client_geometry.size(), Size::new(300, 200));
        assert_eq!(t.display.configures_of(0x100).len(), 1);
    }

    #[test]
    fn test_refused_configure_request_still_notifies() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        t.ws.set_full_screen(id, true);
        let before = t.ws.client(id).unwrap().client_geometry;
        t.display.clear();

        t.ws.configure_request(id, Some(Point::new(5, 5)), Some(Size::new(10, 10)));

        assert_eq!(t.ws.client(id).unwrap().client_geometry, before);
        assert_eq!(t.display.configures_of(0x100).len(), 1);
    }

    #[test]
    fn test_forced_update_dominates() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        let frame = t.ws.client(id).unwrap().frame.unwrap().frame;
        let geometry = t.ws.client(id).unwrap().frame_geometry;
        t.display.clear();

        t.ws.with_geometry_updates_blocked(id, |ws| {
            ws.set_frame_geometry(id, geometry, ForceGeometry::Yes);
            ws.set_frame_geometry(id, geometry, ForceGeometry::No);
        });
        // Unchanged geometry is still pushed when forced
        assert_eq!(t.display.configures_of(frame).len(), 1);

        t.display.clear();
        t.ws.set_frame_geometry(id, geometry, ForceGeometry::No);
        assert!(t.display.configures_of(frame).is_empty());
    }

    #[test]
    fn test_maximize_and_restore() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).at(Geometry::new(100, 100, 400, 300)));
        let before = t.ws.client(id).unwrap().frame_geometry;

        t.ws.maximize(id, MaximizeMode::FULL);
        let c = t.ws.client(id).unwrap();
        assert_eq!(c.frame_geometry, t.ws.client_area(AreaKind::Maximize, Point::default()));

        t.ws.maximize(id, MaximizeMode::empty());
        let c = t.ws.client(id).unwrap();
        assert_eq!(c.frame_geometry.position(), before.position());
        assert_eq!(c.client_geometry.size(), Size::new(400, 300));
    }

    #[test]
    fn test_fullscreen_round_trip() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).at(Geometry::new(100, 100, 400, 300)));
        let before = t.ws.client(id).unwrap().frame_geometry;

        t.ws.set_full_screen(id, true);
        let c = t.ws.client(id).unwrap();
        assert!(!c.is_decorated());
        assert_eq!(c.frame_geometry, t.ws.client_area(AreaKind::FullScreen, Point::default()));

        t.ws.set_full_screen(id, false);
        let c = t.ws.client(id).unwrap();
        assert!(c.is_decorated());
        assert_eq!(c.frame_geometry, before);
    }
}
