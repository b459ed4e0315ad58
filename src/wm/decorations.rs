//! Window decorations
//!
//! The core does not draw decorations. It asks a [`DecorationFactory`] for a
//! decoration object, reads its border sizes and keeps frame geometry, frame
//! extents and input regions in step with it.

use tracing::debug;

use crate::config::DecorationConfig;
use crate::shared::{Geometry, Margins};
use crate::wm::Workspace;
use crate::wm::client::ClientId;
use crate::wm::client_flags::{MappingState, MaximizeMode, ShadeMode, WindowType};
use crate::wm::display::{InputShape, XWindow};
use crate::wm::events::ClientEvent;
use crate::wm::geometry::ForceGeometry;

/// A live decoration attached to one window
pub trait Decoration {
    fn borders(&self) -> Margins;

    /// Invisible grab area outside the visible borders
    fn resize_only_borders(&self) -> Margins {
        Margins::default()
    }

    fn set_caption(&mut self, _caption: &str) {}

    fn set_active(&mut self, _active: bool) {}

    fn repaint(&mut self) {}
}

/// What a factory gets to see when building a decoration
#[derive(Debug, Clone, Copy)]
pub struct DecorationRequest<'a> {
    pub window: XWindow,
    pub window_type: WindowType,
    pub caption: &'a str,
    pub color_scheme: Option<&'a str>,
    pub maximized: MaximizeMode,
}

pub trait DecorationFactory {
    /// `None` means the window stays undecorated
    fn create(&self, request: &DecorationRequest<'_>) -> Option<Box<dyn Decoration>>;
}

/// Fixed-size title bar and borders from the configuration
#[derive(Debug, Clone)]
pub struct ThemeDecorations {
    pub titlebar_height: u32,
    pub border_width: u32,
    pub resize_border: u32,
}

impl ThemeDecorations {
    pub fn new(config: &DecorationConfig) -> Self {
        Self {
            titlebar_height: u32::from(config.titlebar_height),
            border_width: u32::from(config.border_width),
            resize_border: u32::from(config.resize_border),
        }
    }
}

#[derive(Debug)]
pub struct ThemeDecoration {
    borders: Margins,
    resize_only: Margins,
    caption: String,
    active: bool,
    pub repaints: u32,
}

impl Decoration for ThemeDecoration {
    fn borders(&self) -> Margins {
        self.borders
    }

    fn resize_only_borders(&self) -> Margins {
        self.resize_only
    }

    fn set_caption(&mut self, caption: &str) {
        if self.caption != caption {
            self.caption = caption.to_string();
            self.repaint();
        }
    }

    fn set_active(&mut self, active: bool) {
        if self.active != active {
            self.active = active;
            self.repaint();
        }
    }

    fn repaint(&mut self) {
        self.repaints += 1;
    }
}

impl DecorationFactory for ThemeDecorations {
    fn create(&self, request: &DecorationRequest<'_>) -> Option<Box<dyn Decoration>> {
        // Maximized windows lose their side borders
        let side = if request.maximized == MaximizeMode::FULL { 0 } else { self.border_width };
        let resize = if request.maximized == MaximizeMode::FULL { 0 } else { self.resize_border };
        Some(Box::new(ThemeDecoration {
            borders: Margins::new(side, self.titlebar_height, side, side),
            resize_only: Margins::uniform(resize),
            caption: request.caption.to_string(),
            active: false,
            repaints: 0,
        }))
    }
}

impl Workspace {
    /// Whether the window should be drawn without a decoration
    pub fn detect_no_border(&self, id: ClientId) -> bool {
        let Some(c) = self.clients.get(&id) else {
            return true;
        };
        c.shaped || c.window_type().wants_no_border()
    }

    /// Create or destroy the decoration so it matches `no_border`.
    /// The client area stays where it is; the frame grows or shrinks around it.
    pub fn update_decoration(&mut self, id: ClientId, force: bool) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let wants = !c.no_border && !c.fullscreen;
        if !force && wants == c.decoration.is_some() {
            return;
        }
        if !wants && c.is_shade() {
            self.set_shade(id, ShadeMode::None);
        }

        self.with_geometry_updates_blocked(id, |ws| {
            let Some(c) = ws.clients.get(&id) else {
                return;
            };
            let client_geometry = c.client_geometry;
            let decoration = if wants {
                let caption = c.caption();
                let request = DecorationRequest {
                    window: c.window,
                    window_type: c.window_type(),
                    caption: &caption,
                    color_scheme: c.color_scheme.as_deref(),
                    maximized: c.max_mode,
                };
                ws.services.decorations.create(&request)
            } else {
                None
            };
            debug!(
                "Window {:#x} decoration {}",
                c.window,
                if decoration.is_some() { "created" } else { "removed" }
            );

            let Some(c) = ws.clients.get_mut(&id) else {
                return;
            };
            c.decoration = decoration;
            let frame = c.client_rect_to_frame_rect(client_geometry);
            ws.set_frame_geometry(id, frame, ForceGeometry::No);
            ws.update_frame_extents(id);
            ws.update_input_window(id);
        });
    }

    pub fn user_can_set_no_border(&self, id: ClientId) -> bool {
        self.clients
            .get(&id)
            .is_some_and(|c| !c.fullscreen && !c.is_shade())
    }

    pub fn set_no_border(&mut self, id: ClientId, set: bool) {
        if !self.user_can_set_no_border(id) {
            return;
        }
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let set = c.rules.check_no_border(set, false);
        if c.no_border == set {
            return;
        }
        c.no_border = set;
        self.update_decoration(id, false);
        self.update_allowed_actions(id, false);
    }

    pub fn update_frame_extents(&mut self, id: ClientId) {
        if let Some(c) = self.clients.get(&id) {
            self.services.display.set_frame_extents(c.window, c.borders());
        }
    }

    /// Keep the resize-only input region around the frame in sync with
    /// the decoration
    pub fn update_input_window(&mut self, id: ClientId) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let Some(frame) = c.frame else {
            return;
        };
        let extent = c.decoration.as_ref().map(|d| d.resize_only_borders()).filter(|m| !m.is_zero());
        let rects = extent.map(|m| {
            let inner = c.frame_geometry;
            let outer = inner.grown_by(m);
            vec![
                Geometry::new(outer.x, outer.y, outer.width, m.top),
                Geometry::new(outer.x, inner.y, m.left, inner.height),
                Geometry::new(inner.right(), inner.y, m.right, inner.height),
                Geometry::new(outer.x, inner.bottom(), outer.width, m.bottom),
            ]
        });
        if c.deco_input_extent == rects {
            return;
        }
        c.deco_input_extent = rects;
        self.services
            .display
            .set_input_extent(frame.frame, c.deco_input_extent.as_deref());
    }

    pub fn update_input_shape(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        if c.mapping_state == MappingState::Kept {
            // Kept windows must not get input back
            return;
        }
        if let Some(frame) = c.frame {
            self.services.display.set_input_shape(frame.frame, InputShape::Default);
        }
    }

    pub fn update_hidden_preview(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        if c.mapping_state != MappingState::Kept {
            self.update_input_shape(id);
            return;
        }
        if let Some(frame) = c.frame {
            self.services.display.set_input_shape(frame.frame, InputShape::Empty);
        }
        self.events.push(ClientEvent::HiddenPreviewChanged(id));
    }

    /// The window gained or lost a bounding shape
    pub fn update_shape(&mut self, id: ClientId, shaped: bool) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.shaped = shaped;
        if shaped {
            if !c.no_border {
                c.app_no_border = true;
                c.no_border = c.rules.check_no_border(true, false);
                self.update_decoration(id, true);
            }
        } else if c.app_no_border && !c.motif.no_border() {
            c.app_no_border = false;
            let detected = self.detect_no_border(id);
            if let Some(c) = self.clients.get_mut(&id) {
                c.no_border = c.rules.check_no_border(detected, false);
            }
            self.update_decoration(id, true);
        }
        self.update_input_shape(id);
        self.update_allowed_actions(id, false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::testing::{TestSetup, WindowSpec};

    #[test]
    fn test_decoration_grows_frame_around_client() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).at(Geometry::new(100, 100, 400, 300)));
        let c = t.ws.client(id).unwrap();
        assert!(c.is_decorated());
        let b = c.borders();
        assert_eq!(c.frame_geometry, c.client_geometry.grown_by(b));
    }

    #[test]
    fn test_no_border_keeps_client_position() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).at(Geometry::new(100, 100, 400, 300)));
        let client_before = t.ws.client(id).unwrap().client_geometry;

        t.ws.set_no_border(id, true);
        let c = t.ws.client(id).unwrap();
        assert!(!c.is_decorated());
        assert_eq!(c.client_geometry, client_before);
        assert_eq!(c.frame_geometry, client_before);
        assert_eq!(t.display.last_frame_extents(c.window), Some(Margins::default()));
    }

    #[test]
    fn test_dock_is_never_decorated() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).of_type(WindowType::Dock));
        assert!(t.ws.detect_no_border(id));
        assert!(!t.ws.client(id).unwrap().is_decorated());
    }

    #[test]
    fn test_resize_only_borders_become_input_extent() {
        let mut t = TestSetup::with_config(|c| c.decorations.resize_border = 4);
        let id = t.manage(WindowSpec::normal(0x100));
        let extent = t.ws.client(id).unwrap().deco_input_extent.clone().unwrap();
        assert_eq!(extent.len(), 4);
        assert_eq!(extent[0].height, 4);
    }
}
