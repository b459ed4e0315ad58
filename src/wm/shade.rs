//! Shade Module
//!
//! Shading rolls a decorated window up into its title bar. The client keeps
//! its size while shaded, so unshading restores the exact frame.

use tracing::debug;

use crate::shared::Size;
use crate::wm::Workspace;
use crate::wm::client::ClientId;
use crate::wm::client_flags::{MappingState, ShadeMode, WmState};
use crate::wm::events::ClientEvent;
use crate::wm::geometry::ForceGeometry;

impl Workspace {
    pub fn set_shade(&mut self, id: ClientId, mode: ShadeMode) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if mode == ShadeMode::Hover && c.move_resize.is_some() {
            return;
        }
        let mode = if c.is_special_window() || c.no_border || !c.is_decorated() {
            ShadeMode::None
        } else {
            c.rules.check_shade(mode, false)
        };
        if c.shade_mode == mode {
            return;
        }
        let was_shade = c.is_shade();
        c.shade_mode = mode;
        if was_shade == c.is_shade() {
            // Hover/Activated flips leave the geometry alone
            self.events.push(ClientEvent::ShadeChanged(id));
            return;
        }
        debug!("Window {:#x} shade mode {:?}", c.window, mode);

        self.with_geometry_updates_blocked(id, |ws| {
            let Some(c) = ws.clients.get(&id) else {
                return;
            };
            let shaded = c.is_shade();
            let borders = c.borders();
            let visible = matches!(c.mapping_state, MappingState::Mapped | MappingState::Kept);
            let client_size = c.client_geometry.size();
            let frame_size = c.client_size_to_frame_size(client_size);
            let window = c.window;
            let wrapper = c.frame.map(|f| f.wrapper);
            let region = c.frame_geometry;

            if shaded {
                ws.events.push(ClientEvent::Repaint(region));
                if let Some(wrapper) = wrapper {
                    ws.services.display.unmap_window(wrapper);
                    ws.services.display.unmap_window(window);
                }
                ws.export_mapping_state(id, WmState::Iconic);
                ws.resize_frame(id, Size::new(frame_size.width, borders.vertical()), ForceGeometry::No);
            } else {
                ws.resize_frame(id, frame_size, ForceGeometry::No);
                let accepts_focus = ws.clients.get(&id).is_some_and(|c| c.wants_input());
                if matches!(mode, ShadeMode::Hover | ShadeMode::Activated) && accepts_focus {
                    ws.set_active(Some(id));
                }
                if visible {
                    if let Some(wrapper) = wrapper {
                        ws.services.display.map_window(wrapper);
                        ws.services.display.map_window(window);
                    }
                    ws.export_mapping_state(id, WmState::Normal);
                }
            }
        });

        self.export_net_state(id);
        self.update_visibility(id);
        self.update_allowed_actions(id, false);
        self.events.push(ClientEvent::ShadeChanged(id));
    }

    pub fn toggle_shade(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let mode = if c.shade_mode == ShadeMode::None { ShadeMode::Normal } else { ShadeMode::None };
        self.set_shade(id, mode);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Geometry;
    use crate::wm::testing::{DisplayCall, TestSetup, WindowSpec};

    #[test]
    fn test_shade_round_trip_restores_geometry() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).at(Geometry::new(100, 100, 400, 300)));
        let before = t.ws.client(id).unwrap().frame_geometry;
        let restore = t.ws.client(id).unwrap().geometry_restore;

        t.ws.set_shade(id, ShadeMode::Normal);
        let c = t.ws.client(id).unwrap();
        assert!(c.is_shade());
        assert_eq!(c.frame_geometry.height, c.borders().vertical());
        assert_eq!(c.client_geometry.size(), Size::new(400, 300));

        t.ws.set_shade(id, ShadeMode::None);
        let c = t.ws.client(id).unwrap();
        assert_eq!(c.frame_geometry, before);
        assert_eq!(c.geometry_restore, restore);
    }

    #[test]
    fn test_shade_exports_iconic_state() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        let window = t.ws.client(id).unwrap().window;
        t.display.clear();

        t.ws.set_shade(id, ShadeMode::Normal);
        assert!(t.display.calls().contains(&DisplayCall::WmState(window, WmState::Iconic)));
        assert!(t.display.calls().contains(&DisplayCall::Unmap(window)));
        // Shading is independent of the mapping machine
        assert_eq!(t.ws.client(id).unwrap().mapping_state, MappingState::Mapped);

        t.ws.set_shade(id, ShadeMode::None);
        assert_eq!(t.display.last_wm_state(window), Some(WmState::Normal));
    }

    #[test]
    fn test_hover_unshades_and_activates() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        t.ws.set_shade(id, ShadeMode::Normal);
        t.ws.set_shade(id, ShadeMode::Hover);
        let c = t.ws.client(id).unwrap();
        assert_eq!(c.shade_mode, ShadeMode::Hover);
        assert!(!c.is_shade());
        assert_eq!(t.ws.active_client(), Some(id));
    }

    #[test]
    fn test_borderless_window_cannot_shade() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).without_border());
        t.ws.set_shade(id, ShadeMode::Normal);
        assert_eq!(t.ws.client(id).unwrap().shade_mode, ShadeMode::None);
    }

    #[test]
    fn test_toggle_shade_flips_state() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).at(Geometry::new(100, 100, 400, 300)));
        let before = t.ws.client(id).unwrap().frame_geometry;
        t.ws.toggle_shade(id);
        assert_eq!(t.ws.client(id).unwrap().shade_mode, ShadeMode::Normal);
        t.ws.toggle_shade(id);
        let c = t.ws.client(id).unwrap();
        assert_eq!(c.shade_mode, ShadeMode::None);
        assert_eq!(c.frame_geometry, before);
    }
}
