//! Allowed actions (_NET_WM_ALLOWED_ACTIONS) derived from window state

use crate::wm::Workspace;
use crate::wm::client::ClientId;
use crate::wm::client_flags::AllowedActions;

impl Workspace {
    pub fn compute_allowed_actions(&self, id: ClientId) -> AllowedActions {
        let Some(c) = self.clients.get(&id) else {
            return AllowedActions::empty();
        };
        let mut actions = AllowedActions::CHANGE_DESKTOP;
        actions.set(AllowedActions::MOVE, c.is_movable());
        actions.set(AllowedActions::RESIZE, c.is_resizable());
        actions.set(AllowedActions::MINIMIZE, self.is_minimizable(id));
        actions.set(AllowedActions::SHADE, c.is_shadeable());
        actions.set(AllowedActions::STICK, !c.is_desktop() && !c.is_dock());
        if c.is_maximizable() {
            actions |= AllowedActions::MAX_VERT | AllowedActions::MAX_HORIZ;
        }
        actions.set(AllowedActions::FULLSCREEN, c.is_full_screenable());
        actions.set(AllowedActions::CLOSE, c.is_closeable());
        actions
    }

    /// Recompute and export when changed; before the window is managed
    /// only a forced update does anything
    pub fn update_allowed_actions(&mut self, id: ClientId, force: bool) {
        let actions = self.compute_allowed_actions(id);
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if !c.managed && !force {
            return;
        }
        if c.allowed_actions == actions && !force {
            return;
        }
        c.allowed_actions = actions;
        self.services.display.set_allowed_actions(c.window, actions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::client_flags::WindowType;
    use crate::wm::testing::{TestSetup, WindowSpec};

    #[test]
    fn test_normal_window_actions() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        let actions = t.ws.client(id).unwrap().allowed_actions;
        assert!(actions.contains(AllowedActions::MOVE | AllowedActions::RESIZE | AllowedActions::CLOSE));
        assert!(actions.contains(AllowedActions::SHADE));
        assert_eq!(t.display.last_allowed_actions(0x100), Some(actions));
    }

    #[test]
    fn test_dock_cannot_move_or_close() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).of_type(WindowType::Dock));
        let actions = t.ws.client(id).unwrap().allowed_actions;
        assert!(!actions.contains(AllowedActions::MOVE));
        assert!(!actions.contains(AllowedActions::CLOSE));
        assert!(!actions.contains(AllowedActions::STICK));
        assert!(actions.contains(AllowedActions::CHANGE_DESKTOP));
    }

    #[test]
    fn test_fullscreen_drops_resize() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        t.ws.set_full_screen(id, true);
        let actions = t.ws.client(id).unwrap().allowed_actions;
        assert!(!actions.contains(AllowedActions::RESIZE));
        assert!(actions.contains(AllowedActions::FULLSCREEN));
    }
}
