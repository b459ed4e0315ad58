//! Session Module
//!
//! Prior-session window state. A store hands each saved entry out at most
//! once, to the first window that matches it during manage().

use tracing::debug;

use crate::shared::Geometry;
use crate::wm::Workspace;
use crate::wm::client::ClientId;
use crate::wm::client_flags::{Desktop, MaximizeMode, ShadeMode, WindowType};

/// Saved state of one window
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: Option<String>,
    pub window_role: String,
    pub resource_name: String,
    pub resource_class: String,
    pub window_type: WindowType,
    pub geometry: Geometry,
    pub restore: Geometry,
    pub fullscreen_restore: Geometry,
    pub desktop: Desktop,
    pub activities: Vec<String>,
    pub max_mode: MaximizeMode,
    pub minimized: bool,
    pub shade: ShadeMode,
    pub fullscreen: bool,
    pub keep_above: bool,
    pub keep_below: bool,
    pub skip_taskbar: bool,
    pub skip_pager: bool,
    pub skip_switcher: bool,
    pub no_border: bool,
    pub active: bool,
    pub stacking_order: i32,
}

/// Identity a window offers for session lookup
#[derive(Debug, Clone, Copy)]
pub struct SessionMatch<'a> {
    pub session_id: Option<&'a str>,
    pub window_role: &'a str,
    pub resource_name: &'a str,
    pub resource_class: &'a str,
}

impl SessionMatch<'_> {
    pub fn matches(&self, info: &SessionInfo) -> bool {
        if info.session_id.as_deref() != self.session_id {
            return false;
        }
        if !self.window_role.is_empty() || !info.window_role.is_empty() {
            return info.window_role == self.window_role;
        }
        info.resource_name == self.resource_name && info.resource_class == self.resource_class
    }
}

pub trait SessionStore {
    /// Remove and return the entry for this window, if any
    fn take_info(&mut self, window: &SessionMatch<'_>) -> Option<SessionInfo>;

    fn store(&mut self, info: SessionInfo);
}

/// No session management
#[derive(Debug, Default)]
pub struct NoSession;

impl SessionStore for NoSession {
    fn take_info(&mut self, _window: &SessionMatch<'_>) -> Option<SessionInfo> {
        None
    }

    fn store(&mut self, _info: SessionInfo) {}
}

/// In-process session entries
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    pub entries: Vec<SessionInfo>,
}

impl SessionStore for MemorySessionStore {
    fn take_info(&mut self, window: &SessionMatch<'_>) -> Option<SessionInfo> {
        let pos = self.entries.iter().position(|info| window.matches(info))?;
        Some(self.entries.remove(pos))
    }

    fn store(&mut self, info: SessionInfo) {
        self.entries.push(info);
    }
}

impl Workspace {
    /// Snapshot a window for the session store
    pub fn session_info(&self, id: ClientId) -> Option<SessionInfo> {
        let c = self.clients.get(&id)?;
        Some(SessionInfo {
            session_id: c.session_id.clone(),
            window_role: c.window_role.clone(),
            resource_name: c.resource_name.clone(),
            resource_class: c.resource_class.clone(),
            window_type: c.window_type,
            geometry: c.frame_geometry,
            restore: c.geometry_restore,
            fullscreen_restore: c.fullscreen_restore,
            desktop: c.desktop,
            activities: c.activities.clone(),
            max_mode: c.max_mode,
            minimized: c.minimized,
            shade: c.shade_mode,
            fullscreen: c.fullscreen,
            keep_above: c.keep_above,
            keep_below: c.keep_below,
            skip_taskbar: c.original_skip_taskbar,
            skip_pager: c.skip_pager,
            skip_switcher: c.skip_switcher,
            no_border: c.no_border,
            active: self.active == Some(id),
            stacking_order: 0,
        })
    }

    /// Store every session-managed window
    pub fn save_session(&mut self) {
        for id in self.client_ids() {
            let Some(info) = self.session_info(id) else {
                continue;
            };
            if info.session_id.is_none() {
                continue;
            }
            debug!("Saving session state of {}", id);
            self.services.session.store(info);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(role: &str) -> SessionInfo {
        SessionInfo {
            session_id: Some("sm-1".into()),
            window_role: role.into(),
            resource_name: "editor".into(),
            resource_class: "Editor".into(),
            window_type: WindowType::Normal,
            geometry: Geometry::new(10, 20, 300, 200),
            restore: Geometry::default(),
            fullscreen_restore: Geometry::default(),
            desktop: Desktop::Number(3),
            activities: Vec::new(),
            max_mode: MaximizeMode::empty(),
            minimized: false,
            shade: ShadeMode::None,
            fullscreen: false,
            keep_above: false,
            keep_below: false,
            skip_taskbar: false,
            skip_pager: false,
            skip_switcher: false,
            no_border: false,
            active: false,
            stacking_order: 0,
        }
    }

    #[test]
    fn test_entries_are_consumed_once() {
        let mut store = MemorySessionStore::default();
        store.store(info("main"));
        let m = SessionMatch {
            session_id: Some("sm-1"),
            window_role: "main",
            resource_name: "editor",
            resource_class: "Editor",
        };
        assert!(store.take_info(&m).is_some());
        assert!(store.take_info(&m).is_none());
    }

    #[test]
    fn test_role_must_match_when_present() {
        let m = SessionMatch {
            session_id: Some("sm-1"),
            window_role: "other",
            resource_name: "editor",
            resource_class: "Editor",
        };
        assert!(!m.matches(&info("main")));
        assert!(SessionMatch { window_role: "", ..m }.matches(&info("")));
    }
}
