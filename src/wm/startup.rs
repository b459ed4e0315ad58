//! Startup Notification Module
//!
//! Launch feedback announced by launchers. A managed window carrying the
//! matching _NET_STARTUP_ID picks up the desktop, screen and user time the
//! launch asked for.

use std::collections::HashMap;

use tracing::debug;

use crate::wm::display::{Timestamp, XWindow};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartupNotification {
    pub startup_id: String,
    /// Window that completed this launch, once mapped
    pub window: Option<XWindow>,
    pub timestamp: Option<Timestamp>,
    pub desktop: Option<u32>,
    pub screen: Option<usize>,
    pub complete: bool,
}

/// Launch data a window inherits during manage()
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StartupInfo {
    pub timestamp: Option<Timestamp>,
    pub desktop: Option<u32>,
    pub screen: Option<usize>,
}

/// Timestamp embedded in a startup id as `..._TIME<n>`
pub fn timestamp_from_id(startup_id: &str) -> Option<Timestamp> {
    let pos = startup_id.rfind("_TIME")?;
    startup_id[pos + "_TIME".len()..].parse().ok()
}

#[derive(Debug, Default)]
pub struct StartupNotificationManager {
    pub notifications: HashMap<String, StartupNotification>,
}

impl StartupNotificationManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_active_startup(&self) -> bool {
        self.notifications.values().any(|n| !n.complete)
    }

    /// A launcher announced a new launch
    pub fn register_startup(&mut self, notification: StartupNotification) {
        debug!("Registering startup notification: {}", notification.startup_id);
        self.notifications
            .insert(notification.startup_id.clone(), notification);
    }

    /// Bind a window to its launch and return what it should inherit.
    /// Ids without a registered launch still carry their timestamp.
    pub fn associate_window(&mut self, window: XWindow, startup_id: &str) -> StartupInfo {
        let startup_id = startup_id.trim_end_matches('\0');
        if startup_id.is_empty() {
            return StartupInfo::default();
        }
        debug!("Associating window {:#x} with startup notification {}", window, startup_id);
        let notification = self
            .notifications
            .entry(startup_id.to_string())
            .or_insert_with(|| StartupNotification {
                startup_id: startup_id.to_string(),
                ..Default::default()
            });
        notification.window = Some(window);
        StartupInfo {
            timestamp: notification.timestamp.or_else(|| timestamp_from_id(startup_id)),
            desktop: notification.desktop,
            screen: notification.screen,
        }
    }

    pub fn mark_complete(&mut self, startup_id: &str) {
        if let Some(n) = self.notifications.get_mut(startup_id) {
            n.complete = true;
            debug!("Startup notification {} complete", startup_id);
        }
    }

    pub fn mark_window_complete(&mut self, window: XWindow) {
        for n in self.notifications.values_mut() {
            if n.window == Some(window) && !n.complete {
                n.complete = true;
                debug!("Startup notification for window {:#x} complete", window);
            }
        }
    }

    pub fn remove_startup(&mut self, startup_id: &str) {
        self.notifications.remove(startup_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_from_id() {
        assert_eq!(timestamp_from_id("launcher-42-host_TIME123456"), Some(123456));
        assert_eq!(timestamp_from_id("no-time-here"), None);
        assert_eq!(timestamp_from_id("bad_TIMEx"), None);
    }

    #[test]
    fn test_associate_uses_registered_launch() {
        let mut m = StartupNotificationManager::new();
        m.register_startup(StartupNotification {
            startup_id: "app_TIME10".into(),
            desktop: Some(3),
            timestamp: Some(99),
            ..Default::default()
        });
        let info = m.associate_window(0x100, "app_TIME10");
        assert_eq!(info.desktop, Some(3));
        assert_eq!(info.timestamp, Some(99));
        assert!(m.has_active_startup());
        m.mark_window_complete(0x100);
        assert!(!m.has_active_startup());
    }

    #[test]
    fn test_unknown_id_still_yields_timestamp() {
        let mut m = StartupNotificationManager::new();
        let info = m.associate_window(0x100, "other_TIME77\0");
        assert_eq!(info.timestamp, Some(77));
        assert_eq!(info.desktop, None);
    }
}
