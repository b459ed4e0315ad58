//! Window properties as fetched in one batch at manage time.

use tracing::debug;

use crate::shared::Margins;
use crate::wm::Workspace;
use crate::wm::client::ClientId;
use crate::wm::client_flags::{Desktop, NetState, Protocols, WindowType};
use crate::wm::display::{Timestamp, XWindow};
use crate::wm::hints::{MotifHints, SizeHints, WmHints};

/// Activities value meaning "on every activity"
pub const NULL_ACTIVITY: &str = "00000000-0000-0000-0000-000000000000";

/// ARGB icon as carried by _NET_WM_ICON
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Icon {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u32>,
}

impl Icon {
    /// Pick the largest image out of a raw _NET_WM_ICON value
    pub fn largest_from_raw(values: &[u32]) -> Option<Icon> {
        let mut best: Option<Icon> = None;
        let mut rest = values;
        while rest.len() >= 2 {
            let (w, h) = (rest[0], rest[1]);
            let len = (w as usize).checked_mul(h as usize)?;
            if len == 0 || rest.len() < 2 + len {
                break;
            }
            if best.as_ref().is_none_or(|b| u64::from(b.width) * u64::from(b.height) < u64::from(w) * u64::from(h)) {
                best = Some(Icon { width: w, height: h, data: rest[2..2 + len].to_vec() });
            }
            rest = &rest[2 + len..];
        }
        best
    }
}

/// DBus address of an exported application menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppMenu {
    pub service_name: String,
    pub object_path: String,
}

/// Everything the core reads from a client window
#[derive(Debug, Clone, Default)]
pub struct WindowProperties {
    pub window_type: WindowType,
    pub net_state: NetState,
    /// `None` when the client did not request a desktop
    pub desktop: Option<Desktop>,
    pub name: Option<String>,
    pub icon_name: Option<String>,
    pub icon: Option<Icon>,
    pub pid: Option<u32>,
    pub client_machine: Option<String>,
    pub resource_name: String,
    pub resource_class: String,
    pub window_role: String,
    pub session_id: Option<String>,
    pub client_leader: Option<XWindow>,
    pub startup_id: Option<String>,
    pub user_time: Option<Timestamp>,
    pub transient_for: Option<XWindow>,
    pub wm_hints: Option<WmHints>,
    pub size_hints: Option<SizeHints>,
    pub motif_hints: Option<MotifHints>,
    pub protocols: Protocols,
    pub sync_counter: Option<u32>,
    /// Raw comma-separated activity list
    pub activities: Option<String>,
    pub color_scheme: Option<String>,
    pub skip_close_animation: bool,
    pub screen_edge: Option<u32>,
    pub first_in_tabbox: bool,
    pub app_menu: Option<AppMenu>,
    pub desktop_file_name: Option<String>,
    pub gtk_frame_extents: Option<Margins>,
    pub strut: Option<Margins>,
    pub shaped: bool,
}

/// Properties re-read after the client changed them
impl Workspace {
    pub fn update_wm_hints(&mut self, id: ClientId, hints: Option<WmHints>) {
        let hints = hints.unwrap_or_default();
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.input_hint = hints.accepts_input();
        let leader_changed = c.group_leader != hints.window_group;
        c.group_leader = hints.window_group;
        if leader_changed {
            debug!("Window {:#x} changed its group leader", c.window);
            self.check_group(id, None, false);
        }
        self.demand_attention(id, hints.is_urgent());
    }

    pub fn update_size_hints(&mut self, id: ClientId, hints: Option<SizeHints>) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.size_hints = hints.unwrap_or_default();
        self.update_allowed_actions(id, false);
    }

    pub fn update_motif_hints(&mut self, id: ClientId, hints: Option<MotifHints>) {
        let detected = self.detect_no_border(id);
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.motif = hints.unwrap_or_default();
        let app_no_border = c.motif.no_border();
        if app_no_border != c.app_no_border {
            c.app_no_border = app_no_border;
            c.no_border = c.rules.check_no_border(detected || app_no_border, false);
            self.update_decoration(id, false);
        }
        self.update_allowed_actions(id, false);
    }

    pub fn update_protocols(&mut self, id: ClientId, protocols: Protocols, sync_counter: Option<u32>) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.protocols = protocols;
        c.sync.counter = sync_counter.filter(|_| protocols.contains(Protocols::SYNC_REQUEST));
        self.update_allowed_actions(id, false);
    }

    pub fn update_icon(&mut self, id: ClientId, icon: Option<Icon>) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.icon = icon;
        if let Some(group) = c.group {
            self.update_group_icon(group);
        }
    }

    pub fn update_strut(&mut self, id: ClientId, strut: Option<Margins>) {
        if let Some(c) = self.clients.get_mut(&id) {
            c.strut = strut;
        }
    }

    /// Client-side shadows changed (`_GTK_FRAME_EXTENTS`); the visible
    /// client area stays where it is
    pub fn update_client_frame_extents(&mut self, id: ClientId, extents: Option<Margins>) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let extents = extents.unwrap_or_default();
        if c.client_frame_extents == extents {
            return;
        }
        let client = c.client_geometry;
        c.client_frame_extents = extents;
        let frame = c.client_rect_to_frame_rect(client);
        self.set_frame_geometry(id, frame, crate::wm::geometry::ForceGeometry::No);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::events::ClientEvent;
    use crate::wm::testing::{TestSetup, WindowSpec};

    #[test]
    fn test_largest_icon_wins() {
        let mut raw = vec![1, 1, 0xff00_00ff];
        raw.extend([2, 2, 1, 2, 3, 4]);
        let icon = Icon::largest_from_raw(&raw).unwrap();
        assert_eq!((icon.width, icon.height), (2, 2));
        assert_eq!(icon.data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_truncated_icon_is_ignored() {
        assert!(Icon::largest_from_raw(&[4, 4, 1, 2]).is_none());
    }

    #[test]
    fn test_urgency_hint_demands_attention() {
        let mut t = TestSetup::new();
        let first = t.manage(WindowSpec::normal(0x100));
        let second = t.manage(WindowSpec::normal(0x200));
        t.ws.activate_client(second);
        t.take_events();

        let urgent = WmHints::from_raw(&[1 << 8, 0, 0, 0, 0, 0, 0, 0, 0]);
        t.ws.update_wm_hints(first, urgent);

        assert!(t.ws.client(first).unwrap().demands_attention);
        assert!(t.events().contains(&ClientEvent::DemandsAttention { client: first, demands: true }));
    }

    #[test]
    fn test_motif_no_border_drops_decoration() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        assert!(t.ws.client(id).unwrap().decoration.is_some());

        let borderless = MotifHints::from_raw(&[1 << 1, 0, 0, 0, 0]);
        t.ws.update_motif_hints(id, borderless);

        let c = t.ws.client(id).unwrap();
        assert!(c.app_no_border);
        assert!(c.decoration.is_none());
    }

    #[test]
    fn test_sync_counter_needs_protocol() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));

        t.ws.update_protocols(id, Protocols::DELETE, Some(0x55));
        assert_eq!(t.ws.client(id).unwrap().sync.counter, None);

        t.ws.update_protocols(id, Protocols::DELETE | Protocols::SYNC_REQUEST, Some(0x55));
        assert_eq!(t.ws.client(id).unwrap().sync.counter, Some(0x55));
    }
}
