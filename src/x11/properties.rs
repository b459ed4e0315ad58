//! Batched property reads
//!
//! All requests of a batch go out before the first reply is awaited, so a
//! full manage-time read costs one round trip.

use std::collections::HashMap;

use tracing::debug;
use x11rb::connection::Connection;
use x11rb::protocol::shape::ConnectionExt as _;
use x11rb::protocol::xproto::{Atom, AtomEnum, ConnectionExt as _, GetPropertyReply, Window};

use crate::shared::Margins;
use crate::wm::client_flags::Desktop;
use crate::wm::hints::{MotifHints, SizeHints, WmHints};
use crate::wm::properties::{AppMenu, Icon, WindowProperties};
use crate::x11::atoms::Atoms;

/// Longest property value read, in 32-bit units (a 256x256 icon is 64k)
const MAX_PROPERTY_LENGTH: u32 = 1 << 20;

const ALL_DESKTOPS: u32 = 0xFFFF_FFFF;

/// Replies of one batch; missing or failed properties are simply absent
#[derive(Debug, Default)]
pub struct PropertyReplies {
    replies: HashMap<Atom, GetPropertyReply>,
}

impl PropertyReplies {
    pub fn fetch<C: Connection>(conn: &C, window: Window, properties: &[Atom]) -> Self {
        let cookies: Vec<_> = properties
            .iter()
            .filter_map(|&atom| {
                conn.get_property(false, window, atom, AtomEnum::ANY, 0, MAX_PROPERTY_LENGTH)
                    .ok()
                    .map(|cookie| (atom, cookie))
            })
            .collect();

        let mut replies = HashMap::new();
        for (atom, cookie) in cookies {
            match cookie.reply() {
                Ok(reply) if reply.type_ != x11rb::NONE => {
                    replies.insert(atom, reply);
                }
                Ok(_) => {}
                Err(e) => debug!("Property {} of 0x{:x} unreadable: {}", atom, window, e),
            }
        }
        Self { replies }
    }

    pub fn contains(&self, atom: Atom) -> bool {
        self.replies.contains_key(&atom)
    }

    pub fn cardinals(&self, atom: Atom) -> Vec<u32> {
        self.replies
            .get(&atom)
            .and_then(|reply| reply.value32())
            .map(|values| values.collect())
            .unwrap_or_default()
    }

    pub fn cardinal(&self, atom: Atom) -> Option<u32> {
        self.replies
            .get(&atom)
            .and_then(|reply| reply.value32())
            .and_then(|mut values| values.next())
    }

    pub fn text(&self, atom: Atom) -> Option<String> {
        let reply = self.replies.get(&atom)?;
        if reply.format != 8 {
            return None;
        }
        let bytes = reply.value.split(|&b| b == 0).next().unwrap_or_default();
        Some(String::from_utf8_lossy(bytes).into_owned())
    }

    /// NUL separated string list (WM_CLASS)
    pub fn strings(&self, atom: Atom) -> Vec<String> {
        self.replies
            .get(&atom)
            .filter(|reply| reply.format == 8)
            .map(|reply| {
                reply
                    .value
                    .split(|&b| b == 0)
                    .filter(|s| !s.is_empty())
                    .map(|s| String::from_utf8_lossy(s).into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Four cardinals in left, right, top, bottom order
    pub fn margins(&self, atom: Atom) -> Option<Margins> {
        let values = self.cardinals(atom);
        match values[..] {
            [left, right, top, bottom, ..] => Some(Margins::new(left, top, right, bottom)),
            _ => None,
        }
    }
}

pub fn desktop_from_raw(raw: u32) -> Desktop {
    if raw == ALL_DESKTOPS {
        Desktop::All
    } else {
        Desktop::Number(raw.saturating_add(1))
    }
}

pub fn desktop_to_raw(desktop: Desktop) -> u32 {
    match desktop {
        Desktop::All => ALL_DESKTOPS,
        Desktop::Number(n) => n.saturating_sub(1),
    }
}

/// Every property the core classifies a window by
pub fn manage_atoms(atoms: &Atoms) -> Vec<Atom> {
    vec![
        atoms.net_wm_window_type,
        atoms.net_wm_state,
        atoms.net_wm_desktop,
        atoms.net_wm_name,
        AtomEnum::WM_NAME.into(),
        atoms.net_wm_icon_name,
        AtomEnum::WM_ICON_NAME.into(),
        atoms.net_wm_icon,
        atoms.net_wm_pid,
        AtomEnum::WM_CLIENT_MACHINE.into(),
        AtomEnum::WM_CLASS.into(),
        atoms.wm_window_role,
        atoms.wm_client_leader,
        atoms.net_startup_id,
        atoms.net_wm_user_time,
        AtomEnum::WM_TRANSIENT_FOR.into(),
        AtomEnum::WM_HINTS.into(),
        AtomEnum::WM_NORMAL_HINTS.into(),
        atoms.motif_wm_hints,
        atoms.wm_protocols,
        atoms.net_wm_sync_request_counter,
        atoms.kde_net_wm_activities,
        atoms.kde_net_wm_color_scheme,
        atoms.kde_net_wm_skip_close_animation,
        atoms.kde_net_wm_screen_edge_show,
        atoms.kde_first_in_windowlist,
        atoms.kde_net_wm_appmenu_service_name,
        atoms.kde_net_wm_appmenu_object_path,
        atoms.kde_net_wm_desktop_file,
        atoms.gtk_frame_extents,
        atoms.net_wm_strut_partial,
        atoms.net_wm_strut,
    ]
}

/// Name with the EWMH UTF-8 property preferred over the legacy one
pub fn name(replies: &PropertyReplies, atoms: &Atoms) -> Option<String> {
    replies
        .text(atoms.net_wm_name)
        .or_else(|| replies.text(AtomEnum::WM_NAME.into()))
}

pub fn icon_name(replies: &PropertyReplies, atoms: &Atoms) -> Option<String> {
    replies
        .text(atoms.net_wm_icon_name)
        .or_else(|| replies.text(AtomEnum::WM_ICON_NAME.into()))
}

pub fn strut(replies: &PropertyReplies, atoms: &Atoms) -> Option<Margins> {
    replies
        .margins(atoms.net_wm_strut_partial)
        .or_else(|| replies.margins(atoms.net_wm_strut))
}

/// Read everything the core needs at manage time
pub fn read_properties<C: Connection>(conn: &C, atoms: &Atoms, window: Window) -> WindowProperties {
    let replies = PropertyReplies::fetch(conn, window, &manage_atoms(atoms));
    let shape = conn.shape_query_extents(window).ok();

    let class = replies.strings(AtomEnum::WM_CLASS.into());
    let client_leader = replies
        .cardinal(atoms.wm_client_leader)
        .filter(|&leader| leader != x11rb::NONE);
    // SM_CLIENT_ID lives on the leader
    let session_id = client_leader.and_then(|leader| {
        PropertyReplies::fetch(conn, leader, &[atoms.sm_client_id]).text(atoms.sm_client_id)
    });
    let app_menu = match (
        replies.text(atoms.kde_net_wm_appmenu_service_name),
        replies.text(atoms.kde_net_wm_appmenu_object_path),
    ) {
        (Some(service_name), Some(object_path)) => Some(AppMenu { service_name, object_path }),
        _ => None,
    };

    WindowProperties {
        window_type: atoms.window_type(&replies.cardinals(atoms.net_wm_window_type)),
        net_state: atoms.net_state(&replies.cardinals(atoms.net_wm_state)),
        desktop: replies.cardinal(atoms.net_wm_desktop).map(desktop_from_raw),
        name: name(&replies, atoms),
        icon_name: icon_name(&replies, atoms),
        icon: Icon::largest_from_raw(&replies.cardinals(atoms.net_wm_icon)),
        pid: replies.cardinal(atoms.net_wm_pid).filter(|&pid| pid != 0),
        client_machine: replies.text(AtomEnum::WM_CLIENT_MACHINE.into()),
        resource_name: class.first().cloned().unwrap_or_default().to_lowercase(),
        resource_class: class.get(1).cloned().unwrap_or_default().to_lowercase(),
        window_role: replies.text(atoms.wm_window_role).unwrap_or_default(),
        session_id,
        client_leader,
        startup_id: replies.text(atoms.net_startup_id),
        user_time: replies.cardinal(atoms.net_wm_user_time),
        transient_for: replies.cardinal(AtomEnum::WM_TRANSIENT_FOR.into()),
        wm_hints: WmHints::from_raw(&replies.cardinals(AtomEnum::WM_HINTS.into())),
        size_hints: SizeHints::from_raw(&replies.cardinals(AtomEnum::WM_NORMAL_HINTS.into())),
        motif_hints: MotifHints::from_raw(&replies.cardinals(atoms.motif_wm_hints)),
        protocols: atoms.protocols(&replies.cardinals(atoms.wm_protocols)),
        sync_counter: replies
            .cardinal(atoms.net_wm_sync_request_counter)
            .filter(|&counter| counter != x11rb::NONE),
        activities: replies.text(atoms.kde_net_wm_activities),
        color_scheme: replies.text(atoms.kde_net_wm_color_scheme),
        skip_close_animation: replies
            .cardinal(atoms.kde_net_wm_skip_close_animation)
            .is_some_and(|v| v != 0),
        screen_edge: replies.cardinal(atoms.kde_net_wm_screen_edge_show),
        first_in_tabbox: replies.cardinal(atoms.kde_first_in_windowlist).is_some_and(|v| v != 0),
        app_menu,
        desktop_file_name: replies.text(atoms.kde_net_wm_desktop_file),
        gtk_frame_extents: replies.margins(atoms.gtk_frame_extents),
        strut: strut(&replies, atoms),
        shaped: shape
            .and_then(|cookie| cookie.reply().ok())
            .is_some_and(|extents| extents.bounding_shaped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_desktop_raw_values() {
        assert_eq!(desktop_from_raw(0), Desktop::Number(1));
        assert_eq!(desktop_from_raw(ALL_DESKTOPS), Desktop::All);
        assert_eq!(desktop_to_raw(Desktop::Number(3)), 2);
        assert_eq!(desktop_to_raw(Desktop::All), ALL_DESKTOPS);
    }
}
