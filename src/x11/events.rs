//! X11 event driver
//!
//! Translates server events into workspace operations and reflects the
//! workspace's [`ClientEvent`]s back onto the root window and the stacking
//! order.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, trace, warn};
use x11rb::connection::Connection;
use x11rb::protocol::Event;
use x11rb::protocol::randr::{self, ConnectionExt as _};
use x11rb::protocol::shape;
use x11rb::protocol::xproto::{
    AtomEnum, ClientMessageEvent, ConfigWindow, ConfigureRequestEvent, ConfigureWindowAux,
    ConnectionExt as _, MapRequestEvent, MapState, PropMode, PropertyNotifyEvent, StackMode,
    UnmapNotifyEvent, Window,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::shared::{Geometry, Point, Size};
use crate::wm::client::ClientId;
use crate::wm::client_flags::{Desktop, MaximizeMode, NetState, ShadeMode};
use crate::wm::events::ClientEvent;
use crate::wm::geometry::Output;
use crate::wm::hints::{MotifHints, SizeHints, WmHints};
use crate::wm::properties::Icon;
use crate::wm::{ManageError, Workspace};
use crate::x11::atoms::Atoms;
use crate::x11::connection::WmSelection;
use crate::x11::display::Shared;
use crate::x11::properties::{self, PropertyReplies, desktop_from_raw, desktop_to_raw};

const NET_WM_STATE_REMOVE: u32 = 0;
const NET_WM_STATE_ADD: u32 = 1;
const NET_WM_STATE_TOGGLE: u32 = 2;
const ICONIC_STATE: u32 = 3;

pub struct X11Driver {
    conn: Arc<RustConnection>,
    screen_num: usize,
    root: Window,
    atoms: Atoms,
    shared: Shared,
    selection: WmSelection,
    /// Bottom to top, before layers are applied
    stacking: Vec<ClientId>,
    /// Another window manager took over
    pub lost_selection: bool,
}

impl X11Driver {
    pub fn new(
        conn: Arc<RustConnection>,
        screen_num: usize,
        atoms: Atoms,
        shared: Shared,
        selection: WmSelection,
    ) -> Self {
        let root = conn.setup().roots[screen_num].root;
        if let Err(e) = conn.randr_select_input(root, randr::NotifyMask::SCREEN_CHANGE) {
            warn!("RandR unavailable, output changes will be missed: {}", e);
        }
        Self {
            conn,
            screen_num,
            root,
            atoms,
            shared,
            selection,
            stacking: Vec::new(),
            lost_selection: false,
        }
    }

    /// Outputs from RandR monitors, or the whole screen as one output
    pub fn query_outputs(&self) -> Vec<Output> {
        let monitors = self
            .conn
            .randr_get_monitors(self.root, true)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .map(|reply| reply.monitors)
            .unwrap_or_default();
        if !monitors.is_empty() {
            return monitors
                .iter()
                .map(|m| Output::new(Geometry::new(m.x.into(), m.y.into(), m.width.into(), m.height.into())))
                .collect();
        }
        let screen = &self.conn.setup().roots[self.screen_num];
        vec![Output::new(Geometry::new(
            0,
            0,
            screen.width_in_pixels.into(),
            screen.height_in_pixels.into(),
        ))]
    }

    /// Manage the windows that were mapped before we started
    pub fn scan_existing(&mut self, ws: &mut Workspace) -> Result<()> {
        let tree = self
            .conn
            .query_tree(self.root)?
            .reply()
            .context("Failed to query existing windows")?;
        let cookies: Vec<_> = tree
            .children
            .iter()
            .filter(|&&w| w != self.selection.owner)
            .filter_map(|&w| self.conn.get_window_attributes(w).ok().map(|c| (w, c)))
            .collect();
        let windows: Vec<Window> = cookies
            .into_iter()
            .filter_map(|(w, cookie)| cookie.reply().ok().map(|attrs| (w, attrs)))
            .filter(|(_, attrs)| !attrs.override_redirect && attrs.map_state == MapState::VIEWABLE)
            .map(|(w, _)| w)
            .collect();
        let managed = ws.manage_existing(&windows);
        info!("Managed {} of {} existing windows", managed.len(), windows.len());
        self.process_client_events(ws);
        Ok(())
    }

    pub fn export_desktops(&self, ws: &Workspace) {
        let names: Vec<u8> = ws
            .config
            .desktops
            .names
            .iter()
            .flat_map(|name| name.bytes().chain(std::iter::once(0)))
            .collect();
        let result = (|| -> Result<(), x11rb::errors::ConnectionError> {
            self.conn.change_property32(
                PropMode::REPLACE,
                self.root,
                self.atoms.net_number_of_desktops,
                AtomEnum::CARDINAL,
                &[ws.desktop_count],
            )?;
            self.conn.change_property32(
                PropMode::REPLACE,
                self.root,
                self.atoms.net_current_desktop,
                AtomEnum::CARDINAL,
                &[desktop_to_raw(Desktop::Number(ws.current_desktop))],
            )?;
            self.conn.change_property8(
                PropMode::REPLACE,
                self.root,
                self.atoms.net_desktop_names,
                self.atoms.utf8_string,
                &names,
            )?;
            Ok(())
        })();
        if let Err(e) = result {
            warn!("Failed to export desktops: {}", e);
        }
    }

    pub fn handle_event(&mut self, ws: &mut Workspace, event: Event) {
        match event {
            Event::MapRequest(e) => self.handle_map_request(ws, e),
            Event::UnmapNotify(e) => self.handle_unmap_notify(ws, e),
            Event::DestroyNotify(e) => {
                if let Some(id) = ws.find_client(e.window) {
                    ws.destroy(id);
                }
            }
            Event::ConfigureRequest(e) => self.handle_configure_request(ws, e),
            Event::PropertyNotify(e) => self.handle_property_notify(ws, e),
            Event::ClientMessage(e) => self.handle_client_message(ws, e),
            Event::ShapeNotify(e) => {
                if e.shape_kind == shape::SK::BOUNDING {
                    if let Some(id) = ws.find_client(e.affected_window) {
                        ws.update_shape(id, e.shaped);
                    }
                }
            }
            Event::SyncAlarmNotify(e) => {
                let window = self.shared.tracking.borrow().window_for_alarm(e.alarm);
                if let Some(id) = window.and_then(|w| ws.find_client(w)) {
                    let value = (u64::from(e.counter_value.hi as u32) << 32) | u64::from(e.counter_value.lo);
                    ws.handle_sync_ack(id, value);
                }
            }
            Event::RandrScreenChangeNotify(_) => {
                let outputs = self.query_outputs();
                debug!("Outputs changed: {:?}", outputs);
                ws.set_outputs(outputs);
            }
            Event::SelectionClear(e) if e.selection == self.selection.selection => {
                info!("Lost WM selection to another window manager");
                self.lost_selection = true;
            }
            Event::Error(e) => debug!("X11 error: {:?}", e),
            other => trace!("Unhandled event: {:?}", other),
        }
    }

    fn handle_map_request(&mut self, ws: &mut Workspace, e: MapRequestEvent) {
        if let Some(id) = ws.find_client(e.window) {
            ws.activate_client(id);
            return;
        }
        ws.pointer = self
            .conn
            .query_pointer(self.root)
            .ok()
            .and_then(|cookie| cookie.reply().ok())
            .map(|reply| Point::new(reply.root_x.into(), reply.root_y.into()));
        match ws.manage(e.window, false) {
            Ok(id) => debug!("Managed 0x{:x} as {}", e.window, id),
            Err(ManageError::OverrideRedirect(window)) => {
                if let Err(e) = self.conn.map_window(window) {
                    warn!("Failed to map 0x{:x}: {}", window, e);
                }
            }
            Err(err) => warn!("Not managing 0x{:x}: {}", e.window, err),
        }
    }

    fn handle_unmap_notify(&mut self, ws: &mut Workspace, e: UnmapNotifyEvent) {
        // Each unmap is reported to the window and to its parent
        if e.event != e.window && e.event != self.root {
            return;
        }
        if self.shared.tracking.borrow_mut().take_expected_unmap(e.window) {
            return;
        }
        if let Some(id) = ws.find_client(e.window) {
            debug!("Client withdrew 0x{:x}", e.window);
            ws.release(id, false);
        }
    }

    fn handle_configure_request(&mut self, ws: &mut Workspace, e: ConfigureRequestEvent) {
        let Some(id) = ws.find_client(e.window) else {
            let aux = ConfigureWindowAux::from_configure_request(&e);
            if let Err(err) = self.conn.configure_window(e.window, &aux) {
                warn!("Failed to configure unmanaged 0x{:x}: {}", e.window, err);
            }
            return;
        };
        let Some(current) = ws.client(id).map(|c| c.client_geometry) else {
            return;
        };
        let mask = u16::from(e.value_mask);
        let has = |flag: ConfigWindow| mask & u16::from(flag) != 0;
        let pos = (has(ConfigWindow::X) || has(ConfigWindow::Y)).then(|| {
            Point::new(
                if has(ConfigWindow::X) { e.x.into() } else { current.x },
                if has(ConfigWindow::Y) { e.y.into() } else { current.y },
            )
        });
        let size = (has(ConfigWindow::WIDTH) || has(ConfigWindow::HEIGHT)).then(|| {
            Size::new(
                if has(ConfigWindow::WIDTH) { e.width.into() } else { current.width },
                if has(ConfigWindow::HEIGHT) { e.height.into() } else { current.height },
            )
        });
        ws.configure_request(id, pos, size);
    }

    fn handle_property_notify(&mut self, ws: &mut Workspace, e: PropertyNotifyEvent) {
        self.shared.time.set(e.time);
        let Some(id) = ws.find_client(e.window) else {
            return;
        };
        let a = &self.atoms;
        let atom = e.atom;
        let fetch = |props: &[u32]| PropertyReplies::fetch(self.conn.as_ref(), e.window, props);

        if atom == a.net_wm_name || atom == u32::from(AtomEnum::WM_NAME) {
            let replies = fetch(&[a.net_wm_name, AtomEnum::WM_NAME.into()]);
            ws.fetch_name(id, properties::name(&replies, a).as_deref());
        } else if atom == a.net_wm_icon_name || atom == u32::from(AtomEnum::WM_ICON_NAME) {
            let replies = fetch(&[a.net_wm_icon_name, AtomEnum::WM_ICON_NAME.into()]);
            ws.fetch_iconic_name(id, properties::icon_name(&replies, a).as_deref());
        } else if atom == u32::from(AtomEnum::WM_TRANSIENT_FOR) {
            ws.read_transient(id, fetch(&[atom]).cardinal(atom));
        } else if atom == u32::from(AtomEnum::WM_HINTS) {
            ws.update_wm_hints(id, WmHints::from_raw(&fetch(&[atom]).cardinals(atom)));
        } else if atom == u32::from(AtomEnum::WM_NORMAL_HINTS) {
            ws.update_size_hints(id, SizeHints::from_raw(&fetch(&[atom]).cardinals(atom)));
        } else if atom == a.motif_wm_hints {
            ws.update_motif_hints(id, MotifHints::from_raw(&fetch(&[atom]).cardinals(atom)));
        } else if atom == a.wm_protocols || atom == a.net_wm_sync_request_counter {
            let replies = fetch(&[a.wm_protocols, a.net_wm_sync_request_counter]);
            let counter = replies
                .cardinal(a.net_wm_sync_request_counter)
                .filter(|&c| c != x11rb::NONE);
            {
                let mut tracking = self.shared.tracking.borrow_mut();
                match counter {
                    Some(counter) => tracking.sync_counters.insert(e.window, counter),
                    None => tracking.sync_counters.remove(&e.window),
                };
            }
            ws.update_protocols(id, a.protocols(&replies.cardinals(a.wm_protocols)), counter);
        } else if atom == a.net_wm_user_time {
            if let Some(time) = fetch(&[atom]).cardinal(atom) {
                ws.update_user_time(id, Some(time));
            }
        } else if atom == a.kde_net_wm_activities {
            ws.check_activities(id, fetch(&[atom]).text(atom).as_deref());
        } else if atom == a.kde_net_wm_screen_edge_show {
            match fetch(&[atom]).cardinal(atom) {
                Some(edge) => ws.reserve_screen_edge(id, edge),
                None => ws.release_screen_edge(id),
            }
        } else if atom == a.net_wm_icon {
            ws.update_icon(id, Icon::largest_from_raw(&fetch(&[atom]).cardinals(atom)));
        } else if atom == a.net_wm_strut || atom == a.net_wm_strut_partial {
            let replies = fetch(&[a.net_wm_strut_partial, a.net_wm_strut]);
            ws.update_strut(id, properties::strut(&replies, a));
        } else if atom == a.gtk_frame_extents {
            ws.update_client_frame_extents(id, fetch(&[atom]).margins(atom));
        }
    }

    fn handle_client_message(&mut self, ws: &mut Workspace, e: ClientMessageEvent) {
        let data = e.data.as_data32();
        let a = self.atoms;

        if e.type_ == a.wm_protocols && data[0] == a.net_wm_ping {
            // Pongs come back to the root with the client in data[2]
            if let Some(id) = ws.find_client(data[2]) {
                ws.got_ping(id, data[1]);
            }
            return;
        }
        if e.type_ == a.net_current_desktop {
            let desktop = data[0].saturating_add(1);
            if desktop <= ws.desktop_count {
                ws.set_current_desktop(desktop);
                self.export_desktops(ws);
            }
            return;
        }

        let Some(id) = ws.find_client(e.window) else {
            return;
        };
        match e.type_ {
            t if t == a.net_active_window => ws.activate_client(id),
            t if t == a.net_close_window => ws.close_window(id),
            t if t == a.net_wm_desktop => ws.set_desktop(id, desktop_from_raw(data[0])),
            t if t == a.wm_change_state => {
                if data[0] == ICONIC_STATE {
                    ws.minimize(id);
                }
            }
            t if t == a.net_wm_state => self.change_net_state(ws, id, data[0], &data[1..3]),
            _ => trace!("Ignoring client message {} for 0x{:x}", e.type_, e.window),
        }
    }

    fn change_net_state(&self, ws: &mut Workspace, id: ClientId, action: u32, atoms: &[u32]) {
        let Some(c) = ws.client(id) else {
            return;
        };
        let current = c.net_state();
        let mut max_mode = c.max_mode;
        let want = |flag: NetState| match action {
            NET_WM_STATE_REMOVE => false,
            NET_WM_STATE_ADD => true,
            _ => !current.contains(flag),
        };

        for flag in atoms.iter().filter_map(|&atom| self.atoms.net_state_flag(atom)) {
            let on = want(flag);
            match flag {
                NetState::MAX_VERT => max_mode.set(MaximizeMode::VERTICAL, on),
                NetState::MAX_HORIZ => max_mode.set(MaximizeMode::HORIZONTAL, on),
                NetState::STICKY => ws.set_on_all_desktops(id, on),
                NetState::SHADED if action == NET_WM_STATE_TOGGLE => ws.toggle_shade(id),
                NetState::SHADED => ws.set_shade(id, if on { ShadeMode::Normal } else { ShadeMode::None }),
                NetState::SKIP_TASKBAR => ws.set_skip_taskbar(id, on),
                NetState::SKIP_PAGER => ws.set_skip_pager(id, on),
                NetState::SKIP_SWITCHER => ws.set_skip_switcher(id, on),
                NetState::FULLSCREEN => ws.set_full_screen(id, on),
                NetState::KEEP_ABOVE => ws.set_keep_above(id, on),
                NetState::KEEP_BELOW => ws.set_keep_below(id, on),
                NetState::DEMANDS_ATTENTION => ws.demand_attention(id, on),
                // Modal and hidden are owned by us
                _ => {}
            }
        }
        if ws.client(id).is_some_and(|c| c.max_mode != max_mode) {
            ws.maximize(id, max_mode);
        }
    }

    /// Reflect queued workspace notifications onto the server
    pub fn process_client_events(&mut self, ws: &mut Workspace) {
        let mut restack = false;
        let mut client_list = false;
        for event in ws.take_events() {
            match event {
                ClientEvent::Managed(id) => {
                    self.stacking.push(id);
                    restack = true;
                    client_list = true;
                }
                ClientEvent::Closed { client, deleted } => {
                    self.stacking.retain(|&c| c != client);
                    client_list = true;
                    if let Some(deleted) = deleted {
                        ws.unref_deleted(deleted);
                    }
                }
                ClientEvent::ActiveChanged(active) => {
                    let window = active
                        .and_then(|id| ws.client(id))
                        .map_or(x11rb::NONE, |c| c.window);
                    self.set_root_window_property(self.atoms.net_active_window, &[window]);
                    if let Some(id) = active {
                        self.stacking.retain(|&c| c != id);
                        self.stacking.push(id);
                        restack = true;
                    }
                }
                ClientEvent::RestackUnderActive(id) => {
                    if let Some(active) = ws.active {
                        self.stacking.retain(|&c| c != id);
                        let at = self.stacking.iter().position(|&c| c == active).unwrap_or(0);
                        self.stacking.insert(at, id);
                        restack = true;
                    }
                }
                ClientEvent::LayerChanged { .. } => restack = true,
                ClientEvent::DesktopChanged(_) | ClientEvent::ActivitiesChanged(_) => {}
                other => trace!("{:?}", other),
            }
        }
        if client_list {
            let windows: Vec<Window> = ws
                .client_ids()
                .into_iter()
                .filter_map(|id| ws.client(id).map(|c| c.window))
                .collect();
            self.set_root_window_property(self.atoms.net_client_list, &windows);
        }
        if restack {
            self.restack(ws);
        }
    }

    fn set_root_window_property(&self, property: u32, windows: &[Window]) {
        if let Err(e) =
            self.conn
                .change_property32(PropMode::REPLACE, self.root, property, AtomEnum::WINDOW, windows)
        {
            warn!("Failed to update root property {}: {}", property, e);
        }
    }

    /// Stack frames bottom to top by layer, keeping the recorded order
    /// inside each layer
    fn restack(&mut self, ws: &Workspace) {
        self.stacking.retain(|id| ws.client(*id).is_some());
        let mut order: Vec<(ClientId, Window)> = self
            .stacking
            .iter()
            .filter_map(|&id| ws.client(id).and_then(|c| c.frame.map(|f| (id, f.frame))))
            .collect();
        order.sort_by_key(|(id, _)| ws.client(*id).and_then(|c| c.layer));

        let mut below: Option<Window> = None;
        for (_, frame) in order {
            let aux = match below {
                Some(sibling) => ConfigureWindowAux::new().sibling(sibling).stack_mode(StackMode::ABOVE),
                None => ConfigureWindowAux::new().stack_mode(StackMode::BELOW),
            };
            if let Err(e) = self.conn.configure_window(frame, &aux) {
                warn!("Failed to restack frame 0x{:x}: {}", frame, e);
            }
            below = Some(frame);
        }
    }
}

