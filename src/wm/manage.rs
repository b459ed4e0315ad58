//! Manage Module
//!
//! Taking a window under management and letting go of it again.
//!
//! `manage()` only fails before anything was created: once the window has
//! been embedded every step falls back to a default instead of bailing out,
//! because a half-managed window would leak its frame. The whole sequence
//! runs with geometry updates blocked and ends in a single commit.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::shared::{Geometry, Size};
use crate::wm::Workspace;
use crate::wm::caption::simplify_caption;
use crate::wm::client::{Client, ClientId, ClientMachine, PendingGeometry};
use crate::wm::client_flags::{
    Desktop, MappingState, MaximizeMode, NetState, Protocols, ShadeMode, WindowType, WmState,
};
use crate::wm::display::{DisplayError, XWindow};
use crate::wm::events::ClientEvent;
use crate::wm::focus::FocusChainChange;
use crate::wm::geometry::{AreaKind, ForceGeometry};
use crate::wm::placement::PlacementRequest;
use crate::wm::properties::{NULL_ACTIVITY, WindowProperties};
use crate::wm::rules::WindowMatch;
use crate::wm::session::{SessionInfo, SessionMatch};
use crate::wm::startup::StartupInfo;
use crate::wm::visibility::{normalize_activities, parse_activities};

/// Raise mode of _KDE_NET_WM_SCREEN_EDGE_SHOW, in the second byte
const SCREEN_EDGE_RAISE: u32 = 1;

/// Why a window was not taken under management
#[derive(Debug, Error)]
pub enum ManageError {
    #[error("failed to probe window: {0}")]
    Probe(#[from] DisplayError),
    #[error("window {0:#x} is override-redirect")]
    OverrideRedirect(XWindow),
    #[error("window {0:#x} is already managed")]
    AlreadyManaged(XWindow),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Teardown {
    Release { on_shutdown: bool },
    Destroy,
}

impl Workspace {
    /// Take `window` under management. `already_mapped` is set for windows
    /// found at startup, which keep their position.
    pub fn manage(&mut self, window: XWindow, already_mapped: bool) -> Result<ClientId, ManageError> {
        if self.find_client(window).is_some() {
            return Err(ManageError::AlreadyManaged(window));
        }
        let snapshot = self.services.display.probe(window)?;
        if snapshot.override_redirect {
            return Err(ManageError::OverrideRedirect(window));
        }
        info!("Managing window {:#x} (already mapped: {})", window, already_mapped);

        let id = ClientId::from_raw(self.next_client);
        self.next_client += 1;
        let mut client = Client::new(id, window);
        client.block_geometry_updates = 1;
        client.pending_geometry = PendingGeometry::Forced;
        client.frame = Some(self.services.display.embed(window, &snapshot));
        client.frame_geometry = snapshot.geometry;
        client.client_geometry = snapshot.geometry;
        client.buffer_geometry = snapshot.geometry;
        self.clients.insert(id, client);

        let props = self.services.display.fetch_properties(window);
        self.read_properties(id, &props);
        self.setup_rules(id, &props);
        let session = self.take_session_info(id);
        if session.is_some() {
            debug!("Window {:#x} restored from session", window);
        }

        self.init_border(id, session.as_ref());

        // Group first: loop breaking in the transient graph needs it
        self.check_group(id, None, false);
        self.read_transient(id, props.transient_for);

        let startup = match props.startup_id.as_deref() {
            Some(startup_id) => self.startup.associate_window(window, startup_id),
            None => StartupInfo::default(),
        };
        self.init_desktop(id, session.as_ref(), &props, &startup);
        self.init_geometry(id, session.as_ref(), &props, &startup, already_mapped);
        self.init_states(id, session.as_ref(), &props, already_mapped);

        let user_time = props.user_time.or(startup.timestamp);
        if let Some(c) = self.clients.get_mut(&id) {
            c.user_time = user_time;
            if let Some(time) = user_time {
                if let Some(group) = c.group.and_then(|g| self.groups.get_mut(&g)) {
                    group.update_user_time(time);
                }
            }
        }
        self.services.activation.update_focus_chain(id, FocusChainChange::Update);

        let allow = match session.as_ref() {
            Some(s) => {
                s.active
                    && self
                        .active
                        .is_none_or(|a| self.clients.get(&a).is_some_and(|ac| ac.is_desktop()))
            }
            None => {
                let query = self.activation_query(id, false);
                self.services.activation.allow_activation(&query)
            }
        };
        let on_current = self.is_on_current_desktop(id);
        if !allow && !already_mapped && on_current {
            debug!("Window {:#x} may not steal focus", window);
            self.events.push(ClientEvent::RestackUnderActive(id));
        }

        if let Some(c) = self.clients.get_mut(&id) {
            c.managed = true;
        }
        self.unblock_geometry_updates(id);
        self.update_visibility(id);
        self.update_allowed_actions(id, true);
        self.export_net_state(id);
        self.update_layer(id);
        self.events.push(ClientEvent::Managed(id));

        let (has_counter, special, shown) = match self.clients.get(&id) {
            Some(c) => (c.supports_sync(), c.is_special_window(), c.is_shown()),
            None => (false, false, false),
        };
        if has_counter {
            // Not painted until the client answers or the failsafe fires
            self.send_sync_request(id);
        } else if !self.compositing {
            self.set_ready_for_painting(id);
        }

        if !already_mapped && shown {
            if allow && on_current && !special && self.wants_tab_focus(id) {
                self.take_focus(id);
                self.set_active(Some(id));
            } else if session.is_none() && !special {
                self.demand_attention(id, true);
            }
        }

        // Windows that were waiting for this one as their parent
        for other in self.client_ids() {
            if other != id {
                self.check_transient(other, window);
            }
        }
        self.check_active_modal();
        self.startup.mark_window_complete(window);
        if let Some(edge) = props.screen_edge {
            self.reserve_screen_edge(id, edge);
        }
        debug!("Window {:#x} managed as {}", window, id);
        Ok(id)
    }

    fn read_properties(&mut self, id: ClientId, props: &WindowProperties) {
        let machine = ClientMachine::resolve(props.client_machine.as_deref(), &self.local_hostname);
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let window = c.window;
        c.window_type = props.window_type;
        c.protocols = props.protocols;
        c.pid = props.pid;
        c.machine = machine;
        c.resource_name = props.resource_name.clone();
        c.resource_class = props.resource_class.clone();
        c.window_role = props.window_role.clone();
        c.session_id = props.session_id.clone();
        c.client_leader = props.client_leader.filter(|l| *l != 0);
        c.startup_id = props.startup_id.clone();
        c.desktop_file_name = props.desktop_file_name.clone();
        c.color_scheme = props.color_scheme.clone();
        c.app_menu = props.app_menu.clone();
        c.icon = props.icon.clone();
        c.strut = props.strut;
        c.shaped = props.shaped;
        c.skip_close_animation = props.skip_close_animation;
        c.first_in_tabbox = props.first_in_tabbox;
        c.caption.iconic = simplify_caption(props.icon_name.as_deref().unwrap_or_default());
        c.modal = props.net_state.contains(NetState::MODAL);
        c.client_frame_extents = props.gtk_frame_extents.unwrap_or_default();

        if props.protocols.contains(Protocols::SYNC_REQUEST) {
            c.sync.counter = props.sync_counter;
        }
        match &props.wm_hints {
            Some(hints) => {
                c.input_hint = hints.accepts_input();
                c.group_leader = hints.window_group;
            }
            None => debug!("Window {:#x} has no WM_HINTS, assuming it accepts input", window),
        }
        match &props.size_hints {
            Some(hints) => c.size_hints = hints.clone(),
            None => debug!("Window {:#x} has no usable WM_NORMAL_HINTS", window),
        }
        c.motif = props.motif_hints.unwrap_or_default();
    }

    fn setup_rules(&mut self, id: ClientId, props: &WindowProperties) {
        let raw_caption = props.name.as_deref().unwrap_or_default();
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let caption = simplify_caption(raw_caption);
        let rules = self.services.rules.for_window(&WindowMatch {
            resource_name: &c.resource_name,
            resource_class: &c.resource_class,
            window_role: &c.window_role,
            caption: &caption,
            client_machine: &c.machine.hostname,
            window_type: c.window_type,
        });
        if let Some(c) = self.clients.get_mut(&id) {
            c.rules = rules;
            let scheme = c.color_scheme.take();
            c.color_scheme = c.rules.check_deco_color(scheme);
        }
        // Suffixes depend on the other captions, so only now
        self.set_caption(id, raw_caption, true);
    }

    fn take_session_info(&mut self, id: ClientId) -> Option<SessionInfo> {
        let c = self.clients.get(&id)?;
        let key = SessionMatch {
            session_id: c.session_id.as_deref(),
            window_role: &c.window_role,
            resource_name: &c.resource_name,
            resource_class: &c.resource_class,
        };
        self.services.session.take_info(&key)
    }

    fn init_border(&mut self, id: ClientId, session: Option<&SessionInfo>) {
        let detected = self.detect_no_border(id);
        if let Some(c) = self.clients.get_mut(&id) {
            c.app_no_border = c.motif.no_border();
            let no_border = match session {
                Some(s) => s.no_border,
                None => detected || c.app_no_border,
            };
            c.no_border = c.rules.check_no_border(no_border, true);
        }
        // Forced so the frame extents are exported even without a decoration
        self.update_decoration(id, true);
    }

    fn init_desktop(
        &mut self,
        id: ClientId,
        session: Option<&SessionInfo>,
        props: &WindowProperties,
        startup: &StartupInfo,
    ) {
        let mut desktop = None;
        let mut activities = None;
        if let Some(s) = session {
            desktop = Some(s.desktop);
            activities = Some(s.activities.clone());
        } else {
            let mains = self.main_clients(id);
            let mut main = None;
            let mut on_current = false;
            let mut on_all = false;
            for m in &mains {
                let Some(mc) = self.clients.get(m) else {
                    continue;
                };
                // Toolbars and the like of a group do not decide anything
                if mains.len() > 1 && mc.is_special_window() && mc.window_type() != WindowType::Dialog {
                    continue;
                }
                main = Some(mc);
                on_current |= mc.is_on_desktop(self.current_desktop);
                on_all |= mc.desktop.is_all();
            }
            if on_all {
                desktop = Some(Desktop::All);
            } else if on_current {
                desktop = Some(Desktop::Number(self.current_desktop));
            } else if let Some(mc) = main {
                desktop = Some(mc.desktop);
            }
            if let Some(mc) = main {
                activities = Some(mc.activities.clone());
            }
            if desktop.is_none() {
                desktop = props.desktop.or(startup.desktop.map(Desktop::Number));
            }
            if activities.is_none() && props.activities.is_some() {
                activities = Some(parse_activities(props.activities.as_deref()));
            }
        }

        let current = self.current_desktop;
        let count = self.desktop_count.max(1);
        let known = self.activities.clone();
        let current_activity = self.current_activity.clone();
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let is_desktop = c.is_desktop();
        let desktop = desktop.unwrap_or(if is_desktop { Desktop::All } else { Desktop::Number(current) });
        c.desktop = match c.rules.check_desktop(desktop, true) {
            Desktop::Number(n) if n == 0 || n > count => {
                warn!("Window {:#x} asked for invalid desktop {}, using {}", c.window, n, current);
                Desktop::Number(current.clamp(1, count))
            }
            d => d,
        };

        let activities = match activities {
            Some(list) => list,
            None if is_desktop => Vec::new(),
            // New windows open on the activity the user is looking at
            None => current_activity.into_iter().collect(),
        };
        c.activities = normalize_activities(&known, c.rules.check_activities(activities, true));

        let window = c.window;
        let desktop = c.desktop;
        let value = if c.activities.is_empty() {
            NULL_ACTIVITY.to_string()
        } else {
            c.activities.join(",")
        };
        self.services.display.set_desktop(window, desktop);
        self.services.display.set_activities(window, &value);
    }

    fn init_geometry(
        &mut self,
        id: ClientId,
        session: Option<&SessionInfo>,
        props: &WindowProperties,
        startup: &StartupInfo,
        already_mapped: bool,
    ) {
        if let Some(s) = session {
            self.set_frame_geometry(id, s.geometry, ForceGeometry::No);
            if let Some(c) = self.clients.get_mut(&id) {
                c.geometry_restore = s.restore;
                c.fullscreen_restore = s.fullscreen_restore;
            }
            return;
        }

        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let area = if already_mapped {
            self.client_area(AreaKind::Full, c.frame_geometry.center())
        } else {
            let requested = startup.screen.or_else(|| {
                let pointer = self.pointer?;
                self.outputs.iter().position(|o| o.geometry.contains(pointer))
            });
            let screen = c.rules.check_screen(requested.unwrap_or_default(), true);
            let at = self
                .outputs
                .get(screen)
                .or_else(|| self.outputs.first())
                .map(|o| o.geometry.center())
                .unwrap_or_default();
            self.client_area(AreaKind::Placement, at)
        };

        let maximizable = c.is_maximizable();
        let mut frame = c.frame_geometry;
        let mut placement_done = already_mapped;
        // Splash screens always get centered by placement
        let use_position = !c.is_splash();
        if !placement_done
            && use_position
            && c.size_hints.has_position()
            && !c.rules.check_ignore_geometry(false, true)
        {
            if area.intersects(&frame) {
                placement_done = true;
            } else {
                debug!("Window {:#x} asked for a position outside the work area", c.window);
            }
        }

        let client_size = c.size_hints.constrain(c.client_geometry.size());
        frame = frame.with_size(c.rules.check_size(c.client_size_to_frame_size(client_size), true));

        let mut area = area;
        let mut partial_keep = false;
        let mut dont_keep = false;
        if let Some(pos) = c.rules.check_position(None, true) {
            frame = frame.with_position(pos);
            placement_done = true;
            // A forced position only has to stay partly visible
            partial_keep = true;
            area = self.client_area(AreaKind::Full, frame.center());
        }
        let keep_candidate = (!c.is_special_window() || c.is_toolbar()) && c.is_movable();
        if !placement_done {
            dont_keep = true;
            let occupied: Vec<Geometry> = self
                .clients
                .values()
                .filter(|o| o.id != id && o.managed && o.is_shown())
                .filter(|o| o.is_on_desktop(self.current_desktop))
                .map(|o| o.frame_geometry)
                .collect();
            let parent = self
                .main_clients(id)
                .first()
                .and_then(|m| self.clients.get(m))
                .map(|m| m.frame_geometry);
            frame = self.services.placement.place(&PlacementRequest {
                frame,
                area,
                occupied: &occupied,
                pointer: self.pointer,
                parent,
            });
        }
        self.set_frame_geometry(id, frame, ForceGeometry::No);

        let mut mode = MaximizeMode::empty();
        mode.set(MaximizeMode::VERTICAL, props.net_state.contains(NetState::MAX_VERT));
        mode.set(MaximizeMode::HORIZONTAL, props.net_state.contains(NetState::MAX_HORIZ));
        let mut client_size = Size::default();
        if let Some(c) = self.clients.get_mut(&id) {
            mode = c.rules.check_maximize(mode, true);
            c.geometry_restore = c.frame_geometry;
            frame = c.frame_geometry;
            client_size = c.client_geometry.size();
        }

        // Too large for the area means maximized on the overflowing axis.
        // A window bigger than its screen but smaller than the whole layout
        // just wants to be big: it is kept inside the full area instead.
        let mut keep_in_full = false;
        if maximizable && (frame.width >= area.width || frame.height >= area.height) {
            let screen = self.client_area(AreaKind::Screen, area.center()).size();
            let full = self.client_area(AreaKind::Full, frame.center());
            if frame.width >= area.width {
                mode |= MaximizeMode::HORIZONTAL;
            }
            if frame.height >= area.height {
                mode |= MaximizeMode::VERTICAL;
            }
            if frame.width < full.width && client_size.width > screen.width + 1 {
                mode.remove(MaximizeMode::HORIZONTAL);
                keep_in_full = true;
            }
            if frame.height < full.height && client_size.height > screen.height + 1 {
                mode.remove(MaximizeMode::VERTICAL);
                keep_in_full = true;
            }
        }
        self.maximize_initial(id, mode);
        if keep_in_full {
            let full = self.client_area(AreaKind::Full, frame.center());
            self.keep_in_area(id, full, partial_keep);
        }
        let full_max = self
            .clients
            .get(&id)
            .is_some_and(|c| c.max_mode == MaximizeMode::FULL);
        if keep_candidate && !dont_keep && !full_max && !keep_in_full {
            self.keep_in_area(id, area, partial_keep);
        }
    }

    fn maximize_initial(&mut self, id: ClientId, mode: MaximizeMode) {
        if mode.is_empty() {
            return;
        }
        if let Some(c) = self.clients.get(&id) {
            debug!("Window {:#x} starts maximized {:?}", c.window, mode);
        }
        self.maximize(id, mode);
    }

    fn init_states(
        &mut self,
        id: ClientId,
        session: Option<&SessionInfo>,
        props: &WindowProperties,
        already_mapped: bool,
    ) {
        let state = props.net_state;
        let starts_iconic = !already_mapped && props.wm_hints.as_ref().is_some_and(|h| h.starts_iconic());
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let mut minimize = c.rules.check_minimize(session.map_or(starts_iconic, |s| s.minimized), true);
        let transient = c.is_transient();
        if transient {
            let main_shown = self
                .main_clients(id)
                .iter()
                .any(|m| self.clients.get(m).is_some_and(|mc| mc.is_shown()));
            if main_shown {
                minimize = false;
            } else if !minimize {
                let mains = self.all_main_clients(id);
                // A dialog of a minimized window starts minimized too
                if !mains.is_empty() && !mains.iter().any(|m| self.clients.get(m).is_some_and(|mc| mc.is_shown())) {
                    minimize = true;
                    self.demand_attention(id, true);
                }
            }
        }
        if minimize && self.is_minimizable(id) {
            if let Some(c) = self.clients.get_mut(&id) {
                c.minimized = true;
            }
        }

        if let Some(s) = session {
            if let Some(c) = self.clients.get_mut(&id) {
                c.keep_above = s.keep_above;
                c.keep_below = s.keep_below;
                c.original_skip_taskbar = s.skip_taskbar;
                c.skip_pager = s.skip_pager;
                c.skip_switcher = s.skip_switcher;
            }
            if s.shade == ShadeMode::Normal {
                self.set_shade(id, ShadeMode::Normal);
            }
            if !s.max_mode.is_empty() {
                self.maximize(id, s.max_mode);
                if let Some(c) = self.clients.get_mut(&id) {
                    c.geometry_restore = s.restore;
                }
            }
            if s.fullscreen {
                self.set_full_screen(id, true);
                if let Some(c) = self.clients.get_mut(&id) {
                    c.fullscreen_restore = s.fullscreen_restore;
                }
            }
            return;
        }

        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let shade = if state.contains(NetState::SHADED) { ShadeMode::Normal } else { ShadeMode::None };
        let shade = c.rules.check_shade(shade, true);
        c.keep_above = c.rules.check_keep_above(state.contains(NetState::KEEP_ABOVE), true);
        c.keep_below = c.rules.check_keep_below(state.contains(NetState::KEEP_BELOW), true);
        c.original_skip_taskbar = c.rules.check_skip_taskbar(state.contains(NetState::SKIP_TASKBAR), true);
        c.skip_pager = c.rules.check_skip_pager(state.contains(NetState::SKIP_PAGER), true);
        c.skip_switcher = c.rules.check_skip_switcher(state.contains(NetState::SKIP_SWITCHER), true);
        let fullscreen = c.rules.check_full_screen(state.contains(NetState::FULLSCREEN), true);
        let urgent = state.contains(NetState::DEMANDS_ATTENTION)
            || props.wm_hints.as_ref().is_some_and(|h| h.is_urgent());

        if shade == ShadeMode::Normal {
            self.set_shade(id, ShadeMode::Normal);
        }
        if urgent {
            self.demand_attention(id, true);
        }
        if fullscreen {
            self.set_full_screen(id, true);
        }
    }

    /// _KDE_NET_WM_SCREEN_EDGE_SHOW: hide the window (or keep it below in
    /// raise mode) until the pointer hits the given edge
    pub fn reserve_screen_edge(&mut self, id: ClientId, value: u32) {
        let border = value & 0xFF;
        if border > 3 {
            self.release_screen_edge(id);
            return;
        }
        let raise = (value >> 8) & 0xFF == SCREEN_EDGE_RAISE;
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.screen_edge = Some(border);
        if raise {
            c.keep_below = true;
            self.export_net_state(id);
            self.update_layer(id);
        } else {
            self.hide_client(id, true);
        }
        self.events.push(ClientEvent::ScreenEdgeReserved { client: id, edge: border });
    }

    /// The edge was triggered or the reservation withdrawn
    pub fn release_screen_edge(&mut self, id: ClientId) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if c.screen_edge.take().is_none() {
            return;
        }
        c.keep_below = false;
        self.hide_client(id, false);
        self.export_net_state(id);
        self.update_layer(id);
        self.events.push(ClientEvent::ScreenEdgeReleased(id));
    }

    /// Give the window back to the display server. On shutdown the window
    /// is mapped again and keeps its properties so the next window manager
    /// can pick it up.
    pub fn release(&mut self, id: ClientId, on_shutdown: bool) {
        self.teardown(id, Teardown::Release { on_shutdown });
    }

    /// The client window is already gone
    pub fn destroy(&mut self, id: ClientId) {
        self.teardown(id, Teardown::Destroy);
    }

    fn teardown(&mut self, id: ClientId, how: Teardown) {
        let on_shutdown = how == Teardown::Release { on_shutdown: true };
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        debug_assert!(!c.deleting, "window {:#x} torn down twice", c.window);
        if c.deleting {
            return;
        }
        c.deleting = true;
        let window = c.window;
        info!("{} window {:#x}", if how == Teardown::Destroy { "Destroying" } else { "Releasing" }, window);

        // No timer may fire for this window from here on
        c.ping.timer = None;
        c.sync.timeout = None;
        c.sync.failsafe = None;
        let helper = c.ping.killer_pid.take();
        let resizing = c.move_resize.is_some();
        self.timers.cancel_all(id);
        if let Some(helper) = helper.filter(|h| self.services.killer.is_alive(*h)) {
            self.services.killer.dismiss(helper);
        }
        if resizing {
            self.end_interactive_resize(id);
        }

        let deleted = if on_shutdown { None } else { self.create_deleted(id) };
        self.events.push(ClientEvent::Closed { client: id, deleted });
        self.block_geometry_updates(id);

        if let Some(c) = self.clients.get(&id) {
            let visible = matches!(c.mapping_state, MappingState::Mapped | MappingState::Kept);
            if visible && c.is_on_desktop(self.current_desktop) {
                self.events.push(ClientEvent::Repaint(c.frame_geometry));
            }
        }
        if how == (Teardown::Release { on_shutdown: false }) {
            self.export_mapping_state(id, WmState::Withdrawn);
        }
        if let Some(c) = self.clients.get_mut(&id) {
            c.modal = false;
            c.hidden = true;
        }
        if self.active == Some(id) {
            self.set_active(None);
        }
        if self.most_recently_activated == Some(id) {
            self.most_recently_activated = None;
        }

        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if let Some(frame) = c.frame {
            self.services.display.unmap_window(frame.frame);
        }
        c.decoration = None;
        let had_edge = c.screen_edge.take().is_some();
        let client_pos = c.client_geometry.position();
        self.clean_grouping(id);
        if !on_shutdown {
            self.services.activation.remove(id);
        }
        if had_edge {
            self.events.push(ClientEvent::ScreenEdgeReleased(id));
        }
        if let Teardown::Release { on_shutdown } = how {
            self.services.display.unembed(window, client_pos, on_shutdown);
        }

        if let Some(c) = self.clients.remove(&id) {
            if let Some(frame) = c.frame {
                self.services.display.destroy_frame(&frame);
            }
        }
        if let Some(deleted) = deleted {
            // Only the Closed notification holds on to it now
            self.unref_deleted(deleted);
        }
        debug!("Window {:#x} is no longer managed", window);
    }

    /// Windows already on screen when the window manager starts
    pub fn manage_existing(&mut self, windows: &[XWindow]) -> Vec<ClientId> {
        let mut managed = Vec::new();
        for &window in windows {
            match self.manage(window, true) {
                Ok(id) => managed.push(id),
                Err(ManageError::OverrideRedirect(_)) => {}
                Err(e) => warn!("Not managing existing window {:#x}: {}", window, e),
            }
        }
        managed
    }

    /// Release every window, leaving them usable for the next window manager
    pub fn release_all(&mut self) {
        for id in self.client_ids() {
            self.release(id, true);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use test_log::test;

    use super::*;
    use crate::shared::Point;
    use crate::wm::session::MemorySessionStore;
    use crate::wm::geometry::Output;
    use crate::wm::testing::{DisplayCall, TestSetup, WindowSpec};

    #[test]
    fn test_first_window_is_shown_and_activated() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        let c = t.ws.client(id).unwrap();
        assert!(c.managed);
        assert_eq!(c.mapping_state, MappingState::Mapped);
        assert_eq!(t.ws.active_client(), Some(id));
        let managed = t.events().iter().filter(|e| **e == ClientEvent::Managed(id)).count();
        assert_eq!(managed, 1);
    }

    #[test]
    fn test_manage_twice_is_rejected() {
        let mut t = TestSetup::new();
        t.manage(WindowSpec::normal(0x100));
        assert!(matches!(t.ws.manage(0x100, false), Err(ManageError::AlreadyManaged(0x100))));
    }

    #[test]
    fn test_vanished_window_creates_nothing() {
        let mut t = TestSetup::new();
        assert!(matches!(t.ws.manage(0x999, false), Err(ManageError::Probe(_))));
        assert!(t.ws.client_ids().is_empty());
        assert!(t.display.calls().is_empty());
    }

    #[test]
    fn test_override_redirect_is_rejected() {
        let mut t = TestSetup::new();
        t.display.add_window(WindowSpec::normal(0x100).override_redirect());
        assert!(matches!(t.ws.manage(0x100, false), Err(ManageError::OverrideRedirect(_))));
        assert!(t.ws.client_ids().is_empty());
    }

    #[test]
    fn test_geometry_committed_once() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).at(Geometry::new(100, 100, 400, 300)));
        let frame = t.ws.client(id).unwrap().frame.unwrap().frame;
        assert_eq!(t.display.configures_of(frame).len(), 1);
    }

    #[test]
    fn test_position_hint_is_honored() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).at(Geometry::new(300, 200, 400, 300)));
        assert_eq!(t.ws.client(id).unwrap().client_geometry, Geometry::new(300, 200, 400, 300));
    }

    #[test]
    fn test_oversized_window_maximizes_overflowing_axis_only() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).at(Geometry::new(10, 10, 800, 3000)));
        let c = t.ws.client(id).unwrap();
        assert_eq!(c.max_mode, MaximizeMode::VERTICAL);
        assert_eq!(c.geometry_restore.width, c.frame_geometry.width);
        assert!(c.frame_geometry.height <= 1080);
    }

    #[test]
    fn test_invalid_desktop_falls_back_to_current() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).desktop(42));
        assert_eq!(t.ws.client(id).unwrap().desktop, Desktop::Number(1));
    }

    #[test]
    fn test_desktop_window_is_on_all_desktops() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).of_type(WindowType::Desktop));
        assert_eq!(t.ws.client(id).unwrap().desktop, Desktop::All);
    }

    #[test]
    fn test_window_on_other_desktop_starts_hidden() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).desktop(3));
        let c = t.ws.client(id).unwrap();
        assert_eq!(c.mapping_state, MappingState::Unmapped);
        assert!(c.demands_attention);
        assert_eq!(t.ws.active_client(), None);
    }

    #[test]
    fn test_iconic_window_starts_minimized() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).iconic());
        let c = t.ws.client(id).unwrap();
        assert!(c.minimized);
        assert_eq!(c.mapping_state, MappingState::Unmapped);
    }

    #[test]
    fn test_dialog_of_minimized_window_starts_minimized() {
        let mut t = TestSetup::new();
        let main = t.manage(WindowSpec::normal(0x100));
        t.ws.minimize(main);
        let dialog = t.manage(WindowSpec::normal(0x200).of_type(WindowType::Dialog).transient_for(0x100));
        assert!(t.ws.client(dialog).unwrap().minimized);
    }

    #[test]
    fn test_session_restores_state() {
        let mut t = TestSetup::new();
        let mut store = MemorySessionStore::default();
        store.entries.push(SessionInfo {
            session_id: Some("sm-1".into()),
            window_role: String::new(),
            resource_name: "editor".into(),
            resource_class: "Editor".into(),
            window_type: WindowType::Normal,
            geometry: Geometry::new(50, 60, 500, 400),
            restore: Geometry::default(),
            fullscreen_restore: Geometry::default(),
            desktop: Desktop::Number(2),
            activities: Vec::new(),
            max_mode: MaximizeMode::empty(),
            minimized: false,
            shade: ShadeMode::None,
            fullscreen: false,
            keep_above: true,
            keep_below: false,
            skip_taskbar: false,
            skip_pager: true,
            skip_switcher: false,
            no_border: true,
            active: false,
            stacking_order: 0,
        });
        t.ws.services.session = Box::new(store);

        let id = t.manage(WindowSpec::normal(0x100).class("editor", "Editor").session("sm-1"));
        let c = t.ws.client(id).unwrap();
        assert_eq!(c.frame_geometry, Geometry::new(50, 60, 500, 400));
        assert_eq!(c.desktop, Desktop::Number(2));
        assert!(c.keep_above);
        assert!(c.skip_pager);
        assert!(!c.is_decorated());
    }

    #[test]
    fn test_late_parent_resolves_waiting_transient() {
        let mut t = TestSetup::new();
        let child = t.manage(WindowSpec::normal(0x200).transient_for(0x100));
        assert!(t.ws.client(child).unwrap().group_transient());
        let parent = t.manage(WindowSpec::normal(0x100));
        assert_eq!(t.ws.client(child).unwrap().transient_for, Some(parent));
    }

    #[test]
    fn test_release_returns_window_to_root() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).at(Geometry::new(100, 100, 400, 300)));
        let frame = t.ws.client(id).unwrap().frame.unwrap();
        t.display.clear();
        t.ws.release(id, false);

        assert!(t.ws.client(id).is_none());
        let calls = t.display.calls();
        assert!(calls.contains(&DisplayCall::WmState(0x100, WmState::Withdrawn)));
        assert!(calls.contains(&DisplayCall::Unembed(0x100, Point::new(100, 100), false)));
        assert!(calls.contains(&DisplayCall::DestroyFrame(frame)));
        assert_eq!(t.ws.active_client(), None);
    }

    #[test]
    fn test_closed_placeholder_outlives_window() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).named("Editor"));
        t.take_events();
        t.ws.destroy(id);

        let deleted = t
            .events()
            .iter()
            .find_map(|e| match e {
                ClientEvent::Closed { client, deleted } if *client == id => *deleted,
                _ => None,
            })
            .unwrap();
        assert_eq!(t.ws.deleted(deleted).unwrap().caption, "Editor");
        t.ws.unref_deleted(deleted);
        assert!(t.ws.deleted(deleted).is_none());
    }

    #[test]
    fn test_shutdown_release_keeps_properties() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        t.display.clear();
        t.take_events();
        t.ws.release_all();

        assert!(t.ws.client(id).is_none());
        assert!(!t.display.calls().iter().any(|c| matches!(c, DisplayCall::WmState(..))));
        assert!(t.events().contains(&ClientEvent::Closed { client: id, deleted: None }));
    }

    #[test]
    fn test_release_during_ping_dismisses_helper() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).protocols(Protocols::PING).pid(9));
        t.ws.ping_window(id);
        t.advance(Duration::from_millis(5000));
        let helper = t.ws.client(id).unwrap().ping.killer_pid.unwrap();
        t.ws.release(id, false);
        assert_eq!(t.killer.dismissed(), vec![helper]);
        assert!(t.ws.next_timer_deadline().is_none());
    }

    #[test]
    fn test_screen_edge_hides_until_released() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).of_type(WindowType::Dock).screen_edge(2));
        let c = t.ws.client(id).unwrap();
        assert!(c.hidden);
        assert_eq!(c.mapping_state, MappingState::Unmapped);
        assert!(t.events().contains(&ClientEvent::ScreenEdgeReserved { client: id, edge: 2 }));

        t.ws.release_screen_edge(id);
        assert_eq!(t.ws.client(id).unwrap().mapping_state, MappingState::Mapped);
    }

    #[test]
    fn test_screen_edge_raise_mode_keeps_below() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).of_type(WindowType::Dock).screen_edge(0x100 | 3));
        let c = t.ws.client(id).unwrap();
        assert!(c.keep_below);
        assert!(!c.hidden);
    }

    #[test]
    fn test_existing_windows_keep_their_position() {
        let mut t = TestSetup::new();
        t.display.add_window(WindowSpec::normal(0x100).at(Geometry::new(700, 500, 300, 200)));
        t.display.add_window(WindowSpec::normal(0x200).override_redirect());
        let ids = t.ws.manage_existing(&[0x100, 0x200]);
        assert_eq!(ids.len(), 1);
        assert_eq!(t.ws.client(ids[0]).unwrap().client_geometry.position(), Point::new(700, 500));
    }

    #[test]
    fn test_existing_oversized_window_is_maximized() {
        let mut t = TestSetup::new();
        t.display.add_window(WindowSpec::normal(0x100).at(Geometry::new(10, 10, 800, 3000)));
        let ids = t.ws.manage_existing(&[0x100]);
        let c = t.ws.client(ids[0]).unwrap();
        assert_eq!(c.max_mode, MaximizeMode::VERTICAL);
        assert_eq!(c.frame_geometry.y, 0);
        assert!(c.frame_geometry.height <= 1080);
        assert_eq!(c.geometry_restore.width, c.frame_geometry.width);
    }

    #[test]
    fn test_window_as_tall_as_area_is_maximized() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).without_border().at(Geometry::new(100, 0, 400, 1080)));
        assert_eq!(t.ws.client(id).unwrap().max_mode, MaximizeMode::VERTICAL);
    }

    #[test]
    fn test_wide_window_on_two_screens_stays_in_full_area() {
        let mut t = TestSetup::new();
        t.ws.set_outputs(vec![
            Output::new(Geometry::new(0, 0, 1920, 1080)),
            Output::new(Geometry::new(1920, 0, 1920, 1080)),
        ]);
        let id = t.manage(WindowSpec::normal(0x100).at(Geometry::new(-50, 100, 2000, 600)));
        let c = t.ws.client(id).unwrap();
        assert!(!c.max_mode.contains(MaximizeMode::HORIZONTAL));
        assert_eq!(c.frame_geometry.x, 0);
        assert!(c.frame_geometry.width > 1920);
    }
}
