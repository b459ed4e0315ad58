//! Client Module
//!
//! State of one managed window. Everything that only needs the window itself
//! lives here; operations that touch other windows or services are methods on
//! [`Workspace`](crate::wm::Workspace).

use std::fmt;

use crate::shared::{Geometry, Margins, Point, Size};
use crate::wm::client_flags::{
    AllowedActions, Desktop, MappingState, MaximizeMode, NetState, Protocols, ShadeMode,
    TransientTarget, WindowLayer, WindowType,
};
use crate::wm::decorations::Decoration;
use crate::wm::display::{FrameHandles, Timestamp, XWindow};
use crate::wm::group::GroupId;
use crate::wm::hints::{MotifHints, SizeHints};
use crate::wm::properties::{AppMenu, Icon};
use crate::wm::rules::{PassThrough, WindowRules};
use crate::wm::timers::TimerId;

/// Registry handle of a managed window. Ids are never reused, so a handle
/// that outlives its window simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client#{}", self.0)
    }
}

/// Host the client process runs on
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientMachine {
    pub hostname: String,
    pub local: bool,
}

impl ClientMachine {
    pub fn resolve(raw: Option<&str>, local_hostname: &str) -> Self {
        match raw.map(str::trim).filter(|h| !h.is_empty()) {
            None => Self { hostname: "localhost".into(), local: true },
            Some(host) => {
                let local = host == "localhost" || host.eq_ignore_ascii_case(local_hostname);
                Self { hostname: host.to_string(), local }
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caption {
    pub normal: String,
    /// Machine and duplicate-disambiguation suffix
    pub suffix: String,
    pub iconic: String,
}

impl Caption {
    pub fn full(&self) -> String {
        format!("{}{}", self.normal, self.suffix)
    }
}

/// Severity of geometry changes recorded while updates are blocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PendingGeometry {
    #[default]
    None,
    Normal,
    Forced,
}

#[derive(Debug, Clone, Default)]
pub struct PingState {
    pub timer: Option<TimerId>,
    pub timestamp: Timestamp,
    /// Pid of a running ask-to-kill helper
    pub killer_pid: Option<u32>,
}

/// Resize-sync protocol state
#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    /// `None` when the client has no counter or sync was given up on
    pub counter: Option<u32>,
    pub value: u64,
    pub pending: bool,
    pub last_timestamp: Timestamp,
    pub timeout: Option<TimerId>,
    pub failsafe: Option<TimerId>,
}

impl SyncRequest {
    pub fn value_lo(&self) -> u32 {
        self.value as u32
    }

    pub fn value_hi(&self) -> u32 {
        (self.value >> 32) as u32
    }
}

/// Interactive move/resize in progress
#[derive(Debug, Clone, Default)]
pub struct MoveResize {
    /// Frame geometry waiting for the client to catch up
    pub pending: Option<Geometry>,
}

pub struct Client {
    pub id: ClientId,
    pub window: XWindow,
    pub frame: Option<FrameHandles>,

    pub frame_geometry: Geometry,
    pub client_geometry: Geometry,
    pub buffer_geometry: Geometry,
    /// Frame geometry last pushed to the server
    pub server_geometry: Geometry,
    pub geometry_restore: Geometry,
    pub fullscreen_restore: Geometry,
    /// Client-side decoration shadow (_GTK_FRAME_EXTENTS)
    pub client_frame_extents: Margins,

    pub decoration: Option<Box<dyn Decoration>>,
    pub no_border: bool,
    pub app_no_border: bool,
    pub shaped: bool,
    pub deco_input_extent: Option<Vec<Geometry>>,

    pub mapping_state: MappingState,
    pub shade_mode: ShadeMode,
    pub max_mode: MaximizeMode,
    pub fullscreen: bool,
    pub hidden: bool,
    pub minimized: bool,
    pub unresponsive: bool,
    pub deleting: bool,
    pub managed: bool,
    pub ready_for_painting: bool,
    pub modal: bool,
    pub keep_above: bool,
    pub keep_below: bool,
    pub original_skip_taskbar: bool,
    pub skip_taskbar: bool,
    pub skip_pager: bool,
    pub skip_switcher: bool,
    pub demands_attention: bool,
    pub skip_close_animation: bool,
    pub first_in_tabbox: bool,

    pub desktop: Desktop,
    /// Empty means on all activities
    pub activities: Vec<String>,
    pub session_activity_override: bool,

    pub window_type: WindowType,
    pub protocols: Protocols,
    pub input_hint: bool,
    pub size_hints: SizeHints,
    pub motif: MotifHints,
    pub strut: Option<Margins>,

    pub pid: Option<u32>,
    pub machine: ClientMachine,
    pub resource_name: String,
    pub resource_class: String,
    pub window_role: String,
    pub session_id: Option<String>,
    pub client_leader: Option<XWindow>,
    /// Group leader from WM_HINTS; only used to find the group
    pub group_leader: Option<XWindow>,
    pub startup_id: Option<String>,
    pub user_time: Option<Timestamp>,
    pub desktop_file_name: Option<String>,
    pub color_scheme: Option<String>,
    pub app_menu: Option<AppMenu>,
    pub icon: Option<Icon>,
    pub screen_edge: Option<u32>,

    pub caption: Caption,

    pub transient_target: TransientTarget,
    /// Raw WM_TRANSIENT_FOR before verification
    pub original_transient_for: Option<XWindow>,
    pub transient_for: Option<ClientId>,
    pub transients: Vec<ClientId>,
    pub group: Option<GroupId>,
    pub check_active_modal: bool,

    pub allowed_actions: AllowedActions,
    /// Layer last reported to the stacking order
    pub layer: Option<WindowLayer>,
    pub ping: PingState,
    pub sync: SyncRequest,
    pub move_resize: Option<MoveResize>,

    pub block_geometry_updates: u32,
    pub pending_geometry: PendingGeometry,

    pub rules: Box<dyn WindowRules>,
}

impl Client {
    pub fn new(id: ClientId, window: XWindow) -> Self {
        Self {
            id,
            window,
            frame: None,
            frame_geometry: Geometry::default(),
            client_geometry: Geometry::default(),
            buffer_geometry: Geometry::default(),
            server_geometry: Geometry::default(),
            geometry_restore: Geometry::default(),
            fullscreen_restore: Geometry::default(),
            client_frame_extents: Margins::default(),
            decoration: None,
            no_border: true,
            app_no_border: false,
            shaped: false,
            deco_input_extent: None,
            mapping_state: MappingState::Withdrawn,
            shade_mode: ShadeMode::None,
            max_mode: MaximizeMode::empty(),
            fullscreen: false,
            hidden: false,
            minimized: false,
            unresponsive: false,
            deleting: false,
            managed: false,
            ready_for_painting: false,
            modal: false,
            keep_above: false,
            keep_below: false,
            original_skip_taskbar: false,
            skip_taskbar: false,
            skip_pager: false,
            skip_switcher: false,
            demands_attention: false,
            skip_close_animation: false,
            first_in_tabbox: false,
            desktop: Desktop::Number(1),
            activities: Vec::new(),
            session_activity_override: false,
            window_type: WindowType::Unknown,
            protocols: Protocols::empty(),
            input_hint: true,
            size_hints: SizeHints::default(),
            motif: MotifHints::default(),
            strut: None,
            pid: None,
            machine: ClientMachine::default(),
            resource_name: String::new(),
            resource_class: String::new(),
            window_role: String::new(),
            session_id: None,
            client_leader: None,
            group_leader: None,
            startup_id: None,
            user_time: None,
            desktop_file_name: None,
            color_scheme: None,
            app_menu: None,
            icon: None,
            screen_edge: None,
            caption: Caption::default(),
            transient_target: TransientTarget::None,
            original_transient_for: None,
            transient_for: None,
            transients: Vec::new(),
            group: None,
            check_active_modal: false,
            allowed_actions: AllowedActions::empty(),
            layer: None,
            ping: PingState::default(),
            sync: SyncRequest::default(),
            move_resize: None,
            block_geometry_updates: 0,
            pending_geometry: PendingGeometry::None,
            rules: Box::new(PassThrough),
        }
    }

    /// Window type after rules; Unknown resolves by transiency
    pub fn window_type(&self) -> WindowType {
        match self.rules.check_type(self.window_type) {
            WindowType::Unknown if self.is_transient() => WindowType::Dialog,
            WindowType::Unknown => WindowType::Normal,
            t => t,
        }
    }

    pub fn is_special_window(&self) -> bool {
        self.window_type().is_special()
    }

    pub fn is_desktop(&self) -> bool {
        self.window_type() == WindowType::Desktop
    }

    pub fn is_dock(&self) -> bool {
        self.window_type() == WindowType::Dock
    }

    pub fn is_splash(&self) -> bool {
        self.window_type() == WindowType::Splash
    }

    pub fn is_toolbar(&self) -> bool {
        self.window_type() == WindowType::Toolbar
    }

    pub fn is_transient(&self) -> bool {
        self.transient_target.is_some()
    }

    /// WM_CLIENT_LEADER, or the window itself when unset
    pub fn wm_client_leader(&self) -> XWindow {
        self.client_leader.unwrap_or(self.window)
    }

    pub fn group_transient(&self) -> bool {
        self.transient_target == TransientTarget::Group
    }

    pub fn is_shade(&self) -> bool {
        self.shade_mode == ShadeMode::Normal
    }

    /// Neither minimized nor hidden by its owner
    pub fn is_shown(&self) -> bool {
        !self.minimized && !self.hidden
    }

    pub fn caption(&self) -> String {
        self.caption.full()
    }

    pub fn is_on_desktop(&self, desktop: u32) -> bool {
        match self.desktop {
            Desktop::All => true,
            Desktop::Number(n) => n == desktop,
        }
    }

    pub fn is_on_all_activities(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn is_on_activity(&self, activity: Option<&str>) -> bool {
        match activity {
            None => true,
            Some(a) => {
                self.session_activity_override
                    || self.is_on_all_activities()
                    || self.activities.iter().any(|x| x == a)
            }
        }
    }

    pub fn is_decorated(&self) -> bool {
        self.decoration.is_some()
    }

    pub fn borders(&self) -> Margins {
        self.decoration.as_ref().map(|d| d.borders()).unwrap_or_default()
    }

    pub fn client_pos_to_frame_pos(&self, p: Point) -> Point {
        if self.is_decorated() {
            let b = self.borders();
            Point::new(p.x - b.left as i32, p.y - b.top as i32)
        } else {
            let e = self.client_frame_extents;
            Point::new(p.x + e.left as i32, p.y + e.top as i32)
        }
    }

    pub fn frame_pos_to_client_pos(&self, p: Point) -> Point {
        if self.is_decorated() {
            let b = self.borders();
            Point::new(p.x + b.left as i32, p.y + b.top as i32)
        } else {
            let e = self.client_frame_extents;
            Point::new(p.x - e.left as i32, p.y - e.top as i32)
        }
    }

    pub fn client_size_to_frame_size(&self, s: Size) -> Size {
        if self.is_decorated() {
            let b = self.borders();
            Size::new(s.width + b.horizontal(), s.height + b.vertical())
        } else {
            let e = self.client_frame_extents;
            Size::new(
                s.width.saturating_sub(e.horizontal()),
                s.height.saturating_sub(e.vertical()),
            )
        }
    }

    pub fn frame_size_to_client_size(&self, s: Size) -> Size {
        if self.is_decorated() {
            let b = self.borders();
            Size::new(
                s.width.saturating_sub(b.horizontal()),
                s.height.saturating_sub(b.vertical()),
            )
        } else {
            let e = self.client_frame_extents;
            Size::new(s.width + e.horizontal(), s.height + e.vertical())
        }
    }

    pub fn frame_rect_to_client_rect(&self, frame: Geometry) -> Geometry {
        Geometry::from_parts(
            self.frame_pos_to_client_pos(frame.position()),
            self.frame_size_to_client_size(frame.size()),
        )
    }

    pub fn client_rect_to_frame_rect(&self, client: Geometry) -> Geometry {
        Geometry::from_parts(
            self.client_pos_to_frame_pos(client.position()),
            self.client_size_to_frame_size(client.size()),
        )
    }

    pub fn wants_input(&self) -> bool {
        self.rules
            .check_accept_focus(self.input_hint || self.protocols.contains(Protocols::TAKE_FOCUS))
    }

    pub fn is_closeable(&self) -> bool {
        self.rules
            .check_closeable(self.motif.closeable() && !self.is_special_window())
    }

    pub fn is_movable(&self) -> bool {
        !self.fullscreen && (!self.is_special_window() || self.is_splash() || self.is_toolbar())
    }

    pub fn is_resizable(&self) -> bool {
        !self.fullscreen
            && !self.is_special_window()
            && !self.size_hints.is_fixed_size()
            && !self.is_shade()
    }

    pub fn is_maximizable(&self) -> bool {
        self.is_resizable() && !self.is_toolbar()
    }

    pub fn is_full_screenable(&self) -> bool {
        self.fullscreen || (!self.is_special_window() && self.rules.check_full_screen(true, false))
    }

    pub fn is_shadeable(&self) -> bool {
        !self.is_special_window()
            && !self.no_border
            && self.rules.check_shade(ShadeMode::Normal, false)
                != self.rules.check_shade(ShadeMode::None, false)
    }

    pub fn supports_sync(&self) -> bool {
        self.sync.counter.is_some()
    }

    /// _NET_WM_STATE as it should be exported
    pub fn net_state(&self) -> NetState {
        let mut state = NetState::empty();
        state.set(NetState::MODAL, self.modal);
        state.set(NetState::STICKY, self.desktop.is_all());
        state.set(NetState::MAX_VERT, self.max_mode.contains(MaximizeMode::VERTICAL));
        state.set(NetState::MAX_HORIZ, self.max_mode.contains(MaximizeMode::HORIZONTAL));
        state.set(NetState::SHADED, self.is_shade());
        state.set(NetState::SKIP_TASKBAR, self.skip_taskbar);
        state.set(NetState::SKIP_PAGER, self.skip_pager);
        state.set(NetState::SKIP_SWITCHER, self.skip_switcher);
        state.set(NetState::HIDDEN, !self.is_shown());
        state.set(NetState::FULLSCREEN, self.fullscreen);
        state.set(NetState::KEEP_ABOVE, self.keep_above);
        state.set(NetState::KEEP_BELOW, self.keep_below);
        state.set(NetState::DEMANDS_ATTENTION, self.demands_attention);
        state
    }

    pub fn layer(&self, active: bool) -> WindowLayer {
        match self.window_type() {
            WindowType::Desktop => WindowLayer::Desktop,
            WindowType::Dock if self.keep_below => WindowLayer::Normal,
            WindowType::Dock => WindowLayer::Dock,
            WindowType::Notification | WindowType::CriticalNotification => WindowLayer::Notification,
            WindowType::OnScreenDisplay => WindowLayer::OnScreenDisplay,
            _ if self.keep_below => WindowLayer::Below,
            _ if self.fullscreen && active => WindowLayer::Active,
            _ if self.keep_above => WindowLayer::Above,
            _ => WindowLayer::Normal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_type_resolves_by_transiency() {
        let mut c = Client::new(ClientId::from_raw(1), 0x100);
        assert_eq!(c.window_type(), WindowType::Normal);
        c.transient_target = TransientTarget::Window(0x200);
        assert_eq!(c.window_type(), WindowType::Dialog);
    }

    #[test]
    fn test_undecorated_conversion_uses_frame_extents() {
        let mut c = Client::new(ClientId::from_raw(1), 0x100);
        c.client_frame_extents = Margins::uniform(10);
        let client = Geometry::new(100, 100, 400, 300);
        let frame = c.client_rect_to_frame_rect(client);
        assert_eq!(frame, Geometry::new(110, 110, 380, 280));
        assert_eq!(c.frame_rect_to_client_rect(frame), client);
    }

    #[test]
    fn test_machine_resolution() {
        assert!(ClientMachine::resolve(None, "box").local);
        assert!(ClientMachine::resolve(Some("BOX"), "box").local);
        let remote = ClientMachine::resolve(Some("far"), "box");
        assert!(!remote.local);
        assert_eq!(remote.hostname, "far");
    }

    #[test]
    fn test_sync_value_halves() {
        let sync = SyncRequest { value: 0x1_0000_0002, ..Default::default() };
        assert_eq!(sync.value_lo(), 2);
        assert_eq!(sync.value_hi(), 1);
    }
}
