//! Test harness: a display that records every request and a process killer
//! that only pretends.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Duration;

use crate::config::Config;
use crate::shared::{Geometry, Margins, Point};
use crate::wm::client::ClientId;
use crate::wm::client_flags::{AllowedActions, Desktop, NetState, Protocols, WindowType, WmState};
use crate::wm::decorations::ThemeDecorations;
use crate::wm::display::{
    ClientMessage, Display, DisplayError, FrameHandles, InputShape, Timestamp, WindowSnapshot, XWindow,
};
use crate::wm::events::ClientEvent;
use crate::wm::focus::FocusManager;
use crate::wm::geometry::Output;
use crate::wm::hints::{MotifHints, SizeHints, WmHints};
use crate::wm::placement::PlacementManager;
use crate::wm::properties::{Icon, WindowProperties};
use crate::wm::rules::NoRules;
use crate::wm::session::NoSession;
use crate::wm::terminate::{KillRequest, ProcessKiller};
use crate::wm::{Services, Workspace};

pub const ROOT: XWindow = 0x1;

const FIRST_FRAME: XWindow = 0x10_0000;
const FIRST_HELPER: u32 = 9000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    Embed(XWindow),
    Unembed(XWindow, Point, bool),
    DestroyFrame(FrameHandles),
    Map(XWindow),
    Unmap(XWindow),
    Configure(XWindow, Geometry),
    WmState(XWindow, WmState),
    NetState(XWindow, NetState),
    Desktop(XWindow, Desktop),
    Activities(XWindow, String),
    FrameExtents(XWindow, Margins),
    AllowedActions(XWindow, AllowedActions),
    VisibleName(XWindow, Option<String>),
    TransientFor(XWindow, XWindow),
    InputShape(XWindow, InputShape),
    InputExtent(XWindow, Option<Vec<Geometry>>),
    Message(XWindow, ClientMessage),
    Focus(XWindow, Timestamp),
    KillClient(XWindow),
}

#[derive(Debug, Default)]
struct DisplayState {
    calls: Vec<DisplayCall>,
    time: Timestamp,
    next_id: XWindow,
    windows: HashMap<XWindow, (WindowSnapshot, WindowProperties)>,
}

/// The [`Display`] handed to the workspace
pub struct RecordingDisplay(Rc<RefCell<DisplayState>>);

impl RecordingDisplay {
    fn record(&self, call: DisplayCall) {
        self.0.borrow_mut().calls.push(call);
    }
}

impl Display for RecordingDisplay {
    fn root(&self) -> XWindow {
        ROOT
    }

    fn server_time(&self) -> Timestamp {
        self.0.borrow().time
    }

    fn probe(&self, window: XWindow) -> Result<WindowSnapshot, DisplayError> {
        self.0
            .borrow()
            .windows
            .get(&window)
            .map(|(snapshot, _)| *snapshot)
            .ok_or(DisplayError::WindowGone(window))
    }

    fn fetch_properties(&self, window: XWindow) -> WindowProperties {
        self.0
            .borrow()
            .windows
            .get(&window)
            .map(|(_, props)| props.clone())
            .unwrap_or_default()
    }

    fn parent_of(&self, _window: XWindow) -> Option<XWindow> {
        Some(ROOT)
    }

    fn embed(&self, window: XWindow, _snapshot: &WindowSnapshot) -> FrameHandles {
        let mut state = self.0.borrow_mut();
        let frame = state.next_id;
        state.next_id += 2;
        state.calls.push(DisplayCall::Embed(window));
        FrameHandles { frame, wrapper: frame + 1 }
    }

    fn unembed(&self, window: XWindow, position: Point, on_shutdown: bool) {
        self.record(DisplayCall::Unembed(window, position, on_shutdown));
    }

    fn destroy_frame(&self, frame: &FrameHandles) {
        self.record(DisplayCall::DestroyFrame(*frame));
    }

    fn map_window(&self, window: XWindow) {
        self.record(DisplayCall::Map(window));
    }

    fn unmap_window(&self, window: XWindow) {
        self.record(DisplayCall::Unmap(window));
    }

    fn configure_window(&self, window: XWindow, geometry: Geometry) {
        self.record(DisplayCall::Configure(window, geometry));
    }

    fn set_wm_state(&self, window: XWindow, state: WmState) {
        self.record(DisplayCall::WmState(window, state));
    }

    fn set_net_state(&self, window: XWindow, state: NetState) {
        self.record(DisplayCall::NetState(window, state));
    }

    fn set_desktop(&self, window: XWindow, desktop: Desktop) {
        self.record(DisplayCall::Desktop(window, desktop));
    }

    fn set_activities(&self, window: XWindow, activities: &str) {
        self.record(DisplayCall::Activities(window, activities.to_string()));
    }

    fn set_frame_extents(&self, window: XWindow, extents: Margins) {
        self.record(DisplayCall::FrameExtents(window, extents));
    }

    fn set_allowed_actions(&self, window: XWindow, actions: AllowedActions) {
        self.record(DisplayCall::AllowedActions(window, actions));
    }

    fn set_visible_name(&self, window: XWindow, name: Option<&str>) {
        self.record(DisplayCall::VisibleName(window, name.map(str::to_string)));
    }

    fn set_transient_for(&self, window: XWindow, target: XWindow) {
        self.record(DisplayCall::TransientFor(window, target));
    }

    fn set_input_shape(&self, frame: XWindow, shape: InputShape) {
        self.record(DisplayCall::InputShape(frame, shape));
    }

    fn set_input_extent(&self, frame: XWindow, extent: Option<&[Geometry]>) {
        self.record(DisplayCall::InputExtent(frame, extent.map(<[Geometry]>::to_vec)));
    }

    fn send_client_message(&self, window: XWindow, message: ClientMessage) {
        self.record(DisplayCall::Message(window, message));
    }

    fn set_input_focus(&self, window: XWindow, timestamp: Timestamp) {
        self.record(DisplayCall::Focus(window, timestamp));
    }

    fn kill_client(&self, window: XWindow) {
        self.record(DisplayCall::KillClient(window));
    }
}

/// Test-side view of the [`RecordingDisplay`]
#[derive(Clone)]
pub struct DisplayHandle(Rc<RefCell<DisplayState>>);

impl DisplayHandle {
    pub fn clear(&self) {
        self.0.borrow_mut().calls.clear();
    }

    pub fn calls(&self) -> Vec<DisplayCall> {
        self.0.borrow().calls.clone()
    }

    pub fn count(&self, pred: impl Fn(&DisplayCall) -> bool) -> usize {
        self.0.borrow().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn configures_of(&self, window: XWindow) -> Vec<Geometry> {
        self.0
            .borrow()
            .calls
            .iter()
            .filter_map(|c| match c {
                DisplayCall::Configure(w, g) if *w == window => Some(*g),
                _ => None,
            })
            .collect()
    }

    pub fn last_input_shape(&self, frame: XWindow) -> Option<InputShape> {
        self.0.borrow().calls.iter().rev().find_map(|c| match c {
            DisplayCall::InputShape(w, s) if *w == frame => Some(*s),
            _ => None,
        })
    }

    pub fn last_frame_extents(&self, window: XWindow) -> Option<Margins> {
        self.0.borrow().calls.iter().rev().find_map(|c| match c {
            DisplayCall::FrameExtents(w, m) if *w == window => Some(*m),
            _ => None,
        })
    }

    pub fn last_wm_state(&self, window: XWindow) -> Option<WmState> {
        self.0.borrow().calls.iter().rev().find_map(|c| match c {
            DisplayCall::WmState(w, s) if *w == window => Some(*s),
            _ => None,
        })
    }

    pub fn last_allowed_actions(&self, window: XWindow) -> Option<AllowedActions> {
        self.0.borrow().calls.iter().rev().find_map(|c| match c {
            DisplayCall::AllowedActions(w, a) if *w == window => Some(*a),
            _ => None,
        })
    }

    pub fn set_time(&self, time: Timestamp) {
        self.0.borrow_mut().time = time;
    }

    /// Make a window known to the server without managing it
    pub fn add_window(&self, spec: WindowSpec) {
        let snapshot = WindowSnapshot {
            geometry: spec.geometry,
            border_width: 0,
            depth: 24,
            visual: 0x21,
            colormap: 0x20,
            override_redirect: spec.override_redirect,
            viewable: false,
        };
        self.0.borrow_mut().windows.insert(spec.window, (snapshot, spec.props));
    }
}

#[derive(Debug, Default)]
struct KillerState {
    next_helper: u32,
    asked: Vec<u32>,
    dismissed: Vec<u32>,
    terminated: Vec<u32>,
    alive: HashSet<u32>,
}

/// Helpers stay alive until dismissed
pub struct RecordingKiller(Rc<RefCell<KillerState>>);

impl ProcessKiller for RecordingKiller {
    fn terminate(&mut self, pid: u32, _hostname: &str, _local: bool) {
        self.0.borrow_mut().terminated.push(pid);
    }

    fn ask(&mut self, request: &KillRequest<'_>) -> Option<u32> {
        let mut state = self.0.borrow_mut();
        let helper = FIRST_HELPER + state.next_helper;
        state.next_helper += 1;
        state.asked.push(request.pid);
        state.alive.insert(helper);
        Some(helper)
    }

    fn is_alive(&self, helper: u32) -> bool {
        self.0.borrow().alive.contains(&helper)
    }

    fn dismiss(&mut self, helper: u32) {
        let mut state = self.0.borrow_mut();
        state.alive.remove(&helper);
        state.dismissed.push(helper);
    }
}

#[derive(Clone)]
pub struct KillerHandle(Rc<RefCell<KillerState>>);

impl KillerHandle {
    /// Pids the user was asked about
    pub fn asked(&self) -> Vec<u32> {
        self.0.borrow().asked.clone()
    }

    pub fn dismissed(&self) -> Vec<u32> {
        self.0.borrow().dismissed.clone()
    }

    pub fn terminated(&self) -> Vec<u32> {
        self.0.borrow().terminated.clone()
    }
}

/// A client window as the server would describe it
#[derive(Debug, Clone)]
pub struct WindowSpec {
    pub window: XWindow,
    pub geometry: Geometry,
    pub override_redirect: bool,
    pub props: WindowProperties,
}

impl WindowSpec {
    pub fn normal(window: XWindow) -> Self {
        let props = WindowProperties {
            window_type: WindowType::Normal,
            ..Default::default()
        };
        Self {
            window,
            geometry: Geometry::new(0, 0, 400, 300),
            override_redirect: false,
            props,
        }
    }

    /// Requested geometry, with the program-position hint set
    pub fn at(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        let hints = self.props.size_hints.get_or_insert_with(SizeHints::default);
        hints.flags |= 1 << 2;
        self
    }

    pub fn of_type(mut self, window_type: WindowType) -> Self {
        self.props.window_type = window_type;
        self
    }

    pub fn without_border(mut self) -> Self {
        self.props.motif_hints = Some(MotifHints { flags: 1 << 1, functions: 0, decorations: 0 });
        self
    }

    pub fn override_redirect(mut self) -> Self {
        self.override_redirect = true;
        self
    }

    pub fn transient_for(mut self, parent: XWindow) -> Self {
        self.props.transient_for = Some(parent);
        self
    }

    pub fn group_leader(mut self, leader: XWindow) -> Self {
        let hints = self.props.wm_hints.get_or_insert_with(WmHints::default);
        hints.flags |= 1 << 6;
        hints.window_group = Some(leader);
        self
    }

    /// WM_HINTS initial state IconicState
    pub fn icon(mut self, icon: Icon) -> Self {
        self.props.icon = Some(icon);
        self
    }

    pub fn iconic(mut self) -> Self {
        let hints = self.props.wm_hints.get_or_insert_with(WmHints::default);
        hints.flags |= 1 << 1;
        hints.initial_state = 3;
        self
    }

    pub fn pid(mut self, pid: u32) -> Self {
        self.props.pid = Some(pid);
        self
    }

    pub fn class(mut self, name: &str, class: &str) -> Self {
        self.props.resource_name = name.to_string();
        self.props.resource_class = class.to_string();
        self
    }

    pub fn role(mut self, role: &str) -> Self {
        self.props.window_role = role.to_string();
        self
    }

    pub fn session(mut self, session_id: &str) -> Self {
        self.props.session_id = Some(session_id.to_string());
        self
    }

    pub fn modal(mut self) -> Self {
        self.props.net_state |= NetState::MODAL;
        self
    }

    pub fn desktop(mut self, desktop: u32) -> Self {
        self.props.desktop = Some(Desktop::Number(desktop));
        self
    }

    pub fn named(mut self, name: &str) -> Self {
        self.props.name = Some(name.to_string());
        self
    }

    pub fn machine(mut self, machine: &str) -> Self {
        self.props.client_machine = Some(machine.to_string());
        self
    }

    pub fn protocols(mut self, protocols: Protocols) -> Self {
        self.props.protocols |= protocols;
        self
    }

    pub fn sync_counter(mut self, counter: u32) -> Self {
        self.props.protocols |= Protocols::SYNC_REQUEST;
        self.props.sync_counter = Some(counter);
        self
    }

    pub fn screen_edge(mut self, value: u32) -> Self {
        self.props.screen_edge = Some(value);
        self
    }
}

pub struct TestSetup {
    pub ws: Workspace,
    pub display: DisplayHandle,
    pub killer: KillerHandle,
    seen: Vec<ClientEvent>,
}

impl TestSetup {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(configure: impl FnOnce(&mut Config)) -> Self {
        let mut config = Config::default();
        configure(&mut config);

        let display_state = Rc::new(RefCell::new(DisplayState {
            next_id: FIRST_FRAME,
            time: 1,
            ..Default::default()
        }));
        let killer_state = Rc::new(RefCell::new(KillerState::default()));
        let services = Services {
            display: Box::new(RecordingDisplay(display_state.clone())),
            rules: Box::new(NoRules),
            placement: Box::new(PlacementManager::new(config.behavior.placement)),
            activation: Box::new(FocusManager::new(config.behavior.focus_stealing_prevention)),
            decorations: Box::new(ThemeDecorations::new(&config.decorations)),
            session: Box::new(NoSession),
            killer: Box::new(RecordingKiller(killer_state.clone())),
        };
        let mut ws = Workspace::new(config, services);
        ws.local_hostname = "testhost".into();
        ws.outputs = vec![Output::new(Geometry::new(0, 0, 1920, 1080))];

        Self {
            ws,
            display: DisplayHandle(display_state),
            killer: KillerHandle(killer_state),
            seen: Vec::new(),
        }
    }

    pub fn manage(&mut self, spec: WindowSpec) -> ClientId {
        let window = spec.window;
        self.display.add_window(spec);
        self.ws.manage(window, false).unwrap()
    }

    /// Every event emitted since the last `take_events()`
    pub fn events(&mut self) -> Vec<ClientEvent> {
        self.seen.extend(self.ws.take_events());
        self.seen.clone()
    }

    pub fn take_events(&mut self) -> Vec<ClientEvent> {
        let mut events = std::mem::take(&mut self.seen);
        events.extend(self.ws.take_events());
        events
    }

    pub fn advance(&mut self, by: Duration) {
        let now = self.ws.now + by;
        self.ws.advance_to(now);
    }
}
