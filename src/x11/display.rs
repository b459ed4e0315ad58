//! X11 Display
//!
//! [`Display`] on top of x11rb. Requests are queued on the connection and
//! flushed by the event loop; protocol errors come back as events.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use tracing::{debug, warn};
use x11rb::connection::Connection;
use x11rb::errors::{ReplyError, ReplyOrIdError};
use x11rb::protocol::shape::{self, ConnectionExt as _};
use x11rb::protocol::sync::{self, ConnectionExt as _};
use x11rb::protocol::xproto::{
    AtomEnum, ChangeWindowAttributesAux, ClientMessageEvent, ClipOrdering, ConfigureNotifyEvent,
    ConfigureWindowAux, ConnectionExt as _, CreateWindowAux, EventMask, InputFocus, MapState,
    PropMode, Rectangle, SetMode, StackMode, Window, WindowClass, CONFIGURE_NOTIFY_EVENT,
};
use x11rb::rust_connection::RustConnection;
use x11rb::wrapper::ConnectionExt as _;

use crate::shared::{Geometry, Margins, Point};
use crate::wm::client_flags::{AllowedActions, Desktop, NetState, WmState};
use crate::wm::display::{
    ClientMessage, Display, DisplayError, FrameHandles, InputShape, Timestamp, WindowSnapshot,
    XWindow,
};
use crate::wm::properties::WindowProperties;
use crate::x11::atoms::Atoms;
use crate::x11::properties::{desktop_to_raw, read_properties};

fn client_event_mask() -> EventMask {
    EventMask::PROPERTY_CHANGE | EventMask::STRUCTURE_NOTIFY | EventMask::FOCUS_CHANGE
}

/// Server-side bookkeeping shared between the display and the event driver
#[derive(Debug, Default)]
pub struct Tracking {
    /// Client windows currently reparented into a frame
    pub clients: HashMap<Window, FrameHandles>,
    /// UnmapNotify events caused by our own requests, per window
    pub expected_unmaps: HashMap<Window, u32>,
    /// Last configured position of frames and wrappers
    pub positions: HashMap<Window, Point>,
    pub sync_counters: HashMap<Window, u32>,
    pub alarms: HashMap<Window, sync::Alarm>,
    /// Input-only windows extending a frame's input region
    pub input_windows: HashMap<Window, Window>,
}

impl Tracking {
    /// Consume one expected unmap of `window`
    pub fn take_expected_unmap(&mut self, window: Window) -> bool {
        match self.expected_unmaps.get_mut(&window) {
            Some(count) if *count > 1 => {
                *count -= 1;
                true
            }
            Some(_) => {
                self.expected_unmaps.remove(&window);
                true
            }
            None => false,
        }
    }

    pub fn window_for_alarm(&self, alarm: sync::Alarm) -> Option<Window> {
        self.alarms
            .iter()
            .find(|(_, a)| **a == alarm)
            .map(|(window, _)| *window)
    }

    fn expect_unmap(&mut self, window: Window) {
        *self.expected_unmaps.entry(window).or_default() += 1;
    }
}

/// State shared with the event driver
#[derive(Debug, Clone, Default)]
pub struct Shared {
    /// Latest server timestamp seen in an event
    pub time: Rc<Cell<Timestamp>>,
    pub tracking: Rc<RefCell<Tracking>>,
}

pub struct X11Display {
    conn: Arc<RustConnection>,
    root: Window,
    atoms: Atoms,
    shared: Shared,
    has_sync: bool,
}

impl X11Display {
    pub fn new(conn: Arc<RustConnection>, screen_num: usize, atoms: Atoms, shared: Shared) -> Self {
        let root = conn.setup().roots[screen_num].root;
        let has_sync = match conn.sync_initialize(3, 1).map(|cookie| cookie.reply()) {
            Ok(Ok(version)) => {
                debug!("XSync {}.{}", version.major_version, version.minor_version);
                true
            }
            Ok(Err(e)) => {
                warn!("XSync unavailable, resize sync disabled: {}", e);
                false
            }
            Err(e) => {
                warn!("XSync unavailable, resize sync disabled: {}", e);
                false
            }
        };
        Self { conn, root, atoms, shared, has_sync }
    }

    fn run(&self, what: &str, window: Window, f: impl FnOnce(&RustConnection) -> Result<(), ReplyOrIdError>) {
        if let Err(e) = f(&self.conn) {
            warn!("{} on 0x{:x} failed: {}", what, window, e);
        }
    }

    /// ICCCM: a moved client gets a synthetic ConfigureNotify in root coordinates
    fn send_synthetic_configure(&self, window: Window, geometry: Geometry) {
        let origin = {
            let tracking = self.shared.tracking.borrow();
            let Some(frame) = tracking.clients.get(&window) else {
                return;
            };
            let frame_pos = tracking.positions.get(&frame.frame).copied().unwrap_or_default();
            let wrapper_pos = tracking.positions.get(&frame.wrapper).copied().unwrap_or_default();
            Point::new(frame_pos.x + wrapper_pos.x, frame_pos.y + wrapper_pos.y)
        };
        let event = ConfigureNotifyEvent {
            response_type: CONFIGURE_NOTIFY_EVENT,
            sequence: 0,
            event: window,
            window,
            above_sibling: x11rb::NONE,
            x: (origin.x + geometry.x) as i16,
            y: (origin.y + geometry.y) as i16,
            width: geometry.width as u16,
            height: geometry.height as u16,
            border_width: 0,
            override_redirect: false,
        };
        self.run("synthetic ConfigureNotify", window, |conn| {
            conn.send_event(false, window, EventMask::STRUCTURE_NOTIFY, event)?;
            Ok(())
        });
    }

    fn arm_sync_alarm(&self, window: Window, lo: u32, hi: u32) {
        if !self.has_sync {
            return;
        }
        let counter = self.shared.tracking.borrow().sync_counters.get(&window).copied();
        let Some(counter) = counter else {
            return;
        };
        let value = sync::Int64 { hi: hi as i32, lo };
        let existing = self.shared.tracking.borrow().alarms.get(&window).copied();
        self.run("sync alarm", window, |conn| {
            match existing {
                Some(alarm) => {
                    conn.sync_change_alarm(alarm, &sync::ChangeAlarmAux::new().value(value))?;
                }
                None => {
                    let alarm = conn.generate_id()?;
                    conn.sync_create_alarm(
                        alarm,
                        &sync::CreateAlarmAux::new()
                            .counter(counter)
                            .value_type(sync::VALUETYPE::ABSOLUTE)
                            .value(value)
                            .test_type(sync::TESTTYPE::POSITIVE_COMPARISON)
                            .events(1),
                    )?;
                    self.shared.tracking.borrow_mut().alarms.insert(window, alarm);
                }
            }
            Ok(())
        });
    }

    fn forget_client(&self, window: Window) {
        let alarm = {
            let mut tracking = self.shared.tracking.borrow_mut();
            tracking.clients.remove(&window);
            tracking.sync_counters.remove(&window);
            tracking.alarms.remove(&window)
        };
        if let Some(alarm) = alarm {
            self.run("destroy sync alarm", window, |conn| {
                conn.sync_destroy_alarm(alarm)?;
                Ok(())
            });
        }
    }
}

impl Display for X11Display {
    fn root(&self) -> XWindow {
        self.root
    }

    fn server_time(&self) -> Timestamp {
        self.shared.time.get()
    }

    fn probe(&self, window: XWindow) -> Result<WindowSnapshot, DisplayError> {
        let to_error = |e: ReplyError| match e {
            ReplyError::X11Error(_) => DisplayError::WindowGone(window),
            ReplyError::ConnectionError(e) => DisplayError::Connection(e.to_string()),
        };
        let attrs = self
            .conn
            .get_window_attributes(window)
            .map_err(|e| DisplayError::Connection(e.to_string()))?;
        let geometry = self
            .conn
            .get_geometry(window)
            .map_err(|e| DisplayError::Connection(e.to_string()))?;
        let attrs = attrs.reply().map_err(to_error)?;
        let geometry = geometry.reply().map_err(to_error)?;
        Ok(WindowSnapshot {
            geometry: Geometry::new(
                geometry.x.into(),
                geometry.y.into(),
                geometry.width.into(),
                geometry.height.into(),
            ),
            border_width: geometry.border_width.into(),
            depth: geometry.depth,
            visual: attrs.visual,
            colormap: attrs.colormap,
            override_redirect: attrs.override_redirect,
            viewable: attrs.map_state == MapState::VIEWABLE,
        })
    }

    fn fetch_properties(&self, window: XWindow) -> WindowProperties {
        let props = read_properties(self.conn.as_ref(), &self.atoms, window);
        let mut tracking = self.shared.tracking.borrow_mut();
        match props.sync_counter {
            Some(counter) => tracking.sync_counters.insert(window, counter),
            None => tracking.sync_counters.remove(&window),
        };
        props
    }

    fn parent_of(&self, window: XWindow) -> Option<XWindow> {
        let reply = self.conn.query_tree(window).ok()?.reply().ok()?;
        Some(reply.parent)
    }

    fn embed(&self, window: XWindow, snapshot: &WindowSnapshot) -> FrameHandles {
        let mut handles = FrameHandles { frame: x11rb::NONE, wrapper: x11rb::NONE };
        let g = snapshot.geometry;
        self.run("embed", window, |conn| {
            let frame = conn.generate_id()?;
            let wrapper = conn.generate_id()?;

            // ARGB clients get a frame with their own visual
            let (depth, visual, aux) = if snapshot.depth == 32 {
                (
                    32,
                    snapshot.visual,
                    CreateWindowAux::new()
                        .colormap(snapshot.colormap)
                        .border_pixel(0)
                        .background_pixel(0),
                )
            } else {
                (x11rb::COPY_DEPTH_FROM_PARENT, x11rb::COPY_FROM_PARENT, CreateWindowAux::new())
            };
            conn.create_window(
                depth,
                frame,
                self.root,
                g.x as i16,
                g.y as i16,
                g.width.max(1) as u16,
                g.height.max(1) as u16,
                0,
                WindowClass::INPUT_OUTPUT,
                visual,
                &aux.clone().override_redirect(1).event_mask(
                    EventMask::SUBSTRUCTURE_REDIRECT
                        | EventMask::SUBSTRUCTURE_NOTIFY
                        | EventMask::BUTTON_PRESS
                        | EventMask::BUTTON_RELEASE
                        | EventMask::ENTER_WINDOW
                        | EventMask::LEAVE_WINDOW,
                ),
            )?;
            conn.create_window(
                depth,
                wrapper,
                frame,
                0,
                0,
                g.width.max(1) as u16,
                g.height.max(1) as u16,
                0,
                WindowClass::INPUT_OUTPUT,
                visual,
                &aux.override_redirect(1)
                    .event_mask(EventMask::SUBSTRUCTURE_REDIRECT | EventMask::SUBSTRUCTURE_NOTIFY),
            )?;

            if snapshot.viewable {
                self.shared.tracking.borrow_mut().expect_unmap(window);
            }
            // No events for our own reparent
            conn.change_window_attributes(
                window,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT),
            )?;
            conn.configure_window(window, &ConfigureWindowAux::new().border_width(0))?;
            conn.reparent_window(window, wrapper, 0, 0)?;
            conn.change_save_set(SetMode::INSERT, window)?;
            conn.change_window_attributes(
                window,
                &ChangeWindowAttributesAux::new().event_mask(client_event_mask()),
            )?;
            if let Err(e) = conn.shape_select_input(window, true) {
                debug!("Shape events unavailable for 0x{:x}: {}", window, e);
            }

            let mut tracking = self.shared.tracking.borrow_mut();
            tracking.positions.insert(frame, g.position());
            tracking.positions.insert(wrapper, Point::default());
            handles = FrameHandles { frame, wrapper };
            tracking.clients.insert(window, handles);
            Ok(())
        });
        debug!("Embedded 0x{:x} in frame 0x{:x}", window, handles.frame);
        handles
    }

    fn unembed(&self, window: XWindow, position: Point, on_shutdown: bool) {
        self.run("unembed", window, |conn| {
            conn.change_window_attributes(
                window,
                &ChangeWindowAttributesAux::new().event_mask(EventMask::NO_EVENT),
            )?;
            conn.reparent_window(window, self.root, position.x as i16, position.y as i16)?;
            conn.change_save_set(SetMode::DELETE, window)?;
            if on_shutdown {
                conn.map_window(window)?;
            } else {
                // Withdrawn windows must not stay mapped on the root
                conn.unmap_window(window)?;
                for property in [
                    self.atoms.net_wm_desktop,
                    self.atoms.net_wm_state,
                    self.atoms.net_frame_extents,
                    self.atoms.net_wm_allowed_actions,
                    self.atoms.net_wm_visible_name,
                    self.atoms.kde_net_wm_activities,
                ] {
                    conn.delete_property(window, property)?;
                }
            }
            Ok(())
        });
        self.shared.tracking.borrow_mut().expected_unmaps.remove(&window);
        self.forget_client(window);
    }

    fn destroy_frame(&self, frame: &FrameHandles) {
        let (input, client) = {
            let mut tracking = self.shared.tracking.borrow_mut();
            tracking.positions.remove(&frame.frame);
            tracking.positions.remove(&frame.wrapper);
            let client = tracking
                .clients
                .iter()
                .find(|(_, handles)| handles.frame == frame.frame)
                .map(|(window, _)| *window);
            (tracking.input_windows.remove(&frame.frame), client)
        };
        if let Some(client) = client {
            self.forget_client(client);
        }
        self.run("destroy frame", frame.frame, |conn| {
            if let Some(input) = input {
                conn.destroy_window(input)?;
            }
            conn.destroy_window(frame.frame)?;
            Ok(())
        });
    }

    fn map_window(&self, window: XWindow) {
        self.run("map", window, |conn| {
            conn.map_window(window)?;
            Ok(())
        });
    }

    fn unmap_window(&self, window: XWindow) {
        {
            let mut tracking = self.shared.tracking.borrow_mut();
            if tracking.clients.contains_key(&window) {
                tracking.expect_unmap(window);
            }
        }
        self.run("unmap", window, |conn| {
            conn.unmap_window(window)?;
            Ok(())
        });
    }

    fn configure_window(&self, window: XWindow, geometry: Geometry) {
        self.run("configure", window, |conn| {
            conn.configure_window(
                window,
                &ConfigureWindowAux::new()
                    .x(geometry.x)
                    .y(geometry.y)
                    .width(geometry.width.max(1))
                    .height(geometry.height.max(1)),
            )?;
            Ok(())
        });
        let is_client = {
            let mut tracking = self.shared.tracking.borrow_mut();
            if let Some(pos) = tracking.positions.get_mut(&window) {
                *pos = geometry.position();
            }
            tracking.clients.contains_key(&window)
        };
        if is_client {
            self.send_synthetic_configure(window, geometry);
        }
    }

    fn set_wm_state(&self, window: XWindow, state: WmState) {
        let value = match state {
            WmState::Withdrawn => 0,
            WmState::Normal => 1,
            WmState::Iconic => 3,
        };
        self.run("set WM_STATE", window, |conn| {
            conn.change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.wm_state,
                self.atoms.wm_state,
                &[value, x11rb::NONE],
            )?;
            Ok(())
        });
    }

    fn set_net_state(&self, window: XWindow, state: NetState) {
        let atoms = self.atoms.net_state_to_atoms(state);
        self.run("set _NET_WM_STATE", window, |conn| {
            conn.change_property32(PropMode::REPLACE, window, self.atoms.net_wm_state, AtomEnum::ATOM, &atoms)?;
            Ok(())
        });
    }

    fn set_desktop(&self, window: XWindow, desktop: Desktop) {
        self.run("set _NET_WM_DESKTOP", window, |conn| {
            conn.change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.net_wm_desktop,
                AtomEnum::CARDINAL,
                &[desktop_to_raw(desktop)],
            )?;
            Ok(())
        });
    }

    fn set_activities(&self, window: XWindow, activities: &str) {
        self.run("set activities", window, |conn| {
            conn.change_property8(
                PropMode::REPLACE,
                window,
                self.atoms.kde_net_wm_activities,
                AtomEnum::STRING,
                activities.as_bytes(),
            )?;
            Ok(())
        });
    }

    fn set_frame_extents(&self, window: XWindow, extents: Margins) {
        self.run("set _NET_FRAME_EXTENTS", window, |conn| {
            conn.change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.net_frame_extents,
                AtomEnum::CARDINAL,
                &[extents.left, extents.right, extents.top, extents.bottom],
            )?;
            Ok(())
        });
    }

    fn set_allowed_actions(&self, window: XWindow, actions: AllowedActions) {
        let atoms = self.atoms.allowed_actions_to_atoms(actions);
        self.run("set _NET_WM_ALLOWED_ACTIONS", window, |conn| {
            conn.change_property32(
                PropMode::REPLACE,
                window,
                self.atoms.net_wm_allowed_actions,
                AtomEnum::ATOM,
                &atoms,
            )?;
            Ok(())
        });
    }

    fn set_visible_name(&self, window: XWindow, name: Option<&str>) {
        self.run("set _NET_WM_VISIBLE_NAME", window, |conn| {
            match name {
                Some(name) => {
                    conn.change_property8(
                        PropMode::REPLACE,
                        window,
                        self.atoms.net_wm_visible_name,
                        self.atoms.utf8_string,
                        name.as_bytes(),
                    )?;
                }
                None => {
                    conn.delete_property(window, self.atoms.net_wm_visible_name)?;
                }
            }
            Ok(())
        });
    }

    fn set_transient_for(&self, window: XWindow, target: XWindow) {
        self.run("set WM_TRANSIENT_FOR", window, |conn| {
            conn.change_property32(
                PropMode::REPLACE,
                window,
                AtomEnum::WM_TRANSIENT_FOR,
                AtomEnum::WINDOW,
                &[target],
            )?;
            Ok(())
        });
    }

    fn set_input_shape(&self, frame: XWindow, input: InputShape) {
        self.run("set input shape", frame, |conn| {
            match input {
                InputShape::Default => {
                    conn.shape_mask(shape::SO::SET, shape::SK::INPUT, frame, 0, 0, x11rb::NONE)?;
                }
                InputShape::Empty => {
                    conn.shape_rectangles(
                        shape::SO::SET,
                        shape::SK::INPUT,
                        ClipOrdering::UNSORTED,
                        frame,
                        0,
                        0,
                        &[],
                    )?;
                }
            }
            Ok(())
        });
    }

    fn set_input_extent(&self, frame: XWindow, extent: Option<&[Geometry]>) {
        let existing = self.shared.tracking.borrow().input_windows.get(&frame).copied();
        let Some(rects) = extent.filter(|rects| !rects.is_empty()) else {
            if let Some(input) = existing {
                self.shared.tracking.borrow_mut().input_windows.remove(&frame);
                self.run("destroy input window", input, |conn| {
                    conn.destroy_window(input)?;
                    Ok(())
                });
            }
            return;
        };

        let bounds = rects[1..].iter().fold(rects[0], |acc, r| acc.united(r));
        let shape: Vec<Rectangle> = rects
            .iter()
            .map(|r| Rectangle {
                x: (r.x - bounds.x) as i16,
                y: (r.y - bounds.y) as i16,
                width: r.width as u16,
                height: r.height as u16,
            })
            .collect();
        self.run("input window", frame, |conn| {
            let input = match existing {
                Some(input) => {
                    conn.configure_window(
                        input,
                        &ConfigureWindowAux::new()
                            .x(bounds.x)
                            .y(bounds.y)
                            .width(bounds.width.max(1))
                            .height(bounds.height.max(1)),
                    )?;
                    input
                }
                None => {
                    let input = conn.generate_id()?;
                    conn.create_window(
                        0,
                        input,
                        self.root,
                        bounds.x as i16,
                        bounds.y as i16,
                        bounds.width.max(1) as u16,
                        bounds.height.max(1) as u16,
                        0,
                        WindowClass::INPUT_ONLY,
                        x11rb::COPY_FROM_PARENT,
                        &CreateWindowAux::new().override_redirect(1).event_mask(
                            EventMask::BUTTON_PRESS
                                | EventMask::BUTTON_RELEASE
                                | EventMask::POINTER_MOTION
                                | EventMask::ENTER_WINDOW
                                | EventMask::LEAVE_WINDOW,
                        ),
                    )?;
                    self.shared.tracking.borrow_mut().input_windows.insert(frame, input);
                    input
                }
            };
            conn.shape_rectangles(
                shape::SO::SET,
                shape::SK::INPUT,
                ClipOrdering::UNSORTED,
                input,
                0,
                0,
                &shape,
            )?;
            conn.configure_window(
                input,
                &ConfigureWindowAux::new().sibling(frame).stack_mode(StackMode::BELOW),
            )?;
            conn.map_window(input)?;
            Ok(())
        });
    }

    fn send_client_message(&self, window: XWindow, message: ClientMessage) {
        let data = match message {
            ClientMessage::DeleteWindow { timestamp } => [self.atoms.wm_delete_window, timestamp, 0, 0, 0],
            ClientMessage::TakeFocus { timestamp } => [self.atoms.wm_take_focus, timestamp, 0, 0, 0],
            ClientMessage::Ping { timestamp } => [self.atoms.net_wm_ping, timestamp, window, 0, 0],
            ClientMessage::SyncRequest { timestamp, lo, hi } => {
                self.arm_sync_alarm(window, lo, hi);
                [self.atoms.net_wm_sync_request, timestamp, lo, hi, 0]
            }
        };
        let event = ClientMessageEvent::new(32, window, self.atoms.wm_protocols, data);
        // A client gone in the meantime is not worth a warning
        if let Err(e) = self.conn.send_event(false, window, EventMask::NO_EVENT, event) {
            debug!("Failed to send {:?} to 0x{:x}: {}", message, window, e);
        }
    }

    fn set_input_focus(&self, window: XWindow, timestamp: Timestamp) {
        self.run("set input focus", window, |conn| {
            conn.set_input_focus(InputFocus::POINTER_ROOT, window, timestamp)?;
            Ok(())
        });
    }

    fn kill_client(&self, window: XWindow) {
        self.run("kill client", window, |conn| {
            conn.kill_client(window)?;
            Ok(())
        });
    }
}
