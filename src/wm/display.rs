//! Display Module
//!
//! The transport seam. The window core never talks to the X server directly;
//! every request goes through [`Display`]. Requests are fire-and-forget like
//! on the wire: failures surface asynchronously and are logged by the
//! implementation. Only the initial probe is allowed to fail.

use thiserror::Error;

use crate::shared::{Geometry, Margins, Point};
use crate::wm::client_flags::{AllowedActions, Desktop, NetState, WmState};
use crate::wm::properties::WindowProperties;

/// Server-side window id
pub type XWindow = u32;

/// Server timestamp in milliseconds; wraps every ~49 days
pub type Timestamp = u32;

#[derive(Debug, Error)]
pub enum DisplayError {
    #[error("window {0:#x} no longer exists")]
    WindowGone(XWindow),
    #[error("display connection failed: {0}")]
    Connection(String),
}

/// Attributes read before a window is touched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSnapshot {
    pub geometry: Geometry,
    pub border_width: u32,
    pub depth: u8,
    pub visual: u32,
    pub colormap: u32,
    pub override_redirect: bool,
    pub viewable: bool,
}

/// Windows created around a managed client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHandles {
    pub frame: XWindow,
    pub wrapper: XWindow,
}

/// Protocol messages sent to clients over WM_PROTOCOLS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientMessage {
    DeleteWindow { timestamp: Timestamp },
    TakeFocus { timestamp: Timestamp },
    Ping { timestamp: Timestamp },
    SyncRequest { timestamp: Timestamp, lo: u32, hi: u32 },
}

/// Input shape of a frame window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShape {
    /// Follow the bounding shape
    Default,
    /// No input at all
    Empty,
}

/// Transport used by the window core
pub trait Display {
    fn root(&self) -> XWindow;

    /// Last server time seen on the connection
    fn server_time(&self) -> Timestamp;

    /// Snapshot attributes and geometry in one go
    fn probe(&self, window: XWindow) -> Result<WindowSnapshot, DisplayError>;

    /// Batch-fetch every property the core classifies windows by.
    /// Missing or malformed properties come back as defaults.
    fn fetch_properties(&self, window: XWindow) -> WindowProperties;

    /// Parent in the server-side window tree
    fn parent_of(&self, window: XWindow) -> Option<XWindow>;

    /// Create frame and wrapper and reparent the client into them
    fn embed(&self, window: XWindow, snapshot: &WindowSnapshot) -> FrameHandles;

    /// Reparent the client back to the root at `position`. A shutdown
    /// release maps the client and keeps its properties.
    fn unembed(&self, window: XWindow, position: Point, on_shutdown: bool);

    fn destroy_frame(&self, frame: &FrameHandles);

    fn map_window(&self, window: XWindow);
    fn unmap_window(&self, window: XWindow);
    fn configure_window(&self, window: XWindow, geometry: Geometry);

    fn set_wm_state(&self, window: XWindow, state: WmState);
    fn set_net_state(&self, window: XWindow, state: NetState);
    fn set_desktop(&self, window: XWindow, desktop: Desktop);
    fn set_activities(&self, window: XWindow, activities: &str);
    fn set_frame_extents(&self, window: XWindow, extents: Margins);
    fn set_allowed_actions(&self, window: XWindow, actions: AllowedActions);
    fn set_visible_name(&self, window: XWindow, name: Option<&str>);
    fn set_transient_for(&self, window: XWindow, target: XWindow);

    fn set_input_shape(&self, frame: XWindow, shape: InputShape);
    /// Extra input-only region around the frame, `None` removes it
    fn set_input_extent(&self, frame: XWindow, extent: Option<&[Geometry]>);

    fn send_client_message(&self, window: XWindow, message: ClientMessage);
    fn set_input_focus(&self, window: XWindow, timestamp: Timestamp);
    fn kill_client(&self, window: XWindow);
}

/// Compare two server timestamps, tolerating 32-bit wraparound.
/// `Greater` means `a` is newer than `b`.
pub fn timestamp_compare(a: Timestamp, b: Timestamp) -> std::cmp::Ordering {
    (a.wrapping_sub(b) as i32).cmp(&0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cmp::Ordering;

    #[test]
    fn test_timestamp_compare_plain() {
        assert_eq!(timestamp_compare(10, 5), Ordering::Greater);
        assert_eq!(timestamp_compare(5, 10), Ordering::Less);
        assert_eq!(timestamp_compare(7, 7), Ordering::Equal);
    }

    #[test]
    fn test_timestamp_compare_wraps() {
        assert_eq!(timestamp_compare(0x0000_0005, 0xFFFF_FFF0), Ordering::Greater);
        assert_eq!(timestamp_compare(0xFFFF_FFF0, 0x0000_0005), Ordering::Less);
    }
}
