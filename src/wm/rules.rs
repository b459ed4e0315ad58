//! Rules Module
//!
//! Window-matching rules are evaluated outside the core. Each managed window
//! gets a [`WindowRules`] object once its identity is known; every mutable
//! attribute passes through the matching `check_*` call before it is applied.
//! The default methods let the proposed value through unchanged.

use crate::shared::{Point, Size};
use crate::wm::client_flags::{Desktop, MaximizeMode, ShadeMode, WindowType};

/// Identity a rule set is matched against
#[derive(Debug, Clone, Copy)]
pub struct WindowMatch<'a> {
    pub resource_name: &'a str,
    pub resource_class: &'a str,
    pub window_role: &'a str,
    pub caption: &'a str,
    pub client_machine: &'a str,
    pub window_type: WindowType,
}

pub trait Rules {
    fn for_window(&self, window: &WindowMatch<'_>) -> Box<dyn WindowRules>;
}

/// Rule overrides for one window. `init` is true while the window is
/// being managed.
#[allow(unused_variables)]
pub trait WindowRules {
    fn check_position(&self, pos: Option<Point>, init: bool) -> Option<Point> {
        pos
    }
    fn check_size(&self, size: Size, init: bool) -> Size {
        size
    }
    fn check_ignore_geometry(&self, ignore: bool, init: bool) -> bool {
        ignore
    }
    fn check_desktop(&self, desktop: Desktop, init: bool) -> Desktop {
        desktop
    }
    fn check_activities(&self, activities: Vec<String>, init: bool) -> Vec<String> {
        activities
    }
    fn check_screen(&self, screen: usize, init: bool) -> usize {
        screen
    }
    fn check_type(&self, window_type: WindowType) -> WindowType {
        window_type
    }
    fn check_maximize(&self, mode: MaximizeMode, init: bool) -> MaximizeMode {
        mode
    }
    fn check_minimize(&self, minimized: bool, init: bool) -> bool {
        minimized
    }
    fn check_shade(&self, mode: ShadeMode, init: bool) -> ShadeMode {
        mode
    }
    fn check_full_screen(&self, fullscreen: bool, init: bool) -> bool {
        fullscreen
    }
    fn check_no_border(&self, no_border: bool, init: bool) -> bool {
        no_border
    }
    fn check_keep_above(&self, above: bool, init: bool) -> bool {
        above
    }
    fn check_keep_below(&self, below: bool, init: bool) -> bool {
        below
    }
    fn check_skip_taskbar(&self, skip: bool, init: bool) -> bool {
        skip
    }
    fn check_skip_pager(&self, skip: bool, init: bool) -> bool {
        skip
    }
    fn check_skip_switcher(&self, skip: bool, init: bool) -> bool {
        skip
    }
    fn check_accept_focus(&self, accept: bool) -> bool {
        accept
    }
    fn check_closeable(&self, closeable: bool) -> bool {
        closeable
    }
    fn check_deco_color(&self, scheme: Option<String>) -> Option<String> {
        scheme
    }
}

/// No rules configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRules;

#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl WindowRules for PassThrough {}

impl Rules for NoRules {
    fn for_window(&self, _window: &WindowMatch<'_>) -> Box<dyn WindowRules> {
        Box::new(PassThrough)
    }
}
