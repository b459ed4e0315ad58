//! Client Flags
//!
//! Bitfield flags and small state enums describing a managed window.

use bitflags::bitflags;

bitflags! {
    /// Maximize mode. The empty set means "restored".
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct MaximizeMode: u8 {
        const VERTICAL   = 1 << 0;
        const HORIZONTAL = 1 << 1;
        const FULL       = Self::VERTICAL.bits() | Self::HORIZONTAL.bits();
    }
}

bitflags! {
    /// WM_PROTOCOLS the client advertises
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Protocols: u32 {
        const DELETE       = 1 << 0;
        const TAKE_FOCUS   = 1 << 1;
        const PING         = 1 << 2;
        const SYNC_REQUEST = 1 << 3;
        const CONTEXT_HELP = 1 << 4;
    }
}

bitflags! {
    /// _NET_WM_STATE as read from and exported to the window
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct NetState: u32 {
        const MODAL             = 1 << 0;
        const STICKY            = 1 << 1;
        const MAX_VERT          = 1 << 2;
        const MAX_HORIZ         = 1 << 3;
        const SHADED            = 1 << 4;
        const SKIP_TASKBAR      = 1 << 5;
        const SKIP_PAGER        = 1 << 6;
        const SKIP_SWITCHER     = 1 << 7;
        const HIDDEN            = 1 << 8;
        const FULLSCREEN        = 1 << 9;
        const KEEP_ABOVE        = 1 << 10;
        const KEEP_BELOW        = 1 << 11;
        const DEMANDS_ATTENTION = 1 << 12;
    }
}

bitflags! {
    /// _NET_WM_ALLOWED_ACTIONS
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct AllowedActions: u32 {
        const MOVE           = 1 << 0;
        const RESIZE         = 1 << 1;
        const MINIMIZE       = 1 << 2;
        const SHADE          = 1 << 3;
        const STICK          = 1 << 4;
        const MAX_VERT       = 1 << 5;
        const MAX_HORIZ      = 1 << 6;
        const FULLSCREEN     = 1 << 7;
        const CHANGE_DESKTOP = 1 << 8;
        const CLOSE          = 1 << 9;
    }
}

/// Window type (EWMH _NET_WM_WINDOW_TYPE plus the KDE extensions)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    #[default]
    Unknown,
    Normal,
    Desktop,
    Dock,
    Toolbar,
    Menu,
    Dialog,
    TopMenu,
    Utility,
    Splash,
    DropdownMenu,
    PopupMenu,
    Tooltip,
    Notification,
    ComboBox,
    DndIcon,
    OnScreenDisplay,
    CriticalNotification,
}

impl WindowType {
    /// Types that never take part in normal window management decisions
    pub fn is_special(self) -> bool {
        matches!(
            self,
            Self::Desktop
                | Self::Dock
                | Self::Splash
                | Self::Toolbar
                | Self::Notification
                | Self::OnScreenDisplay
                | Self::CriticalNotification
        )
    }

    /// Types that are drawn without a decoration
    pub fn wants_no_border(self) -> bool {
        match self {
            Self::Desktop
            | Self::Dock
            | Self::TopMenu
            | Self::Splash
            | Self::Notification
            | Self::OnScreenDisplay
            | Self::CriticalNotification => true,
            Self::Unknown
            | Self::Normal
            | Self::Toolbar
            | Self::Menu
            | Self::Dialog
            | Self::Utility => false,
            // Override-redirect style types are never managed with a frame.
            Self::DropdownMenu
            | Self::PopupMenu
            | Self::Tooltip
            | Self::ComboBox
            | Self::DndIcon => true,
        }
    }
}

/// Internal visibility state of the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MappingState {
    #[default]
    Withdrawn,
    Unmapped,
    Mapped,
    /// Mapped for the compositor only, never receives input
    Kept,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadeMode {
    #[default]
    None,
    Normal,
    /// Shaded window temporarily unshaded under the pointer
    Hover,
    /// Shaded window temporarily unshaded while active
    Activated,
}

/// ICCCM WM_STATE value exported to the client
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WmState {
    Withdrawn,
    Normal,
    Iconic,
}

/// Virtual desktop membership. Desktop numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Desktop {
    All,
    Number(u32),
}

impl Desktop {
    pub fn is_all(self) -> bool {
        matches!(self, Self::All)
    }
}

/// Window layer (for stacking)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum WindowLayer {
    Desktop = 0,
    Below = 1,
    Normal = 2,
    Dock = 3,
    Above = 4,
    Notification = 5,
    Active = 6,
    OnScreenDisplay = 7,
}

/// Which part of the client a transient points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransientTarget {
    #[default]
    None,
    /// Transient for every earlier member of its group
    Group,
    Window(u32),
}

impl TransientTarget {
    pub fn is_some(self) -> bool {
        !matches!(self, Self::None)
    }
}
