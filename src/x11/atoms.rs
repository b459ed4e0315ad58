//! ICCCM/EWMH atoms and their mapping onto the core's flag types

use anyhow::{Context, Result};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{Atom, ConnectionExt as _};

use crate::wm::client_flags::{AllowedActions, NetState, Protocols, WindowType};

/// Holds all interned atoms
#[derive(Debug, Clone, Copy)]
pub struct Atoms {
    pub utf8_string: Atom,
    pub wm_protocols: Atom,
    pub wm_delete_window: Atom,
    pub wm_take_focus: Atom,
    pub wm_context_help: Atom,
    pub wm_state: Atom,
    pub wm_change_state: Atom,
    pub wm_client_leader: Atom,
    pub wm_window_role: Atom,
    pub sm_client_id: Atom,
    pub motif_wm_hints: Atom,

    pub net_supported: Atom,
    pub net_supporting_wm_check: Atom,
    pub net_client_list: Atom,
    pub net_number_of_desktops: Atom,
    pub net_current_desktop: Atom,
    pub net_desktop_names: Atom,
    pub net_active_window: Atom,
    pub net_close_window: Atom,
    pub net_wm_name: Atom,
    pub net_wm_visible_name: Atom,
    pub net_wm_icon_name: Atom,
    pub net_wm_desktop: Atom,
    pub net_wm_pid: Atom,
    pub net_wm_ping: Atom,
    pub net_wm_sync_request: Atom,
    pub net_wm_sync_request_counter: Atom,
    pub net_wm_user_time: Atom,
    pub net_startup_id: Atom,
    pub net_wm_icon: Atom,
    pub net_frame_extents: Atom,
    pub net_wm_strut: Atom,
    pub net_wm_strut_partial: Atom,
    pub gtk_frame_extents: Atom,

    pub net_wm_window_type: Atom,
    pub net_wm_window_type_normal: Atom,
    pub net_wm_window_type_desktop: Atom,
    pub net_wm_window_type_dock: Atom,
    pub net_wm_window_type_toolbar: Atom,
    pub net_wm_window_type_menu: Atom,
    pub net_wm_window_type_dialog: Atom,
    pub net_wm_window_type_utility: Atom,
    pub net_wm_window_type_splash: Atom,
    pub net_wm_window_type_dropdown_menu: Atom,
    pub net_wm_window_type_popup_menu: Atom,
    pub net_wm_window_type_tooltip: Atom,
    pub net_wm_window_type_notification: Atom,
    pub net_wm_window_type_combo: Atom,
    pub net_wm_window_type_dnd: Atom,
    pub kde_net_wm_window_type_override: Atom,
    pub kde_net_wm_window_type_topmenu: Atom,
    pub kde_net_wm_window_type_on_screen_display: Atom,
    pub kde_net_wm_window_type_critical_notification: Atom,

    pub net_wm_state: Atom,
    pub net_wm_state_modal: Atom,
    pub net_wm_state_sticky: Atom,
    pub net_wm_state_maximized_vert: Atom,
    pub net_wm_state_maximized_horz: Atom,
    pub net_wm_state_shaded: Atom,
    pub net_wm_state_skip_taskbar: Atom,
    pub net_wm_state_skip_pager: Atom,
    pub kde_net_wm_state_skip_switcher: Atom,
    pub net_wm_state_hidden: Atom,
    pub net_wm_state_fullscreen: Atom,
    pub net_wm_state_above: Atom,
    pub net_wm_state_below: Atom,
    pub net_wm_state_demands_attention: Atom,

    pub net_wm_allowed_actions: Atom,
    pub net_wm_action_move: Atom,
    pub net_wm_action_resize: Atom,
    pub net_wm_action_minimize: Atom,
    pub net_wm_action_shade: Atom,
    pub net_wm_action_stick: Atom,
    pub net_wm_action_maximize_vert: Atom,
    pub net_wm_action_maximize_horz: Atom,
    pub net_wm_action_fullscreen: Atom,
    pub net_wm_action_change_desktop: Atom,
    pub net_wm_action_close: Atom,

    pub kde_net_wm_activities: Atom,
    pub kde_net_wm_screen_edge_show: Atom,
    pub kde_net_wm_appmenu_service_name: Atom,
    pub kde_net_wm_appmenu_object_path: Atom,
    pub kde_net_wm_desktop_file: Atom,
    pub kde_net_wm_color_scheme: Atom,
    pub kde_net_wm_skip_close_animation: Atom,
    pub kde_first_in_windowlist: Atom,
}

impl Atoms {
    /// Intern all required atoms
    pub fn new<C: Connection>(conn: &C) -> Result<Self> {
        let intern = |name: &str| -> Result<Atom> {
            Ok(conn
                .intern_atom(false, name.as_bytes())?
                .reply()
                .with_context(|| format!("Failed to intern {}", name))?
                .atom)
        };

        Ok(Self {
            utf8_string: intern("UTF8_STRING")?,
            wm_protocols: intern("WM_PROTOCOLS")?,
            wm_delete_window: intern("WM_DELETE_WINDOW")?,
            wm_take_focus: intern("WM_TAKE_FOCUS")?,
            wm_context_help: intern("_NET_WM_CONTEXT_HELP")?,
            wm_state: intern("WM_STATE")?,
            wm_change_state: intern("WM_CHANGE_STATE")?,
            wm_client_leader: intern("WM_CLIENT_LEADER")?,
            wm_window_role: intern("WM_WINDOW_ROLE")?,
            sm_client_id: intern("SM_CLIENT_ID")?,
            motif_wm_hints: intern("_MOTIF_WM_HINTS")?,

            net_supported: intern("_NET_SUPPORTED")?,
            net_supporting_wm_check: intern("_NET_SUPPORTING_WM_CHECK")?,
            net_client_list: intern("_NET_CLIENT_LIST")?,
            net_number_of_desktops: intern("_NET_NUMBER_OF_DESKTOPS")?,
            net_current_desktop: intern("_NET_CURRENT_DESKTOP")?,
            net_desktop_names: intern("_NET_DESKTOP_NAMES")?,
            net_active_window: intern("_NET_ACTIVE_WINDOW")?,
            net_close_window: intern("_NET_CLOSE_WINDOW")?,
            net_wm_name: intern("_NET_WM_NAME")?,
            net_wm_visible_name: intern("_NET_WM_VISIBLE_NAME")?,
            net_wm_icon_name: intern("_NET_WM_ICON_NAME")?,
            net_wm_desktop: intern("_NET_WM_DESKTOP")?,
            net_wm_pid: intern("_NET_WM_PID")?,
            net_wm_ping: intern("_NET_WM_PING")?,
            net_wm_sync_request: intern("_NET_WM_SYNC_REQUEST")?,
            net_wm_sync_request_counter: intern("_NET_WM_SYNC_REQUEST_COUNTER")?,
            net_wm_user_time: intern("_NET_WM_USER_TIME")?,
            net_startup_id: intern("_NET_STARTUP_ID")?,
            net_wm_icon: intern("_NET_WM_ICON")?,
            net_frame_extents: intern("_NET_FRAME_EXTENTS")?,
            net_wm_strut: intern("_NET_WM_STRUT")?,
            net_wm_strut_partial: intern("_NET_WM_STRUT_PARTIAL")?,
            gtk_frame_extents: intern("_GTK_FRAME_EXTENTS")?,

            net_wm_window_type: intern("_NET_WM_WINDOW_TYPE")?,
            net_wm_window_type_normal: intern("_NET_WM_WINDOW_TYPE_NORMAL")?,
            net_wm_window_type_desktop: intern("_NET_WM_WINDOW_TYPE_DESKTOP")?,
            net_wm_window_type_dock: intern("_NET_WM_WINDOW_TYPE_DOCK")?,
            net_wm_window_type_toolbar: intern("_NET_WM_WINDOW_TYPE_TOOLBAR")?,
            net_wm_window_type_menu: intern("_NET_WM_WINDOW_TYPE_MENU")?,
            net_wm_window_type_dialog: intern("_NET_WM_WINDOW_TYPE_DIALOG")?,
            net_wm_window_type_utility: intern("_NET_WM_WINDOW_TYPE_UTILITY")?,
            net_wm_window_type_splash: intern("_NET_WM_WINDOW_TYPE_SPLASH")?,
            net_wm_window_type_dropdown_menu: intern("_NET_WM_WINDOW_TYPE_DROPDOWN_MENU")?,
            net_wm_window_type_popup_menu: intern("_NET_WM_WINDOW_TYPE_POPUP_MENU")?,
            net_wm_window_type_tooltip: intern("_NET_WM_WINDOW_TYPE_TOOLTIP")?,
            net_wm_window_type_notification: intern("_NET_WM_WINDOW_TYPE_NOTIFICATION")?,
            net_wm_window_type_combo: intern("_NET_WM_WINDOW_TYPE_COMBO")?,
            net_wm_window_type_dnd: intern("_NET_WM_WINDOW_TYPE_DND")?,
            kde_net_wm_window_type_override: intern("_KDE_NET_WM_WINDOW_TYPE_OVERRIDE")?,
            kde_net_wm_window_type_topmenu: intern("_KDE_NET_WM_WINDOW_TYPE_TOPMENU")?,
            kde_net_wm_window_type_on_screen_display: intern("_KDE_NET_WM_WINDOW_TYPE_ON_SCREEN_DISPLAY")?,
            kde_net_wm_window_type_critical_notification: intern("_KDE_NET_WM_WINDOW_TYPE_CRITICAL_NOTIFICATION")?,

            net_wm_state: intern("_NET_WM_STATE")?,
            net_wm_state_modal: intern("_NET_WM_STATE_MODAL")?,
            net_wm_state_sticky: intern("_NET_WM_STATE_STICKY")?,
            net_wm_state_maximized_vert: intern("_NET_WM_STATE_MAXIMIZED_VERT")?,
            net_wm_state_maximized_horz: intern("_NET_WM_STATE_MAXIMIZED_HORZ")?,
            net_wm_state_shaded: intern("_NET_WM_STATE_SHADED")?,
            net_wm_state_skip_taskbar: intern("_NET_WM_STATE_SKIP_TASKBAR")?,
            net_wm_state_skip_pager: intern("_NET_WM_STATE_SKIP_PAGER")?,
            kde_net_wm_state_skip_switcher: intern("_KDE_NET_WM_STATE_SKIP_SWITCHER")?,
            net_wm_state_hidden: intern("_NET_WM_STATE_HIDDEN")?,
            net_wm_state_fullscreen: intern("_NET_WM_STATE_FULLSCREEN")?,
            net_wm_state_above: intern("_NET_WM_STATE_ABOVE")?,
            net_wm_state_below: intern("_NET_WM_STATE_BELOW")?,
            net_wm_state_demands_attention: intern("_NET_WM_STATE_DEMANDS_ATTENTION")?,

            net_wm_allowed_actions: intern("_NET_WM_ALLOWED_ACTIONS")?,
            net_wm_action_move: intern("_NET_WM_ACTION_MOVE")?,
            net_wm_action_resize: intern("_NET_WM_ACTION_RESIZE")?,
            net_wm_action_minimize: intern("_NET_WM_ACTION_MINIMIZE")?,
            net_wm_action_shade: intern("_NET_WM_ACTION_SHADE")?,
            net_wm_action_stick: intern("_NET_WM_ACTION_STICK")?,
            net_wm_action_maximize_vert: intern("_NET_WM_ACTION_MAXIMIZE_VERT")?,
            net_wm_action_maximize_horz: intern("_NET_WM_ACTION_MAXIMIZE_HORZ")?,
            net_wm_action_fullscreen: intern("_NET_WM_ACTION_FULLSCREEN")?,
            net_wm_action_change_desktop: intern("_NET_WM_ACTION_CHANGE_DESKTOP")?,
            net_wm_action_close: intern("_NET_WM_ACTION_CLOSE")?,

            kde_net_wm_activities: intern("_KDE_NET_WM_ACTIVITIES")?,
            kde_net_wm_screen_edge_show: intern("_KDE_NET_WM_SCREEN_EDGE_SHOW")?,
            kde_net_wm_appmenu_service_name: intern("_KDE_NET_WM_APPMENU_SERVICE_NAME")?,
            kde_net_wm_appmenu_object_path: intern("_KDE_NET_WM_APPMENU_OBJECT_PATH")?,
            kde_net_wm_desktop_file: intern("_KDE_NET_WM_DESKTOP_FILE")?,
            kde_net_wm_color_scheme: intern("_KDE_NET_WM_COLOR_SCHEME")?,
            kde_net_wm_skip_close_animation: intern("_KDE_NET_WM_SKIP_CLOSE_ANIMATION")?,
            kde_first_in_windowlist: intern("_KDE_FIRST_IN_WINDOWLIST")?,
        })
    }

    /// Window type from a _NET_WM_WINDOW_TYPE list; the first known entry wins
    pub fn window_type(&self, types: &[Atom]) -> WindowType {
        for &atom in types {
            let t = match atom {
                a if a == self.net_wm_window_type_normal => WindowType::Normal,
                a if a == self.net_wm_window_type_desktop => WindowType::Desktop,
                a if a == self.net_wm_window_type_dock => WindowType::Dock,
                a if a == self.net_wm_window_type_toolbar => WindowType::Toolbar,
                a if a == self.net_wm_window_type_menu => WindowType::Menu,
                a if a == self.net_wm_window_type_dialog => WindowType::Dialog,
                a if a == self.net_wm_window_type_utility => WindowType::Utility,
                a if a == self.net_wm_window_type_splash => WindowType::Splash,
                a if a == self.net_wm_window_type_dropdown_menu => WindowType::DropdownMenu,
                a if a == self.net_wm_window_type_popup_menu => WindowType::PopupMenu,
                a if a == self.net_wm_window_type_tooltip => WindowType::Tooltip,
                a if a == self.net_wm_window_type_notification => WindowType::Notification,
                a if a == self.net_wm_window_type_combo => WindowType::ComboBox,
                a if a == self.net_wm_window_type_dnd => WindowType::DndIcon,
                a if a == self.kde_net_wm_window_type_topmenu => WindowType::TopMenu,
                a if a == self.kde_net_wm_window_type_on_screen_display => WindowType::OnScreenDisplay,
                a if a == self.kde_net_wm_window_type_critical_notification => {
                    WindowType::CriticalNotification
                }
                // Override is a hint for borderless normal windows
                a if a == self.kde_net_wm_window_type_override => WindowType::Normal,
                _ => continue,
            };
            return t;
        }
        WindowType::Unknown
    }

    pub fn net_state_atoms(&self) -> [(NetState, Atom); 13] {
        [
            (NetState::MODAL, self.net_wm_state_modal),
            (NetState::STICKY, self.net_wm_state_sticky),
            (NetState::MAX_VERT, self.net_wm_state_maximized_vert),
            (NetState::MAX_HORIZ, self.net_wm_state_maximized_horz),
            (NetState::SHADED, self.net_wm_state_shaded),
            (NetState::SKIP_TASKBAR, self.net_wm_state_skip_taskbar),
            (NetState::SKIP_PAGER, self.net_wm_state_skip_pager),
            (NetState::SKIP_SWITCHER, self.kde_net_wm_state_skip_switcher),
            (NetState::HIDDEN, self.net_wm_state_hidden),
            (NetState::FULLSCREEN, self.net_wm_state_fullscreen),
            (NetState::KEEP_ABOVE, self.net_wm_state_above),
            (NetState::KEEP_BELOW, self.net_wm_state_below),
            (NetState::DEMANDS_ATTENTION, self.net_wm_state_demands_attention),
        ]
    }

    pub fn net_state(&self, atoms: &[Atom]) -> NetState {
        self.net_state_atoms()
            .into_iter()
            .filter(|(_, atom)| atoms.contains(atom))
            .fold(NetState::empty(), |acc, (flag, _)| acc | flag)
    }

    /// The state flag one _NET_WM_STATE atom stands for
    pub fn net_state_flag(&self, atom: Atom) -> Option<NetState> {
        self.net_state_atoms()
            .into_iter()
            .find(|(_, a)| *a == atom)
            .map(|(flag, _)| flag)
    }

    pub fn net_state_to_atoms(&self, state: NetState) -> Vec<Atom> {
        self.net_state_atoms()
            .into_iter()
            .filter(|(flag, _)| state.contains(*flag))
            .map(|(_, atom)| atom)
            .collect()
    }

    pub fn allowed_actions_to_atoms(&self, actions: AllowedActions) -> Vec<Atom> {
        [
            (AllowedActions::MOVE, self.net_wm_action_move),
            (AllowedActions::RESIZE, self.net_wm_action_resize),
            (AllowedActions::MINIMIZE, self.net_wm_action_minimize),
            (AllowedActions::SHADE, self.net_wm_action_shade),
            (AllowedActions::STICK, self.net_wm_action_stick),
            (AllowedActions::MAX_VERT, self.net_wm_action_maximize_vert),
            (AllowedActions::MAX_HORIZ, self.net_wm_action_maximize_horz),
            (AllowedActions::FULLSCREEN, self.net_wm_action_fullscreen),
            (AllowedActions::CHANGE_DESKTOP, self.net_wm_action_change_desktop),
            (AllowedActions::CLOSE, self.net_wm_action_close),
        ]
        .into_iter()
        .filter(|(flag, _)| actions.contains(*flag))
        .map(|(_, atom)| atom)
        .collect()
    }

    pub fn protocols(&self, atoms: &[Atom]) -> Protocols {
        let mut protocols = Protocols::empty();
        for &atom in atoms {
            match atom {
                a if a == self.wm_delete_window => protocols |= Protocols::DELETE,
                a if a == self.wm_take_focus => protocols |= Protocols::TAKE_FOCUS,
                a if a == self.net_wm_ping => protocols |= Protocols::PING,
                a if a == self.net_wm_sync_request => protocols |= Protocols::SYNC_REQUEST,
                a if a == self.wm_context_help => protocols |= Protocols::CONTEXT_HELP,
                _ => {}
            }
        }
        protocols
    }

    /// Advertised in _NET_SUPPORTED
    pub fn supported(&self) -> Vec<Atom> {
        let mut supported = vec![
            self.net_supported,
            self.net_supporting_wm_check,
            self.net_client_list,
            self.net_number_of_desktops,
            self.net_current_desktop,
            self.net_desktop_names,
            self.net_active_window,
            self.net_close_window,
            self.net_wm_name,
            self.net_wm_visible_name,
            self.net_wm_icon_name,
            self.net_wm_desktop,
            self.net_wm_pid,
            self.net_wm_ping,
            self.net_wm_sync_request,
            self.net_wm_sync_request_counter,
            self.net_wm_user_time,
            self.net_startup_id,
            self.net_wm_icon,
            self.net_frame_extents,
            self.net_wm_strut,
            self.net_wm_strut_partial,
            self.net_wm_window_type,
            self.net_wm_window_type_normal,
            self.net_wm_window_type_desktop,
            self.net_wm_window_type_dock,
            self.net_wm_window_type_toolbar,
            self.net_wm_window_type_menu,
            self.net_wm_window_type_dialog,
            self.net_wm_window_type_utility,
            self.net_wm_window_type_splash,
            self.net_wm_window_type_dropdown_menu,
            self.net_wm_window_type_popup_menu,
            self.net_wm_window_type_tooltip,
            self.net_wm_window_type_notification,
            self.net_wm_window_type_combo,
            self.net_wm_window_type_dnd,
            self.net_wm_state,
            self.net_wm_allowed_actions,
        ];
        supported.extend(self.net_state_atoms().into_iter().map(|(_, atom)| atom));
        supported.extend(self.allowed_actions_to_atoms(AllowedActions::all()));
        supported
    }
}
