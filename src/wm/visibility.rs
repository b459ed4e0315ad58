//! Visibility Module
//!
//! Withdrawn/Unmapped/Mapped/Kept mapping state. Which state a window should
//! be in is decided by [`compute_visibility`] from a snapshot of every input;
//! the `internal_*` transitions are idempotent so recomputing twice never
//! maps or unmaps twice.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::wm::Workspace;
use crate::wm::client::ClientId;
use crate::wm::client_flags::{Desktop, MappingState, WindowType, WmState};
use crate::wm::events::ClientEvent;
use crate::wm::properties::NULL_ACTIVITY;

/// When to keep hidden windows mapped for the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HiddenPreviews {
    Never,
    /// Only windows on other desktops or activities
    #[default]
    Shown,
    /// Also minimized and hidden windows
    Always,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityInputs {
    pub deleting: bool,
    pub hidden: bool,
    pub minimized: bool,
    pub on_current_desktop: bool,
    pub on_current_activity: bool,
    pub compositing: bool,
    pub previews: HiddenPreviews,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Show,
    Hide,
    Keep,
}

/// Target state for a window, `None` while it is being deleted
pub fn compute_visibility(i: &VisibilityInputs) -> Option<Visibility> {
    if i.deleting {
        return None;
    }
    if i.hidden || i.minimized {
        return Some(if i.compositing && i.previews == HiddenPreviews::Always {
            Visibility::Keep
        } else {
            Visibility::Hide
        });
    }
    if !i.on_current_desktop || !i.on_current_activity {
        return Some(if i.compositing && i.previews != HiddenPreviews::Never {
            Visibility::Keep
        } else {
            Visibility::Hide
        });
    }
    Some(Visibility::Show)
}

/// Parse an activities property; empty or the null id means all activities
pub fn parse_activities(raw: Option<&str>) -> Vec<String> {
    match raw.map(str::trim) {
        None | Some("") | Some(NULL_ACTIVITY) => Vec::new(),
        Some(list) => list
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty() && *a != NULL_ACTIVITY)
            .map(str::to_string)
            .collect(),
    }
}

/// Drop unknown activities; a list covering every known one means all
pub fn normalize_activities(known: &[String], mut list: Vec<String>) -> Vec<String> {
    if !known.is_empty() {
        list.retain(|a| known.contains(a));
    }
    let covers_all = !known.is_empty() && known.iter().all(|a| list.contains(a));
    if list.is_empty() || covers_all {
        list.clear();
    }
    list
}

impl Workspace {
    pub fn is_on_current_desktop(&self, id: ClientId) -> bool {
        self.clients
            .get(&id)
            .is_some_and(|c| c.is_on_desktop(self.current_desktop))
    }

    pub fn is_on_current_activity(&self, id: ClientId) -> bool {
        self.clients
            .get(&id)
            .is_some_and(|c| c.is_on_activity(self.current_activity.as_deref()))
    }

    pub fn visibility_inputs(&self, id: ClientId) -> Option<VisibilityInputs> {
        let c = self.clients.get(&id)?;
        Some(VisibilityInputs {
            deleting: c.deleting,
            hidden: c.hidden,
            minimized: c.minimized,
            on_current_desktop: c.is_on_desktop(self.current_desktop),
            on_current_activity: c.is_on_activity(self.current_activity.as_deref()),
            compositing: self.compositing,
            previews: self.config.behavior.hidden_previews,
        })
    }

    pub fn update_visibility(&mut self, id: ClientId) {
        if !self.clients.get(&id).is_some_and(|c| c.managed) {
            // manage() runs the first evaluation once everything is set up
            return;
        }
        let Some(target) = self.visibility_inputs(id).and_then(|i| compute_visibility(&i)) else {
            return;
        };
        if let Some(c) = self.clients.get_mut(&id) {
            // Owner-hidden windows never show up in taskbars
            c.skip_taskbar = c.original_skip_taskbar || c.hidden;
        }
        self.export_net_state(id);
        match target {
            Visibility::Show => self.internal_show(id),
            Visibility::Hide => self.internal_hide(id),
            Visibility::Keep => self.internal_keep(id),
        }
    }

    pub(crate) fn internal_show(&mut self, id: ClientId) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let old = c.mapping_state;
        if old == MappingState::Mapped {
            return;
        }
        c.mapping_state = MappingState::Mapped;
        if matches!(old, MappingState::Unmapped | MappingState::Withdrawn) {
            self.map(id);
        }
        if old == MappingState::Kept {
            self.update_hidden_preview(id);
        }
        self.events.push(ClientEvent::Shown(id));
    }

    pub(crate) fn internal_hide(&mut self, id: ClientId) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let old = c.mapping_state;
        if old == MappingState::Unmapped {
            return;
        }
        c.mapping_state = MappingState::Unmapped;
        let region = c.frame_geometry;
        if matches!(old, MappingState::Mapped | MappingState::Kept) {
            self.unmap(id);
        }
        if old == MappingState::Kept {
            self.update_hidden_preview(id);
        }
        self.events.push(ClientEvent::Hidden(id));
        self.events.push(ClientEvent::Repaint(region));
    }

    pub(crate) fn internal_keep(&mut self, id: ClientId) {
        debug_assert!(self.compositing, "kept for preview without compositing");
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let old = c.mapping_state;
        if old == MappingState::Kept {
            return;
        }
        c.mapping_state = MappingState::Kept;
        let region = c.frame_geometry;
        if matches!(old, MappingState::Unmapped | MappingState::Withdrawn) {
            self.map(id);
        }
        self.update_hidden_preview(id);
        if self.active == Some(id) {
            // A kept window must not hold on to focus
            self.focus_to_null();
        }
        self.events.push(ClientEvent::Repaint(region));
    }

    /// Map the frame hierarchy. A shaded window only shows its frame.
    fn map(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let Some(frame) = c.frame else {
            return;
        };
        let display = &self.services.display;
        display.map_window(frame.frame);
        if c.is_shade() {
            self.export_mapping_state(id, WmState::Iconic);
        } else {
            display.map_window(frame.wrapper);
            display.map_window(c.window);
            self.export_mapping_state(id, WmState::Normal);
        }
    }

    fn unmap(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let Some(frame) = c.frame else {
            return;
        };
        let display = &self.services.display;
        display.unmap_window(frame.frame);
        display.unmap_window(frame.wrapper);
        display.unmap_window(c.window);
        self.export_mapping_state(id, WmState::Iconic);
    }

    pub fn export_mapping_state(&self, id: ClientId, state: WmState) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        self.services.display.set_wm_state(c.window, state);
    }

    pub fn export_net_state(&self, id: ClientId) {
        if let Some(c) = self.clients.get(&id) {
            self.services.display.set_net_state(c.window, c.net_state());
        }
    }

    /// Owner-initiated hide, independent of minimize
    pub fn hide_client(&mut self, id: ClientId, hide: bool) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if c.hidden == hide {
            return;
        }
        c.hidden = hide;
        self.update_visibility(id);
    }

    pub fn wants_tab_focus(&self, id: ClientId) -> bool {
        self.clients.get(&id).is_some_and(|c| {
            matches!(c.window_type(), WindowType::Normal | WindowType::Dialog) && c.wants_input()
        })
    }

    pub fn is_minimizable(&self, id: ClientId) -> bool {
        let Some(c) = self.clients.get(&id) else {
            return false;
        };
        if c.is_special_window() && !c.is_transient() {
            return false;
        }
        if !c.rules.check_minimize(true, false) {
            return false;
        }
        if c.is_transient() {
            let main_shown = self
                .main_clients(id)
                .iter()
                .any(|m| self.clients.get(m).is_some_and(|mc| mc.is_shown()));
            if !main_shown {
                return true;
            }
        }
        if c.transient_for.is_some() {
            return false;
        }
        self.wants_tab_focus(id)
    }

    pub fn minimize(&mut self, id: ClientId) {
        if !self.is_minimizable(id) {
            return;
        }
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if c.minimized || !c.rules.check_minimize(true, false) {
            return;
        }
        debug!("Minimizing window {:#x}", c.window);
        c.minimized = true;
        self.update_visibility(id);
        self.update_allowed_actions(id, false);
        self.events.push(ClientEvent::MinimizedChanged { client: id, minimized: true });
        self.update_minimized_of_transients(id);
    }

    pub fn unminimize(&mut self, id: ClientId) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if !c.minimized || c.rules.check_minimize(false, false) {
            return;
        }
        debug!("Unminimizing window {:#x}", c.window);
        c.minimized = false;
        self.update_visibility(id);
        self.update_allowed_actions(id, false);
        self.events.push(ClientEvent::MinimizedChanged { client: id, minimized: false });
        self.update_minimized_of_transients(id);
    }

    /// Transients follow their main windows in and out of minimized state
    fn update_minimized_of_transients(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let minimized = c.minimized;
        for t in c.transients.clone() {
            let Some(tc) = self.clients.get(&t) else {
                continue;
            };
            if tc.minimized == minimized || (tc.is_special_window() && !tc.is_transient()) {
                continue;
            }
            if minimized {
                let all_mains_minimized = self
                    .main_clients(t)
                    .iter()
                    .all(|m| self.clients.get(m).is_none_or(|mc| mc.minimized));
                if all_mains_minimized {
                    self.minimize(t);
                }
            } else {
                self.unminimize(t);
            }
        }
    }

    /// Move a window to `desktop`, clamped to the valid range
    pub fn set_desktop(&mut self, id: ClientId, desktop: Desktop) {
        let count = self.desktop_count;
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let desktop = match c.rules.check_desktop(desktop, false) {
            Desktop::All => Desktop::All,
            Desktop::Number(n) => Desktop::Number(n.clamp(1, count.max(1))),
        };
        if c.desktop == desktop {
            return;
        }
        c.desktop = desktop;
        let window = c.window;
        let transients = c.transients.clone();
        self.services.display.set_desktop(window, desktop);
        self.events.push(ClientEvent::DesktopChanged(id));
        self.export_net_state(id);
        self.update_visibility(id);
        for t in transients {
            if self.clients.get(&t).is_some_and(|tc| tc.transient_for == Some(id)) {
                self.set_desktop(t, desktop);
            }
        }
    }

    pub fn set_on_all_desktops(&mut self, id: ClientId, on: bool) {
        let desktop = if on { Desktop::All } else { Desktop::Number(self.current_desktop) };
        self.set_desktop(id, desktop);
    }

    /// Assign activities; an empty list or one covering every known
    /// activity means "all activities"
    pub fn set_on_activities(&mut self, id: ClientId, activities: Vec<String>) {
        let known = self.activities.clone();
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let list = normalize_activities(&known, c.rules.check_activities(activities, false));
        if c.activities == list {
            return;
        }
        c.activities = list;
        let window = c.window;
        let value = if c.activities.is_empty() {
            NULL_ACTIVITY.to_string()
        } else {
            c.activities.join(",")
        };
        self.services.display.set_activities(window, &value);
        self.events.push(ClientEvent::ActivitiesChanged(id));
        self.update_visibility(id);
    }

    /// The activities property of the window changed
    pub fn check_activities(&mut self, id: ClientId, raw: Option<&str>) {
        self.set_on_activities(id, parse_activities(raw));
    }

    pub fn set_current_desktop(&mut self, desktop: u32) {
        let desktop = desktop.clamp(1, self.desktop_count.max(1));
        if desktop == self.current_desktop {
            return;
        }
        debug!("Switching to desktop {}", desktop);
        self.current_desktop = desktop;
        for id in self.client_ids() {
            self.update_visibility(id);
        }
    }

    pub fn set_current_activity(&mut self, activity: Option<String>) {
        if activity == self.current_activity {
            return;
        }
        self.current_activity = activity;
        for id in self.client_ids() {
            self.update_visibility(id);
        }
    }

    pub fn set_compositing(&mut self, on: bool) {
        if on == self.compositing {
            return;
        }
        debug!("Compositing {}", if on { "enabled" } else { "disabled" });
        self.compositing = on;
        for id in self.client_ids() {
            self.update_visibility(id);
        }
    }

    /// Keep-above and keep-below exclude each other
    pub fn set_keep_above(&mut self, id: ClientId, on: bool) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let on = c.rules.check_keep_above(on, false);
        if c.keep_above == on {
            return;
        }
        c.keep_above = on;
        if on {
            c.keep_below = false;
        }
        self.export_net_state(id);
        self.update_layer(id);
    }

    pub fn set_keep_below(&mut self, id: ClientId, on: bool) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let on = c.rules.check_keep_below(on, false);
        if c.keep_below == on {
            return;
        }
        c.keep_below = on;
        if on {
            c.keep_above = false;
        }
        self.export_net_state(id);
        self.update_layer(id);
    }

    pub fn set_skip_taskbar(&mut self, id: ClientId, on: bool) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let on = c.rules.check_skip_taskbar(on, false);
        if c.original_skip_taskbar == on {
            return;
        }
        c.original_skip_taskbar = on;
        // Hidden windows stay out of the taskbar regardless
        c.skip_taskbar = on || c.hidden;
        self.export_net_state(id);
    }

    pub fn set_skip_pager(&mut self, id: ClientId, on: bool) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.skip_pager = c.rules.check_skip_pager(on, false);
        self.export_net_state(id);
    }

    pub fn set_skip_switcher(&mut self, id: ClientId, on: bool) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.skip_switcher = c.rules.check_skip_switcher(on, false);
        self.export_net_state(id);
    }
}
