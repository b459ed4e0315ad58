//! Focus Module
//!
//! Active window tracking, focus stealing prevention and the focus chain.
//! Whether a window may take focus is decided by an [`Activation`] service;
//! [`FocusManager`] is the built-in policy.

use std::collections::VecDeque;

use tracing::debug;

use crate::wm::Workspace;
use crate::wm::client::ClientId;
use crate::wm::client_flags::{Desktop, Protocols};
use crate::wm::display::{ClientMessage, Timestamp, timestamp_compare};
use crate::wm::events::ClientEvent;
use crate::wm::transients::SameApplicationChecks;

/// What the activation policy gets to know about a window asking for focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationQuery {
    pub client: ClientId,
    /// `_NET_WM_USER_TIME`; zero means "do not focus me"
    pub user_time: Option<Timestamp>,
    pub has_active: bool,
    /// Belongs to the same application as the active window
    pub same_app_as_active: bool,
    /// Restored from a session, where focus always follows the saved state
    pub session_active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusChainChange {
    MakeFirst,
    MakeLast,
    Update,
}

pub trait Activation {
    fn allow_activation(&self, query: &ActivationQuery) -> bool;

    fn update_focus_chain(&mut self, client: ClientId, change: FocusChainChange);

    fn remove(&mut self, client: ClientId);

    /// Record user interaction with the active window
    fn update_user_time(&mut self, _time: Timestamp) {}
}

/// Focus history plus timestamp based focus stealing prevention
#[derive(Debug, Clone)]
pub struct FocusManager {
    /// Most recently focused first
    pub focus_history: VecDeque<ClientId>,
    pub max_history_size: usize,
    pub prevent_focus_stealing: bool,
    pub last_user_time: Option<Timestamp>,
}

impl FocusManager {
    pub fn new(prevent_focus_stealing: bool) -> Self {
        Self {
            focus_history: VecDeque::new(),
            max_history_size: 64,
            prevent_focus_stealing,
            last_user_time: None,
        }
    }

    pub fn history(&self) -> &VecDeque<ClientId> {
        &self.focus_history
    }
}

impl Default for FocusManager {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Activation for FocusManager {
    fn allow_activation(&self, q: &ActivationQuery) -> bool {
        if q.session_active || !self.prevent_focus_stealing || !q.has_active {
            return true;
        }
        if q.user_time == Some(0) {
            return false;
        }
        if q.same_app_as_active {
            return true;
        }
        match (q.user_time, self.last_user_time) {
            (Some(time), Some(last)) => timestamp_compare(time, last).is_ge(),
            (Some(_), None) => true,
            (None, _) => false,
        }
    }

    fn update_focus_chain(&mut self, client: ClientId, change: FocusChainChange) {
        match change {
            FocusChainChange::MakeFirst => {
                self.focus_history.retain(|c| *c != client);
                self.focus_history.push_front(client);
            }
            FocusChainChange::MakeLast => {
                self.focus_history.retain(|c| *c != client);
                self.focus_history.push_back(client);
            }
            FocusChainChange::Update => {
                if !self.focus_history.contains(&client) {
                    self.focus_history.push_back(client);
                }
            }
        }
        while self.focus_history.len() > self.max_history_size {
            self.focus_history.pop_back();
        }
    }

    fn remove(&mut self, client: ClientId) {
        self.focus_history.retain(|c| *c != client);
    }

    fn update_user_time(&mut self, time: Timestamp) {
        if time != 0 {
            self.last_user_time = Some(time);
        }
    }
}

impl Workspace {
    pub fn active_client(&self) -> Option<ClientId> {
        self.active
    }

    pub fn set_active(&mut self, id: Option<ClientId>) {
        if id == self.active {
            return;
        }
        if let Some(new) = id {
            if !self.clients.contains_key(&new) {
                return;
            }
        }
        let old = std::mem::replace(&mut self.active, id);
        if let Some(deco) = old.and_then(|o| self.clients.get_mut(&o)).and_then(|c| c.decoration.as_mut()) {
            deco.set_active(false);
        }
        if let Some(new) = id {
            if let Some(c) = self.clients.get_mut(&new) {
                if let Some(deco) = c.decoration.as_mut() {
                    deco.set_active(true);
                }
                if let Some(time) = c.user_time {
                    self.services.activation.update_user_time(time);
                }
            }
            self.most_recently_activated = Some(new);
            self.services.activation.update_focus_chain(new, FocusChainChange::MakeFirst);
            self.demand_attention(new, false);
        }
        debug!("Active window {:?} -> {:?}", old, id);
        for changed in [old, id].into_iter().flatten() {
            // Fullscreen windows only sit in the active layer while focused
            self.update_layer(changed);
        }
        self.events.push(ClientEvent::ActiveChanged(id));
    }

    /// Give input focus to nobody
    pub fn focus_to_null(&mut self) {
        let display = &self.services.display;
        display.set_input_focus(display.root(), display.server_time());
        self.set_active(None);
    }

    /// Hand input focus to the window the way it asked for it
    pub fn take_focus(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let time = self.services.display.server_time();
        let window = c.window;
        let take_focus_protocol = c.protocols.contains(Protocols::TAKE_FOCUS);
        if c.rules.check_accept_focus(c.input_hint) {
            self.services.display.set_input_focus(window, time);
        } else {
            // Cannot take input, at least drop the urgency
            self.demand_attention(id, false);
        }
        if take_focus_protocol {
            self.services
                .display
                .send_client_message(window, ClientMessage::TakeFocus { timestamp: time });
        }
    }

    /// Bring the window forward: unminimize, switch to its desktop, focus
    pub fn activate_client(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let desktop = c.desktop;
        let minimized = c.minimized;
        if minimized {
            self.unminimize(id);
        }
        if let Desktop::Number(n) = desktop {
            if n != self.current_desktop {
                self.set_current_desktop(n);
            }
        }
        self.take_focus(id);
        self.set_active(Some(id));
    }

    pub fn demand_attention(&mut self, id: ClientId, set: bool) {
        let set = set && self.active != Some(id);
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if c.demands_attention == set {
            return;
        }
        c.demands_attention = set;
        self.export_net_state(id);
        self.events.push(ClientEvent::DemandsAttention { client: id, demands: set });
    }

    /// The most recently activated window got a modal transient; hand the
    /// focus over to it once it is managed
    pub fn check_active_modal(&mut self) {
        let Some(main) = self.most_recently_activated else {
            return;
        };
        if !self.clients.get(&main).is_some_and(|c| c.check_active_modal) {
            return;
        }
        if let Some(modal) = self.find_modal(main, false) {
            if modal != main {
                if !self.clients.get(&modal).is_some_and(|c| c.managed) {
                    // Checked again at the end of manage()
                    return;
                }
                self.activate_client(modal);
            }
        }
        if let Some(c) = self.clients.get_mut(&main) {
            c.check_active_modal = false;
        }
    }

    pub(crate) fn activation_query(&self, id: ClientId, session_active: bool) -> ActivationQuery {
        let user_time = self.clients.get(&id).and_then(|c| c.user_time);
        let same_app_as_active = self.active.is_some_and(|a| {
            self.belongs_to_same_application(id, a, SameApplicationChecks::RELAXED_FOR_ACTIVE)
        });
        ActivationQuery {
            client: id,
            user_time,
            has_active: self.active.is_some(),
            same_app_as_active,
            session_active,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::testing::{TestSetup, WindowSpec};

    fn query(user_time: Option<Timestamp>) -> ActivationQuery {
        ActivationQuery {
            client: ClientId::from_raw(1),
            user_time,
            has_active: true,
            same_app_as_active: false,
            session_active: false,
        }
    }

    #[test]
    fn test_focus_stealing_uses_wrapping_time() {
        let mut fm = FocusManager::default();
        fm.update_user_time(0xFFFF_FFF0);
        assert!(fm.allow_activation(&query(Some(0x5))));
        assert!(!fm.allow_activation(&query(Some(0xFFFF_FF00))));
        assert!(!fm.allow_activation(&query(Some(0))));
        assert!(!fm.allow_activation(&query(None)));
    }

    #[test]
    fn test_focus_chain_order() {
        let mut fm = FocusManager::default();
        let (a, b) = (ClientId::from_raw(1), ClientId::from_raw(2));
        fm.update_focus_chain(a, FocusChainChange::Update);
        fm.update_focus_chain(b, FocusChainChange::MakeFirst);
        assert_eq!(fm.history().front(), Some(&b));
        fm.update_focus_chain(b, FocusChainChange::MakeLast);
        assert_eq!(fm.history().front(), Some(&a));
        fm.remove(a);
        assert_eq!(fm.history().len(), 1);
    }

    #[test]
    fn test_activation_clears_attention() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        t.ws.demand_attention(id, true);
        assert!(t.ws.client(id).unwrap().demands_attention);
        t.ws.set_active(Some(id));
        assert!(!t.ws.client(id).unwrap().demands_attention);
        assert_eq!(t.ws.active_client(), Some(id));
    }

    #[test]
    fn test_modal_of_active_window_gets_activated() {
        let mut t = TestSetup::new();
        let main = t.manage(WindowSpec::normal(0x100));
        t.ws.set_active(Some(main));
        let modal = t.manage(WindowSpec::normal(0x200).transient_for(0x100).modal());
        assert_eq!(t.ws.active_client(), Some(modal));
    }
}
