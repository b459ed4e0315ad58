//! Window Client Module
//!
//! Lifecycle of managed windows: manage and release, visibility, grouping and
//! transiency, liveness, resize synchronization and deferred geometry.
//!
//! All state lives in one [`Workspace`]. Every operation is a method on it and
//! takes `&mut self`, so there is no hidden global; the X11 driver (or a test)
//! owns the workspace, feeds it server events and drains [`ClientEvent`]s.

pub mod actions;
pub mod caption;
pub mod client;
pub mod client_flags;
pub mod decorations;
pub mod deleted;
pub mod display;
pub mod events;
pub mod focus;
pub mod geometry;
pub mod group;
pub mod hints;
pub mod manage;
pub mod placement;
pub mod properties;
pub mod rules;
pub mod session;
pub mod shade;
pub mod startup;
pub mod sync;
pub mod terminate;
pub mod timers;
pub mod transients;
pub mod visibility;

#[cfg(test)]
pub(crate) mod testing;

use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, warn};

use crate::config::Config;
use crate::shared::Point;
use crate::wm::client::{Client, ClientId};
use crate::wm::decorations::{DecorationFactory, ThemeDecorations};
use crate::wm::deleted::{Deleted, DeletedId};
use crate::wm::display::{Display, XWindow};
use crate::wm::events::ClientEvent;
use crate::wm::focus::{Activation, FocusManager};
use crate::wm::geometry::Output;
use crate::wm::group::{Group, GroupId};
use crate::wm::placement::{Placement, PlacementManager};
use crate::wm::rules::{NoRules, Rules};
use crate::wm::session::{NoSession, SessionStore};
use crate::wm::startup::StartupNotificationManager;
use crate::wm::terminate::{ProcessKiller, SignalKiller};
use crate::wm::timers::{TimerKind, TimerQueue};

pub use manage::ManageError;

/// Collaborators the window core calls out to
pub struct Services {
    pub display: Box<dyn Display>,
    pub rules: Box<dyn Rules>,
    pub placement: Box<dyn Placement>,
    pub activation: Box<dyn Activation>,
    pub decorations: Box<dyn DecorationFactory>,
    pub session: Box<dyn SessionStore>,
    pub killer: Box<dyn ProcessKiller>,
}

impl Services {
    /// Default collaborators for `display`
    pub fn new(display: Box<dyn Display>, config: &Config) -> Self {
        Self {
            display,
            rules: Box::new(NoRules),
            placement: Box::new(PlacementManager::new(config.behavior.placement)),
            activation: Box::new(FocusManager::new(config.behavior.focus_stealing_prevention)),
            decorations: Box::new(ThemeDecorations::new(&config.decorations)),
            session: Box::new(NoSession),
            killer: Box::new(SignalKiller::default()),
        }
    }
}

pub struct Workspace {
    pub clients: HashMap<ClientId, Client>,
    pub(crate) next_client: u64,
    pub groups: HashMap<GroupId, Group>,
    pub(crate) next_group: u64,
    pub(crate) next_member_seq: u64,
    pub deleted: HashMap<DeletedId, Deleted>,
    pub(crate) next_deleted: u64,

    pub timers: TimerQueue,
    /// Clock of the workspace; only moves forward through `advance_to()`
    pub now: Instant,
    pub(crate) events: Vec<ClientEvent>,

    /// 1-based
    pub current_desktop: u32,
    pub desktop_count: u32,
    pub activities: Vec<String>,
    pub current_activity: Option<String>,
    pub outputs: Vec<Output>,
    pub compositing: bool,
    pub pointer: Option<Point>,

    pub active: Option<ClientId>,
    pub most_recently_activated: Option<ClientId>,

    pub config: Config,
    pub services: Services,
    pub startup: StartupNotificationManager,
    pub local_hostname: String,
}

impl Workspace {
    pub fn new(config: Config, services: Services) -> Self {
        let local_hostname = match nix::unistd::gethostname() {
            Ok(name) => name.to_string_lossy().into_owned(),
            Err(e) => {
                warn!("Failed to read local hostname: {}", e);
                String::new()
            }
        };
        debug!("Workspace created on host {:?}", local_hostname);
        Self {
            clients: HashMap::new(),
            next_client: 1,
            groups: HashMap::new(),
            next_group: 1,
            next_member_seq: 0,
            deleted: HashMap::new(),
            next_deleted: 1,
            timers: TimerQueue::new(),
            now: Instant::now(),
            events: Vec::new(),
            current_desktop: 1,
            desktop_count: config.desktops.count.max(1),
            activities: Vec::new(),
            current_activity: None,
            outputs: Vec::new(),
            compositing: config.compositor.enabled,
            pointer: None,
            active: None,
            most_recently_activated: None,
            config,
            services,
            startup: StartupNotificationManager::new(),
            local_hostname,
        }
    }

    pub fn client(&self, id: ClientId) -> Option<&Client> {
        self.clients.get(&id)
    }

    pub fn client_mut(&mut self, id: ClientId) -> Option<&mut Client> {
        self.clients.get_mut(&id)
    }

    /// Managed windows in creation order
    pub fn client_ids(&self) -> Vec<ClientId> {
        let mut ids: Vec<ClientId> = self.clients.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn find_client(&self, window: XWindow) -> Option<ClientId> {
        self.clients
            .values()
            .find(|c| c.window == window)
            .map(|c| c.id)
    }

    /// Lookup by one of the windows created around the client
    pub fn find_client_by_frame(&self, window: XWindow) -> Option<ClientId> {
        self.clients
            .values()
            .find(|c| c.frame.is_some_and(|f| f.frame == window || f.wrapper == window))
            .map(|c| c.id)
    }

    pub fn set_activities(&mut self, activities: Vec<String>, current: Option<String>) {
        debug!("Activities: {:?} (current {:?})", activities, current);
        self.activities = activities;
        self.set_current_activity(current);
    }

    /// Output layout changed; windows are pulled back on screen
    pub fn set_outputs(&mut self, outputs: Vec<Output>) {
        self.outputs = outputs;
        for id in self.client_ids() {
            self.check_workspace_position(id);
        }
    }

    pub fn update_layer(&mut self, id: ClientId) {
        let active = self.active == Some(id);
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if !c.managed {
            return;
        }
        let layer = c.layer(active);
        if c.layer == Some(layer) {
            return;
        }
        c.layer = Some(layer);
        self.events.push(ClientEvent::LayerChanged { client: id, layer });
    }

    /// Move the clock to `now`, firing every timer due on the way in
    /// deadline order
    pub fn advance_to(&mut self, now: Instant) {
        while let Some(expired) = self.timers.pop_due(now) {
            self.now = self.now.max(expired.deadline);
            match expired.kind {
                TimerKind::Ping => self.ping_timeout(expired.client, expired.id),
                TimerKind::SyncTimeout => self.sync_timeout(expired.client, expired.id),
                TimerKind::SyncFailsafe => self.sync_failsafe(expired.client, expired.id),
            }
        }
        self.now = self.now.max(now);
    }

    pub fn next_timer_deadline(&self) -> Option<Instant> {
        self.timers.next_deadline()
    }

    pub fn take_events(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.events)
    }
}
