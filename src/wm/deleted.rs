//! Deleted windows
//!
//! Snapshot of a window that was released or destroyed, kept alive while
//! observers (close animations, rule cleanup) still hold references.

use std::fmt;

use tracing::debug;

use crate::shared::Geometry;
use crate::wm::Workspace;
use crate::wm::client::{Client, ClientId};
use crate::wm::client_flags::{Desktop, WindowType};
use crate::wm::display::XWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeletedId(u64);

impl fmt::Display for DeletedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "deleted#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Deleted {
    pub id: DeletedId,
    pub client: ClientId,
    pub window: XWindow,
    pub frame_geometry: Geometry,
    pub buffer_geometry: Geometry,
    pub caption: String,
    pub desktop: Desktop,
    pub activities: Vec<String>,
    pub window_type: WindowType,
    pub was_transient: bool,
    pub skip_close_animation: bool,
    pub refcount: u32,
}

impl Deleted {
    fn snapshot(id: DeletedId, c: &Client) -> Self {
        Self {
            id,
            client: c.id,
            window: c.window,
            frame_geometry: c.frame_geometry,
            buffer_geometry: c.buffer_geometry,
            caption: c.caption(),
            desktop: c.desktop,
            activities: c.activities.clone(),
            window_type: c.window_type(),
            was_transient: c.is_transient(),
            skip_close_animation: c.skip_close_animation,
            // One reference for the Closed notification
            refcount: 1,
        }
    }
}

impl Workspace {
    pub fn deleted(&self, id: DeletedId) -> Option<&Deleted> {
        self.deleted.get(&id)
    }

    /// Snapshot `client`; the returned placeholder holds one reference for
    /// the Closed notification and one for the releasing window.
    pub(crate) fn create_deleted(&mut self, client: ClientId) -> Option<DeletedId> {
        let c = self.clients.get(&client)?;
        let id = DeletedId(self.next_deleted);
        self.next_deleted += 1;
        let mut deleted = Deleted::snapshot(id, c);
        deleted.refcount += 1;
        debug!("Created {} for window {:#x}", id, c.window);
        self.deleted.insert(id, deleted);
        Some(id)
    }

    pub fn ref_deleted(&mut self, id: DeletedId) {
        if let Some(d) = self.deleted.get_mut(&id) {
            d.refcount += 1;
        }
    }

    /// Drop one reference; the placeholder is freed with the last one
    pub fn unref_deleted(&mut self, id: DeletedId) {
        let Some(d) = self.deleted.get_mut(&id) else {
            return;
        };
        d.refcount = d.refcount.saturating_sub(1);
        if d.refcount == 0 {
            debug!("Dropping {}", id);
            self.deleted.remove(&id);
        }
    }
}
