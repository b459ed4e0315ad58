//! Resize Sync Module
//!
//! _NET_WM_SYNC_REQUEST handling. A resize is only committed on screen once
//! the client has bumped its counter to the requested value. Two timers
//! guard the exchange: a short one that commits an interactive resize
//! anyway, and a failsafe that gives up on sync for good.

use std::time::Duration;

use tracing::{debug, warn};

use crate::shared::{Geometry, Point};
use crate::wm::Workspace;
use crate::wm::client::{ClientId, MoveResize};
use crate::wm::display::ClientMessage;
use crate::wm::events::ClientEvent;
use crate::wm::geometry::ForceGeometry;
use crate::wm::timers::{TimerId, TimerKind};

/// Wraparound-safe `value >= target` for 64-bit sync counters
fn counter_reached(value: u64, target: u64) -> bool {
    (value.wrapping_sub(target) as i64) >= 0
}

impl Workspace {
    /// Ask the client to report when it has redrawn. Never sends while a
    /// request is still unanswered.
    pub fn send_sync_request(&mut self, id: ClientId) {
        let failsafe = Duration::from_millis(self.config.sync.failsafe_timeout_ms);
        let initial = Duration::from_millis(self.config.sync.initial_failsafe_timeout_ms);
        let now = self.now;
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if c.sync.counter.is_none() || c.sync.pending {
            return;
        }
        let delay = if c.ready_for_painting { failsafe } else { initial };
        if let Some(old) = c.sync.failsafe.take() {
            self.timers.cancel(old);
        }
        c.sync.failsafe = Some(self.timers.schedule(now + delay, id, TimerKind::SyncFailsafe));

        c.sync.value = c.sync.value.wrapping_add(1);
        let mut timestamp = self.services.display.server_time();
        if timestamp == c.sync.last_timestamp {
            timestamp = timestamp.wrapping_add(1);
        }
        c.sync.pending = true;
        c.sync.last_timestamp = timestamp;
        let message = ClientMessage::SyncRequest {
            timestamp,
            lo: c.sync.value_lo(),
            hi: c.sync.value_hi(),
        };
        self.services.display.send_client_message(c.window, message);
    }

    /// The client's sync counter reached `value`. The alarm fires once the
    /// counter is at or past the requested value, so overshooting counts.
    pub fn handle_sync_ack(&mut self, id: ClientId, value: u64) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if !c.sync.pending || !counter_reached(value, c.sync.value) {
            return;
        }
        c.sync.pending = false;
        if let Some(timer) = c.sync.failsafe.take() {
            self.timers.cancel(timer);
        }
        let resizing = c.move_resize.is_some();
        if resizing {
            if let Some(timer) = c.sync.timeout.take() {
                self.timers.cancel(timer);
            }
        }
        let frame = c.frame_geometry;
        self.set_ready_for_painting(id);
        if resizing {
            self.perform_interactive_resize(id);
        } else {
            self.events.push(ClientEvent::Repaint(frame));
        }
    }

    /// The client took too long; commit the interactive resize anyway
    pub(crate) fn sync_timeout(&mut self, id: ClientId, timer: TimerId) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if c.sync.timeout != Some(timer) {
            return;
        }
        c.sync.timeout = None;
        self.perform_interactive_resize(id);
    }

    /// The client never answered. Sync stays off for the rest of its life.
    pub(crate) fn sync_failsafe(&mut self, id: ClientId, timer: TimerId) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if c.sync.failsafe != Some(timer) {
            return;
        }
        warn!("Window {:#x} does not answer sync requests, disabling sync", c.window);
        c.sync.failsafe = None;
        c.sync.pending = false;
        c.sync.counter = None;
        c.sync.last_timestamp = 0;
        if let Some(timeout) = c.sync.timeout.take() {
            self.timers.cancel(timeout);
        }
        self.set_ready_for_painting(id);
        self.perform_interactive_resize(id);
    }

    pub fn set_ready_for_painting(&mut self, id: ClientId) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if c.ready_for_painting {
            return;
        }
        c.ready_for_painting = true;
        let frame = c.frame_geometry;
        debug!("Window {:#x} ready for painting", c.window);
        self.events.push(ClientEvent::ReadyForPainting(id));
        self.events.push(ClientEvent::Repaint(frame));
    }

    /// The compositor saw new content. Without a sync counter there is no
    /// better signal that the first frame is complete.
    pub fn add_damage(&mut self, id: ClientId, region: Geometry) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        if !c.ready_for_painting && c.sync.counter.is_none() {
            self.set_ready_for_painting(id);
        }
        self.events.push(ClientEvent::Repaint(region));
    }

    pub fn begin_interactive_resize(&mut self, id: ClientId) -> bool {
        let Some(c) = self.clients.get_mut(&id) else {
            return false;
        };
        if c.move_resize.is_some() || !c.is_resizable() {
            return false;
        }
        c.move_resize = Some(MoveResize::default());
        true
    }

    /// New frame geometry from the pointer. With sync the client gets the
    /// new size first and the frame follows once it answers.
    pub fn request_resize(&mut self, id: ClientId, frame: Geometry) {
        let resize_timeout = Duration::from_millis(self.config.sync.resize_timeout_ms);
        let now = self.now;
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let Some(mr) = c.move_resize.as_mut() else {
            self.set_frame_geometry(id, frame, ForceGeometry::No);
            return;
        };
        mr.pending = Some(frame);
        if !c.supports_sync() {
            self.perform_interactive_resize(id);
            return;
        }
        if c.sync.pending {
            // Picked up when the outstanding request is answered
            return;
        }
        if let Some(old) = c.sync.timeout.take() {
            self.timers.cancel(old);
        }
        c.sync.timeout = Some(self.timers.schedule(now + resize_timeout, id, TimerKind::SyncTimeout));
        let client = c.frame_rect_to_client_rect(frame);
        let window = c.window;
        self.send_sync_request(id);
        // Only the client window resizes now; it paints into the new size
        self.services
            .display
            .configure_window(window, Geometry::from_parts(Point::default(), client.size()));
    }

    pub(crate) fn perform_interactive_resize(&mut self, id: ClientId) {
        let pending = self
            .clients
            .get_mut(&id)
            .and_then(|c| c.move_resize.as_mut())
            .and_then(|mr| mr.pending.take());
        if let Some(frame) = pending {
            self.set_frame_geometry(id, frame, ForceGeometry::No);
        }
    }

    pub fn end_interactive_resize(&mut self, id: ClientId) {
        self.perform_interactive_resize(id);
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if let Some(timer) = c.sync.timeout.take() {
            self.timers.cancel(timer);
        }
        c.move_resize = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::testing::{DisplayCall, TestSetup, WindowSpec};

    fn sync_requests(t: &TestSetup) -> usize {
        t.display
            .count(|c| matches!(c, DisplayCall::Message(_, ClientMessage::SyncRequest { .. })))
    }

    #[test]
    fn test_initial_sync_failsafe_marks_ready_once() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).sync_counter(0x500));
        assert!(!t.ws.client(id).unwrap().ready_for_painting);
        assert_eq!(sync_requests(&t), 1);

        t.advance(Duration::from_millis(1000));
        let c = t.ws.client(id).unwrap();
        assert!(c.ready_for_painting);
        assert!(!c.supports_sync());
        let ready = t.events().iter().filter(|e| **e == ClientEvent::ReadyForPainting(id)).count();
        assert_eq!(ready, 1);

        assert!(t.ws.begin_interactive_resize(id));
        t.display.clear();
        let frame = t.ws.client(id).unwrap().frame_geometry;
        t.ws.request_resize(id, frame.with_size(crate::shared::Size::new(500, 400)));
        assert_eq!(sync_requests(&t), 0);
        assert_eq!(t.ws.client(id).unwrap().frame_geometry.width, 500);
    }

    #[test]
    fn test_ack_commits_pending_resize() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).sync_counter(0x500));
        let value = t.ws.client(id).unwrap().sync.value;
        t.ws.handle_sync_ack(id, value);
        assert!(t.ws.client(id).unwrap().ready_for_painting);

        t.ws.begin_interactive_resize(id);
        let before = t.ws.client(id).unwrap().frame_geometry;
        let target = before.with_size(crate::shared::Size::new(640, 480));
        t.ws.request_resize(id, target);
        assert_eq!(t.ws.client(id).unwrap().frame_geometry, before);
        assert!(t.ws.client(id).unwrap().sync.pending);

        let value = t.ws.client(id).unwrap().sync.value;
        t.ws.handle_sync_ack(id, value);
        assert_eq!(t.ws.client(id).unwrap().frame_geometry, target);
        t.ws.end_interactive_resize(id);
        assert!(t.ws.next_timer_deadline().is_none());
    }

    #[test]
    fn test_no_second_request_while_pending() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).sync_counter(0x500));
        t.ws.send_sync_request(id);
        t.ws.send_sync_request(id);
        assert_eq!(sync_requests(&t), 1);
    }

    #[test]
    fn test_resize_timeout_commits_without_ack() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).sync_counter(0x500));
        let value = t.ws.client(id).unwrap().sync.value;
        t.ws.handle_sync_ack(id, value);

        t.ws.begin_interactive_resize(id);
        let target = t.ws.client(id).unwrap().frame_geometry.with_size(crate::shared::Size::new(300, 200));
        t.ws.request_resize(id, target);
        t.advance(Duration::from_millis(250));
        assert_eq!(t.ws.client(id).unwrap().frame_geometry, target);
        // Sync is still on, only the failsafe would turn it off
        assert!(t.ws.client(id).unwrap().supports_sync());
    }

    #[test]
    fn test_damage_without_counter_sets_ready() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100));
        t.ws.add_damage(id, Geometry::new(0, 0, 10, 10));
        assert!(t.ws.client(id).unwrap().ready_for_painting);
    }

    #[test]
    fn test_destroy_with_pending_sync_fires_nothing() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).sync_counter(0x500));
        t.ws.destroy(id);
        t.take_events();
        t.advance(Duration::from_secs(20));
        assert!(t.events().is_empty());
    }

    #[test]
    fn test_counter_past_request_acks() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).sync_counter(0x500));
        let value = t.ws.client(id).unwrap().sync.value;
        t.ws.handle_sync_ack(id, value.wrapping_sub(1));
        assert!(t.ws.client(id).unwrap().sync.pending);
        t.ws.handle_sync_ack(id, value + 3);
        let c = t.ws.client(id).unwrap();
        assert!(!c.sync.pending);
        assert!(c.ready_for_painting);

        assert!(counter_reached(2, u64::MAX));
        assert!(!counter_reached(u64::MAX, 2));
    }

    #[test]
    fn test_steady_failsafe_commits_resize_and_disables_sync() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).sync_counter(0x500));
        let value = t.ws.client(id).unwrap().sync.value;
        t.ws.handle_sync_ack(id, value);

        t.ws.begin_interactive_resize(id);
        let frame = t.ws.client(id).unwrap().frame_geometry;
        t.ws.request_resize(id, frame.with_size(crate::shared::Size::new(500, 400)));
        t.advance(Duration::from_millis(250));
        // Still waiting on the first request, so this one only queues
        let last = frame.with_size(crate::shared::Size::new(700, 600));
        t.ws.request_resize(id, last);
        assert!(t.ws.client(id).unwrap().sync.pending);
        assert_ne!(t.ws.client(id).unwrap().frame_geometry, last);

        t.take_events();
        t.advance(Duration::from_millis(10_000));
        let c = t.ws.client(id).unwrap();
        assert_eq!(c.frame_geometry, last);
        assert!(!c.supports_sync());
        assert!(!c.sync.pending);
        // Already painted once, so no second ready notification
        assert!(!t.events().contains(&ClientEvent::ReadyForPainting(id)));

        t.display.clear();
        t.ws.request_resize(id, frame);
        assert_eq!(sync_requests(&t), 0);
        assert_eq!(t.ws.client(id).unwrap().frame_geometry, frame);
    }

    #[test]
    fn test_buffer_stays_inside_frame_during_sync_resize() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).sync_counter(0x500));
        let value = t.ws.client(id).unwrap().sync.value;
        t.ws.handle_sync_ack(id, value);
        let inside = |t: &TestSetup| {
            let c = t.ws.client(id).unwrap();
            c.frame_geometry.united(&c.buffer_geometry) == c.frame_geometry
        };

        t.ws.begin_interactive_resize(id);
        let frame = t.ws.client(id).unwrap().frame_geometry;
        for size in [(900, 700), (200, 150), (1200, 300)] {
            let target = frame.with_size(crate::shared::Size::new(size.0, size.1));
            t.ws.request_resize(id, target);
            assert!(inside(&t));
            let value = t.ws.client(id).unwrap().sync.value;
            t.ws.handle_sync_ack(id, value);
            assert!(inside(&t));
            assert_eq!(t.ws.client(id).unwrap().frame_geometry, target);
        }
        t.ws.end_interactive_resize(id);
        assert!(inside(&t));
    }
}
