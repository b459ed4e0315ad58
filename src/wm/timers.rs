//! Timer Module
//!
//! Cancellable one-shot timers owned by managed windows. The queue never
//! calls back on its own: the workspace pops due entries while advancing its
//! clock, so a cancelled handle can never fire.

use std::collections::{BTreeMap, HashMap};
use std::time::Instant;

use crate::wm::client::ClientId;

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// What a timer does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerKind {
    /// Liveness probe half-timeout
    Ping,
    /// Commit a pending interactive resize even without acknowledgement
    SyncTimeout,
    /// Give up on the resize-sync protocol altogether
    SyncFailsafe,
}

#[derive(Debug, Clone, Copy)]
pub struct Expired {
    pub id: TimerId,
    pub deadline: Instant,
    pub client: ClientId,
    pub kind: TimerKind,
}

#[derive(Debug, Default)]
pub struct TimerQueue {
    next_id: u64,
    queue: BTreeMap<(Instant, TimerId), (ClientId, TimerKind)>,
    deadlines: HashMap<TimerId, Instant>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, deadline: Instant, client: ClientId, kind: TimerKind) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.queue.insert((deadline, id), (client, kind));
        self.deadlines.insert(id, deadline);
        id
    }

    /// Returns whether the timer was still pending
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.deadlines.remove(&id) {
            Some(deadline) => self.queue.remove(&(deadline, id)).is_some(),
            None => false,
        }
    }

    /// Drop every timer owned by `client`
    pub fn cancel_all(&mut self, client: ClientId) -> usize {
        let owned: Vec<TimerId> = self
            .queue
            .iter()
            .filter(|(_, (owner, _))| *owner == client)
            .map(|((_, id), _)| *id)
            .collect();
        owned.iter().filter(|id| self.cancel(**id)).count()
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.deadlines.contains_key(&id)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return the earliest timer due at `now`
    pub fn pop_due(&mut self, now: Instant) -> Option<Expired> {
        let (&(deadline, id), _) = self.queue.iter().next()?;
        if deadline > now {
            return None;
        }
        let (client, kind) = self.queue.remove(&(deadline, id))?;
        self.deadlines.remove(&id);
        Some(Expired { id, deadline, client, kind })
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_pop_in_deadline_order() {
        let mut timers = TimerQueue::new();
        let t0 = Instant::now();
        let a = ClientId::from_raw(1);
        let late = timers.schedule(t0 + Duration::from_millis(20), a, TimerKind::SyncFailsafe);
        let early = timers.schedule(t0 + Duration::from_millis(10), a, TimerKind::Ping);

        assert!(timers.pop_due(t0).is_none());
        let first = timers.pop_due(t0 + Duration::from_millis(30)).unwrap();
        assert_eq!(first.id, early);
        assert_eq!(first.kind, TimerKind::Ping);
        let second = timers.pop_due(t0 + Duration::from_millis(30)).unwrap();
        assert_eq!(second.id, late);
        assert!(timers.is_empty());
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut timers = TimerQueue::new();
        let t0 = Instant::now();
        let id = timers.schedule(t0, ClientId::from_raw(7), TimerKind::Ping);
        assert!(timers.cancel(id));
        assert!(!timers.cancel(id));
        assert!(timers.pop_due(t0 + Duration::from_secs(1)).is_none());
    }

    #[test]
    fn test_cancel_all_only_touches_owner() {
        let mut timers = TimerQueue::new();
        let t0 = Instant::now();
        let a = ClientId::from_raw(1);
        let b = ClientId::from_raw(2);
        timers.schedule(t0, a, TimerKind::Ping);
        timers.schedule(t0, a, TimerKind::SyncFailsafe);
        let kept = timers.schedule(t0, b, TimerKind::Ping);

        assert_eq!(timers.cancel_all(a), 2);
        assert_eq!(timers.len(), 1);
        assert!(timers.is_pending(kept));
    }
}
