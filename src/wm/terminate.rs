//! Terminate Module
//!
//! Close requests, liveness pings and the kill escalation for windows that
//! stop answering: delete message and ping, unresponsive after half the
//! timeout, ask-to-kill after the other half.

use std::process::Command;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use tracing::{debug, info, warn};

use crate::wm::Workspace;
use crate::wm::client::ClientId;
use crate::wm::client_flags::Protocols;
use crate::wm::display::{ClientMessage, Timestamp, XWindow, timestamp_compare};
use crate::wm::events::ClientEvent;
use crate::wm::timers::{TimerId, TimerKind};

/// Everything the ask-to-kill helper shows the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillRequest<'a> {
    pub pid: u32,
    pub hostname: &'a str,
    pub caption: &'a str,
    pub application: &'a str,
    pub window: XWindow,
    pub timestamp: Timestamp,
}

pub trait ProcessKiller {
    /// Ask the process to quit, locally by signal or through `xon` remotely
    fn terminate(&mut self, pid: u32, hostname: &str, local: bool);

    /// Start the interactive helper; returns its pid
    fn ask(&mut self, request: &KillRequest<'_>) -> Option<u32>;

    fn is_alive(&self, helper: u32) -> bool;

    fn dismiss(&mut self, helper: u32);
}

/// Signals and helper processes on the local machine
#[derive(Debug, Clone)]
pub struct SignalKiller {
    pub helper: String,
}

impl Default for SignalKiller {
    fn default() -> Self {
        Self { helper: "area-killer-helper".into() }
    }
}

fn pid_of(raw: u32) -> Option<Pid> {
    i32::try_from(raw).ok().filter(|p| *p > 0).map(Pid::from_raw)
}

impl ProcessKiller for SignalKiller {
    fn terminate(&mut self, pid: u32, hostname: &str, local: bool) {
        if local {
            let Some(pid) = pid_of(pid) else {
                return;
            };
            if let Err(e) = kill(pid, Signal::SIGTERM) {
                warn!("Failed to terminate process {}: {}", pid, e);
            }
            return;
        }
        let pid = pid.to_string();
        if let Err(e) = Command::new("xon").args([hostname, "kill", pid.as_str()]).spawn() {
            warn!("Failed to run xon for {} on {}: {}", pid, hostname, e);
        }
    }

    fn ask(&mut self, request: &KillRequest<'_>) -> Option<u32> {
        let spawned = Command::new(&self.helper)
            .arg("--pid")
            .arg(request.pid.to_string())
            .arg("--hostname")
            .arg(request.hostname)
            .arg("--windowname")
            .arg(request.caption)
            .arg("--applicationname")
            .arg(request.application)
            .arg("--wid")
            .arg(request.window.to_string())
            .arg("--timestamp")
            .arg(request.timestamp.to_string())
            .spawn();
        match spawned {
            Ok(child) => Some(child.id()),
            Err(e) => {
                warn!("Failed to start {}: {}", self.helper, e);
                None
            }
        }
    }

    fn is_alive(&self, helper: u32) -> bool {
        pid_of(helper).is_some_and(|pid| kill(pid, None).is_ok())
    }

    fn dismiss(&mut self, helper: u32) {
        if let Some(pid) = pid_of(helper) {
            if let Err(e) = kill(pid, Signal::SIGTERM) {
                warn!("Failed to dismiss kill helper {}: {}", pid, e);
            }
        }
    }
}

impl Workspace {
    fn kill_ping_timeout(&self) -> Duration {
        Duration::from_millis(self.config.behavior.kill_ping_timeout_ms)
    }

    /// Politely ask the window to close, or kill it if it cannot be asked
    pub fn close_window(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        if !c.is_closeable() {
            return;
        }
        let supports_delete = c.protocols.contains(Protocols::DELETE);
        let window = c.window;
        // The window may open a confirmation dialog
        self.update_user_time(id, None);
        if supports_delete {
            let timestamp = self.services.display.server_time();
            self.services
                .display
                .send_client_message(window, ClientMessage::DeleteWindow { timestamp });
            self.ping_window(id);
        } else {
            self.kill_window(id);
        }
    }

    /// Terminate the process and drop the window right away
    pub fn kill_window(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let window = c.window;
        info!("Killing window {:#x} ({})", window, c.caption.normal);
        self.kill_process(id, false, None);
        self.services.display.kill_client(window);
        self.destroy(id);
    }

    pub fn ping_window(&mut self, id: ClientId) {
        let timeout = self.kill_ping_timeout();
        let now = self.now;
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        if !c.protocols.contains(Protocols::PING) || timeout.is_zero() || c.ping.timer.is_some() {
            return;
        }
        if c.ping.killer_pid.is_some_and(|h| self.services.killer.is_alive(h)) {
            return;
        }
        let window = c.window;
        let timestamp = self.services.display.server_time();
        let timer = self.timers.schedule(now + timeout / 2, id, TimerKind::Ping);
        if let Some(c) = self.clients.get_mut(&id) {
            c.ping.timestamp = timestamp;
            c.ping.timer = Some(timer);
        }
        self.services
            .display
            .send_client_message(window, ClientMessage::Ping { timestamp });
    }

    /// First expiry marks the window unresponsive, the second asks to kill
    pub(crate) fn ping_timeout(&mut self, id: ClientId, timer: TimerId) {
        let timeout = self.kill_ping_timeout();
        let now = self.now;
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if c.ping.timer != Some(timer) {
            return;
        }
        c.ping.timer = None;
        if c.unresponsive {
            debug!("Final ping timeout, asking to kill {:#x}", c.window);
            let timestamp = c.ping.timestamp;
            self.kill_process(id, true, Some(timestamp));
            return;
        }
        debug!("First ping timeout for {:#x}", c.window);
        c.ping.timer = Some(self.timers.schedule(now + timeout / 2, id, TimerKind::Ping));
        self.set_unresponsive(id, true);
    }

    /// A pong arrived. Answers to older probes are ignored.
    pub fn got_ping(&mut self, id: ClientId, timestamp: Timestamp) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if timestamp_compare(timestamp, c.ping.timestamp).is_lt() {
            return;
        }
        if let Some(timer) = c.ping.timer.take() {
            self.timers.cancel(timer);
        }
        let helper = c.ping.killer_pid.take();
        self.set_unresponsive(id, false);
        if let Some(helper) = helper {
            if self.services.killer.is_alive(helper) {
                debug!("Dismissing kill helper {}", helper);
                self.services.killer.dismiss(helper);
            }
        }
    }

    pub fn kill_process(&mut self, id: ClientId, ask: bool, timestamp: Option<Timestamp>) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        if c.ping.killer_pid.is_some_and(|h| self.services.killer.is_alive(h)) {
            return;
        }
        let Some(pid) = c.pid.filter(|p| *p > 0) else {
            debug!("Window {:#x} has no pid, cannot kill its process", c.window);
            return;
        };
        if c.machine.hostname.is_empty() {
            return;
        }
        if !ask {
            self.services.killer.terminate(pid, &c.machine.hostname, c.machine.local);
            return;
        }
        debug_assert!(timestamp.is_some(), "asking to kill needs the ping timestamp");
        let hostname = if c.machine.local { "localhost" } else { c.machine.hostname.as_str() };
        let request = KillRequest {
            pid,
            hostname,
            caption: &c.caption.normal,
            application: &c.resource_class,
            window: c.window,
            timestamp: timestamp.unwrap_or_default(),
        };
        let helper = self.services.killer.ask(&request);
        if let Some(c) = self.clients.get_mut(&id) {
            c.ping.killer_pid = helper;
        }
    }

    pub fn set_unresponsive(&mut self, id: ClientId, unresponsive: bool) {
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        if c.unresponsive == unresponsive {
            return;
        }
        c.unresponsive = unresponsive;
        self.events.push(ClientEvent::UnresponsiveChanged { client: id, unresponsive });
    }

    /// Record user interaction with the window and its group
    pub fn update_user_time(&mut self, id: ClientId, time: Option<Timestamp>) {
        let time = time.unwrap_or_else(|| self.services.display.server_time());
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        let newer = c.user_time.is_none_or(|t| timestamp_compare(time, t).is_gt());
        if time != 0 && newer {
            c.user_time = Some(time);
        }
        if let Some(group) = c.group.and_then(|g| self.groups.get_mut(&g)) {
            group.update_user_time(time);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::wm::testing::{DisplayCall, TestSetup, WindowSpec};

    fn pingable() -> WindowSpec {
        WindowSpec::normal(0x100)
            .protocols(Protocols::DELETE | Protocols::PING)
            .pid(4242)
    }

    #[test]
    fn test_close_sends_delete_and_escalates_once() {
        let mut t = TestSetup::new();
        let id = t.manage(pingable());
        t.display.clear();

        t.ws.close_window(id);
        assert_eq!(
            t.display.count(|c| matches!(c, DisplayCall::Message(_, ClientMessage::DeleteWindow { .. }))),
            1
        );
        assert_eq!(t.display.count(|c| matches!(c, DisplayCall::Message(_, ClientMessage::Ping { .. }))), 1);

        t.advance(Duration::from_millis(2499));
        assert!(!t.ws.client(id).unwrap().unresponsive);
        t.advance(Duration::from_millis(1));
        assert!(t.ws.client(id).unwrap().unresponsive);
        assert!(t.killer.asked().is_empty());

        t.advance(Duration::from_millis(2500));
        assert_eq!(t.killer.asked().len(), 1);
        t.advance(Duration::from_millis(10_000));
        assert_eq!(t.killer.asked().len(), 1);
    }

    #[test]
    fn test_pong_across_wraparound_is_accepted() {
        let mut t = TestSetup::new();
        let id = t.manage(pingable());
        t.display.set_time(0xFFFF_FFF0);
        t.ws.ping_window(id);
        t.advance(Duration::from_millis(2500));
        assert!(t.ws.client(id).unwrap().unresponsive);

        t.ws.got_ping(id, 0x0000_0005);
        let c = t.ws.client(id).unwrap();
        assert!(!c.unresponsive);
        assert!(c.ping.timer.is_none());
        t.advance(Duration::from_millis(10_000));
        assert!(t.killer.asked().is_empty());
    }

    #[test]
    fn test_stale_pong_is_ignored() {
        let mut t = TestSetup::new();
        let id = t.manage(pingable());
        t.display.set_time(1000);
        t.ws.ping_window(id);
        t.ws.got_ping(id, 999);
        assert!(t.ws.client(id).unwrap().ping.timer.is_some());
    }

    #[test]
    fn test_pong_dismisses_kill_helper() {
        let mut t = TestSetup::new();
        let id = t.manage(pingable());
        t.ws.ping_window(id);
        t.advance(Duration::from_millis(5000));
        let helper = t.ws.client(id).unwrap().ping.killer_pid.unwrap();

        let timestamp = t.ws.client(id).unwrap().ping.timestamp;
        t.ws.got_ping(id, timestamp);
        assert_eq!(t.killer.dismissed(), vec![helper]);
        assert!(t.ws.client(id).unwrap().ping.killer_pid.is_none());
    }

    #[test]
    fn test_zero_timeout_disables_ping() {
        let mut t = TestSetup::with_config(|c| c.behavior.kill_ping_timeout_ms = 0);
        let id = t.manage(pingable());
        t.ws.ping_window(id);
        assert!(t.ws.client(id).unwrap().ping.timer.is_none());
    }

    #[test]
    fn test_close_without_delete_protocol_kills() {
        let mut t = TestSetup::new();
        let id = t.manage(WindowSpec::normal(0x100).pid(77));
        t.ws.close_window(id);
        assert!(t.ws.client(id).is_none());
        assert_eq!(t.killer.terminated(), vec![77]);
        assert!(t.display.calls().contains(&DisplayCall::KillClient(0x100)));
    }

    #[test]
    fn test_destroy_cancels_pending_ping() {
        let mut t = TestSetup::new();
        let id = t.manage(pingable());
        t.ws.ping_window(id);
        t.ws.destroy(id);
        assert!(t.ws.next_timer_deadline().is_none());
        t.advance(Duration::from_millis(10_000));
        assert!(t.killer.asked().is_empty());
    }

    #[test_log::test]
    fn test_signal_killer_survives_missing_processes() {
        let mut killer = SignalKiller::default();
        let gone = i32::MAX as u32;
        assert!(!killer.is_alive(gone));
        killer.dismiss(gone);
        killer.terminate(gone, "localhost", true);
        assert!(pid_of(0).is_none());
    }
}
