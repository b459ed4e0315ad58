//! Transients Module
//!
//! The is-transient-for graph and group membership. A window is transient
//! for one specific window, for its whole group, or for nothing. Group
//! transients hang below every member that joined the group before them;
//! `check_group_transients` repairs whatever else could form a loop.

use std::collections::HashSet;

use bitflags::bitflags;
use tracing::{debug, warn};

use crate::wm::Workspace;
use crate::wm::client::ClientId;
use crate::wm::client_flags::TransientTarget;
use crate::wm::display::XWindow;
use crate::wm::events::ClientEvent;
use crate::wm::group::GroupId;

/// Longest WM_TRANSIENT_FOR chain followed before calling it a loop
const TRANSIENT_CHAIN_LIMIT: usize = 20;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct SameApplicationChecks: u32 {
        /// Different pids or client leaders do not rule a match out
        const ALLOW_CROSS_PROCESSES = 1 << 0;
        /// Window-role disambiguation is skipped when one side is active
        const RELAXED_FOR_ACTIVE = 1 << 1;
    }
}

impl Workspace {
    /// The window's WM_TRANSIENT_FOR changed (or was read for the first time)
    pub fn read_transient(&mut self, id: ClientId, raw: Option<XWindow>) {
        let raw = raw.filter(|w| *w != 0);
        let Some(c) = self.clients.get_mut(&id) else {
            return;
        };
        c.original_transient_for = raw;
        let target = self.verify_transient_for(id, raw, raw.is_some());
        self.set_transient(id, target);
    }

    /// A window was just managed; anyone waiting for it as a parent can
    /// now resolve their transiency.
    pub fn check_transient(&mut self, id: ClientId, window: XWindow) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        if c.original_transient_for != Some(window) {
            return;
        }
        let target = self.verify_transient_for(id, Some(window), true);
        self.set_transient(id, target);
    }

    /// Turn a raw WM_TRANSIENT_FOR value into something safe to follow:
    /// never the window itself, never a loop, never an unmanaged window.
    /// Anything unusable falls back to the whole group.
    pub fn verify_transient_for(
        &mut self,
        id: ClientId,
        raw: Option<XWindow>,
        set: bool,
    ) -> TransientTarget {
        let Some(c) = self.clients.get(&id) else {
            return TransientTarget::None;
        };
        let root = self.services.display.root();
        let window = c.window;
        let original = c.original_transient_for;

        let mut property = raw;
        let mut target = raw;
        if target.is_none() && c.is_splash() {
            // Splash screens stay above every window of their application
            target = Some(root);
        }
        let mut target = match target {
            Some(t) => t,
            None if set => {
                property = Some(root);
                root
            }
            None => return TransientTarget::None,
        };
        if target == window {
            warn!("Window {:#x} has WM_TRANSIENT_FOR pointing to itself", window);
            property = Some(root);
            target = root;
        }

        // The parent may be embedded inside another toplevel
        let before_search = target;
        while target != root && self.find_client(target).is_none() {
            match self.services.display.parent_of(target) {
                Some(parent) if parent != 0 => target = parent,
                _ => break,
            }
        }
        if self.find_client(target).is_some() {
            if target != before_search {
                debug!(
                    "Window {:#x} is transient for non-toplevel {:#x}, using {:#x}",
                    window, before_search, target
                );
                property = Some(target);
            }
        } else {
            target = before_search;
        }

        let mut pos = target;
        let mut steps = 0;
        while pos != root {
            let Some(pos_id) = self.find_client(pos) else {
                break;
            };
            steps += 1;
            if pos_id == id || steps >= TRANSIENT_CHAIN_LIMIT {
                warn!("Window {:#x} caused a WM_TRANSIENT_FOR loop", window);
                target = root;
                break;
            }
            pos = match self.clients.get(&pos_id).map(|p| p.transient_target) {
                Some(TransientTarget::Window(next)) => next,
                _ => break,
            };
        }

        if target != root && self.find_client(target).is_none() {
            // Transient for a window that is not managed (yet)
            target = root;
        }
        if let Some(value) = property {
            if property != original {
                self.services.display.set_transient_for(window, value);
            }
        }
        if target == root {
            TransientTarget::Group
        } else {
            TransientTarget::Window(target)
        }
    }

    /// Move the window to a new parent, fixing both ends of every edge
    pub fn set_transient(&mut self, id: ClientId, target: TransientTarget) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        if c.transient_target == target {
            return;
        }
        self.remove_from_main_clients(id);
        let parent = match target {
            TransientTarget::Window(w) => self.find_client(w),
            _ => None,
        };
        debug_assert!(
            !matches!(target, TransientTarget::Window(_)) || parent.is_some(),
            "transient target must be verified first"
        );
        if let Some(c) = self.clients.get_mut(&id) {
            c.transient_target = target;
            c.transient_for = parent;
        }
        if let Some(parent) = parent {
            self.add_transient(parent, id);
        }
        self.check_group(id, None, true);
        self.update_layer(id);
        self.events.push(ClientEvent::TransientChanged(id));
    }

    pub(crate) fn add_transient(&mut self, parent: ClientId, child: ClientId) {
        let child_modal = self.clients.get(&child).is_some_and(|c| c.modal);
        let most_recent = self.most_recently_activated == Some(parent);
        let Some(p) = self.clients.get_mut(&parent) else {
            return;
        };
        if !p.transients.contains(&child) {
            p.transients.push(child);
        }
        if most_recent && child_modal {
            p.check_active_modal = true;
        }
    }

    /// Drop `child` from `parent`'s list. A child that was transient for
    /// exactly this parent loses its transiency.
    pub(crate) fn remove_transient(&mut self, parent: ClientId, child: ClientId) {
        self.remove_transient_from_list(parent, child);
        let Some(c) = self.clients.get_mut(&child) else {
            return;
        };
        if c.transient_for == Some(parent) {
            c.transient_for = None;
            c.transient_target = TransientTarget::None;
            self.events.push(ClientEvent::TransientChanged(child));
        }
    }

    /// Only touches `parent`'s list, never the child
    pub(crate) fn remove_transient_from_list(&mut self, parent: ClientId, child: ClientId) {
        if let Some(p) = self.clients.get_mut(&parent) {
            p.transients.retain(|t| *t != child);
        }
    }

    pub(crate) fn remove_from_main_clients(&mut self, id: ClientId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let parent = c.transient_for;
        let group_transient = c.group_transient();
        if let Some(parent) = parent {
            self.remove_transient(parent, id);
        }
        if group_transient {
            for member in self.group_members(id) {
                self.remove_transient(member, id);
            }
        }
    }

    /// Unhook the window from every transient list and from its group.
    /// Runs before a window is torn down.
    pub fn clean_grouping(&mut self, id: ClientId) {
        self.remove_from_main_clients(id);
        let children = self.clients.get(&id).map(|c| c.transients.clone()).unwrap_or_default();
        for child in children {
            if self.clients.get(&child).is_some_and(|c| c.transient_for == Some(id)) {
                self.remove_transient(id, child);
            }
        }
        let members = self.group_members(id);
        if let Some(group) = self.clients.get(&id).and_then(|c| c.group) {
            self.remove_group_member(group, id);
        }
        for member in members {
            self.remove_transient(member, id);
        }
        if let Some(c) = self.clients.get_mut(&id) {
            c.group = None;
            c.transient_for = None;
            c.transient_target = TransientTarget::None;
            c.transients.clear();
        }
    }

    /// Whether `child` is transient for `parent`, directly or (with
    /// `indirect`) through any chain of parents.
    pub fn has_transient(&self, parent: ClientId, child: ClientId, indirect: bool) -> bool {
        let mut visited = HashSet::new();
        self.has_transient_internal(parent, child, indirect, &mut visited)
    }

    fn has_transient_internal(
        &self,
        parent: ClientId,
        child: ClientId,
        indirect: bool,
        visited: &mut HashSet<ClientId>,
    ) -> bool {
        let (Some(p), Some(c)) = (self.clients.get(&parent), self.clients.get(&child)) else {
            return false;
        };
        if let Some(up) = c.transient_for {
            if up == parent {
                return true;
            }
            if !indirect || !visited.insert(child) {
                return false;
            }
            return self.has_transient_internal(parent, up, indirect, visited);
        }
        if !c.is_transient() || p.group != c.group {
            return false;
        }
        // Group transient, search down from the parent
        if p.transients.contains(&child) {
            return true;
        }
        if !indirect || !visited.insert(parent) {
            return false;
        }
        p.transients
            .iter()
            .any(|t| self.has_transient_internal(*t, child, indirect, visited))
    }

    /// Windows this one is directly transient for
    pub fn main_clients(&self, id: ClientId) -> Vec<ClientId> {
        let Some(c) = self.clients.get(&id) else {
            return Vec::new();
        };
        if !c.is_transient() {
            return Vec::new();
        }
        if let Some(parent) = c.transient_for {
            return vec![parent];
        }
        self.group_members(id)
            .into_iter()
            .filter(|m| self.has_transient(*m, id, false))
            .collect()
    }

    pub fn all_main_clients(&self, id: ClientId) -> Vec<ClientId> {
        let mut result = Vec::new();
        let mut queue = self.main_clients(id);
        while let Some(m) = queue.pop() {
            if m == id || result.contains(&m) {
                continue;
            }
            result.push(m);
            queue.extend(self.main_clients(m));
        }
        result
    }

    /// First modal window below `id`, or `id` itself when allowed
    pub fn find_modal(&self, id: ClientId, allow_itself: bool) -> Option<ClientId> {
        let mut visited = HashSet::new();
        self.find_modal_internal(id, allow_itself, &mut visited)
    }

    fn find_modal_internal(
        &self,
        id: ClientId,
        allow_itself: bool,
        visited: &mut HashSet<ClientId>,
    ) -> Option<ClientId> {
        if !visited.insert(id) {
            return None;
        }
        let c = self.clients.get(&id)?;
        for t in &c.transients {
            if let Some(found) = self.find_modal_internal(*t, true, visited) {
                return Some(found);
            }
        }
        (c.modal && allow_itself).then_some(id)
    }

    /// Put the window into the right group. `set_group` forces a specific
    /// group; otherwise the group leader, the parent's group and the client
    /// leader decide, in that order.
    pub fn check_group(&mut self, id: ClientId, set_group: Option<GroupId>, force: bool) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        let old_group = c.group;
        let parent_group = c
            .transient_for
            .and_then(|p| self.clients.get(&p))
            .and_then(|p| p.group);
        let group_leader = c.group_leader;
        if let Some(old) = old_group {
            self.ref_group(old);
        }

        let new_group = if let Some(group) = set_group {
            group
        } else if let Some(leader) = group_leader {
            // A dialog from another application joins its parent's group
            match parent_group.or_else(|| self.find_group(leader)) {
                Some(group) => group,
                None => self.create_group(Some(leader)),
            }
        } else if let Some(group) = parent_group {
            group
        } else {
            let lone = old_group.filter(|g| {
                self.groups
                    .get(g)
                    .is_some_and(|g| g.leader.is_none() && g.member_ids() == [id])
            });
            match self.find_client_leader_group(id).or(lone) {
                Some(group) => group,
                None => self.create_group(None),
            }
        };

        if old_group != Some(new_group) {
            if let Some(old) = old_group {
                self.remove_group_member(old, id);
            }
            self.add_group_member(new_group, id);
        }

        if old_group != Some(new_group) || force {
            self.refresh_group_edges(id, old_group, new_group);
        }

        self.update_group_icon(new_group);
        if let Some(old) = old_group {
            self.deref_group(old);
        }
        self.check_group_transients(id);
        self.check_active_modal();
        self.update_layer(id);
    }

    fn refresh_group_edges(&mut self, id: ClientId, old_group: Option<GroupId>, group: GroupId) {
        let children = self.clients.get(&id).map(|c| c.transients.clone()).unwrap_or_default();
        for child in children {
            let stale = self
                .clients
                .get(&child)
                .is_some_and(|c| c.group_transient() && c.group != Some(group));
            if stale {
                self.remove_transient_from_list(id, child);
            }
        }

        let group_transient = self.clients.get(&id).is_some_and(|c| c.group_transient());
        if group_transient {
            if let Some(old) = old_group.filter(|g| *g != group) {
                let old_members = self.groups.get(&old).map(|g| g.member_ids()).unwrap_or_default();
                for member in old_members {
                    self.remove_transient(member, id);
                }
            }
            // Only transient for the members that joined before it
            let own_seq = self.member_seq(id);
            let earlier: Vec<ClientId> = self
                .groups
                .get(&group)
                .map(|g| {
                    g.members
                        .iter()
                        .filter(|m| m.client != id && Some(m.seq) < own_seq)
                        .map(|m| m.client)
                        .collect()
                })
                .unwrap_or_default();
            for member in earlier {
                self.add_transient(member, id);
            }
        }

        // Group-transient splash screens sit above every member, even later ones
        for member in self.group_members(id) {
            let splash = self
                .clients
                .get(&member)
                .is_some_and(|m| m.is_splash() && m.group_transient());
            if !splash || member == id || self.has_transient(id, member, true) {
                continue;
            }
            self.add_transient(id, member);
        }
    }

    /// Repair the group's graph so no group transient is (indirectly)
    /// transient for itself, and keep only the closest parent when a group
    /// transient hangs below two windows of the same chain.
    pub fn check_group_transients(&mut self, id: ClientId) {
        let members = self.group_members(id);
        for &a in &members {
            if !self.clients.get(&a).is_some_and(|c| c.group_transient()) {
                continue;
            }
            for &b in &members {
                if a == b {
                    continue;
                }
                // `b` below `a` through specific parents must not hold `a`
                let mut visited = HashSet::new();
                let mut up = self.clients.get(&b).and_then(|c| c.transient_for);
                while let Some(p) = up {
                    if p == a {
                        self.remove_transient_from_list(b, a);
                        break;
                    }
                    if !visited.insert(p) {
                        break;
                    }
                    up = self.clients.get(&p).and_then(|c| c.transient_for);
                }

                let b_group_transient = self.clients.get(&b).is_some_and(|c| c.group_transient());
                if b_group_transient && self.has_transient(a, b, true) && self.has_transient(b, a, true)
                {
                    // The later member stays below the earlier one
                    let a_first = self.member_seq(a) < self.member_seq(b);
                    if a_first {
                        self.remove_transient_from_list(b, a);
                    } else {
                        self.remove_transient_from_list(a, b);
                    }
                }

                for &c in &members {
                    if c == a || c == b {
                        continue;
                    }
                    if self.has_transient(b, a, false) && self.has_transient(c, a, false) {
                        if self.has_transient(b, c, true) {
                            self.remove_transient_from_list(b, a);
                        }
                        if self.has_transient(c, b, true) {
                            self.remove_transient_from_list(c, a);
                        }
                    }
                }
            }
        }
        self.break_transient_cycles(&members);
    }

    /// Last line of defense: drop any edge that closes a cycle
    fn break_transient_cycles(&mut self, members: &[ClientId]) {
        let mut done = HashSet::new();
        for &member in members {
            let mut path = Vec::new();
            self.break_cycles_from(member, &mut path, &mut done);
        }
    }

    fn break_cycles_from(
        &mut self,
        node: ClientId,
        path: &mut Vec<ClientId>,
        done: &mut HashSet<ClientId>,
    ) {
        if done.contains(&node) {
            return;
        }
        path.push(node);
        let children = self.clients.get(&node).map(|c| c.transients.clone()).unwrap_or_default();
        for child in children {
            if path.contains(&child) {
                warn!("Breaking transient loop {} -> {}", node, child);
                self.remove_transient(node, child);
                continue;
            }
            self.break_cycles_from(child, path, done);
        }
        path.pop();
        done.insert(node);
    }

    /// Group shared by other windows with the same client leader. Two
    /// groups claiming the same leader are merged into the first.
    pub fn find_client_leader_group(&mut self, id: ClientId) -> Option<GroupId> {
        let leader = self.clients.get(&id)?.wm_client_leader();
        let mut result: Option<GroupId> = None;
        for other in self.client_ids() {
            if other == id {
                continue;
            }
            let Some(oc) = self.clients.get(&other) else {
                continue;
            };
            if oc.wm_client_leader() != leader {
                continue;
            }
            let other_group = oc.group;
            match result {
                None => result = other_group,
                Some(g) if other_group == Some(g) || other_group.is_none() => {}
                Some(g) => {
                    debug!("Merging groups sharing client leader {:#x}", leader);
                    let members = self.group_members(other);
                    for m in members {
                        if m != id {
                            self.change_client_leader_group(m, g);
                        }
                    }
                }
            }
        }
        result
    }

    pub fn change_client_leader_group(&mut self, id: ClientId, group: GroupId) {
        let Some(c) = self.clients.get(&id) else {
            return;
        };
        // Transients stay with their parent, explicit groups stay put
        if c.transient_for.is_some() || c.group_leader.is_some() {
            return;
        }
        self.check_group(id, Some(group), false);
    }

    /// Heuristic used by desktop switching and taskbar grouping
    pub fn belongs_to_same_application(
        &self,
        a: ClientId,
        b: ClientId,
        checks: SameApplicationChecks,
    ) -> bool {
        let (Some(c1), Some(c2)) = (self.clients.get(&a), self.clients.get(&b)) else {
            return false;
        };
        let cross = checks.contains(SameApplicationChecks::ALLOW_CROSS_PROCESSES);
        let leader_set = |c: &crate::wm::client::Client| c.wm_client_leader() != c.window;

        if a == b
            || (c1.is_transient() && self.has_transient(b, a, true))
            || (c2.is_transient() && self.has_transient(a, b, true))
            || (c1.group.is_some() && c1.group == c2.group)
        {
            return true;
        }
        if leader_set(c1) && leader_set(c2) && c1.wm_client_leader() == c2.wm_client_leader() {
            return true;
        }
        if (c1.pid != c2.pid && !cross) || c1.machine.hostname != c2.machine.hostname {
            return false;
        }
        if leader_set(c1)
            && leader_set(c2)
            && c1.wm_client_leader() != c2.wm_client_leader()
            && !cross
        {
            return false;
        }
        if c1.resource_class != c2.resource_class {
            return false;
        }
        let relaxed = checks.contains(SameApplicationChecks::RELAXED_FOR_ACTIVE);
        if !self.same_app_window_role_match(a, b, relaxed) && !cross {
            return false;
        }
        // Without _NET_WM_PID there is no telling them apart
        c1.pid.is_some() && c2.pid.is_some()
    }

    fn same_app_window_role_match(&self, a: ClientId, b: ClientId, relaxed_for_active: bool) -> bool {
        let top = |id: ClientId| {
            let mut visited = HashSet::new();
            let mut cur = id;
            while let Some(p) = self.clients.get(&cur).and_then(|c| c.transient_for) {
                if !visited.insert(p) {
                    break;
                }
                cur = p;
            }
            cur
        };
        let group_of = |id: ClientId| self.clients.get(&id).and_then(|c| c.group);
        let (ta, tb) = (top(a), top(b));
        for t in [ta, tb] {
            if self.clients.get(&t).is_some_and(|c| c.group_transient()) {
                return group_of(ta) == group_of(tb);
            }
        }
        let marked = |id: ClientId| self.clients.get(&id).is_some_and(|c| c.window_role.contains('#'));
        if marked(ta) && marked(tb) {
            // Numbered roles are separate main windows of one program
            if !relaxed_for_active || (self.active != Some(ta) && self.active != Some(tb)) {
                return ta == tb;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::wm::client_flags::{Desktop, WindowType};
    use crate::wm::testing::{ROOT, TestSetup, WindowSpec};

    fn is_acyclic(t: &TestSetup) -> bool {
        fn visit(t: &TestSetup, id: ClientId, path: &mut Vec<ClientId>) -> bool {
            if path.contains(&id) {
                return false;
            }
            path.push(id);
            let ok = t
                .ws
                .client(id)
                .map(|c| c.transients.clone())
                .unwrap_or_default()
                .into_iter()
                .all(|child| visit(t, child, path));
            path.pop();
            ok
        }
        t.ws.client_ids().into_iter().all(|id| visit(t, id, &mut Vec::new()))
    }

    fn edges_consistent(t: &TestSetup) -> bool {
        t.ws.client_ids().into_iter().all(|id| {
            let c = t.ws.client(id).unwrap();
            let up_ok = c
                .transient_for
                .is_none_or(|p| t.ws.client(p).is_some_and(|p| p.transients.contains(&id)));
            let down_ok = c.transients.iter().all(|child| {
                t.ws
                    .client(*child)
                    .is_some_and(|cc| cc.transient_for.is_none_or(|p| p == id))
            });
            up_ok && down_ok
        })
    }

    #[test]
    fn test_dialog_follows_parent_desktop_and_group() {
        let mut t = TestSetup::new();
        t.ws.set_current_desktop(2);
        let b = t.manage(WindowSpec::normal(0x200).desktop(2));
        let a = t.manage(WindowSpec::normal(0x100).of_type(WindowType::Dialog).transient_for(0x200));

        let (ac, bc) = (t.ws.client(a).unwrap(), t.ws.client(b).unwrap());
        assert_eq!(ac.desktop, Desktop::Number(2));
        assert_eq!(ac.group, bc.group);
        assert_eq!(t.ws.main_clients(a), vec![b]);
        assert!(bc.transients.contains(&a));
    }

    #[test]
    fn test_self_pointer_becomes_group_transient() {
        let mut t = TestSetup::new();
        let a = t.manage(WindowSpec::normal(0x100).transient_for(0x100));
        assert_eq!(t.ws.client(a).unwrap().transient_target, TransientTarget::Group);
    }

    #[test]
    fn test_specific_loop_is_refused() {
        let mut t = TestSetup::new();
        let a = t.manage(WindowSpec::normal(0x100));
        let b = t.manage(WindowSpec::normal(0x200).transient_for(0x100));
        t.ws.read_transient(a, Some(0x200));
        assert_eq!(t.ws.client(b).unwrap().transient_for, Some(a));
        assert_eq!(t.ws.client(a).unwrap().transient_target, TransientTarget::Group);
        assert!(is_acyclic(&t));
    }

    #[test]
    fn test_group_transient_only_below_earlier_members() {
        let mut t = TestSetup::new();
        let first = t.manage(WindowSpec::normal(0x100).group_leader(0x100));
        let dialog = t.manage(WindowSpec::normal(0x200).group_leader(0x100).transient_for(ROOT));
        let later = t.manage(WindowSpec::normal(0x300).group_leader(0x100));

        assert!(t.ws.client(dialog).unwrap().group_transient());
        assert!(t.ws.has_transient(first, dialog, false));
        assert!(!t.ws.has_transient(later, dialog, false));
        assert_eq!(t.ws.main_clients(dialog), vec![first]);
    }

    #[test]
    fn test_parent_destroy_clears_child_edge() {
        let mut t = TestSetup::new();
        let parent = t.manage(WindowSpec::normal(0x100));
        let child = t.manage(WindowSpec::normal(0x200).transient_for(0x100));
        t.ws.destroy(parent);
        let c = t.ws.client(child).unwrap();
        assert_eq!(c.transient_for, None);
        assert!(!c.is_transient());
    }

    #[test]
    fn test_find_modal_prefers_deepest() {
        let mut t = TestSetup::new();
        let main = t.manage(WindowSpec::normal(0x100));
        let modal = t.manage(WindowSpec::normal(0x200).transient_for(0x100).modal());
        assert_eq!(t.ws.find_modal(main, false), Some(modal));
        assert_eq!(t.ws.find_modal(modal, false), None);
        assert_eq!(t.ws.find_modal(modal, true), Some(modal));
    }

    #[test]
    fn test_same_class_different_pid_is_different_app() {
        let mut t = TestSetup::new();
        let a = t.manage(WindowSpec::normal(0x100).class("term", "Term").pid(10));
        let b = t.manage(WindowSpec::normal(0x200).class("term", "Term").pid(11));
        assert!(!t.ws.belongs_to_same_application(a, b, SameApplicationChecks::empty()));
        assert!(t.ws.belongs_to_same_application(
            a,
            b,
            SameApplicationChecks::ALLOW_CROSS_PROCESSES
        ));
    }

    #[test]
    fn test_same_pid_and_class_is_same_app() {
        let mut t = TestSetup::new();
        let a = t.manage(WindowSpec::normal(0x100).class("term", "Term").pid(10));
        let b = t.manage(WindowSpec::normal(0x200).class("term", "Term").pid(10));
        assert!(t.ws.belongs_to_same_application(a, b, SameApplicationChecks::empty()));
    }

    #[test]
    fn test_numbered_roles_split_applications() {
        let mut t = TestSetup::new();
        let spec = |w| WindowSpec::normal(w).class("web", "Web").pid(7);
        let a = t.manage(spec(0x100).role("browser#1"));
        let b = t.manage(spec(0x200).role("browser#2"));
        assert!(!t.ws.belongs_to_same_application(a, b, SameApplicationChecks::empty()));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Transient { window: usize, target: usize },
        GroupTransient { window: usize },
        Clear { window: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..6usize, 0..6usize).prop_map(|(w, p)| Op::Transient { window: w, target: p }),
            (0..6usize).prop_map(|w| Op::GroupTransient { window: w }),
            (0..6usize).prop_map(|w| Op::Clear { window: w }),
        ]
    }

    proptest! {
        #[test]
        fn test_transient_graph_stays_acyclic(ops in proptest::collection::vec(op(), 1..40)) {
            let mut t = TestSetup::new();
            let windows: Vec<XWindow> = (0..6).map(|i| 0x100 + i as XWindow * 0x10).collect();
            let ids: Vec<ClientId> = windows
                .iter()
                .map(|w| t.manage(WindowSpec::normal(*w).group_leader(windows[0])))
                .collect();

            for op in ops {
                match op {
                    Op::Transient { window, target } => {
                        t.ws.read_transient(ids[window], Some(windows[target]))
                    }
                    Op::GroupTransient { window } => t.ws.read_transient(ids[window], Some(ROOT)),
                    Op::Clear { window } => t.ws.read_transient(ids[window], None),
                }
                prop_assert!(is_acyclic(&t));
                prop_assert!(edges_consistent(&t));
            }
        }
    }
}
