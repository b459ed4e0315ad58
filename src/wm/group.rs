//! Group Module
//!
//! Window groups keyed by their group leader. Members are kept in the order
//! they joined; every membership carries a sequence number so "who joined
//! first" never depends on iteration order.

use std::fmt;

use tracing::debug;

use crate::wm::Workspace;
use crate::wm::client::ClientId;
use crate::wm::display::{Timestamp, XWindow, timestamp_compare};
use crate::wm::properties::Icon;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupId(u64);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub client: ClientId,
    pub seq: u64,
}

#[derive(Debug, Clone)]
pub struct Group {
    pub id: GroupId,
    /// `None` for a group synthesized around a window without a leader
    pub leader: Option<XWindow>,
    pub members: Vec<Member>,
    pub refcount: u32,
    pub icon: Option<Icon>,
    pub user_time: Option<Timestamp>,
}

impl Group {
    pub fn member_ids(&self) -> Vec<ClientId> {
        self.members.iter().map(|m| m.client).collect()
    }

    pub fn contains(&self, client: ClientId) -> bool {
        self.members.iter().any(|m| m.client == client)
    }

    pub fn seq_of(&self, client: ClientId) -> Option<u64> {
        self.members.iter().find(|m| m.client == client).map(|m| m.seq)
    }

    pub fn update_user_time(&mut self, time: Timestamp) {
        let newer = self
            .user_time
            .is_none_or(|t| timestamp_compare(time, t) == std::cmp::Ordering::Greater);
        if newer {
            self.user_time = Some(time);
        }
    }
}

impl Workspace {
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    pub fn find_group(&self, leader: XWindow) -> Option<GroupId> {
        self.groups
            .values()
            .find(|g| g.leader == Some(leader))
            .map(|g| g.id)
    }

    pub(crate) fn create_group(&mut self, leader: Option<XWindow>) -> GroupId {
        let id = GroupId(self.next_group);
        self.next_group += 1;
        debug!("Creating {} (leader {:?})", id, leader);
        self.groups.insert(
            id,
            Group { id, leader, members: Vec::new(), refcount: 0, icon: None, user_time: None },
        );
        id
    }

    /// Members of the client's group in join order
    pub fn group_members(&self, client: ClientId) -> Vec<ClientId> {
        self.clients
            .get(&client)
            .and_then(|c| c.group)
            .and_then(|g| self.groups.get(&g))
            .map(Group::member_ids)
            .unwrap_or_default()
    }

    pub(crate) fn member_seq(&self, client: ClientId) -> Option<u64> {
        let group = self.clients.get(&client)?.group?;
        self.groups.get(&group)?.seq_of(client)
    }

    pub(crate) fn add_group_member(&mut self, group: GroupId, client: ClientId) {
        let seq = self.next_member_seq;
        self.next_member_seq += 1;
        if let Some(g) = self.groups.get_mut(&group) {
            if !g.contains(client) {
                g.members.push(Member { client, seq });
            }
        }
        if let Some(c) = self.clients.get_mut(&client) {
            c.group = Some(group);
        }
    }

    pub(crate) fn remove_group_member(&mut self, group: GroupId, client: ClientId) {
        if let Some(g) = self.groups.get_mut(&group) {
            g.members.retain(|m| m.client != client);
        }
        self.update_group_icon(group);
        self.maybe_drop_group(group);
    }

    /// Cache the group's icon: the leader's when it is managed and has one,
    /// else that of the earliest member carrying an icon
    pub(crate) fn update_group_icon(&mut self, group: GroupId) {
        let Some(g) = self.groups.get(&group) else {
            return;
        };
        let from_leader = g
            .leader
            .and_then(|leader| self.find_client(leader))
            .and_then(|leader| self.clients.get(&leader))
            .and_then(|c| c.icon.clone());
        let icon = from_leader.or_else(|| {
            g.members
                .iter()
                .filter_map(|m| self.clients.get(&m.client))
                .find_map(|c| c.icon.clone())
        });
        if let Some(g) = self.groups.get_mut(&group) {
            g.icon = icon;
        }
    }

    pub(crate) fn ref_group(&mut self, group: GroupId) {
        if let Some(g) = self.groups.get_mut(&group) {
            g.refcount += 1;
        }
    }

    pub(crate) fn deref_group(&mut self, group: GroupId) {
        if let Some(g) = self.groups.get_mut(&group) {
            g.refcount = g.refcount.saturating_sub(1);
        }
        self.maybe_drop_group(group);
    }

    fn maybe_drop_group(&mut self, group: GroupId) {
        let empty = self
            .groups
            .get(&group)
            .is_some_and(|g| g.members.is_empty() && g.refcount == 0);
        if empty {
            debug!("Deleting {}", group);
            self.groups.remove(&group);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wm::testing::{TestSetup, WindowSpec};

    #[test]
    fn test_user_time_only_moves_forward() {
        let mut g = Group {
            id: GroupId(0),
            leader: None,
            members: Vec::new(),
            refcount: 0,
            icon: None,
            user_time: None,
        };
        g.update_user_time(0xFFFF_FFF0);
        g.update_user_time(0x10);
        assert_eq!(g.user_time, Some(0x10));
        g.update_user_time(0xFFFF_FFF0);
        assert_eq!(g.user_time, Some(0x10));
    }

    #[test]
    fn test_group_icon_follows_leader() {
        let mut t = TestSetup::new();
        let small = Icon { width: 1, height: 1, data: vec![0xFF00_0000] };
        let big = Icon { width: 2, height: 1, data: vec![0xFFFF_FFFF; 2] };
        let member = t.manage(WindowSpec::normal(0x200).group_leader(0x100).icon(small.clone()));
        let group = t.ws.client(member).unwrap().group.unwrap();
        // Leader not managed yet, so the member's icon stands in
        assert_eq!(t.ws.group(group).unwrap().icon, Some(small.clone()));

        let leader = t.manage(WindowSpec::normal(0x100).group_leader(0x100).icon(big.clone()));
        assert_eq!(t.ws.client(leader).unwrap().group, Some(group));
        assert_eq!(t.ws.group(group).unwrap().icon, Some(big));

        t.ws.update_icon(leader, None);
        assert_eq!(t.ws.group(group).unwrap().icon, Some(small));
        t.ws.update_icon(member, None);
        assert_eq!(t.ws.group(group).unwrap().icon, None);
    }
}
