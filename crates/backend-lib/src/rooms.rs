// ============================
// crates/backend-lib/src/rooms.rs
// ============================
//! Room membership registry.
//!
//! Two sharded maps are kept in step: room → members and connection → rooms.
//! The reverse index lets disconnect cleanup touch only the rooms a
//! connection actually belongs to.
use dashmap::DashMap;
use meetwire_common::ConnectionId;
use metrics::gauge;
use std::collections::HashSet;

use crate::metrics::ROOMS_ACTIVE;

const MEETING_PREFIX: &str = "meeting-";

pub fn meeting_room(meeting_id: &str) -> String {
    format!("{MEETING_PREFIX}{meeting_id}")
}

pub fn task_room(task_id: &str) -> String {
    format!("task-{task_id}")
}

pub fn project_room(project_id: &str) -> String {
    format!("project-{project_id}")
}

pub fn document_room(document_id: &str) -> String {
    format!("document-{document_id}")
}

/// Meeting id behind a `meeting-<id>` label
pub fn meeting_id_of(room: &str) -> Option<&str> {
    room.strip_prefix(MEETING_PREFIX).filter(|id| !id.is_empty())
}

/// Registry of which connections are in which rooms
#[derive(Debug, Default)]
pub struct RoomRegistry {
    members: DashMap<String, HashSet<ConnectionId>>,
    memberships: DashMap<ConnectionId, HashSet<String>>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room. Joining twice is a no-op.
    pub fn join(&self, connection_id: ConnectionId, room: &str) {
        self.members
            .entry(room.to_string())
            .or_default()
            .insert(connection_id);
        self.memberships
            .entry(connection_id)
            .or_default()
            .insert(room.to_string());
        gauge!(ROOMS_ACTIVE).set(self.members.len() as f64);
    }

    /// Remove a connection from a room, dropping the room once empty
    pub fn leave(&self, connection_id: ConnectionId, room: &str) {
        if let Some(mut rooms) = self.memberships.get_mut(&connection_id) {
            rooms.remove(room);
        }
        self.memberships
            .remove_if(&connection_id, |_, rooms| rooms.is_empty());
        self.drop_member(room, connection_id);
    }

    /// Snapshot of a room's members; empty for an unknown room
    pub fn members_of(&self, room: &str) -> HashSet<ConnectionId> {
        self.members
            .get(room)
            .map(|members| members.clone())
            .unwrap_or_default()
    }

    /// Snapshot of the rooms a connection is in
    pub fn rooms_of(&self, connection_id: ConnectionId) -> HashSet<String> {
        self.memberships
            .get(&connection_id)
            .map(|rooms| rooms.clone())
            .unwrap_or_default()
    }

    /// Remove a connection from every room it joined and return those rooms
    pub fn remove_connection_everywhere(&self, connection_id: ConnectionId) -> Vec<String> {
        let Some((_, rooms)) = self.memberships.remove(&connection_id) else {
            return Vec::new();
        };

        let mut left: Vec<String> = rooms.into_iter().collect();
        left.sort();
        for room in &left {
            self.drop_member(room, connection_id);
        }
        left
    }

    pub fn room_count(&self) -> usize {
        self.members.len()
    }

    fn drop_member(&self, room: &str, connection_id: ConnectionId) {
        if let Some(mut members) = self.members.get_mut(room) {
            members.remove(&connection_id);
        }
        // checked under the shard lock so a concurrent join is never lost
        self.members.remove_if(room, |_, members| members.is_empty());
        gauge!(ROOMS_ACTIVE).set(self.members.len() as f64);
    }
}
