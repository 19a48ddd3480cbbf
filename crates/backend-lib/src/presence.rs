// ============================
// crates/backend-lib/src/presence.rs
// ============================
//! Presence announcements and room-scoped fan-out of chat, comments and
//! activity.
use chrono::Utc;
use meetwire_common::{
    ActivityEvent, ChatDraft, ChatMessage, CommentEvent, ConnectionId, MessageType,
    PresenceEntry, ServerEvent,
};
use metrics::counter;
use std::sync::Arc;
use uuid::Uuid;

use crate::connections::ConnectionTable;
use crate::error::AppError;
use crate::metrics::CHAT_PERSISTED;
use crate::rooms::{document_room, project_room, task_room, RoomRegistry};
use crate::storage::Storage;
use crate::validation::{self, ValidationError};

#[derive(Clone)]
pub struct PresenceBroadcaster<S> {
    rooms: Arc<RoomRegistry>,
    connections: Arc<ConnectionTable>,
    storage: S,
    broadcast_without_room: bool,
}

impl<S: Storage + Clone + 'static> PresenceBroadcaster<S> {
    pub fn new(
        rooms: Arc<RoomRegistry>,
        connections: Arc<ConnectionTable>,
        storage: S,
        broadcast_without_room: bool,
    ) -> Self {
        Self {
            rooms,
            connections,
            storage,
            broadcast_without_room,
        }
    }

    /// Tell everyone else in `room` that a user arrived
    pub fn announce_join(
        &self,
        room: &str,
        user_id: Option<&str>,
        user_name: Option<&str>,
        connection_id: ConnectionId,
    ) -> usize {
        let event = ServerEvent::UserJoined(entry(user_id, user_name, connection_id));
        self.to_room_except(room, connection_id, &event)
    }

    /// Roster of `room` without `excluding`
    pub fn list_presence(&self, room: &str, excluding: ConnectionId) -> Vec<PresenceEntry> {
        let mut roster: Vec<PresenceEntry> = self
            .rooms
            .members_of(room)
            .into_iter()
            .filter(|id| *id != excluding)
            .filter_map(|id| {
                self.connections.identity_of(id).map(|identity| PresenceEntry {
                    user_id: identity.user_id,
                    user_name: identity.user_name,
                    socket_id: id,
                })
            })
            .collect();
        roster.sort_by(|a, b| a.user_name.cmp(&b.user_name).then(a.socket_id.cmp(&b.socket_id)));
        roster
    }

    /// Tell the remaining members of `room` that a user left
    pub fn announce_leave(
        &self,
        room: &str,
        user_id: Option<&str>,
        user_name: Option<&str>,
        connection_id: ConnectionId,
    ) -> usize {
        let event = ServerEvent::UserLeft(entry(user_id, user_name, connection_id));
        self.to_room_except(room, connection_id, &event)
    }

    /// Persist a chat message, then deliver it.
    ///
    /// With a room the message goes to every member of that room, the sender
    /// included. Without one it goes to every connection, if allowed. Nothing
    /// is delivered when the message cannot be stored.
    pub async fn broadcast_chat(
        &self,
        origin: ConnectionId,
        draft: ChatDraft,
    ) -> Result<ChatMessage, AppError> {
        validation::validate_chat(&draft)?;
        if draft.room.is_none() && !self.broadcast_without_room {
            return Err(ValidationError::NoTarget.into());
        }

        let message = self.persist(draft).await?;

        let event = ServerEvent::ReceiveMessage(message.clone());
        let delivered = match &message.room {
            Some(room) => self.connections.deliver(self.rooms.members_of(room), &event),
            None => self.connections.broadcast_all(&event),
        };
        tracing::debug!(%origin, room = ?message.room, delivered, "chat message delivered");

        Ok(message)
    }

    /// Store a room message without delivering it to anyone
    pub async fn record_message(&self, draft: ChatDraft) -> Result<ChatMessage, AppError> {
        if draft.room.is_none() {
            return Err(ValidationError::MissingField("room").into());
        }
        validation::validate_chat(&draft)?;
        self.persist(draft).await
    }

    async fn persist(&self, draft: ChatDraft) -> Result<ChatMessage, AppError> {
        let message = ChatMessage {
            id: Uuid::new_v4(),
            content: draft.content,
            timestamp: Utc::now(),
            sender: draft.sender,
            sender_name: draft.sender_name,
            room: draft.room,
            message_type: MessageType::Meeting,
        };

        self.storage.append_message(&message).await?;
        counter!(CHAT_PERSISTED).increment(1);
        Ok(message)
    }

    /// Deliver a comment to the room of the first target it names, in the
    /// order task, project, document
    pub fn broadcast_comment(&self, comment: CommentEvent) -> Result<usize, AppError> {
        let room = comment
            .task_id
            .as_deref()
            .map(task_room)
            .or_else(|| comment.project_id.as_deref().map(project_room))
            .or_else(|| comment.document_id.as_deref().map(document_room))
            .ok_or(ValidationError::NoTarget)?;

        let event = ServerEvent::CommentAdded(comment);
        Ok(self.connections.deliver(self.rooms.members_of(&room), &event))
    }

    /// Deliver an activity entry to each room it names, then to everybody as
    /// a global update
    pub fn broadcast_activity(&self, activity: ActivityEvent) -> usize {
        let rooms = [
            activity.task.as_deref().map(task_room),
            activity.project.as_deref().map(project_room),
            activity.document.as_deref().map(document_room),
        ];

        let scoped = ServerEvent::ActivityAdded(activity.clone());
        let mut delivered = 0;
        for room in rooms.into_iter().flatten() {
            delivered += self.connections.deliver(self.rooms.members_of(&room), &scoped);
        }

        delivered + self.connections.broadcast_all(&ServerEvent::ActivityUpdated(activity))
    }

    pub fn broadcast_video_started(
        &self,
        room: &str,
        payload: PresenceEntry,
        excluding: ConnectionId,
    ) -> usize {
        self.to_room_except(room, excluding, &ServerEvent::UserVideoStarted(payload))
    }

    /// Most recent `limit` meeting messages of `room`, oldest first
    pub async fn get_room_history(
        &self,
        room: &str,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, AppError> {
        validation::validate_room(room)?;

        let mut history: Vec<ChatMessage> = self
            .storage
            .room_messages(room)
            .await?
            .into_iter()
            .filter(|m| m.message_type == MessageType::Meeting && m.room.as_deref() == Some(room))
            .collect();

        // the log is append-ordered already; the sort only matters for
        // hand-edited files
        history.sort_by_key(|m| m.timestamp);
        let skip = history.len().saturating_sub(limit);
        Ok(history.split_off(skip))
    }

    fn to_room_except(&self, room: &str, excluding: ConnectionId, event: &ServerEvent) -> usize {
        let recipients = self
            .rooms
            .members_of(room)
            .into_iter()
            .filter(|id| *id != excluding);
        self.connections.deliver(recipients, event)
    }
}

fn entry(user_id: Option<&str>, user_name: Option<&str>, socket_id: ConnectionId) -> PresenceEntry {
    PresenceEntry {
        user_id: user_id.map(str::to_string),
        user_name: user_name.map(str::to_string),
        socket_id,
    }
}
