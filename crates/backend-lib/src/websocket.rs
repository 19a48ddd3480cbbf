// ==================
// crates/backend-lib/src/websocket.rs
// ==================
//! Per-connection supervisor.
//!
//! One `ConnectionSupervisor` exists for each live socket. It owns the
//! connection's identity and dispatches every inbound [`ClientEvent`] to the
//! registry, gate, relay and broadcaster. Each event is its own error
//! boundary: a failure is logged, counted and possibly reported back to the
//! client, and the connection keeps running.
//!
//! ```text
//! Connected ──join-meeting──▶ Identified
//!     │                           │
//!     └───────── close ───────────┴──▶ Disconnected
//! ```

use meetwire_common::{
    ClientEvent, ConnectionId, PresenceEntry, ServerEvent, UserInfo, VideoStarted,
};
use metrics::{counter, gauge};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::connections::Identity;
use crate::error::AppError;
use crate::gate::JoinPolicy;
use crate::metrics::{
    EVENT_FAILED, ROOM_JOINED, ROOM_JOIN_DENIED, WS_ACTIVE, WS_CONNECTION, WS_DISCONNECTION,
};
use crate::rooms::{meeting_id_of, meeting_room};
use crate::storage::Storage;
use crate::validation::{self, ValidationError};
use crate::AppState;

const JOIN_DENIED: &str = "You are not authorized to join this meeting";

/// Lifecycle of one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket open, identity unknown
    Connected,
    /// `join-meeting` recorded who is behind the socket
    Identified,
    Disconnected,
}

/// Supervisor for a single client connection
pub struct ConnectionSupervisor<S: Storage + Clone + 'static> {
    state: Arc<AppState<S>>,
    connection_id: ConnectionId,
    identity: Identity,
    status: ConnectionState,
}

impl<S: Storage + Clone + 'static> ConnectionSupervisor<S> {
    /// Register a new connection and hand back the receiving end of its
    /// outbound queue
    pub fn connect(state: Arc<AppState<S>>) -> (Self, mpsc::Receiver<ServerEvent>) {
        let connection_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(state.settings.server.outbound_buffer);
        state.connections.register(connection_id, tx);

        counter!(WS_CONNECTION).increment(1);
        gauge!(WS_ACTIVE).increment(1.0);
        tracing::debug!(%connection_id, "connection registered");

        let supervisor = Self {
            state,
            connection_id,
            identity: Identity::default(),
            status: ConnectionState::Connected,
        };
        (supervisor, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn status(&self) -> ConnectionState {
        self.status
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Queue an event for this connection only
    pub fn reply(&self, event: ServerEvent) -> bool {
        self.state.connections.send_to(self.connection_id, event)
    }

    /// Handle one inbound event. Never fails; errors stay scoped to the event.
    pub async fn handle(&mut self, event: ClientEvent) {
        let name = event.name();

        if let Err(e) = self.dispatch(event).await {
            counter!(EVENT_FAILED, "event" => name).increment(1);
            tracing::warn!(
                connection_id = %self.connection_id,
                event = name,
                code = e.error_code(),
                error = %e,
                "event handling failed"
            );

            if e.is_client_visible() {
                self.reply(ServerEvent::error(e.sanitized_message()));
            }
        }
    }

    async fn dispatch(&mut self, event: ClientEvent) -> Result<(), AppError> {
        match event {
            ClientEvent::JoinRoom(room) => self.join_room(&room).await,
            ClientEvent::LeaveRoom(room) => {
                self.state.rooms.leave(self.connection_id, &room);
                tracing::debug!(connection_id = %self.connection_id, room = %room, "left room");
                Ok(())
            },
            ClientEvent::SendMessage(draft) => {
                self.state
                    .presence
                    .broadcast_chat(self.connection_id, draft)
                    .await?;
                Ok(())
            },
            ClientEvent::NewComment(comment) => {
                self.state.presence.broadcast_comment(comment)?;
                Ok(())
            },
            ClientEvent::NewActivity(activity) => {
                self.state.presence.broadcast_activity(activity);
                Ok(())
            },
            ClientEvent::JoinMeeting(join) => {
                self.join_meeting(join.meeting_id, join.user_id, join.user_name)
                    .await
            },
            ClientEvent::WebrtcOffer(request) => {
                let from_user = UserInfo {
                    user_id: self.identity.user_id.clone(),
                    user_name: self.identity.user_name.clone(),
                };
                self.state
                    .relay
                    .relay_offer(self.connection_id, request.target, request.offer, from_user);
                Ok(())
            },
            ClientEvent::WebrtcAnswer(request) => {
                self.state
                    .relay
                    .relay_answer(self.connection_id, request.target, request.answer);
                Ok(())
            },
            ClientEvent::WebrtcIceCandidate(request) => {
                self.state.relay.relay_ice_candidate(
                    self.connection_id,
                    request.target,
                    request.candidate,
                );
                Ok(())
            },
            ClientEvent::VideoStarted(video) => self.video_started(video),
        }
    }

    async fn join_room(&mut self, room: &str) -> Result<(), AppError> {
        validation::validate_room(room)?;

        if let Some(meeting_id) = meeting_id_of(room) {
            let decision = self
                .state
                .gate
                .can_join(meeting_id, self.identity.user_id.as_deref())
                .await;
            if !decision.authorized {
                counter!(ROOM_JOIN_DENIED).increment(1);
                return Err(AppError::Forbidden(JOIN_DENIED.to_string()));
            }
        }

        self.state.rooms.join(self.connection_id, room);
        counter!(ROOM_JOINED).increment(1);
        tracing::debug!(connection_id = %self.connection_id, room, "joined room");
        Ok(())
    }

    async fn join_meeting(
        &mut self,
        meeting_id: String,
        user_id: String,
        user_name: String,
    ) -> Result<(), AppError> {
        validation::validate_meeting_id(&meeting_id)?;
        if user_id.trim().is_empty() {
            return Err(ValidationError::MissingField("userId").into());
        }

        if self.state.gate.policy() == JoinPolicy::Strict {
            let decision = self.state.gate.can_join(&meeting_id, Some(&user_id)).await;
            if !decision.authorized {
                counter!(ROOM_JOIN_DENIED).increment(1);
                return Err(AppError::Forbidden(JOIN_DENIED.to_string()));
            }
        }

        let room = meeting_room(&meeting_id);
        self.identity = Identity {
            user_id: Some(user_id),
            user_name: Some(user_name),
            meeting_id: Some(meeting_id),
        };
        self.status = ConnectionState::Identified;
        self.state
            .connections
            .identify(self.connection_id, self.identity.clone());

        self.state.rooms.join(self.connection_id, &room);
        counter!(ROOM_JOINED).increment(1);

        self.state.presence.announce_join(
            &room,
            self.identity.user_id.as_deref(),
            self.identity.user_name.as_deref(),
            self.connection_id,
        );

        let others = self.state.presence.list_presence(&room, self.connection_id);
        tracing::info!(
            connection_id = %self.connection_id,
            user_id = ?self.identity.user_id,
            room = %room,
            present = others.len(),
            "user joined meeting"
        );
        self.reply(ServerEvent::ConnectedUsers(others));
        Ok(())
    }

    fn video_started(&self, video: VideoStarted) -> Result<(), AppError> {
        let meeting_id = video
            .meeting_id
            .or_else(|| self.identity.meeting_id.clone())
            .ok_or(ValidationError::NoTarget)?;
        validation::validate_meeting_id(&meeting_id)?;

        let payload = PresenceEntry {
            user_id: video.user_id.or_else(|| self.identity.user_id.clone()),
            user_name: video.user_name.or_else(|| self.identity.user_name.clone()),
            socket_id: self.connection_id,
        };
        self.state.presence.broadcast_video_started(
            &meeting_room(&meeting_id),
            payload,
            self.connection_id,
        );
        Ok(())
    }

    /// Tear the connection down: announce the departure, leave every room
    /// and drop the outbound queue. Consuming `self` makes this run once.
    pub fn disconnect(mut self) {
        let rooms = self
            .state
            .rooms
            .remove_connection_everywhere(self.connection_id);

        if self.status == ConnectionState::Identified {
            if let Some(meeting_id) = &self.identity.meeting_id {
                self.state.presence.announce_leave(
                    &meeting_room(meeting_id),
                    self.identity.user_id.as_deref(),
                    self.identity.user_name.as_deref(),
                    self.connection_id,
                );
            }
        }

        self.state.connections.unregister(self.connection_id);
        self.status = ConnectionState::Disconnected;

        counter!(WS_DISCONNECTION).increment(1);
        gauge!(WS_ACTIVE).decrement(1.0);
        tracing::debug!(
            connection_id = %self.connection_id,
            rooms = rooms.len(),
            "connection closed"
        );
    }
}
