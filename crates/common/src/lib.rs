// ================
// common/src/lib.rs
// ================
//! Wire types shared by the `meetwire` server and its clients.
//!
//! Every frame on the real-time socket is a JSON object of the form
//! `{"event": "<name>", "data": <payload>}`. Event names follow the
//! existing browser client, which is why some are camelCase and others are
//! kebab-case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Server-assigned identifier of one live socket (`socketId` on the wire)
pub type ConnectionId = Uuid;

/// Events sent from client to server
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    /// Join an arbitrary room label (`task-1`, `meeting-42`, ...)
    #[serde(rename = "joinRoom")]
    JoinRoom(String),
    /// Leave a room label
    #[serde(rename = "leaveRoom")]
    LeaveRoom(String),
    /// Post a chat message
    #[serde(rename = "sendMessage")]
    SendMessage(ChatDraft),
    /// A comment was created on a task, project or document
    #[serde(rename = "newComment")]
    NewComment(CommentEvent),
    /// An activity log entry was created
    #[serde(rename = "newActivity")]
    NewActivity(ActivityEvent),
    /// Identify this connection and enter a meeting room
    #[serde(rename = "join-meeting")]
    JoinMeeting(JoinMeeting),
    #[serde(rename = "webrtc-offer")]
    WebrtcOffer(OfferRequest),
    #[serde(rename = "webrtc-answer")]
    WebrtcAnswer(AnswerRequest),
    #[serde(rename = "webrtc-ice-candidate")]
    WebrtcIceCandidate(IceCandidateRequest),
    /// The sender turned its camera on
    #[serde(rename = "videoStarted")]
    VideoStarted(VideoStarted),
}

impl ClientEvent {
    /// Wire name of the event, used for logging and metrics labels
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinRoom(_) => "joinRoom",
            ClientEvent::LeaveRoom(_) => "leaveRoom",
            ClientEvent::SendMessage(_) => "sendMessage",
            ClientEvent::NewComment(_) => "newComment",
            ClientEvent::NewActivity(_) => "newActivity",
            ClientEvent::JoinMeeting(_) => "join-meeting",
            ClientEvent::WebrtcOffer(_) => "webrtc-offer",
            ClientEvent::WebrtcAnswer(_) => "webrtc-answer",
            ClientEvent::WebrtcIceCandidate(_) => "webrtc-ice-candidate",
            ClientEvent::VideoStarted(_) => "videoStarted",
        }
    }
}

/// Events sent from server to client
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// First frame on every socket, tells the client its own id
    #[serde(rename = "connected")]
    Connected(Welcome),
    #[serde(rename = "receiveMessage")]
    ReceiveMessage(ChatMessage),
    #[serde(rename = "commentAdded")]
    CommentAdded(CommentEvent),
    /// Room-scoped activity notification
    #[serde(rename = "activityAdded")]
    ActivityAdded(ActivityEvent),
    /// Global activity notification for dashboards
    #[serde(rename = "activityUpdated")]
    ActivityUpdated(ActivityEvent),
    #[serde(rename = "user-joined")]
    UserJoined(PresenceEntry),
    #[serde(rename = "user-left")]
    UserLeft(PresenceEntry),
    /// Direct reply to `join-meeting`: everybody else already in the room
    #[serde(rename = "connected-users")]
    ConnectedUsers(Vec<PresenceEntry>),
    #[serde(rename = "webrtc-offer")]
    WebrtcOffer(RelayedOffer),
    #[serde(rename = "webrtc-answer")]
    WebrtcAnswer(RelayedAnswer),
    #[serde(rename = "webrtc-ice-candidate")]
    WebrtcIceCandidate(RelayedIceCandidate),
    #[serde(rename = "user-video-started")]
    UserVideoStarted(PresenceEntry),
    #[serde(rename = "error")]
    Error(ErrorNotice),
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Connected(_) => "connected",
            ServerEvent::ReceiveMessage(_) => "receiveMessage",
            ServerEvent::CommentAdded(_) => "commentAdded",
            ServerEvent::ActivityAdded(_) => "activityAdded",
            ServerEvent::ActivityUpdated(_) => "activityUpdated",
            ServerEvent::UserJoined(_) => "user-joined",
            ServerEvent::UserLeft(_) => "user-left",
            ServerEvent::ConnectedUsers(_) => "connected-users",
            ServerEvent::WebrtcOffer(_) => "webrtc-offer",
            ServerEvent::WebrtcAnswer(_) => "webrtc-answer",
            ServerEvent::WebrtcIceCandidate(_) => "webrtc-ice-candidate",
            ServerEvent::UserVideoStarted(_) => "user-video-started",
            ServerEvent::Error(_) => "error",
        }
    }

    /// Shorthand for a scoped `error` event
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error(ErrorNotice {
            message: message.into(),
        })
    }
}

/// Chat message as submitted by a client.
///
/// `content` and `sender` default to empty so that a missing field surfaces
/// as a validation error instead of an unparseable frame.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChatDraft {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
}

/// Kind of a persisted chat message
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    User,
    Bot,
    Meeting,
}

/// A persisted, immutable chat message
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
}

/// Comment notification. Fields other than the three targets are opaque and
/// relayed untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct CommentEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Activity log notification. Fields other than the three targets are opaque
/// and relayed untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ActivityEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JoinMeeting {
    pub meeting_id: String,
    pub user_id: String,
    pub user_name: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct VideoStarted {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meeting_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
}

/// One row of a room roster
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub socket_id: ConnectionId,
}

/// Identity attached to a relayed offer
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct OfferRequest {
    pub target: ConnectionId,
    pub offer: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnswerRequest {
    pub target: ConnectionId,
    pub answer: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct IceCandidateRequest {
    pub target: ConnectionId,
    pub candidate: Value,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RelayedOffer {
    pub offer: Value,
    pub from: ConnectionId,
    pub from_user: UserInfo,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RelayedAnswer {
    pub answer: Value,
    pub from: ConnectionId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RelayedIceCandidate {
    pub candidate: Value,
    pub from: ConnectionId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Welcome {
    pub socket_id: ConnectionId,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ErrorNotice {
    pub message: String,
}
