// ==============
// crates/backend-lib/src/metrics.rs

//! Central place for metric keys
pub const WS_CONNECTION: &str = "ws.connection";
pub const WS_DISCONNECTION: &str = "ws.disconnection";
pub const WS_ACTIVE: &str = "ws.active";
pub const WS_MALFORMED: &str = "ws.malformed";
pub const EVENT_FAILED: &str = "event.failed";
pub const ROOM_JOINED: &str = "room.joined";
pub const ROOM_JOIN_DENIED: &str = "room.join_denied";
pub const ROOMS_ACTIVE: &str = "room.active";
pub const CHAT_PERSISTED: &str = "chat.persisted";
pub const FANOUT_DROPPED: &str = "fanout.dropped";
pub const SIGNAL_RELAYED: &str = "signal.relayed";
pub const SIGNAL_DROPPED: &str = "signal.dropped";
pub const MEETING_ACTIVATED: &str = "meeting.activated";
pub const MEETING_ENDED: &str = "meeting.ended";
pub const RATE_LIMITED: &str = "http.rate_limited";
