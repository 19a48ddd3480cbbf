// ============================
// crates/backend-lib/src/validation/mod.rs
// ============================
//! Payload validation for socket events and REST bodies.

use meetwire_common::ChatDraft;
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

const MAX_ROOM_LENGTH: usize = 128;
const MAX_MEETING_ID_LENGTH: usize = 64;
pub const MAX_CHAT_LENGTH: usize = 4000;
const MAX_TITLE_LENGTH: usize = 200;

// Dots are excluded so a label can never name a relative path.
static ROOM_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_:-]+$").expect("room pattern"));
static MEETING_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("meeting id pattern"));
static MEETING_CODE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-F]{8}$").expect("meeting code pattern"));

/// Possible validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Invalid room: {0}")]
    InvalidRoom(String),

    #[error("Invalid meeting ID: {0}")]
    InvalidMeetingId(String),

    #[error("Invalid meeting code")]
    InvalidMeetingCode,

    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Event has no target room")]
    NoTarget,
}

/// Result type for validation operations
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate a room label
pub fn validate_room(room: &str) -> ValidationResult<&str> {
    if room.is_empty() {
        return Err(ValidationError::InvalidRoom(
            "Room must not be empty".to_string(),
        ));
    }

    if room.len() > MAX_ROOM_LENGTH {
        return Err(ValidationError::InvalidRoom(format!(
            "Room must be at most {MAX_ROOM_LENGTH} characters"
        )));
    }

    if !ROOM_REGEX.is_match(room) {
        return Err(ValidationError::InvalidRoom(
            "Room must contain only alphanumeric characters, '_', ':' and '-'".to_string(),
        ));
    }

    Ok(room)
}

/// Validate a meeting ID
pub fn validate_meeting_id(meeting_id: &str) -> ValidationResult<&str> {
    if meeting_id.is_empty() {
        return Err(ValidationError::InvalidMeetingId(
            "Meeting ID must not be empty".to_string(),
        ));
    }

    if meeting_id.len() > MAX_MEETING_ID_LENGTH {
        return Err(ValidationError::InvalidMeetingId(format!(
            "Meeting ID must be at most {MAX_MEETING_ID_LENGTH} characters"
        )));
    }

    if !MEETING_ID_REGEX.is_match(meeting_id) {
        return Err(ValidationError::InvalidMeetingId(
            "Meeting ID must contain only alphanumeric characters, '_' and '-'".to_string(),
        ));
    }

    Ok(meeting_id)
}

/// Validate a join code (8 uppercase hex characters)
pub fn validate_meeting_code(code: &str) -> ValidationResult<&str> {
    if MEETING_CODE_REGEX.is_match(code) {
        Ok(code)
    } else {
        Err(ValidationError::InvalidMeetingCode)
    }
}

/// Validate a chat message before it is persisted
pub fn validate_chat(draft: &ChatDraft) -> ValidationResult<()> {
    if draft.content.trim().is_empty() {
        return Err(ValidationError::MissingField("content"));
    }
    if draft.content.chars().count() > MAX_CHAT_LENGTH {
        return Err(ValidationError::TooLong {
            field: "content",
            max: MAX_CHAT_LENGTH,
        });
    }
    if draft.sender.trim().is_empty() {
        return Err(ValidationError::MissingField("sender"));
    }
    if let Some(room) = &draft.room {
        validate_room(room)?;
    }
    Ok(())
}

/// Validate a meeting title
pub fn validate_title(title: &str) -> ValidationResult<&str> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ValidationError::MissingField("title"));
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(ValidationError::TooLong {
            field: "title",
            max: MAX_TITLE_LENGTH,
        });
    }
    Ok(title)
}
