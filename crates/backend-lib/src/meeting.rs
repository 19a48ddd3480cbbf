// ============================
// crates/backend-lib/src/meeting.rs
// ============================
//! Meeting model and lifecycle management.
//!
//! ```text
//! scheduled ──activate──▶ in-progress ──deactivate──▶ completed
//!     │                        ▲   │
//!     │                        └───┘ activate (new code)
//!     └──cancel──▶ cancelled
//! ```
//! `completed` and `cancelled` are terminal.
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use metrics::counter;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::error::AppError;
use crate::metrics::{MEETING_ACTIVATED, MEETING_ENDED};
use crate::rooms::meeting_room;
use crate::storage::Storage;
use crate::validation::{self, ValidationError};

/// Random bytes behind a join code; rendered as twice as many hex characters
const CODE_BYTES: usize = 4;
/// Redraws allowed when a fresh code collides with another active meeting
const MAX_CODE_ATTEMPTS: usize = 5;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MeetingStatus {
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl MeetingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MeetingStatus::Scheduled => "scheduled",
            MeetingStatus::InProgress => "in-progress",
            MeetingStatus::Completed => "completed",
            MeetingStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, MeetingStatus::Completed | MeetingStatus::Cancelled)
    }
}

impl fmt::Display for MeetingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted meeting
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    /// User id of the organizer
    pub organizer: String,
    #[serde(default)]
    pub participants: BTreeSet<String>,
    #[serde(default)]
    pub project: Option<String>,
    pub status: MeetingStatus,
    pub meeting_url: Option<String>,
    pub meeting_code: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// Room label of this meeting's real-time channel
    pub fn room(&self) -> String {
        meeting_room(&self.id)
    }

    pub fn is_organizer(&self, user_id: &str) -> bool {
        self.organizer == user_id
    }

    /// Organizer or invited participant
    pub fn admits(&self, user_id: &str) -> bool {
        self.is_organizer(user_id) || self.participants.contains(user_id)
    }
}

/// Request body for scheduling a meeting
#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewMeeting {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub project: Option<String>,
}

/// Request body for editing a meeting; absent fields are left unchanged.
/// Status, organizer and join code are never editable.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct MeetingUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub location: Option<String>,
    pub participants: Option<Vec<String>>,
    pub project: Option<String>,
}

/// Result of a successful activation
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActivatedMeeting {
    pub id: String,
    pub title: String,
    pub meeting_code: String,
    pub meeting_url: String,
}

/// What a user learns when joining by code
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MeetingSummary {
    pub id: String,
    pub title: String,
    pub organizer: String,
    pub meeting_url: Option<String>,
}

/// Generate a join code: 8 uppercase hex characters from a CSPRNG
pub fn generate_meeting_code() -> String {
    let mut bytes = [0u8; CODE_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02X}")).collect()
}

/// Build the client-facing URL of an active meeting
pub fn meeting_url(prefix: &str, meeting_id: &str, code: &str) -> String {
    format!("{}/{meeting_id}?code={code}", prefix.trim_end_matches('/'))
}

fn check_schedule(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<(), ValidationError> {
    if end < start {
        return Err(ValidationError::InvalidSchedule(
            "endTime must not be before startTime".to_string(),
        ));
    }
    Ok(())
}

/// Owns the meeting state machine on top of a storage backend.
///
/// Every read-modify-write of one meeting runs under that meeting's lock.
#[derive(Clone)]
pub struct MeetingManager<S> {
    storage: S,
    url_prefix: String,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl<S: Storage + Clone + 'static> MeetingManager<S> {
    pub fn new(storage: S, url_prefix: impl Into<String>) -> Self {
        Self {
            storage,
            url_prefix: url_prefix.into(),
            locks: Arc::new(DashMap::new()),
        }
    }

    async fn lock(&self, meeting_id: &str) -> OwnedMutexGuard<()> {
        let lock = self.locks.entry(meeting_id.to_string()).or_default().clone();
        lock.lock_owned().await
    }

    /// Persist a new meeting in the `scheduled` state
    pub async fn schedule(&self, organizer: &str, new: NewMeeting) -> Result<Meeting, AppError> {
        let title = validation::validate_title(&new.title)?.to_string();
        check_schedule(new.start_time, new.end_time)?;

        let now = Utc::now();
        let meeting = Meeting {
            id: Uuid::new_v4().to_string(),
            title,
            description: new.description,
            start_time: new.start_time,
            end_time: new.end_time,
            location: new.location,
            organizer: organizer.to_string(),
            participants: new.participants.into_iter().collect(),
            project: new.project,
            status: MeetingStatus::Scheduled,
            meeting_url: None,
            meeting_code: None,
            is_active: false,
            created_at: now,
            updated_at: now,
        };

        self.storage.save_meeting(&meeting).await?;
        tracing::info!(meeting_id = %meeting.id, organizer, "meeting scheduled");
        Ok(meeting)
    }

    /// Fetch a meeting or fail with `NotFound`
    pub async fn get(&self, meeting_id: &str) -> Result<Meeting, AppError> {
        validation::validate_meeting_id(meeting_id)?;
        self.storage
            .get_meeting(meeting_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Meeting {meeting_id}")))
    }

    /// Look a meeting up without failing on absence
    pub async fn find(&self, meeting_id: &str) -> Result<Option<Meeting>, AppError> {
        validation::validate_meeting_id(meeting_id)?;
        self.storage.get_meeting(meeting_id).await
    }

    /// Every meeting, earliest start first
    pub async fn list(&self) -> Result<Vec<Meeting>, AppError> {
        let mut meetings = self.storage.list_meetings().await?;
        meetings.sort_by_key(|m| m.start_time);
        Ok(meetings)
    }

    pub async fn list_active(&self) -> Result<Vec<Meeting>, AppError> {
        let mut meetings: Vec<_> = self
            .storage
            .list_meetings()
            .await?
            .into_iter()
            .filter(|m| m.is_active)
            .collect();
        meetings.sort_by_key(|m| m.start_time);
        Ok(meetings)
    }

    /// Move a meeting to `in-progress` with a fresh join code.
    ///
    /// Activating a meeting that is already in progress draws a new code and
    /// invalidates the previous one.
    pub async fn activate(&self, meeting_id: &str) -> Result<ActivatedMeeting, AppError> {
        validation::validate_meeting_id(meeting_id)?;
        let _guard = self.lock(meeting_id).await;
        let mut meeting = self.get(meeting_id).await?;
        self.activate_meeting(&mut meeting).await
    }

    async fn activate_meeting(&self, meeting: &mut Meeting) -> Result<ActivatedMeeting, AppError> {
        if meeting.status.is_terminal() {
            return Err(AppError::InvalidTransition {
                meeting_id: meeting.id.clone(),
                from: meeting.status,
                to: MeetingStatus::InProgress,
            });
        }
        if meeting.is_active {
            tracing::warn!(meeting_id = %meeting.id, "re-activating an active meeting, previous code is revoked");
        }

        let code = self.unused_code(&meeting.id).await?;
        let url = meeting_url(&self.url_prefix, &meeting.id, &code);

        meeting.meeting_code = Some(code.clone());
        meeting.meeting_url = Some(url.clone());
        meeting.is_active = true;
        meeting.status = MeetingStatus::InProgress;
        meeting.updated_at = Utc::now();

        self.storage.save_meeting(meeting).await?;

        counter!(MEETING_ACTIVATED).increment(1);
        tracing::info!(meeting_id = %meeting.id, "meeting activated");

        Ok(ActivatedMeeting {
            id: meeting.id.clone(),
            title: meeting.title.clone(),
            meeting_code: code,
            meeting_url: url,
        })
    }

    async fn unused_code(&self, meeting_id: &str) -> Result<String, AppError> {
        for _ in 0..MAX_CODE_ATTEMPTS {
            let code = generate_meeting_code();
            let holder = self.storage.find_active_meeting_by_code(&code).await?;
            if holder.is_none_or(|m| m.id == meeting_id) {
                return Ok(code);
            }
            tracing::debug!(meeting_id, "join code collision, drawing again");
        }
        Err(AppError::Internal(
            "could not draw an unused meeting code".to_string(),
        ))
    }

    /// Move a meeting to `completed`
    pub async fn deactivate(&self, meeting_id: &str) -> Result<Meeting, AppError> {
        validation::validate_meeting_id(meeting_id)?;
        let _guard = self.lock(meeting_id).await;
        let mut meeting = self.get(meeting_id).await?;

        match meeting.status {
            MeetingStatus::Cancelled => {
                return Err(AppError::InvalidTransition {
                    meeting_id: meeting.id,
                    from: MeetingStatus::Cancelled,
                    to: MeetingStatus::Completed,
                });
            },
            MeetingStatus::Completed if !meeting.is_active => return Ok(meeting),
            _ => {},
        }

        meeting.is_active = false;
        meeting.status = MeetingStatus::Completed;
        meeting.updated_at = Utc::now();
        self.storage.save_meeting(&meeting).await?;

        counter!(MEETING_ENDED).increment(1);
        tracing::info!(meeting_id = %meeting.id, "meeting ended");
        Ok(meeting)
    }

    /// Move a scheduled meeting to `cancelled`
    pub async fn cancel(&self, meeting_id: &str) -> Result<Meeting, AppError> {
        validation::validate_meeting_id(meeting_id)?;
        let _guard = self.lock(meeting_id).await;
        let mut meeting = self.get(meeting_id).await?;

        if meeting.status != MeetingStatus::Scheduled {
            return Err(AppError::InvalidTransition {
                meeting_id: meeting.id,
                from: meeting.status,
                to: MeetingStatus::Cancelled,
            });
        }

        meeting.status = MeetingStatus::Cancelled;
        meeting.updated_at = Utc::now();
        self.storage.save_meeting(&meeting).await?;

        tracing::info!(meeting_id = %meeting.id, "meeting cancelled");
        Ok(meeting)
    }

    /// Apply an organizer's edits to a meeting that has not finished.
    ///
    /// Title and times are validated against the merged result.
    pub async fn update(
        &self,
        meeting_id: &str,
        user_id: &str,
        changes: MeetingUpdate,
    ) -> Result<Meeting, AppError> {
        validation::validate_meeting_id(meeting_id)?;
        let _guard = self.lock(meeting_id).await;
        let mut meeting = self.get_as_organizer(meeting_id, user_id).await?;

        if meeting.status.is_terminal() {
            return Err(AppError::MeetingClosed {
                meeting_id: meeting.id,
                status: meeting.status,
            });
        }

        if let Some(title) = changes.title {
            meeting.title = validation::validate_title(&title)?.to_string();
        }
        let start_time = changes.start_time.unwrap_or(meeting.start_time);
        let end_time = changes.end_time.unwrap_or(meeting.end_time);
        check_schedule(start_time, end_time)?;
        meeting.start_time = start_time;
        meeting.end_time = end_time;

        if changes.description.is_some() {
            meeting.description = changes.description;
        }
        if changes.location.is_some() {
            meeting.location = changes.location;
        }
        if changes.project.is_some() {
            meeting.project = changes.project;
        }
        if let Some(participants) = changes.participants {
            meeting.participants = participants.into_iter().collect();
        }
        meeting.updated_at = Utc::now();

        self.storage.save_meeting(&meeting).await?;
        tracing::info!(meeting_id = %meeting.id, "meeting updated");
        Ok(meeting)
    }

    /// Activate every scheduled meeting starting within `[now, now + horizon]`.
    ///
    /// Has no timer of its own; the caller decides how often to scan. A
    /// meeting that fails to activate is logged and skipped. A horizon that
    /// overflows the calendar is a validation error.
    pub async fn scan_for_imminent_meetings(
        &self,
        now: DateTime<Utc>,
        horizon: Duration,
    ) -> Result<Vec<ActivatedMeeting>, AppError> {
        let until = now.checked_add_signed(horizon).ok_or_else(|| {
            ValidationError::InvalidSchedule("activation horizon is out of range".to_string())
        })?;
        let due: Vec<String> = self
            .storage
            .list_meetings()
            .await?
            .into_iter()
            .filter(|m| {
                m.status == MeetingStatus::Scheduled
                    && !m.is_active
                    && m.start_time >= now
                    && m.start_time <= until
            })
            .map(|m| m.id)
            .collect();

        let mut activated = Vec::with_capacity(due.len());
        for meeting_id in due {
            let _guard = self.lock(&meeting_id).await;
            // someone may have started or cancelled it since the listing
            let mut meeting = match self.storage.get_meeting(&meeting_id).await {
                Ok(Some(m)) if m.status == MeetingStatus::Scheduled && !m.is_active => m,
                Ok(_) => continue,
                Err(e) => {
                    tracing::warn!(meeting_id = %meeting_id, error = %e, "scheduled activation failed");
                    continue;
                },
            };
            match self.activate_meeting(&mut meeting).await {
                Ok(summary) => activated.push(summary),
                Err(e) => {
                    tracing::warn!(meeting_id = %meeting.id, error = %e, "scheduled activation failed");
                },
            }
        }

        if !activated.is_empty() {
            tracing::info!(count = activated.len(), "activated imminent meetings");
        }
        Ok(activated)
    }

    /// Resolve a join code for `user_id`
    pub async fn join_by_code(&self, code: &str, user_id: &str) -> Result<MeetingSummary, AppError> {
        let code = code.trim().to_uppercase();
        validation::validate_meeting_code(&code)?;

        let meeting = self
            .storage
            .find_active_meeting_by_code(&code)
            .await?
            .ok_or_else(|| AppError::NotFound("Active meeting with this code".to_string()))?;

        if !meeting.admits(user_id) {
            return Err(AppError::Forbidden(
                "You are not authorized to join this meeting. Only the organizer and invited participants can join."
                    .to_string(),
            ));
        }

        Ok(MeetingSummary {
            id: meeting.id,
            title: meeting.title,
            organizer: meeting.organizer,
            meeting_url: meeting.meeting_url,
        })
    }

    /// Fetch a meeting and make sure `user_id` organizes it
    pub async fn get_as_organizer(&self, meeting_id: &str, user_id: &str) -> Result<Meeting, AppError> {
        let meeting = self.get(meeting_id).await?;
        if !meeting.is_organizer(user_id) {
            return Err(AppError::Forbidden(
                "Only the organizer may change this meeting".to_string(),
            ));
        }
        Ok(meeting)
    }
}
