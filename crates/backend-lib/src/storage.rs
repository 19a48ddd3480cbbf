// ============================
// crates/backend-lib/src/storage.rs
// ============================
//! Storage abstraction with flat-file implementation.
//!
//! Layout under the storage root:
//! - `meetings/<id>.json` holds one meeting document
//! - `messages/<room>.jsonl` is the append-only chat log of one room
//! - `messages/.lobby.jsonl` collects messages sent without a room
use async_trait::async_trait;
use meetwire_common::ChatMessage;
use std::path::{Path, PathBuf};
use tokio::{fs as tokio_fs, io::AsyncWriteExt};
use uuid::Uuid;

use crate::error::AppError;
use crate::meeting::Meeting;

// room labels cannot contain dots, so this never collides with a room log
const LOBBY_LOG: &str = ".lobby";

/// Trait for storage backends
#[async_trait]
pub trait Storage: Send + Sync {
    /// Fetch a meeting by id
    async fn get_meeting(&self, meeting_id: &str) -> Result<Option<Meeting>, AppError>;

    /// Insert or replace a meeting
    async fn save_meeting(&self, meeting: &Meeting) -> Result<(), AppError>;

    /// Every stored meeting, in no particular order
    async fn list_meetings(&self) -> Result<Vec<Meeting>, AppError>;

    /// The active meeting currently holding `code`, if any
    async fn find_active_meeting_by_code(&self, code: &str) -> Result<Option<Meeting>, AppError> {
        Ok(self
            .list_meetings()
            .await?
            .into_iter()
            .find(|m| m.is_active && m.meeting_code.as_deref() == Some(code)))
    }

    /// Append a chat message to its room log
    async fn append_message(&self, message: &ChatMessage) -> Result<(), AppError>;

    /// Every stored message of a room, in insertion order
    async fn room_messages(&self, room: &str) -> Result<Vec<ChatMessage>, AppError>;
}

/// Flat-file implementation of the Storage trait
#[derive(Clone, Debug)]
pub struct FlatFileStorage {
    root: PathBuf,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("meetings"))?;
        std::fs::create_dir_all(root.join("messages"))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn meeting_path(&self, meeting_id: &str) -> PathBuf {
        self.root.join("meetings").join(format!("{meeting_id}.json"))
    }

    fn room_log_path(&self, room: Option<&str>) -> PathBuf {
        self.root
            .join("messages")
            .join(format!("{}.jsonl", room.unwrap_or(LOBBY_LOG)))
    }
}

#[async_trait]
impl Storage for FlatFileStorage {
    async fn get_meeting(&self, meeting_id: &str) -> Result<Option<Meeting>, AppError> {
        let path = self.meeting_path(meeting_id);

        let content = match tokio_fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(AppError::persistence)
    }

    /// Write to a temporary sibling and rename so readers never see a torn file.
    async fn save_meeting(&self, meeting: &Meeting) -> Result<(), AppError> {
        let path = self.meeting_path(&meeting.id);
        let tmp = path.with_extension(format!("json.{}.tmp", Uuid::new_v4().simple()));

        let json = serde_json::to_vec_pretty(meeting).map_err(AppError::persistence)?;
        tokio_fs::write(&tmp, json).await?;
        tokio_fs::rename(&tmp, &path).await?;

        Ok(())
    }

    async fn list_meetings(&self) -> Result<Vec<Meeting>, AppError> {
        let mut meetings = Vec::new();
        let mut entries = tokio_fs::read_dir(self.root.join("meetings")).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let content = tokio_fs::read_to_string(&path).await?;
            match serde_json::from_str::<Meeting>(&content) {
                Ok(meeting) => meetings.push(meeting),
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable meeting file");
                },
            }
        }

        Ok(meetings)
    }

    /// Append a JSON line to the room's log.
    async fn append_message(&self, message: &ChatMessage) -> Result<(), AppError> {
        let path = self.room_log_path(message.room.as_deref());

        let mut line = serde_json::to_vec(message).map_err(AppError::persistence)?;
        line.push(b'\n');

        let mut file = tokio_fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        // one write per line keeps concurrent appends from interleaving
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }

    async fn room_messages(&self, room: &str) -> Result<Vec<ChatMessage>, AppError> {
        let path = self.room_log_path(Some(room));

        let content = match tokio_fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(AppError::persistence))
            .collect()
    }
}
