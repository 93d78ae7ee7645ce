use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Interactive mode for a chat user between two messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Mode {
    /// Next plain-text message is a friend uid to pair with.
    AddFriend { my_uid: String },
    /// Friend picker is on screen.
    SendMemeSelect { my_uid: String },
    /// A friend was picked; waiting for the photo/video/document.
    SendMemeWaitMedia { friend_uid: String },
}

/// Per-user bot session, persisted with an expiry so restarts and other
/// instances see the same flow.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Mode>,
    /// Recipient for the next media message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub send_target: Option<String>,
}

impl Session {
    pub fn is_empty(&self) -> bool {
        self.mode.is_none() && self.send_target.is_none()
    }
}

/// A session as stored, with its expiry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub state: Session,
    pub expires_at: DateTime<Utc>,
}

impl StoredSession {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
