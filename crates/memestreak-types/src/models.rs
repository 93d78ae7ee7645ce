use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::de::{chat_id_as_text, lenient_chat_id};

/// Row in `users`. One per chat-platform identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub uid: String,
    #[serde(
        default,
        rename = "tg_user_id",
        deserialize_with = "lenient_chat_id",
        serialize_with = "chat_id_as_text"
    )]
    pub chat_id: Option<i64>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl Account {
    /// First name, then username, then `fallback`.
    pub fn display_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.first_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.username.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or(fallback)
    }
}

/// Platform profile used to create an account on first contact.
#[derive(Debug, Clone, Default)]
pub struct Profile {
    pub chat_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Profile {
    pub fn into_account(self, uid: String) -> Account {
        Account {
            uid,
            chat_id: Some(self.chat_id),
            username: self.username,
            first_name: self.first_name,
            last_name: self.last_name,
        }
    }
}

/// Directed row in `friends`. A pairing is always stored as two mirrored rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pairing {
    #[serde(rename = "user_uid")]
    pub owner_uid: String,
    pub friend_uid: String,
    #[serde(default)]
    pub streak: Option<u32>,
    #[serde(default, rename = "last_meme_at")]
    pub last_activity: Option<DateTime<Utc>>,
}

impl Pairing {
    pub fn streak_or_zero(&self) -> u32 {
        self.streak.unwrap_or(0)
    }
}

/// A pairing joined with the friend's display name, for lists and pickers.
#[derive(Debug, Clone, PartialEq)]
pub struct FriendEntry {
    pub friend_uid: String,
    pub name: String,
    pub streak: u32,
}

/// Append-only audit row in `reactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reaction {
    /// Who pressed the button.
    #[serde(rename = "sender_uid")]
    pub reactor_uid: String,
    /// Who sent the meme being reacted to.
    #[serde(rename = "receiver_uid")]
    pub original_sender_uid: String,
    #[serde(rename = "meme_message")]
    pub message_ref: String,
    #[serde(rename = "reaction")]
    pub symbol: String,
}

/// Row in `login_otps`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OtpRecord {
    pub uid: String,
    pub otp: String,
    pub created_at: DateTime<Utc>,
}
