//! In-memory `Messenger` that records outgoing calls, for downstream tests.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;

use crate::error::TelegramError;
use crate::messenger::{Media, Messenger, SendOptions};
use crate::types::InlineKeyboardMarkup;

#[derive(Debug, Clone, PartialEq)]
pub enum Sent {
    Text {
        chat_id: i64,
        text: String,
        options: SendOptions,
    },
    Media {
        chat_id: i64,
        media: Media,
        caption: String,
        markup: Option<InlineKeyboardMarkup>,
    },
    Answer {
        callback_id: String,
        text: Option<String>,
    },
}

impl Sent {
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::Text { chat_id, .. } | Self::Media { chat_id, .. } => Some(*chat_id),
            Self::Answer { .. } => None,
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text { text, .. } => Some(text),
            Self::Media { caption, .. } => Some(caption),
            Self::Answer { text, .. } => text.as_deref(),
        }
    }
}

#[derive(Default)]
pub struct RecordingMessenger {
    sent: Mutex<Vec<Sent>>,
    blocked: Mutex<HashSet<i64>>,
}

impl RecordingMessenger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends to `chat_id` fail with `TelegramError::Blocked` from now on.
    pub fn block(&self, chat_id: i64) {
        self.blocked.lock().unwrap_or_else(PoisonError::into_inner).insert(chat_id);
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Texts and captions delivered to `chat_id`, in order.
    pub fn texts_to(&self, chat_id: i64) -> Vec<String> {
        self.sent()
            .iter()
            .filter(|s| s.chat_id() == Some(chat_id))
            .filter_map(|s| s.text().map(str::to_string))
            .collect()
    }

    fn check(&self, chat_id: i64) -> Result<(), TelegramError> {
        if self.blocked.lock().unwrap_or_else(PoisonError::into_inner).contains(&chat_id) {
            return Err(TelegramError::Blocked(
                "Forbidden: bot was blocked by the user".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        options: SendOptions,
    ) -> Result<(), TelegramError> {
        self.check(chat_id)?;
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(Sent::Text {
            chat_id,
            text: text.to_string(),
            options,
        });
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: i64,
        media: &Media,
        caption: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        self.check(chat_id)?;
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(Sent::Media {
            chat_id,
            media: media.clone(),
            caption: caption.to_string(),
            markup,
        });
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        self.sent.lock().unwrap_or_else(PoisonError::into_inner).push(Sent::Answer {
            callback_id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}
