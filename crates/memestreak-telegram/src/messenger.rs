use async_trait::async_trait;

use crate::error::TelegramError;
use crate::types::{InlineKeyboardMarkup, ParseMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

impl MediaKind {
    /// Bot API method that re-sends this kind of file.
    pub fn method(self) -> &'static str {
        match self {
            Self::Photo => "sendPhoto",
            Self::Video => "sendVideo",
            Self::Document => "sendDocument",
        }
    }

    /// Parameter name carrying the file id for `method()`.
    pub fn field(self) -> &'static str {
        match self {
            Self::Photo => "photo",
            Self::Video => "video",
            Self::Document => "document",
        }
    }
}

/// A file already on Telegram's servers, re-sent by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Media {
    pub kind: MediaKind,
    pub file_id: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendOptions {
    pub parse_mode: Option<ParseMode>,
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl SendOptions {
    pub fn markdown() -> Self {
        Self {
            parse_mode: Some(ParseMode::Markdown),
            reply_markup: None,
        }
    }

    pub fn with_markup(mut self, markup: InlineKeyboardMarkup) -> Self {
        self.reply_markup = Some(markup);
        self
    }
}

/// Outgoing half of the platform. Handlers only talk to this trait.
#[async_trait]
pub trait Messenger: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        options: SendOptions,
    ) -> Result<(), TelegramError>;

    async fn send_media(
        &self,
        chat_id: i64,
        media: &Media,
        caption: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError>;

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError>;
}
