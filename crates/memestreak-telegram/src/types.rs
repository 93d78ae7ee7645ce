//! Subset of the Bot API object model the bot reads and writes.
//! https://core.telegram.org/bots/api#available-types

use serde::{Deserialize, Serialize};

/// https://core.telegram.org/bots/api#update
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,

    #[serde(default)]
    pub message: Option<Message>,

    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

/// https://core.telegram.org/bots/api#message
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,

    /// Sender (empty for channel posts).
    #[serde(default)]
    pub from: Option<User>,

    pub chat: Chat,

    #[serde(default)]
    pub text: Option<String>,

    /// Available sizes, smallest first.
    #[serde(default)]
    pub photo: Vec<PhotoSize>,

    #[serde(default)]
    pub video: Option<FileRef>,

    #[serde(default)]
    pub document: Option<FileRef>,
}

/// https://core.telegram.org/bots/api#user
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,

    #[serde(default)]
    pub is_bot: bool,

    #[serde(default)]
    pub first_name: Option<String>,

    #[serde(default)]
    pub last_name: Option<String>,

    #[serde(default)]
    pub username: Option<String>,
}

/// https://core.telegram.org/bots/api#chat
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

/// https://core.telegram.org/bots/api#photosize
#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
}

/// Video or document; only the file id is needed to re-send it.
#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    pub file_id: String,
}

/// https://core.telegram.org/bots/api#callbackquery
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,

    pub from: User,

    /// Message the button was attached to.
    #[serde(default)]
    pub message: Option<Message>,

    #[serde(default)]
    pub data: Option<String>,
}

/// https://core.telegram.org/bots/api#inlinekeyboardmarkup
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

/// https://core.telegram.org/bots/api#inlinekeyboardbutton
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_data: Option<String>,
}

impl InlineKeyboardButton {
    pub fn url(text: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: Some(url.into()),
            callback_data: None,
        }
    }

    pub fn callback(text: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            url: None,
            callback_data: Some(data.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ParseMode {
    Markdown,
    #[serde(rename = "HTML")]
    Html,
}

/// Telegram API response wrapper.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub ok: bool,

    #[serde(default)]
    pub error_code: Option<u16>,

    #[serde(default)]
    pub description: Option<String>,

    pub result: Option<T>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_photo_message_update() {
        let raw = r#"{
            "update_id": 901,
            "message": {
                "message_id": 55,
                "from": {"id": 7, "is_bot": false, "first_name": "Ann", "username": "ann_k"},
                "chat": {"id": 7, "type": "private"},
                "photo": [
                    {"file_id": "small", "width": 90, "height": 90},
                    {"file_id": "large", "width": 1280, "height": 1280}
                ],
                "caption": "lol"
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let msg = update.message.unwrap();
        assert_eq!(msg.photo.last().unwrap().file_id, "large");
        assert!(msg.text.is_none());
        assert_eq!(msg.from.unwrap().username.as_deref(), Some("ann_k"));
    }

    #[test]
    fn parses_callback_query_update() {
        let raw = r#"{
            "update_id": 902,
            "callback_query": {
                "id": "cb-1",
                "from": {"id": 8, "is_bot": false, "first_name": "Bo"},
                "message": {"message_id": 60, "chat": {"id": 8, "type": "private"}},
                "chat_instance": "x",
                "data": "pickfriend:MS123456"
            }
        }"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        let query = update.callback_query.unwrap();
        assert_eq!(query.data.as_deref(), Some("pickfriend:MS123456"));
        assert_eq!(query.message.unwrap().chat.id, 8);
    }

    #[test]
    fn buttons_skip_unset_fields() {
        let markup = InlineKeyboardMarkup {
            inline_keyboard: vec![vec![InlineKeyboardButton::url("Open", "https://example.org")]],
        };
        let json = serde_json::to_value(&markup).unwrap();
        assert_eq!(json["inline_keyboard"][0][0]["url"], "https://example.org");
        assert!(json["inline_keyboard"][0][0].get("callback_data").is_none());
    }
}
