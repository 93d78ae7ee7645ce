use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::TelegramError;
use crate::messenger::{Media, Messenger, SendOptions};
use crate::types::{ApiResponse, InlineKeyboardMarkup, Update};

pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Updates the bot subscribes to when long polling.
const ALLOWED_UPDATES: &[&str] = &["message", "callback_query"];

#[derive(Clone)]
pub struct TelegramClient {
    http: Client,
    base: String,
}

impl TelegramClient {
    pub fn new(token: &str, api_url: Option<&str>) -> Result<Self, TelegramError> {
        let api_url = api_url.unwrap_or(DEFAULT_API_URL).trim_end_matches('/');
        Ok(Self {
            http: Client::builder().build()?,
            base: format!("{}/bot{}", api_url, token),
        })
    }

    async fn call<P, T>(&self, method: &str, params: &P, timeout: Option<Duration>) -> Result<T, TelegramError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let mut req = self.http.post(format!("{}/{}", self.base, method)).json(params);
        if let Some(t) = timeout {
            req = req.timeout(t);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let bytes = resp.bytes().await?;

        let parsed: ApiResponse<T> = match serde_json::from_slice(&bytes) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => return Err(TelegramError::Decode(e.to_string())),
            Err(_) => {
                return Err(TelegramError::Api {
                    code: status.as_u16(),
                    description: String::from_utf8_lossy(&bytes).into_owned(),
                });
            }
        };

        if !parsed.ok {
            let code = parsed.error_code.unwrap_or(status.as_u16());
            let description = parsed.description.unwrap_or_else(|| "unknown".to_string());
            debug!("Telegram {} failed: {} {}", method, code, description);
            if code == 403 {
                return Err(TelegramError::Blocked(description));
            }
            return Err(TelegramError::Api { code, description });
        }

        parsed
            .result
            .ok_or_else(|| TelegramError::Decode(format!("{method} returned no result")))
    }

    /// Long-polls for updates after `offset`. Blocks up to `timeout_secs` on the server.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, TelegramError> {
        let params = json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ALLOWED_UPDATES,
        });
        // Leave the server room to answer before the client gives up.
        let deadline = Duration::from_secs(timeout_secs + 10);
        self.call("getUpdates", &params, Some(deadline)).await
    }
}

#[async_trait]
impl Messenger for TelegramClient {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        options: SendOptions,
    ) -> Result<(), TelegramError> {
        let mut params = json!({ "chat_id": chat_id, "text": text });
        if let Some(mode) = options.parse_mode {
            params["parse_mode"] = serde_json::to_value(mode)
                .map_err(|e| TelegramError::Decode(e.to_string()))?;
        }
        if let Some(markup) = options.reply_markup {
            params["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| TelegramError::Decode(e.to_string()))?;
        }
        let _: Value = self.call("sendMessage", &params, None).await?;
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: i64,
        media: &Media,
        caption: &str,
        markup: Option<InlineKeyboardMarkup>,
    ) -> Result<(), TelegramError> {
        let mut params = json!({ "chat_id": chat_id, "caption": caption });
        params[media.kind.field()] = Value::String(media.file_id.clone());
        if let Some(markup) = markup {
            params["reply_markup"] = serde_json::to_value(markup)
                .map_err(|e| TelegramError::Decode(e.to_string()))?;
        }
        let _: Value = self.call(media.kind.method(), &params, None).await?;
        Ok(())
    }

    async fn answer_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
    ) -> Result<(), TelegramError> {
        let mut params = json!({ "callback_query_id": callback_id, "show_alert": false });
        if let Some(text) = text {
            params["text"] = Value::String(text.to_string());
        }
        let _: bool = self.call("answerCallbackQuery", &params, None).await?;
        Ok(())
    }
}
