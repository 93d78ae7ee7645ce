use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelegramError {
    /// The user blocked the bot (HTTP 403). Never fatal.
    #[error("blocked by recipient: {0}")]
    Blocked(String),

    #[error("Telegram API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to parse response: {0}")]
    Decode(String),
}

impl TelegramError {
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }
}
