use thiserror::Error;

use memestreak_db::StoreError;
use memestreak_telegram::TelegramError;
use memestreak_types::callback::CallbackError;

#[derive(Debug, Error)]
pub enum BotError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Telegram(#[from] TelegramError),

    #[error(transparent)]
    Callback(#[from] CallbackError),

    #[error("no free uid after {0} attempts")]
    UidExhausted(usize),
}

impl BotError {
    /// The recipient blocked the bot.
    pub fn is_blocked(&self) -> bool {
        matches!(self, Self::Telegram(e) if e.is_blocked())
    }
}
