//! Telegram Bot API client.

pub mod client;
pub mod error;
pub mod messenger;
pub mod types;

pub use client::TelegramClient;
pub use error::TelegramError;
pub use messenger::{Media, MediaKind, Messenger, SendOptions};
pub mod testing;
