//! The chat bot: update routing, interactive flows, media relay and the
//! promo broadcast.

pub mod accounts;
pub mod broadcast;
pub mod command;
pub mod dispatcher;
pub mod error;
pub mod poller;
pub mod relay;
pub mod sessions;
pub mod texts;

pub use broadcast::{BroadcastReport, BroadcastSchedule, run_broadcast_loop};
pub use dispatcher::{BotSettings, Dispatcher};
pub use error::BotError;
pub use poller::{UpdateSource, run_poller};
pub use sessions::Sessions;
