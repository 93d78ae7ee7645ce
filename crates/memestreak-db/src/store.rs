//! Storage seams. Both backends (`RestStore`, `Database`) implement every trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use memestreak_types::models::{Account, OtpRecord, Pairing, Reaction};
use memestreak_types::session::StoredSession;

use crate::error::Result;

#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn account_by_uid(&self, uid: &str) -> Result<Option<Account>>;

    async fn account_by_chat_id(&self, chat_id: i64) -> Result<Option<Account>>;

    /// Fails with `StoreError::Conflict` when the uid is already taken.
    async fn insert_account(&self, account: &Account) -> Result<Account>;

    async fn accounts_by_uids(&self, uids: &[String]) -> Result<Vec<Account>>;

    /// Chat ids of every account that has one, for broadcasts.
    async fn reachable_chat_ids(&self) -> Result<Vec<i64>>;
}

#[async_trait]
pub trait PairingStore: Send + Sync {
    async fn pairings_for(&self, owner_uid: &str) -> Result<Vec<Pairing>>;

    async fn pairing(&self, owner_uid: &str, friend_uid: &str) -> Result<Option<Pairing>>;

    /// Inserts `a -> b` and `b -> a` if missing. Existing rows keep their streak.
    async fn link_pair(&self, a: &str, b: &str) -> Result<()>;

    /// Compare-and-swap on one directed row.
    ///
    /// Writes `streak` and `now` only if the row's `last_meme_at` still equals
    /// `expected`. A missing row counts as `None` and is created. Returns
    /// `false` when another writer got there first.
    async fn swap_activity(
        &self,
        owner_uid: &str,
        friend_uid: &str,
        expected: Option<DateTime<Utc>>,
        streak: u32,
        now: DateTime<Utc>,
    ) -> Result<bool>;
}

#[async_trait]
pub trait ReactionStore: Send + Sync {
    async fn append_reaction(&self, reaction: &Reaction) -> Result<()>;
}

#[async_trait]
pub trait OtpStore: Send + Sync {
    async fn insert_otp(&self, uid: &str, otp: &str) -> Result<()>;

    /// Most recent code issued for `uid`.
    async fn latest_otp(&self, uid: &str) -> Result<Option<OtpRecord>>;
}

/// Keyed interactive state with an expiry. Keys are platform user ids.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load_session(&self, key: i64) -> Result<Option<StoredSession>>;

    async fn save_session(&self, key: i64, session: &StoredSession) -> Result<()>;

    async fn clear_session(&self, key: i64) -> Result<()>;
}

/// Everything the bot and the API need from a backend.
pub trait Store: AccountStore + PairingStore + ReactionStore + OtpStore + SessionStore {}

impl<T> Store for T where T: AccountStore + PairingStore + ReactionStore + OtpStore + SessionStore {}
