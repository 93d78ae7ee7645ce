use rand::Rng;
use tracing::{info, warn};

use memestreak_db::{AccountStore, StoreError};
use memestreak_telegram::types::User;
use memestreak_types::models::{Account, Profile};

use crate::error::BotError;

/// Fresh uids tried before giving up on account creation.
pub const MAX_UID_ATTEMPTS: usize = 5;

/// `MS` followed by six digits, `MS100000..=MS999999`.
pub fn generate_uid<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("MS{}", rng.random_range(100_000..=999_999u32))
}

pub fn profile_of(user: &User) -> Profile {
    Profile {
        chat_id: user.id,
        username: user.username.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
    }
}

/// Returns the account for this chat identity, creating it on first contact.
pub async fn ensure_account<S>(store: &S, profile: Profile) -> Result<Account, BotError>
where
    S: AccountStore + ?Sized,
{
    if let Some(existing) = store.account_by_chat_id(profile.chat_id).await? {
        return Ok(existing);
    }

    for attempt in 1..=MAX_UID_ATTEMPTS {
        let uid = generate_uid(&mut rand::rng());
        match store.insert_account(&profile.clone().into_account(uid)).await {
            Ok(account) => {
                info!("Created account {} for chat {}", account.uid, profile.chat_id);
                return Ok(account);
            }
            Err(StoreError::Conflict(reason)) => {
                // A concurrent update from the same chat may have won the insert.
                if let Some(existing) = store.account_by_chat_id(profile.chat_id).await? {
                    return Ok(existing);
                }
                warn!("Uid collision on attempt {}: {}", attempt, reason);
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(BotError::UidExhausted(MAX_UID_ATTEMPTS))
}
