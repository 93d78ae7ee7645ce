//! Pairing ledger: the mirrored friend relation and its per-direction streaks.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, SubsecRound, Utc};
use thiserror::Error;
use tracing::{debug, error, warn};

use memestreak_db::{AccountStore, PairingStore, StoreError};
use memestreak_types::models::FriendEntry;
use memestreak_types::streak::next_streak;

/// Attempts per direction before a contended bump is given up.
pub const MAX_SWAP_ATTEMPTS: usize = 5;

#[derive(Debug, Error)]
pub enum PairError {
    #[error("cannot pair an account with itself")]
    SelfPairing,

    #[error("no account with that uid")]
    FriendNotFound,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum BumpError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("row kept changing after {0} attempts")]
    Contended(usize),
}

/// Result of `record_activity`, one entry per direction.
#[derive(Debug)]
pub struct ActivityOutcome {
    /// sender -> receiver
    pub forward: Result<u32, BumpError>,
    /// receiver -> sender
    pub backward: Result<u32, BumpError>,
}

pub struct PairingLedger<S: ?Sized> {
    store: Arc<S>,
}

impl<S: ?Sized> Clone for PairingLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S> PairingLedger<S>
where
    S: AccountStore + PairingStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Creates the mirrored pairing between `owner_uid` and `friend_uid`.
    /// Re-pairing an existing pair succeeds and leaves both streaks alone.
    pub async fn pair(&self, owner_uid: &str, friend_uid: &str) -> Result<(), PairError> {
        if owner_uid == friend_uid {
            return Err(PairError::SelfPairing);
        }

        let friend = self.store.account_by_uid(friend_uid).await.map_err(|e| {
            error!("pair lookup {} failed: {}", friend_uid, e);
            e
        })?;
        if friend.is_none() {
            return Err(PairError::FriendNotFound);
        }

        self.store.link_pair(owner_uid, friend_uid).await.map_err(|e| {
            error!("pair upsert {} <-> {} failed: {}", owner_uid, friend_uid, e);
            e
        })?;

        debug!("Paired {} <-> {}", owner_uid, friend_uid);
        Ok(())
    }

    /// Applies the streak rule to both directions after a relayed meme.
    ///
    /// Directions are independent: a failure on one is logged and does not
    /// undo or skip the other.
    pub async fn record_activity(
        &self,
        sender_uid: &str,
        receiver_uid: &str,
        now: DateTime<Utc>,
    ) -> ActivityOutcome {
        // Postgres keeps microseconds; anything finer would break the swap guard.
        let now = now.trunc_subsecs(6);

        let forward = self.bump_direction(sender_uid, receiver_uid, now).await;
        if let Err(e) = &forward {
            error!("Streak bump {} -> {} failed: {}", sender_uid, receiver_uid, e);
        }

        let backward = self.bump_direction(receiver_uid, sender_uid, now).await;
        if let Err(e) = &backward {
            error!("Streak bump {} -> {} failed: {}", receiver_uid, sender_uid, e);
        }

        ActivityOutcome { forward, backward }
    }

    async fn bump_direction(
        &self,
        owner_uid: &str,
        friend_uid: &str,
        now: DateTime<Utc>,
    ) -> Result<u32, BumpError> {
        for attempt in 1..=MAX_SWAP_ATTEMPTS {
            let row = self.store.pairing(owner_uid, friend_uid).await?;
            let (streak, last) = row
                .map(|r| (r.streak, r.last_activity))
                .unwrap_or((None, None));

            let next = next_streak(streak, last, now);
            if self
                .store
                .swap_activity(owner_uid, friend_uid, last, next, now)
                .await?
            {
                return Ok(next);
            }

            warn!(
                "Streak row {} -> {} changed underneath (attempt {}), retrying",
                owner_uid, friend_uid, attempt
            );
        }

        Err(BumpError::Contended(MAX_SWAP_ATTEMPTS))
    }

    /// The owner's friends with display names and current streaks.
    pub async fn friends_of(&self, owner_uid: &str) -> Result<Vec<FriendEntry>, StoreError> {
        let pairings = self.store.pairings_for(owner_uid).await?;
        if pairings.is_empty() {
            return Ok(vec![]);
        }

        let uids: Vec<String> = pairings.iter().map(|p| p.friend_uid.clone()).collect();
        let names: HashMap<String, String> = match self.store.accounts_by_uids(&uids).await {
            Ok(accounts) => accounts
                .iter()
                .map(|a| (a.uid.clone(), a.display_name(&a.uid).to_string()))
                .collect(),
            Err(e) => {
                warn!("Friend name lookup for {} failed: {}", owner_uid, e);
                HashMap::new()
            }
        };

        Ok(pairings
            .into_iter()
            .map(|p| FriendEntry {
                name: names
                    .get(&p.friend_uid)
                    .cloned()
                    .unwrap_or_else(|| p.friend_uid.clone()),
                streak: p.streak_or_zero(),
                friend_uid: p.friend_uid,
            })
            .collect())
    }
}
