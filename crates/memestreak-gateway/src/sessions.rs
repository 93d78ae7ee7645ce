use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use memestreak_db::{Result, Store};
use memestreak_types::session::{Session, StoredSession};

/// Interactive bot state per platform user, kept in the store with a TTL.
#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn Store>,
    ttl: Duration,
}

impl Sessions {
    pub fn new(store: Arc<dyn Store>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub async fn load(&self, key: i64) -> Result<Session> {
        self.load_at(key, Utc::now()).await
    }

    /// Expired sessions are removed and read back as empty.
    pub async fn load_at(&self, key: i64, now: DateTime<Utc>) -> Result<Session> {
        match self.store.load_session(key).await? {
            Some(stored) if !stored.is_expired(now) => Ok(stored.state),
            Some(_) => {
                debug!("Session for {} expired", key);
                self.store.clear_session(key).await?;
                Ok(Session::default())
            }
            None => Ok(Session::default()),
        }
    }

    /// Persists `session` with a fresh expiry. An empty session is cleared instead.
    pub async fn save(&self, key: i64, session: Session) -> Result<()> {
        if session.is_empty() {
            return self.clear(key).await;
        }
        let stored = StoredSession {
            state: session,
            expires_at: Utc::now() + self.ttl,
        };
        self.store.save_session(key, &stored).await
    }

    pub async fn clear(&self, key: i64) -> Result<()> {
        self.store.clear_session(key).await
    }
}
