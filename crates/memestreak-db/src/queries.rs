use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use memestreak_types::models::{Account, OtpRecord, Pairing, Reaction};
use memestreak_types::session::{Session, StoredSession};

use crate::error::{Result, StoreError};
use crate::store::{AccountStore, OtpStore, PairingStore, ReactionStore, SessionStore};
use crate::{Database, format_ts, parse_ts};

const ACCOUNT_COLUMNS: &str = "uid, tg_user_id, username, first_name, last_name";

#[async_trait]
impl AccountStore for Database {
    async fn account_by_uid(&self, uid: &str) -> Result<Option<Account>> {
        let uid = uid.to_string();
        self.run(move |conn| query_account(conn, "uid", &uid)).await
    }

    async fn account_by_chat_id(&self, chat_id: i64) -> Result<Option<Account>> {
        self.run(move |conn| query_account(conn, "tg_user_id", &chat_id.to_string()))
            .await
    }

    async fn insert_account(&self, account: &Account) -> Result<Account> {
        let account = account.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO users (uid, tg_user_id, username, first_name, last_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    account.uid,
                    account.chat_id.map(|id| id.to_string()),
                    account.username,
                    account.first_name,
                    account.last_name,
                ],
            )
            .map_err(|e| conflict_or(e, &account.uid))?;
            Ok(account)
        })
        .await
    }

    async fn accounts_by_uids(&self, uids: &[String]) -> Result<Vec<Account>> {
        if uids.is_empty() {
            return Ok(vec![]);
        }

        let uids = uids.to_vec();
        self.run(move |conn| {
            let placeholders: Vec<String> = (1..=uids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT {ACCOUNT_COLUMNS} FROM users WHERE uid IN ({})",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(uids.iter()), account_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }

    async fn reachable_chat_ids(&self) -> Result<Vec<i64>> {
        self.run(|conn| {
            let mut stmt =
                conn.prepare("SELECT tg_user_id FROM users WHERE tg_user_id IS NOT NULL")?;
            let raw = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(raw.iter().filter_map(|id| id.parse().ok()).collect())
        })
        .await
    }
}

#[async_trait]
impl PairingStore for Database {
    async fn pairings_for(&self, owner_uid: &str) -> Result<Vec<Pairing>> {
        let owner = owner_uid.to_string();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_uid, friend_uid, streak, last_meme_at
                 FROM friends WHERE user_uid = ?1
                 ORDER BY friend_uid",
            )?;
            let raw = stmt
                .query_map([&owner], raw_pairing)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            raw.into_iter().map(pairing_from_raw).collect()
        })
        .await
    }

    async fn pairing(&self, owner_uid: &str, friend_uid: &str) -> Result<Option<Pairing>> {
        let (owner, friend) = (owner_uid.to_string(), friend_uid.to_string());
        self.run(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT user_uid, friend_uid, streak, last_meme_at
                     FROM friends WHERE user_uid = ?1 AND friend_uid = ?2",
                    [&owner, &friend],
                    raw_pairing,
                )
                .optional()?;
            raw.map(pairing_from_raw).transpose()
        })
        .await
    }

    async fn link_pair(&self, a: &str, b: &str) -> Result<()> {
        let (a, b) = (a.to_string(), b.to_string());
        self.run(move |conn| {
            let tx = conn.transaction()?;
            for (owner, friend) in [(&a, &b), (&b, &a)] {
                tx.execute(
                    "INSERT OR IGNORE INTO friends (user_uid, friend_uid) VALUES (?1, ?2)",
                    [owner, friend],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
        .await
    }

    async fn swap_activity(
        &self,
        owner_uid: &str,
        friend_uid: &str,
        expected: Option<DateTime<Utc>>,
        streak: u32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let (owner, friend) = (owner_uid.to_string(), friend_uid.to_string());
        let expected = expected.map(format_ts);
        let now = format_ts(now);

        self.run(move |conn| {
            let tx = conn.transaction()?;
            // `IS` matches NULL against NULL, so a never-bumped row swaps on `None`.
            let mut changed = tx.execute(
                "UPDATE friends SET streak = ?1, last_meme_at = ?2
                 WHERE user_uid = ?3 AND friend_uid = ?4 AND last_meme_at IS ?5",
                params![streak, now, owner, friend, expected],
            )?;
            if changed == 0 && expected.is_none() {
                changed = tx.execute(
                    "INSERT OR IGNORE INTO friends (user_uid, friend_uid, streak, last_meme_at)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![owner, friend, streak, now],
                )?;
            }
            tx.commit()?;
            Ok(changed == 1)
        })
        .await
    }
}

#[async_trait]
impl ReactionStore for Database {
    async fn append_reaction(&self, reaction: &Reaction) -> Result<()> {
        let r = reaction.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO reactions (sender_uid, receiver_uid, meme_message, reaction)
                 VALUES (?1, ?2, ?3, ?4)",
                params![r.reactor_uid, r.original_sender_uid, r.message_ref, r.symbol],
            )?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl OtpStore for Database {
    async fn insert_otp(&self, uid: &str, otp: &str) -> Result<()> {
        let (uid, otp) = (uid.to_string(), otp.to_string());
        let created_at = format_ts(Utc::now());
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO login_otps (uid, otp, created_at) VALUES (?1, ?2, ?3)",
                [&uid, &otp, &created_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn latest_otp(&self, uid: &str) -> Result<Option<OtpRecord>> {
        let uid = uid.to_string();
        self.run(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT uid, otp, created_at FROM login_otps
                     WHERE uid = ?1
                     ORDER BY created_at DESC, id DESC
                     LIMIT 1",
                    [&uid],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    },
                )
                .optional()?;

            raw.map(|(uid, otp, created_at)| {
                Ok(OtpRecord {
                    uid,
                    otp,
                    created_at: parse_ts(&created_at)?,
                })
            })
            .transpose()
        })
        .await
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn load_session(&self, key: i64) -> Result<Option<StoredSession>> {
        self.run(move |conn| {
            let raw = conn
                .query_row(
                    "SELECT state, expires_at FROM bot_sessions WHERE chat_key = ?1",
                    [key.to_string()],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;

            raw.map(|(state, expires_at)| {
                Ok(StoredSession {
                    state: serde_json::from_str::<Session>(&state)?,
                    expires_at: parse_ts(&expires_at)?,
                })
            })
            .transpose()
        })
        .await
    }

    async fn save_session(&self, key: i64, session: &StoredSession) -> Result<()> {
        let state = serde_json::to_string(&session.state)?;
        let expires_at = format_ts(session.expires_at);
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO bot_sessions (chat_key, state, expires_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(chat_key) DO UPDATE SET state = excluded.state, expires_at = excluded.expires_at",
                params![key.to_string(), state, expires_at],
            )?;
            Ok(())
        })
        .await
    }

    async fn clear_session(&self, key: i64) -> Result<()> {
        self.run(move |conn| {
            conn.execute(
                "DELETE FROM bot_sessions WHERE chat_key = ?1",
                [key.to_string()],
            )?;
            Ok(())
        })
        .await
    }
}

fn query_account(conn: &Connection, column: &str, value: &str) -> Result<Option<Account>> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let row = stmt.query_row([value], account_from_row).optional()?;
    Ok(row)
}

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        uid: row.get(0)?,
        chat_id: row
            .get::<_, Option<String>>(1)?
            .and_then(|id| id.parse().ok()),
        username: row.get(2)?,
        first_name: row.get(3)?,
        last_name: row.get(4)?,
    })
}

type RawPairing = (String, String, u32, Option<String>);

fn raw_pairing(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPairing> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn pairing_from_raw((owner_uid, friend_uid, streak, last): RawPairing) -> Result<Pairing> {
    Ok(Pairing {
        owner_uid,
        friend_uid,
        streak: Some(streak),
        last_activity: last.as_deref().map(parse_ts).transpose()?,
    })
}

fn conflict_or(e: rusqlite::Error, uid: &str) -> StoreError {
    match e {
        rusqlite::Error::SqliteFailure(ref err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            StoreError::Conflict(format!("account {uid} already exists"))
        }
        other => other.into(),
    }
}
