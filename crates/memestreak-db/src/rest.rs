//! Supabase (PostgREST) backend.
//!
//! Tables mirror the SQLite schema in `migrations.rs`; see `sql/supabase.sql`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use memestreak_types::de::lenient_chat_id;
use memestreak_types::models::{Account, OtpRecord, Pairing, Reaction};
use memestreak_types::session::StoredSession;

use crate::error::{Result, StoreError};
use crate::format_ts;
use crate::store::{AccountStore, OtpStore, PairingStore, ReactionStore, SessionStore};

const RETURN_ROWS: &str = "return=representation";
const RETURN_NONE: &str = "return=minimal";

#[derive(Clone)]
pub struct RestStore {
    http: Client,
    base: String,
}

impl RestStore {
    /// `url` is the project URL (`https://<ref>.supabase.co`), `key` the service key.
    pub fn new(url: &str, key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let api_key =
            HeaderValue::from_str(key).map_err(|e| StoreError::Config(format!("api key: {e}")))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| StoreError::Config(format!("api key: {e}")))?;
        headers.insert("apikey", api_key);
        headers.insert(reqwest::header::AUTHORIZATION, bearer);

        let http = Client::builder().default_headers(headers).build()?;

        Ok(Self {
            http,
            base: format!("{}/rest/v1", url.trim_end_matches('/')),
        })
    }

    fn table(&self, name: &str) -> String {
        format!("{}/{}", self.base, name)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>> {
        let req = self.http.get(self.table(table)).query(query);
        rows(send(req).await?).await
    }

    async fn insert<B: Serialize + ?Sized>(
        &self,
        table: &str,
        body: &B,
        on_conflict: Option<&str>,
        prefer: &str,
    ) -> Result<reqwest::Response> {
        let mut req = self
            .http
            .post(self.table(table))
            .header("Prefer", prefer)
            .json(body);
        if let Some(cols) = on_conflict {
            req = req.query(&[("on_conflict", cols)]);
        }
        send(req).await
    }
}

async fn send(req: RequestBuilder) -> Result<reqwest::Response> {
    let resp = req.send().await?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    debug!("PostgREST {} -> {}", status, body);
    if status == StatusCode::CONFLICT {
        return Err(StoreError::Conflict(body));
    }
    Err(StoreError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn rows<T: DeserializeOwned>(resp: reqwest::Response) -> Result<Vec<T>> {
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

/// PostgREST `in.(…)` list with every value double-quoted.
fn in_list(values: &[String]) -> String {
    let quoted: Vec<String> = values
        .iter()
        .map(|v| format!("\"{}\"", v.replace('\\', "\\\\").replace('"', "\\\"")))
        .collect();
    format!("in.({})", quoted.join(","))
}

#[derive(Deserialize)]
struct ChatIdRow {
    #[serde(default, deserialize_with = "lenient_chat_id")]
    tg_user_id: Option<i64>,
}

const ACCOUNT_SELECT: &str = "uid,tg_user_id,username,first_name,last_name";
const PAIRING_SELECT: &str = "user_uid,friend_uid,streak,last_meme_at";

#[async_trait]
impl AccountStore for RestStore {
    async fn account_by_uid(&self, uid: &str) -> Result<Option<Account>> {
        let found: Vec<Account> = self
            .select(
                "users",
                &[("select", ACCOUNT_SELECT.into()), ("uid", eq(uid)), ("limit", "1".into())],
            )
            .await?;
        Ok(found.into_iter().next())
    }

    async fn account_by_chat_id(&self, chat_id: i64) -> Result<Option<Account>> {
        let found: Vec<Account> = self
            .select(
                "users",
                &[
                    ("select", ACCOUNT_SELECT.into()),
                    ("tg_user_id", eq(&chat_id.to_string())),
                    ("limit", "1".into()),
                ],
            )
            .await?;
        Ok(found.into_iter().next())
    }

    async fn insert_account(&self, account: &Account) -> Result<Account> {
        let resp = self.insert("users", account, None, RETURN_ROWS).await?;
        let inserted: Vec<Account> = rows(resp).await?;
        inserted
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Decode("insert into users returned no row".into()))
    }

    async fn accounts_by_uids(&self, uids: &[String]) -> Result<Vec<Account>> {
        if uids.is_empty() {
            return Ok(vec![]);
        }
        self.select(
            "users",
            &[("select", ACCOUNT_SELECT.into()), ("uid", in_list(uids))],
        )
        .await
    }

    async fn reachable_chat_ids(&self) -> Result<Vec<i64>> {
        let found: Vec<ChatIdRow> = self
            .select(
                "users",
                &[("select", "tg_user_id".into()), ("tg_user_id", "not.is.null".into())],
            )
            .await?;
        Ok(found.into_iter().filter_map(|r| r.tg_user_id).collect())
    }
}

#[async_trait]
impl PairingStore for RestStore {
    async fn pairings_for(&self, owner_uid: &str) -> Result<Vec<Pairing>> {
        self.select(
            "friends",
            &[
                ("select", PAIRING_SELECT.into()),
                ("user_uid", eq(owner_uid)),
                ("order", "friend_uid.asc".into()),
            ],
        )
        .await
    }

    async fn pairing(&self, owner_uid: &str, friend_uid: &str) -> Result<Option<Pairing>> {
        let found: Vec<Pairing> = self
            .select(
                "friends",
                &[
                    ("select", PAIRING_SELECT.into()),
                    ("user_uid", eq(owner_uid)),
                    ("friend_uid", eq(friend_uid)),
                ],
            )
            .await?;
        Ok(found.into_iter().next())
    }

    async fn link_pair(&self, a: &str, b: &str) -> Result<()> {
        let body = json!([
            { "user_uid": a, "friend_uid": b },
            { "user_uid": b, "friend_uid": a },
        ]);
        self.insert(
            "friends",
            &body,
            Some("user_uid,friend_uid"),
            "resolution=ignore-duplicates,return=minimal",
        )
        .await?;
        Ok(())
    }

    async fn swap_activity(
        &self,
        owner_uid: &str,
        friend_uid: &str,
        expected: Option<DateTime<Utc>>,
        streak: u32,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let guard = match expected {
            Some(ts) => eq(&format_ts(ts)),
            None => "is.null".to_string(),
        };
        let body = json!({ "streak": streak, "last_meme_at": format_ts(now) });

        let req = self
            .http
            .patch(self.table("friends"))
            .header("Prefer", RETURN_ROWS)
            .query(&[
                ("user_uid", eq(owner_uid)),
                ("friend_uid", eq(friend_uid)),
                ("last_meme_at", guard),
            ])
            .json(&body);
        let updated: Vec<Pairing> = rows(send(req).await?).await?;
        if !updated.is_empty() {
            return Ok(true);
        }
        if expected.is_some() {
            return Ok(false);
        }

        // No row yet: create it, unless someone else just did.
        let row = json!({
            "user_uid": owner_uid,
            "friend_uid": friend_uid,
            "streak": streak,
            "last_meme_at": format_ts(now),
        });
        let resp = self
            .insert(
                "friends",
                &row,
                Some("user_uid,friend_uid"),
                "resolution=ignore-duplicates,return=representation",
            )
            .await?;
        let inserted: Vec<Pairing> = rows(resp).await?;
        Ok(!inserted.is_empty())
    }
}

#[async_trait]
impl ReactionStore for RestStore {
    async fn append_reaction(&self, reaction: &Reaction) -> Result<()> {
        self.insert("reactions", reaction, None, RETURN_NONE).await?;
        Ok(())
    }
}

#[async_trait]
impl OtpStore for RestStore {
    async fn insert_otp(&self, uid: &str, otp: &str) -> Result<()> {
        self.insert(
            "login_otps",
            &json!({ "uid": uid, "otp": otp }),
            None,
            RETURN_NONE,
        )
        .await?;
        Ok(())
    }

    async fn latest_otp(&self, uid: &str) -> Result<Option<OtpRecord>> {
        let found: Vec<OtpRecord> = self
            .select(
                "login_otps",
                &[
                    ("select", "uid,otp,created_at".into()),
                    ("uid", eq(uid)),
                    ("order", "created_at.desc".into()),
                    ("limit", "1".into()),
                ],
            )
            .await?;
        Ok(found.into_iter().next())
    }
}

#[async_trait]
impl SessionStore for RestStore {
    async fn load_session(&self, key: i64) -> Result<Option<StoredSession>> {
        let found: Vec<StoredSession> = self
            .select(
                "bot_sessions",
                &[
                    ("select", "state,expires_at".into()),
                    ("chat_key", eq(&key.to_string())),
                ],
            )
            .await?;
        Ok(found.into_iter().next())
    }

    async fn save_session(&self, key: i64, session: &StoredSession) -> Result<()> {
        let row = json!({
            "chat_key": key.to_string(),
            "state": session.state,
            "expires_at": format_ts(session.expires_at),
        });
        self.insert(
            "bot_sessions",
            &row,
            Some("chat_key"),
            "resolution=merge-duplicates,return=minimal",
        )
        .await?;
        Ok(())
    }

    async fn clear_session(&self, key: i64) -> Result<()> {
        let req = self
            .http
            .delete(self.table("bot_sessions"))
            .query(&[("chat_key", eq(&key.to_string()))]);
        send(req).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::{GET, PATCH, POST};
    use httpmock::MockServer;

    fn store(server: &MockServer) -> RestStore {
        RestStore::new(&server.base_url(), "service-key").unwrap()
    }

    #[tokio::test]
    async fn account_lookup_sends_key_and_filter() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/users")
                    .header("apikey", "service-key")
                    .header("authorization", "Bearer service-key")
                    .query_param("uid", "eq.MS123456");
                then.status(200).json_body(json!([
                    { "uid": "MS123456", "tg_user_id": "4242", "username": "dank", "first_name": null, "last_name": null }
                ]));
            })
            .await;

        let account = store(&server).account_by_uid("MS123456").await.unwrap().unwrap();
        assert_eq!(account.chat_id, Some(4242));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn duplicate_insert_maps_to_conflict() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/rest/v1/users");
                then.status(409).json_body(json!({ "code": "23505" }));
            })
            .await;

        let account = Account {
            uid: "MS123456".into(),
            chat_id: Some(1),
            username: None,
            first_name: None,
            last_name: None,
        };
        let err = store(&server).insert_account(&account).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn uid_list_is_quoted() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/rest/v1/users")
                    .query_param("uid", "in.(\"MS1\",\"MS2\")");
                then.status(200).json_body(json!([]));
            })
            .await;

        let found = store(&server)
            .accounts_by_uids(&["MS1".into(), "MS2".into()])
            .await
            .unwrap();
        assert!(found.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn swap_guards_on_previous_timestamp() {
        let server = MockServer::start_async().await;
        let prev: DateTime<Utc> = "2026-10-15T09:00:00Z".parse().unwrap();
        let now: DateTime<Utc> = "2026-10-16T09:00:00Z".parse().unwrap();

        let lost = server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/rest/v1/friends")
                    .query_param("user_uid", "eq.MS1")
                    .query_param("friend_uid", "eq.MS2")
                    .query_param("last_meme_at", "eq.2026-10-15T09:00:00.000000Z")
                    .header("prefer", "return=representation");
                then.status(200).json_body(json!([]));
            })
            .await;

        let swapped = store(&server)
            .swap_activity("MS1", "MS2", Some(prev), 4, now)
            .await
            .unwrap();
        assert!(!swapped);
        lost.assert_async().await;
    }

    #[tokio::test]
    async fn swap_on_missing_row_inserts() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PATCH)
                    .path("/rest/v1/friends")
                    .query_param("last_meme_at", "is.null");
                then.status(200).json_body(json!([]));
            })
            .await;
        let insert = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/rest/v1/friends")
                    .query_param("on_conflict", "user_uid,friend_uid");
                then.status(201).json_body(json!([
                    { "user_uid": "MS1", "friend_uid": "MS2", "streak": 1, "last_meme_at": "2026-10-16T09:00:00+00:00" }
                ]));
            })
            .await;

        let swapped = store(&server)
            .swap_activity("MS1", "MS2", None, 1, Utc::now())
            .await
            .unwrap();
        assert!(swapped);
        insert.assert_async().await;
    }

    #[tokio::test]
    async fn server_errors_surface_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/rest/v1/friends");
                then.status(500).body("boom");
            })
            .await;

        let err = store(&server).pairings_for("MS1").await.unwrap_err();
        assert!(matches!(err, StoreError::Status { status: 500, .. }));
    }
}
