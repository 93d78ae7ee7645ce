use std::collections::HashMap;
use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use memestreak_db::{AccountStore, OtpStore, Store};
use memestreak_telegram::{Messenger, SendOptions};
use memestreak_types::api::{
    AutoLoginRequest, AutoLoginResponse, ErrorResponse, SendCodeRequest, SendCodeResponse,
    VerifyOtpRequest, VerifyOtpResponse, VerifyUidRequest, VerifyUidResponse,
};

use crate::token::{create_token, verify_token};

pub type AppState = Arc<AppStateInner>;

/// A code kept in memory because the store refused the row.
#[derive(Debug, Clone)]
pub struct PendingOtp {
    pub otp: String,
    pub created_at: DateTime<Utc>,
}

pub struct AppStateInner {
    pub store: Arc<dyn Store>,
    pub messenger: Arc<dyn Messenger>,
    pub jwt_secret: String,
    pub otp_ttl: Duration,
    /// Process-local, consumed on use.
    pub otp_fallback: RwLock<HashMap<String, PendingOtp>>,
}

impl AppStateInner {
    pub fn new(
        store: Arc<dyn Store>,
        messenger: Arc<dyn Messenger>,
        jwt_secret: String,
        otp_ttl: Duration,
    ) -> Self {
        Self {
            store,
            messenger,
            jwt_secret,
            otp_ttl,
            otp_fallback: RwLock::new(HashMap::new()),
        }
    }

    fn is_fresh(&self, created_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now - created_at <= self.otp_ttl
    }
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, message: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn login_code_text(code: &str) -> String {
    format!("🔐 Your MemeStreak login code:\n\n⭐ *{code}*")
}

pub async fn verify_uid(
    State(state): State<AppState>,
    Json(req): Json<VerifyUidRequest>,
) -> Json<VerifyUidResponse> {
    let Some(uid) = req.uid else {
        return Json(VerifyUidResponse { valid: false });
    };

    let valid = match state.store.account_by_uid(&uid).await {
        Ok(account) => account.is_some(),
        Err(e) => {
            error!("verifyUID lookup {} failed: {}", uid, e);
            false
        }
    };
    Json(VerifyUidResponse { valid })
}

/// Stores the website-generated code and relays it to the account's chat.
pub async fn send_code(
    State(state): State<AppState>,
    Json(req): Json<SendCodeRequest>,
) -> Result<Json<SendCodeResponse>, ApiError> {
    let (Some(uid), Some(code)) = (req.uid, req.code) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "uid and code required"));
    };

    let account = match state.store.account_by_uid(&uid).await {
        Ok(Some(account)) => account,
        Ok(None) => return Err(api_error(StatusCode::NOT_FOUND, "User not found")),
        Err(e) => {
            error!("sendCode lookup {} failed: {}", uid, e);
            return Err(api_error(StatusCode::NOT_FOUND, "User not found"));
        }
    };

    if let Err(e) = state.store.insert_otp(&uid, &code).await {
        warn!("Storing OTP for {} failed, keeping it in memory: {}", uid, e);
        state.otp_fallback.write().await.insert(
            uid.clone(),
            PendingOtp {
                otp: code.clone(),
                created_at: Utc::now(),
            },
        );
    }

    match account.chat_id {
        Some(chat_id) => {
            let sent = state
                .messenger
                .send_text(chat_id, &login_code_text(&code), SendOptions::markdown())
                .await;
            match sent {
                Ok(()) => info!("Login code sent to {}", uid),
                Err(e) if e.is_blocked() => info!("{} blocked the bot, login code not delivered", uid),
                Err(e) => error!("Sending login code to {} failed: {}", uid, e),
            }
        }
        None => warn!("{} has no chat to send the login code to", uid),
    }

    Ok(Json(SendCodeResponse { success: true }))
}

/// Checks the newest stored code, then the in-memory fallback.
pub async fn verify_otp(
    State(state): State<AppState>,
    Json(req): Json<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>, (StatusCode, Json<VerifyOtpResponse>)> {
    let invalid = VerifyOtpResponse {
        valid: false,
        token: None,
    };
    let (Some(uid), Some(otp)) = (req.uid, req.otp) else {
        return Ok(Json(invalid));
    };
    let now = Utc::now();

    let mut matched = match state.store.latest_otp(&uid).await {
        Ok(Some(row)) => row.otp == otp && state.is_fresh(row.created_at, now),
        Ok(None) => false,
        Err(e) => {
            error!("verifyOTP lookup {} failed: {}", uid, e);
            false
        }
    };

    if !matched {
        let mut fallback = state.otp_fallback.write().await;
        let hit = fallback.get(&uid).is_some_and(|pending| pending.otp == otp);
        if hit {
            if let Some(pending) = fallback.remove(&uid) {
                matched = state.is_fresh(pending.created_at, now);
            }
        }
    }

    if !matched {
        return Ok(Json(invalid));
    }

    match create_token(&state.jwt_secret, &uid, now) {
        Ok(token) => {
            info!("{} logged in", uid);
            Ok(Json(VerifyOtpResponse {
                valid: true,
                token: Some(token),
            }))
        }
        Err(e) => {
            error!("Issuing token for {} failed: {}", uid, e);
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(invalid)))
        }
    }
}

pub async fn auto_login(
    State(state): State<AppState>,
    Json(req): Json<AutoLoginRequest>,
) -> Json<AutoLoginResponse> {
    let claims = req
        .token
        .and_then(|token| verify_token(&state.jwt_secret, &token).ok());

    Json(match claims {
        Some(claims) => AutoLoginResponse {
            logged_in: true,
            uid: Some(claims.uid),
        },
        None => AutoLoginResponse {
            logged_in: false,
            uid: None,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, header},
    };
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use memestreak_db::{AccountStore, Database, OtpStore};
    use memestreak_telegram::testing::RecordingMessenger;
    use memestreak_types::models::Account;

    use crate::router;

    const SECRET: &str = "test-secret";

    struct Harness {
        state: AppState,
        db: Arc<Database>,
        messenger: Arc<RecordingMessenger>,
    }

    async fn harness() -> Harness {
        let db = Arc::new(Database::open_in_memory().unwrap());
        db.insert_account(&Account {
            uid: "MS123456".into(),
            chat_id: Some(555),
            username: Some("ann_k".into()),
            first_name: Some("Ann".into()),
            last_name: None,
        })
        .await
        .unwrap();
        let messenger = Arc::new(RecordingMessenger::new());
        let state = Arc::new(AppStateInner::new(
            db.clone(),
            messenger.clone(),
            SECRET.to_string(),
            Duration::minutes(10),
        ));
        Harness {
            state,
            db,
            messenger,
        }
    }

    async fn post(state: &AppState, path: &str, body: Value) -> (StatusCode, Value) {
        let response = router(state.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(path)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn verify_uid_reports_existence() {
        let h = harness().await;
        assert_eq!(
            post(&h.state, "/verifyUID", json!({"uid": "MS123456"})).await,
            (StatusCode::OK, json!({"valid": true}))
        );
        assert_eq!(
            post(&h.state, "/verifyUID", json!({"uid": "MS000000"})).await.1,
            json!({"valid": false})
        );
        assert_eq!(post(&h.state, "/verifyUID", json!({})).await.1, json!({"valid": false}));
    }

    #[tokio::test]
    async fn send_code_validates_input() {
        let h = harness().await;
        assert_eq!(
            post(&h.state, "/sendCode", json!({"uid": "MS123456"})).await,
            (StatusCode::BAD_REQUEST, json!({"error": "uid and code required"}))
        );
        assert_eq!(
            post(&h.state, "/sendCode", json!({"uid": "MS000000", "code": 1})).await,
            (StatusCode::NOT_FOUND, json!({"error": "User not found"}))
        );
    }

    #[tokio::test]
    async fn send_code_stores_and_relays() {
        let h = harness().await;
        let (status, body) =
            post(&h.state, "/sendCode", json!({"uid": "MS123456", "code": 482913})).await;

        assert_eq!((status, body), (StatusCode::OK, json!({"success": true})));
        assert_eq!(h.db.latest_otp("MS123456").await.unwrap().unwrap().otp, "482913");
        assert_eq!(
            h.messenger.texts_to(555),
            vec!["🔐 Your MemeStreak login code:\n\n⭐ *482913*".to_string()]
        );
    }

    #[tokio::test]
    async fn send_code_succeeds_when_user_blocked_bot() {
        let h = harness().await;
        h.messenger.block(555);
        let (status, body) =
            post(&h.state, "/sendCode", json!({"uid": "MS123456", "code": "111222"})).await;
        assert_eq!((status, body), (StatusCode::OK, json!({"success": true})));
    }

    #[tokio::test]
    async fn otp_round_trip_issues_usable_token() {
        let h = harness().await;
        post(&h.state, "/sendCode", json!({"uid": "MS123456", "code": "482913"})).await;

        let (_, wrong) = post(&h.state, "/verifyOTP", json!({"uid": "MS123456", "otp": "000000"})).await;
        assert_eq!(wrong, json!({"valid": false}));

        // Numeric otp matches the stored text code.
        let (_, ok) = post(&h.state, "/verifyOTP", json!({"uid": "MS123456", "otp": 482913})).await;
        assert_eq!(ok["valid"], true);
        let token = ok["token"].as_str().unwrap().to_string();

        let (_, login) = post(&h.state, "/autoLogin", json!({"token": token})).await;
        assert_eq!(login, json!({"loggedIn": true, "uid": "MS123456"}));
    }

    #[tokio::test]
    async fn stale_otp_is_rejected() {
        let h = harness().await;
        h.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO login_otps (uid, otp, created_at) VALUES ('MS123456', '777777', '2020-01-01T00:00:00.000000Z')",
                [],
            )?;
            Ok(())
        })
        .unwrap();

        let (_, body) = post(&h.state, "/verifyOTP", json!({"uid": "MS123456", "otp": "777777"})).await;
        assert_eq!(body, json!({"valid": false}));
    }

    #[tokio::test]
    async fn fallback_code_is_single_use() {
        let h = harness().await;
        h.db.with_conn(|conn| {
            conn.execute_batch("DROP TABLE login_otps")?;
            Ok(())
        })
        .unwrap();

        post(&h.state, "/sendCode", json!({"uid": "MS123456", "code": "654321"})).await;
        assert!(h.state.otp_fallback.read().await.contains_key("MS123456"));

        let (_, first) = post(&h.state, "/verifyOTP", json!({"uid": "MS123456", "otp": "654321"})).await;
        assert_eq!(first["valid"], true);
        let (_, second) = post(&h.state, "/verifyOTP", json!({"uid": "MS123456", "otp": "654321"})).await;
        assert_eq!(second, json!({"valid": false}));
    }

    #[tokio::test]
    async fn auto_login_rejects_bad_tokens() {
        let h = harness().await;
        let foreign = create_token("someone-else", "MS123456", Utc::now()).unwrap();

        for body in [json!({}), json!({"token": "garbage"}), json!({"token": foreign})] {
            let (status, reply) = post(&h.state, "/autoLogin", body).await;
            assert_eq!((status, reply), (StatusCode::OK, json!({"loggedIn": false})));
        }
    }

    #[tokio::test]
    async fn health_and_preflight() {
        let h = harness().await;
        let app = router(h.state.clone());

        let health = app
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(health.status(), StatusCode::OK);
        let bytes = health.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(serde_json::from_slice::<Value>(&bytes).unwrap(), json!({"status": "ok"}));

        let preflight = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/sendCode")
                    .header(header::ORIGIN, "https://hub.example.org")
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(preflight.status(), StatusCode::OK);
        assert_eq!(
            preflight.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
    }
}
