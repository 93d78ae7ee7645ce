//! HTTP endpoints the website uses for passwordless login.

pub mod auth;
pub mod token;

use axum::{
    Json, Router,
    http::{Method, header},
    routing::{get, post},
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};

pub use auth::{AppState, AppStateInner};

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

/// All routes, with CORS open to any origin.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/verifyUID", post(auth::verify_uid))
        .route("/sendCode", post(auth::send_code))
        .route("/verifyOTP", post(auth::verify_otp))
        .route("/autoLogin", post(auth::auto_login))
        .route("/health", get(health))
        .layer(cors)
        .with_state(state)
}
