//! Registration and login
//!
//! Successful calls set the session cookie and also return the token.

use crate::services::password::{hash_password, verify_password};
use crate::AppState;
use actix_web::{post, web, HttpResponse};
use learnpy_common::types::{LoginRequest, RegisterRequest, SessionResponse, UserProfile};
use learnpy_common::{AppError, Result};
use tracing::info;
use validator::Validate;

/// Response carrying a fresh session for `user`
pub(crate) fn session_response(
    state: &AppState,
    mut builder: actix_web::HttpResponseBuilder,
    user: UserProfile,
) -> Result<HttpResponse> {
    let token = state.sessions.issue(&user)?;
    Ok(builder
        .cookie(state.sessions.cookie(token.clone()))
        .json(SessionResponse { user, token }))
}

#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    body: web::Json<RegisterRequest>,
) -> Result<HttpResponse> {
    body.validate()?;

    let username = body.username.trim();
    let user = state
        .db
        .users
        .create(username, &hash_password(&body.password), false)
        .await?;
    info!(user_id = user.id, username = %user.username, "User registered");

    session_response(&state, HttpResponse::Created(), user)
}

#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    body: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    body.validate()?;

    let invalid = || AppError::Unauthorized("invalid username or password".to_string());

    let stored = state
        .db
        .users
        .find_by_username(body.username.trim())
        .await?
        .ok_or_else(invalid)?;
    if !verify_password(&body.password, &stored.password_hash) {
        return Err(invalid());
    }

    let user = state.db.users.get(stored.id).await?.ok_or_else(invalid)?;
    info!(user_id = user.id, "User logged in");

    session_response(&state, HttpResponse::Ok(), user)
}

#[post("/logout")]
pub async fn logout(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .cookie(state.sessions.removal_cookie())
        .json(serde_json::json!({ "success": true }))
}
