//! Own account

use crate::routes::auth::session_response;
use crate::services::password::hash_password;
use crate::services::session::CurrentUser;
use crate::AppState;
use actix_web::{get, put, web, HttpResponse};
use learnpy_common::types::UpdateProfileRequest;
use learnpy_common::{AppError, Result};
use tracing::info;
use validator::Validate;

#[get("/profile")]
pub async fn get_profile(state: web::Data<AppState>, user: CurrentUser) -> Result<HttpResponse> {
    let profile = state
        .db
        .users
        .get(user.id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("account no longer exists".to_string()))?;

    Ok(HttpResponse::Ok().json(profile))
}

/// Rename and/or change password; the session is reissued under the new name
#[put("/profile")]
pub async fn update_profile(
    state: web::Data<AppState>,
    user: CurrentUser,
    body: web::Json<UpdateProfileRequest>,
) -> Result<HttpResponse> {
    body.validate()?;

    let password_hash = body.password.as_deref().map(hash_password);
    let profile = state
        .db
        .users
        .update_profile(user.id, body.username.trim(), password_hash.as_deref())
        .await?;
    info!(
        user_id = profile.id,
        password_changed = password_hash.is_some(),
        "Profile updated"
    );

    session_response(&state, HttpResponse::Ok(), profile)
}
