//! Session tokens and request identity
//!
//! Sessions are HS256 JWTs carried in the `learnpy_session` cookie or an
//! `Authorization: Bearer` header.

use crate::AppState;
use actix_web::cookie::{time, Cookie, SameSite};
use actix_web::dev::Payload;
use actix_web::http::header;
use actix_web::{web, FromRequest, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use learnpy_common::types::UserProfile;
use learnpy_common::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};
use std::time::Duration;

pub const SESSION_COOKIE: &str = "learnpy_session";

/// Session token claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// User id
    pub sub: String,

    pub name: String,

    #[serde(default)]
    pub admin: bool,

    pub iat: i64,
    pub exp: i64,
}

#[derive(Clone)]
pub struct SessionManager {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SessionManager {
    pub fn new(secret: &[u8], ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl,
        }
    }

    /// Sign a token for `user`
    pub fn issue(&self, user: &UserProfile) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            sub: user.id.to_string(),
            name: user.username.clone(),
            admin: user.is_admin,
            iat: now,
            exp: now + self.ttl.as_secs() as i64,
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AppError::InternalError(format!("Failed to sign session: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let validation = Validation::new(Algorithm::HS256);
        decode::<SessionClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("invalid session: {}", e)))
    }

    /// HttpOnly cookie carrying `token`
    pub fn cookie(&self, token: String) -> Cookie<'static> {
        Cookie::build(SESSION_COOKIE, token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::seconds(self.ttl.as_secs() as i64))
            .finish()
    }

    /// Cookie that clears the session in the browser
    pub fn removal_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(SESSION_COOKIE, "")
            .path("/")
            .http_only(true)
            .finish();
        cookie.make_removal();
        cookie
    }
}

/// Session token from the cookie, or failing that the bearer header
fn session_token(req: &HttpRequest) -> Option<String> {
    if let Some(cookie) = req.cookie(SESSION_COOKIE) {
        if !cookie.value().is_empty() {
            return Some(cookie.value().to_string());
        }
    }

    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Signed-in user; rejects the request with 401 otherwise
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl CurrentUser {
    fn from_request_sync(req: &HttpRequest) -> Result<Self> {
        let state = req
            .app_data::<web::Data<AppState>>()
            .ok_or_else(|| AppError::InternalError("application state missing".to_string()))?;

        let token = session_token(req)
            .ok_or_else(|| AppError::Unauthorized("login required".to_string()))?;
        let claims = state.sessions.verify(&token)?;
        let id = claims
            .sub
            .parse()
            .map_err(|_| AppError::Unauthorized("invalid session subject".to_string()))?;

        Ok(Self {
            id,
            username: claims.name,
            is_admin: claims.admin,
        })
    }
}

impl FromRequest for CurrentUser {
    type Error = AppError;
    type Future = Ready<Result<Self>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Self::from_request_sync(req))
    }
}

/// Signed-in administrator; 401 without a session, 403 for other users
#[derive(Debug, Clone)]
pub struct AdminUser(pub CurrentUser);

impl FromRequest for AdminUser {
    type Error = AppError;
    type Future = Ready<Result<Self>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(CurrentUser::from_request_sync(req).and_then(|user| {
            if user.is_admin {
                Ok(AdminUser(user))
            } else {
                Err(AppError::Forbidden("administrator only".to_string()))
            }
        }))
    }
}
