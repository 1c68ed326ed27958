//! HTTP routes

pub mod admin;
pub mod auth;
pub mod chat;
pub mod contacts;
pub mod health;
pub mod lessons;
pub mod profile;
pub mod questions;
pub mod run_code;

use actix_web::web;
use learnpy_common::AppError;

/// Largest JSON body accepted by any route
const JSON_BODY_LIMIT: usize = 256 * 1024;

/// Malformed or oversized JSON bodies become 400s with the usual error body
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(JSON_BODY_LIMIT)
        .error_handler(|err, _req| AppError::Validation(err.to_string()).into())
}
