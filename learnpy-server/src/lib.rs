//! learnpy server
//!
//! HTTP front end of the Python learning platform: sandboxed code runs, the
//! tutor chat, accounts, lessons, the Q&A forum and the contact inbox.

pub mod config;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use state::AppState;

use actix_web::web;

/// Register every route; shared by the binary and the integration tests
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(routes::json_config())
        .service(routes::health::health_check)
        .service(routes::run_code::run_code)
        .service(routes::chat::chat)
        .service(
            web::scope("/auth")
                .service(routes::auth::register)
                .service(routes::auth::login)
                .service(routes::auth::logout),
        )
        .service(routes::profile::get_profile)
        .service(routes::profile::update_profile)
        .service(
            web::scope("/lessons")
                .service(routes::lessons::list_lessons)
                .service(routes::lessons::contribute_lesson)
                .service(routes::lessons::get_lesson)
                .service(routes::lessons::get_solution),
        )
        .service(
            web::scope("/questions")
                .service(routes::questions::list_questions)
                .service(routes::questions::create_question)
                .service(routes::questions::get_question)
                .service(routes::questions::add_answer),
        )
        .service(routes::contacts::create_contact)
        .service(
            web::scope("/admin")
                .service(routes::admin::create_lesson)
                .service(routes::admin::pending_lessons)
                .service(routes::admin::update_lesson)
                .service(routes::admin::delete_lesson)
                .service(routes::admin::approve_lesson)
                .service(routes::admin::reject_lesson)
                .service(routes::admin::delete_question)
                .service(routes::admin::list_contacts)
                .service(routes::admin::delete_contact),
        );
}
