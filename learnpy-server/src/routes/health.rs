//! Health check endpoint

use crate::AppState;
use actix_web::{get, web, HttpResponse, Responder};

#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let sandbox = &state.sandbox;
    let status = if sandbox.is_shutting_down() {
        "shutting_down"
    } else {
        "healthy"
    };

    HttpResponse::Ok().json(serde_json::json!({
        "status": status,
        "version": env!("CARGO_PKG_VERSION"),
        "sandbox": {
            "runtime": sandbox.runtime_name(),
            "in_flight": sandbox.in_flight(),
            "max_concurrent": sandbox.max_concurrent(),
        },
    }))
}
