//! Tutor chat endpoint
//!
//! POST /chat

use crate::AppState;
use actix_web::{post, web, HttpResponse};
use learnpy_common::types::{ChatRequest, ChatResponse};
use learnpy_common::Result;
use validator::Validate;

#[post("/chat")]
pub async fn chat(state: web::Data<AppState>, body: web::Json<ChatRequest>) -> Result<HttpResponse> {
    body.validate()?;

    let response = state.chat.reply(&body.message).await;
    Ok(HttpResponse::Ok().json(ChatResponse { response }))
}
