//! Q&A forum

use crate::services::database::questions::LATEST_QUESTIONS;
use crate::services::session::CurrentUser;
use crate::AppState;
use actix_web::{get, post, web, HttpResponse};
use learnpy_common::types::{AnswerInput, QuestionInput, QuestionThread};
use learnpy_common::{AppError, Result};
use validator::Validate;

#[get("")]
pub async fn list_questions(
    state: web::Data<AppState>,
    _user: CurrentUser,
) -> Result<HttpResponse> {
    let questions = state.db.questions.latest(LATEST_QUESTIONS).await?;
    Ok(HttpResponse::Ok().json(questions))
}

#[post("")]
pub async fn create_question(
    state: web::Data<AppState>,
    user: CurrentUser,
    body: web::Json<QuestionInput>,
) -> Result<HttpResponse> {
    body.validate()?;

    let question = state.db.questions.create(&body, &user.username).await?;
    Ok(HttpResponse::Created().json(question))
}

#[get("/{id}")]
pub async fn get_question(
    state: web::Data<AppState>,
    _user: CurrentUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    let question = state
        .db
        .questions
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("question {}", id)))?;
    let answers = state.db.questions.answers(id).await?;

    Ok(HttpResponse::Ok().json(QuestionThread { question, answers }))
}

#[post("/{id}/answers")]
pub async fn add_answer(
    state: web::Data<AppState>,
    user: CurrentUser,
    path: web::Path<i64>,
    body: web::Json<AnswerInput>,
) -> Result<HttpResponse> {
    body.validate()?;

    let id = path.into_inner();
    let answer = state
        .db
        .questions
        .add_answer(id, &body, &user.username)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("question {}", id)))?;

    Ok(HttpResponse::Created().json(answer))
}
