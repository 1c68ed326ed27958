//! Public lesson catalogue and contributions

use crate::services::database::lessons::KIND_LESSON;
use crate::services::session::CurrentUser;
use crate::AppState;
use actix_web::{get, post, web, HttpResponse};
use learnpy_common::types::{LessonInput, LessonStatus, SolutionResponse};
use learnpy_common::{AppError, Result};
use tracing::info;
use validator::Validate;

/// Approved lessons, newest first
#[get("")]
pub async fn list_lessons(state: web::Data<AppState>) -> Result<HttpResponse> {
    let lessons = state.db.lessons.list_by_status(LessonStatus::Approved).await?;
    Ok(HttpResponse::Ok().json(lessons))
}

#[get("/{id}")]
pub async fn get_lesson(state: web::Data<AppState>, path: web::Path<i64>) -> Result<HttpResponse> {
    let id = path.into_inner();
    let lesson = state
        .db
        .lessons
        .get(id)
        .await?
        .filter(|lesson| lesson.status == LessonStatus::Approved)
        .ok_or_else(|| AppError::NotFound(format!("lesson {}", id)))?;

    Ok(HttpResponse::Ok().json(lesson))
}

#[get("/{id}/solution")]
pub async fn get_solution(
    state: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let solution = state.db.lessons.solution(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(SolutionResponse::from(solution)))
}

/// Lesson submitted by a learner; waits for moderation
#[post("/contribute")]
pub async fn contribute_lesson(
    state: web::Data<AppState>,
    user: CurrentUser,
    body: web::Json<LessonInput>,
) -> Result<HttpResponse> {
    body.validate()?;

    let lesson = state
        .db
        .lessons
        .create(&body, &user.username, LessonStatus::Pending, KIND_LESSON)
        .await?;
    info!(lesson_id = lesson.id, author = %user.username, "Lesson contributed");

    Ok(HttpResponse::Created().json(lesson))
}
