//! Administration: lesson authoring and moderation, forum cleanup, inbox
//!
//! Every handler requires [`AdminUser`].

use crate::services::database::lessons::KIND_LESSON;
use crate::services::session::AdminUser;
use crate::AppState;
use actix_web::{delete, get, post, put, web, HttpResponse};
use learnpy_common::types::{LessonInput, LessonStatus, LessonUpdate};
use learnpy_common::{AppError, Result};
use serde_json::json;
use tracing::info;
use validator::Validate;

fn done() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "success": true }))
}

#[post("/lessons")]
pub async fn create_lesson(
    state: web::Data<AppState>,
    AdminUser(admin): AdminUser,
    body: web::Json<LessonInput>,
) -> Result<HttpResponse> {
    body.validate()?;

    let lesson = state
        .db
        .lessons
        .create(&body, &admin.username, LessonStatus::Approved, KIND_LESSON)
        .await?;
    info!(lesson_id = lesson.id, admin = %admin.username, "Lesson created");

    Ok(HttpResponse::Created().json(lesson))
}

/// Contributions waiting for review, newest first
#[get("/lessons/pending")]
pub async fn pending_lessons(
    state: web::Data<AppState>,
    _admin: AdminUser,
) -> Result<HttpResponse> {
    let lessons = state.db.lessons.list_by_status(LessonStatus::Pending).await?;
    Ok(HttpResponse::Ok().json(lessons))
}

#[put("/lessons/{id}")]
pub async fn update_lesson(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<i64>,
    body: web::Json<LessonUpdate>,
) -> Result<HttpResponse> {
    body.validate()?;

    let id = path.into_inner();
    let lesson = state
        .db
        .lessons
        .update(id, &body)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("lesson {}", id)))?;

    Ok(HttpResponse::Ok().json(lesson))
}

#[delete("/lessons/{id}")]
pub async fn delete_lesson(
    state: web::Data<AppState>,
    AdminUser(admin): AdminUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    if !state.db.lessons.delete(id).await? {
        return Err(AppError::NotFound(format!("lesson {}", id)));
    }
    info!(lesson_id = id, admin = %admin.username, "Lesson deleted");
    Ok(done())
}

async fn moderate(state: &AppState, id: i64, status: LessonStatus) -> Result<HttpResponse> {
    if !state.db.lessons.set_status(id, status).await? {
        return Err(AppError::NotFound(format!("lesson {}", id)));
    }
    info!(lesson_id = id, ?status, "Lesson moderated");
    Ok(done())
}

#[post("/lessons/{id}/approve")]
pub async fn approve_lesson(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    moderate(&state, path.into_inner(), LessonStatus::Approved).await
}

#[post("/lessons/{id}/reject")]
pub async fn reject_lesson(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    moderate(&state, path.into_inner(), LessonStatus::Rejected).await
}

#[delete("/questions/{id}")]
pub async fn delete_question(
    state: web::Data<AppState>,
    AdminUser(admin): AdminUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    if !state.db.questions.delete(id).await? {
        return Err(AppError::NotFound(format!("question {}", id)));
    }
    info!(question_id = id, admin = %admin.username, "Question deleted");
    Ok(done())
}

#[get("/contacts")]
pub async fn list_contacts(
    state: web::Data<AppState>,
    _admin: AdminUser,
) -> Result<HttpResponse> {
    let contacts = state.db.contacts.list().await?;
    Ok(HttpResponse::Ok().json(contacts))
}

#[delete("/contacts/{id}")]
pub async fn delete_contact(
    state: web::Data<AppState>,
    _admin: AdminUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    if !state.db.contacts.delete(id).await? {
        return Err(AppError::NotFound(format!("contact {}", id)));
    }
    Ok(done())
}
