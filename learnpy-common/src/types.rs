//! Common types for the learnpy service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Body of `POST /run_code`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunCodeRequest {
    /// Snippet to execute
    #[serde(default)]
    pub code: String,

    /// Optional wall-clock budget in milliseconds; values above the
    /// service ceiling fall back to the ceiling
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// Result of `POST /run_code`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCodeResponse {
    pub success: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "is_false")]
    pub truncated: bool,
}

impl RunCodeResponse {
    pub fn succeeded(output: String) -> Self {
        Self {
            success: true,
            output: Some(output),
            error: None,
            truncated: false,
        }
    }

    /// Failed run; partial output is only included when there is some
    pub fn failed(error: String, output: String, truncated: bool) -> Self {
        Self {
            success: false,
            output: (!output.is_empty()).then_some(output),
            error: Some(error),
            truncated,
        }
    }
}

/// Body of `POST /chat`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ChatRequest {
    #[serde(default)]
    #[validate(length(max = 4000))]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
}

/// Body of `POST /auth/register`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32))]
    pub username: String,

    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

/// Body of `POST /auth/login`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, max = 32))]
    pub username: String,

    #[validate(length(min = 1, max = 128))]
    pub password: String,
}

/// Body of `PUT /profile`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct UpdateProfileRequest {
    /// New username (may equal the current one)
    #[validate(length(min = 3, max = 32))]
    pub username: String,

    /// New password; omitted to keep the current one
    #[serde(default)]
    #[validate(length(min = 6, max = 128))]
    pub password: Option<String>,
}

/// Publicly visible account data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Returned by register, login and profile updates; `token` is the same
/// value set in the session cookie, for clients that send a bearer header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub user: UserProfile,
    pub token: String,
}

/// Moderation state of a lesson
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LessonStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Lesson {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub code_example: String,
    pub exercise: String,
    pub video_url: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    pub status: LessonStatus,
    /// `course` for seeded material, `lesson` for authored or contributed ones
    pub kind: String,
}

/// Body for creating or contributing a lesson
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LessonInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1))]
    pub content: String,

    #[serde(default)]
    pub code_example: String,

    #[serde(default)]
    pub exercise: String,

    #[serde(default)]
    #[validate(length(max = 500))]
    pub video_url: String,

    /// Stored as the lesson's solution when non-empty
    #[serde(default)]
    pub solution_code: String,

    #[serde(default)]
    pub solution_explanation: String,
}

/// Body of `PUT /admin/lessons/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct LessonUpdate {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1))]
    pub content: String,

    #[serde(default)]
    pub code_example: String,

    #[serde(default)]
    pub exercise: String,

    #[serde(default)]
    #[validate(length(max = 500))]
    pub video_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Solution {
    pub solution_code: String,
    pub explanation: String,
}

/// `GET /lessons/{id}/solution`; `solution` is null when none was provided
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionResponse {
    pub solution: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

impl From<Option<Solution>> for SolutionResponse {
    fn from(solution: Option<Solution>) -> Self {
        match solution {
            Some(s) => Self {
                solution: Some(s.solution_code),
                explanation: Some(s.explanation),
            },
            None => Self {
                solution: None,
                explanation: None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Question {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
    /// Number of answers posted
    pub answers: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuestionInput {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Answer {
    pub id: i64,
    pub question_id: i64,
    pub content: String,
    pub author: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AnswerInput {
    #[validate(length(min = 1, max = 10000))]
    pub content: String,
}

/// A question with its answers, oldest first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionThread {
    pub question: Question,
    pub answers: Vec<Answer>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub id: i64,
    pub username: String,
    pub subject: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContactInput {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,

    #[validate(length(min = 1, max = 5000))]
    pub message: String,
}
