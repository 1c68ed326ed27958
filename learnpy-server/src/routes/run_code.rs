//! Snippet execution endpoint
//!
//! POST /run_code
//! Runs a snippet in the sandbox. Snippet failures (errors, timeouts,
//! violations, limits) are 200 responses with `success: false`; a full
//! sandbox is 503 and a broken sandbox is 500.

use crate::AppState;
use actix_web::{post, web, HttpResponse};
use learnpy_common::types::{RunCodeRequest, RunCodeResponse};
use learnpy_common::{AppError, Result};
use learnpy_sandbox::{ExecutionOutcome, ExecutionRequest, ExecutionResult};
use std::time::Duration;

#[post("/run_code")]
pub async fn run_code(
    state: web::Data<AppState>,
    body: web::Json<RunCodeRequest>,
) -> Result<HttpResponse> {
    let body = body.into_inner();
    let mut request = ExecutionRequest::new(body.code);
    if let Some(ms) = body.timeout_ms {
        request = request.with_timeout(Duration::from_millis(ms));
    }

    match state.sandbox.execute(request).await {
        ExecutionOutcome::Completed(result)
        | ExecutionOutcome::TimedOut(result)
        | ExecutionOutcome::Cancelled(result) => Ok(HttpResponse::Ok().json(to_response(result))),
        ExecutionOutcome::Rejected(_) => Err(AppError::Busy),
        ExecutionOutcome::Faulted(err) => Err(AppError::InternalError(format!(
            "sandbox fault: {}",
            err
        ))),
    }
}

fn to_response(result: ExecutionResult) -> RunCodeResponse {
    if result.succeeded {
        RunCodeResponse::succeeded(result.output)
    } else {
        RunCodeResponse::failed(
            result.error.unwrap_or_else(|| "error".to_string()),
            result.output,
            result.truncated,
        )
    }
}
