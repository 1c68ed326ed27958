//! Runtime trait and implementations

mod process;

use crate::error::Result;
use crate::limits::ExecutionLimits;
use crate::types::{ExecutionRequest, ExecutionStream};
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub use process::{ProcessRuntime, WorkerUser};

/// Runtime abstraction for executing code
///
/// An implementation starts exactly one worker per call. The returned stream
/// delivers stdout chunks in order and, once the worker has terminated and
/// been reaped, a single [`WorkerReport`](crate::WorkerReport). The worker
/// must be killed when `deadline` elapses or `cancel` fires.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Start a worker for `request`
    async fn execute(
        &self,
        request: &ExecutionRequest,
        limits: &ExecutionLimits,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Result<ExecutionStream>;

    /// Get runtime name
    fn name(&self) -> &str;
}
