//! Core types for sandbox execution

use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Request to execute a snippet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// The code to execute
    pub code: String,

    /// Optional wall-clock budget; ignored when above the service ceiling
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl ExecutionRequest {
    /// Create a simple execution request
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            timeout: None,
        }
    }

    /// Request a shorter wall-clock budget than the service default
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Why a run did not succeed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The snippet raised or exited non-zero
    Fault,
    /// The snippet attempted a denied operation
    Violation,
    /// The snippet was larger than the accepted maximum
    SnippetTooLarge,
    /// Wall-clock (or CPU backstop) deadline reached
    Timeout,
    /// More output than the collector keeps
    OutputLimit,
    /// Address-space limit reached
    MemoryLimit,
    /// Operator cancellation (shutdown)
    Cancelled,
}

impl FailureKind {
    /// Whether this failure is a resource cap rather than a snippet error
    pub fn is_resource_limit(self) -> bool {
        matches!(
            self,
            FailureKind::Timeout
                | FailureKind::OutputLimit
                | FailureKind::MemoryLimit
                | FailureKind::Cancelled
        )
    }
}

/// Result of one snippet execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Whether the snippet ran to completion without error
    pub succeeded: bool,

    /// Captured standard output, at most the configured cap
    pub output: String,

    /// Error description, present only when `succeeded` is false
    pub error: Option<String>,

    /// Output or runtime was cut short by a limit
    pub truncated: bool,

    /// Machine-readable failure class
    pub failure: Option<FailureKind>,

    /// Worker exit code, when it exited on its own
    pub exit_code: Option<i32>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub(crate) fn success(output: String, exit_code: Option<i32>, duration_ms: u64) -> Self {
        Self {
            succeeded: true,
            output,
            error: None,
            truncated: false,
            failure: None,
            exit_code,
            duration_ms,
        }
    }

    pub(crate) fn failure(kind: FailureKind, error: impl Into<String>, output: String) -> Self {
        Self {
            succeeded: false,
            output,
            error: Some(error.into()),
            truncated: kind.is_resource_limit(),
            failure: Some(kind),
            exit_code: None,
            duration_ms: 0,
        }
    }
}

/// Reason an execution was refused before a worker started
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    /// Every execution slot is taken
    Busy,
    /// The service is shutting down
    ShuttingDown,
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::Busy => write!(f, "server busy"),
            Rejection::ShuttingDown => write!(f, "server shutting down"),
        }
    }
}

/// Tagged outcome of [`SandboxService::execute`](crate::SandboxService::execute)
#[derive(Debug)]
pub enum ExecutionOutcome {
    /// Worker terminated on its own (success, fault, violation, output/memory cap)
    Completed(ExecutionResult),
    /// Worker killed at its deadline
    TimedOut(ExecutionResult),
    /// Worker killed by operator cancellation
    Cancelled(ExecutionResult),
    /// No worker was started
    Rejected(Rejection),
    /// The isolation boundary itself failed
    Faulted(SandboxError),
}

impl ExecutionOutcome {
    /// Short label used in logs
    pub fn label(&self) -> &'static str {
        match self {
            ExecutionOutcome::Completed(r) if r.succeeded => "succeeded",
            ExecutionOutcome::Completed(_) => "failed",
            ExecutionOutcome::TimedOut(_) => "timed_out",
            ExecutionOutcome::Cancelled(_) => "cancelled",
            ExecutionOutcome::Rejected(_) => "rejected",
            ExecutionOutcome::Faulted(_) => "faulted",
        }
    }

    /// The execution result, if a worker ran
    pub fn result(&self) -> Option<&ExecutionResult> {
        match self {
            ExecutionOutcome::Completed(r)
            | ExecutionOutcome::TimedOut(r)
            | ExecutionOutcome::Cancelled(r) => Some(r),
            ExecutionOutcome::Rejected(_) | ExecutionOutcome::Faulted(_) => None,
        }
    }

    pub fn into_result(self) -> Option<ExecutionResult> {
        match self {
            ExecutionOutcome::Completed(r)
            | ExecutionOutcome::TimedOut(r)
            | ExecutionOutcome::Cancelled(r) => Some(r),
            ExecutionOutcome::Rejected(_) | ExecutionOutcome::Faulted(_) => None,
        }
    }
}

/// How a worker process ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// Exited with a status code
    Exited(i32),
    /// Killed by a signal it did not receive from us
    Signaled(i32),
    /// Killed by the supervisor at the deadline
    TimedOut,
    /// Killed by the supervisor on cancellation
    Cancelled,
}

/// Verdict the worker reported about its own run, taken only from a line
/// carrying that run's tag
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WorkerVerdict {
    pub kind: VerdictKind,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictKind {
    Fault,
    Violation,
    Memory,
}

/// Final report sent by the worker supervisor once the process is reaped
#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub exit: WorkerExit,
    pub verdict: Option<WorkerVerdict>,
    /// Last non-empty stderr line, for workers without a verdict protocol
    pub stderr_tail: Option<String>,
    pub duration_ms: u64,
}

/// Per-worker channels back to the dispatcher
pub struct ExecutionStream {
    /// Stdout chunks in production order
    pub stdout: mpsc::Receiver<Vec<u8>>,

    /// Sent exactly once, after the worker has terminated
    pub report: oneshot::Receiver<WorkerReport>,
}
