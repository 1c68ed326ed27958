//! Sandbox service - main entry point

use crate::collector::{CollectedOutput, OutputCollector};
use crate::error::SandboxError;
use crate::governor::Governor;
use crate::limits::ExecutionLimits;
use crate::runtime::Runtime;
use crate::types::{
    ExecutionOutcome, ExecutionRequest, ExecutionResult, FailureKind, Rejection, VerdictKind,
    WorkerExit, WorkerReport,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use uuid::Uuid;

/// Runs snippets through a [`Runtime`] under admission control and limits.
///
/// Cloning is cheap; clones share the same slots, shutdown token and tracker.
#[derive(Clone)]
pub struct SandboxService {
    runtime: Arc<dyn Runtime>,
    limits: Arc<ExecutionLimits>,
    governor: Governor,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl SandboxService {
    pub fn new(runtime: impl Runtime + 'static, limits: ExecutionLimits, governor: Governor) -> Self {
        Self {
            runtime: Arc::new(runtime),
            limits: Arc::new(limits),
            governor,
            shutdown: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// Get the runtime name
    pub fn runtime_name(&self) -> &str {
        self.runtime.name()
    }

    /// Executions currently holding a slot
    pub fn in_flight(&self) -> usize {
        self.governor.in_flight()
    }

    pub fn max_concurrent(&self) -> usize {
        self.governor.max_concurrent()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Execute one snippet in its own worker and wait for the result.
    ///
    /// Never returns before the worker has been reaped. Dropping the returned
    /// future does not stop the worker early; it still ends at its deadline.
    pub async fn execute(&self, request: ExecutionRequest) -> ExecutionOutcome {
        let execution_id = Uuid::new_v4();

        if self.is_shutting_down() {
            return ExecutionOutcome::Rejected(Rejection::ShuttingDown);
        }

        if request.code.len() > self.limits.max_code_bytes {
            tracing::info!(
                %execution_id,
                code_len = request.code.len(),
                max_code_bytes = self.limits.max_code_bytes,
                "Snippet refused: too large"
            );
            return ExecutionOutcome::Completed(ExecutionResult::failure(
                FailureKind::SnippetTooLarge,
                format!(
                    "snippet too large: {} bytes (limit {})",
                    request.code.len(),
                    self.limits.max_code_bytes
                ),
                String::new(),
            ));
        }

        let permit = match self.governor.admit().await {
            Ok(permit) => permit,
            Err(rejection) => {
                tracing::warn!(
                    %execution_id,
                    reason = %rejection,
                    in_flight = self.in_flight(),
                    "Execution rejected"
                );
                return ExecutionOutcome::Rejected(rejection);
            }
        };

        let deadline = self.limits.effective_timeout(request.timeout);
        tracing::info!(
            %execution_id,
            runtime = self.runtime.name(),
            code_len = request.code.len(),
            deadline_ms = deadline.as_millis() as u64,
            "Executing snippet"
        );

        let runtime = Arc::clone(&self.runtime);
        let limits = Arc::clone(&self.limits);
        let cancel = self.shutdown.child_token();
        let task = self.tracker.spawn(async move {
            // The slot is released only once the worker has been reaped.
            let _permit = permit;
            run_worker(runtime.as_ref(), &request, &limits, deadline, cancel).await
        });

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(err) => ExecutionOutcome::Faulted(SandboxError::Task(err.to_string())),
        };

        match &outcome {
            ExecutionOutcome::Faulted(err) => {
                tracing::error!(%execution_id, error = %err, "Sandbox infrastructure fault");
            }
            other => {
                tracing::info!(
                    %execution_id,
                    outcome = other.label(),
                    duration_ms = other.result().map(|r| r.duration_ms),
                    truncated = other.result().map(|r| r.truncated),
                    "Execution finished"
                );
            }
        }
        outcome
    }

    /// Refuse new work, kill every outstanding worker and wait for them to be reaped.
    pub async fn shutdown(&self) {
        tracing::info!(in_flight = self.in_flight(), "Sandbox shutting down");
        self.governor.close();
        self.shutdown.cancel();
        self.tracker.close();
        self.tracker.wait().await;
        tracing::info!("Sandbox shut down");
    }
}

async fn run_worker(
    runtime: &dyn Runtime,
    request: &ExecutionRequest,
    limits: &ExecutionLimits,
    deadline: Duration,
    cancel: CancellationToken,
) -> ExecutionOutcome {
    let mut stream = match runtime.execute(request, limits, deadline, cancel).await {
        Ok(stream) => stream,
        Err(err) => return ExecutionOutcome::Faulted(err),
    };

    let mut collector = OutputCollector::new(limits.max_output_bytes);
    collector.drain(&mut stream.stdout).await;

    let report = match stream.report.await {
        Ok(report) => report,
        Err(_) => return ExecutionOutcome::Faulted(SandboxError::WorkerLost),
    };

    interpret(report, collector.finish())
}

/// Turn a worker report plus its captured stdout into the caller-facing outcome
fn interpret(report: WorkerReport, output: CollectedOutput) -> ExecutionOutcome {
    let CollectedOutput {
        text, truncated, ..
    } = output;

    let finish = |mut result: ExecutionResult| {
        result.duration_ms = report.duration_ms;
        result.truncated |= truncated;
        if let WorkerExit::Exited(code) = report.exit {
            result.exit_code = Some(code);
        }
        result
    };

    match report.exit {
        WorkerExit::TimedOut => ExecutionOutcome::TimedOut(finish(ExecutionResult::failure(
            FailureKind::Timeout,
            "timeout",
            text,
        ))),
        WorkerExit::Cancelled => ExecutionOutcome::Cancelled(finish(ExecutionResult::failure(
            FailureKind::Cancelled,
            "cancelled",
            text,
        ))),
        WorkerExit::Signaled(signal) if signal == libc::SIGXCPU => ExecutionOutcome::TimedOut(
            finish(ExecutionResult::failure(FailureKind::Timeout, "timeout", text)),
        ),
        WorkerExit::Signaled(signal) if signal == libc::SIGKILL => {
            ExecutionOutcome::Completed(finish(ExecutionResult::failure(
                FailureKind::MemoryLimit,
                "memory limit exceeded",
                text,
            )))
        }
        WorkerExit::Signaled(signal) => ExecutionOutcome::Completed(finish(
            ExecutionResult::failure(
                FailureKind::Fault,
                format!("worker terminated by signal {signal}"),
                text,
            ),
        )),
        // A verdict only explains a failed exit; it never overrides a clean one
        WorkerExit::Exited(code) => match report.verdict.clone().filter(|_| code != 0) {
            Some(verdict) => {
                let result = match verdict.kind {
                    VerdictKind::Memory => ExecutionResult::failure(
                        FailureKind::MemoryLimit,
                        "memory limit exceeded",
                        text,
                    ),
                    VerdictKind::Violation => ExecutionResult::failure(
                        FailureKind::Violation,
                        format!("sandbox violation: {}", verdict.message),
                        text,
                    ),
                    VerdictKind::Fault if verdict.message.is_empty() => {
                        ExecutionResult::failure(FailureKind::Fault, "error", text)
                    }
                    VerdictKind::Fault => {
                        ExecutionResult::failure(FailureKind::Fault, verdict.message, text)
                    }
                };
                ExecutionOutcome::Completed(finish(result))
            }
            None if code == 0 && truncated => ExecutionOutcome::Completed(finish(
                ExecutionResult::failure(FailureKind::OutputLimit, "output limit exceeded", text),
            )),
            None if code == 0 => ExecutionOutcome::Completed(finish(ExecutionResult::success(
                text,
                Some(code),
                report.duration_ms,
            ))),
            None => {
                let message = report
                    .stderr_tail
                    .clone()
                    .unwrap_or_else(|| format!("worker exited with status {code}"));
                ExecutionOutcome::Completed(finish(ExecutionResult::failure(
                    FailureKind::Fault,
                    message,
                    text,
                )))
            }
        },
    }
}
