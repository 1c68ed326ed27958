//! Infrastructure errors raised by the sandbox itself.
//!
//! Anything the snippet does wrong is reported inside an
//! [`ExecutionResult`](crate::ExecutionResult); these errors mean the
//! isolation boundary could not do its job.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SandboxError>;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("failed to spawn worker `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to prepare worker scratch directory: {0}")]
    Scratch(#[source] std::io::Error),

    #[error("worker terminated without reporting a result")]
    WorkerLost,

    #[error("interpreter is not supported: {0}")]
    Unsupported(String),

    #[error("execution task failed: {0}")]
    Task(String),
}
