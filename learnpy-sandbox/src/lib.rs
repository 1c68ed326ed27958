//! learnpy sandbox - isolated execution of untrusted Python snippets
//!
//! Each snippet runs in its own short-lived worker process with a hard
//! deadline, rlimit caps, a deny policy and a bounded stdout capture.
//! Admission is limited by a single semaphore; every other piece of state
//! belongs to one execution. Unix only.

mod collector;
mod error;
mod governor;
mod limits;
mod policy;
mod runtime;
mod service;
mod types;

pub use collector::{CollectedOutput, OutputCollector};
pub use error::{Result, SandboxError};
pub use governor::{AdmissionPolicy, ExecutionPermit, Governor};
pub use limits::ExecutionLimits;
pub use policy::{DeniedOperation, DenyPolicy};
pub use runtime::{ProcessRuntime, Runtime, WorkerUser};
pub use service::SandboxService;
pub use types::{
    ExecutionOutcome, ExecutionRequest, ExecutionResult, ExecutionStream, FailureKind, Rejection,
    VerdictKind, WorkerExit, WorkerReport, WorkerVerdict,
};
