//! Resource limits configuration for sandboxed execution

use crate::policy::DenyPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Process-wide execution limits, read-only after startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Hard wall-clock deadline per execution (also the ceiling for overrides)
    pub max_duration: Duration,

    /// Maximum bytes of stdout kept in the result
    pub max_output_bytes: usize,

    /// Maximum address space of the worker in bytes
    pub max_memory_bytes: u64,

    /// Snippets longer than this are refused before a worker starts
    pub max_code_bytes: usize,

    /// Maximum open file descriptors in the worker
    pub max_open_files: u64,

    /// Operations the worker is not allowed to perform
    #[serde(default)]
    pub deny: DenyPolicy,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(5),
            max_output_bytes: 64 * 1024,
            max_memory_bytes: 256 * 1024 * 1024,
            max_code_bytes: 64 * 1024,
            max_open_files: 64,
            deny: DenyPolicy::default(),
        }
    }
}

impl ExecutionLimits {
    pub fn with_max_duration(mut self, max_duration: Duration) -> Self {
        self.max_duration = max_duration;
        self
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn with_max_memory_bytes(mut self, bytes: u64) -> Self {
        self.max_memory_bytes = bytes;
        self
    }

    pub fn with_max_code_bytes(mut self, bytes: usize) -> Self {
        self.max_code_bytes = bytes;
        self
    }

    /// Deadline for one request: the override when it fits under the ceiling,
    /// otherwise the ceiling.
    pub fn effective_timeout(&self, requested: Option<Duration>) -> Duration {
        match requested {
            Some(t) if !t.is_zero() && t <= self.max_duration => t,
            _ => self.max_duration,
        }
    }

    /// CPU-seconds backstop applied through RLIMIT_CPU; the wall-clock
    /// deadline normally fires first.
    pub fn cpu_seconds(&self, deadline: Duration) -> u64 {
        deadline.as_secs() + 1
    }
}
