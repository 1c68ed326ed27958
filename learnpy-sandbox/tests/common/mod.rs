//! Shared helpers for sandbox integration tests

#![allow(dead_code)]

use learnpy_sandbox::{
    AdmissionPolicy, ExecutionLimits, Governor, ProcessRuntime, SandboxService,
};
use std::time::Duration;

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Service backed by `/bin/sh`, reject-when-full admission
pub fn shell_service(limits: ExecutionLimits, max_concurrent: usize) -> SandboxService {
    setup_test_logging();
    SandboxService::new(
        ProcessRuntime::shell(),
        limits,
        Governor::new(max_concurrent, AdmissionPolicy::Reject),
    )
}

/// Service backed by the host `python3`, or `None` when the host has no
/// interpreter with audit hooks.
///
/// The worker runs with an empty environment, so the interpreter is resolved
/// to its real path first (version-manager shims need their environment).
pub fn python_service(limits: ExecutionLimits) -> Option<SandboxService> {
    setup_test_logging();
    let found = std::process::Command::new("python3")
        .args([
            "-c",
            "import sys; assert hasattr(sys, 'addaudithook'); print(sys.executable)",
        ])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|path| path.trim().to_string())
        .filter(|path| !path.is_empty());

    let Some(interpreter) = found else {
        eprintln!("python3 with audit hooks not available; skipping");
        return None;
    };
    Some(SandboxService::new(
        ProcessRuntime::python(interpreter),
        limits,
        Governor::new(4, AdmissionPolicy::Reject),
    ))
}

/// Poll until `service` reports `count` executions in flight
pub async fn wait_for_in_flight(service: &SandboxService, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while service.in_flight() < count {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {count} executions in flight"
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Whether any process is still alive in group `pgid`
pub fn process_group_alive(pgid: i32) -> bool {
    unsafe { libc::kill(-pgid, 0) == 0 }
}
