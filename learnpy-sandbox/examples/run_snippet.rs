//! Run a few snippets through the Python sandbox and print the results
//!
//! Usage: cargo run -p learnpy-sandbox --example run_snippet [python3]

use learnpy_sandbox::{
    AdmissionPolicy, ExecutionLimits, ExecutionOutcome, ExecutionRequest, Governor,
    ProcessRuntime, SandboxService,
};
use std::time::Duration;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let python = std::env::args().nth(1).unwrap_or_else(|| "python3".to_string());
    let service = SandboxService::new(
        ProcessRuntime::python(python),
        ExecutionLimits::default().with_max_duration(Duration::from_secs(2)),
        Governor::new(2, AdmissionPolicy::Reject),
    );

    println!("=== learnpy sandbox ({}) ===\n", service.runtime_name());

    let snippets = [
        ("Hello", "print('hello from the sandbox')"),
        ("Loop", "for i in range(3):\n    print(i * i)"),
        ("Runtime error", "print('before')\n1 / 0"),
        ("Timeout", "while True:\n    pass"),
        ("Violation", "import os\nos.system('ls')"),
        ("File read", "print(open('/etc/hostname').read())"),
    ];

    for (title, code) in snippets {
        println!("--- {} ---", title);
        match service.execute(ExecutionRequest::new(code)).await {
            ExecutionOutcome::Completed(result)
            | ExecutionOutcome::TimedOut(result)
            | ExecutionOutcome::Cancelled(result) => {
                print!("{}", result.output);
                println!(
                    "succeeded={} truncated={} duration={}ms",
                    result.succeeded, result.truncated, result.duration_ms
                );
                if let Some(error) = result.error {
                    println!("error: {}", error);
                }
            }
            ExecutionOutcome::Rejected(reason) => println!("rejected: {}", reason),
            ExecutionOutcome::Faulted(err) => println!("sandbox fault: {}", err),
        }
        println!();
    }

    service.shutdown().await;
}
