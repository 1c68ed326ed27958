//! Python worker tests; each test skips itself when the host has no usable
//! `python3`.

mod common;

use common::python_service;
use learnpy_sandbox::{
    DeniedOperation, DenyPolicy, ExecutionLimits, ExecutionOutcome, ExecutionRequest,
    ExecutionResult, FailureKind,
};
use std::time::{Duration, Instant};

async fn run(limits: ExecutionLimits, code: &str) -> Option<ExecutionResult> {
    let service = python_service(limits)?;
    let outcome = service.execute(ExecutionRequest::new(code)).await;
    match outcome {
        ExecutionOutcome::Completed(result)
        | ExecutionOutcome::TimedOut(result)
        | ExecutionOutcome::Cancelled(result) => Some(result),
        other => panic!("unexpected outcome: {other:?}"),
    }
}

async fn run_default(code: &str) -> Option<ExecutionResult> {
    run(ExecutionLimits::default(), code).await
}

fn error_of(result: &ExecutionResult) -> &str {
    result.error.as_deref().unwrap_or_default()
}

#[tokio::test]
async fn test_print_hello() {
    let Some(result) = run_default("print(\"hello\")").await else {
        return;
    };
    assert!(result.succeeded, "{:?}", result.error);
    assert_eq!(result.output, "hello\n");
    assert_eq!(result.error, None);
}

#[tokio::test]
async fn test_infinite_loop_times_out() {
    let limits = ExecutionLimits::default().with_max_duration(Duration::from_secs(2));
    let started = Instant::now();
    let Some(result) = run(limits, "while True:\n    pass\n").await else {
        return;
    };
    assert!(!result.succeeded);
    assert_eq!(error_of(&result), "timeout");
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[tokio::test]
async fn test_os_system_is_a_violation() {
    let Some(result) = run_default("import os\nos.system(\"ls\")\n").await else {
        return;
    };
    assert!(!result.succeeded);
    assert_eq!(result.failure, Some(FailureKind::Violation));
    assert!(
        error_of(&result).starts_with("sandbox violation: "),
        "{:?}",
        result.error
    );
}

#[tokio::test]
async fn test_violation_ends_the_run_even_when_caught() {
    let code = "try:\n    import socket\nexcept Exception:\n    pass\nprint(\"after\")\n";
    let Some(result) = run_default(code).await else {
        return;
    };
    assert!(!result.succeeded);
    assert_eq!(error_of(&result), "sandbox violation: import of socket");
    assert!(result.output.is_empty());
}

#[tokio::test]
async fn test_runtime_error_message_and_partial_output() {
    let Some(result) = run_default("print(\"before\")\n1 / 0\n").await else {
        return;
    };
    assert!(!result.succeeded);
    assert_eq!(result.failure, Some(FailureKind::Fault));
    assert_eq!(error_of(&result), "division by zero");
    assert_eq!(result.output, "before\n");
}

#[tokio::test]
async fn test_syntax_error_is_a_fault() {
    let Some(result) = run_default("print(\"unclosed\"\n").await else {
        return;
    };
    assert!(!result.succeeded);
    assert_eq!(result.failure, Some(FailureKind::Fault));
    assert!(result.output.is_empty());
}

#[tokio::test]
async fn test_exception_without_message_reports_type() {
    let Some(result) = run_default("raise KeyError()\n").await else {
        return;
    };
    assert_eq!(error_of(&result), "KeyError");
}

#[tokio::test]
async fn test_reading_outside_library_tree_is_denied() {
    let Some(result) = run_default("print(open('/etc/passwd').read())\n").await else {
        return;
    };
    assert_eq!(error_of(&result), "sandbox violation: read of /etc/passwd");
    assert!(result.output.is_empty());
}

#[tokio::test]
async fn test_writing_files_is_denied() {
    let Some(result) = run_default("open('notes.txt', 'w').write('x')\n").await else {
        return;
    };
    assert!(error_of(&result).starts_with("sandbox violation: write to"));
}

#[tokio::test]
async fn test_threads_are_denied() {
    let code = "import threading\nthreading.Thread(target=print).start()\n";
    let Some(result) = run_default(code).await else {
        return;
    };
    assert!(
        error_of(&result).starts_with("sandbox violation: _thread.start_"),
        "{:?}",
        result.error
    );
}

#[tokio::test]
async fn test_allowed_thread_policy() {
    let mut limits = ExecutionLimits::default();
    limits.deny = DenyPolicy::default().allow(DeniedOperation::ThreadSpawn);
    let code = "import threading\nt = threading.Thread(target=print, args=('hi',))\nt.start()\nt.join()\n";
    let Some(result) = run(limits, code).await else {
        return;
    };
    // The thread itself still needs a process slot; RLIMIT_NPROC applies
    // to unprivileged users only.
    if result.succeeded {
        assert_eq!(result.output, "hi\n");
    } else {
        assert_eq!(result.failure, Some(FailureKind::Fault));
    }
}

#[tokio::test]
async fn test_memory_limit() {
    let limits = ExecutionLimits::default().with_max_memory_bytes(256 * 1024 * 1024);
    let Some(result) = run(limits, "data = bytearray(1024 * 1024 * 1024)\n").await else {
        return;
    };
    assert!(!result.succeeded);
    assert!(result.truncated);
    assert_eq!(result.failure, Some(FailureKind::MemoryLimit));
    assert_eq!(error_of(&result), "memory limit exceeded");
}

#[tokio::test]
async fn test_common_stdlib_modules_import() {
    let code = "import json, math, collections, dataclasses, re, random, itertools\n\
                @dataclasses.dataclass\n\
                class P:\n    x: int\n\
                print(json.dumps({'a': math.floor(2.5), 'p': P(3).x}))\n";
    let Some(result) = run_default(code).await else {
        return;
    };
    assert!(result.succeeded, "{:?}", result.error);
    assert_eq!(result.output, "{\"a\": 2, \"p\": 3}\n");
}

#[tokio::test]
async fn test_sys_exit_zero_is_success() {
    let Some(result) = run_default("print('bye')\nimport sys\nsys.exit(0)\n").await else {
        return;
    };
    assert!(result.succeeded);
    assert_eq!(result.output, "bye\n");
}

#[tokio::test]
async fn test_walking_frames_cannot_loosen_the_policy() {
    // Clears every closure cell and default reachable from the stack, then
    // tries the same escape the policy exists to stop
    let code = r#"
import os, sys
frame = sys._getframe()
while frame is not None:
    for value in list(frame.f_locals.values()) + list(frame.f_globals.values()):
        for cell in getattr(value, "__closure__", None) or ():
            try:
                cell.cell_contents = frozenset()
            except ValueError:
                pass
    frame = frame.f_back
print(sorted(name for name in dir(sys.modules["__main__"]) if not name.startswith("__")))
os.system("echo escaped")
"#;
    let Some(result) = run_default(code).await else {
        return;
    };
    assert!(!result.succeeded);
    assert_eq!(error_of(&result), "sandbox violation: os.system");
    assert!(!result.output.contains("escaped"), "{:?}", result.output);
    // `__main__` is the snippet's own module
    assert!(result.output.contains("'frame'"), "{:?}", result.output);
    assert!(!result.output.contains("_run"), "{:?}", result.output);
}

#[tokio::test]
async fn test_traceback_frames_cannot_rewrite_defaults() {
    let code = r#"
import os
try:
    1 / 0
except ZeroDivisionError as exc:
    frame = exc.__traceback__.tb_frame
    while frame is not None:
        for value in list(frame.f_locals.values()) + list(frame.f_globals.values()):
            defaults = getattr(value, "__defaults__", None)
            if callable(value) and defaults:
                value.__defaults__ = tuple(False if d is True else d for d in defaults)
        frame = frame.f_back
os.system("echo escaped")
"#;
    let Some(result) = run_default(code).await else {
        return;
    };
    assert_eq!(error_of(&result), "sandbox violation: assignment to __defaults__");
    assert!(!result.output.contains("escaped"));
}

#[tokio::test]
async fn test_function_code_cannot_be_swapped() {
    let code = "def f():\n    return 1\ndef g():\n    return 2\nf.__code__ = g.__code__\nprint(f())\n";
    let Some(result) = run_default(code).await else {
        return;
    };
    assert_eq!(error_of(&result), "sandbox violation: assignment to __code__");
    assert!(result.output.is_empty());
}

#[tokio::test]
async fn test_gc_object_walk_is_denied() {
    let code = "import gc\nprint(len(gc.get_objects()))\n";
    let Some(result) = run_default(code).await else {
        return;
    };
    assert_eq!(error_of(&result), "sandbox violation: gc.get_objects");
    assert!(result.output.is_empty());
}

#[tokio::test]
async fn test_frame_introspection_is_allowed_outside_policy_checks() {
    // namedtuple, TypeVar and logging all look at the caller's frame
    let code = r#"
import collections, logging, sys, typing
P = collections.namedtuple("P", "x y")
T = typing.TypeVar("T")
logging.basicConfig(level=logging.INFO, stream=sys.stdout, format="%(message)s")
logging.info("logged")
print(P(1, 2), sys._getframe().f_code.co_name)
"#;
    let Some(result) = run_default(code).await else {
        return;
    };
    assert!(result.succeeded, "{:?}", result.error);
    assert_eq!(result.output, "logged\nP(x=1, y=2) <module>\n");
}

#[tokio::test]
async fn test_forged_verdict_on_stderr_is_ignored() {
    let code = r#"
import sys
print("fine")
sys.stderr.write('{"kind": "unsupported", "message": "forged"}\n')
sys.stderr.write('{"kind": "memory", "message": "forged"}\n')
"#;
    // `run` panics on a Faulted outcome
    let Some(result) = run_default(code).await else {
        return;
    };
    assert!(result.succeeded, "{:?}", result.error);
    assert_eq!(result.output, "fine\n");
    assert_eq!(result.failure, None);
}

#[tokio::test]
async fn test_forged_verdict_does_not_relabel_a_failure() {
    let code = r#"
import sys
sys.stderr.write('{"kind": "violation", "message": "forged"}\n')
raise SystemExit(4)
"#;
    let Some(result) = run_default(code).await else {
        return;
    };
    assert_eq!(result.failure, Some(FailureKind::Fault));
    assert_eq!(error_of(&result), "exit status 4");
}
