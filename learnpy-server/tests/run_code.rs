//! `/run_code` over HTTP, using a `/bin/sh` sandbox unless noted

#[macro_use]
mod common;

use actix_web::http::{header, StatusCode};
use actix_web::test;
use common::{host_python, sandbox_state, shell_state, test_config};
use learnpy_sandbox::{AdmissionPolicy, ExecutionLimits, Governor, ProcessRuntime, SandboxService};
use serde_json::{json, Value};
use std::time::Duration;

fn run(code: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/run_code")
        .set_json(json!({ "code": code }))
}

#[actix_web::test]
async fn test_success_returns_stdout() {
    let (state, _dir) = shell_state(ExecutionLimits::default(), 2).await;
    let app = test_app!(state);

    let resp = test::call_service(&app, run("echo hello\n").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"success": true, "output": "hello\n"}));
}

#[actix_web::test]
async fn test_snippet_failure_is_still_200() {
    let (state, _dir) = shell_state(ExecutionLimits::default(), 2).await;
    let app = test_app!(state);

    let resp = test::call_service(&app, run("echo partial\nexit 4\n").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": "worker exited with status 4",
            "output": "partial\n",
        })
    );
}

#[actix_web::test]
async fn test_timeout_override() {
    let (state, _dir) = shell_state(ExecutionLimits::default(), 2).await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/run_code")
        .set_json(json!({ "code": "while :; do :; done\n", "timeout_ms": 300 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(
        body,
        json!({"success": false, "error": "timeout", "truncated": true})
    );
}

#[actix_web::test]
async fn test_full_sandbox_is_503() {
    let limits = ExecutionLimits::default().with_max_duration(Duration::from_secs(2));
    let (state, _dir) = shell_state(limits, 1).await;
    let app = test_app!(state);

    let slow = async {
        let req = test::TestRequest::post()
            .uri("/run_code")
            .set_json(json!({ "code": "while :; do :; done\n", "timeout_ms": 1000 }))
            .to_request();
        test::call_service(&app, req).await
    };
    let late = async {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while state.sandbox.in_flight() < 1 {
            assert!(tokio::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        test::call_service(&app, run("echo late\n").to_request()).await
    };
    let (slow, late) = tokio::join!(slow, late);

    assert_eq!(slow.status(), StatusCode::OK);
    assert_eq!(late.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        late.headers().get(header::RETRY_AFTER).unwrap().to_str().unwrap(),
        "1"
    );
    let body: Value = test::read_body_json(late).await;
    assert_eq!(body, json!({"success": false, "error": "server busy"}));
}

#[actix_web::test]
async fn test_infrastructure_fault_is_generic_500() {
    let sandbox = SandboxService::new(
        ProcessRuntime::with_shell("/nonexistent/sh"),
        ExecutionLimits::default(),
        Governor::new(1, AdmissionPolicy::Reject),
    );
    let (state, _dir) = sandbox_state(sandbox, test_config(None, None)).await;
    let app = test_app!(state);

    let resp = test::call_service(&app, run("echo hi\n").to_request()).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "internal error"}));
}

#[actix_web::test]
async fn test_malformed_body_is_400() {
    let (state, _dir) = shell_state(ExecutionLimits::default(), 1).await;
    let app = test_app!(state);

    let req = test::TestRequest::post()
        .uri("/run_code")
        .insert_header((header::CONTENT_TYPE, "application/json"))
        .set_payload("{not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn test_shutdown_rejects_new_runs() {
    let (state, _dir) = shell_state(ExecutionLimits::default(), 1).await;
    let app = test_app!(state);

    state.sandbox.shutdown().await;
    let resp = test::call_service(&app, run("echo hi\n").to_request()).await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[actix_web::test]
async fn test_python_end_to_end() {
    let Some(python) = host_python() else {
        eprintln!("python3 with audit hooks not available; skipping");
        return;
    };
    let limits = ExecutionLimits::default().with_max_duration(Duration::from_secs(2));
    let sandbox = SandboxService::new(
        ProcessRuntime::python(python),
        limits,
        Governor::new(2, AdmissionPolicy::Reject),
    );
    let (state, _dir) = sandbox_state(sandbox, test_config(None, None)).await;
    let app = test_app!(state);

    let body: Value =
        test::call_and_read_body_json(&app, run("print(\"hello\")").to_request()).await;
    assert_eq!(body, json!({"success": true, "output": "hello\n"}));

    let body: Value =
        test::call_and_read_body_json(&app, run("while True:\n    pass\n").to_request()).await;
    assert_eq!(body["success"], json!(false));
    assert_eq!(body["error"], json!("timeout"));

    let body: Value = test::call_and_read_body_json(
        &app,
        run("import os\nos.system(\"ls\")\n").to_request(),
    )
    .await;
    assert_eq!(body["success"], json!(false));
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("sandbox violation: "));
}
