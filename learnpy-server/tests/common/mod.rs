//! Shared helpers for server integration tests

#![allow(dead_code)]

use learnpy_sandbox::{AdmissionPolicy, ExecutionLimits, Governor, ProcessRuntime, SandboxService};
use learnpy_server::services::database::Database;
use learnpy_server::{AppState, ServerConfig};
use tempfile::TempDir;

pub const ADMIN_PASSWORD: &str = "admin-pass-123";

/// Build an actix test service around `state`
macro_rules! test_app {
    ($state:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data(actix_web::web::Data::new($state.clone()))
                .configure(learnpy_server::configure),
        )
        .await
    };
}

pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

pub fn test_config(chat_url: Option<String>, chat_key: Option<&str>) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.secret_key = Some("integration-test-secret".to_string());
    config.admin_password = Some(ADMIN_PASSWORD.to_string());
    if let Some(url) = chat_url {
        config.chat.api_url = url;
    }
    config.chat.api_key = chat_key.map(str::to_string);
    config
}

pub async fn scratch_database() -> (Database, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("learnpy.db").display());
    let db = Database::connect(&url).await.unwrap();
    (db, dir)
}

/// State backed by a `/bin/sh` sandbox; keep the guard alive for the test
pub async fn shell_state(limits: ExecutionLimits, max_concurrent: usize) -> (AppState, TempDir) {
    sandbox_state(
        SandboxService::new(
            ProcessRuntime::shell(),
            limits,
            Governor::new(max_concurrent, AdmissionPolicy::Reject),
        ),
        test_config(None, None),
    )
    .await
}

pub async fn sandbox_state(sandbox: SandboxService, config: ServerConfig) -> (AppState, TempDir) {
    setup_test_logging();
    let (db, dir) = scratch_database().await;
    let state = AppState::from_parts(config, db, sandbox);
    state.seed_admin().await.unwrap();
    (state, dir)
}

/// Host interpreter with audit hooks, resolved to its real path
pub fn host_python() -> Option<String> {
    let output = std::process::Command::new("python3")
        .args([
            "-c",
            "import sys; assert hasattr(sys, 'addaudithook'); print(sys.executable)",
        ])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8(output.stdout).ok()?.trim().to_string();
    (!path.is_empty()).then_some(path)
}
