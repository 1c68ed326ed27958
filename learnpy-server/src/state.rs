//! Shared application state

use crate::config::ServerConfig;
use crate::services::chat_client::ChatClient;
use crate::services::database::Database;
use crate::services::password::hash_password;
use crate::services::session::SessionManager;
use learnpy_common::Result;
use learnpy_sandbox::{Governor, ProcessRuntime, SandboxService};
use std::sync::Arc;
use tracing::{info, warn};

/// Username of the seeded administrator
pub const ADMIN_USERNAME: &str = "admin";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub db: Database,
    pub sandbox: SandboxService,
    pub sessions: SessionManager,
    pub chat: ChatClient,
}

impl AppState {
    /// Connect the database and start the Python sandbox described by `config`
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let db = Database::connect(&config.database_url).await?;

        let mut runtime = ProcessRuntime::python(config.sandbox.python.clone());
        match config.sandbox.worker_user() {
            Some(user) => {
                info!(
                    uid = user.uid,
                    gid = user.gid,
                    "Sandbox workers drop to configured account"
                );
                runtime = runtime.run_as(user);
            }
            None if running_as_root() => warn!(
                "Running as root without SANDBOX_WORKER_UID; sandbox workers keep root privileges"
            ),
            None => {}
        }

        let sandbox = SandboxService::new(
            runtime,
            config.sandbox.limits(),
            Governor::new(
                config.sandbox.max_concurrent,
                config.sandbox.admission_policy(),
            ),
        );

        Ok(Self::from_parts(config, db, sandbox))
    }

    pub fn from_parts(config: ServerConfig, db: Database, sandbox: SandboxService) -> Self {
        let sessions =
            SessionManager::new(config.session_secret().as_bytes(), config.session_ttl);
        let chat = ChatClient::new(config.chat.clone());

        Self {
            config: Arc::new(config),
            db,
            sandbox,
            sessions,
            chat,
        }
    }

    /// Create or promote the `admin` account when an admin password is configured
    pub async fn seed_admin(&self) -> Result<()> {
        let Some(password) = self.config.admin_password.as_deref() else {
            return Ok(());
        };

        if self
            .db
            .users
            .ensure_admin(ADMIN_USERNAME, &hash_password(password))
            .await?
        {
            info!(username = ADMIN_USERNAME, "Seeded administrator account");
        } else {
            warn!(
                username = ADMIN_USERNAME,
                "Administrator account already exists; password left unchanged"
            );
        }
        Ok(())
    }
}

fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail
    unsafe { libc::geteuid() == 0 }
}
