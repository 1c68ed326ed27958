//! Server configuration
//!
//! Layered as built-in defaults, then an optional TOML file, then
//! environment variables. The environment is read through a lookup function
//! so tests can supply their own.

use learnpy_sandbox::{AdmissionPolicy, ExecutionLimits, WorkerUser};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Signing key used when `SECRET_KEY` is unset; fine for local runs only
pub const DEV_SECRET_KEY: &str = "learnpy-dev-secret-change-me";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid value for {name}: {message}")]
    Invalid { name: String, message: String },
}

impl ConfigError {
    fn invalid(name: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,

    /// HS256 key for session tokens; `None` falls back to [`DEV_SECRET_KEY`]
    pub secret_key: Option<String>,

    #[serde(with = "humantime_serde")]
    pub session_ttl: Duration,

    /// Password for the seeded `admin` account; no account is seeded when unset
    pub admin_password: Option<String>,

    pub sandbox: SandboxSettings,
    pub chat: ChatSettings,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            database_url: "sqlite://learnpy.db".to_string(),
            secret_key: None,
            session_ttl: Duration::from_secs(24 * 60 * 60),
            admin_password: None,
            sandbox: SandboxSettings::default(),
            chat: ChatSettings::default(),
        }
    }
}

/// What the sandbox does with a request when every slot is busy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionMode {
    #[default]
    Reject,
    Queue,
}

impl FromStr for AdmissionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reject" => Ok(AdmissionMode::Reject),
            "queue" => Ok(AdmissionMode::Queue),
            other => Err(format!("expected 'reject' or 'queue', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Interpreter used for worker processes
    pub python: String,

    #[serde(with = "humantime_serde")]
    pub time_limit: Duration,

    pub output_limit_bytes: usize,
    pub memory_limit_bytes: u64,
    pub max_code_bytes: usize,
    pub max_concurrent: usize,
    pub admission: AdmissionMode,

    /// Longest a queued request waits for a slot
    #[serde(with = "humantime_serde")]
    pub queue_wait: Duration,

    /// Account the workers switch to before running a snippet
    pub worker_uid: Option<u32>,
    /// Group for `worker_uid`; defaults to the same number
    pub worker_gid: Option<u32>,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        let limits = ExecutionLimits::default();
        Self {
            python: "python3".to_string(),
            time_limit: limits.max_duration,
            output_limit_bytes: limits.max_output_bytes,
            memory_limit_bytes: limits.max_memory_bytes,
            max_code_bytes: limits.max_code_bytes,
            max_concurrent: 4,
            admission: AdmissionMode::Reject,
            queue_wait: Duration::from_millis(500),
            worker_uid: None,
            worker_gid: None,
        }
    }
}

impl SandboxSettings {
    pub fn limits(&self) -> ExecutionLimits {
        ExecutionLimits::default()
            .with_max_duration(self.time_limit)
            .with_max_output_bytes(self.output_limit_bytes)
            .with_max_memory_bytes(self.memory_limit_bytes)
            .with_max_code_bytes(self.max_code_bytes)
    }

    pub fn worker_user(&self) -> Option<WorkerUser> {
        self.worker_uid
            .map(|uid| WorkerUser::new(uid, self.worker_gid.unwrap_or(uid)))
    }

    pub fn admission_policy(&self) -> AdmissionPolicy {
        match self.admission {
            AdmissionMode::Reject => AdmissionPolicy::Reject,
            AdmissionMode::Queue => AdmissionPolicy::Queue {
                max_wait: self.queue_wait,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatSettings {
    /// Base URL of an OpenAI-compatible API
    pub api_url: String,

    /// Bearer key; without one only the canned replies are used
    pub api_key: Option<String>,

    pub model: String,

    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            api_url: "https://api.groq.com/openai/v1".to_string(),
            api_key: None,
            model: "openai/gpt-oss-120b".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    /// Load from `path` (if any) and the process environment, reading a
    /// `.env` file first when present
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    pub fn load_with<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let millis = |name: &str| -> Result<Option<Duration>, ConfigError> {
            Ok(parse(&text, name)?.map(Duration::from_millis))
        };

        if let Some(host) = text("LEARNPY_HOST") {
            self.host = host;
        }
        if let Some(port) = parse(&text, "PORT")? {
            self.port = port;
        }
        if let Some(url) = text("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(secret) = text("SECRET_KEY") {
            self.secret_key = Some(secret);
        }
        if let Some(secs) = parse(&text, "LEARNPY_SESSION_TTL_SECS")? {
            self.session_ttl = Duration::from_secs(secs);
        }
        if let Some(password) = text("LEARNPY_ADMIN_PASSWORD") {
            self.admin_password = Some(password);
        }

        let sandbox = &mut self.sandbox;
        if let Some(python) = text("SANDBOX_PYTHON") {
            sandbox.python = python;
        }
        if let Some(limit) = millis("SANDBOX_TIME_LIMIT_MS")? {
            sandbox.time_limit = limit;
        }
        if let Some(bytes) = parse(&text, "SANDBOX_OUTPUT_LIMIT_BYTES")? {
            sandbox.output_limit_bytes = bytes;
        }
        if let Some(bytes) = parse(&text, "SANDBOX_MEMORY_LIMIT_BYTES")? {
            sandbox.memory_limit_bytes = bytes;
        }
        if let Some(bytes) = parse(&text, "SANDBOX_MAX_CODE_BYTES")? {
            sandbox.max_code_bytes = bytes;
        }
        if let Some(n) = parse(&text, "SANDBOX_MAX_CONCURRENT")? {
            sandbox.max_concurrent = n;
        }
        if let Some(mode) = parse(&text, "SANDBOX_ADMISSION")? {
            sandbox.admission = mode;
        }
        if let Some(wait) = millis("SANDBOX_QUEUE_WAIT_MS")? {
            sandbox.queue_wait = wait;
        }
        if let Some(uid) = parse(&text, "SANDBOX_WORKER_UID")? {
            sandbox.worker_uid = Some(uid);
        }
        if let Some(gid) = parse(&text, "SANDBOX_WORKER_GID")? {
            sandbox.worker_gid = Some(gid);
        }

        let chat = &mut self.chat;
        if let Some(url) = text("CHAT_API_URL") {
            chat.api_url = url;
        }
        if let Some(key) = text("CHAT_API_KEY") {
            chat.api_key = Some(key);
        }
        if let Some(model) = text("CHAT_MODEL") {
            chat.model = model;
        }
        if let Some(timeout) = millis("CHAT_TIMEOUT_MS")? {
            chat.timeout = timeout;
        }

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.sandbox.max_concurrent == 0 {
            return Err(ConfigError::invalid(
                "SANDBOX_MAX_CONCURRENT",
                "must be at least 1",
            ));
        }
        if self.sandbox.time_limit.is_zero() {
            return Err(ConfigError::invalid(
                "SANDBOX_TIME_LIMIT_MS",
                "must be greater than zero",
            ));
        }
        if self.sandbox.output_limit_bytes == 0 {
            return Err(ConfigError::invalid(
                "SANDBOX_OUTPUT_LIMIT_BYTES",
                "must be greater than zero",
            ));
        }
        if self.sandbox.worker_gid.is_some() && self.sandbox.worker_uid.is_none() {
            return Err(ConfigError::invalid(
                "SANDBOX_WORKER_GID",
                "requires SANDBOX_WORKER_UID",
            ));
        }
        if self.session_ttl.is_zero() {
            return Err(ConfigError::invalid(
                "LEARNPY_SESSION_TTL_SECS",
                "must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Signing key for session tokens
    pub fn session_secret(&self) -> &str {
        self.secret_key.as_deref().unwrap_or(DEV_SECRET_KEY)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse<T, F>(text: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    text(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::invalid(name, format!("'{}': {}", raw, e)))
        })
        .transpose()
}
