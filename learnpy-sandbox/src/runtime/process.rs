//! Process-based runtime
//!
//! Every execution gets a fresh OS process in its own process group, with an
//! empty environment, a throwaway working directory and `setrlimit` caps
//! applied between fork and exec, optionally under a dedicated account.
//! The snippet is written to the worker's stdin; stdout is streamed back in
//! chunks and stderr is kept as a bounded tail for the verdict line.

use super::Runtime;
use crate::error::{Result, SandboxError};
use crate::limits::ExecutionLimits;
use crate::types::{ExecutionRequest, ExecutionStream, WorkerExit, WorkerReport, WorkerVerdict};
use async_trait::async_trait;
use std::os::unix::process::ExitStatusExt;
use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, OnceCell};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

const BOOTSTRAP: &str = include_str!("bootstrap.py");

/// Exits 0 when the interpreter has audit hooks, 3 when it has not
const SUPPORT_CHECK: &str = "import sys; sys.exit(0 if hasattr(sys, 'addaudithook') else 3)";
const SUPPORT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

const READ_CHUNK: usize = 8 * 1024;
const STDOUT_CHANNEL_DEPTH: usize = 64;
const STDERR_TAIL_BYTES: usize = 16 * 1024;
const STDERR_LINE_MAX: usize = 512;

/// How long pipe readers may linger after the worker is reaped
const READER_GRACE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerKind {
    Python,
    Shell,
}

/// Account a worker process switches to before exec
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerUser {
    pub uid: u32,
    pub gid: u32,
}

impl WorkerUser {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

/// Process-based runtime - one isolated OS process per snippet
#[derive(Debug, Clone)]
pub struct ProcessRuntime {
    program: String,
    kind: WorkerKind,
    user: Option<WorkerUser>,
    /// Audit-hook support check result, shared by clones
    supported: Arc<OnceCell<bool>>,
}

impl ProcessRuntime {
    /// Python worker; the snippet runs under the audit-hook bootstrap that
    /// enforces [`DenyPolicy`](crate::DenyPolicy).
    pub fn python(interpreter: impl Into<String>) -> Self {
        Self::new(interpreter.into(), WorkerKind::Python)
    }

    /// `/bin/sh` worker reading its script from stdin.
    ///
    /// Only the rlimits and process isolation apply; there is no deny policy.
    pub fn shell() -> Self {
        Self::with_shell("/bin/sh")
    }

    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self::new(shell.into(), WorkerKind::Shell)
    }

    fn new(program: String, kind: WorkerKind) -> Self {
        Self {
            program,
            kind,
            user: None,
            supported: Arc::new(OnceCell::new()),
        }
    }

    /// Run every worker as `user`.
    ///
    /// The service needs the privilege to switch accounts. Root ignores the
    /// process-count limit, so a service running as root should always set one.
    pub fn run_as(mut self, user: WorkerUser) -> Self {
        self.user = Some(user);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn user(&self) -> Option<WorkerUser> {
        self.user
    }

    /// Refuse interpreters without audit hooks before any snippet reaches them
    async fn ensure_supported(&self) -> Result<()> {
        if self.kind != WorkerKind::Python {
            return Ok(());
        }
        if *self.supported.get_or_try_init(|| self.check_support()).await? {
            Ok(())
        } else {
            Err(SandboxError::Unsupported(format!(
                "`{}` has no audit hooks",
                self.program
            )))
        }
    }

    async fn check_support(&self) -> Result<bool> {
        let mut cmd = Command::new(&self.program);
        cmd.args(["-I", "-c", SUPPORT_CHECK])
            .env_clear()
            .env("LC_ALL", "C.UTF-8")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let status = tokio::time::timeout(SUPPORT_CHECK_TIMEOUT, cmd.status())
            .await
            .map_err(|_| {
                SandboxError::Unsupported(format!("`{}` did not answer the support check", self.program))
            })?
            .map_err(|source| SandboxError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        debug!(program = %self.program, %status, "interpreter support checked");

        match status.code() {
            Some(0) => Ok(true),
            Some(3) => Ok(false),
            _ => Err(SandboxError::Unsupported(format!(
                "`{}` failed the support check: {}",
                self.program, status
            ))),
        }
    }

    fn command(&self, limits: &ExecutionLimits, deadline: Duration, scratch: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.kind {
            WorkerKind::Python => {
                cmd.args(["-I", "-u", "-B", "-c", BOOTSTRAP])
                    .arg(limits.deny.to_worker_json());
            }
            WorkerKind::Shell => {
                cmd.arg("-s");
            }
        }

        cmd.env_clear()
            .env("LC_ALL", "C.UTF-8")
            .current_dir(scratch)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .process_group(0);

        // Applied before the pre_exec hook, so the rlimits below bind the new account
        if let Some(user) = self.user {
            cmd.uid(user.uid).gid(user.gid);
        }

        let caps = WorkerCaps {
            memory_bytes: limits.max_memory_bytes,
            cpu_seconds: limits.cpu_seconds(deadline),
            open_files: limits.max_open_files,
        };
        // SAFETY: the closure only calls setrlimit, which is async-signal-safe.
        unsafe {
            cmd.pre_exec(move || caps.apply());
        }
        cmd
    }
}

#[async_trait]
impl Runtime for ProcessRuntime {
    async fn execute(
        &self,
        request: &ExecutionRequest,
        limits: &ExecutionLimits,
        deadline: Duration,
        cancel: CancellationToken,
    ) -> Result<ExecutionStream> {
        self.ensure_supported().await?;

        let scratch = tempfile::Builder::new()
            .prefix("learnpy-")
            .tempdir()
            .map_err(SandboxError::Scratch)?;
        if let Some(user) = self.user {
            std::os::unix::fs::chown(scratch.path(), Some(user.uid), Some(user.gid))
                .map_err(SandboxError::Scratch)?;
        }

        // The Python bootstrap reads this run's tag first; stderr lines
        // without it are never taken as a verdict
        let tag = (self.kind == WorkerKind::Python).then(|| Uuid::new_v4().simple().to_string());
        let mut input = Vec::with_capacity(request.code.len() + 33);
        if let Some(tag) = &tag {
            input.extend_from_slice(tag.as_bytes());
            input.push(b'\n');
        }
        input.extend_from_slice(request.code.as_bytes());

        let mut child = self
            .command(limits, deadline, scratch.path())
            .spawn()
            .map_err(|source| SandboxError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        let started = Instant::now();
        let pid = child.id();
        debug!(pid, runtime = self.name(), "worker spawned");

        let (stdout_tx, stdout_rx) = mpsc::channel(STDOUT_CHANNEL_DEPTH);
        let (report_tx, report_rx) = oneshot::channel();

        let stdin_task = child.stdin.take().map(|mut stdin| {
            tokio::spawn(async move {
                // A worker that exits early closes the pipe; that is not an error here.
                let _ = stdin.write_all(&input).await;
                let _ = stdin.shutdown().await;
            })
        });
        let stdout_task = child
            .stdout
            .take()
            .map(|pipe| tokio::spawn(pump_stdout(pipe, stdout_tx)));
        let stderr_task = child.stderr.take().map(|pipe| tokio::spawn(tail_stderr(pipe)));

        tokio::spawn(async move {
            let exit = tokio::select! {
                status = child.wait() => match status {
                    Ok(status) => Some(exit_from_status(status)),
                    Err(err) => {
                        warn!(pid, error = %err, "failed to wait for worker");
                        terminate(&mut child, pid).await;
                        None
                    }
                },
                _ = tokio::time::sleep(deadline) => {
                    debug!(pid, ?deadline, "worker deadline reached");
                    terminate(&mut child, pid).await;
                    Some(WorkerExit::TimedOut)
                }
                _ = cancel.cancelled() => {
                    debug!(pid, "worker cancelled");
                    terminate(&mut child, pid).await;
                    Some(WorkerExit::Cancelled)
                }
            };

            if let Some(task) = stdin_task {
                task.abort();
            }
            if let Some(task) = stdout_task {
                join_or_abort(task).await;
            }
            let stderr = match stderr_task {
                Some(task) => join_or_abort(task).await.unwrap_or_default(),
                None => Vec::new(),
            };

            if let Err(err) = scratch.close() {
                warn!(pid, error = %err, "failed to remove worker scratch directory");
            }

            let Some(exit) = exit else {
                // Dropping the sender surfaces as a lost worker.
                return;
            };
            let (verdict, stderr_tail) = parse_stderr(&stderr, tag.as_deref());
            let _ = report_tx.send(WorkerReport {
                exit,
                verdict,
                stderr_tail,
                duration_ms: started.elapsed().as_millis() as u64,
            });
        });

        Ok(ExecutionStream {
            stdout: stdout_rx,
            report: report_rx,
        })
    }

    fn name(&self) -> &str {
        match self.kind {
            WorkerKind::Python => "python",
            WorkerKind::Shell => "shell",
        }
    }
}

/// rlimits installed in the child between fork and exec
#[derive(Debug, Clone, Copy)]
struct WorkerCaps {
    memory_bytes: u64,
    cpu_seconds: u64,
    open_files: u64,
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
type Resource = libc::__rlimit_resource_t;
#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
type Resource = libc::c_int;

impl WorkerCaps {
    fn apply(&self) -> std::io::Result<()> {
        set_rlimit(libc::RLIMIT_AS as Resource, self.memory_bytes, self.memory_bytes)?;
        // SIGXCPU at the soft limit, SIGKILL one second later
        set_rlimit(
            libc::RLIMIT_CPU as Resource,
            self.cpu_seconds,
            self.cpu_seconds + 1,
        )?;
        set_rlimit(libc::RLIMIT_FSIZE as Resource, 0, 0)?;
        set_rlimit(libc::RLIMIT_NPROC as Resource, 0, 0)?;
        set_rlimit(libc::RLIMIT_NOFILE as Resource, self.open_files, self.open_files)?;
        set_rlimit(libc::RLIMIT_CORE as Resource, 0, 0)?;
        Ok(())
    }
}

fn set_rlimit(resource: Resource, soft: u64, hard: u64) -> std::io::Result<()> {
    let rlim = libc::rlimit {
        rlim_cur: soft as libc::rlim_t,
        rlim_max: hard as libc::rlim_t,
    };
    if unsafe { libc::setrlimit(resource, &rlim) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Kill the worker's whole process group and reap the leader
async fn terminate(child: &mut Child, pid: Option<u32>) {
    if let Some(pid) = pid {
        // The worker leads its own group, so its pid is the group id.
        unsafe {
            libc::killpg(pid as libc::pid_t, libc::SIGKILL);
        }
    }
    let _ = child.start_kill();
    if let Err(err) = child.wait().await {
        warn!(pid, error = %err, "failed to reap worker");
    }
}

fn exit_from_status(status: ExitStatus) -> WorkerExit {
    match status.code() {
        Some(code) => WorkerExit::Exited(code),
        None => WorkerExit::Signaled(status.signal().unwrap_or(libc::SIGKILL)),
    }
}

async fn join_or_abort<T>(task: JoinHandle<T>) -> Option<T> {
    let abort = task.abort_handle();
    match tokio::time::timeout(READER_GRACE, task).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(_)) => None,
        Err(_) => {
            abort.abort();
            None
        }
    }
}

/// Forward stdout chunks until EOF. Once the receiver is gone the pipe is
/// still drained so the worker never blocks on a full buffer.
async fn pump_stdout<R: AsyncRead + Unpin>(mut pipe: R, tx: mpsc::Sender<Vec<u8>>) {
    let mut buf = vec![0u8; READ_CHUNK];
    let mut forwarding = true;
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                if forwarding && tx.send(buf[..n].to_vec()).await.is_err() {
                    forwarding = false;
                }
            }
        }
    }
}

/// Read stderr to EOF keeping only the last `STDERR_TAIL_BYTES`
async fn tail_stderr<R: AsyncRead + Unpin>(mut pipe: R) -> Vec<u8> {
    let mut tail = Vec::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        match pipe.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                tail.extend_from_slice(&buf[..n]);
                if tail.len() > STDERR_TAIL_BYTES {
                    let excess = tail.len() - STDERR_TAIL_BYTES;
                    tail.drain(..excess);
                }
            }
        }
    }
    tail
}

/// Split stderr into the worker's verdict and the last other non-empty line.
///
/// A verdict is a `<tag> <json>` line; workers run without a tag have none.
fn parse_stderr(stderr: &[u8], tag: Option<&str>) -> (Option<WorkerVerdict>, Option<String>) {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let verdict = tag.and_then(|tag| {
        lines.iter().rev().find_map(|line| {
            let body = line.strip_prefix(tag)?.strip_prefix(' ')?;
            serde_json::from_str::<WorkerVerdict>(body).ok()
        })
    });

    let tail = lines
        .iter()
        .rev()
        .find(|line| tag.map_or(true, |tag| !line.starts_with(tag)))
        .map(|line| {
        let mut end = line.len().min(STDERR_LINE_MAX);
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        line[..end].to_string()
    });

    (verdict, tail)
}
