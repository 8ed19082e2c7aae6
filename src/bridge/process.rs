//! Agent process spawning and control.
//!
//! `InvocationSpec` captures what the caller asked for, `AgentInvocation`
//! turns it into an argument vector and environment overlay for one agent,
//! and `AgentProcess` owns the running child.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::{Child, ChildStderr, ChildStdout, Command};

use crate::bridge::{AgentKind, SandboxMode};
use crate::config::AgentConfig;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The binary was not found.
    #[error("Agent binary not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Everything the caller asked for in one run.
#[derive(Debug, Clone)]
pub struct InvocationSpec {
    agent: AgentKind,
    prompt: String,
    workdir: Option<PathBuf>,
    sandbox: Option<SandboxMode>,
    model: Option<String>,
    resume: Option<String>,
    attachments: Vec<PathBuf>,
    auto_approve: bool,
    stream: bool,
    verbose: bool,
}

impl InvocationSpec {
    /// Create an invocation for `agent` with the given prompt.
    #[must_use]
    pub fn new(agent: AgentKind, prompt: impl Into<String>) -> Self {
        Self {
            agent,
            prompt: prompt.into(),
            workdir: None,
            sandbox: None,
            model: None,
            resume: None,
            attachments: Vec::new(),
            auto_approve: false,
            stream: false,
            verbose: false,
        }
    }

    /// Set the working directory for the agent.
    #[must_use]
    pub fn workdir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir = Some(dir.into());
        self
    }

    /// Request a sandbox mode.
    #[must_use]
    pub fn sandbox(mut self, mode: SandboxMode) -> Self {
        self.sandbox = Some(mode);
        self
    }

    /// Override the configured model.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Resume an earlier session.
    #[must_use]
    pub fn resume(mut self, token: impl Into<String>) -> Self {
        self.resume = Some(token.into());
        self
    }

    /// Attach a file (codex `--image`).
    #[must_use]
    pub fn attach(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }

    /// Let the agent act without asking for approval.
    #[must_use]
    pub fn auto_approve(mut self, enabled: bool) -> Self {
        self.auto_approve = enabled;
        self
    }

    /// Forward text to the caller as it arrives.
    #[must_use]
    pub fn stream(mut self, enabled: bool) -> Self {
        self.stream = enabled;
        self
    }

    /// Emit diagnostics for malformed and unclassified lines.
    #[must_use]
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.verbose = enabled;
        self
    }

    #[must_use]
    pub fn agent(&self) -> AgentKind {
        self.agent
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.stream
    }

    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// A fully resolved command line for one agent run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentInvocation {
    agent: AgentKind,
    args: Vec<String>,
    env: BTreeMap<String, String>,
    workdir: Option<PathBuf>,
}

impl AgentInvocation {
    /// Resolve `spec` against the agent's config.
    ///
    /// The model on the command line wins over the configured one; empty
    /// config values are not injected. A relative working directory is
    /// made absolute against the bridge's own current directory, so codex
    /// `--cd` and the child's cwd name the same place.
    #[must_use]
    pub fn new(spec: &InvocationSpec, config: &AgentConfig) -> Self {
        let model = spec
            .model
            .clone()
            .or_else(|| Some(config.model.clone()).filter(|m| !m.is_empty()));
        let workdir = spec.workdir.as_deref().map(absolute_dir);

        let args = match spec.agent {
            AgentKind::Codex => codex_args(spec, model.as_deref(), workdir.as_deref()),
            AgentKind::Gemini => gemini_args(spec, model.as_deref()),
        };

        let mut env = BTreeMap::new();
        if !config.api_key.is_empty() {
            env.insert(spec.agent.api_key_env().to_string(), config.api_key.clone());
        }
        if !config.base_url.is_empty() {
            env.insert(spec.agent.base_url_env().to_string(), config.base_url.clone());
        }

        Self {
            agent: spec.agent,
            args,
            env,
            workdir,
        }
    }

    #[must_use]
    pub fn agent(&self) -> AgentKind {
        self.agent
    }

    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Variables layered over the inherited environment of the child.
    #[must_use]
    pub fn env_overlay(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    #[must_use]
    pub fn workdir(&self) -> Option<&Path> {
        self.workdir.as_deref()
    }

    /// Human-readable command line. Overlay values are left out.
    #[must_use]
    pub fn display_command(&self, binary: &str) -> String {
        let mut line = binary.to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

fn absolute_dir(dir: &Path) -> PathBuf {
    std::path::absolute(dir).unwrap_or_else(|e| {
        tracing::warn!(dir = %dir.display(), error = %e, "Could not make workdir absolute");
        dir.to_path_buf()
    })
}

fn codex_args(spec: &InvocationSpec, model: Option<&str>, workdir: Option<&Path>) -> Vec<String> {
    let mut args = vec!["exec".to_string()];

    if let Some(mode) = spec.sandbox {
        args.push("--sandbox".to_string());
        args.push(mode.as_str().to_string());
    }

    if let Some(dir) = workdir {
        args.push("--cd".to_string());
        args.push(dir.display().to_string());
    }

    if let Some(model) = model {
        args.push("--model".to_string());
        args.push(model.to_string());
    }

    if spec.auto_approve {
        args.push("--full-auto".to_string());
    }

    for image in &spec.attachments {
        args.push("--image".to_string());
        args.push(image.display().to_string());
    }

    args.push("--json".to_string());

    if let Some(token) = &spec.resume {
        args.push("resume".to_string());
        if matches!(token.as_str(), "last" | "latest") {
            args.push("--last".to_string());
        } else {
            args.push(token.clone());
        }
    }

    args.push("--".to_string());
    args.push(spec.prompt.clone());
    args
}

fn gemini_args(spec: &InvocationSpec, model: Option<&str>) -> Vec<String> {
    let mut args = Vec::new();

    if spec.sandbox.is_some() {
        args.push("--sandbox".to_string());
    }

    if spec.auto_approve {
        args.push("--yolo".to_string());
    }

    if let Some(model) = model {
        args.push("--model".to_string());
        args.push(model.to_string());
    }

    if let Some(token) = &spec.resume {
        args.push("--resume".to_string());
        args.push(token.clone());
    }

    if !spec.attachments.is_empty() {
        tracing::warn!(
            count = spec.attachments.len(),
            "gemini does not accept attachments, ignoring them"
        );
    }

    args.push("-o".to_string());
    args.push("stream-json".to_string());
    args.push(spec.prompt.clone());
    args
}

/// A running agent process.
#[derive(Debug)]
pub struct AgentProcess {
    child: Child,
}

impl AgentProcess {
    /// Spawn the agent's own executable.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn(invocation: &AgentInvocation) -> Result<Self, SpawnError> {
        Self::spawn_with_binary(invocation.agent.binary(), invocation)
    }

    /// Spawn a process using a custom binary (for testing).
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process fails to spawn.
    pub fn spawn_with_binary(
        binary: impl AsRef<std::ffi::OsStr>,
        invocation: &AgentInvocation,
    ) -> Result<Self, SpawnError> {
        let mut cmd = Command::new(binary);
        cmd.args(&invocation.args)
            .envs(&invocation.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref dir) = invocation.workdir {
            cmd.current_dir(dir);
        }

        tracing::debug!(
            agent = %invocation.agent,
            env = ?invocation.env.keys().collect::<Vec<_>>(),
            "Spawning agent"
        );

        let child = cmd.spawn().map_err(SpawnError::from_io)?;

        Ok(Self { child })
    }

    /// Take ownership of the stdout handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stdout(&mut self) -> Option<ChildStdout> {
        self.child.stdout.take()
    }

    /// Take ownership of the stderr handle.
    ///
    /// This can only be called once; subsequent calls return `None`.
    pub fn take_stderr(&mut self) -> Option<ChildStderr> {
        self.child.stderr.take()
    }

    /// Get the process ID, if still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Wait for the process to exit.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting fails.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Forcefully kill the process.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be sent.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }

    /// Attempt graceful termination with a timeout.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Returns an error if termination fails.
    pub async fn graceful_terminate(&mut self, timeout: Duration) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            self.graceful_terminate_unix(timeout).await
        }

        #[cfg(not(unix))]
        {
            let _ = timeout;
            self.kill().await
        }
    }

    #[cfg(unix)]
    async fn graceful_terminate_unix(&mut self, timeout: Duration) -> std::io::Result<()> {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else {
            return Ok(());
        };

        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        let _ = kill(nix_pid, Signal::SIGTERM);

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(e),
            Err(_) => {
                tracing::debug!(pid, "Agent ignored SIGTERM, killing");
                self.child.kill().await
            }
        }
    }
}

/// Exit code to report for a finished process.
///
/// A Unix signal death is reported the way shells do, as `128 + signal`.
#[must_use]
pub fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}
