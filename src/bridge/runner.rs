//! Run orchestration.
//!
//! Connects the launcher, decoder, classifier and aggregator for one run.
//! stdout is consumed on the calling task while stderr drains on its own
//! task, so a chatty agent can never block on a full stderr pipe.

use std::ffi::OsString;
use std::io::Write;
use std::time::Duration;

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::process::ChildStderr;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::bridge::{
    classify, exit_code_of, read_lines, AgentInvocation, AgentKind, AgentProcess, Aggregator,
    BridgeError, Decoded, InvocationSpec, RunResult,
};
use crate::config::AgentConfig;

/// Default timeout for graceful process termination.
pub const DEFAULT_TERMINATE_TIMEOUT: Duration = Duration::from_secs(5);

/// One agent run, from spawn to result.
#[derive(Debug)]
pub struct Bridge {
    spec: InvocationSpec,
    invocation: AgentInvocation,
    binary: Option<OsString>,
    cancel: Option<CancellationToken>,
}

impl Bridge {
    #[must_use]
    pub fn new(spec: InvocationSpec, config: &AgentConfig) -> Self {
        let invocation = AgentInvocation::new(&spec, config);
        Self {
            spec,
            invocation,
            binary: None,
            cancel: None,
        }
    }

    /// Run a different executable instead of the agent's own.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<OsString>) -> Self {
        self.binary = Some(binary.into());
        self
    }

    /// Set a cancellation token for interrupt handling.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Run the agent to completion.
    ///
    /// Streamed text goes to `sink` when streaming is enabled. The
    /// returned result is built only after stdout is exhausted and the
    /// process has exited.
    ///
    /// # Errors
    ///
    /// Returns `BridgeError::ExecutableNotFound` if the agent cannot be
    /// found, `BridgeError::Interrupted` if cancelled, or an I/O error.
    pub async fn run<W: Write>(&self, sink: W) -> Result<RunResult, BridgeError> {
        let agent = self.spec.agent();
        let verbose = self.spec.is_verbose();

        if verbose {
            tracing::debug!(
                "[{}] Running: {}",
                agent.tag(),
                self.invocation.display_command(agent.binary())
            );
        }

        let spawned = match &self.binary {
            Some(binary) => AgentProcess::spawn_with_binary(binary, &self.invocation),
            None => AgentProcess::spawn(&self.invocation),
        };
        let mut process = spawned.map_err(|e| BridgeError::from_spawn(agent, e))?;

        let stdout = process.take_stdout().ok_or(BridgeError::NoStdout)?;
        let stderr_task = process.take_stderr().map(drain_stderr);

        let mut aggregator = Aggregator::new(agent, sink, self.spec.is_streaming(), verbose);
        let cancel = self.cancel.clone().unwrap_or_default();

        // stdout is dropped before waiting, so a child still writing after
        // a read error sees a closed pipe instead of blocking.
        let pumped = pump(read_lines(stdout), &mut aggregator, agent, &cancel).await;
        if pumped == Pumped::Cancelled {
            return Err(Self::interrupt(&mut process, stderr_task).await);
        }

        let status = tokio::select! {
            biased;

            () = cancel.cancelled() => {
                return Err(Self::interrupt(&mut process, stderr_task).await);
            }
            status = process.wait() => status?,
        };
        let exit_code = exit_code_of(status);
        tracing::debug!(exit_code, "Agent exited");

        let stderr = match stderr_task {
            Some(task) => match task.await {
                Ok(Ok(text)) => text,
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "Reading agent stderr failed");
                    String::new()
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stderr task failed");
                    String::new()
                }
            },
            None => String::new(),
        };
        let state = aggregator.finish();

        // Ctrl-C can reach the agent and end it before the token is seen.
        if cancel.is_cancelled() {
            tracing::info!(exit_code, "Run cancelled as the agent exited");
            return Err(BridgeError::Interrupted);
        }

        Ok(RunResult::new(exit_code, state, &stderr))
    }

    async fn interrupt(
        process: &mut AgentProcess,
        stderr_task: Option<JoinHandle<std::io::Result<String>>>,
    ) -> BridgeError {
        tracing::info!("Run cancelled, terminating agent");
        if let Err(e) = process.graceful_terminate(DEFAULT_TERMINATE_TIMEOUT).await {
            tracing::warn!(error = %e, "Failed to terminate agent");
        }
        if let Some(task) = stderr_task {
            task.abort();
        }
        BridgeError::Interrupted
    }
}

/// How the stdout loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pumped {
    /// End of stream, or a read error that ends it.
    Drained,
    Cancelled,
}

/// Feed decoded stdout lines into the aggregator until the stream ends,
/// fails, or the run is cancelled. The stream is dropped on return.
async fn pump<S, W>(
    lines: S,
    aggregator: &mut Aggregator<W>,
    agent: AgentKind,
    cancel: &CancellationToken,
) -> Pumped
where
    S: Stream<Item = std::io::Result<Decoded>>,
    W: Write,
{
    tokio::pin!(lines);
    loop {
        let next = tokio::select! {
            biased;

            () = cancel.cancelled() => return Pumped::Cancelled,
            next = lines.next() => next,
        };

        match next {
            Some(Ok(Decoded::Event(event))) => aggregator.apply(classify(&event, agent)),
            Some(Ok(Decoded::Malformed { line, reason })) => {
                aggregator.record_malformed(&line, &reason);
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, "Reading agent stdout failed");
                return Pumped::Drained;
            }
            None => return Pumped::Drained,
        }
    }
}

/// Read all of stderr on a separate task.
fn drain_stderr(mut stderr: ChildStderr) -> JoinHandle<std::io::Result<String>> {
    tokio::spawn(async move {
        let mut buf = Vec::new();
        stderr.read_to_end(&mut buf).await?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    })
}
