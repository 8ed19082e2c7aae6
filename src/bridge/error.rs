//! Bridge error types.

use serde_json::json;

use crate::bridge::{AgentKind, SpawnError};
use crate::config::ConfigError;

/// Exit code reported when the agent executable is missing.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when the agent executable cannot be run.
pub const EXIT_PERMISSION_DENIED: i32 = 126;
/// Exit code reported when the run is interrupted.
pub const EXIT_INTERRUPTED: i32 = 130;

/// Errors that end a run before a result is produced.
#[derive(thiserror::Error, Debug)]
pub enum BridgeError {
    /// The agent executable is not on `PATH`.
    #[error("{agent} command not found")]
    ExecutableNotFound { agent: AgentKind },

    /// The agent executable exists but cannot be executed.
    #[error("permission denied running {agent}")]
    PermissionDenied { agent: AgentKind },

    /// The run was cancelled.
    #[error("Interrupted")]
    Interrupted,

    /// Configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Process stdout was not available.
    #[error("Process stdout not available")]
    NoStdout,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Map a spawn failure for `agent`.
    #[must_use]
    pub fn from_spawn(agent: AgentKind, err: SpawnError) -> Self {
        match err {
            SpawnError::NotFound => Self::ExecutableNotFound { agent },
            SpawnError::PermissionDenied => Self::PermissionDenied { agent },
            SpawnError::Io(e) => Self::Io(e),
        }
    }

    /// Process exit code for this failure.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ExecutableNotFound { .. } => EXIT_NOT_FOUND,
            Self::PermissionDenied { .. } => EXIT_PERMISSION_DENIED,
            Self::Interrupted => EXIT_INTERRUPTED,
            Self::Config(_) | Self::NoStdout | Self::Io(_) => 1,
        }
    }

    /// Structured error object for stderr, with a remediation hint where
    /// one exists.
    #[must_use]
    pub fn payload(&self) -> serde_json::Value {
        let message = match self {
            Self::ExecutableNotFound { agent } => format!(
                "{agent} command not found. Install the {agent} CLI and make sure it is on PATH."
            ),
            Self::PermissionDenied { agent } => {
                format!("{agent} could not be executed. Check the permissions of the {agent} binary.")
            }
            other => other.to_string(),
        };
        json!({
            "error": message,
            "exit_code": self.exit_code(),
        })
    }
}
