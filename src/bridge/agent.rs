//! Agent kinds and sandbox modes.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// External coding agent driven by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Codex,
    Gemini,
}

impl AgentKind {
    /// Executable looked up on `PATH`.
    #[must_use]
    pub fn binary(self) -> &'static str {
        match self {
            Self::Codex => "codex",
            Self::Gemini => "gemini",
        }
    }

    /// Prefix used on diagnostic lines written to stderr.
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Codex => "codex_bridge",
            Self::Gemini => "gemini_bridge",
        }
    }

    /// Environment variable the agent reads its API key from.
    #[must_use]
    pub fn api_key_env(self) -> &'static str {
        match self {
            // Referenced as `env_key` by the generated codex config.toml.
            Self::Codex => "CCG_CODEX_KEY",
            Self::Gemini => "GEMINI_API_KEY",
        }
    }

    /// Environment variable the agent reads its endpoint from.
    #[must_use]
    pub fn base_url_env(self) -> &'static str {
        match self {
            Self::Codex => "OPENAI_BASE_URL",
            Self::Gemini => "GOOGLE_GEMINI_BASE_URL",
        }
    }

    /// Both agent kinds, in config file order.
    #[must_use]
    pub fn all() -> [Self; 2] {
        [Self::Codex, Self::Gemini]
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.binary())
    }
}

/// Sandbox level requested for the agent.
///
/// Gemini only has an on/off switch, so any mode enables its sandbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SandboxMode {
    ReadOnly,
    WorkspaceWrite,
    DangerFullAccess,
}

impl SandboxMode {
    /// Value passed to `codex --sandbox`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ReadOnly => "read-only",
            Self::WorkspaceWrite => "workspace-write",
            Self::DangerFullAccess => "danger-full-access",
        }
    }
}
