//! Final normalized result of a run.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::RunState;

/// The object printed to stdout when a run completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub exit_code: i32,
    pub session_id: Option<String>,
    pub message_count: usize,
    pub messages: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
}

impl RunResult {
    /// Assemble the result from the final state and captured stderr.
    ///
    /// stderr is trimmed and dropped entirely when nothing is left.
    #[must_use]
    pub fn new(exit_code: i32, state: RunState, stderr: &str) -> Self {
        let (session_id, messages) = state.into_parts();
        let stderr = stderr.trim();
        Self {
            exit_code,
            session_id,
            message_count: messages.len(),
            messages,
            stderr: (!stderr.is_empty()).then(|| stderr.to_string()),
        }
    }

    /// Pretty JSON, two-space indented.
    ///
    /// # Errors
    ///
    /// Returns an error if a message cannot be serialized.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
