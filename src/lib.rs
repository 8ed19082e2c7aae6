//! ccg-bridge - run Codex or Gemini and normalize their JSON event streams.

pub mod bridge;
pub mod commands;
pub mod config;
