//! Configuration module.

mod codex_toml;
mod store;
mod types;

pub use codex_toml::*;
pub use store::*;
pub use types::*;
