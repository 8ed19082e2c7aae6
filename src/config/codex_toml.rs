//! Codex CLI `config.toml` generation.
//!
//! Points the Codex CLI at the CCG endpoint through a custom model
//! provider whose key is read from `CCG_CODEX_KEY`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::bridge::AgentKind;

use super::{AgentConfig, ConfigError};

const PROVIDER_NAME: &str = "ccg";

/// Top level of `~/.codex/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CodexToml {
    pub model_provider: String,
    pub model: String,
    pub model_reasoning_effort: String,
    pub disable_response_storage: bool,
    pub preferred_auth_method: String,
    pub model_providers: BTreeMap<String, ModelProvider>,
}

/// A `[model_providers.<name>]` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelProvider {
    pub name: String,
    pub base_url: String,
    pub wire_api: String,
    pub requires_openai_auth: bool,
    pub env_key: String,
}

impl CodexToml {
    /// Build the provider config for the given codex settings.
    #[must_use]
    pub fn from_agent(config: &AgentConfig) -> Self {
        let provider = ModelProvider {
            name: PROVIDER_NAME.to_string(),
            base_url: config.base_url.clone(),
            wire_api: "responses".to_string(),
            requires_openai_auth: true,
            env_key: AgentKind::Codex.api_key_env().to_string(),
        };
        Self {
            model_provider: PROVIDER_NAME.to_string(),
            model: config.model.clone(),
            model_reasoning_effort: "high".to_string(),
            disable_response_storage: true,
            preferred_auth_method: "apikey".to_string(),
            model_providers: BTreeMap::from([(PROVIDER_NAME.to_string(), provider)]),
        }
    }

    /// Render as TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string(self)?)
    }

    /// Returns the default path, `~/.codex/config.toml`.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".codex").join("config.toml"))
    }

    /// Write to `path`. An existing file is moved to `config.toml.bak` the
    /// first time; later writes overwrite without touching the backup.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or its backup cannot be written.
    pub fn write_to(&self, path: &Path) -> Result<Option<PathBuf>, ConfigError> {
        let write_err = |source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }

        let mut backed_up = None;
        if path.exists() {
            let backup = path.with_extension("toml.bak");
            if !backup.exists() {
                std::fs::rename(path, &backup).map_err(write_err)?;
                tracing::info!(backup = %backup.display(), "Backed up existing codex config");
                backed_up = Some(backup);
            }
        }

        std::fs::write(path, self.render()?).map_err(write_err)?;
        Ok(backed_up)
    }
}
