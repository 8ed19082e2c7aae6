//! Configuration management command.
//!
//! Backs `ccg-bridge config --check | --show | --setup`. Every operation
//! returns the JSON report to print; keys in reports are always masked.

use std::path::PathBuf;

use serde_json::{json, Value};

use crate::bridge::AgentKind;
use crate::config::{CcgConfig, CodexToml, ConfigError, ConfigStore};

/// Field updates requested by `config --setup`. `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct SetupRequest {
    pub codex_url: Option<String>,
    pub codex_key: Option<String>,
    pub codex_model: Option<String>,
    pub gemini_url: Option<String>,
    pub gemini_key: Option<String>,
    pub gemini_model: Option<String>,
}

/// Outcome of `config --check`.
#[derive(Debug, Clone)]
pub struct CheckReport {
    pub configured: bool,
    pub report: Value,
}

/// Reads, validates and updates the bridge configuration.
#[derive(Debug)]
pub struct Configurator {
    store: ConfigStore,
    codex_toml_path: Option<PathBuf>,
}

impl Configurator {
    /// Creates a configurator over `store`, writing codex settings to
    /// `~/.codex/config.toml`.
    #[must_use]
    pub fn new(store: ConfigStore) -> Self {
        Self {
            store,
            codex_toml_path: CodexToml::default_path(),
        }
    }

    /// Sets a custom codex config.toml path (useful for testing).
    #[must_use]
    pub fn with_codex_toml_path(mut self, path: PathBuf) -> Self {
        self.codex_toml_path = Some(path);
        self
    }

    fn config_path(&self) -> String {
        self.store.path().display().to_string()
    }

    /// Check whether both agents have a key and endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be loaded.
    pub fn check(&self) -> Result<CheckReport, ConfigError> {
        let Some(config) = self.store.load()? else {
            return Ok(CheckReport {
                configured: false,
                report: json!({
                    "configured": false,
                    "reason": format!("No config file found at {}", self.config_path()),
                }),
            });
        };

        let missing = config.missing_fields();
        if !missing.is_empty() {
            return Ok(CheckReport {
                configured: false,
                report: json!({
                    "configured": false,
                    "missing": missing,
                    "config_path": self.config_path(),
                }),
            });
        }

        Ok(CheckReport {
            configured: true,
            report: json!({
                "configured": true,
                "config": config.masked(),
                "config_path": self.config_path(),
            }),
        })
    }

    /// Current config with keys masked.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be loaded.
    pub fn show(&self) -> Result<Value, ConfigError> {
        Ok(match self.store.load()? {
            Some(config) => json!(config.masked()),
            None => json!({
                "error": "No configuration found. Run with --setup to configure.",
            }),
        })
    }

    /// Merge `request` into the stored config, fill defaults, save it and
    /// regenerate the codex config.toml.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be read or written.
    pub fn setup(&self, request: &SetupRequest) -> Result<Value, ConfigError> {
        let mut config = self.store.load()?.unwrap_or_else(CcgConfig::with_defaults);

        let updates = [
            (AgentKind::Codex, &request.codex_url, &request.codex_key, &request.codex_model),
            (AgentKind::Gemini, &request.gemini_url, &request.gemini_key, &request.gemini_model),
        ];
        for (kind, url, key, model) in updates {
            let section = config.agent_mut(kind);
            if let Some(url) = url {
                section.base_url = Some(url.clone());
            }
            if let Some(key) = key {
                section.api_key = Some(key.clone());
            }
            if let Some(model) = model {
                section.model = Some(model.clone());
            }
            section.fill_defaults(kind);
        }

        self.store.save(&config)?;

        if let Some(path) = &self.codex_toml_path {
            let codex = CodexToml::from_agent(&config.resolve(AgentKind::Codex));
            if let Some(backup) = codex.write_to(path)? {
                tracing::warn!(backup = %backup.display(), "Existing codex config backed up");
            }
        }

        Ok(json!({
            "success": true,
            "config_path": self.config_path(),
            "config": config.masked(),
        }))
    }
}
