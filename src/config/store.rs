//! File-backed store for `~/.ccg/config.json`.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::bridge::AgentKind;

use super::{AgentConfig, CcgConfig};

/// Reads and writes the bridge configuration file.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at the well-known location, `~/.ccg/config.json`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NoHomeDir` if the home directory is unknown.
    pub fn new() -> Result<Self, ConfigError> {
        Self::default_path()
            .map(Self::with_path)
            .ok_or(ConfigError::NoHomeDir)
    }

    /// Store backed by a specific file.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Returns the default path for the config file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".ccg").join("config.json"))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config file, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<Option<CcgConfig>, ConfigError> {
        if !self.path.exists() {
            return Ok(None);
        }
        tracing::debug!(path = %self.path.display(), "Loading config file");
        let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::ReadError {
            path: self.path.clone(),
            source: e,
        })?;
        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| ConfigError::ParseError {
                path: self.path.clone(),
                source: e,
            })
    }

    /// Resolve the settings for one agent.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if there is no config file, or a
    /// read/parse error if it cannot be loaded.
    pub fn resolve(&self, kind: AgentKind) -> Result<AgentConfig, ConfigError> {
        let config = self.load()?.ok_or_else(|| ConfigError::Missing {
            path: self.path.clone(),
        })?;
        Ok(config.resolve(kind))
    }

    /// Write the config file, readable by the owner only.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory or file cannot be written.
    pub fn save(&self, config: &CcgConfig) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::WriteError {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = serde_json::to_string_pretty(config).map_err(ConfigError::SerializeError)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(write_err)?;
        file.write_all(content.as_bytes()).map_err(write_err)?;

        // `mode` only applies on creation; tighten files that already existed.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))
                .map_err(write_err)?;
        }
        tracing::debug!(path = %self.path.display(), "Saved config file");
        Ok(())
    }
}

/// Errors that can occur when working with the config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Could not determine home directory.
    #[error("Could not determine home directory")]
    NoHomeDir,
    /// No config file exists.
    #[error("No configuration found at {path}. Run `ccg-bridge config --setup` to configure.")]
    Missing { path: PathBuf },
    #[error("Failed to read config from {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config from {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to serialize config: {0}")]
    SerializeError(serde_json::Error),
    #[error("Failed to render codex config.toml: {0}")]
    TomlError(#[from] toml::ser::Error),
}
