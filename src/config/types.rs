//! Configuration types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::bridge::AgentKind;

const DEFAULT_CODEX_BASE_URL: &str = "https://cc.orcai.cc/openai";
const DEFAULT_CODEX_MODEL: &str = "gpt-5.3-codex";
const DEFAULT_GEMINI_BASE_URL: &str = "https://cc.orcai.cc/gemini";
const DEFAULT_GEMINI_MODEL: &str = "gemini-3-pro-preview";

/// Resolved settings for one agent, as handed to the launcher.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentConfig {
    /// Endpoint the agent should talk to.
    pub base_url: String,
    /// API key injected into the agent's environment.
    pub api_key: String,
    /// Default model when none is given on the command line.
    pub model: String,
}

impl AgentConfig {
    /// Built-in defaults for the given agent. The API key is always empty.
    #[must_use]
    pub fn defaults_for(kind: AgentKind) -> Self {
        let (base_url, model) = match kind {
            AgentKind::Codex => (DEFAULT_CODEX_BASE_URL, DEFAULT_CODEX_MODEL),
            AgentKind::Gemini => (DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL),
        };
        Self {
            base_url: base_url.to_string(),
            api_key: String::new(),
            model: model.to_string(),
        }
    }
}

/// Per-agent section of `config.json`. Absent fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl AgentSettings {
    /// Settings with every field set to the agent's defaults.
    #[must_use]
    pub fn defaults_for(kind: AgentKind) -> Self {
        let defaults = AgentConfig::defaults_for(kind);
        Self {
            base_url: Some(defaults.base_url),
            api_key: Some(defaults.api_key),
            model: Some(defaults.model),
        }
    }

    /// Fill absent fields from the agent's defaults.
    pub fn fill_defaults(&mut self, kind: AgentKind) {
        let defaults = AgentConfig::defaults_for(kind);
        self.base_url.get_or_insert(defaults.base_url);
        self.api_key.get_or_insert(defaults.api_key);
        self.model.get_or_insert(defaults.model);
    }

    /// Resolve into an `AgentConfig`, using defaults for absent fields.
    #[must_use]
    pub fn resolve(&self, kind: AgentKind) -> AgentConfig {
        let defaults = AgentConfig::defaults_for(kind);
        AgentConfig {
            base_url: self.base_url.clone().unwrap_or(defaults.base_url),
            api_key: self.api_key.clone().unwrap_or(defaults.api_key),
            model: self.model.clone().unwrap_or(defaults.model),
        }
    }
}

/// Contents of `~/.ccg/config.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CcgConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub codex: Option<AgentSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gemini: Option<AgentSettings>,
    /// Other fields we preserve but don't interpret.
    #[serde(flatten)]
    pub other: HashMap<String, serde_json::Value>,
}

impl CcgConfig {
    /// A config with both agent sections at their defaults.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            codex: Some(AgentSettings::defaults_for(AgentKind::Codex)),
            gemini: Some(AgentSettings::defaults_for(AgentKind::Gemini)),
            other: HashMap::new(),
        }
    }

    #[must_use]
    pub fn agent(&self, kind: AgentKind) -> Option<&AgentSettings> {
        match kind {
            AgentKind::Codex => self.codex.as_ref(),
            AgentKind::Gemini => self.gemini.as_ref(),
        }
    }

    /// Section for `kind`, created empty if absent.
    pub fn agent_mut(&mut self, kind: AgentKind) -> &mut AgentSettings {
        let slot = match kind {
            AgentKind::Codex => &mut self.codex,
            AgentKind::Gemini => &mut self.gemini,
        };
        slot.get_or_insert_with(AgentSettings::default)
    }

    /// Resolve the settings for one agent, filling defaults.
    #[must_use]
    pub fn resolve(&self, kind: AgentKind) -> AgentConfig {
        self.agent(kind)
            .map_or_else(|| AgentConfig::defaults_for(kind), |s| s.resolve(kind))
    }

    /// Dotted names of required fields that are absent or empty.
    #[must_use]
    pub fn missing_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        for kind in AgentKind::all() {
            let settings = self.agent(kind);
            let is_blank = |field: Option<&String>| field.map_or(true, String::is_empty);
            if is_blank(settings.and_then(|s| s.api_key.as_ref())) {
                missing.push(format!("{kind}.api_key"));
            }
            if is_blank(settings.and_then(|s| s.base_url.as_ref())) {
                missing.push(format!("{kind}.base_url"));
            }
        }
        missing
    }

    /// Copy of the config with API keys masked for display.
    #[must_use]
    pub fn masked(&self) -> Self {
        let mut display = self.clone();
        for section in [&mut display.codex, &mut display.gemini]
            .into_iter()
            .flatten()
        {
            if let Some(key) = section.api_key.as_mut() {
                *key = mask_key(key);
            }
        }
        display
    }
}

/// Mask an API key, keeping a short prefix and suffix of long keys.
#[must_use]
pub fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() > 10 {
        let head: String = chars[..6].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{head}***{tail}")
    } else if chars.is_empty() {
        String::new()
    } else {
        "***".to_string()
    }
}
