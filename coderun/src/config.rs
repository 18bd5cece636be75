use anyhow::{Context, Result};
use exec_session_lib::StartPolicy;
use serde::{Deserialize, Serialize};
use shared::{EraseCode, Language};
use std::fs;
use std::path::{Path, PathBuf};

/// Backend used when neither the command line nor the config names one
pub const DEFAULT_SERVER_URL: &str = "ws://127.0.0.1:5000/run";

/// Persisted client settings. Every field is optional so older files keep loading.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct CoderunConfig {
    /// Execution backend address (ws, wss, http or https)
    #[serde(default)]
    pub server_url: Option<String>,

    /// Opaque token appended to the endpoint as a query parameter
    #[serde(default)]
    pub auth_token: Option<String>,

    /// Language selected on the previous run
    #[serde(default)]
    pub last_language: Option<Language>,

    /// Control byte sent for Backspace
    #[serde(default)]
    pub erase_code: Option<EraseCode>,

    #[serde(default)]
    pub start_policy: Option<StartPolicy>,
}

impl CoderunConfig {
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = directories::ProjectDirs::from("com", "coderun", "coderun")
            .context("Failed to determine config directory")?
            .config_dir()
            .to_path_buf();

        Ok(config_dir.join("config.json"))
    }

    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path).context("Failed to read config file")?;

        let config: Self =
            serde_json::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    /// Write via temp file + rename so a crash never leaves a truncated config
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let temp_path = path.with_extension("tmp");
        let contents = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&temp_path, &contents).context("Failed to write temp config file")?;

        fs::rename(&temp_path, path).context("Failed to rename config file")?;

        Ok(())
    }

    /// CLI value > config value > default
    pub fn resolve_server_url(&self, cli: Option<&str>) -> String {
        cli.map(str::to_string)
            .or_else(|| self.server_url.clone())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    pub fn resolve_auth_token(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string).or_else(|| self.auth_token.clone())
    }
}
