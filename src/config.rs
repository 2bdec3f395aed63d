use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::events::Subject;

/// Environment variable consulted when the config file carries no key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// API key for the model service
    pub openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API (without `/chat/completions`)
    pub base_url: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Sampling temperature; kept low for reproducible derivations
    pub temperature: f32,

    /// HTTP client timeout for a single model call
    pub request_timeout_secs: u64,

    /// Address `solvr serve` binds to
    pub bind: String,

    /// Relay endpoint used by the chat when not calling the model in-process
    pub relay_url: Option<String>,

    /// Subject selected when a chat starts
    pub default_subject: Subject,

    /// Solvr home directory; holds the default config file and the log
    #[serde(skip)]
    pub solvr_home: PathBuf,

    /// Config file given with `--config`, used instead of `<solvr_home>/config.toml`
    #[serde(skip)]
    pub config_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("~"));

        Config {
            openai_api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            temperature: 0.2,
            request_timeout_secs: 120,
            bind: "127.0.0.1:3000".to_string(),
            relay_url: None,
            default_subject: Subject::Math,
            solvr_home: home.join(".solvr"),
            config_file: None,
        }
    }
}

impl Config {
    /// Load configuration from `~/.solvr/config.toml`, falling back to defaults
    pub fn load() -> Result<Self> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        let solvr_home = home.join(".solvr");

        fs::create_dir_all(&solvr_home).context("Failed to create .solvr directory")?;

        let mut config = Self::load_from(&solvr_home.join("config.toml"))?;
        config.solvr_home = solvr_home;
        config.config_file = None;
        Ok(config)
    }

    /// Load configuration from an explicit file; a missing file yields defaults.
    /// `solvr_home` stays at its default, so logs never follow the config file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Config::default()
        };

        config.config_file = Some(path.to_path_buf());
        Ok(config)
    }

    /// Save configuration to [`config_path`](Config::config_path)
    pub fn save(&self) -> Result<()> {
        let path = self.config_path();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&path, content)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(|| self.solvr_home.join("config.toml"))
    }

    /// File the terminal UI writes its logs to
    pub fn log_path(&self) -> PathBuf {
        self.solvr_home.join("solvr.log")
    }

    /// Check if an API key is configured
    pub fn has_api_key(&self) -> bool {
        self.get_api_key().is_some()
    }

    /// Get API key from config or environment
    pub fn get_api_key(&self) -> Option<String> {
        self.openai_api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var(API_KEY_ENV).ok().filter(|k| !k.trim().is_empty()))
    }

    /// Chat completions endpoint derived from `base_url`
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}
