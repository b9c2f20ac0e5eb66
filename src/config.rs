//! Configuration loading
//!
//! Reads `config.toml` merged with `SMARTMONEY_*` environment overrides.
//! Secrets can also arrive via a `.env` file loaded at startup.

use crate::error::{BotError, Result};
use serde::Deserialize;

/// Top-level bot configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub subgraph: SubgraphConfig,
    #[serde(default)]
    pub nansen: NansenConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
}

/// Polymarket activity subgraph settings
#[derive(Debug, Clone, Deserialize)]
pub struct SubgraphConfig {
    /// Endpoint override; ignored unless it looks like a URL
    #[serde(default)]
    pub url: Option<String>,
    /// How far back to look for trades
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u64,
    /// Maximum rows per fetch
    #[serde(default = "default_limit")]
    pub limit: u32,
}

/// Nansen profiler settings
#[derive(Debug, Clone, Deserialize)]
pub struct NansenConfig {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_chain")]
    pub chain: String,
}

fn default_window_minutes() -> u64 {
    120
}

fn default_limit() -> u32 {
    200
}

fn default_chain() -> String {
    "polygon".to_string()
}

impl Default for SubgraphConfig {
    fn default() -> Self {
        Self {
            url: None,
            window_minutes: default_window_minutes(),
            limit: default_limit(),
        }
    }
}

impl Default for NansenConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            chain: default_chain(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file plus environment overrides.
    ///
    /// The file is optional so that fully env-driven deployments work;
    /// required credentials are checked by the `require_*` accessors at
    /// the point of use instead.
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("SMARTMONEY").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}

impl TelegramConfig {
    pub fn require_token(&self) -> Result<&str> {
        if self.bot_token.is_empty() {
            return Err(BotError::Configuration(
                "telegram.bot_token is not set".to_string(),
            ));
        }
        Ok(&self.bot_token)
    }
}

impl NansenConfig {
    pub fn require_api_key(&self) -> Result<&str> {
        if self.api_key.is_empty() {
            return Err(BotError::Configuration(
                "nansen.api_key is not set".to_string(),
            ));
        }
        Ok(&self.api_key)
    }
}
