//! Error types for the bot

use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

/// Errors surfaced by the bot's core components
#[derive(Debug, Error)]
pub enum BotError {
    /// No reachable subgraph schema combination produced trade data
    #[error("trade fetch failed: {0}")]
    Fetch(String),

    /// Nansen labelling call failed or returned an unexpected shape
    #[error("classification failed: {0}")]
    Classification(String),

    /// Missing or invalid configuration (typically a required credential)
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("config load error: {0}")]
    ConfigLoad(#[from] config::ConfigError),
}
