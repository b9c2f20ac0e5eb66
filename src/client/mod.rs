//! HTTP clients for external data providers
//!
//! - `subgraph`: Polymarket activity subgraph (trade history)
//! - `nansen`: Nansen profiler (address labels)

pub mod nansen;
pub mod subgraph;

pub use nansen::{LabelCache, NansenClient};
pub use subgraph::SubgraphClient;

use crate::error::Result;
use crate::types::{Classification, TradeRecord};
use async_trait::async_trait;

/// Source of recent trade activity
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// Fetch the most recent trades within the given window
    async fn recent_trades(&self, window_minutes: u64, limit: u32) -> Result<Vec<TradeRecord>>;
}

/// Smart Money classification for maker addresses
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify an address, returning its labels and smart-money flag
    async fn classify(&self, address: &str) -> Result<Classification>;
}
