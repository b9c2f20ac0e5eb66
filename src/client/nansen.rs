//! Nansen profiler client for Smart Money classification
//!
//! Address reputation changes slowly, so answers are memoized for the
//! life of the process in an injected `LabelCache`. The cache is
//! append-only; entries are never invalidated.

use crate::client::Classifier;
use crate::error::{BotError, Result};
use crate::types::Classification;
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Nansen profiler labels endpoint
pub const NANSEN_API_URL: &str = "https://api.nansen.ai/api/v1/profiler/address/labels";

/// Labels that mark an address as Smart Money (exact, case-sensitive)
pub const SMART_LABELS: &[&str] = &[
    "Smart Trader",
    "30D Smart Trader",
    "90D Smart Trader",
    "180D Smart Trader",
    "Fund",
];

const PAGE_SIZE: u32 = 100;

/// Process-wide memo of classification results keyed by `(address, chain)`.
///
/// One instance per process, shared by reference. Addresses recur heavily
/// across a trade batch and the profiler call is expensive, so hits here
/// save most of the network traffic.
#[derive(Default)]
pub struct LabelCache {
    entries: Mutex<HashMap<(String, String), Classification>>,
}

impl LabelCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, address: &str, chain: &str) -> Option<Classification> {
        self.entries
            .lock()
            .get(&(address.to_string(), chain.to_string()))
            .cloned()
    }

    pub fn insert(&self, address: &str, chain: &str, result: Classification) {
        self.entries
            .lock()
            .insert((address.to_string(), chain.to_string()), result);
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Client for the Nansen profiler API
#[derive(Clone)]
pub struct NansenClient {
    http: Client,
    api_key: String,
    chain: String,
    cache: Arc<LabelCache>,
}

impl NansenClient {
    pub fn new(api_key: &str, chain: &str, cache: Arc<LabelCache>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            chain: chain.to_string(),
            cache,
        })
    }

    /// Ask Nansen which labels an address carries and whether any of them
    /// make it Smart Money. Memoized; only the first call per address
    /// touches the network.
    pub async fn classify_address(&self, address: &str) -> Result<Classification> {
        let address = address.to_lowercase();

        if let Some(hit) = self.cache.get(&address, &self.chain) {
            debug!("Label cache hit for {}", address);
            return Ok(hit);
        }

        let payload = json!({
            "chain": self.chain,
            "address": address,
            "pagination": { "page": 1, "per_page": PAGE_SIZE },
        });

        let resp = self
            .http
            .post(NANSEN_API_URL)
            .header("apiKey", &self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                BotError::Classification(format!("failed to call Nansen profiler: {}", e))
            })?;

        if !resp.status().is_success() {
            return Err(BotError::Classification(format!(
                "Nansen returned status {}",
                resp.status()
            )));
        }

        let body: Value = resp.json().await.map_err(|e| {
            BotError::Classification(format!("invalid JSON from Nansen: {}", e))
        })?;

        let result = parse_labels(&body)?;
        self.cache.insert(&address, &self.chain, result.clone());
        Ok(result)
    }
}

#[async_trait]
impl Classifier for NansenClient {
    async fn classify(&self, address: &str) -> Result<Classification> {
        self.classify_address(address).await
    }
}

/// Extract labels from a profiler response body. A missing `data.items`
/// means no labels; anything present under that key that is not a list is
/// an unexpected shape.
fn parse_labels(body: &Value) -> Result<Classification> {
    let items = match body.pointer("/data/items") {
        None => &[] as &[Value],
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => {
            return Err(BotError::Classification(
                "unexpected Nansen response format".to_string(),
            ))
        }
    };

    let labels: Vec<String> = items
        .iter()
        .filter_map(|item| item.get("label"))
        .filter_map(Value::as_str)
        .filter(|label| !label.is_empty())
        .map(String::from)
        .collect();

    let is_smart = labels.iter().any(|label| SMART_LABELS.contains(&label.as_str()));

    Ok(Classification { is_smart, labels })
}
