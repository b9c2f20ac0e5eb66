//! Per-conversation filter/refresh cache over smart-money trades
//!
//! Orchestrates fetch → classify → keep-smart and answers repeated
//! filter/refresh requests from a per-chat cache without re-querying
//! unless explicitly told to refresh.

use crate::client::{Classifier, TradeSource};
use crate::error::Result;
use crate::types::{EnrichedTrade, OutcomeFilter};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Cached view for one conversation
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    pub smart_trades: Vec<EnrichedTrade>,
    pub outcome_filter: Option<OutcomeFilter>,
}

/// Fetches trades, classifies makers and caches the smart subset per chat.
///
/// The session map is only locked around store/read; the fetch-and-classify
/// pipeline runs without holding it.
pub struct SmartMoneyService {
    trades: Arc<dyn TradeSource>,
    classifier: Arc<dyn Classifier>,
    window_minutes: u64,
    limit: u32,
    sessions: RwLock<HashMap<i64, SessionState>>,
}

impl SmartMoneyService {
    pub fn new(
        trades: Arc<dyn TradeSource>,
        classifier: Arc<dyn Classifier>,
        window_minutes: u64,
        limit: u32,
    ) -> Self {
        Self {
            trades,
            classifier,
            window_minutes,
            limit,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch, classify and cache the current smart-trade set for a chat,
    /// with no active outcome filter.
    pub async fn initial_load(&self, chat_id: i64) -> Result<Vec<EnrichedTrade>> {
        let smart = self.fetch_smart_trades().await?;
        self.store(chat_id, smart.clone(), None).await;
        Ok(smart)
    }

    /// Record an outcome filter against the cached set. Performs no
    /// network calls when a cached set exists; otherwise behaves as an
    /// initial load first. An unrecognized token clears the filter.
    pub async fn apply_filter(&self, chat_id: i64, token: &str) -> Result<Vec<EnrichedTrade>> {
        let filter = OutcomeFilter::parse(token);

        {
            let mut sessions = self.sessions.write().await;
            if let Some(state) = sessions.get_mut(&chat_id) {
                state.outcome_filter = filter;
                return Ok(state.smart_trades.clone());
            }
        }

        let smart = self.fetch_smart_trades().await?;
        self.store(chat_id, smart.clone(), filter).await;
        Ok(smart)
    }

    /// Unconditionally re-run the pipeline, replacing the cached set and
    /// clearing any active filter.
    pub async fn refresh(&self, chat_id: i64) -> Result<Vec<EnrichedTrade>> {
        let smart = self.fetch_smart_trades().await?;
        self.store(chat_id, smart.clone(), None).await;
        Ok(smart)
    }

    /// The filter currently recorded for a chat, if any
    pub async fn active_filter(&self, chat_id: i64) -> Option<OutcomeFilter> {
        self.sessions
            .read()
            .await
            .get(&chat_id)
            .and_then(|state| state.outcome_filter)
    }

    /// Snapshot of the cached state for a chat
    pub async fn session(&self, chat_id: i64) -> Option<SessionState> {
        self.sessions.read().await.get(&chat_id).cloned()
    }

    /// Drop a chat's cached state when the conversation ends
    pub async fn end_session(&self, chat_id: i64) {
        self.sessions.write().await.remove(&chat_id);
    }

    async fn store(
        &self,
        chat_id: i64,
        smart_trades: Vec<EnrichedTrade>,
        outcome_filter: Option<OutcomeFilter>,
    ) {
        let mut sessions = self.sessions.write().await;
        sessions.insert(
            chat_id,
            SessionState {
                smart_trades,
                outcome_filter,
            },
        );
    }

    /// Fetch recent trades and keep the ones whose maker is Smart Money,
    /// preserving fetch order. Each distinct maker is classified once per
    /// batch; a classification failure drops that maker's trades and the
    /// batch continues.
    async fn fetch_smart_trades(&self) -> Result<Vec<EnrichedTrade>> {
        let trades = self
            .trades
            .recent_trades(self.window_minutes, self.limit)
            .await?;

        let mut smart = Vec::new();
        let mut batch_memo: HashMap<String, Option<Vec<String>>> = HashMap::new();

        for trade in trades {
            let Some(maker) = trade.maker_address.clone() else {
                continue;
            };
            let key = maker.to_lowercase();

            let labels = match batch_memo.get(&key) {
                Some(cached) => cached.clone(),
                None => {
                    let outcome = match self.classifier.classify(&maker).await {
                        Ok(result) if result.is_smart => Some(result.labels),
                        Ok(_) => None,
                        Err(e) => {
                            warn!("Failed to classify {}: {}", maker, e);
                            None
                        }
                    };
                    batch_memo.insert(key, outcome.clone());
                    outcome
                }
            };

            if let Some(labels) = labels {
                smart.push(EnrichedTrade { trade, labels });
            }
        }

        info!(
            "Classified {} distinct makers, kept {} smart trades",
            batch_memo.len(),
            smart.len()
        );
        Ok(smart)
    }
}

/// Select the records visible under a filter: case-insensitive outcome
/// comparison against the exact filter token, all records when unfiltered.
pub fn visible_trades<'a>(
    trades: &'a [EnrichedTrade],
    filter: Option<&OutcomeFilter>,
) -> Vec<&'a EnrichedTrade> {
    trades
        .iter()
        .filter(|t| match filter {
            None => true,
            Some(f) => f.matches(t.trade.outcome.as_deref()),
        })
        .collect()
}
