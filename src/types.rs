//! Core data types shared across modules

use serde::{Deserialize, Serialize};

/// One executed order match on Polymarket, normalized from whatever
/// schema the activity subgraph happens to serve.
///
/// Every field except `id` may be absent; the subgraph's field names are
/// not stable across deployments and a missing field must never abort
/// processing of the rest of the record. Size and price stay textual
/// because subgraph numeric scalars arrive as strings in provider-defined
/// units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: String,
    pub maker_address: Option<String>,
    pub outcome: Option<String>,
    pub size: Option<String>,
    pub price: Option<String>,
    /// Unix epoch seconds
    pub match_time: Option<i64>,
    pub market: MarketRef,
}

/// Market reference attached to a trade
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketRef {
    pub id: Option<String>,
    pub question: Option<String>,
}

/// Result of asking Nansen whether an address carries Smart Money labels
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub is_smart: bool,
    /// All non-empty labels returned, not just the smart ones
    pub labels: Vec<String>,
}

/// A trade whose maker was classified as Smart Money, with its labels
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedTrade {
    pub trade: TradeRecord,
    pub labels: Vec<String>,
}

/// Outcome side a user can filter the cached trade list to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeFilter {
    Yes,
    No,
}

impl OutcomeFilter {
    /// Parse a filter token; anything other than the two recognized
    /// outcome tokens means "show all".
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "YES" => Some(Self::Yes),
            "NO" => Some(Self::No),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "YES",
            Self::No => "NO",
        }
    }

    /// Case-insensitive match of a stored outcome against this filter
    pub fn matches(&self, outcome: Option<&str>) -> bool {
        outcome
            .map(|o| o.to_uppercase() == self.as_str())
            .unwrap_or(false)
    }
}
