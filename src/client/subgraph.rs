//! Polymarket activity subgraph client
//!
//! The subgraph is a third-party index whose collection and field names
//! drift between deployments, so nothing here assumes a fixed schema.
//! Fetching is a search over candidate `(collection, time field)` pairs
//! tried most-likely-first; the first pair that returns a nonempty list
//! wins and its items are normalized through per-field candidate lists.

use crate::client::TradeSource;
use crate::error::{BotError, Result};
use crate::types::{MarketRef, TradeRecord};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Goldsky activity subgraph, used when no override is configured
pub const DEFAULT_SUBGRAPH_URL: &str = "https://api.goldsky.com/api/public/\
    project_cl6mb8i9h0003e201j6li0diw/subgraphs/activity-subgraph/0.0.4/gn";

/// Candidate root collection names, most likely first
pub const CANDIDATE_COLLECTIONS: &[&str] = &[
    "fills",
    "marketFills",
    "trades",
    "tradeEvents",
    "swaps",
    "orders",
    "marketTrades",
];

/// Candidate time field names used for both ordering and range filtering
pub const CANDIDATE_TIME_FIELDS: &[&str] = &[
    "matchTime",
    "timestamp",
    "createdAt",
    "blockTimestamp",
    "filledAt",
];

const MAKER_FIELDS: &[&str] = &["makerAddress", "maker", "trader", "from", "user"];
const OUTCOME_FIELDS: &[&str] = &["outcome", "side", "position"];
const SIZE_FIELDS: &[&str] = &["size", "amount", "qty", "quantity"];
const PRICE_FIELDS: &[&str] = &["price", "avgPrice", "fillPrice"];
const MARKET_ID_FIELDS: &[&str] = &["id", "marketId"];
const MARKET_QUESTION_FIELDS: &[&str] = &["question", "title", "name"];

/// Transport seam for the candidate search; production posts over HTTP,
/// tests script the responses.
#[async_trait]
trait GraphqlTransport: Send + Sync {
    async fn post(&self, query: &str, variables: Value) -> Result<Value>;
}

#[derive(Clone)]
struct HttpTransport {
    http: Client,
    url: String,
}

#[async_trait]
impl GraphqlTransport for HttpTransport {
    async fn post(&self, query: &str, variables: Value) -> Result<Value> {
        let resp = self
            .http
            .post(&self.url)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?
            .error_for_status()?;

        Ok(resp.json().await?)
    }
}

/// Client for the Polymarket activity subgraph
#[derive(Clone)]
pub struct SubgraphClient {
    transport: HttpTransport,
}

/// What one `(collection, timeField)` attempt produced
#[derive(Debug)]
enum ResponseKind {
    /// The remote reported a query/schema error (unknown field etc.)
    SchemaError(String),
    /// `data.<collection>` was present but not a list
    Malformed,
    /// Valid combination, no rows in the window
    Empty,
    /// Nonempty result; stop searching
    Items(Vec<Value>),
}

impl SubgraphClient {
    /// Create a client, resolving the endpoint from an override if it is
    /// present and well-formed, otherwise the built-in default.
    pub fn new(url_override: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()?;

        Ok(Self {
            transport: HttpTransport {
                http,
                url: resolve_url(url_override),
            },
        })
    }

    /// Fetch recent trades, trying candidate schema combinations in order.
    pub async fn fetch_recent_trades(
        &self,
        window_minutes: u64,
        limit: u32,
    ) -> Result<Vec<TradeRecord>> {
        let since = unix_now() - window_minutes as i64 * 60;
        search_candidates(&self.transport, since, limit).await
    }
}

#[async_trait]
impl TradeSource for SubgraphClient {
    async fn recent_trades(&self, window_minutes: u64, limit: u32) -> Result<Vec<TradeRecord>> {
        self.fetch_recent_trades(window_minutes, limit).await
    }
}

/// Try candidate `(collection, timeField)` pairs in priority order.
///
/// First pair yielding a nonempty list wins and no further pairs are
/// attempted. Transport errors, schema errors, malformed payloads and
/// valid-but-empty results all advance to the next pair; if every pair is
/// exhausted the last diagnostic is carried in the `Fetch` error so
/// operators can tell "wrong endpoint" from "endpoint fine, no recent
/// activity".
async fn search_candidates(
    transport: &dyn GraphqlTransport,
    since: i64,
    limit: u32,
) -> Result<Vec<TradeRecord>> {
    let mut last_error: Option<String> = None;

    for collection in CANDIDATE_COLLECTIONS {
        for time_field in CANDIDATE_TIME_FIELDS {
            let query = build_query(collection, time_field);
            let body = match transport
                .post(&query, json!({ "since": since, "limit": limit }))
                .await
            {
                Ok(body) => body,
                Err(e) => {
                    debug!("Subgraph call failed for {}/{}: {}", collection, time_field, e);
                    last_error = Some(e.to_string());
                    continue;
                }
            };

            match evaluate_response(&body, collection) {
                ResponseKind::SchemaError(msg) => {
                    debug!("Schema error for {}/{}: {}", collection, time_field, msg);
                    last_error = Some(format!("subgraph query errors: {}", msg));
                }
                ResponseKind::Malformed => {
                    last_error = Some(format!(
                        "unexpected response for {} using {}",
                        collection, time_field
                    ));
                }
                ResponseKind::Empty => {
                    last_error = Some(format!(
                        "combination valid but empty: {}/{}",
                        collection, time_field
                    ));
                }
                ResponseKind::Items(items) => {
                    debug!(
                        "Subgraph combination {}/{} returned {} trades",
                        collection,
                        time_field,
                        items.len()
                    );
                    return Ok(items
                        .iter()
                        .map(|item| normalize_item(item, time_field))
                        .collect());
                }
            }
        }
    }

    Err(BotError::Fetch(format!(
        "no subgraph schema combination returned trades; last attempt: {}",
        last_error.unwrap_or_else(|| "no attempts made".to_string())
    )))
}

fn resolve_url(url_override: Option<&str>) -> String {
    match url_override.map(str::trim) {
        Some(url) if url.starts_with("http") => url.to_string(),
        _ => DEFAULT_SUBGRAPH_URL.to_string(),
    }
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Build a GraphQL query for one candidate combination. Projects the
/// union of all candidate item fields so the same query works no matter
/// which synonyms this deployment actually serves.
fn build_query(collection: &str, time_field: &str) -> String {
    let item_fields = join_unique(
        MAKER_FIELDS
            .iter()
            .chain(OUTCOME_FIELDS)
            .chain(SIZE_FIELDS)
            .chain(PRICE_FIELDS)
            .copied()
            .chain(std::iter::once(time_field)),
    );
    let market_fields = join_unique(
        MARKET_ID_FIELDS
            .iter()
            .chain(MARKET_QUESTION_FIELDS)
            .copied(),
    );

    format!(
        "query Q($since: BigInt!, $limit: Int!) {{\n  \
         {collection}(\n    first: $limit\n    orderBy: {time_field}\n    \
         orderDirection: desc\n    where: {{ {time_field}_gte: $since }}\n  ) {{\n    \
         id\n    {item_fields}\n    market {{ {market_fields} }}\n  }}\n}}"
    )
}

fn join_unique<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for field in fields {
        if !seen.contains(&field) {
            seen.push(field);
        }
    }
    seen.join(" ")
}

/// Classify one response body per the fallback decision rule. A missing
/// `data.<collection>` key counts as valid-but-empty, matching how the
/// subgraph answers a known collection with no rows; only a present
/// non-list value is malformed.
fn evaluate_response(body: &Value, collection: &str) -> ResponseKind {
    if let Some(errors) = body.get("errors") {
        return ResponseKind::SchemaError(errors.to_string());
    }

    match body.pointer(&format!("/data/{}", collection)) {
        None => ResponseKind::Empty,
        Some(Value::Array(items)) if items.is_empty() => ResponseKind::Empty,
        Some(Value::Array(items)) => ResponseKind::Items(items.clone()),
        Some(_) => ResponseKind::Malformed,
    }
}

/// Resolve a logical field by taking the first present, non-null synonym
fn first_present<'a>(item: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    let map = item.as_object()?;
    keys.iter()
        .find_map(|key| map.get(*key).filter(|v| !v.is_null()))
}

/// Accept either a JSON string or number as display text
fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accept either a JSON number or a numeric string as epoch seconds
fn as_epoch(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Normalize one raw item into the canonical trade record. Unresolved
/// fields become `None`, never an error; the time field that matched the
/// query is preferred, falling back to the other candidates.
fn normalize_item(item: &Value, time_field: &str) -> TradeRecord {
    let match_time = item
        .get(time_field)
        .and_then(as_epoch)
        .or_else(|| first_present(item, CANDIDATE_TIME_FIELDS).and_then(as_epoch));

    let market = item
        .get("market")
        .filter(|m| m.is_object())
        .map(|m| MarketRef {
            id: first_present(m, MARKET_ID_FIELDS).and_then(as_text),
            question: first_present(m, MARKET_QUESTION_FIELDS).and_then(as_text),
        })
        .unwrap_or_default();

    TradeRecord {
        id: item.get("id").and_then(as_text).unwrap_or_default(),
        maker_address: first_present(item, MAKER_FIELDS).and_then(as_text),
        outcome: first_present(item, OUTCOME_FIELDS).and_then(as_text),
        size: first_present(item, SIZE_FIELDS).and_then(as_text),
        price: first_present(item, PRICE_FIELDS).and_then(as_text),
        match_time,
        market,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed list of responses, tracking how many were consumed
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Value>>>,
        calls: AtomicUsize,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<Value>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn remaining(&self) -> usize {
            self.responses.lock().len()
        }
    }

    #[async_trait]
    impl GraphqlTransport for ScriptedTransport {
        async fn post(&self, _query: &str, _variables: Value) -> Result<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .pop_front()
                .expect("ran out of scripted responses")
        }
    }

    #[tokio::test]
    async fn test_search_stops_at_first_nonempty_pair() {
        // Schema error, then valid-but-empty, then data: exactly three
        // attempts, and the fourth scripted response is never requested.
        let transport = ScriptedTransport::new(vec![
            Ok(serde_json::json!({ "errors": [{"message": "no field matchTime"}] })),
            Ok(serde_json::json!({ "data": { "fills": [] } })),
            Ok(serde_json::json!({ "data": { "fills": [
                { "id": "1", "makerAddress": "0xA", "outcome": "YES" }
            ]}})),
            Ok(serde_json::json!({ "data": { "fills": [{ "id": "unreachable" }] } })),
        ]);

        let trades = search_candidates(&transport, 0, 10).await.unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].id, "1");
        assert_eq!(transport.calls(), 3);
        assert_eq!(transport.remaining(), 1);
    }

    #[tokio::test]
    async fn test_search_advances_past_transport_failure() {
        let transport = ScriptedTransport::new(vec![
            Err(BotError::Fetch("connection reset by peer".to_string())),
            Ok(serde_json::json!({ "data": { "fills": [{ "id": "1" }] } })),
        ]);

        let trades = search_candidates(&transport, 0, 10).await.unwrap();
        assert_eq!(trades[0].id, "1");
        assert_eq!(transport.calls(), 2);
    }

    #[tokio::test]
    async fn test_search_exhaustion_reports_last_schema_error() {
        let total = CANDIDATE_COLLECTIONS.len() * CANDIDATE_TIME_FIELDS.len();
        let mut responses: Vec<Result<Value>> = (0..total - 1)
            .map(|_| Ok(serde_json::json!({ "errors": [{"message": "unknown field"}] })))
            .collect();
        responses.push(Ok(serde_json::json!({
            "errors": [{"message": "Type `Query` has no field `marketTrades`"}]
        })));
        let transport = ScriptedTransport::new(responses);

        let err = search_candidates(&transport, 0, 10).await.unwrap_err();
        assert_eq!(transport.calls(), total);
        match err {
            BotError::Fetch(msg) => assert!(msg.contains("no field `marketTrades`")),
            other => panic!("expected fetch error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_exhaustion_all_empty_is_distinguishable() {
        // Every combination answers with no rows; the terminal error must
        // say so rather than look like a broken endpoint.
        let total = CANDIDATE_COLLECTIONS.len() * CANDIDATE_TIME_FIELDS.len();
        let responses: Vec<Result<Value>> = (0..total)
            .map(|_| Ok(serde_json::json!({ "data": {} })))
            .collect();
        let transport = ScriptedTransport::new(responses);

        let err = search_candidates(&transport, 0, 10).await.unwrap_err();
        match err {
            BotError::Fetch(msg) => {
                assert!(msg.contains("combination valid but empty: marketTrades/filledAt"))
            }
            other => panic!("expected fetch error, got {:?}", other),
        }
    }

    #[test]
    fn test_resolve_url_default() {
        assert_eq!(resolve_url(None), DEFAULT_SUBGRAPH_URL);
        assert_eq!(resolve_url(Some("")), DEFAULT_SUBGRAPH_URL);
        assert_eq!(resolve_url(Some("   ")), DEFAULT_SUBGRAPH_URL);
        assert_eq!(resolve_url(Some("not-a-url")), DEFAULT_SUBGRAPH_URL);
    }

    #[test]
    fn test_resolve_url_override() {
        assert_eq!(
            resolve_url(Some("https://example.com/subgraph")),
            "https://example.com/subgraph"
        );
        assert_eq!(
            resolve_url(Some("  http://localhost:8000/gn  ")),
            "http://localhost:8000/gn"
        );
    }

    #[test]
    fn test_build_query_shape() {
        let query = build_query("fills", "matchTime");
        assert!(query.contains("fills("));
        assert!(query.contains("orderBy: matchTime"));
        assert!(query.contains("orderDirection: desc"));
        assert!(query.contains("where: { matchTime_gte: $since }"));
        assert!(query.contains("makerAddress"));
        assert!(query.contains("market { "));
        assert!(query.contains("question"));
    }

    #[test]
    fn test_build_query_dedupes_time_field() {
        // The time field must appear exactly once in the projection even
        // though it is also a candidate elsewhere.
        let query = build_query("trades", "timestamp");
        assert_eq!(query.matches("timestamp").count(), 3); // orderBy, where, projection
    }

    #[test]
    fn test_evaluate_schema_error() {
        let body = serde_json::json!({
            "errors": [{"message": "Type `Query` has no field `fills`"}]
        });
        match evaluate_response(&body, "fills") {
            ResponseKind::SchemaError(msg) => assert!(msg.contains("no field")),
            other => panic!("expected schema error, got {:?}", other),
        }
    }

    #[test]
    fn test_evaluate_malformed() {
        let body = serde_json::json!({ "data": { "fills": {"weird": true} } });
        assert!(matches!(
            evaluate_response(&body, "fills"),
            ResponseKind::Malformed
        ));

        let null_value = serde_json::json!({ "data": { "fills": null } });
        assert!(matches!(
            evaluate_response(&null_value, "fills"),
            ResponseKind::Malformed
        ));
    }

    #[test]
    fn test_evaluate_missing_key_is_empty() {
        // A known-good schema with no rows omits the key entirely
        let missing = serde_json::json!({ "data": {} });
        assert!(matches!(
            evaluate_response(&missing, "fills"),
            ResponseKind::Empty
        ));

        let no_data = serde_json::json!({});
        assert!(matches!(
            evaluate_response(&no_data, "fills"),
            ResponseKind::Empty
        ));
    }

    #[test]
    fn test_evaluate_empty_and_items() {
        let empty = serde_json::json!({ "data": { "fills": [] } });
        assert!(matches!(
            evaluate_response(&empty, "fills"),
            ResponseKind::Empty
        ));

        let nonempty = serde_json::json!({ "data": { "fills": [{"id": "1"}] } });
        match evaluate_response(&nonempty, "fills") {
            ResponseKind::Items(items) => assert_eq!(items.len(), 1),
            other => panic!("expected items, got {:?}", other),
        }
    }

    #[test]
    fn test_normalize_full_item() {
        let item = serde_json::json!({
            "id": "0xabc-1",
            "makerAddress": "0xA",
            "outcome": "YES",
            "size": "10",
            "price": "0.5",
            "matchTime": "1000",
            "market": { "id": "m1", "question": "Q1" }
        });
        let trade = normalize_item(&item, "matchTime");
        assert_eq!(trade.id, "0xabc-1");
        assert_eq!(trade.maker_address.as_deref(), Some("0xA"));
        assert_eq!(trade.outcome.as_deref(), Some("YES"));
        assert_eq!(trade.size.as_deref(), Some("10"));
        assert_eq!(trade.price.as_deref(), Some("0.5"));
        assert_eq!(trade.match_time, Some(1000));
        assert_eq!(trade.market.id.as_deref(), Some("m1"));
        assert_eq!(trade.market.question.as_deref(), Some("Q1"));
    }

    #[test]
    fn test_normalize_synonym_schemas_are_equivalent() {
        // Two deployments serving the same semantic content under
        // different field names must normalize identically.
        let a = serde_json::json!({
            "id": "1",
            "maker": "0xA",
            "side": "NO",
            "amount": 10,
            "fillPrice": 0.5,
            "timestamp": 1000,
            "market": { "marketId": "m1", "title": "Q1" }
        });
        let b = serde_json::json!({
            "id": "1",
            "makerAddress": "0xA",
            "outcome": "NO",
            "size": "10",
            "price": "0.5",
            "matchTime": "1000",
            "market": { "id": "m1", "question": "Q1" }
        });
        assert_eq!(normalize_item(&a, "timestamp"), normalize_item(&b, "matchTime"));
    }

    #[test]
    fn test_normalize_missing_maker_is_none() {
        let item = serde_json::json!({ "id": "1", "outcome": "YES" });
        let trade = normalize_item(&item, "matchTime");
        assert_eq!(trade.maker_address, None);
        assert_eq!(trade.match_time, None);
    }

    #[test]
    fn test_normalize_null_fields_fall_through() {
        let item = serde_json::json!({
            "id": "1",
            "makerAddress": null,
            "maker": "0xB",
            "matchTime": null,
            "timestamp": 42
        });
        let trade = normalize_item(&item, "matchTime");
        assert_eq!(trade.maker_address.as_deref(), Some("0xB"));
        assert_eq!(trade.match_time, Some(42));
    }

    #[test]
    fn test_normalize_malformed_market_defaults_empty() {
        let item = serde_json::json!({ "id": "1", "market": "not-an-object" });
        let trade = normalize_item(&item, "matchTime");
        assert_eq!(trade.market, MarketRef::default());

        let absent = serde_json::json!({ "id": "1" });
        assert_eq!(normalize_item(&absent, "matchTime").market, MarketRef::default());
    }

    #[test]
    fn test_candidate_ordering() {
        assert_eq!(CANDIDATE_COLLECTIONS[0], "fills");
        assert_eq!(CANDIDATE_TIME_FIELDS[0], "matchTime");
    }
}
