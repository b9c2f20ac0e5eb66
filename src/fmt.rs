//! Message formatting for Telegram
//!
//! Pure rendering helpers over the cached smart-trade set; selection of
//! visible rows goes through `session::visible_trades` so the display and
//! the cache agree on the filter predicate.

use crate::session::visible_trades;
use crate::types::{EnrichedTrade, OutcomeFilter};
use chrono::{TimeZone, Utc};

/// Maximum trade rows per message
pub const MAX_ROWS: usize = 12;

/// Shorten a blockchain address for display: `0x1234…abcd`
pub fn shorten(address: &str) -> String {
    const PREFIX: usize = 6;
    const SUFFIX: usize = 4;
    if address.len() <= PREFIX + SUFFIX {
        return address.to_string();
    }
    format!(
        "{}…{}",
        &address[..PREFIX],
        &address[address.len() - SUFFIX..]
    )
}

fn format_labels(labels: &[String]) -> String {
    let cleaned: Vec<&str> = labels
        .iter()
        .map(String::as_str)
        .filter(|l| !l.is_empty())
        .collect();
    if cleaned.is_empty() {
        return String::new();
    }
    format!(" ({})", cleaned.join(", "))
}

fn format_time(timestamp: Option<i64>) -> String {
    match timestamp.and_then(|ts| Utc.timestamp_opt(ts, 0).single()) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "unknown".to_string(),
    }
}

/// Build the Markdown message summarising the smart-money trades
pub fn build_message(
    trades: &[EnrichedTrade],
    filter: Option<&OutcomeFilter>,
    window_minutes: u64,
) -> String {
    let mut header = format!("*Smart Money Trades (last {}m)*", window_minutes);
    if let Some(f) = filter {
        header.push_str(&format!("\n_Filter: {}_", f.as_str()));
    }

    if trades.is_empty() {
        return format!("{}\n\nNo Smart Money trades found.", header);
    }

    let lines: Vec<String> = visible_trades(trades, filter)
        .iter()
        .take(MAX_ROWS)
        .map(|t| {
            let outcome = t
                .trade
                .outcome
                .as_deref()
                .unwrap_or("")
                .to_uppercase();
            let question = t
                .trade
                .market
                .question
                .as_deref()
                .unwrap_or("Unknown market");
            let maker = t.trade.maker_address.as_deref().unwrap_or("");
            let size = t.trade.size.as_deref().unwrap_or("?");
            let price = t.trade.price.as_deref().unwrap_or("?");

            format!(
                "• *{}*\n  Outcome: `{}`\n  Maker: `{}`{}\n  Size @ Price: {} @ {}\n  Time: {}",
                question,
                outcome,
                shorten(maker),
                format_labels(&t.labels),
                size,
                price,
                format_time(t.trade.match_time),
            )
        })
        .collect();

    if lines.is_empty() {
        return format!("{}\n\nNo Smart Money trades match the filter.", header);
    }

    format!("{}\n\n{}", header, lines.join("\n\n"))
}
