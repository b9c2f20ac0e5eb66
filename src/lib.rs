//! Polymarket Smart Money Telegram Bot
//!
//! Notifies Telegram users about recent Polymarket trades made by
//! addresses that Nansen labels as Smart Money.
//!
//! ## Architecture
//!
//! ```text
//! Subgraph Fetcher ─┐
//!                   ├→ Session Filter Cache → Telegram Bot
//! Nansen Classifier ┘        (per chat)
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod fmt;
pub mod session;
pub mod telegram;
pub mod types;
