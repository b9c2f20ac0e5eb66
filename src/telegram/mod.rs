//! Telegram transport: long-polling bot
//!
//! Supports /start and /smartmoney plus an inline keyboard with YES, NO
//! and REFRESH buttons mapped to the session cache operations.

use crate::error::Result;
use crate::fmt::build_message;
use crate::session::SmartMoneyService;
use crate::types::OutcomeFilter;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

const GREETING: &str = "Hi! I'm the Smart Money bot for Polymarket.\n\
    Send /smartmoney to see recent bets from addresses with Smart Money labels.";

const APOLOGY: &str = "Sorry, Polymarket data is unavailable right now. Please try again later.";

/// Long-polling Telegram bot
pub struct TelegramBot {
    http: Client,
    bot_token: String,
    last_update_id: RwLock<i64>,
    service: Arc<SmartMoneyService>,
    window_minutes: u64,
}

#[derive(Debug, Deserialize)]
struct TelegramUpdate {
    update_id: i64,
    message: Option<TelegramMessage>,
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct TelegramMessage {
    message_id: i64,
    chat: TelegramChat,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TelegramChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    data: Option<String>,
    message: Option<TelegramMessage>,
}

#[derive(Debug, Deserialize)]
struct GetUpdatesResponse {
    #[allow(dead_code)]
    ok: bool,
    result: Vec<TelegramUpdate>,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest {
    chat_id: i64,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct EditMessageTextRequest {
    chat_id: i64,
    message_id: i64,
    text: String,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_markup: Option<InlineKeyboardMarkup>,
}

#[derive(Debug, Serialize)]
struct AnswerCallbackQueryRequest {
    callback_query_id: String,
}

#[derive(Debug, Serialize)]
struct SendChatActionRequest {
    chat_id: i64,
    action: &'static str,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardMarkup {
    inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Serialize)]
struct InlineKeyboardButton {
    text: &'static str,
    callback_data: &'static str,
}

fn filter_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![
            vec![
                InlineKeyboardButton {
                    text: "YES",
                    callback_data: "filter:YES",
                },
                InlineKeyboardButton {
                    text: "NO",
                    callback_data: "filter:NO",
                },
            ],
            vec![InlineKeyboardButton {
                text: "REFRESH",
                callback_data: "filter:REFRESH",
            }],
        ],
    }
}

impl TelegramBot {
    pub fn new(bot_token: String, service: Arc<SmartMoneyService>, window_minutes: u64) -> Self {
        Self {
            http: Client::new(),
            bot_token,
            last_update_id: RwLock::new(0),
            service,
            window_minutes,
        }
    }

    /// Start polling for updates
    pub async fn start_polling(self: Arc<Self>) {
        tracing::info!("Starting Telegram polling loop...");

        loop {
            match self.poll_updates().await {
                Ok(updates) => {
                    for update in updates {
                        if let Some(msg) = update.message {
                            if let Some(text) = msg.text {
                                self.handle_message(msg.chat.id, &text).await;
                            }
                        }
                        if let Some(query) = update.callback_query {
                            self.handle_callback(query).await;
                        }

                        let mut last_id = self.last_update_id.write().await;
                        *last_id = update.update_id + 1;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to poll Telegram updates: {}", e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
        }
    }

    async fn poll_updates(&self) -> Result<Vec<TelegramUpdate>> {
        let last_id = *self.last_update_id.read().await;

        let url = format!(
            "https://api.telegram.org/bot{}/getUpdates?offset={}&timeout=30",
            self.bot_token, last_id
        );

        let response: GetUpdatesResponse = self.http.get(&url).send().await?.json().await?;

        Ok(response.result)
    }

    async fn handle_message(&self, chat_id: i64, text: &str) {
        let text = text.trim();
        let cmd = if let Some(rest) = text.strip_prefix('/') {
            let cmd = rest.split_whitespace().next().unwrap_or("");
            cmd.split('@').next().unwrap_or(cmd) // Remove @botname
        } else {
            return; // Ignore non-commands
        };

        tracing::info!("Received command /{} from chat {}", cmd, chat_id);

        match cmd.to_lowercase().as_str() {
            "start" => {
                self.send_plain(chat_id, GREETING).await;
            }
            "smartmoney" => {
                self.send_chat_action(chat_id, "typing").await;

                match self.service.initial_load(chat_id).await {
                    Ok(trades) => {
                        let text = build_message(&trades, None, self.window_minutes);
                        self.send_with_keyboard(chat_id, &text).await;
                    }
                    Err(e) => {
                        tracing::error!("Failed to fetch trades: {}", e);
                        self.send_plain(chat_id, APOLOGY).await;
                    }
                }
            }
            _ => {
                self.send_plain(chat_id, "Unknown command. Try /smartmoney.")
                    .await;
            }
        }
    }

    async fn handle_callback(&self, query: CallbackQuery) {
        self.answer_callback(&query.id).await;

        let Some(message) = query.message else {
            return;
        };
        let chat_id = message.chat.id;

        let data = query.data.unwrap_or_default();
        let action = data.strip_prefix("filter:").unwrap_or("");

        tracing::info!("Callback '{}' from chat {}", action, chat_id);

        let (trades, filter) = if action == "REFRESH" {
            match self.service.refresh(chat_id).await {
                Ok(trades) => (trades, None),
                Err(e) => {
                    tracing::error!("Failed to refresh trades: {}", e);
                    self.edit_plain(chat_id, message.message_id, APOLOGY).await;
                    return;
                }
            }
        } else {
            match self.service.apply_filter(chat_id, action).await {
                Ok(trades) => (trades, OutcomeFilter::parse(action)),
                Err(e) => {
                    tracing::error!("Failed to load trades: {}", e);
                    self.edit_plain(chat_id, message.message_id, APOLOGY).await;
                    return;
                }
            }
        };

        let text = build_message(&trades, filter.as_ref(), self.window_minutes);
        self.edit_with_keyboard(chat_id, message.message_id, &text)
            .await;
    }

    async fn send_plain(&self, chat_id: i64, text: &str) {
        self.send_message(SendMessageRequest {
            chat_id,
            text: text.to_string(),
            parse_mode: "Markdown",
            disable_web_page_preview: true,
            reply_markup: None,
        })
        .await;
    }

    async fn send_with_keyboard(&self, chat_id: i64, text: &str) {
        self.send_message(SendMessageRequest {
            chat_id,
            text: text.to_string(),
            parse_mode: "Markdown",
            disable_web_page_preview: true,
            reply_markup: Some(filter_keyboard()),
        })
        .await;
    }

    async fn send_message(&self, request: SendMessageRequest) {
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        if let Err(e) = self.http.post(&url).json(&request).send().await {
            tracing::error!("Failed to send Telegram message: {}", e);
        }
    }

    async fn edit_plain(&self, chat_id: i64, message_id: i64, text: &str) {
        self.edit_message(EditMessageTextRequest {
            chat_id,
            message_id,
            text: text.to_string(),
            parse_mode: "Markdown",
            disable_web_page_preview: true,
            reply_markup: None,
        })
        .await;
    }

    async fn edit_with_keyboard(&self, chat_id: i64, message_id: i64, text: &str) {
        self.edit_message(EditMessageTextRequest {
            chat_id,
            message_id,
            text: text.to_string(),
            parse_mode: "Markdown",
            disable_web_page_preview: true,
            reply_markup: Some(filter_keyboard()),
        })
        .await;
    }

    async fn edit_message(&self, request: EditMessageTextRequest) {
        let url = format!(
            "https://api.telegram.org/bot{}/editMessageText",
            self.bot_token
        );

        if let Err(e) = self.http.post(&url).json(&request).send().await {
            tracing::error!("Failed to edit Telegram message: {}", e);
        }
    }

    async fn answer_callback(&self, callback_query_id: &str) {
        let url = format!(
            "https://api.telegram.org/bot{}/answerCallbackQuery",
            self.bot_token
        );
        let request = AnswerCallbackQueryRequest {
            callback_query_id: callback_query_id.to_string(),
        };

        if let Err(e) = self.http.post(&url).json(&request).send().await {
            tracing::error!("Failed to answer callback query: {}", e);
        }
    }

    async fn send_chat_action(&self, chat_id: i64, action: &'static str) {
        let url = format!(
            "https://api.telegram.org/bot{}/sendChatAction",
            self.bot_token
        );
        let request = SendChatActionRequest { chat_id, action };

        if let Err(e) = self.http.post(&url).json(&request).send().await {
            tracing::error!("Failed to send chat action: {}", e);
        }
    }
}
