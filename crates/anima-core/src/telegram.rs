//! Inbound Telegram update model (the subset the engine reads).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramUpdate {
    #[serde(default)]
    pub update_id: Option<i64>,
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramMessage {
    pub chat: TelegramChat,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub from: Option<TelegramUser>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramChat {
    pub id: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramUser {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl TelegramUpdate {
    /// Text update for `chat_id`; used by tests and local tooling.
    pub fn text(update_id: i64, chat_id: i64, text: &str) -> Self {
        Self {
            update_id: Some(update_id),
            message: Some(TelegramMessage {
                chat: TelegramChat { id: chat_id },
                text: Some(text.to_string()),
                from: None,
            }),
        }
    }
}
