//! Telegram Bot API types — the subset of the wire format the bot consumes.
//!
//! Inbound types are deserialized leniently: unknown fields are ignored and
//! optional sections default to empty, so new Bot API fields never break
//! webhook handling.

use serde::{Deserialize, Serialize};

/// Telegram chat identifier.
pub type ChatId = i64;

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by Bot API calls.
#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("API request failed: {0}")]
    ApiRequest(String),

    /// The Bot API returned a non-success status without a parseable envelope.
    #[error("API response error: status {status}")]
    ApiResponse { status: u16, body: String },

    /// The Bot API answered `ok: false`.
    #[error("{method} rejected: {description}")]
    Rejected { method: String, description: String },

    /// The response body could not be deserialized.
    #[error("API response parse failed: {0}")]
    ApiParse(String),

    /// `getFile` returned no downloadable path.
    #[error("file {0} has no download path")]
    MissingFilePath(String),

    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),
}

// =============================================================================
// INBOUND
// =============================================================================

/// A webhook update. Only message and callback-query updates are handled.
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub chat: Chat,
    pub text: Option<String>,
    /// Available sizes of an attached photo, smallest first.
    #[serde(default)]
    pub photo: Vec<PhotoSize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: ChatId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PhotoSize {
    pub file_id: String,
    pub width: u32,
    pub height: u32,
}

/// An inline-button press.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    /// The message carrying the pressed keyboard.
    pub message: Option<Message>,
}

/// Result of `getFile`.
#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    pub file_path: Option<String>,
}

/// Envelope every Bot API method responds with.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope<T> {
    pub(crate) ok: bool,
    pub(crate) result: Option<T>,
    pub(crate) description: Option<String>,
}

// =============================================================================
// OUTBOUND
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardButton {
    #[must_use]
    pub fn callback(text: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self { text: text.into(), callback_data: callback_data.into() }
    }
}

impl Message {
    /// The largest attached photo size by pixel area. Ties keep the later
    /// entry, matching Telegram's smallest-first ordering.
    #[must_use]
    pub fn largest_photo(&self) -> Option<&PhotoSize> {
        self.photo
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
    }

    /// True when the text is a bot command named `name` (`/name` or `/name@bot`).
    #[must_use]
    pub fn is_command(&self, name: &str) -> bool {
        let Some(text) = self.text.as_deref() else {
            return false;
        };
        let Some(first) = text.split_whitespace().next() else {
            return false;
        };
        let Some(command) = first.strip_prefix('/') else {
            return false;
        };
        command.split('@').next() == Some(name)
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod tests;
