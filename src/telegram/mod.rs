//! Telegram — messaging platform boundary.
//!
//! DESIGN
//! ======
//! The controller depends only on the [`BotApi`] trait: fetch the bytes of an
//! uploaded file, send a photo with an inline keyboard, send text, acknowledge
//! a button press, and register the webhook. [`client::TelegramClient`] is the
//! HTTP implementation; tests substitute a recording mock.

pub mod client;
pub mod types;

use types::{ChatId, InlineKeyboardMarkup, TelegramError};

pub use client::TelegramClient;

/// Outbound operations the bot performs against the messaging platform.
#[async_trait::async_trait]
pub trait BotApi: Send + Sync {
    /// Download the raw bytes of an uploaded file.
    ///
    /// # Errors
    ///
    /// Returns a [`TelegramError`] if the file lookup or download fails.
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TelegramError>;

    /// Send a PNG as a new photo message with an inline keyboard attached.
    ///
    /// # Errors
    ///
    /// Returns a [`TelegramError`] if the platform rejects or never receives the call.
    async fn send_photo(
        &self,
        chat_id: ChatId,
        png: Vec<u8>,
        caption: Option<&str>,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<(), TelegramError>;

    /// Send a plain text message.
    ///
    /// # Errors
    ///
    /// Returns a [`TelegramError`] if the platform rejects or never receives the call.
    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), TelegramError>;

    /// Acknowledge a button press so the client stops showing a spinner.
    ///
    /// # Errors
    ///
    /// Returns a [`TelegramError`] if the platform rejects or never receives the call.
    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), TelegramError>;

    /// Point platform update delivery at `url`.
    ///
    /// # Errors
    ///
    /// Returns a [`TelegramError`] if the platform rejects or never receives the call.
    async fn set_webhook(&self, url: &str) -> Result<(), TelegramError>;
}
