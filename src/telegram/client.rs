//! Telegram Bot HTTP API client.
//!
//! Thin reqwest wrapper over `/bot<token>/<method>`. Envelope parsing is a
//! pure function (`parse_envelope`) for testability. Transport errors are
//! stripped of their URL before being reported, since the URL embeds the token.

use std::time::Duration;

use serde::Serialize;
use serde::de::{DeserializeOwned, IgnoredAny};

use super::BotApi;
use super::types::{ApiEnvelope, ChatId, File, InlineKeyboardMarkup, TelegramError};
use crate::config::HttpTimeouts;

const PHOTO_FILENAME: &str = "grid.png";

// =============================================================================
// CLIENT
// =============================================================================

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl TelegramClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(token: String, base_url: String, timeouts: HttpTimeouts) -> Result<Self, TelegramError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| TelegramError::HttpClientBuild(e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { http, base_url, token })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token)
    }

    fn file_url(&self, file_path: &str) -> String {
        format!("{}/file/bot{}/{file_path}", self.base_url, self.token)
    }

    async fn call<B, T>(&self, method: &str, body: &B) -> Result<T, TelegramError>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(request_error)?;
        read_envelope(method, response).await
    }
}

fn request_error(e: reqwest::Error) -> TelegramError {
    TelegramError::ApiRequest(e.without_url().to_string())
}

async fn read_envelope<T: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<T, TelegramError> {
    let status = response.status().as_u16();
    let text = response.text().await.map_err(request_error)?;
    parse_envelope(method, status, &text)
}

// =============================================================================
// WIRE TYPES
// =============================================================================

#[derive(Serialize)]
struct GetFileRequest<'a> {
    file_id: &'a str,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: ChatId,
    text: &'a str,
}

#[derive(Serialize)]
struct AnswerCallbackQueryRequest<'a> {
    callback_query_id: &'a str,
}

#[derive(Serialize)]
struct SetWebhookRequest<'a> {
    url: &'a str,
    allowed_updates: &'a [&'a str],
}

// =============================================================================
// PARSING
// =============================================================================

/// Unwrap a Bot API response envelope.
///
/// The platform reports most failures as `ok: false` with a description,
/// usually alongside a 4xx status, so the envelope is consulted before the
/// status code.
pub(crate) fn parse_envelope<T: DeserializeOwned>(method: &str, status: u16, body: &str) -> Result<T, TelegramError> {
    let envelope: ApiEnvelope<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(e) if status == 200 => return Err(TelegramError::ApiParse(e.to_string())),
        Err(_) => return Err(TelegramError::ApiResponse { status, body: body.to_string() }),
    };

    if !envelope.ok {
        return Err(TelegramError::Rejected {
            method: method.to_string(),
            description: envelope
                .description
                .unwrap_or_else(|| format!("status {status}")),
        });
    }

    envelope
        .result
        .ok_or_else(|| TelegramError::ApiParse(format!("{method}: ok response without result")))
}

// =============================================================================
// BOT API
// =============================================================================

#[async_trait::async_trait]
impl BotApi for TelegramClient {
    async fn download_file(&self, file_id: &str) -> Result<Vec<u8>, TelegramError> {
        let file: File = self.call("getFile", &GetFileRequest { file_id }).await?;
        let Some(path) = file.file_path else {
            return Err(TelegramError::MissingFilePath(file.file_id));
        };

        let response = self
            .http
            .get(self.file_url(&path))
            .send()
            .await
            .map_err(request_error)?;
        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.map_err(request_error)?;
            return Err(TelegramError::ApiResponse { status, body });
        }
        let bytes = response.bytes().await.map_err(request_error)?;
        Ok(bytes.to_vec())
    }

    async fn send_photo(
        &self,
        chat_id: ChatId,
        png: Vec<u8>,
        caption: Option<&str>,
        keyboard: &InlineKeyboardMarkup,
    ) -> Result<(), TelegramError> {
        let markup = serde_json::to_string(keyboard).map_err(|e| TelegramError::ApiParse(e.to_string()))?;
        let photo = reqwest::multipart::Part::bytes(png)
            .file_name(PHOTO_FILENAME)
            .mime_str("image/png")
            .map_err(request_error)?;

        let mut form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("reply_markup", markup)
            .part("photo", photo);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }

        let response = self
            .http
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;
        read_envelope::<IgnoredAny>("sendPhoto", response).await?;
        Ok(())
    }

    async fn send_message(&self, chat_id: ChatId, text: &str) -> Result<(), TelegramError> {
        self.call::<_, IgnoredAny>("sendMessage", &SendMessageRequest { chat_id, text })
            .await?;
        Ok(())
    }

    async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), TelegramError> {
        self.call::<_, IgnoredAny>("answerCallbackQuery", &AnswerCallbackQueryRequest { callback_query_id })
            .await?;
        Ok(())
    }

    async fn set_webhook(&self, url: &str) -> Result<(), TelegramError> {
        let request = SetWebhookRequest { url, allowed_updates: &["message", "callback_query"] };
        self.call::<_, IgnoredAny>("setWebhook", &request).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
