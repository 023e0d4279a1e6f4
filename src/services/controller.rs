//! Interaction controller — turns photo uploads and button taps into
//! session changes and freshly rendered replies.
//!
//! DESIGN
//! ======
//! The controller is the only writer of session state. Each handler takes
//! the store lock just long enough to create or mutate a session and snapshot
//! what the renderer needs; decoding, rendering and all Bot API calls happen
//! with the lock released.
//!
//! Every reply is a new photo message with a freshly built keyboard. Earlier
//! messages are never edited, so the chat keeps one image per interaction.
//!
//! ERROR HANDLING
//! ==============
//! Taps on unknown sessions, undecodable callback data and out-of-grid cells
//! are ignored without telling the user. Undecodable uploads get a short
//! text reply. Bot API failures propagate to the dispatcher, which logs them;
//! nothing is retried. A session whose initial grid never reached the chat is
//! dropped again.

use std::collections::BTreeMap;
use std::sync::Arc;

use image::DynamicImage;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::services::keyboard::{build_keyboard, parse_callback_data};
use crate::services::render::{self, RenderError};
use crate::state::{AppState, Session, SessionStore};
use crate::telegram::BotApi;
use crate::telegram::types::{CallbackQuery, ChatId, TelegramError, Update};

pub const START_TEXT: &str = "✅ أرسل صورة وسأرسم عليها شبكة لتعليم النجوم والقنابل";
pub const DECODE_FAILED_TEXT: &str = "⚠️ تعذّرت قراءة الصورة، أرسل صورة أخرى";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error("telegram: {0}")]
    Telegram(#[from] TelegramError),
    #[error("render: {0}")]
    Render(#[from] RenderError),
}

/// What handling one update did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Replied to `/start`.
    Greeted,
    /// A photo started a new session with this id.
    SessionCreated(String),
    /// A tap changed this session and a new render was sent.
    Rerendered(String),
    /// The upload could not be decoded; the user was told.
    DecodeFailed,
    /// Nothing to do (unsupported update, stale or foreign tap).
    Ignored,
}

fn grid_caption(rows: u32, cols: u32) -> String {
    format!("شبكة {rows}×{cols}")
}

// =============================================================================
// CONTROLLER
// =============================================================================

#[derive(Clone)]
pub struct Controller {
    sessions: Arc<RwLock<SessionStore>>,
    bot: Arc<dyn BotApi>,
}

impl Controller {
    #[must_use]
    pub fn new(sessions: Arc<RwLock<SessionStore>>, bot: Arc<dyn BotApi>) -> Self {
        Self { sessions, bot }
    }

    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.sessions.clone(), state.bot.clone())
    }

    /// Route one webhook update to its handler.
    ///
    /// # Errors
    ///
    /// Returns an error if a Bot API call or the render fails.
    pub async fn handle_update(&self, update: Update) -> Result<Outcome, ControllerError> {
        if let Some(query) = update.callback_query {
            return self.on_tap(query).await;
        }

        let Some(message) = update.message else {
            return Ok(Outcome::Ignored);
        };
        if message.is_command("start") {
            self.bot.send_message(message.chat.id, START_TEXT).await?;
            return Ok(Outcome::Greeted);
        }
        if let Some(photo) = message.largest_photo() {
            return self.on_photo(message.chat.id, &photo.file_id).await;
        }
        Ok(Outcome::Ignored)
    }

    /// Start a session for an uploaded photo and send the initial grid.
    ///
    /// # Errors
    ///
    /// Returns an error if downloading, rendering or sending fails.
    pub async fn on_photo(&self, chat_id: ChatId, file_id: &str) -> Result<Outcome, ControllerError> {
        let bytes = self.bot.download_file(file_id).await?;
        let image = match render::decode_async(bytes).await {
            Ok(image) => Arc::new(image),
            Err(RenderError::Decode(e)) => {
                warn!(chat_id, error = %e, "uploaded image could not be decoded");
                self.bot.send_message(chat_id, DECODE_FAILED_TEXT).await?;
                return Ok(Outcome::DecodeFailed);
            }
            Err(e) => return Err(e.into()),
        };

        let session = Session::new(image.clone());
        let (rows, cols) = (session.rows, session.cols);
        let (session_id, live) = {
            let mut sessions = self.sessions.write().await;
            let id = sessions.create(session);
            (id, sessions.len())
        };
        info!(%session_id, chat_id, width = image.width(), height = image.height(), sessions = live, "session created");

        if let Err(e) = self.send_initial_grid(chat_id, &session_id, image, rows, cols).await {
            // The user never received this session's keyboard.
            self.sessions.write().await.delete(&session_id);
            return Err(e);
        }
        Ok(Outcome::SessionCreated(session_id))
    }

    async fn send_initial_grid(
        &self,
        chat_id: ChatId,
        session_id: &str,
        image: Arc<DynamicImage>,
        rows: u32,
        cols: u32,
    ) -> Result<(), ControllerError> {
        let png = render::render_async(image, rows, cols, BTreeMap::new()).await?;
        let keyboard = build_keyboard(session_id, rows, cols);
        self.bot
            .send_photo(chat_id, png, Some(&grid_caption(rows, cols)), &keyboard)
            .await?;
        Ok(())
    }

    /// Apply a button tap and send the re-rendered grid.
    ///
    /// The tap is acknowledged before anything else so the client spinner
    /// clears even when the tap is ignored or rendering fails.
    ///
    /// # Errors
    ///
    /// Returns an error if rendering or sending the new image fails.
    pub async fn on_tap(&self, query: CallbackQuery) -> Result<Outcome, ControllerError> {
        if let Err(e) = self.bot.answer_callback_query(&query.id).await {
            warn!(callback_query_id = %query.id, error = %e, "callback acknowledgement failed");
        }

        let Some((session_id, tap)) = query.data.as_deref().and_then(parse_callback_data) else {
            debug!(data = ?query.data, "ignoring unrecognized callback data");
            return Ok(Outcome::Ignored);
        };
        let Some(chat_id) = query.message.as_ref().map(|m| m.chat.id) else {
            debug!(%session_id, "ignoring tap without an originating message");
            return Ok(Outcome::Ignored);
        };

        let (image, rows, cols, marks) = {
            let mut sessions = self.sessions.write().await;
            let Some(session) = sessions.get_mut(&session_id) else {
                debug!(%session_id, "ignoring tap for unknown session");
                return Ok(Outcome::Ignored);
            };
            if !session.apply(tap) {
                debug!(%session_id, ?tap, "ignoring tap outside the grid");
                return Ok(Outcome::Ignored);
            }
            (session.base_image.clone(), session.rows, session.cols, session.marks.clone())
        };
        debug!(%session_id, ?tap, marks = marks.len(), "tap applied");

        let png = render::render_async(image, rows, cols, marks).await?;
        let keyboard = build_keyboard(&session_id, rows, cols);
        self.bot.send_photo(chat_id, png, None, &keyboard).await?;
        Ok(Outcome::Rerendered(session_id))
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
