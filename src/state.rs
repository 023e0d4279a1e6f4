//! Shared application state and the annotation session model.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It
//! holds the session store, the bot API handle and the sending half of the
//! update queue. Each session owns an immutable decoded image plus the
//! mutable grid annotation (marks and current mode).
//!
//! Sessions live for the process lifetime unless a capacity is configured,
//! in which case the oldest session is evicted first.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::Arc;

use image::DynamicImage;
use rand::Rng;
use tokio::sync::{RwLock, mpsc};

use crate::telegram::BotApi;
use crate::telegram::types::Update;

pub const DEFAULT_ROWS: u32 = 5;
pub const DEFAULT_COLS: u32 = 5;

// =============================================================================
// MARK / CELL / TAP
// =============================================================================

/// Symbol drawn in a marked cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mark {
    #[default]
    Star,
    Bomb,
}

impl Mark {
    /// The other symbol.
    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Star => Self::Bomb,
            Self::Bomb => Self::Star,
        }
    }
}

/// Grid coordinate. Ordered row-major so marks render in a stable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cell {
    pub row: u32,
    pub col: u32,
}

impl Cell {
    #[must_use]
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

/// A decoded button press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tap {
    Cell(Cell),
    ToggleMode,
    Clear,
}

// =============================================================================
// SESSION
// =============================================================================

/// Annotation state for one uploaded image.
pub struct Session {
    /// Decoded upload. Never mutated; every render works on a copy.
    pub base_image: Arc<DynamicImage>,
    pub rows: u32,
    pub cols: u32,
    pub marks: BTreeMap<Cell, Mark>,
    /// Symbol applied to the next newly marked cell.
    pub mode: Mark,
}

impl Session {
    /// New session with the default 5×5 grid.
    #[must_use]
    pub fn new(base_image: Arc<DynamicImage>) -> Self {
        Self::with_grid(base_image, DEFAULT_ROWS, DEFAULT_COLS)
    }

    #[must_use]
    pub fn with_grid(base_image: Arc<DynamicImage>, rows: u32, cols: u32) -> Self {
        Self { base_image, rows: rows.max(1), cols: cols.max(1), marks: BTreeMap::new(), mode: Mark::default() }
    }

    #[must_use]
    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    /// Unmark `cell` if marked, otherwise mark it with the current mode.
    /// Returns `false` (and changes nothing) for cells outside the grid.
    pub fn toggle_cell(&mut self, cell: Cell) -> bool {
        if !self.contains(cell) {
            return false;
        }
        if self.marks.remove(&cell).is_none() {
            self.marks.insert(cell, self.mode);
        }
        true
    }

    pub fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
    }

    pub fn clear(&mut self) {
        self.marks.clear();
    }

    /// Apply a tap. Returns whether the tap was accepted.
    pub fn apply(&mut self, tap: Tap) -> bool {
        match tap {
            Tap::Cell(cell) => self.toggle_cell(cell),
            Tap::ToggleMode => {
                self.toggle_mode();
                true
            }
            Tap::Clear => {
                self.clear();
                true
            }
        }
    }
}

// =============================================================================
// SESSION STORE
// =============================================================================

pub(crate) fn bytes_to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Generate a random 8-hex-char session identifier.
#[must_use]
pub fn generate_session_id() -> String {
    let bytes: [u8; 4] = rand::rng().random();
    bytes_to_hex(&bytes)
}

/// Process-wide session map keyed by session identifier.
pub struct SessionStore {
    sessions: HashMap<String, Session>,
    /// Insertion order, oldest first. Only consulted when a capacity is set.
    order: VecDeque<String>,
    /// Maximum live sessions; 0 means unbounded.
    capacity: usize,
}

impl SessionStore {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self { sessions: HashMap::new(), order: VecDeque::new(), capacity }
    }

    #[cfg(test)]
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Session> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Session> {
        self.sessions.get_mut(id)
    }

    /// Store `session` under a fresh identifier and return it.
    pub fn create(&mut self, session: Session) -> String {
        let mut id = generate_session_id();
        while self.sessions.contains_key(&id) {
            id = generate_session_id();
        }
        self.insert(id.clone(), session);
        id
    }

    /// Store `session` under `id`, replacing any session already there.
    pub fn insert(&mut self, id: String, session: Session) {
        if self.sessions.insert(id.clone(), session).is_some() {
            self.order.retain(|existing| existing != &id);
        }
        self.order.push_back(id);
        self.evict_over_capacity();
    }

    pub fn delete(&mut self, id: &str) -> Option<Session> {
        let removed = self.sessions.remove(id)?;
        self.order.retain(|existing| existing != id);
        Some(removed)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn evict_over_capacity(&mut self) {
        if self.capacity == 0 {
            return;
        }
        while self.sessions.len() > self.capacity {
            let Some(oldest) = self.order.pop_front() else {
                break;
            };
            if self.sessions.remove(&oldest).is_some() {
                tracing::debug!(session_id = %oldest, "evicted oldest session");
            }
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(0)
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<RwLock<SessionStore>>,
    pub bot: Arc<dyn BotApi>,
    /// Webhook handler side of the update queue.
    pub updates: mpsc::Sender<Update>,
}

impl AppState {
    /// Build the state and the receiving half of the update queue.
    #[must_use]
    pub fn new(bot: Arc<dyn BotApi>, session_capacity: usize, queue_capacity: usize) -> (Self, mpsc::Receiver<Update>) {
        let (updates, rx) = mpsc::channel(queue_capacity.max(1));
        let state = Self { sessions: Arc::new(RwLock::new(SessionStore::new(session_capacity))), bot, updates };
        (state, rx)
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
#[path = "state_helpers_test.rs"]
pub mod test_helpers;

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
