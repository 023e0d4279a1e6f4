//! Service layer — domain logic behind the webhook.
//!
//! ARCHITECTURE
//! ============
//! Route handlers only validate and enqueue updates. The dispatcher feeds
//! them to the controller, which owns session mutation and calls into the
//! pure keyboard and render modules before replying through the bot API.

pub mod controller;
pub mod dispatch;
pub mod keyboard;
pub mod render;
