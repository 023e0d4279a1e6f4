//! Update dispatcher — drains the webhook queue into the controller.
//!
//! DESIGN
//! ======
//! The webhook handler only enqueues; this background task handles updates
//! one at a time in arrival order. Handler errors are logged and the loop
//! moves on. The task ends once every sender has been dropped.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::services::controller::Controller;
use crate::telegram::types::Update;

/// Spawn the background dispatch task. Returns a handle for shutdown.
pub fn spawn_dispatcher(controller: Controller, mut updates: mpsc::Receiver<Update>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            let update_id = update.update_id;
            match controller.handle_update(update).await {
                Ok(outcome) => debug!(update_id, ?outcome, "update handled"),
                Err(e) => error!(update_id, error = %e, "update handling failed"),
            }
        }
        info!("update queue closed; dispatcher stopping");
    })
}

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod tests;
