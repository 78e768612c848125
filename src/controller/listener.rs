//! Trigger listener
//!
//! Receives scene notifications from the [`EventBus`](crate::core::EventBus)
//! and forwards each one to the controller. Holds only a weak reference so a
//! dropped controller ends the loop on the next event.
//!
//! ```text
//! EventBus ──recv──▶ run_listener() ──▶ FilterController::handle_event() ──▶ reevaluate()
//! ```

use super::FilterController;
use crate::core::{EventEnvelope, SceneEvent};
use std::sync::Weak;
use tokio::sync::broadcast;

/// Run until the bus closes or the controller is dropped
pub(crate) async fn run_listener(
    controller: Weak<FilterController>,
    mut rx: broadcast::Receiver<EventEnvelope>,
) {
    tracing::debug!("Filter trigger listener started");

    loop {
        let event = match rx.recv().await {
            Ok(envelope) => envelope.event,
            Err(broadcast::error::RecvError::Lagged(count)) => {
                tracing::warn!(count = count, "Filter trigger listener lagged, resyncing");
                // Whatever was skipped, a full entity refresh covers it
                SceneEvent::EntitiesChanged
            }
            Err(broadcast::error::RecvError::Closed) => {
                tracing::debug!("EventBus closed, stopping filter trigger listener");
                break;
            }
        };

        let Some(controller) = controller.upgrade() else {
            break;
        };
        controller.handle_event(&event);
    }
}
