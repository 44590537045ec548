//! # Broadcast Hub
//!
//! Fan-out point for live telemetry. The hub takes each newly accepted
//! reading and pushes it to every connected subscriber with per-subscriber
//! failure isolation: a delivery attempt that fails removes exactly that
//! subscriber and never blocks or fails delivery to the others.
//!
//! Frames are wrapped in an `Arc` once per broadcast, so a fan-out to many
//! subscribers clones pointers rather than payloads. Sends go through
//! unbounded mpsc channels and never block the accept path; delivery is
//! best-effort, at-most-once per subscriber per reading, fire-and-forget.

use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use crate::core::reading::StreamFrame;

/// Internal representation of one connected live-view session.
struct ClientHandle {
    /// Unique identifier, derived from the connection by the caller.
    id: String,
    /// Sending half of the subscriber's dedicated channel. Unbounded, so
    /// sends succeed instantly unless the receiver is gone.
    sender: mpsc::UnboundedSender<Arc<StreamFrame>>,
}

/// Manages the subscriber set and broadcasts frames to it.
pub struct BroadcastHub {
    clients: Mutex<Vec<ClientHandle>>,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self {
            clients: Mutex::new(Vec::new()),
        }
    }

    /// Registers a subscriber and returns the receiving half of its
    /// channel.
    ///
    /// When a `bootstrap` frame is given it is queued to this subscriber
    /// alone before the handle joins the set, so a dashboard always sees
    /// the current latest reading ahead of any updates.
    pub fn register(
        &self,
        id: &str,
        bootstrap: Option<Arc<StreamFrame>>,
    ) -> mpsc::UnboundedReceiver<Arc<StreamFrame>> {
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(frame) = bootstrap {
            // The receiver cannot be gone yet; ignore the impossible error.
            let _ = tx.send(frame);
        }

        let mut clients = self.clients.lock().expect("hub lock poisoned");
        clients.push(ClientHandle {
            id: id.to_string(),
            sender: tx,
        });
        log::info!("Subscriber '{}' registered ({} active)", id, clients.len());
        rx
    }

    /// Removes a subscriber by id. Idempotent; removing an unknown id is
    /// a no-op.
    pub fn unregister(&self, id: &str) {
        let mut clients = self.clients.lock().expect("hub lock poisoned");
        let before = clients.len();
        clients.retain(|c| c.id != id);
        if clients.len() != before {
            log::info!("Subscriber '{}' removed ({} active)", id, clients.len());
        }
    }

    /// Delivers a frame to every registered subscriber.
    ///
    /// Subscribers whose send fails have dropped their receiver, which
    /// means the connection task is gone; `retain` removes them in the
    /// same pass so the set self-heals without a heartbeat.
    pub fn broadcast(&self, frame: StreamFrame) {
        let frame = Arc::new(frame);
        let mut clients = self.clients.lock().expect("hub lock poisoned");
        clients.retain(|client| match client.sender.send(Arc::clone(&frame)) {
            Ok(_) => true,
            Err(_) => {
                log::info!("Subscriber '{}' unreachable, removing from hub", client.id);
                false
            }
        });
    }

    /// Number of currently registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.clients.lock().expect("hub lock poisoned").len()
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}
