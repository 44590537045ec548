//! # Reconnecting Live Subscriber
//!
//! Dashboard-side counterpart of the gateway's broadcast hub. Maintains a
//! WebSocket subscription and presents a stable, typed event stream to UI
//! code regardless of transient network failure.
//!
//! The connection life cycle is an explicit state machine:
//!
//! ```text
//! Disconnected -> Connecting -> Connected -> Disconnected -> Connecting ...
//!                      |                                         |
//!                      +--------- retries exhausted -------------+--> Failed
//! ```
//!
//! A lost connection is retried after a fixed delay up to a bounded number
//! of attempts (the counter resets on every successful connect). Once the
//! budget is spent the machine parks in `Failed` and emits exactly one
//! terminal error event; calling [`LiveSubscriber::connect`] again starts
//! a fresh machine. A deliberate [`LiveSubscriber::disconnect`] suppresses
//! reconnection entirely.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tokio_util::sync::CancellationToken;

use crate::core::reading::{Reading, StreamFrame};

/// Where the connection machine currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Retry budget spent; only a manual reconnect leaves this state.
    Failed,
}

/// Life-cycle and data events delivered to the consumer.
#[derive(Debug, Clone)]
pub enum SubscriberEvent {
    Connected,
    /// A reading arrived, either as the bootstrap frame or as a live
    /// update. Consumers treat both the same way.
    Update(Reading),
    Disconnected,
    /// Terminal failure after the retry budget is spent. Emitted once.
    Error(String),
}

#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("connection attempt timed out after {0:?}")]
    ConnectTimeout(Duration),
    #[error("gave up after {0} reconnect attempts")]
    RetriesExhausted(u32),
    #[error("subscriber was deliberately disconnected")]
    Cancelled,
}

/// Tunables for the subscription machine.
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub ws_url: String,
    pub connect_timeout: Duration,
    pub reconnect_delay: Duration,
    pub max_reconnect_attempts: u32,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            ws_url: "ws://127.0.0.1:5000/ws".to_string(),
            connect_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(3),
            max_reconnect_attempts: 5,
        }
    }
}

/// Handle to the live subscription.
pub struct LiveSubscriber {
    config: SubscriberConfig,
    events_tx: mpsc::UnboundedSender<SubscriberEvent>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
    running: Arc<AtomicBool>,
}

impl LiveSubscriber {
    /// Creates the subscriber and the receiving half of its event stream.
    /// Nothing connects until [`LiveSubscriber::connect`] is called.
    pub fn new(config: SubscriberConfig) -> (Self, mpsc::UnboundedReceiver<SubscriberEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Disconnected);
        (
            Self {
                config,
                events_tx,
                state_tx,
                shutdown: CancellationToken::new(),
                running: Arc::new(AtomicBool::new(false)),
            },
            events_rx,
        )
    }

    /// Starts the connection machine (if it is not already running) and
    /// resolves once the link is up.
    ///
    /// # Errors
    /// - [`SubscriberError::ConnectTimeout`] when the link is not up
    ///   within the configured window; the machine keeps retrying in the
    ///   background.
    /// - [`SubscriberError::RetriesExhausted`] when the machine reached
    ///   its terminal `Failed` state.
    /// - [`SubscriberError::Cancelled`] after a deliberate disconnect.
    pub async fn connect(&self) -> Result<(), SubscriberError> {
        if self.shutdown.is_cancelled() {
            return Err(SubscriberError::Cancelled);
        }

        if !self.running.swap(true, Ordering::SeqCst) {
            // Fresh machine: reset a stale Failed state before the loop
            // publishes its own transitions.
            let _ = self.state_tx.send(ConnectionState::Disconnected);
            tokio::spawn(run_loop(
                self.config.clone(),
                self.events_tx.clone(),
                self.state_tx.clone(),
                self.shutdown.clone(),
                Arc::clone(&self.running),
            ));
        }

        let mut state_rx = self.state_tx.subscribe();
        let wait = async {
            loop {
                match *state_rx.borrow_and_update() {
                    ConnectionState::Connected => return Ok(()),
                    ConnectionState::Failed => {
                        return Err(SubscriberError::RetriesExhausted(
                            self.config.max_reconnect_attempts,
                        ))
                    }
                    ConnectionState::Disconnected | ConnectionState::Connecting => {}
                }
                if state_rx.changed().await.is_err() {
                    return Err(SubscriberError::Cancelled);
                }
            }
        };

        match tokio::time::timeout(self.config.connect_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(SubscriberError::ConnectTimeout(self.config.connect_timeout)),
        }
    }

    /// Closes the subscription deliberately and suppresses automatic
    /// reconnection. The instance cannot be reused afterwards.
    pub fn disconnect(&self) {
        self.shutdown.cancel();
    }

    /// The machine's current state.
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    /// Whether the live link is currently up.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// The connection machine itself. Runs until a deliberate disconnect or
/// until the retry budget is spent.
async fn run_loop(
    config: SubscriberConfig,
    events_tx: mpsc::UnboundedSender<SubscriberEvent>,
    state_tx: watch::Sender<ConnectionState>,
    shutdown: CancellationToken,
    running: Arc<AtomicBool>,
) {
    let mut attempts: u32 = 0;

    'machine: loop {
        let _ = state_tx.send(ConnectionState::Connecting);
        log::info!("Connecting to gateway stream: {}", config.ws_url);

        let outcome = tokio::select! {
            _ = shutdown.cancelled() => break 'machine,
            outcome = tokio::time::timeout(
                config.connect_timeout,
                connect_async(config.ws_url.as_str()),
            ) => outcome,
        };

        match outcome {
            Ok(Ok((ws_stream, _response))) => {
                log::info!("Live subscription established");
                attempts = 0;
                let _ = state_tx.send(ConnectionState::Connected);
                let _ = events_tx.send(SubscriberEvent::Connected);

                // The subscription channel carries no client payload; only
                // the read half matters.
                let (_write, mut read) = ws_stream.split();

                let deliberate = loop {
                    tokio::select! {
                        _ = shutdown.cancelled() => break true,
                        msg = read.next() => match msg {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<StreamFrame>(&text) {
                                    Ok(frame) => {
                                        let _ = events_tx
                                            .send(SubscriberEvent::Update(frame.into_reading()));
                                    }
                                    Err(e) => log::warn!("Discarding unparseable frame: {}", e),
                                }
                            }
                            Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                            Some(Ok(Message::Close(_))) | None => {
                                log::warn!("Stream closed by gateway");
                                break false;
                            }
                            Some(Err(e)) => {
                                log::error!("Stream read error: {}", e);
                                break false;
                            }
                            Some(Ok(_)) => {}
                        }
                    }
                };

                let _ = state_tx.send(ConnectionState::Disconnected);
                let _ = events_tx.send(SubscriberEvent::Disconnected);
                if deliberate {
                    break 'machine;
                }
            }
            Ok(Err(e)) => {
                log::error!("Failed to connect to gateway stream: {}", e);
                let _ = state_tx.send(ConnectionState::Disconnected);
            }
            Err(_) => {
                log::error!(
                    "Connection attempt timed out after {:?}",
                    config.connect_timeout
                );
                let _ = state_tx.send(ConnectionState::Disconnected);
            }
        }

        if shutdown.is_cancelled() {
            break 'machine;
        }

        if attempts >= config.max_reconnect_attempts {
            log::error!(
                "Max reconnect attempts ({}) reached, giving up",
                config.max_reconnect_attempts
            );
            let _ = state_tx.send(ConnectionState::Failed);
            let _ = events_tx.send(SubscriberEvent::Error(format!(
                "gave up after {} reconnect attempts",
                config.max_reconnect_attempts
            )));
            running.store(false, Ordering::SeqCst);
            return;
        }

        attempts += 1;
        log::info!(
            "Reconnecting ({}/{}) in {:?}",
            attempts,
            config.max_reconnect_attempts,
            config.reconnect_delay
        );
        tokio::select! {
            _ = shutdown.cancelled() => break 'machine,
            _ = tokio::time::sleep(config.reconnect_delay) => {}
        }
    }

    let _ = state_tx.send(ConnectionState::Disconnected);
    running.store(false, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Port 1 (tcpmux) is never listening; connects fail fast with a
    // refusal instead of depending on the network.
    fn unreachable_config(reconnect_delay: Duration, max_attempts: u32) -> SubscriberConfig {
        SubscriberConfig {
            ws_url: "ws://127.0.0.1:1/ws".to_string(),
            connect_timeout: Duration::from_millis(200),
            reconnect_delay,
            max_reconnect_attempts: max_attempts,
        }
    }

    #[tokio::test]
    async fn retry_exhaustion_emits_exactly_one_terminal_error() {
        let (subscriber, mut events) =
            LiveSubscriber::new(unreachable_config(Duration::from_millis(10), 2));

        assert!(subscriber.connect().await.is_err());

        let mut errors = 0;
        let mut connected = 0;
        let waited = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(event) = events.recv().await {
                match event {
                    SubscriberEvent::Error(_) => {
                        errors += 1;
                        break;
                    }
                    SubscriberEvent::Connected => connected += 1,
                    _ => {}
                }
            }
        })
        .await;
        assert!(waited.is_ok(), "terminal error never arrived");
        assert_eq!(errors, 1);
        assert_eq!(connected, 0);

        // The machine has parked; no further events may trickle in.
        tokio::time::sleep(Duration::from_millis(100)).await;
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, SubscriberEvent::Error(_)));
        }
        assert_eq!(subscriber.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn deliberate_disconnect_suppresses_reconnection() {
        // Long backoff keeps the machine parked in the retry sleep while
        // the test cancels it.
        let (subscriber, mut events) =
            LiveSubscriber::new(unreachable_config(Duration::from_secs(30), 5));

        assert!(subscriber.connect().await.is_err());
        subscriber.disconnect();
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(subscriber.state(), ConnectionState::Disconnected);
        while let Ok(event) = events.try_recv() {
            assert!(!matches!(event, SubscriberEvent::Error(_)));
        }

        // A cancelled subscriber refuses to restart.
        assert!(matches!(
            subscriber.connect().await,
            Err(SubscriberError::Cancelled)
        ));
    }
}
