//! # Telemetry Service
//!
//! The single coordinating instance that owns all shared mutable state of
//! the ingestion core: the bounded history buffer and the broadcast hub.
//! Nothing else in the process touches either directly; request handlers
//! go through the operations below.
//!
//! Locking discipline: the history sits behind an `RwLock` so queries run
//! concurrently while accept/clear serialize. The accept path holds the
//! write lock across append, trend estimation and broadcast, which makes
//! broadcast order identical to acceptance order by construction. All
//! sends inside that critical section are non-blocking unbounded pushes,
//! so the section stays short. Lock order is history before hub
//! everywhere.

use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;

use crate::core::history::HistoryBuffer;
use crate::core::hub::BroadcastHub;
use crate::core::reading::{AcceptedReading, GatewayStatus, RawReading, Reading, StreamFrame};
use crate::core::trend::{predict_next, TREND_WINDOW};
use crate::core::validator::{validate, ValidationError};

/// Default `limit` for the recent-readings query.
pub const DEFAULT_RECENT_LIMIT: usize = 10;

/// Owns the history buffer and subscriber set; see the module docs for
/// the locking discipline.
pub struct TelemetryService {
    history: RwLock<HistoryBuffer>,
    hub: BroadcastHub,
}

impl TelemetryService {
    pub fn new(capacity: usize) -> Self {
        Self {
            history: RwLock::new(HistoryBuffer::new(capacity)),
            hub: BroadcastHub::new(),
        }
    }

    /// The accept path: validate, append (evicting on overflow), project
    /// the next pH over the trailing window, and broadcast to every live
    /// subscriber. Validation failure performs no mutation at all.
    ///
    /// Durable persistence is deliberately not done here; the ingestion
    /// endpoint spawns it as a detached task so a slow or failing store
    /// can never delay the accept response or the broadcast.
    pub fn accept(&self, raw: RawReading) -> Result<AcceptedReading, ValidationError> {
        let reading = validate(raw)?;

        let mut history = self.history.write().expect("history lock poisoned");
        history.append(reading.clone());
        let predicted_next_ph = predict_next(&history.ph_tail(TREND_WINDOW));
        self.hub.broadcast(StreamFrame::Update {
            reading: reading.clone(),
        });
        drop(history);

        log::debug!(
            "Accepted reading {} from '{}' (ph {}, turbidity {} NTU, next ph ~{})",
            reading.id,
            reading.device_id,
            reading.ph,
            reading.turbidity,
            predicted_next_ph
        );

        Ok(AcceptedReading {
            reading,
            predicted_next_ph,
        })
    }

    /// The most recently accepted reading, if any.
    pub fn latest(&self) -> Option<Reading> {
        self.history
            .read()
            .expect("history lock poisoned")
            .latest()
            .cloned()
    }

    /// The last `n` accepted readings, newest-first.
    pub fn recent(&self, n: usize) -> Vec<Reading> {
        self.history.read().expect("history lock poisoned").recent(n)
    }

    /// Snapshot of the gateway state for the status query.
    pub fn status(&self) -> GatewayStatus {
        let history = self.history.read().expect("history lock poisoned");
        GatewayStatus {
            connected: history.total_accepted() > 0,
            last_update: history.latest().map(|r| r.timestamp),
            total_readings: history.len(),
            subscribers_connected: self.hub.subscriber_count(),
            latest: history.latest().cloned(),
        }
    }

    /// Administrative clear. Does not affect already-broadcast or
    /// already-persisted readings, nor the lifetime acceptance counter.
    pub fn clear(&self) -> usize {
        let removed = self
            .history
            .write()
            .expect("history lock poisoned")
            .clear();
        log::warn!("History cleared, {} readings dropped", removed);
        removed
    }

    /// Opens a live subscription.
    ///
    /// Registration happens under the history read lock so the bootstrap
    /// frame (the current latest reading, when history is non-empty) can
    /// never interleave with an in-flight accept: the subscriber either
    /// sees a reading as its bootstrap or receives it as an update, never
    /// both and never out of order.
    pub fn subscribe(&self, id: &str) -> mpsc::UnboundedReceiver<Arc<StreamFrame>> {
        let history = self.history.read().expect("history lock poisoned");
        let bootstrap = history.latest().map(|reading| {
            Arc::new(StreamFrame::Initial {
                reading: reading.clone(),
            })
        });
        self.hub.register(id, bootstrap)
    }

    /// Closes a live subscription. Idempotent.
    pub fn unsubscribe(&self, id: &str) {
        self.hub.unregister(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(ph: f64, turbidity: f64) -> RawReading {
        RawReading {
            ph,
            turbidity,
            timestamp: None,
            device_id: None,
        }
    }

    #[tokio::test]
    async fn accept_returns_reading_and_projection() {
        let service = TelemetryService::new(100);
        service.accept(raw(7.0, 50.0)).unwrap();
        service.accept(raw(7.1, 50.0)).unwrap();
        let accepted = service.accept(raw(7.2, 50.0)).unwrap();
        assert_eq!(accepted.reading.ph, 7.2);
        assert_eq!(accepted.predicted_next_ph, 7.3);
    }

    #[tokio::test]
    async fn rejection_leaves_state_untouched() {
        let service = TelemetryService::new(100);
        service.accept(raw(7.0, 50.0)).unwrap();

        let err = service.accept(raw(15.0, 10.0)).unwrap_err();
        assert_eq!(err, ValidationError::PhOutOfRange(15.0));

        let status = service.status();
        assert_eq!(status.total_readings, 1);
        assert_eq!(status.latest.unwrap().ph, 7.0);
    }

    #[tokio::test]
    async fn status_tracks_lifetime_acceptance_across_clear() {
        let service = TelemetryService::new(100);
        assert!(!service.status().connected);

        for _ in 0..3 {
            service.accept(raw(7.0, 50.0)).unwrap();
        }
        assert_eq!(service.clear(), 3);

        let status = service.status();
        assert!(status.connected);
        assert_eq!(status.total_readings, 0);
        assert!(status.last_update.is_none());
        assert!(status.latest.is_none());
        assert!(service.latest().is_none());
    }

    #[tokio::test]
    async fn subscribers_see_updates_in_acceptance_order() {
        let service = TelemetryService::new(100);
        let mut rx = service.subscribe("dash-1");

        for ph in [6.8, 6.9, 7.0] {
            service.accept(raw(ph, 50.0)).unwrap();
        }

        for expected in [6.8, 6.9, 7.0] {
            let frame = rx.try_recv().expect("missing update");
            assert!(matches!(&*frame, StreamFrame::Update { .. }));
            assert_eq!(frame.reading().ph, expected);
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_subscriber_bootstraps_with_latest() {
        let service = TelemetryService::new(100);
        service.accept(raw(7.0, 50.0)).unwrap();
        let latest_id = service.latest().unwrap().id;

        let mut rx = service.subscribe("dash-2");
        let frame = rx.try_recv().unwrap();
        assert!(matches!(&*frame, StreamFrame::Initial { .. }));
        assert_eq!(frame.reading().id, latest_id);

        service.accept(raw(7.1, 50.0)).unwrap();
        assert_eq!(rx.try_recv().unwrap().reading().ph, 7.1);
    }

    #[tokio::test]
    async fn unsubscribed_client_receives_nothing_further() {
        let service = TelemetryService::new(100);
        let mut rx_gone = service.subscribe("gone");
        let mut rx_kept = service.subscribe("kept");

        service.accept(raw(7.0, 50.0)).unwrap();
        service.unsubscribe("gone");
        service.accept(raw(7.1, 50.0)).unwrap();

        assert_eq!(rx_gone.try_recv().unwrap().reading().ph, 7.0);
        assert!(rx_gone.try_recv().is_err());

        assert_eq!(rx_kept.try_recv().unwrap().reading().ph, 7.0);
        assert_eq!(rx_kept.try_recv().unwrap().reading().ph, 7.1);
        assert_eq!(service.status().subscribers_connected, 1);
    }
}
