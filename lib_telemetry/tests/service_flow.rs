//! End-to-end exercise of the ingestion core: accept readings through the
//! coordinating service and observe them through the query surface and a
//! pair of live subscriptions, all in-process.

use lib_telemetry::core::service::TelemetryService;
use lib_telemetry::{RawReading, StreamFrame, ValidationError};

fn raw(ph: f64, turbidity: f64) -> RawReading {
    RawReading {
        ph,
        turbidity,
        timestamp: None,
        device_id: Some("probe-1".to_string()),
    }
}

#[tokio::test]
async fn accept_query_broadcast_round_trip() {
    let service = TelemetryService::new(100);

    // An early dashboard subscribes before any data exists: no bootstrap.
    let mut early = service.subscribe("early");
    assert!(early.try_recv().is_err());

    service.accept(raw(7.0, 120.0)).unwrap();
    service.accept(raw(7.1, 121.0)).unwrap();
    let third = service.accept(raw(7.2, 122.0)).unwrap();
    assert_eq!(third.predicted_next_ph, 7.3);

    // A late dashboard bootstraps with the current latest, then follows.
    let mut late = service.subscribe("late");
    let bootstrap = late.try_recv().unwrap();
    assert!(matches!(&*bootstrap, StreamFrame::Initial { .. }));
    assert_eq!(bootstrap.reading().id, third.reading.id);

    service.accept(raw(7.3, 123.0)).unwrap();

    // The early subscriber saw every update, in acceptance order.
    let seen: Vec<f64> = std::iter::from_fn(|| early.try_recv().ok())
        .map(|frame| frame.reading().ph)
        .collect();
    assert_eq!(seen, vec![7.0, 7.1, 7.2, 7.3]);

    // The late one saw only what happened after its bootstrap.
    assert_eq!(late.try_recv().unwrap().reading().ph, 7.3);
    assert!(late.try_recv().is_err());

    // Query surface agrees with the broadcasts.
    let recent = service.recent(5);
    assert_eq!(recent.len(), 4);
    assert_eq!(recent[0].ph, 7.3);
    assert_eq!(recent[3].ph, 7.0);

    let status = service.status();
    assert!(status.connected);
    assert_eq!(status.total_readings, 4);
    assert_eq!(status.subscribers_connected, 2);
    assert_eq!(status.latest.unwrap().ph, 7.3);
}

#[tokio::test]
async fn capacity_overflow_evicts_only_the_oldest() {
    let service = TelemetryService::new(5);
    for i in 0..6 {
        service.accept(raw(6.0 + i as f64 * 0.1, 50.0)).unwrap();
    }

    let held: Vec<f64> = service.recent(100).iter().rev().map(|r| r.ph).collect();
    assert_eq!(held, vec![6.1, 6.2, 6.3, 6.4, 6.5]);
    assert_eq!(service.status().total_readings, 5);
}

#[tokio::test]
async fn rejected_submissions_never_reach_subscribers() {
    let service = TelemetryService::new(100);
    let mut rx = service.subscribe("dash");

    assert_eq!(
        service.accept(raw(15.0, 10.0)).unwrap_err(),
        ValidationError::PhOutOfRange(15.0)
    );
    assert_eq!(
        service.accept(raw(7.0, 9000.0)).unwrap_err(),
        ValidationError::TurbidityOutOfRange(9000.0)
    );

    assert!(rx.try_recv().is_err());
    assert_eq!(service.status().total_readings, 0);
    assert!(!service.status().connected);
}

#[tokio::test]
async fn clear_resets_history_but_not_the_stream() {
    let service = TelemetryService::new(100);
    let mut rx = service.subscribe("dash");

    for _ in 0..3 {
        service.accept(raw(7.0, 50.0)).unwrap();
    }
    assert_eq!(service.clear(), 3);
    assert!(service.latest().is_none());
    assert_eq!(service.recent(5).len(), 0);

    // Already-broadcast frames are unaffected by the clear.
    let mut delivered = 0;
    while rx.try_recv().is_ok() {
        delivered += 1;
    }
    assert_eq!(delivered, 3);

    // New subscribers get no bootstrap from an emptied history.
    let mut fresh = service.subscribe("fresh");
    assert!(fresh.try_recv().is_err());

    // Ingestion continues normally after the clear.
    service.accept(raw(6.9, 40.0)).unwrap();
    assert_eq!(service.status().total_readings, 1);
}
