//! Reading model and the JSON envelopes shared by the gateway and its
//! clients. Everything here is camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device label assigned when a probe does not identify itself.
pub const DEFAULT_DEVICE_ID: &str = "unknown-device";

/// Rounds a measurement to two decimal places, the precision kept for
/// every accepted value.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One accepted pH/turbidity sample.
///
/// Immutable once created. The timestamp is assigned by the gateway at
/// acceptance; the id is an opaque token used only for client-side
/// deduplication, never for ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: String,
    pub ph: f64,
    pub turbidity: f64,
    pub timestamp: DateTime<Utc>,
    pub device_id: String,
}

/// The submit body as a probe sends it, before validation.
///
/// A client-supplied timestamp is informational only and is never trusted
/// for ordering, so it is kept as an opaque JSON value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawReading {
    pub ph: f64,
    pub turbidity: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

/// A frame pushed over the live subscription channel.
///
/// `initial` is the bootstrap message a subscriber receives once on
/// connect when history is non-empty; `update` follows for every
/// subsequently accepted reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamFrame {
    Initial { reading: Reading },
    Update { reading: Reading },
}

impl StreamFrame {
    /// The reading carried by the frame, regardless of kind.
    pub fn reading(&self) -> &Reading {
        match self {
            StreamFrame::Initial { reading } | StreamFrame::Update { reading } => reading,
        }
    }

    /// Consumes the frame, yielding the carried reading.
    pub fn into_reading(self) -> Reading {
        match self {
            StreamFrame::Initial { reading } | StreamFrame::Update { reading } => reading,
        }
    }
}

/// Successful submit response: the accepted reading plus the informational
/// pH projection for the next sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptedReading {
    pub reading: Reading,
    pub predicted_next_ph: f64,
}

/// Envelope for the latest-reading query.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestReading {
    pub reading: Reading,
}

/// Envelope for the recent-readings query, newest-first.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentBatch {
    pub count: usize,
    pub readings: Vec<Reading>,
}

/// Gateway status snapshot.
///
/// `connected` reports whether any reading was ever accepted and survives
/// an administrative clear; `total_readings` is the count currently held
/// in the bounded history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayStatus {
    pub connected: bool,
    pub last_update: Option<DateTime<Utc>>,
    pub total_readings: usize,
    pub subscribers_connected: usize,
    pub latest: Option<Reading>,
}

/// Result of the administrative clear operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearSummary {
    pub cleared_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(7.123), 7.12);
        assert_eq!(round2(7.125), 7.13);
        assert_eq!(round2(7.0), 7.0);
    }

    #[test]
    fn stream_frames_tag_their_kind() {
        let reading = Reading {
            id: "r-1".to_string(),
            ph: 7.2,
            turbidity: 120.5,
            timestamp: Utc::now(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
        };
        let json = serde_json::to_value(StreamFrame::Initial {
            reading: reading.clone(),
        })
        .unwrap();
        assert_eq!(json["type"], "initial");
        assert_eq!(json["reading"]["deviceId"], DEFAULT_DEVICE_ID);

        let json = serde_json::to_value(StreamFrame::Update { reading }).unwrap();
        assert_eq!(json["type"], "update");
    }

    #[test]
    fn raw_reading_accepts_optional_fields() {
        let raw: RawReading =
            serde_json::from_str(r#"{"ph": 7.1, "turbidity": 55.0}"#).unwrap();
        assert!(raw.timestamp.is_none());
        assert!(raw.device_id.is_none());

        let raw: RawReading = serde_json::from_str(
            r#"{"ph": 7.1, "turbidity": 55.0, "timestamp": 1700000000, "deviceId": "probe-7"}"#,
        )
        .unwrap();
        assert_eq!(raw.device_id.as_deref(), Some("probe-7"));
    }
}
