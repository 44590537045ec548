//! # AquaStream Telemetry Library
//!
//! Shared building blocks for the AquaStream water-quality gateway:
//!
//! - `core` — the ingestion pipeline itself: reading model and wire types,
//!   the validation gate, the bounded history buffer, the pH trend
//!   estimator, the broadcast hub and the coordinating service that owns
//!   all shared state.
//! - `connections` (feature `connections`) — the PostgreSQL collaborator
//!   that durably stores accepted readings, insert-only and best-effort.
//! - `client` (feature `client`) — the dashboard side: a REST client for
//!   the query/write surface and a reconnecting WebSocket subscriber with
//!   typed life-cycle events.

// Declare the modules to re-export
pub mod core;

#[cfg(feature = "connections")]
pub mod connections;

#[cfg(feature = "client")]
pub mod client;

// Re-export the types most callers need directly.
pub use crate::core::hub::BroadcastHub;
pub use crate::core::reading::{
    AcceptedReading, ClearSummary, GatewayStatus, LatestReading, RawReading, Reading, RecentBatch,
    StreamFrame, DEFAULT_DEVICE_ID,
};
pub use crate::core::service::TelemetryService;
pub use crate::core::validator::ValidationError;
