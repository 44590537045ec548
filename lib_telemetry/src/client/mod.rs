//! Dashboard-side access to the gateway: a REST client for the
//! query/write surface and a reconnecting live subscriber for the
//! WebSocket stream. The two are independent; REST calls work while the
//! subscription is down or reconnecting.

pub mod api;
pub mod subscriber;

pub use api::ApiClient;
pub use subscriber::{ConnectionState, LiveSubscriber, SubscriberConfig, SubscriberEvent};
