//! # Gateway REST Client
//!
//! A thin asynchronous wrapper around `reqwest` for the gateway's REST
//! surface. These calls are plain request/response and do not depend on
//! the state of any live subscription.

use anyhow::bail;
use reqwest::StatusCode;
use url::Url;

use crate::core::reading::{
    AcceptedReading, ClearSummary, GatewayStatus, LatestReading, RawReading, Reading, RecentBatch,
    round2,
};

/// Asynchronous client for the gateway REST endpoints.
pub struct ApiClient {
    /// The underlying HTTP client.
    inner: reqwest::Client,
    /// The absolute base URL of the gateway (e.g. "http://localhost:5000").
    base_url: Url,
}

impl ApiClient {
    /// Creates a client for the given gateway base URL.
    ///
    /// # Errors
    /// Returns an error if the URL is not a valid absolute URL.
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        Ok(Self {
            inner: reqwest::Client::new(),
            base_url,
        })
    }

    /// Fetches the most recent accepted reading. An empty history is not
    /// an error and maps to `None`.
    pub async fn latest(&self) -> anyhow::Result<Option<Reading>> {
        let url = self.base_url.join("/api/readings/latest")?;
        let response = self.inner.get(url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            bail!("latest query failed: HTTP {}", response.status());
        }

        let body: LatestReading = response.json().await?;
        Ok(Some(body.reading))
    }

    /// Fetches up to `limit` recent readings, newest-first.
    pub async fn recent(&self, limit: usize) -> anyhow::Result<Vec<Reading>> {
        let url = self.base_url.join("/api/readings")?;
        let response = self
            .inner
            .get(url)
            .query(&[("limit", limit)])
            .send()
            .await?;

        if !response.status().is_success() {
            bail!("recent query failed: HTTP {}", response.status());
        }

        let body: RecentBatch = response.json().await?;
        Ok(body.readings)
    }

    /// Fetches the gateway status snapshot.
    pub async fn status(&self) -> anyhow::Result<GatewayStatus> {
        let url = self.base_url.join("/api/readings/status")?;
        let response = self.inner.get(url).send().await?;

        if !response.status().is_success() {
            bail!("status query failed: HTTP {}", response.status());
        }

        Ok(response.json().await?)
    }

    /// Submits a reading through the write path. Values are rounded to
    /// the gateway's two-decimal precision before sending.
    pub async fn submit(&self, ph: f64, turbidity: f64) -> anyhow::Result<AcceptedReading> {
        self.submit_raw(RawReading {
            ph: round2(ph),
            turbidity: round2(turbidity),
            timestamp: None,
            device_id: None,
        })
        .await
    }

    /// Submits a fully specified raw reading, device label included.
    pub async fn submit_raw(&self, raw: RawReading) -> anyhow::Result<AcceptedReading> {
        let url = self.base_url.join("/api/readings")?;
        let response = self.inner.post(url).json(&raw).send().await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            bail!("submission rejected: HTTP {} {}", status, detail);
        }

        Ok(response.json().await?)
    }

    /// Administrative clear of the gateway's in-memory history. Returns
    /// the number of readings removed.
    pub async fn clear(&self) -> anyhow::Result<usize> {
        let url = self.base_url.join("/api/readings")?;
        let response = self.inner.delete(url).send().await?;

        if !response.status().is_success() {
            bail!("clear failed: HTTP {}", response.status());
        }

        let body: ClearSummary = response.json().await?;
        Ok(body.cleared_count)
    }
}
