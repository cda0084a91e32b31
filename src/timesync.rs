// Clock synchronization against a remote wall clock: offset (ms) between the
// remote clock and the local monotonic clock.

use crate::clock::Clock;
use crate::error::SyncError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OffsetSource {
  /// Local wall clock minus local monotonic clock.
  Local,
  /// Measured against the remote time endpoint.
  Remote,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeOffset {
  pub offset_ms: f64,
  pub round_trip_ms: Option<f64>,
  pub source: OffsetSource,
}

impl TimeOffset {
  pub fn local(clock: &dyn Clock) -> Self {
    Self {
      offset_ms: clock.naive_offset_ms(),
      round_trip_ms: None,
      source: OffsetSource::Local,
    }
  }

  // t0=local send, t1=local receive (monotonic), remote=remote wall time.
  // The remote stamp is assumed to be taken halfway through the round trip.
  pub fn from_exchange(t0_ms: f64, t1_ms: f64, remote_ms: f64) -> Self {
    let mid = (t0_ms + t1_ms) / 2.0;
    Self {
      offset_ms: remote_ms - mid,
      round_trip_ms: Some((t1_ms - t0_ms).max(0.0)),
      source: OffsetSource::Remote,
    }
  }
}

/// Parses a time endpoint body into milliseconds since the Unix epoch.
///
/// Accepts plain epoch seconds (`1697455920.125`) or an ISO 8601 timestamp
/// (`2023-10-16T11:32:00.125Z`). A timestamp without a zone is read as UTC.
pub fn parse_timestamp_ms(body: &str) -> Result<f64, SyncError> {
  let s = body.trim();
  if let Ok(secs) = s.parse::<f64>() {
    if secs.is_finite() {
      return Ok(secs * 1000.0);
    }
  }
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Ok(dt.timestamp_micros() as f64 / 1000.0);
  }
  if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
    return Ok(ndt.and_utc().timestamp_micros() as f64 / 1000.0);
  }
  Err(SyncError::Parse(s.chars().take(64).collect()))
}

#[async_trait]
pub trait TimeSource: Send + Sync {
  /// Remote wall-clock time, in ms since the Unix epoch.
  async fn fetch_remote_ms(&self) -> Result<f64, SyncError>;
}

#[derive(Debug, Clone)]
pub struct HttpTimeSource {
  url: String,
  client: reqwest::Client,
}

impl HttpTimeSource {
  pub fn new(url: impl Into<String>) -> Result<Self, SyncError> {
    let client = reqwest::Client::builder().build()?;
    Ok(Self::with_client(url, client))
  }

  pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
    Self { url: url.into(), client }
  }

  pub fn url(&self) -> &str {
    &self.url
  }
}

#[async_trait]
impl TimeSource for HttpTimeSource {
  async fn fetch_remote_ms(&self) -> Result<f64, SyncError> {
    let resp = self.client.get(&self.url).send().await?;
    let status = resp.status();
    if !status.is_success() {
      return Err(SyncError::Status(status.as_u16()));
    }
    let body = resp.text().await?;
    parse_timestamp_ms(&body)
  }
}

/// One-shot offset measurement: a single request, no retries.
pub struct ClockSync {
  source: Arc<dyn TimeSource>,
  clock: Arc<dyn Clock>,
  timeout: Duration,
}

impl ClockSync {
  pub fn new(
    source: Arc<dyn TimeSource>,
    clock: Arc<dyn Clock>,
    timeout: Duration,
  ) -> Self {
    Self { source, clock, timeout }
  }

  pub async fn sync(&self) -> Result<TimeOffset, SyncError> {
    let t0 = self.clock.monotonic_ms();
    let remote_ms =
      tokio::time::timeout(self.timeout, self.source.fetch_remote_ms())
        .await
        .map_err(|_| SyncError::Timeout(self.timeout))??;
    let t1 = self.clock.monotonic_ms();
    Ok(TimeOffset::from_exchange(t0, t1, remote_ms))
  }
}
