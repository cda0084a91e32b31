//! Live latency and forward buffer from a player snapshot.
//!
//! Latency is the synchronized "now" minus the absolute time of the media
//! position being played. Positive latency means playback lags the live edge.

use crate::error::LatencyError;
use crate::player::{BufferedRange, PlayerSnapshot};
use chrono::{DateTime, Utc};

/// Ranges closer than this are treated as one contiguous range.
pub const DEFAULT_BUFFER_MARGIN: f64 = 0.04;

/// Synchronized absolute time, in seconds since the Unix epoch.
pub fn current_timestamp(monotonic_now_ms: f64, time_offset_ms: f64) -> f64 {
    (monotonic_now_ms + time_offset_ms) / 1000.0
}

/// Absolute time of the current media position, in seconds since the Unix epoch.
pub fn current_media_timestamp(
    program_date_time: DateTime<Utc>,
    stream_time_offset: f64,
) -> f64 {
    program_date_time.timestamp_micros() as f64 / 1_000_000.0 + stream_time_offset
}

/// Contiguous buffer ahead of `current_time`, in seconds.
///
/// A hole before the buffered data reaches past `current_time` means there is
/// no usable forward buffer, whatever later ranges hold.
pub fn current_buffer(current_time: f64, buffered: &[BufferedRange], margin: f64) -> f64 {
    let mut buffer_until = current_time;
    for range in buffered.iter().filter(|r| r.end > current_time) {
        if range.start - margin <= buffer_until {
            buffer_until = range.end;
        } else {
            return 0.0;
        }
    }
    buffer_until - current_time
}

/// Static parameters of the estimate; everything else is read per call.
#[derive(Debug, Clone, Copy)]
pub struct LatencyEstimator {
    pub stream_time_offset: f64,
    pub buffer_margin: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub timestamp: f64,
    pub media_timestamp: f64,
    pub latency: f64,
    pub buffer: f64,
}

impl LatencyEstimator {
    pub fn new(stream_time_offset: f64, buffer_margin: f64) -> Self {
        Self { stream_time_offset, buffer_margin }
    }

    pub fn media_timestamp(&self, snapshot: &PlayerSnapshot) -> Result<f64, LatencyError> {
        let pdt = snapshot.program_date_time.ok_or(LatencyError::NoProgramDateTime)?;
        Ok(current_media_timestamp(pdt, self.stream_time_offset))
    }

    pub fn buffer(&self, snapshot: &PlayerSnapshot) -> f64 {
        current_buffer(snapshot.current_time, &snapshot.buffered, self.buffer_margin)
    }

    pub fn estimate(
        &self,
        monotonic_now_ms: f64,
        time_offset_ms: f64,
        snapshot: &PlayerSnapshot,
    ) -> Result<Estimate, LatencyError> {
        let timestamp = current_timestamp(monotonic_now_ms, time_offset_ms);
        let media_timestamp = self.media_timestamp(snapshot)?;
        Ok(Estimate {
            timestamp,
            media_timestamp,
            latency: timestamp - media_timestamp,
            buffer: self.buffer(snapshot),
        })
    }
}

impl Default for LatencyEstimator {
    fn default() -> Self {
        Self::new(0.0, DEFAULT_BUFFER_MARGIN)
    }
}
