use crate::rate::SpeedState;
use crate::timesync::OffsetSource;
use std::collections::VecDeque;
use std::time::Duration;

/// Rolling window over timestamped samples.
/// Timestamps are monotonic milliseconds from the manager's clock.
#[derive(Debug)]
pub struct RollingWindow {
    window_ms: f64,
    history: VecDeque<(f64, f64)>,
    sum: f64,
}

impl RollingWindow {
    pub fn new(window: Duration) -> Self {
        Self { window_ms: window.as_secs_f64() * 1000.0, history: VecDeque::new(), sum: 0.0 }
    }

    pub fn record(&mut self, now_ms: f64, value: f64) {
        self.history.push_back((now_ms, value));
        self.sum += value;
        self.prune(now_ms);
    }

    pub fn total(&mut self, now_ms: f64) -> f64 {
        self.prune(now_ms);
        self.sum
    }

    pub fn mean(&mut self, now_ms: f64) -> Option<f64> {
        self.prune(now_ms);
        if self.history.is_empty() { return None; }
        Some(self.sum / self.history.len() as f64)
    }

    fn prune(&mut self, now_ms: f64) {
        while let Some(&(t, v)) = self.history.front() {
            if now_ms - t > self.window_ms {
                self.sum -= v;
                self.history.pop_front();
            } else {
                break;
            }
        }
        if self.history.is_empty() {
            self.sum = 0.0;
        }
    }
}

/// Point-in-time view of the controller, for embedding callers.
#[derive(Debug, Clone, PartialEq)]
pub struct LatencySummary {
    pub latency: Option<f64>,
    pub buffer: Option<f64>,
    pub mean_latency: Option<f64>,
    pub mean_buffer: Option<f64>,
    pub speed_changes: u64,
    pub ticks: u64,
    pub skipped_ticks: u64,
    pub speed: SpeedState,
    pub offset_source: OffsetSource,
}

// Collects rolling statistics over controller ticks.
#[derive(Debug)]
pub struct LatencyStats {
    ticks: u64,
    skipped_ticks: u64,
    last_latency: Option<f64>,
    last_buffer: Option<f64>,
    latency_mean: RollingWindow,
    buffer_mean: RollingWindow,
    speed_changes: RollingWindow,
}

impl LatencyStats {
    pub fn new(window: Duration) -> Self {
        Self {
            ticks: 0,
            skipped_ticks: 0,
            last_latency: None,
            last_buffer: None,
            latency_mean: RollingWindow::new(window),
            buffer_mean: RollingWindow::new(window),
            speed_changes: RollingWindow::new(window),
        }
    }

    pub fn on_sample(&mut self, now_ms: f64, latency: f64, buffer: f64) {
        self.ticks += 1;
        self.last_latency = Some(latency);
        self.last_buffer = Some(buffer);
        self.latency_mean.record(now_ms, latency);
        self.buffer_mean.record(now_ms, buffer);
    }

    pub fn on_speed_change(&mut self, now_ms: f64) {
        self.speed_changes.record(now_ms, 1.0);
    }

    pub fn mark_skipped(&mut self) { self.skipped_ticks += 1; }

    pub fn summary(
        &mut self,
        now_ms: f64,
        speed: SpeedState,
        offset_source: OffsetSource,
    ) -> LatencySummary {
        LatencySummary {
            latency: self.last_latency,
            buffer: self.last_buffer,
            mean_latency: self.latency_mean.mean(now_ms),
            mean_buffer: self.buffer_mean.mean(now_ms),
            speed_changes: self.speed_changes.total(now_ms).round() as u64,
            ticks: self.ticks,
            skipped_ticks: self.skipped_ticks,
            speed,
            offset_source,
        }
    }

    pub fn format_status_line(
        &mut self,
        now_ms: f64,
        target: f64,
        speed: SpeedState,
        offset_source: OffsetSource,
    ) -> String {
        let s = self.summary(now_ms, speed, offset_source);
        format!(
            "Lat: {:.3} s (avg {:.3}) | Target: {:.2} s | Buf: {:.2} s (avg {:.2}) | \
             Speed: {:?} | Changes: {} | Ticks: {} (skipped {}) | Clock: {:?}",
            s.latency.unwrap_or(f64::NAN),
            s.mean_latency.unwrap_or(f64::NAN),
            target,
            s.buffer.unwrap_or(f64::NAN),
            s.mean_buffer.unwrap_or(f64::NAN),
            s.speed,
            s.speed_changes,
            s.ticks,
            s.skipped_ticks,
            s.offset_source,
        )
    }
}
