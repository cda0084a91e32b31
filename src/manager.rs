//! Closed-loop latency controller.
//!
//! While enabled, a ticker samples the player every `tick_interval`, estimates
//! the live latency and nudges the playback rate towards the target. A
//! one-shot clock sync started at construction refines the time offset the
//! estimate is built on.

use crate::clock::{Clock, SystemClock};
use crate::config::{clamp_target_latency, LatencyConfig, MAX_TICK_INTERVAL};
use crate::error::{ConfigError, LatencyError};
use crate::estimator::{current_timestamp, LatencyEstimator};
use crate::player::Player;
use crate::rate::{RateController, SpeedState};
use crate::stats::{LatencyStats, LatencySummary};
use crate::timesync::{ClockSync, HttpTimeSource, TimeOffset, TimeSource};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

struct State {
    enabled: bool,
    target_latency: f64,
    time_offset: TimeOffset,
    estimator: LatencyEstimator,
    controller: RateController,
    stats: LatencyStats,
}

struct Shared {
    player: Arc<dyn Player>,
    clock: Arc<dyn Clock>,
    tick_interval: Duration,
    state: Mutex<State>,
}

impl Shared {
    fn tick(&self) {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if !st.enabled {
            return;
        }
        let snapshot = match self.player.snapshot() {
            Ok(s) => s,
            Err(e) => {
                st.stats.mark_skipped();
                debug!(error = %e, "skipping tick: player unavailable");
                return;
            }
        };
        if snapshot.paused {
            st.stats.mark_skipped();
            return;
        }

        let expected = st.controller.rate();
        if st.controller.reconcile(snapshot.playback_rate) {
            debug!(applied = snapshot.playback_rate, expected, "player rate changed externally");
        }

        let now_ms = self.clock.monotonic_ms();
        let est = match st.estimator.estimate(now_ms, st.time_offset.offset_ms, &snapshot) {
            Ok(est) => est,
            Err(e) => {
                st.stats.mark_skipped();
                debug!(error = %e, "skipping tick");
                return;
            }
        };
        st.stats.on_sample(now_ms, est.latency, est.buffer);

        let prev = st.controller.state();
        if let Some(rate) = st.controller.decide(est.latency, st.target_latency) {
            match self.player.set_playback_rate(rate) {
                Ok(()) => {
                    st.stats.on_speed_change(now_ms);
                    info!(
                        latency = est.latency,
                        target = st.target_latency,
                        buffer = est.buffer,
                        rate,
                        "adjusting playback rate"
                    );
                }
                Err(e) => {
                    st.controller.restore(prev);
                    warn!(error = %e, rate, "player rejected playback rate");
                }
            }
        }

        debug!(
            "{}",
            st.stats.format_status_line(
                now_ms,
                st.target_latency,
                st.controller.state(),
                st.time_offset.source
            )
        );
    }

    fn apply_offset(&self, offset: TimeOffset) {
        {
            let mut st = self.state.lock();
            info!(
                offset_ms = offset.offset_ms,
                previous_ms = st.time_offset.offset_ms,
                round_trip_ms = ?offset.round_trip_ms,
                "clock synchronized"
            );
            st.time_offset = offset;
        }
        self.tick();
    }
}

/// Keeps a live player near its target latency by adjusting playback speed.
///
/// Must be created, enabled and dropped inside a Tokio runtime. Dropping the
/// manager stops the ticker and cancels a clock sync still in flight.
pub struct LatencyManager {
    shared: Arc<Shared>,
    ticker: Option<JoinHandle<()>>,
    sync_task: Option<JoinHandle<()>>,
}

impl LatencyManager {
    /// Builds a manager on the system clock, syncing against `config.time_url`.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn new(player: impl Player, config: LatencyConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let source = HttpTimeSource::new(config.time_url.clone())?;
        Ok(Self::with_parts(
            Arc::new(player),
            Arc::new(SystemClock::new()),
            Arc::new(source),
            config,
        ))
    }

    /// Builds a manager from explicit collaborators. `config` is assumed valid.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn with_parts(
        player: Arc<dyn Player>,
        clock: Arc<dyn Clock>,
        source: Arc<dyn TimeSource>,
        config: LatencyConfig,
    ) -> Self {
        let state = State {
            enabled: false,
            target_latency: clamp_target_latency(Some(config.target_latency)),
            time_offset: TimeOffset::local(clock.as_ref()),
            estimator: LatencyEstimator::new(config.stream_time_offset, config.buffer_margin),
            controller: RateController::new(config.window, config.catchup_rate),
            stats: LatencyStats::new(config.stats_window()),
        };
        let shared = Arc::new(Shared {
            player,
            clock: clock.clone(),
            tick_interval: config.tick_interval(),
            state: Mutex::new(state),
        });

        let sync = ClockSync::new(source, clock, config.sync_timeout());
        let sync_shared = shared.clone();
        let sync_task = tokio::spawn(async move {
            match sync.sync().await {
                Ok(offset) => sync_shared.apply_offset(offset),
                Err(e) => warn!(error = %e, "clock sync failed, staying on local clock"),
            }
        });

        let mut manager = Self { shared, ticker: None, sync_task: Some(sync_task) };
        if config.enabled {
            manager.enable();
        }
        manager
    }

    /// Starts correcting: one tick now, then one every tick interval.
    /// Enabling an enabled manager restarts its ticker.
    ///
    /// # Panics
    ///
    /// Panics if called outside of a Tokio runtime.
    pub fn enable(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        self.shared.state.lock().enabled = true;
        let interval_ms = self.shared.tick_interval.as_millis() as u64;
        info!(interval_ms, "latency control enabled");
        self.shared.tick();

        let shared = self.shared.clone();
        self.ticker = Some(tokio::spawn(async move {
            let period = shared.tick_interval.clamp(Duration::from_millis(1), MAX_TICK_INTERVAL);
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                shared.tick();
            }
        }));
    }

    /// Stops correcting and puts the player back at normal speed.
    pub fn disable(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        let mut st = self.shared.state.lock();
        if st.enabled {
            info!("latency control disabled");
        }
        st.enabled = false;
        st.controller.reset();
        if let Err(e) = self.shared.player.set_playback_rate(1.0) {
            warn!(error = %e, "failed to reset playback rate");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.shared.state.lock().enabled
    }

    pub fn target_latency(&self) -> f64 {
        self.shared.state.lock().target_latency
    }

    /// Sets the target latency in seconds. Values under 2.0, NaN and `None` become 2.0.
    pub fn set_target_latency(&self, target: Option<f64>) {
        self.shared.state.lock().target_latency = clamp_target_latency(target);
    }

    pub fn time_offset(&self) -> TimeOffset {
        self.shared.state.lock().time_offset
    }

    pub fn speed_state(&self) -> SpeedState {
        self.shared.state.lock().controller.state()
    }

    /// Synchronized wall-clock time in seconds since the Unix epoch.
    pub fn current_timestamp(&self) -> f64 {
        let offset_ms = self.shared.state.lock().time_offset.offset_ms;
        current_timestamp(self.shared.clock.monotonic_ms(), offset_ms)
    }

    pub fn current_media_timestamp(&self) -> Result<f64, LatencyError> {
        let snapshot = self.shared.player.snapshot()?;
        self.shared.state.lock().estimator.media_timestamp(&snapshot)
    }

    pub fn current_latency(&self) -> Result<f64, LatencyError> {
        let snapshot = self.shared.player.snapshot()?;
        let st = self.shared.state.lock();
        let est =
            st.estimator.estimate(self.shared.clock.monotonic_ms(), st.time_offset.offset_ms, &snapshot)?;
        Ok(est.latency)
    }

    pub fn current_buffer(&self) -> Result<f64, LatencyError> {
        let snapshot = self.shared.player.snapshot()?;
        Ok(self.shared.state.lock().estimator.buffer(&snapshot))
    }

    pub fn stats(&self) -> LatencySummary {
        let mut guard = self.shared.state.lock();
        let st = &mut *guard;
        st.stats.summary(self.shared.clock.monotonic_ms(), st.controller.state(), st.time_offset.source)
    }
}

impl Drop for LatencyManager {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.take() {
            ticker.abort();
        }
        if let Some(sync_task) = self.sync_task.take() {
            sync_task.abort();
        }
    }
}
