//! Controller configuration.
//!
//! Every field has a default, so an empty TOML document is a valid config.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lowest target latency the controller will aim for, in seconds.
pub const MIN_TARGET_LATENCY: f64 = 2.0;

/// Longest accepted tick interval.
pub const MAX_TICK_INTERVAL: Duration = Duration::from_secs(3600);

/// Clamps a requested target latency to the floor.
///
/// Unset, zero, NaN and negative requests all land on [`MIN_TARGET_LATENCY`].
pub fn clamp_target_latency(target: Option<f64>) -> f64 {
    let t = match target {
        Some(t) if !t.is_nan() => t,
        _ => 0.0,
    };
    t.max(MIN_TARGET_LATENCY)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyConfig {
    /// Start correcting immediately after construction
    #[serde(default)]
    pub enabled: bool,

    /// Desired live latency in seconds (clamped to >= 2.0)
    #[serde(default = "default_target_latency")]
    pub target_latency: f64,

    /// Added to the program date time of the playing position, in seconds
    #[serde(default)]
    pub stream_time_offset: f64,

    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Half-width of the no-correction band around the target, in seconds
    #[serde(default = "default_window")]
    pub window: f64,

    /// Relative speed change while catching up
    #[serde(default = "default_catchup_rate")]
    pub catchup_rate: f64,

    /// Gap between buffered ranges still treated as contiguous, in seconds
    #[serde(default = "default_buffer_margin")]
    pub buffer_margin: f64,

    /// Endpoint returning the current time as epoch seconds or ISO 8601
    #[serde(default = "default_time_url")]
    pub time_url: String,

    #[serde(default = "default_sync_timeout_ms")]
    pub sync_timeout_ms: u64,

    /// Width of the rolling statistics window
    #[serde(default = "default_stats_window_ms")]
    pub stats_window_ms: u64,
}

fn default_target_latency() -> f64 {
    MIN_TARGET_LATENCY
}

fn default_tick_interval_ms() -> u64 {
    500
}

fn default_window() -> f64 {
    crate::rate::WINDOW
}

fn default_catchup_rate() -> f64 {
    crate::rate::CATCHUP_RATE
}

fn default_buffer_margin() -> f64 {
    crate::estimator::DEFAULT_BUFFER_MARGIN
}

fn default_time_url() -> String {
    "https://time.akamai.com/?iso".to_string()
}

fn default_sync_timeout_ms() -> u64 {
    5_000
}

fn default_stats_window_ms() -> u64 {
    10_000
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_latency: default_target_latency(),
            stream_time_offset: 0.0,
            tick_interval_ms: default_tick_interval_ms(),
            window: default_window(),
            catchup_rate: default_catchup_rate(),
            buffer_margin: default_buffer_margin(),
            time_url: default_time_url(),
            sync_timeout_ms: default_sync_timeout_ms(),
            stats_window_ms: default_stats_window_ms(),
        }
    }
}

impl LatencyConfig {
    /// Parses and validates a TOML document. The target latency is clamped, not rejected.
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let mut config: LatencyConfig = toml::from_str(s)?;
        config.target_latency = clamp_target_latency(Some(config.target_latency));
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 || self.tick_interval() > MAX_TICK_INTERVAL {
            return Err(ConfigError::Invalid(format!(
                "tick_interval_ms must be in 1..={}, got {}",
                MAX_TICK_INTERVAL.as_millis(),
                self.tick_interval_ms
            )));
        }
        if !self.window.is_finite() || self.window < 0.0 {
            return Err(ConfigError::Invalid(format!("window must be >= 0, got {}", self.window)));
        }
        if !(self.catchup_rate > 0.0 && self.catchup_rate < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "catchup_rate must be in (0, 1), got {}",
                self.catchup_rate
            )));
        }
        if !self.buffer_margin.is_finite() || self.buffer_margin < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "buffer_margin must be >= 0, got {}",
                self.buffer_margin
            )));
        }
        if !self.stream_time_offset.is_finite() {
            return Err(ConfigError::Invalid("stream_time_offset must be finite".into()));
        }
        if !self.time_url.starts_with("http://") && !self.time_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "time_url must start with http:// or https://, got: {:?}",
                self.time_url
            )));
        }
        if self.sync_timeout_ms == 0 {
            return Err(ConfigError::Invalid("sync_timeout_ms must be > 0".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn sync_timeout(&self) -> Duration {
        Duration::from_millis(self.sync_timeout_ms)
    }

    pub fn stats_window(&self) -> Duration {
        Duration::from_millis(self.stats_window_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamps_target_latency() {
        assert_eq!(clamp_target_latency(Some(5.0)), 5.0);
        assert_eq!(clamp_target_latency(Some(1.0)), 2.0);
        assert_eq!(clamp_target_latency(Some(0.0)), 2.0);
        assert_eq!(clamp_target_latency(None), 2.0);
        assert_eq!(clamp_target_latency(Some(-3.0)), 2.0);
        assert_eq!(clamp_target_latency(Some(f64::NAN)), 2.0);
        assert_eq!(clamp_target_latency(Some(2.0)), 2.0);
    }

    #[test]
    fn empty_document_uses_defaults() {
        let c = LatencyConfig::from_toml_str("").unwrap();
        assert!(!c.enabled);
        assert_eq!(c.target_latency, 2.0);
        assert_eq!(c.tick_interval(), Duration::from_millis(500));
        assert_eq!(c.window, 0.1);
        assert_eq!(c.catchup_rate, 0.08);
        assert_eq!(c.buffer_margin, 0.04);
        assert_eq!(c.sync_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn parses_overrides_and_clamps_target() {
        let c = LatencyConfig::from_toml_str(
            r#"
            enabled = true
            target_latency = 0.5
            stream_time_offset = -1.25
            time_url = "http://127.0.0.1:9000/time"
            "#,
        )
        .unwrap();
        assert!(c.enabled);
        assert_eq!(c.target_latency, 2.0);
        assert_eq!(c.stream_time_offset, -1.25);
        assert_eq!(c.time_url, "http://127.0.0.1:9000/time");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            LatencyConfig::from_toml_str("catchup_rate = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            LatencyConfig::from_toml_str("tick_interval_ms = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            LatencyConfig::from_toml_str("tick_interval_ms = 3600001"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(LatencyConfig::from_toml_str("tick_interval_ms = 3600000").is_ok());
        let huge = LatencyConfig { tick_interval_ms: u64::MAX, ..Default::default() };
        assert!(matches!(huge.validate(), Err(ConfigError::Invalid(_))));
        assert!(matches!(
            LatencyConfig::from_toml_str("time_url = \"ftp://x\""),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            LatencyConfig::from_toml_str("window = \"wide\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
