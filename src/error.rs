use std::time::Duration;

/// Failure of a single clock-sync exchange.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("time request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("time endpoint returned HTTP {0}")]
    Status(u16),
    #[error("time endpoint body is not a timestamp: {0:?}")]
    Parse(String),
    #[error("time request timed out after {0:?}")]
    Timeout(Duration),
}

/// Why a latency reading could not be produced from the player.
#[derive(Debug, thiserror::Error)]
pub enum LatencyError {
    #[error(transparent)]
    Player(#[from] anyhow::Error),
    #[error("player has no program date time for the current position")]
    NoProgramDateTime,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to build time source: {0}")]
    TimeSource(#[from] SyncError),
}
