pub mod clock;
pub mod config;
pub mod error;
pub mod estimator;
pub mod manager;
pub mod player;
pub mod rate;
pub mod stats;
pub mod timesync;

pub use config::LatencyConfig;
pub use error::{ConfigError, LatencyError, SyncError};
pub use manager::LatencyManager;
pub use player::{BufferedRange, Player, PlayerSnapshot};
pub use rate::SpeedState;
