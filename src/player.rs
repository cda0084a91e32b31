use chrono::{DateTime, Utc};

/// One contiguous buffered interval, in media seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferedRange {
    pub start: f64,
    pub end: f64,
}

impl BufferedRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }
}

/// Player state read once per tick. Never cached across ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub paused: bool,
    pub current_time: f64,
    pub program_date_time: Option<DateTime<Utc>>,
    /// Ordered by `start`.
    pub buffered: Vec<BufferedRange>,
    pub playback_rate: f64,
}

/// The read/write surface the controller needs from an already-playing player.
///
/// Implementations are owned by the host and usually wrap a handle with its
/// own interior mutability, hence `&self` on the setter.
pub trait Player: Send + Sync + 'static {
    fn snapshot(&self) -> anyhow::Result<PlayerSnapshot>;
    fn set_playback_rate(&self, rate: f64) -> anyhow::Result<()>;
}

impl<P: Player + ?Sized> Player for std::sync::Arc<P> {
    fn snapshot(&self) -> anyhow::Result<PlayerSnapshot> {
        (**self).snapshot()
    }

    fn set_playback_rate(&self, rate: f64) -> anyhow::Result<()> {
        (**self).set_playback_rate(rate)
    }
}
