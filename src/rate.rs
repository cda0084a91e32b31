/// Half-width of the band around the target where speed is left alone, in seconds.
pub const WINDOW: f64 = 0.1;
/// Speed delta applied while catching up.
pub const CATCHUP_RATE: f64 = 0.08;
/// Applied rates closer than this to the requested one count as equal.
pub const RATE_TOLERANCE: f64 = 1e-3;

/// Which playback speed the controller last asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpeedState {
    SpeedDown,
    #[default]
    Normal,
    SpeedUp,
}

impl SpeedState {
    pub fn rate(self, catchup_rate: f64) -> f64 {
        match self {
            SpeedState::SpeedDown => 1.0 - catchup_rate,
            SpeedState::Normal => 1.0,
            SpeedState::SpeedUp => 1.0 + catchup_rate,
        }
    }
}

/// Hysteresis step: the next state, or `None` when nothing needs to change.
///
/// Outside `[target - window, target + window]` the controller moves towards
/// the extreme matching the sign of the error; inside it returns to `Normal`.
/// An extreme never jumps straight to the opposite one: it passes through
/// `Normal` first.
pub fn decide(latency: f64, target: f64, window: f64, state: SpeedState) -> Option<SpeedState> {
    let out_of_window = latency > target + window || latency < target - window;
    let wanted = if !out_of_window {
        SpeedState::Normal
    } else if latency > target {
        SpeedState::SpeedUp
    } else {
        SpeedState::SpeedDown
    };
    let next = match (state, wanted) {
        (SpeedState::SpeedUp, SpeedState::SpeedDown)
        | (SpeedState::SpeedDown, SpeedState::SpeedUp) => SpeedState::Normal,
        _ => wanted,
    };
    (next != state).then_some(next)
}

#[derive(Debug, Clone)]
pub struct RateController {
    window: f64,
    catchup_rate: f64,
    state: SpeedState,
}

impl RateController {
    pub fn new(window: f64, catchup_rate: f64) -> Self {
        Self { window, catchup_rate, state: SpeedState::Normal }
    }

    pub fn state(&self) -> SpeedState {
        self.state
    }

    pub fn rate(&self) -> f64 {
        self.state.rate(self.catchup_rate)
    }

    /// Advances the state machine and returns the playback rate to apply, if any.
    pub fn decide(&mut self, latency: f64, target: f64) -> Option<f64> {
        let next = decide(latency, target, self.window, self.state)?;
        self.state = next;
        Some(next.rate(self.catchup_rate))
    }

    pub fn reset(&mut self) {
        self.state = SpeedState::Normal;
    }

    /// Falls back to `Normal` when the player is not running at the rate last
    /// asked for, so the next decision writes it again. Returns true on reset.
    pub fn reconcile(&mut self, applied_rate: f64) -> bool {
        if (applied_rate - self.rate()).abs() <= RATE_TOLERANCE {
            return false;
        }
        self.state = SpeedState::Normal;
        true
    }

    /// Puts the state back, e.g. after the player refused a rate change.
    pub fn restore(&mut self, state: SpeedState) {
        self.state = state;
    }
}

impl Default for RateController {
    fn default() -> Self {
        Self::new(WINDOW, CATCHUP_RATE)
    }
}
