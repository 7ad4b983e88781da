//! Drift timing
//!
//! Measures how long each drift lasts so the finished drift can be reported
//! to the server in seconds. The local running bonus is for display only;
//! the server computes the credited amount itself.

use shared::GameConfig;
use std::time::Instant;

#[derive(Debug, Clone, Default)]
pub struct DriftTracker {
    drift_start: Option<Instant>,
    total_drift_bonus: u32,
}

impl DriftTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_drift(&mut self, now: Instant) {
        if self.drift_start.is_none() {
            self.drift_start = Some(now);
        }
    }

    /// Ends the current drift. Returns its length in seconds when it was long
    /// enough to be worth reporting.
    pub fn end_drift(&mut self, now: Instant) -> Option<f32> {
        let start = self.drift_start.take()?;
        let duration = now.saturating_duration_since(start).as_secs_f32();
        self.total_drift_bonus = self.total_drift_bonus.saturating_add(Self::bonus_for(duration));

        (duration >= GameConfig::MIN_DRIFT_SECONDS).then_some(duration)
    }

    pub fn is_drifting(&self) -> bool {
        self.drift_start.is_some()
    }

    /// Bonus the drift in progress would be worth if it ended now.
    pub fn current_drift_score(&self, now: Instant) -> u32 {
        self.drift_start
            .map(|start| Self::bonus_for(now.saturating_duration_since(start).as_secs_f32()))
            .unwrap_or(0)
    }

    pub fn total_drift_bonus(&self) -> u32 {
        self.total_drift_bonus
    }

    pub fn reset_total_bonus(&mut self) {
        self.total_drift_bonus = 0;
    }

    fn bonus_for(seconds: f32) -> u32 {
        (seconds * GameConfig::DRIFT_BONUS_PER_SECOND).floor() as u32
    }
}
