//! Client-local session score with a combo multiplier
//!
//! This is display-only. The server ledger's `total_score` is the
//! authoritative number; the session score here is computed independently
//! and scaled by a multiplier that rewards back-to-back deliveries, so the
//! two are expected to differ.

use shared::GameConfig;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct ScoreTracker {
    session_score: u32,
    delivery_count: u32,
    combo_multiplier: f32,
    last_delivery_time: Option<Instant>,
}

impl ScoreTracker {
    pub fn new() -> Self {
        Self {
            session_score: 0,
            delivery_count: 0,
            combo_multiplier: 1.0,
            last_delivery_time: None,
        }
    }

    /// Adds points scaled by the current multiplier and returns what was added.
    pub fn add_score(&mut self, points: u32) -> u32 {
        let scored = (points as f32 * self.combo_multiplier).floor() as u32;
        self.session_score += scored;
        scored
    }

    /// Updates the combo after an attempt resolves.
    ///
    /// A success within the combo window of the previous success raises the
    /// multiplier; a slower success or any failure resets it.
    pub fn record_delivery(&mut self, successful: bool, now: Instant) {
        if !successful {
            self.combo_multiplier = 1.0;
            return;
        }

        self.delivery_count += 1;
        if let Some(last) = self.last_delivery_time {
            let gap = now.saturating_duration_since(last).as_secs_f32();
            if gap < GameConfig::COMBO_WINDOW_SECONDS {
                self.combo_multiplier =
                    (self.combo_multiplier + GameConfig::COMBO_STEP).min(GameConfig::COMBO_MAX);
            } else {
                self.combo_multiplier = 1.0;
            }
        }
        self.last_delivery_time = Some(now);
    }

    pub fn session_score(&self) -> u32 {
        self.session_score
    }

    pub fn delivery_count(&self) -> u32 {
        self.delivery_count
    }

    pub fn combo_multiplier(&self) -> f32 {
        self.combo_multiplier
    }
}

impl Default for ScoreTracker {
    fn default() -> Self {
        Self::new()
    }
}
