//! Authoritative per-player score bookkeeping
//!
//! The ledger only ever grows during a session: entries are created when a
//! player joins, mutated on successful deliveries and drift reports, and
//! discarded when the player leaves. Nothing is persisted across sessions.

use shared::PlayerScore;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct ScoreLedger {
    scores: HashMap<u32, PlayerScore>,
}

impl ScoreLedger {
    pub fn new() -> Self {
        Self {
            scores: HashMap::new(),
        }
    }

    /// Creates a zeroed entry for the player, replacing any existing one.
    pub fn join(&mut self, player_id: u32) -> &PlayerScore {
        self.scores.insert(player_id, PlayerScore::new());
        &self.scores[&player_id]
    }

    /// Discards the player's entry. Returns false if there was none.
    pub fn leave(&mut self, player_id: &u32) -> bool {
        self.scores.remove(player_id).is_some()
    }

    pub fn get(&self, player_id: &u32) -> Option<&PlayerScore> {
        self.scores.get(player_id)
    }

    /// Applies a successful delivery. `total_tip` includes the base reward,
    /// `total_bonus` is the bonus share of it.
    pub fn record_delivery(
        &mut self,
        player_id: u32,
        total_tip: u32,
        total_bonus: u32,
        time_taken: f32,
    ) -> Option<&PlayerScore> {
        let score = self.scores.get_mut(&player_id)?;
        score.total_score = score.total_score.saturating_add(total_tip);
        score.deliveries_completed = score.deliveries_completed.saturating_add(1);
        score.total_tips = score.total_tips.saturating_add(total_bonus);
        score.best_delivery_time = score.best_delivery_time.min(time_taken);
        Some(score)
    }

    /// Tracks the longest single drift as a running maximum.
    pub fn record_drift(&mut self, player_id: u32, drift_seconds: f32) {
        if let Some(score) = self.scores.get_mut(&player_id) {
            score.longest_drift_time = score.longest_drift_time.max(drift_seconds);
        }
    }
}
