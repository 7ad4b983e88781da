//! Server-side delivery lifecycle
//!
//! The `DeliveryService` is the single source of truth for which delivery
//! each player is currently on. It assigns random destinations, judges
//! success or failure from its own clock when the client reports arrival,
//! accumulates drift and jump bonuses, and keeps the score ledger.
//!
//! Every operation is synchronous and returns the packets that must be sent
//! back to the player. An empty list means the operation was a no-op because
//! its precondition did not hold (no active delivery, duplicate request).
//!
//! The server trusts the client's "I reached the destination" report; only
//! the deadline is checked here.

use crate::ledger::ScoreLedger;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    calculate_base_reward, calculate_delivery_time, delivery_locations, pickup_location,
    DeliveryResult, DeliveryTask, GameConfig, Location, Packet, PlayerScore,
};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Mutable state for one attempt in progress
#[derive(Debug, Clone)]
pub struct ActiveDelivery {
    pub task: DeliveryTask,
    pub start_time: Instant,
    pub drift_bonus: u32,
    pub jump_count: u32,
}

impl ActiveDelivery {
    fn elapsed(&self, now: Instant) -> f32 {
        now.saturating_duration_since(self.start_time).as_secs_f32()
    }
}

pub struct DeliveryService {
    active: HashMap<u32, ActiveDelivery>,
    ledger: ScoreLedger,
    pickup: Location,
    destinations: Vec<Location>,
    rng: StdRng,
}

impl DeliveryService {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Deterministic destination choice, for reproducible sessions and tests.
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            active: HashMap::new(),
            ledger: ScoreLedger::new(),
            pickup: pickup_location(),
            destinations: delivery_locations(),
            rng,
        }
    }

    /// Registers a player with a zeroed score and returns the initial snapshot.
    pub fn join(&mut self, player_id: u32) -> Vec<Packet> {
        let score = self.ledger.join(player_id).clone();
        info!("Player {} joined the delivery roster", player_id);
        vec![Packet::ScoreUpdated { score }]
    }

    /// Drops both the attempt in progress and the score entry.
    pub fn leave(&mut self, player_id: &u32) {
        let had_delivery = self.active.remove(player_id).is_some();
        if self.ledger.leave(player_id) {
            info!(
                "Player {} left (abandoned delivery: {})",
                player_id, had_delivery
            );
        }
    }

    /// Starts a new attempt towards a random destination from the pool.
    pub fn request_new_delivery(&mut self, player_id: u32, now: Instant) -> Vec<Packet> {
        if self.active.contains_key(&player_id) {
            debug!(
                "Player {} already has an active delivery, ignoring request",
                player_id
            );
            return Vec::new();
        }

        let index = self.rng.gen_range(0..self.destinations.len());
        let destination = self.destinations[index].clone();
        debug!("Picked destination [{}] {}", index, destination.name);

        self.assign_delivery(player_id, destination, now)
    }

    /// Starts a new attempt towards the given destination.
    ///
    /// Same guards as `request_new_delivery`: a player must have joined and
    /// must not already be on a delivery.
    pub fn assign_delivery(
        &mut self,
        player_id: u32,
        destination: Location,
        now: Instant,
    ) -> Vec<Packet> {
        if self.active.contains_key(&player_id) {
            return Vec::new();
        }
        if self.ledger.get(&player_id).is_none() {
            warn!("Delivery requested for unknown player {}", player_id);
            return Vec::new();
        }

        let distance = self.pickup.position.distance(&destination.position);
        let height_difference = destination.position.y - self.pickup.position.y;
        let time_limit = calculate_delivery_time(distance);
        let base_reward = calculate_base_reward(distance, height_difference);

        let task = DeliveryTask {
            id: Uuid::new_v4().to_string(),
            pickup_location: self.pickup.clone(),
            delivery_location: destination,
            time_limit,
            base_reward,
            distance_meters: distance.floor() as u32,
        };

        info!(
            "Player {} assigned delivery {} to {} ({}m, {:.0}s, ${})",
            player_id,
            task.id,
            task.delivery_location.name,
            task.distance_meters,
            time_limit,
            base_reward
        );

        self.active.insert(
            player_id,
            ActiveDelivery {
                task: task.clone(),
                start_time: now,
                drift_bonus: 0,
                jump_count: 0,
            },
        );

        vec![Packet::DeliveryStarted { task }]
    }

    /// Repeats the task of the attempt in progress without touching it.
    ///
    /// Lets a client that never saw `DeliveryStarted` pick the attempt up
    /// again. The deadline still runs from the original assignment.
    pub fn resume_delivery(&self, player_id: u32) -> Vec<Packet> {
        match self.active_delivery(&player_id) {
            Some(active) => {
                debug!("Player {} resumed delivery {}", player_id, active.task.id);
                vec![Packet::DeliveryStarted {
                    task: active.task.clone(),
                }]
            }
            None => Vec::new(),
        }
    }

    /// Judges the attempt against the server's own start time and resolves it.
    pub fn complete_delivery(&mut self, player_id: u32, now: Instant) -> Vec<Packet> {
        let Some(active) = self.active.remove(&player_id) else {
            return Vec::new();
        };

        let time_taken = active.elapsed(now);
        let time_limit = active.task.time_limit;
        let time_remaining = time_limit - time_taken;

        if time_remaining <= 0.0 {
            info!(
                "Player {} failed delivery {} ({:.1}s over a {:.0}s limit)",
                player_id, active.task.id, time_taken, time_limit
            );
            return vec![Packet::DeliveryCompleted {
                result: DeliveryResult::failed(time_taken),
            }];
        }

        let speed_bonus = (time_remaining * GameConfig::SPEED_BONUS_MULTIPLIER).floor() as u32;
        let fast_bonus = if time_taken < time_limit * GameConfig::FAST_DELIVERY_THRESHOLD {
            GameConfig::FAST_DELIVERY_BONUS
        } else {
            0
        };
        // Client-reported bonuses are unbounded, so the sums saturate
        let jump_bonus = active.jump_count.saturating_mul(GameConfig::JUMP_BONUS);
        let total_bonus = speed_bonus
            .saturating_add(active.drift_bonus)
            .saturating_add(fast_bonus)
            .saturating_add(jump_bonus);
        let total_tip = active.task.base_reward.saturating_add(total_bonus);

        let result = DeliveryResult {
            success: true,
            time_taken,
            time_remaining,
            base_reward: active.task.base_reward,
            speed_bonus,
            drift_bonus: active.drift_bonus,
            total_tip,
        };

        info!(
            "Player {} completed delivery {} in {:.1}s, tip ${}",
            player_id, active.task.id, time_taken, total_tip
        );

        let mut packets = vec![Packet::DeliveryCompleted { result }];
        if let Some(score) =
            self.ledger
                .record_delivery(player_id, total_tip, total_bonus, time_taken)
        {
            packets.push(Packet::ScoreUpdated {
                score: score.clone(),
            });
        }
        packets
    }

    /// Credits a finished drift to the current attempt.
    pub fn report_drift(&mut self, player_id: u32, drift_seconds: f32) -> Vec<Packet> {
        let Some(active) = self.active.get_mut(&player_id) else {
            return Vec::new();
        };

        let amount = (drift_seconds * GameConfig::DRIFT_BONUS_PER_SECOND).floor() as u32;
        active.drift_bonus = active.drift_bonus.saturating_add(amount);
        self.ledger.record_drift(player_id, drift_seconds);

        debug!(
            "Player {} drifted {:.2}s for ${} (attempt total ${})",
            player_id, drift_seconds, amount, active.drift_bonus
        );
        vec![Packet::DriftBonus { amount }]
    }

    /// Counts a jump; the bonus is paid out at completion.
    pub fn report_jump(&mut self, player_id: u32) -> Vec<Packet> {
        let Some(active) = self.active.get_mut(&player_id) else {
            return Vec::new();
        };

        active.jump_count = active.jump_count.saturating_add(1);
        debug!("Player {} jump #{}", player_id, active.jump_count);
        vec![Packet::JumpBonus]
    }

    /// Fails every attempt whose deadline passed more than `grace` ago.
    ///
    /// Without this the server only notices an expired attempt when the
    /// client reports arrival.
    pub fn sweep_expired(&mut self, now: Instant, grace: Duration) -> Vec<(u32, Packet)> {
        let grace = grace.as_secs_f32();
        let expired: Vec<u32> = self
            .active
            .iter()
            .filter(|(_, active)| active.elapsed(now) > active.task.time_limit + grace)
            .map(|(id, _)| *id)
            .collect();

        let mut outbound = Vec::new();
        for player_id in expired {
            warn!("Sweeping expired delivery for player {}", player_id);
            for packet in self.complete_delivery(player_id, now) {
                outbound.push((player_id, packet));
            }
        }
        outbound
    }

    pub fn has_active_delivery(&self, player_id: &u32) -> bool {
        self.active.contains_key(player_id)
    }

    pub fn active_delivery(&self, player_id: &u32) -> Option<&ActiveDelivery> {
        self.active.get(player_id)
    }

    pub fn player_score(&self, player_id: &u32) -> Option<&PlayerScore> {
        self.ledger.get(player_id)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl Default for DeliveryService {
    fn default() -> Self {
        Self::new()
    }
}
