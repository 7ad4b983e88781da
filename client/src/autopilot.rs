//! Scripted driver standing in for the vehicle seat and physics
//!
//! The autopilot steers towards whatever target the delivery session hands
//! it, accelerating up to the vehicle's top speed. Sharp turns at speed turn
//! into drifts, and it hops now and then, which gives the bonus reporting
//! something to report.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Vec3, VehicleStats, VEHICLE_CONFIG};
use std::f32::consts::{PI, TAU};

const GROUND_Y: f32 = 1.0;
const GRAVITY: f32 = 196.2 * 1.5;
/// Heading error that starts a drift when above half speed.
const DRIFT_ENTRY_ANGLE: f32 = 0.6;
/// Heading error below which a drift straightens out.
const DRIFT_EXIT_ANGLE: f32 = 0.15;

/// What happened to the vehicle during one step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepEvents {
    pub drift_started: bool,
    pub drift_ended: bool,
    pub jumped: bool,
}

pub struct Autopilot {
    position: Vec3,
    heading: f32,
    speed: f32,
    vertical_speed: f32,
    drifting: bool,
    stats: VehicleStats,
    max_speed: f32,
    /// Expected jumps per second while driving.
    jump_rate: f32,
    rng: StdRng,
}

impl Autopilot {
    pub fn new(start: Vec3, max_speed: f32, jump_rate: f32, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Self {
            position: start,
            heading: 0.0,
            speed: 0.0,
            vertical_speed: 0.0,
            drifting: false,
            stats: VEHICLE_CONFIG,
            max_speed: max_speed.min(VEHICLE_CONFIG.max_speed),
            // A rate that is not a real number means no jumps
            jump_rate: if jump_rate.is_finite() {
                jump_rate.max(0.0)
            } else {
                0.0
            },
            rng,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn is_drifting(&self) -> bool {
        self.drifting
    }

    pub fn is_airborne(&self) -> bool {
        self.position.y > GROUND_Y
    }

    /// Advances the vehicle by `dt` seconds towards `target`.
    /// With no target the vehicle rolls to a stop.
    pub fn step(&mut self, dt: f32, target: Option<Vec3>) -> StepEvents {
        let mut events = StepEvents::default();

        match target {
            Some(target) => {
                let desired = (target.z - self.position.z).atan2(target.x - self.position.x);
                let error = wrap_angle(desired - self.heading);

                if !self.drifting
                    && error.abs() > DRIFT_ENTRY_ANGLE
                    && self.speed > self.max_speed * 0.5
                {
                    self.drifting = true;
                    events.drift_started = true;
                } else if self.drifting && error.abs() < DRIFT_EXIT_ANGLE {
                    self.drifting = false;
                    events.drift_ended = true;
                }

                let turn_rate = if self.drifting {
                    self.stats.turn_speed * (1.0 - self.stats.drift_factor)
                } else {
                    self.stats.turn_speed
                };
                let max_turn = turn_rate * dt;
                self.heading = wrap_angle(self.heading + error.clamp(-max_turn, max_turn));

                self.speed = (self.speed + self.stats.acceleration * dt).min(self.max_speed);
            }
            None => {
                if self.drifting {
                    self.drifting = false;
                    events.drift_ended = true;
                }
                self.speed = (self.speed - self.stats.acceleration * dt).max(0.0);
            }
        }

        if !self.is_airborne() && self.speed > 0.0 {
            let chance = (self.jump_rate * dt).clamp(0.0, 1.0) as f64;
            if self.rng.gen_bool(chance) {
                self.vertical_speed = self.stats.jump_power;
                events.jumped = true;
            }
        }

        self.position.x += self.heading.cos() * self.speed * dt;
        self.position.z += self.heading.sin() * self.speed * dt;

        self.position.y += self.vertical_speed * dt;
        if self.position.y > GROUND_Y {
            self.vertical_speed -= GRAVITY * dt;
        } else {
            self.position.y = GROUND_Y;
            self.vertical_speed = self.vertical_speed.max(0.0);
        }

        events
    }
}

fn wrap_angle(angle: f32) -> f32 {
    (angle + PI).rem_euclid(TAU) - PI
}
