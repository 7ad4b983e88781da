use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const PROTOCOL_VERSION: u32 = 1;

/// Zone radius around pickup and delivery points, measured on the XZ plane.
pub const ZONE_RADIUS: f32 = 40.0;
pub const MIN_DELIVERY_TIME: f32 = 30.0;
pub const MAX_DELIVERY_TIME: f32 = 120.0;

/// Scoring and timing rules shared by server and client.
pub struct GameConfig;

impl GameConfig {
    pub const BASE_DELIVERY_REWARD: u32 = 100;
    pub const SPEED_BONUS_MULTIPLIER: f32 = 2.0;
    pub const DRIFT_BONUS_PER_SECOND: f32 = 50.0;
    pub const JUMP_BONUS: u32 = 25;
    pub const FAST_DELIVERY_THRESHOLD: f32 = 0.5;
    pub const FAST_DELIVERY_BONUS: u32 = 200;

    pub const TIMER_WARNING_SECONDS: f32 = 10.0;
    pub const COMBO_WINDOW_SECONDS: f32 = 15.0;
    pub const COMBO_STEP: f32 = 0.25;
    pub const COMBO_MAX: f32 = 3.0;
    /// Drifts shorter than this are not reported.
    pub const MIN_DRIFT_SECONDS: f32 = 0.5;
}

/// Arcade handling numbers for the player vehicle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleStats {
    pub max_speed: f32,
    pub acceleration: f32,
    pub turn_speed: f32,
    pub drift_factor: f32,
    pub jump_power: f32,
}

pub const VEHICLE_CONFIG: VehicleStats = VehicleStats {
    max_speed: 180.0,
    acceleration: 60.0,
    turn_speed: 6.0,
    drift_factor: 0.7,
    jump_power: 80.0,
};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

/// Distance between two points ignoring vertical displacement.
pub fn horizontal_distance(a: &Vec3, b: &Vec3) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Location {
    pub name: String,
    pub position: Vec3,
    pub color: Color,
}

impl Location {
    pub fn new(name: &str, position: Vec3, color: Color) -> Self {
        Self {
            name: name.to_string(),
            position,
            color,
        }
    }
}

const PIZZA_SHOP: (&str, Vec3, Color) = (
    "Tony's Pizza Palace",
    Vec3::new(0.0, 1.0, 0.0),
    Color::new(1.0, 0.2, 0.2),
);

const DELIVERY_SPOTS: [(&str, Vec3, Color); 12] = [
    ("Downtown Office", Vec3::new(400.0, 1.0, 300.0), Color::new(0.2, 0.5, 1.0)),
    ("Beach House", Vec3::new(-500.0, 1.0, 600.0), Color::new(1.0, 1.0, 0.2)),
    ("Mountain Lodge", Vec3::new(600.0, 1.0, -500.0), Color::new(0.6, 0.3, 0.1)),
    ("Skyscraper Penthouse", Vec3::new(700.0, 1.0, 200.0), Color::new(0.8, 0.8, 0.8)),
    ("Suburb Villa", Vec3::new(-400.0, 1.0, -400.0), Color::new(0.2, 1.0, 0.5)),
    ("Industrial District", Vec3::new(800.0, 1.0, -100.0), Color::new(0.5, 0.5, 0.5)),
    ("Park Pavilion", Vec3::new(-600.0, 1.0, 300.0), Color::new(0.4, 1.0, 0.4)),
    ("Harbor Warehouse", Vec3::new(-700.0, 1.0, -600.0), Color::new(0.2, 0.3, 0.6)),
    ("Airport Terminal", Vec3::new(500.0, 1.0, 700.0), Color::new(1.0, 0.5, 0.0)),
    ("Shopping Mall", Vec3::new(300.0, 1.0, 500.0), Color::new(1.0, 0.2, 0.8)),
    ("Sports Stadium", Vec3::new(-300.0, 1.0, -700.0), Color::new(0.8, 0.2, 0.2)),
    ("Tech Campus", Vec3::new(450.0, 1.0, 650.0), Color::new(0.5, 1.0, 1.0)),
];

/// The single fixed pickup point.
pub fn pickup_location() -> Location {
    let (name, position, color) = PIZZA_SHOP;
    Location::new(name, position, color)
}

/// The candidate pool for delivery destinations.
pub fn delivery_locations() -> Vec<Location> {
    DELIVERY_SPOTS
        .iter()
        .map(|(name, position, color)| Location::new(name, *position, *color))
        .collect()
}

/// Time allowed for a delivery: 10 seconds per 100 units, clamped to [30, 120].
pub fn calculate_delivery_time(distance: f32) -> f32 {
    (distance / 100.0 * 10.0).clamp(MIN_DELIVERY_TIME, MAX_DELIVERY_TIME)
}

pub fn calculate_base_reward(distance: f32, height_difference: f32) -> u32 {
    let distance_reward = (distance / 10.0).floor() as u32;
    let height_reward = (height_difference.abs() / 5.0).floor() as u32;
    GameConfig::BASE_DELIVERY_REWARD + distance_reward + height_reward
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeliveryTask {
    pub id: String,
    pub pickup_location: Location,
    pub delivery_location: Location,
    /// Seconds, always within [MIN_DELIVERY_TIME, MAX_DELIVERY_TIME].
    pub time_limit: f32,
    pub base_reward: u32,
    pub distance_meters: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeliveryResult {
    pub success: bool,
    pub time_taken: f32,
    pub time_remaining: f32,
    pub base_reward: u32,
    pub speed_bonus: u32,
    pub drift_bonus: u32,
    pub total_tip: u32,
}

impl DeliveryResult {
    /// Outcome of an attempt that ran past its deadline. Everything but the elapsed time is zero.
    pub fn failed(time_taken: f32) -> Self {
        Self {
            success: false,
            time_taken,
            time_remaining: 0.0,
            base_reward: 0,
            speed_bonus: 0,
            drift_bonus: 0,
            total_tip: 0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct PlayerScore {
    pub total_score: u32,
    pub deliveries_completed: u32,
    pub total_tips: u32,
    /// `f32::INFINITY` until the first successful delivery.
    pub best_delivery_time: f32,
    pub longest_drift_time: f32,
}

impl PlayerScore {
    pub fn new() -> Self {
        Self {
            total_score: 0,
            deliveries_completed: 0,
            total_tips: 0,
            best_delivery_time: f32::INFINITY,
            longest_drift_time: 0.0,
        }
    }
}

impl Default for PlayerScore {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum GameState {
    Waiting,
    Active,
    DeliveryComplete,
    GameOver,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // Client -> Server
    Connect {
        client_version: u32,
    },
    Heartbeat,
    Disconnect,
    RequestNewDelivery,
    /// Asks the server to repeat the task already in progress, if any.
    ResumeDelivery,
    CompleteDelivery,
    ReportDrift {
        drift_seconds: f32,
    },
    ReportJump,

    // Server -> Client
    Connected {
        client_id: u32,
    },
    Disconnected {
        reason: String,
    },
    DeliveryStarted {
        task: DeliveryTask,
    },
    DeliveryCompleted {
        result: DeliveryResult,
    },
    ScoreUpdated {
        score: PlayerScore,
    },
    DriftBonus {
        amount: u32,
    },
    JumpBonus,
    /// Part of the contract; the server does not send it.
    GameStateChanged {
        state: GameState,
    },
}

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Failed to encode or decode packet: {0}")]
    Codec(#[from] bincode::Error),

    #[error("Invalid payload: {0}")]
    InvalidPayload(&'static str),
}

pub type Result<T> = std::result::Result<T, ProtocolError>;

pub fn encode(packet: &Packet) -> Result<Vec<u8>> {
    Ok(bincode::serialize(packet)?)
}

/// Decodes one datagram. Payloads that deserialize but carry nonsense are rejected here
/// so receivers only ever see well-formed packets.
pub fn decode(bytes: &[u8]) -> Result<Packet> {
    let packet: Packet = bincode::deserialize(bytes)?;
    if let Packet::ReportDrift { drift_seconds } = &packet {
        if !drift_seconds.is_finite() {
            return Err(ProtocolError::InvalidPayload("drift seconds must be finite"));
        }
    }
    Ok(packet)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_delivery_time_is_clamped() {
        assert_approx_eq!(calculate_delivery_time(100.0), 30.0);
        assert_approx_eq!(calculate_delivery_time(800.0), 80.0);
        assert_approx_eq!(calculate_delivery_time(2000.0), 120.0);
        assert_approx_eq!(calculate_delivery_time(0.0), 30.0);
    }

    #[test]
    fn test_delivery_time_within_bounds_for_pool() {
        let shop = pickup_location();
        for location in delivery_locations() {
            let limit = calculate_delivery_time(shop.position.distance(&location.position));
            assert!((MIN_DELIVERY_TIME..=MAX_DELIVERY_TIME).contains(&limit));
        }
    }

    #[test]
    fn test_base_reward() {
        assert_eq!(calculate_base_reward(500.0, 0.0), 150);
        assert_eq!(calculate_base_reward(500.0, 50.0), 160);
        assert_eq!(calculate_base_reward(500.0, -50.0), 160);
        assert_eq!(calculate_base_reward(19.9, 4.9), 101);
    }

    #[test]
    fn test_horizontal_distance_ignores_height() {
        let a = Vec3::new(0.0, 0.0, 0.0);
        let b = Vec3::new(30.0, 500.0, 40.0);
        assert_approx_eq!(horizontal_distance(&a, &b), 50.0);
        assert!(a.distance(&b) > 500.0);
    }

    #[test]
    fn test_location_table() {
        let pool = delivery_locations();
        assert_eq!(pool.len(), 12);
        assert_eq!(pool[0].name, "Downtown Office");
        assert_approx_eq!(pickup_location().position.distance(&pool[0].position), 500.0);
    }

    #[test]
    fn test_initial_player_score() {
        let score = PlayerScore::new();
        assert_eq!(score.total_score, 0);
        assert_eq!(score.deliveries_completed, 0);
        assert!(score.best_delivery_time.is_infinite());
        assert_eq!(score.longest_drift_time, 0.0);
    }

    #[test]
    fn test_packet_serialization_delivery_started() {
        let task = DeliveryTask {
            id: "abc".to_string(),
            pickup_location: pickup_location(),
            delivery_location: delivery_locations()[3].clone(),
            time_limit: 72.8,
            base_reward: 172,
            distance_meters: 728,
        };
        let bytes = encode(&Packet::DeliveryStarted { task: task.clone() }).unwrap();

        match decode(&bytes).unwrap() {
            Packet::DeliveryStarted { task: decoded } => assert_eq!(decoded, task),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_decode_rejects_non_finite_drift() {
        let bytes = encode(&Packet::ReportDrift {
            drift_seconds: f32::NAN,
        })
        .unwrap();
        assert!(matches!(
            decode(&bytes),
            Err(ProtocolError::InvalidPayload(_))
        ));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode(&[0xff, 0xff, 0xff, 0xff, 0x01]),
            Err(ProtocolError::Codec(_))
        ));
        assert!(decode(&[]).is_err());
    }
}
