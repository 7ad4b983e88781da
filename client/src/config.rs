use std::net::SocketAddr;

/// Settings for a headless delivery run
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub server_addr: SocketAddr,
    /// Simulated latency, half applied on send and half on receive.
    pub fake_ping_ms: u64,
    /// Top speed for the autopilot, capped at the vehicle's own limit.
    pub max_speed: f32,
    /// Expected jumps per second while driving.
    pub jump_rate: f32,
    pub seed: Option<u64>,
    /// Disconnect after this many resolved attempts. Runs forever when `None`.
    pub max_deliveries: Option<u32>,
    pub connect_attempts: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            fake_ping_ms: 0,
            max_speed: shared::VEHICLE_CONFIG.max_speed,
            jump_rate: 0.05,
            seed: None,
            max_deliveries: None,
            connect_attempts: 5,
        }
    }
}
