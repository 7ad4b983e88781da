//! Server runtime settings

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub max_clients: usize,
    pub tick_duration: Duration,
    /// Clients silent for longer than this are treated as having left.
    pub client_timeout: Duration,
    /// Fixed RNG seed for destination choice. None draws from OS entropy.
    pub seed: Option<u64>,
    /// Actively fail attempts whose deadline has long passed. Off by default,
    /// in which case an expired attempt is only judged when the client reports arrival.
    pub sweep_expired: bool,
    pub sweep_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            max_clients: 32,
            tick_duration: Duration::from_millis(100),
            client_timeout: Duration::from_secs(5),
            seed: None,
            sweep_expired: false,
            sweep_grace: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub fn with_addr(addr: &str) -> Self {
        Self {
            addr: addr.to_string(),
            ..Self::default()
        }
    }
}
