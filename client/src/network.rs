use crate::autopilot::Autopilot;
use crate::config::ClientConfig;
use crate::game::DeliverySession;
use log::{debug, error, info, warn};
use shared::{decode, encode, pickup_location, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::{interval, sleep};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(1);
/// Upper bound on a single simulation step after a stall.
const MAX_FRAME_SECONDS: f32 = 0.1;

pub struct Client {
    socket: UdpSocket,
    config: ClientConfig,
    client_id: Option<u32>,
    connected: bool,
    finished: bool,
    connect_attempts: u32,

    session: DeliverySession,
    autopilot: Autopilot,
    last_frame: Instant,
}

impl Client {
    pub async fn new(config: ClientConfig) -> Result<Self, BoxError> {
        let bind_addr = if config.server_addr.is_ipv4() {
            "0.0.0.0:0"
        } else {
            "[::]:0"
        };
        let socket = UdpSocket::bind(bind_addr).await?;

        let start = pickup_location().position;
        let autopilot = Autopilot::new(start, config.max_speed, config.jump_rate, config.seed);

        Ok(Client {
            socket,
            config,
            client_id: None,
            connected: false,
            finished: false,
            connect_attempts: 0,
            session: DeliverySession::new(),
            autopilot,
            last_frame: Instant::now(),
        })
    }

    pub fn client_id(&self) -> Option<u32> {
        self.client_id
    }

    pub fn session(&self) -> &DeliverySession {
        &self.session
    }

    async fn connect(&mut self) -> Result<(), BoxError> {
        self.connect_attempts += 1;
        info!(
            "Connecting to {} (attempt {}/{})...",
            self.config.server_addr, self.connect_attempts, self.config.connect_attempts
        );

        let packet = Packet::Connect {
            client_version: PROTOCOL_VERSION,
        };
        self.send_packet(&packet).await
    }

    async fn send_packet(&self, packet: &Packet) -> Result<(), BoxError> {
        if self.config.fake_ping_ms > 0 {
            sleep(Duration::from_millis(self.config.fake_ping_ms / 2)).await;
        }

        let data = encode(packet)?;
        self.socket.send_to(&data, self.config.server_addr).await?;
        Ok(())
    }

    async fn send_all(&self, packets: Vec<Packet>) {
        for packet in packets {
            if let Err(e) = self.send_packet(&packet).await {
                error!("Error sending {:?}: {}", packet, e);
            }
        }
    }

    fn handle_packet(&mut self, packet: Packet, receive_time: Instant) {
        match packet {
            Packet::Connected { client_id } => {
                if self.connected {
                    debug!("Duplicate connection ack for client {}", client_id);
                    return;
                }
                info!("Connected! Client ID: {}", client_id);
                self.client_id = Some(client_id);
                self.connected = true;
                self.session.on_connected(receive_time);
            }

            Packet::Disconnected { reason } => {
                warn!("Disconnected: {}", reason);
                self.connected = false;
                self.client_id = None;
                self.finished = true;
            }

            packet if self.connected => {
                self.session.handle_packet(packet, receive_time);
                self.log_notices();

                if let Some(max) = self.config.max_deliveries {
                    if self.session.resolved_deliveries() >= max {
                        info!("Finished {} deliveries, leaving", max);
                        self.finished = true;
                    }
                }
            }

            packet => warn!("Ignoring {:?} before the connection is established", packet),
        }
    }

    /// Decodes and applies one datagram. Anything not sent by the server is dropped.
    fn handle_datagram(&mut self, bytes: &[u8], from: SocketAddr, receive_time: Instant) {
        if from != self.config.server_addr {
            warn!("Dropping datagram from unknown sender {}", from);
            return;
        }

        match decode(bytes) {
            Ok(packet) => self.handle_packet(packet, receive_time),
            Err(e) => warn!("Dropping malformed packet: {}", e),
        }
    }

    fn log_notices(&mut self) {
        for notice in self.session.take_notices() {
            info!("{}", notice);
        }
    }

    /// One simulation frame: drive, then let the session react to where the
    /// vehicle ended up.
    async fn frame(&mut self, now: Instant) {
        let dt = now
            .saturating_duration_since(self.last_frame)
            .as_secs_f32()
            .min(MAX_FRAME_SECONDS);
        self.last_frame = now;

        if !self.connected {
            return;
        }

        let mut outbound = Vec::new();
        let events = self.autopilot.step(dt, self.session.target());

        if events.drift_started {
            self.session.on_drift_started(now);
        }
        if events.drift_ended {
            outbound.extend(self.session.on_drift_ended(now));
        }
        if events.jumped {
            outbound.extend(self.session.on_jump());
        }
        outbound.extend(self.session.update(now, self.autopilot.position()));

        self.log_notices();
        self.send_all(outbound).await;
    }

    /// Keeps the connection alive, or retries it. Returns false once the
    /// server is considered unreachable.
    async fn heartbeat(&mut self) -> bool {
        if self.connected {
            if let Err(e) = self.send_packet(&Packet::Heartbeat).await {
                error!("Error sending heartbeat: {}", e);
            }

            let now = Instant::now();
            let resend = self.session.resend_pending(now);
            self.send_all(resend).await;

            if let Some(points) = self.session.drift_score(now) {
                debug!("Drifting, {} points so far", points);
            }
            if let Some(distance) = self.session.distance_to_target(self.autopilot.position()) {
                debug!(
                    "{:.0}m to target, {:.1}s left, speed {:.0}",
                    distance,
                    self.session.time_remaining(now),
                    self.autopilot.speed()
                );
            }
            return true;
        }

        if self.connect_attempts >= self.config.connect_attempts {
            error!(
                "No response from {} after {} attempts",
                self.config.server_addr, self.connect_attempts
            );
            return false;
        }

        if let Err(e) = self.connect().await {
            error!("Error sending connect request: {}", e);
        }
        true
    }

    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.connect().await?;

        let mut frame_interval = interval(FRAME_INTERVAL);
        let mut heartbeat_interval = interval(HEARTBEAT_INTERVAL);
        // The first tick completes immediately and the connect was just sent.
        heartbeat_interval.tick().await;

        let mut buffer = [0u8; 2048];

        while !self.finished {
            tokio::select! {
                result = self.socket.recv_from(&mut buffer) => {
                    let receive_time = Instant::now();
                    match result {
                        Ok((len, from)) => {
                            if self.config.fake_ping_ms > 0 {
                                sleep(Duration::from_millis(self.config.fake_ping_ms / 2)).await;
                            }

                            self.handle_datagram(&buffer[0..len], from, receive_time);
                        },
                        Err(e) => error!("Error receiving packet: {}", e),
                    }
                },

                _ = frame_interval.tick() => {
                    self.frame(Instant::now()).await;
                },

                _ = heartbeat_interval.tick() => {
                    if !self.heartbeat().await {
                        break;
                    }
                },
            }
        }

        if self.connected {
            let _ = self.send_packet(&Packet::Disconnect).await;
        }

        let score = self.session.server_score();
        info!(
            "Session over: {} deliveries ({} this session), {} points on the server, {} session points",
            score.deliveries_completed,
            self.session.successful_deliveries(),
            score.total_score,
            self.session.session_score()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{delivery_locations, DeliveryResult, DeliveryTask};
    use tokio_test::assert_ok;

    async fn test_client(max_deliveries: Option<u32>) -> Client {
        let config = ClientConfig {
            seed: Some(1),
            max_deliveries,
            ..ClientConfig::default()
        };
        assert_ok!(Client::new(config).await)
    }

    fn task() -> DeliveryTask {
        DeliveryTask {
            id: "task-1".to_string(),
            pickup_location: pickup_location(),
            delivery_location: delivery_locations()[0].clone(),
            time_limit: 50.0,
            base_reward: 150,
            distance_meters: 500,
        }
    }

    #[tokio::test]
    async fn test_connected_starts_session() {
        let mut client = test_client(None).await;
        let now = Instant::now();
        client.handle_packet(Packet::Connected { client_id: 4 }, now);

        assert_eq!(client.client_id(), Some(4));
        assert!(client.connected);

        client.handle_packet(Packet::Connected { client_id: 5 }, now);
        assert_eq!(client.client_id(), Some(4));
    }

    #[tokio::test]
    async fn test_packets_before_connect_are_ignored() {
        let mut client = test_client(None).await;
        client.handle_packet(Packet::DeliveryStarted { task: task() }, Instant::now());
        assert!(client.session().current_task().is_none());
    }

    #[tokio::test]
    async fn test_stops_after_max_deliveries() {
        let mut client = test_client(Some(1)).await;
        let now = Instant::now();
        client.handle_packet(Packet::Connected { client_id: 1 }, now);
        client.handle_packet(Packet::DeliveryStarted { task: task() }, now);
        assert!(!client.finished);

        client.handle_packet(
            Packet::DeliveryCompleted {
                result: DeliveryResult::failed(60.0),
            },
            now + Duration::from_secs(60),
        );
        assert!(client.finished);
    }

    #[tokio::test]
    async fn test_disconnect_ends_run() {
        let mut client = test_client(None).await;
        let now = Instant::now();
        client.handle_packet(Packet::Connected { client_id: 1 }, now);
        client.handle_packet(
            Packet::Disconnected {
                reason: "Server full".to_string(),
            },
            now,
        );
        assert!(client.finished);
        assert_eq!(client.client_id(), None);
    }

    #[tokio::test]
    async fn test_datagrams_from_other_senders_are_dropped() {
        let mut client = test_client(None).await;
        let now = Instant::now();
        let server_addr = client.config.server_addr;
        let stranger: SocketAddr = "127.0.0.1:9".parse().unwrap();

        let connected = encode(&Packet::Connected { client_id: 3 }).unwrap();
        client.handle_datagram(&connected, stranger, now);
        assert!(!client.connected);

        client.handle_datagram(&connected, server_addr, now);
        assert_eq!(client.client_id(), Some(3));

        let kicked = encode(&Packet::Disconnected {
            reason: "spoofed".to_string(),
        })
        .unwrap();
        client.handle_datagram(&kicked, stranger, now);
        assert!(client.connected);
        assert!(!client.finished);

        client.handle_datagram(&[0xFF, 0x00], server_addr, now);
        assert!(client.connected);
    }

    #[tokio::test]
    async fn test_gives_up_on_silent_server() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = ClientConfig {
            server_addr: silent.local_addr().unwrap(),
            connect_attempts: 1,
            ..ClientConfig::default()
        };
        let mut client = Client::new(config).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), client.run()).await;
        assert_ok!(assert_ok!(result));
        assert!(!client.connected);
    }
}
