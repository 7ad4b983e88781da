//! Server network layer handling UDP communications and delivery dispatch

use crate::client_manager::ClientManager;
use crate::config::ServerConfig;
use crate::delivery::DeliveryService;
use log::{debug, error, info, warn};
use shared::{decode, encode, Packet, PROTOCOL_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::interval;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: u32 },
    Shutdown,
}

/// Messages sent from the main loop to the sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
}

/// Main server coordinating networking and the delivery lifecycle
///
/// All delivery state is owned by the main loop and touched by one packet at
/// a time, so requests from a single player are handled in arrival order.
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    deliveries: DeliveryService,
    config: ServerConfig,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(config: ServerConfig) -> Result<Self, BoxError> {
        let socket = Arc::new(UdpSocket::bind(&config.addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        let deliveries = match config.seed {
            Some(seed) => DeliveryService::with_seed(seed),
            None => DeliveryService::new(),
        };

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(config.max_clients))),
            deliveries,
            config,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Sender that stops `run` when given `ServerMessage::Shutdown`.
    pub fn shutdown_sender(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match decode(&buffer[0..len]) {
                        Ok(packet) => {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        }
                        Err(e) => warn!("Dropping packet from {}: {}", addr, e),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client heartbeats
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();
        let timeout = self.config.client_timeout;

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts(timeout)
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), BoxError> {
        let data = encode(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    fn send_all(&self, packets: Vec<Packet>, addr: SocketAddr) {
        for packet in packets {
            self.send_packet(packet, addr);
        }
    }

    async fn register_client(&mut self, addr: SocketAddr) {
        let client_id = {
            let mut clients = self.clients.write().await;
            if let Some(existing_id) = clients.find_client_by_addr(addr) {
                info!("Replacing existing client {} from {}", existing_id, addr);
                clients.remove_client(&existing_id);
                self.deliveries.leave(&existing_id);
            }
            clients.add_client(addr)
        };

        match client_id {
            Some(client_id) => {
                self.send_packet(Packet::Connected { client_id }, addr);
                let packets = self.deliveries.join(client_id);
                self.send_all(packets, addr);
            }
            None => {
                warn!("Rejecting {}: server full", addr);
                self.send_packet(
                    Packet::Disconnected {
                        reason: "Server full".to_string(),
                    },
                    addr,
                );
            }
        }
    }

    /// Dispatches one inbound packet against the delivery lifecycle
    pub async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect { client_version } = packet {
            info!(
                "Client connecting from {} (version: {})",
                addr, client_version
            );
            if client_version != PROTOCOL_VERSION {
                self.send_packet(
                    Packet::Disconnected {
                        reason: "Protocol version mismatch".to_string(),
                    },
                    addr,
                );
                return;
            }
            self.register_client(addr).await;
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            let client_id = clients.find_client_by_addr(addr);
            if let Some(id) = &client_id {
                clients.touch(id);
            }
            client_id
        };

        let Some(client_id) = client_id else {
            warn!("Packet from unregistered address {} dropped", addr);
            return;
        };

        let now = Instant::now();
        let replies = match packet {
            Packet::Heartbeat => Vec::new(),
            Packet::Disconnect => {
                self.clients.write().await.remove_client(&client_id);
                self.deliveries.leave(&client_id);
                Vec::new()
            }
            Packet::RequestNewDelivery => self.deliveries.request_new_delivery(client_id, now),
            Packet::ResumeDelivery => self.deliveries.resume_delivery(client_id),
            Packet::CompleteDelivery => self.deliveries.complete_delivery(client_id, now),
            Packet::ReportDrift { drift_seconds } => {
                self.deliveries.report_drift(client_id, drift_seconds)
            }
            Packet::ReportJump => self.deliveries.report_jump(client_id),
            Packet::Connect { .. } => Vec::new(),
            Packet::Connected { .. }
            | Packet::Disconnected { .. }
            | Packet::DeliveryStarted { .. }
            | Packet::DeliveryCompleted { .. }
            | Packet::ScoreUpdated { .. }
            | Packet::DriftBonus { .. }
            | Packet::JumpBonus
            | Packet::GameStateChanged { .. } => {
                warn!("Unexpected client-bound packet from client {}", client_id);
                Vec::new()
            }
        };

        self.send_all(replies, addr);
    }

    async fn sweep_expired(&mut self) {
        let swept = self
            .deliveries
            .sweep_expired(Instant::now(), self.config.sweep_grace);
        if swept.is_empty() {
            return;
        }

        let clients = self.clients.read().await;
        for (client_id, packet) in swept {
            if let Some(addr) = clients.client_addr(&client_id) {
                self.send_packet(packet, addr);
            }
        }
    }

    /// Main server loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), BoxError> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(self.config.tick_duration);
        let mut ticks: u64 = 0;

        info!("Server started successfully");

        loop {
            tokio::select! {
                message = self.server_rx.recv() => {
                    match message {
                        Some(ServerMessage::PacketReceived { packet, addr }) => {
                            self.handle_packet(packet, addr).await;
                        },
                        Some(ServerMessage::ClientTimeout { client_id }) => {
                            info!("Client {} timed out", client_id);
                            self.deliveries.leave(&client_id);
                        },
                        Some(ServerMessage::Shutdown) | None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },

                _ = tick_interval.tick() => {
                    ticks += 1;
                    if self.config.sweep_expired {
                        self.sweep_expired().await;
                    }

                    if ticks % 100 == 0 {
                        let client_count = self.clients.read().await.len();
                        debug!(
                            "Tick {}: {} clients, {} deliveries in progress",
                            ticks,
                            client_count,
                            self.deliveries.active_count()
                        );
                    }
                },
            }
        }

        Ok(())
    }
}
