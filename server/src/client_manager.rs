//! Connection roster for the delivery server
//!
//! This module tracks which network addresses belong to which player:
//! - Player id assignment on connect and capacity enforcement
//! - Address lookup so incoming datagrams can be attributed to a player
//! - Heartbeat bookkeeping and timeout detection for silent disconnects
//!
//! Delivery and score state is keyed by the ids handed out here but lives
//! in the delivery service, not in the roster.

use log::info;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A connected player session
#[derive(Debug)]
pub struct Client {
    /// Unique player identifier assigned by the server
    pub id: u32,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
}

impl Client {
    pub fn new(id: u32, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if no packets have arrived within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// Ids start at 1 and are never reused within a server run, so a player who
/// reconnects gets a fresh ledger entry.
pub struct ClientManager {
    clients: HashMap<u32, Client>,
    next_client_id: u32,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Attempts to register a new connection.
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, Client::new(client_id, addr));

        Some(client_id)
    }

    /// Removes a client. Returns false if they were already gone.
    pub fn remove_client(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<u32> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    pub fn client_addr(&self, client_id: &u32) -> Option<SocketAddr> {
        self.clients.get(client_id).map(|client| client.addr)
    }

    /// Refreshes the client's activity timestamp. Returns false for unknown ids.
    pub fn touch(&mut self, client_id: &u32) -> bool {
        if let Some(client) = self.clients.get_mut(client_id) {
            client.touch();
            true
        } else {
            false
        }
    }

    /// Removes clients that have been silent for longer than `timeout`
    /// and returns their ids so other systems can clean up after them.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<u32> {
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
