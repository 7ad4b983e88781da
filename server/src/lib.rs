//! # Delivery Game Server Library
//!
//! This library provides the authoritative server for the pizza delivery
//! racing game. It owns every player's active delivery and score ledger,
//! judges each attempt against its own clock, and answers clients over UDP.
//!
//! ## Core Responsibilities
//!
//! ### Delivery Authority
//! The server is the single source of truth for which delivery a player is
//! on. A request while one is already active is ignored. When the client
//! reports arrival the server decides success or failure from the time it
//! recorded at assignment, computes speed, drift, jump and fast-delivery
//! bonuses, and updates the ledger.
//!
//! ### Trust Boundary
//! Arrival itself is client-authoritative: the server does not verify the
//! vehicle's position, only the deadline. This is an arcade game, not an
//! anti-cheat hardened one.
//!
//! ### Session Management
//! Players join by connecting and leave by disconnecting or going silent
//! past the heartbeat timeout. Leaving discards the player's delivery and
//! score; nothing is persisted.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Dispatch
//! All delivery state is owned by one loop that processes inbound packets
//! sequentially. Requests from one player are handled strictly in arrival
//! order, so no locking is needed around a player's attempt. Players are
//! independent of each other.
//!
//! ### Typed Protocol
//! Every message is a variant of `shared::Packet`, encoded with `bincode`.
//! Datagrams that fail to decode are logged and dropped, never answered.
//!
//! ## Module Organization
//!
//! ### Client Manager Module (`client_manager`)
//! Address-to-player mapping, capacity limit and heartbeat timeouts.
//!
//! ### Delivery Module (`delivery`)
//! Task assignment, attempt judgement, bonus accrual and the optional
//! expired-attempt sweep.
//!
//! ### Ledger Module (`ledger`)
//! Cumulative per-player score bookkeeping.
//!
//! ### Network Module (`network`)
//! UDP socket tasks, packet dispatch and the main loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let mut server = Server::new(ServerConfig::with_addr("127.0.0.1:8080")).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod delivery;
pub mod ledger;
pub mod network;
