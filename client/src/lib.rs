//! # Delivery Client Library
//!
//! A headless player for the pizza delivery server. The vehicle seat and
//! physics are replaced by a scripted autopilot; everything else a player's
//! machine does during a delivery lives here.
//!
//! ## Module Organization
//!
//! - `zones`: edge-triggered pickup and drop-off detection from position samples
//! - `timer`: the local countdown with its one-shot warning and expiry
//! - `drift`: measures drifts and turns them into reportable seconds
//! - `combo`: the display-only session score and combo multiplier
//! - `autopilot`: steers towards the current target, drifting and jumping on the way
//! - `game`: the delivery session tying server messages to the modules above
//! - `network`: UDP transport and the frame loop
//!
//! ## Authority
//!
//! The client decides when the vehicle has arrived. The server decides whether
//! it arrived in time and what it earned. The local countdown and session
//! score are for the player's benefit only and may disagree with the server.

pub mod autopilot;
pub mod combo;
pub mod config;
pub mod drift;
pub mod game;
pub mod network;
pub mod timer;
pub mod zones;
