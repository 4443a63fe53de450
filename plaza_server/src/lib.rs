//! `plaza_server`
//!
//! Server-side systems:
//! - Player roster: admission, capacity, identity allocation, spawn placement
//! - Relay dispatch: receives `updatePlayer` events, fans state out to peers
//!
//! Networking model:
//! - One framed TCP connection per client for both directions
//! - A single dispatch task owns all mutable state; connection tasks only
//!   move messages

pub mod roster;
pub mod server;

pub use server::RelayServer;
