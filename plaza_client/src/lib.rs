//! `plaza_client`
//!
//! Client-side systems:
//! - Connection management (framed TCP, admission handshake)
//! - Local roster replica fed by relay events
//! - Partial state updates for the own player record
//!
//! A rendering front-end sits on top of this crate; everything here is
//! headless.

pub mod client;
pub mod replica;

pub use client::{Rejected, RelayClient};
pub use replica::Replica;
