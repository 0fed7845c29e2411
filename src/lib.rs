//! MagicQ GW - drive a ChamSys MagicQ console over OSC from a button panel
//!
//! Semantic actions are encoded into OSC messages, sent over UDP, and tracked
//! optimistically; console status messages are decoded back into authoritative
//! state used for variables and feedback coloring.

pub mod actions;
pub mod api;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod decoder;
pub mod drivers;
pub mod encoder;
pub mod error;
pub mod feedback;
pub mod host;
pub mod sniffer;
pub mod state;
pub mod transport;

pub use error::{GatewayError, Result};
