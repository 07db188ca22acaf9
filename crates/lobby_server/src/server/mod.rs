//! Server core components and connection handling.

pub mod core;
pub mod handlers;

pub use core::LobbyServer;
