//! Utility functions and helper methods for the lobby server.
//!
//! This module provides convenient factory functions for creating server
//! instances with different configurations.

use crate::{config::ServerConfig, server::LobbyServer};

/// Creates a new lobby server with default configuration.
///
/// This is a convenience function for quickly setting up a server
/// with sensible defaults for development and testing.
pub fn create_server() -> LobbyServer {
    LobbyServer::new(ServerConfig::default())
}

/// Creates a new lobby server with custom configuration.
///
/// # Example
///
/// ```rust
/// use lobby_server::{create_server_with_config, ServerConfig};
///
/// let config = ServerConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_connections: 5000,
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config);
/// ```
pub fn create_server_with_config(config: ServerConfig) -> LobbyServer {
    LobbyServer::new(config)
}
