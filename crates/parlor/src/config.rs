//! Configuration management for the Parlor lobby server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use lobby_server::{RoomConfig, ServerConfig};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Application configuration loaded from TOML file.
///
/// This is the main configuration structure that encompasses all server
/// settings including networking, logging, and the room catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    pub server: ServerSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
    /// The catalog of rooms created at startup
    #[serde(default = "default_rooms")]
    pub rooms: Vec<RoomEntry>,
}

/// Server-specific configuration settings.
///
/// Controls network binding, connection limits, and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Connection timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

/// Default for connection_timeout
fn default_connection_timeout() -> u64 {
    60
}

/// Default for max_connections
fn default_max_connections() -> usize {
    1000
}

/// One room in the configured catalog.
///
/// Rooms exist for the lifetime of the process; the catalog is read once at
/// startup and never modified afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomEntry {
    /// Stable room identifier (e.g., "tic-tac-toe")
    pub id: String,
    /// Human-readable room name shown in the lobby
    pub name: String,
    /// The game kind played in this room
    pub game_kind: String,
    /// Maximum number of members the room admits
    pub capacity: usize,
}

/// The stock catalog, mirrored from the core server defaults.
fn default_rooms() -> Vec<RoomEntry> {
    lobby_server::config::default_room_catalog()
        .into_iter()
        .map(|r| RoomEntry {
            id: r.id,
            name: r.name,
            game_kind: r.game_kind,
            capacity: r.capacity,
        })
        .collect()
}

/// Logging system configuration.
///
/// Controls log output format and levels.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: 1000,
                connection_timeout: 60,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
            rooms: default_rooms(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at the
    /// specified path and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration, or an error if loading/creation
    /// failed.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config file
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a lobby server
    /// configuration.
    ///
    /// This method translates the TOML-based configuration into the types
    /// expected by the server core.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            connection_timeout: self.server.connection_timeout,
            rooms: self
                .rooms
                .iter()
                .map(|r| RoomConfig {
                    id: r.id.clone(),
                    name: r.name.clone(),
                    game_kind: r.game_kind.clone(),
                    capacity: r.capacity,
                })
                .collect(),
        })
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks the network address, room catalog, and logging settings for
    /// validity.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing
    /// the issue.
    pub fn validate(&self) -> Result<(), String> {
        // Validate bind address
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        // Validate room catalog
        if self.rooms.is_empty() {
            return Err("Room catalog cannot be empty".to_string());
        }
        for room in &self.rooms {
            if room.id.is_empty() {
                return Err("Room id cannot be empty".to_string());
            }
            if room.capacity < 2 {
                return Err(format!(
                    "Room '{}' capacity must be at least 2",
                    room.id
                ));
            }
        }
        let mut ids: Vec<&str> = self.rooms.iter().map(|r| r.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        if ids.len() != self.rooms.len() {
            return Err("Room ids must be unique".to_string());
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}
