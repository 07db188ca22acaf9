//! Main application logic and lifecycle management.
//!
//! This module contains the core `Application` struct that orchestrates
//! server startup, signal handling, and graceful shutdown.

use crate::{cli::CliArgs, config::AppConfig, logging::display_banner, signals};
use lobby_server::LobbyServer;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Main application struct.
///
/// The `Application` struct manages the complete lifecycle of the Parlor
/// server, including configuration loading, server initialization, and
/// graceful shutdown handling.
///
/// # Architecture
///
/// * **Configuration Management**: Loads and validates configuration from
///   files and CLI
/// * **Server Orchestration**: Initializes and manages the lobby server
///   instance
/// * **Graceful Shutdown**: Handles termination signals and cleanup
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Lobby server instance
    server: Arc<LobbyServer>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings, and
    /// initializes the lobby server with proper error handling.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments
    ///
    /// # Returns
    ///
    /// A configured `Application` instance ready to run, or an error if
    /// initialization failed.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Initialize the lobby server with the room catalog
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        // Validate configuration
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        // Display banner after logging is setup
        display_banner();

        let server_config = config.to_server_config()?;
        let server = Arc::new(LobbyServer::new(server_config));

        info!(
            "📂 Config: {} | Rooms: {}",
            args.config_path.display(),
            config
                .rooms
                .iter()
                .map(|r| r.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self { config, server })
    }

    /// Runs the application until a shutdown signal arrives.
    ///
    /// Starts the server accept loop in a background task, waits for a
    /// termination signal, then shuts the server down and waits for the
    /// accept loop to finish.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the application ran and shut down successfully, or an
    /// error if there was a critical failure during execution.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Parlor Lobby Server");
        self.log_configuration_summary();

        // Start server in background
        let server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move {
                match server.start().await {
                    Ok(()) => {
                        info!("✅ Server completed successfully");
                    }
                    Err(e) => {
                        error!("❌ Server error: {:?}", e);
                        std::process::exit(1);
                    }
                }
            })
        };

        info!("✅ Parlor Server is now running!");
        info!(
            "🎮 Ready to accept connections on {}",
            self.config.server.bind_address
        );
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        // Wait for the first shutdown signal
        signals::wait_for_shutdown_signal().await?;

        // A second signal terminates immediately
        tokio::spawn(async move {
            if let Err(e) = signals::wait_for_shutdown_signal_silent().await {
                error!("Failed to set up second shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");
        self.server.shutdown().await?;

        info!("⏳ Waiting for server task to complete gracefully...");
        match tokio::time::timeout(tokio::time::Duration::from_secs(8), server_handle).await {
            Ok(_) => info!("✅ Server task completed gracefully"),
            Err(e) => {
                warn!("⏰ Server task did not complete within timeout: {:?}", e);
            }
        }

        let remaining = self.server.connection_manager().connection_count().await;
        if remaining > 0 {
            info!("👋 Closed with {} connections still tracked", remaining);
        }

        info!("🛑 Parlor Server shutdown complete");
        Ok(())
    }

    /// Logs a summary of the active configuration at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  - Bind address: {}", self.config.server.bind_address);
        info!("  - Max connections: {}", self.config.server.max_connections);
        info!(
            "  - Connection timeout: {}s",
            self.config.server.connection_timeout
        );
        for room in &self.config.rooms {
            info!(
                "  - Room '{}': {} (capacity {})",
                room.id, room.game_kind, room.capacity
            );
        }
    }
}
