//! Core lobby server implementation.
//!
//! This module contains the main `LobbyServer` struct and its implementation,
//! providing the central orchestration of the connection registry, session
//! coordinator, and websocket accept loop.

use crate::{
    config::ServerConfig,
    connection::ConnectionManager,
    error::ServerError,
    profile::ProfileProvider,
    server::handlers::handle_connection,
    session::SessionCoordinator,
};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// The core lobby server structure.
///
/// `LobbyServer` owns the connection registry and the session coordinator and
/// runs the websocket accept loop. The coordinator is the sole mutator of
/// lobby state; the server merely wires connections to it.
pub struct LobbyServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Registry of client connections and their identities
    connection_manager: Arc<ConnectionManager>,

    /// Coordinator binding rooms, games, and connections together
    coordinator: Arc<SessionCoordinator>,

    /// Channel for coordinating server shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl LobbyServer {
    /// Creates a new lobby server with the specified configuration.
    ///
    /// Initializes the connection registry and the session coordinator with
    /// the configured room catalog. The server is ready to start after
    /// construction.
    pub fn new(config: ServerConfig) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new());
        let coordinator = Arc::new(SessionCoordinator::new(&config, connection_manager.clone()));
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config,
            connection_manager,
            coordinator,
            shutdown_sender,
        }
    }

    /// Creates a lobby server with an explicit profile collaborator.
    pub fn with_profile_provider(config: ServerConfig, profiles: Arc<dyn ProfileProvider>) -> Self {
        let connection_manager = Arc::new(ConnectionManager::new());
        let coordinator = Arc::new(SessionCoordinator::with_profile_provider(
            &config,
            connection_manager.clone(),
            profiles,
        ));
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config,
            connection_manager,
            coordinator,
            shutdown_sender,
        }
    }

    /// Starts the server and begins accepting connections.
    ///
    /// Binds the configured address and runs the accept loop until a
    /// shutdown signal is received. Each accepted connection is handled by
    /// its own task; all lobby mutation still serializes through the
    /// coordinator's lock.
    pub async fn start(&self) -> Result<(), ServerError> {
        info!("🚀 Starting lobby server on {}", self.config.bind_address);
        info!(
            "🎲 Room catalog: {}",
            self.config
                .rooms
                .iter()
                .map(|r| r.id.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let listener = tokio::net::TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind listener: {e}")))?;

        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        let accept_loop = async {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        if self.connection_manager.connection_count().await
                            >= self.config.max_connections
                        {
                            info!("🚧 Connection limit reached, rejecting {}", addr);
                            drop(stream);
                            continue;
                        }

                        let connection_manager = self.connection_manager.clone();
                        let coordinator = self.coordinator.clone();

                        tokio::spawn(async move {
                            if let Err(e) =
                                handle_connection(stream, addr, connection_manager, coordinator)
                                    .await
                            {
                                error!("Connection error: {:?}", e);
                            }
                        });
                    }
                    Err(e) => {
                        error!("Failed to accept connection: {}", e);
                        break;
                    }
                }
            }
        };

        tokio::select! {
            _ = accept_loop => {}
            _ = shutdown_receiver.recv() => {
                info!("Internal shutdown signal received");
            }
        }

        info!("Server stopped");
        Ok(())
    }

    /// Initiates server shutdown.
    ///
    /// Signals the accept loop to stop; established connections close as
    /// their clients disconnect.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// Gets a handle to the connection registry.
    pub fn connection_manager(&self) -> Arc<ConnectionManager> {
        self.connection_manager.clone()
    }

    /// Gets a handle to the session coordinator.
    pub fn coordinator(&self) -> Arc<SessionCoordinator> {
        self.coordinator.clone()
    }
}
