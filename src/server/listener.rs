//! Portal server listener
//!
//! Handles the TCP accept loop and spawns one connection handler per
//! subscriber. The device-side reader shares the same registry.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::error::{BridgeError, Result};
use crate::protocol::Protocol;
use crate::registry::{RegistryConfig, SubscriberRegistry};
use crate::server::config::ServerConfig;
use crate::server::connection::ConnectionHandler;

/// Subscriber-facing TCP server
pub struct PortalServer {
    config: ServerConfig,
    protocol: Protocol,
    registry: Arc<SubscriberRegistry>,
    next_session_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl PortalServer {
    /// Create a new server with the given configuration and protocol
    pub fn new(config: ServerConfig, protocol: Protocol) -> Self {
        Self::with_registry_config(config, protocol, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(
        config: ServerConfig,
        protocol: Protocol,
        registry_config: RegistryConfig,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        Self {
            config,
            protocol,
            registry: Arc::new(SubscriberRegistry::with_config(registry_config)),
            next_session_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the subscriber registry
    ///
    /// The fan-out reader is constructed over the same registry.
    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(BridgeError::Connection)?;
        tracing::info!(addr = %self.config.bind_addr, protocol = %self.protocol, "Portal server listening");

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: std::future::Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(BridgeError::Connection)?;
        tracing::info!(addr = %self.config.bind_addr, protocol = %self.protocol, "Portal server listening");

        tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received, stopping accept loop");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        }
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let session_id = self.next_session_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            session_id = session_id,
            peer = %peer_addr,
            "New connection"
        );

        if self.config.tcp_nodelay {
            if let Err(e) = socket.set_nodelay(true) {
                tracing::warn!(session_id, error = %e, "Failed to set TCP_NODELAY");
            }
        }

        let handler = ConnectionHandler::new(
            session_id,
            socket,
            self.protocol,
            Arc::clone(&self.registry),
            self.config.handshake_timeout,
        );

        tokio::spawn(async move {
            // Permit is released when the handler task ends
            let _permit = permit;

            if let Err(e) = handler.run().await {
                tracing::debug!(
                    session_id = session_id,
                    error = %e,
                    "Connection error"
                );
            }

            tracing::debug!(session_id = session_id, "Connection closed");
        });
    }
}
