//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Chat server implementation
//!
//! The ChatServer is the main entry point. It owns the TCP listener, accepts
//! connections, and hands each one to the ConnectionManager.

use crate::{
    ChatContext, ChatError, ChatRegistry, ConnectionManager, Result, ServerConfig, ServerMetrics,
    ServerSnapshot, UserDirectory,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

/// Multi-line chat server
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use varidial_service::{ChatServer, MemoryDirectory, ServerConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let directory = MemoryDirectory::new().with_user(100, "sysop", "secret", 4);
///     let server = ChatServer::new(ServerConfig::default(), Arc::new(directory)).await?;
///
///     server.start().await?;
///     tokio::signal::ctrl_c().await?;
///     server.shutdown().await?;
///
///     Ok(())
/// }
/// ```
pub struct ChatServer {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// Shared chat state
    context: Arc<ChatContext>,
    /// Connection manager
    manager: Arc<ConnectionManager>,
    /// TCP listener shared with the accept loop
    listener: Arc<TcpListener>,
    /// Actual bind address
    bind_address: SocketAddr,
    /// Server start time
    started_at: Instant,
    /// Running flag
    running: Arc<AtomicBool>,
    /// Shutdown notification
    shutdown_notify: Arc<Notify>,
    /// Accept loop task handle
    accept_handle: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ChatServer {
    /// Create a new server with the given configuration and user directory
    ///
    /// This validates the configuration and binds to the configured address
    /// but does not start accepting connections. Call `start()` for that.
    pub async fn new(config: ServerConfig, directory: Arc<dyn UserDirectory>) -> Result<Self> {
        config.validate()?;

        let listener = TcpListener::bind(config.bind_address).await?;
        let bind_address = listener.local_addr()?;

        let config = Arc::new(config);
        let metrics = Arc::new(ServerMetrics::new());
        let context = Arc::new(ChatContext::new(config.clone(), directory, metrics));
        let manager = Arc::new(ConnectionManager::new(context.clone()));

        tracing::info!(address = %bind_address, system = %config.system_name, "Chat server bound");

        Ok(Self {
            config,
            context,
            manager,
            listener: Arc::new(listener),
            bind_address,
            started_at: Instant::now(),
            running: Arc::new(AtomicBool::new(false)),
            shutdown_notify: Arc::new(Notify::new()),
            accept_handle: tokio::sync::Mutex::new(None),
        })
    }

    /// Start accepting connections
    ///
    /// The accept loop runs on its own task until `shutdown()` is called.
    pub async fn start(&self) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(ChatError::ServerAlreadyRunning);
        }

        tracing::info!(address = %self.bind_address, "Starting chat server");

        let handle = self.spawn_accept_loop();
        *self.accept_handle.lock().await = Some(handle);

        Ok(())
    }

    fn spawn_accept_loop(&self) -> JoinHandle<()> {
        let listener = self.listener.clone();
        let manager = self.manager.clone();
        let metrics = self.context.metrics.clone();
        let running = self.running.clone();
        let shutdown_notify = self.shutdown_notify.clone();

        tokio::spawn(async move {
            loop {
                if !running.load(Ordering::SeqCst) {
                    break;
                }

                let accept_result = tokio::select! {
                    result = listener.accept() => result,
                    _ = shutdown_notify.notified() => break,
                };

                match accept_result {
                    Ok((socket, peer_addr)) => {
                        tracing::debug!(peer_addr = %peer_addr, "Accepted connection");

                        match manager.add_connection(socket) {
                            Ok(id) => {
                                tracing::info!(connection_id = %id, peer_addr = %peer_addr, "Connection established");
                            }
                            Err(ChatError::MaxConnectionsReached(limit)) => {
                                tracing::warn!(
                                    peer_addr = %peer_addr,
                                    limit,
                                    "Connection limit reached, rejecting connection"
                                );
                                metrics.connection_rejected();
                            }
                            Err(e) if e.is_connection_error() => {
                                tracing::debug!(peer_addr = %peer_addr, error = %e, "Connection lost before setup");
                                metrics.connection_rejected();
                            }
                            Err(e) => {
                                tracing::error!(peer_addr = %peer_addr, error = %e, "Failed to add connection");
                                metrics.connection_rejected();
                            }
                        }
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to accept connection");

                        // Back off on errors to avoid tight loop
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }

            tracing::info!("Accept loop terminated");
        })
    }

    /// Shutdown the server gracefully
    ///
    /// Stops accepting connections, tells every session the system is going
    /// down, and waits for their cleanup up to the shutdown timeout.
    pub async fn shutdown(&self) -> Result<()> {
        if !self.running.swap(false, Ordering::SeqCst) {
            return Err(ChatError::ServerNotRunning);
        }

        tracing::info!("Shutting down chat server");

        self.shutdown_notify.notify_one();

        if let Some(handle) = self.accept_handle.lock().await.take() {
            let _ = tokio::time::timeout(self.config.shutdown_timeout, handle).await;
        }

        self.manager.shutdown().await;

        tracing::info!("Chat server shutdown complete");

        Ok(())
    }

    /// Check if the server is running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Get the server's bind address
    pub fn bind_address(&self) -> SocketAddr {
        self.bind_address
    }

    /// Get the number of open connections, logged in or not
    pub fn connection_count(&self) -> usize {
        self.manager.connection_count()
    }

    /// Get the number of logged-in sessions
    pub fn session_count(&self) -> usize {
        self.context.registry.len()
    }

    /// Get a snapshot of the server state
    pub fn snapshot(&self) -> ServerSnapshot {
        ServerSnapshot {
            active_connections: self.manager.connection_count(),
            active_sessions: self.session_count(),
            total_connections: self.context.metrics.total_connections(),
            bind_address: self.bind_address(),
            uptime: self.started_at.elapsed(),
        }
    }

    /// Get the server metrics
    pub fn metrics(&self) -> Arc<ServerMetrics> {
        self.context.metrics.clone()
    }

    /// Get the session registry
    pub fn registry(&self) -> Arc<ChatRegistry> {
        self.context.registry.clone()
    }

    /// Get the connection manager
    pub fn manager(&self) -> Arc<ConnectionManager> {
        self.manager.clone()
    }

    /// Get the server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

impl std::fmt::Debug for ChatServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatServer")
            .field("bind_address", &self.bind_address())
            .field("running", &self.is_running())
            .field("connection_count", &self.connection_count())
            .field("session_count", &self.session_count())
            .field("uptime", &self.started_at.elapsed())
            .finish()
    }
}

impl Drop for ChatServer {
    fn drop(&mut self) {
        if self.running.load(Ordering::SeqCst) {
            tracing::warn!("ChatServer dropped while still running");
            self.running.store(false, Ordering::SeqCst);
            self.shutdown_notify.notify_one();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryDirectory;

    async fn server(config: ServerConfig) -> Result<ChatServer> {
        ChatServer::new(config, Arc::new(MemoryDirectory::new())).await
    }

    fn local() -> ServerConfig {
        ServerConfig::new("127.0.0.1:0".parse().unwrap())
    }

    #[tokio::test]
    async fn test_server_lifecycle() {
        let server = server(local()).await.unwrap();
        assert!(!server.is_running());
        assert_ne!(server.bind_address().port(), 0);

        server.start().await.unwrap();
        assert!(server.is_running());

        tokio::time::sleep(Duration::from_millis(50)).await;

        server.shutdown().await.unwrap();
        assert!(!server.is_running());
        assert!(matches!(server.shutdown().await, Err(ChatError::ServerNotRunning)));
    }

    #[tokio::test]
    async fn test_server_snapshot() {
        let server = server(local()).await.unwrap();
        let snapshot = server.snapshot();

        assert_eq!(snapshot.active_connections, 0);
        assert_eq!(snapshot.active_sessions, 0);
        assert_eq!(snapshot.total_connections, 0);
    }

    #[tokio::test]
    async fn test_server_double_start() {
        let server = server(local()).await.unwrap();
        server.start().await.unwrap();

        let result = server.start().await;
        assert!(matches!(result, Err(ChatError::ServerAlreadyRunning)));

        server.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let result = server(local().with_max_connections(0)).await;
        assert!(matches!(result, Err(ChatError::InvalidConfig(_))));
    }
}
