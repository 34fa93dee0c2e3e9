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

//! Connection manager implementation
//!
//! The ConnectionManager is responsible for:
//! - Spawning and tracking one session task per connection
//! - Closing individual connections on request
//! - Graceful shutdown coordination

use crate::{
    ChatConnection, ChatContext, ChatError, ConnectionId, ConnectionInfo, ControlMessage,
    MessageFormatter, Result, Session, SessionState, ServerMetrics,
};
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CONTROL_BUFFER: usize = 8;

/// Managed session entry
struct ManagedSession {
    /// Peer address
    peer_addr: SocketAddr,
    /// Control channel sender
    control_tx: mpsc::Sender<ControlMessage>,
    /// Session task handle
    handle: JoinHandle<()>,
    /// Current state (atomic for lock-free access)
    state: Arc<AtomicU8>,
    /// When the connection was accepted
    created_at: Instant,
}

impl ManagedSession {
    fn info(&self, id: ConnectionId) -> ConnectionInfo {
        ConnectionInfo {
            id,
            state: SessionState::from_u8(self.state.load(Ordering::Acquire)),
            peer_addr: self.peer_addr,
            created_at: self.created_at,
        }
    }
}

/// Connection manager
pub struct ConnectionManager {
    /// Live sessions (lock-free concurrent map)
    sessions: Arc<DashMap<ConnectionId, ManagedSession>>,
    /// Next connection ID (monotonically increasing)
    next_id: AtomicU64,
    /// Shared chat state handed to every session
    context: Arc<ChatContext>,
}

impl ConnectionManager {
    /// Create a new connection manager
    pub fn new(context: Arc<ChatContext>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(1),
            context,
        }
    }

    fn metrics(&self) -> &Arc<ServerMetrics> {
        &self.context.metrics
    }

    fn next_connection_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Start a session on a freshly accepted socket
    ///
    /// Fails with [`ChatError::MaxConnectionsReached`] when the server is
    /// full, dropping the socket.
    pub fn add_connection(&self, socket: TcpStream) -> Result<ConnectionId> {
        let config = &self.context.config;
        if self.sessions.len() >= config.max_connections {
            return Err(ChatError::MaxConnectionsReached(config.max_connections));
        }
        let id = self.next_connection_id();

        let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER);
        let connection = ChatConnection::wrap(
            socket,
            id,
            config.outbound_buffer,
            config.max_line_length,
            config.write_timeout,
            control_tx.clone(),
        )?;
        let peer_addr = connection.peer_addr();
        let created_at = connection.created_at();

        let state = Arc::new(AtomicU8::new(SessionState::Connecting.as_u8()));
        let session = Session::new(connection, self.context.clone(), control_rx, state.clone());

        // The task must not remove its entry before it has been inserted
        let (start_tx, start_rx) = oneshot::channel::<()>();
        let sessions = self.sessions.clone();
        let metrics = self.metrics().clone();
        let handle = tokio::spawn(async move {
            let _ = start_rx.await;
            session.run().await;
            metrics.connection_closed(created_at.elapsed());
            sessions.remove(&id);
            debug!(connection_id = %id, "Session task finished");
        });

        self.sessions.insert(
            id,
            ManagedSession {
                peer_addr,
                control_tx,
                handle,
                state,
                created_at,
            },
        );
        self.metrics().connection_opened();
        let _ = start_tx.send(());

        Ok(id)
    }

    /// Close one connection and wait for its cleanup
    pub async fn close_connection(&self, id: ConnectionId) -> Result<()> {
        let Some((_, managed)) = self.sessions.remove(&id) else {
            return Err(ChatError::ConnectionNotFound(id));
        };
        let _ = managed.control_tx.send(ControlMessage::Close).await;
        if tokio::time::timeout(self.context.config.shutdown_timeout, managed.handle)
            .await
            .is_err()
        {
            warn!(connection_id = %id, "Session did not close in time");
        }
        Ok(())
    }

    /// Get connection info
    pub fn get_connection_info(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.sessions.get(&id).map(|entry| entry.info(id))
    }

    /// Get all connection IDs
    pub fn get_connection_ids(&self) -> Vec<ConnectionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    /// Get all connection infos
    pub fn get_all_connection_infos(&self) -> Vec<ConnectionInfo> {
        self.sessions
            .iter()
            .map(|entry| entry.value().info(*entry.key()))
            .collect()
    }

    /// Get the number of open connections
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Ask every session to close, then wait for them
    ///
    /// Sessions still running after the shutdown timeout are aborted and
    /// their users deregistered on their behalf.
    pub async fn shutdown(&self) {
        let senders: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.control_tx.clone())
            .collect();
        info!(count = senders.len(), "Closing all sessions");
        for tx in senders {
            let _ = tx.try_send(ControlMessage::Shutdown);
        }

        let deadline = Instant::now() + self.context.config.shutdown_timeout;
        while !self.sessions.is_empty() && Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        if !self.sessions.is_empty() {
            warn!(remaining = self.sessions.len(), "Aborting sessions after shutdown timeout");
            for id in self.get_connection_ids() {
                if let Some((_, managed)) = self.sessions.remove(&id) {
                    self.abort_session(id, managed).await;
                }
            }
        }
    }

    /// Stop a session task and finish whatever cleanup it did not reach
    async fn abort_session(&self, id: ConnectionId, managed: ManagedSession) {
        managed.handle.abort();
        // Ok means the task got as far as recording its own close
        if managed.handle.await.is_err() {
            self.metrics().connection_closed(managed.created_at.elapsed());
        }
        managed
            .state
            .store(SessionState::Closed.as_u8(), Ordering::Release);

        if let Some(entry) = self.context.registry.deregister_connection(id) {
            info!(
                connection_id = %id,
                username = %entry.username,
                line = %entry.line,
                "User logged out on forced close"
            );
            self.metrics().logout();
            self.context
                .broadcaster
                .broadcast_all(MessageFormatter::departure_announcement(&entry.username))
                .await;
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connection_count", &self.connection_count())
            .field("next_id", &self.next_id.load(Ordering::Relaxed))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryDirectory, ServerConfig};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tracing_test::traced_test;

    async fn create_test_connection() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client_task = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });

        let (server, _) = listener.accept().await.unwrap();
        let client = client_task.await.unwrap();

        (server, client)
    }

    fn manager() -> ConnectionManager {
        let config = ServerConfig::default().with_shutdown_timeout(Duration::from_secs(2));
        let context = ChatContext::new(
            Arc::new(config),
            Arc::new(MemoryDirectory::new()),
            Arc::new(ServerMetrics::new()),
        );
        ConnectionManager::new(Arc::new(context))
    }

    #[tokio::test]
    async fn test_manager_add_close() {
        let manager = manager();
        let (server, mut client) = create_test_connection().await;

        let id = manager.add_connection(server).unwrap();
        assert_eq!(manager.connection_count(), 1);
        let info = manager.get_connection_info(id).unwrap();
        assert_eq!(info.id, id);
        assert!(!info.state.is_terminal());

        manager.close_connection(id).await.unwrap();
        assert_eq!(manager.connection_count(), 0);
        assert!(manager.get_connection_info(id).is_none());

        // The client sees the greeting and then end of stream
        let mut output = Vec::new();
        client.read_to_end(&mut output).await.unwrap();
        assert!(output.ends_with(b"Enter your number: "));
    }

    #[tokio::test]
    async fn test_manager_enforces_connection_limit() {
        let config = ServerConfig::default().with_max_connections(1);
        let context = ChatContext::new(
            Arc::new(config),
            Arc::new(MemoryDirectory::new()),
            Arc::new(ServerMetrics::new()),
        );
        let manager = ConnectionManager::new(Arc::new(context));

        let (first, _first_client) = create_test_connection().await;
        let id = manager.add_connection(first).unwrap();
        let (second, mut second_client) = create_test_connection().await;
        let err = manager.add_connection(second).unwrap_err();
        assert!(matches!(err, ChatError::MaxConnectionsReached(1)));
        assert!(!err.is_connection_error());
        assert_eq!(manager.connection_count(), 1);
        assert_eq!(manager.metrics().total_connections(), 1);

        // The refused socket is closed without a greeting
        let mut output = Vec::new();
        second_client.read_to_end(&mut output).await.unwrap();
        assert!(output.is_empty());

        manager.close_connection(id).await.unwrap();
        let (third, _third_client) = create_test_connection().await;
        assert!(manager.add_connection(third).is_ok());
        manager.shutdown().await;
    }

    #[tokio::test]
    async fn test_manager_close_unknown() {
        let manager = manager();
        assert!(matches!(
            manager.close_connection(ConnectionId::new(42)).await,
            Err(ChatError::ConnectionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_session_removes_itself_on_disconnect() {
        let manager = manager();
        let (server, client) = create_test_connection().await;
        manager.add_connection(server).unwrap();
        drop(client);

        for _ in 0..200 {
            if manager.connection_count() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(manager.connection_count(), 0);
        assert_eq!(manager.metrics().active_connections(), 0);
        assert_eq!(manager.metrics().total_connections(), 1);
    }

    #[tokio::test]
    #[traced_test]
    async fn test_manager_shutdown() {
        let manager = manager();
        let mut clients = Vec::new();
        for _ in 0..3 {
            let (server, client) = create_test_connection().await;
            manager.add_connection(server).unwrap();
            clients.push(client);
        }
        assert_eq!(manager.connection_count(), 3);
        assert_eq!(manager.get_connection_ids().len(), 3);
        assert_eq!(manager.get_all_connection_infos().len(), 3);

        manager.shutdown().await;
        assert_eq!(manager.connection_count(), 0);
        assert!(logs_contain("Closing all sessions"));

        for mut client in clients {
            let mut output = String::new();
            client.read_to_string(&mut output).await.unwrap();
            assert!(output.ends_with("System going down.\r\n"));
        }
    }
}
