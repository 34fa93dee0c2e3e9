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

//! VariDial Chat Service
//!
//! The engine behind a multi-line telnet chat system. Users connect over a
//! raw TCP socket, log in with an account number and password, receive an
//! ephemeral line number between 1 and 99, and talk on one of four channels
//! through a small slash-command protocol.
//!
//! # Architecture
//!
//! ```text
//! ChatServer
//!     ↓
//! ConnectionManager
//!     ↓
//! Session → ChatConnection (reader + writer task)
//!     ↓
//! CommandProcessor / Broadcaster → ChatRegistry (+ LineNumberPool)
//! ```
//!
//! The [`ChatRegistry`] is the only shared mutable state. It keeps the line
//! number pool and the session map behind one lock so that login and logout
//! are atomic. Sessions never write to each other's sockets: every delivery
//! goes through the target's bounded outbound queue, and each connection has
//! its own writer task.
//!
//! Credentials come from a [`UserDirectory`], an external collaborator.
//! [`MemoryDirectory`] is provided for embedding and tests.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use varidial_service::{ChatServer, MemoryDirectory, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let directory = MemoryDirectory::new()
//!         .with_user(100, "alice", "wonderland", 0)
//!         .with_user(200, "sysop", "hunter2", 4);
//!     let config = ServerConfig::new("0.0.0.0:2323".parse()?).with_banner_path("welcome.txt");
//!     let server = ChatServer::new(config, Arc::new(directory)).await?;
//!     server.start().await?;
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

mod allocator;
mod broadcast;
mod command;
mod config;
mod connection;
mod directory;
mod error;
mod format;
mod manager;
mod metrics;
mod registry;
mod server;
mod session;
mod types;

pub use allocator::LineNumberPool;
pub use broadcast::{BroadcastResult, Broadcaster};
pub use command::{CommandContext, CommandLine, CommandOutcome, CommandProcessor, Reply};
pub use config::{DEFAULT_SYSTEM_NAME, ServerConfig};
pub use connection::{ChatConnection, Outbound, SessionWriter, outbound_channel, run_writer};
pub use directory::{AuthGateway, MemoryDirectory, UserDirectory};
pub use error::{
    AllocError, AuthError, ChatError, CommandError, DeliveryError, DirectoryError, FormatError,
    RegisterError, Result,
};
pub use format::{Decoration, MessageFormatter};
pub use manager::ConnectionManager;
pub use metrics::{MetricsSnapshot, ServerMetrics};
pub use registry::{ChatRegistry, SessionEntry};
pub use server::ChatServer;
pub use session::{
    ChatContext, ControlMessage, DUPLICATE_LOGIN_NOTICE, NUMBER_PROMPT, PASSWORD_PROMPT,
    SHUTDOWN_NOTICE, Session,
};
pub use types::{
    Channel, ConnectionId, ConnectionInfo, LineNumber, MAX_PRIVILEGE_LEVEL, MAX_USERNAME_LEN,
    RosterEntry, ServerSnapshot, SessionState, UserRecord,
};
