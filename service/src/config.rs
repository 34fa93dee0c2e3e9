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

//! Server configuration

use crate::{ChatError, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use varidial_linecodec::DEFAULT_MAX_LINE_LENGTH;

/// Identity string reported by `/i` unless overridden
pub const DEFAULT_SYSTEM_NAME: &str = "VariDial 1.0";

/// Server configuration
///
/// This structure contains all configuration options for the chat server.
/// Use the builder pattern methods to customize the configuration.
///
/// # Example
///
/// ```
/// use varidial_service::ServerConfig;
/// use std::time::Duration;
///
/// let config = ServerConfig::default()
///     .with_max_connections(150)
///     .with_banner_path("login.txt")
///     .with_delivery_timeout(Duration::from_millis(250));
/// ```
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections, logged in or not
    ///
    /// Logged-in sessions are separately capped at 99 by the line number pool.
    pub max_connections: usize,

    /// Identity string reported by `/i` and shown before the login prompt
    pub system_name: String,

    /// Text file streamed to every new connection before the login prompt
    pub banner_path: Option<PathBuf>,

    /// Whether `/t` may move sessions off channel 1
    pub channels_enabled: bool,

    /// Maximum time to wait for each login answer
    pub login_timeout: Option<Duration>,

    /// Disconnect logged-in sessions that send nothing for this long
    pub idle_timeout: Option<Duration>,

    /// Timeout for a single socket write on a session's writer task
    ///
    /// A writer that cannot flush within this duration closes its session.
    pub write_timeout: Duration,

    /// Maximum time a broadcaster waits for space in one peer's outbound queue
    pub delivery_timeout: Duration,

    /// Timeout for graceful shutdown
    pub shutdown_timeout: Duration,

    /// Capacity, in messages, of each session's outbound queue
    pub outbound_buffer: usize,

    /// Longest inbound line kept, in bytes
    pub max_line_length: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 256,
            system_name: DEFAULT_SYSTEM_NAME.to_string(),
            banner_path: None,
            channels_enabled: true,
            login_timeout: Some(Duration::from_secs(120)),
            idle_timeout: None,
            write_timeout: Duration::from_secs(10),
            delivery_timeout: Duration::from_millis(500),
            shutdown_timeout: Duration::from_secs(5),
            outbound_buffer: 64,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with the given bind address
    ///
    /// All other settings will use their default values.
    pub fn new(bind_address: SocketAddr) -> Self {
        Self {
            bind_address,
            ..Default::default()
        }
    }

    /// Set the maximum number of concurrent connections
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the system identity string
    pub fn with_system_name(mut self, name: impl Into<String>) -> Self {
        self.system_name = name.into();
        self
    }

    /// Set the banner file
    pub fn with_banner_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.banner_path = Some(path.into());
        self
    }

    /// Enable or disable channel switching
    pub fn with_channels(mut self, enabled: bool) -> Self {
        self.channels_enabled = enabled;
        self
    }

    /// Set the login timeout
    pub fn with_login_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Set the idle timeout
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Set the write timeout duration
    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the per-peer delivery timeout
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Set the shutdown timeout duration
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Set the outbound queue capacity
    pub fn with_outbound_buffer(mut self, capacity: usize) -> Self {
        self.outbound_buffer = capacity;
        self
    }

    /// Set the maximum inbound line length
    pub fn with_max_line_length(mut self, length: usize) -> Self {
        self.max_line_length = length;
        self
    }

    /// Validate the configuration
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(ChatError::InvalidConfig(reason.to_string()));

        if self.max_connections == 0 {
            return invalid("max_connections must be greater than 0");
        }
        if self.system_name.trim().is_empty() {
            return invalid("system_name must not be empty");
        }
        if self.login_timeout.is_some_and(|t| t.is_zero()) {
            return invalid("login_timeout must be greater than 0");
        }
        if self.idle_timeout.is_some_and(|t| t.is_zero()) {
            return invalid("idle_timeout must be greater than 0");
        }
        if self.write_timeout.is_zero() {
            return invalid("write_timeout must be greater than 0");
        }
        if self.delivery_timeout.is_zero() {
            return invalid("delivery_timeout must be greater than 0");
        }
        if self.shutdown_timeout.is_zero() {
            return invalid("shutdown_timeout must be greater than 0");
        }
        if self.outbound_buffer == 0 {
            return invalid("outbound_buffer must be greater than 0");
        }
        if self.max_line_length == 0 {
            return invalid("max_line_length must be greater than 0");
        }

        Ok(())
    }
}
