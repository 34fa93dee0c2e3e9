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

//! Core types for the chat service

use std::fmt;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Longest username the directory may hand out.
pub const MAX_USERNAME_LEN: usize = 14;

/// Highest privilege level a user record may carry.
pub const MAX_PRIVILEGE_LEVEL: u8 = 4;

/// Unique identifier for a connection (monotonically increasing, never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Create a new connection ID
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the underlying u64 value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Ephemeral per-session identity in `1..=99`, used to address private messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineNumber(u8);

impl LineNumber {
    /// Lowest assignable line number
    pub const MIN: u8 = 1;
    /// Highest assignable line number
    pub const MAX: u8 = 99;
    /// Number of line numbers in the pool
    pub const COUNT: usize = (Self::MAX - Self::MIN + 1) as usize;

    /// Create a line number, rejecting values outside `1..=99`
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    /// Get the underlying value
    pub fn get(self) -> u8 {
        self.0
    }

    /// Iterate over every line number in ascending order
    pub fn all() -> impl Iterator<Item = LineNumber> {
        (Self::MIN..=Self::MAX).map(LineNumber)
    }
}

impl fmt::Display for LineNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Partition of the chat room; broadcasts only reach sessions on the same channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Channel(u8);

impl Channel {
    /// The channel every session joins on login
    pub const DEFAULT: Channel = Channel(1);
    /// Lowest channel number
    pub const MIN: u8 = 1;
    /// Highest channel number
    pub const MAX: u8 = 4;

    /// Create a channel, rejecting values outside `1..=4`
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    /// Get the underlying value
    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity returned by the user directory after a successful lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Persistent account number the user logs in with
    pub account: u32,
    /// Unique display name
    pub username: String,
    /// Trust tier, 0 (lowest) to 4 (highest)
    pub level: u8,
}

impl UserRecord {
    /// Create a new user record
    pub fn new(account: u32, username: impl Into<String>, level: u8) -> Self {
        Self {
            account,
            username: username.into(),
            level,
        }
    }
}

/// One row of the online roster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// Line number held by the session
    pub line: LineNumber,
    /// Username of the session
    pub username: String,
    /// Channel the session is currently on
    pub channel: Channel,
}

/// Session lifecycle state (stored as atomic u8 for lock-free state queries)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    /// Banner is being sent
    Connecting = 0,
    /// Waiting for account number and password
    Authenticating = 1,
    /// Logged in and chatting
    Active = 2,
    /// Cleanup in progress
    Closing = 3,
    /// Terminal state
    Closed = 4,
}

impl SessionState {
    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Authenticating,
            2 => Self::Active,
            3 => Self::Closing,
            _ => Self::Closed,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Check if the session is shutting down or gone
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closing | Self::Closed)
    }

    /// Check if the session is logged in
    pub fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connecting => write!(f, "connecting"),
            Self::Authenticating => write!(f, "authenticating"),
            Self::Active => write!(f, "active"),
            Self::Closing => write!(f, "closing"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Connection information snapshot (for non-blocking queries)
#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    /// Connection ID
    pub id: ConnectionId,
    /// Current session state
    pub state: SessionState,
    /// Peer address
    pub peer_addr: SocketAddr,
    /// When the connection was accepted
    pub created_at: Instant,
}

impl ConnectionInfo {
    /// Get the connection duration
    pub fn duration(&self) -> Duration {
        self.created_at.elapsed()
    }
}

/// Server snapshot for non-blocking debug information
#[derive(Debug, Clone)]
pub struct ServerSnapshot {
    /// Number of open connections, logged in or not
    pub active_connections: usize,
    /// Number of logged-in sessions
    pub active_sessions: usize,
    /// Total connections since server start
    pub total_connections: u64,
    /// Server bind address
    pub bind_address: SocketAddr,
    /// Server uptime
    pub uptime: Duration,
}

impl fmt::Display for ServerSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ChatServer {{ connections: {}, sessions: {}, total: {}, addr: {}, uptime: {:?} }}",
            self.active_connections,
            self.active_sessions,
            self.total_connections,
            self.bind_address,
            self.uptime
        )
    }
}
