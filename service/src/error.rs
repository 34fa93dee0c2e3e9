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

//! Error types for the chat service

use crate::types::ConnectionId;
use thiserror::Error;

/// Result type for operations
pub type Result<T> = std::result::Result<T, ChatError>;

/// Chat server error types
#[derive(Debug, Error)]
pub enum ChatError {
    /// I/O error from the underlying TCP stream
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Framing error from the line codec
    #[error("Codec error: {0}")]
    Codec(#[from] varidial_linecodec::CodecError),

    /// Connection with the given ID was not found
    #[error("Connection {0} not found")]
    ConnectionNotFound(ConnectionId),

    /// Server is not running
    #[error("Server not running")]
    ServerNotRunning,

    /// Server was started twice
    #[error("Server already running")]
    ServerAlreadyRunning,

    /// Maximum number of connections reached
    #[error("Maximum connections ({0}) reached")]
    MaxConnectionsReached(usize),

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ChatError {
    /// Check if the error belongs to a single connection rather than the server
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ChatError::ConnectionNotFound(_) | ChatError::Io(_) | ChatError::Codec(_)
        )
    }
}

/// The line number pool is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
    /// Every line number is taken
    #[error("All line numbers are in use")]
    Exhausted,
}

/// Why a login could not be admitted to the registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegisterError {
    /// The username already has an active session
    #[error("User {0} is already online")]
    DuplicateUser(String),

    /// No line number was free
    #[error(transparent)]
    Exhausted(#[from] AllocError),
}

/// Failure reported by a user directory backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("User directory unavailable: {0}")]
pub struct DirectoryError(pub String);

/// Why an authentication attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    /// Unknown account or wrong password; deliberately indistinguishable
    #[error("Account not found")]
    NotFound,

    /// The directory itself failed
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

/// A chat line could not be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FormatError {
    /// Privilege level outside `0..=4`
    #[error("No decoration for privilege level {0}")]
    InvalidPrivilege(u8),
}

/// A slash-command the issuing session got wrong
///
/// The display text is what the session is shown.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    /// `/p` without both a target and a message
    #[error("Invalid private message format. Use /p # message.")]
    PrivateUsage,

    /// `/p` target that is not a number
    #[error("Invalid line number: {0}")]
    InvalidLineNumber(String),

    /// `/t` argument outside `1..=4`
    #[error("Error: invalid channel. Must be a number between 1 and 4.")]
    InvalidChannel,

    /// `/t` on a system with a single channel
    #[error("Channels are not enabled on this system.")]
    ChannelsDisabled,

    /// The issuing session is no longer in the registry
    #[error("Error: user not found.")]
    NotRegistered,

    /// Any other token
    #[error("Unknown command: {0}")]
    Unknown(String),
}

/// A frame could not be queued for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The peer's outbound queue stayed full past the delivery timeout
    #[error("Delivery timed out")]
    Timeout,

    /// The peer's writer has shut down
    #[error("Session writer closed")]
    Closed,
}
