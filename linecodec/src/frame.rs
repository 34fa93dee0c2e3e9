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

use crate::consts;
use bytes::Bytes;
use std::fmt;

/// Telnet option negotiation verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Negotiation {
    /// `IAC DO <option>`
    Do,
    /// `IAC DONT <option>`
    Dont,
    /// `IAC WILL <option>`
    Will,
    /// `IAC WONT <option>`
    Wont,
}

impl Negotiation {
    /// Map a command byte onto its negotiation verb.
    pub fn from_command(byte: u8) -> Option<Self> {
        match byte {
            consts::DO => Some(Self::Do),
            consts::DONT => Some(Self::Dont),
            consts::WILL => Some(Self::Will),
            consts::WONT => Some(Self::Wont),
            _ => None,
        }
    }

    /// The wire byte for this verb.
    pub fn command(self) -> u8 {
        match self {
            Self::Do => consts::DO,
            Self::Dont => consts::DONT,
            Self::Will => consts::WILL,
            Self::Wont => consts::WONT,
        }
    }

    /// The reply that refuses this request, if one is owed.
    ///
    /// Requests to enable an option are refused; requests to disable one are
    /// already satisfied and need no reply.
    pub fn refusal(self) -> Option<Self> {
        match self {
            Self::Do => Some(Self::Wont),
            Self::Will => Some(Self::Dont),
            Self::Dont | Self::Wont => None,
        }
    }
}

impl fmt::Display for Negotiation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Do => write!(f, "DO"),
            Self::Dont => write!(f, "DONT"),
            Self::Will => write!(f, "WILL"),
            Self::Wont => write!(f, "WONT"),
        }
    }
}

/// Events produced by the decoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A complete line of text, without its terminator
    Line(String),
    /// An option negotiation request from the client
    Negotiate(Negotiation, u8),
    /// The client sent `IAC IP` or `IAC BRK`
    Interrupt,
}

/// Frames accepted by the encoder
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputFrame {
    /// Text followed by `CR LF`
    Line(String),
    /// Text with no terminator, leaving the cursor on the same line
    Prompt(String),
    /// Arbitrary bytes followed by `CR LF`, with `IAC` escaped
    Verbatim(Bytes),
    /// `IAC <verb> <option>`
    Negotiate(Negotiation, u8),
}

impl OutputFrame {
    /// Build a terminated line.
    pub fn line(text: impl Into<String>) -> Self {
        Self::Line(text.into())
    }

    /// Build an unterminated prompt.
    pub fn prompt(text: impl Into<String>) -> Self {
        Self::Prompt(text.into())
    }

    /// Build a terminated line from bytes that need not be UTF-8.
    pub fn verbatim(bytes: impl Into<Bytes>) -> Self {
        Self::Verbatim(bytes.into())
    }

    /// An empty line, rendered as a bare `CR LF`.
    pub fn blank() -> Self {
        Self::Line(String::new())
    }
}

impl From<String> for OutputFrame {
    fn from(text: String) -> Self {
        Self::Line(text)
    }
}

impl From<&str> for OutputFrame {
    fn from(text: &str) -> Self {
        Self::Line(text.to_string())
    }
}
