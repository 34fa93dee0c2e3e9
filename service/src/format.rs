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

//! Rendering of everything the room says to a session

use crate::{Channel, FormatError, LineNumber, MAX_PRIVILEGE_LEVEL, RosterEntry};
use varidial_linecodec::OutputFrame;

/// Brackets drawn around a speaker's channel and name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decoration {
    /// Character before `T<channel>`
    pub open: char,
    /// Character after the username
    pub close: char,
}

const DECORATIONS: [Decoration; MAX_PRIVILEGE_LEVEL as usize + 1] = [
    Decoration { open: '(', close: ')' },
    Decoration { open: '[', close: ']' },
    Decoration { open: '<', close: ')' },
    Decoration { open: '<', close: ']' },
    Decoration { open: '<', close: '>' },
];

impl Decoration {
    /// Decoration for a privilege level
    pub fn for_level(level: u8) -> Result<Self, FormatError> {
        DECORATIONS
            .get(level as usize)
            .copied()
            .ok_or(FormatError::InvalidPrivilege(level))
    }
}

/// Stateless renderer for chat traffic and command replies
#[derive(Debug, Clone, Copy, Default)]
pub struct MessageFormatter;

impl MessageFormatter {
    /// A public chat line, e.g. `#3(T1:alice ): hi`
    pub fn chat_line(
        line: LineNumber,
        channel: Channel,
        username: &str,
        level: u8,
        message: &str,
    ) -> Result<String, FormatError> {
        let d = Decoration::for_level(level)?;
        Ok(format!(
            "#{line}{}T{channel}:{username} {}: {message}",
            d.open, d.close
        ))
    }

    /// Announcement that a user has logged in
    pub fn join_announcement(line: LineNumber, username: &str) -> Vec<OutputFrame> {
        vec![
            OutputFrame::blank(),
            OutputFrame::line("->"),
            OutputFrame::line(format!(" +#{line}:{username}")),
        ]
    }

    /// Announcement that a user has left
    pub fn departure_announcement(username: &str) -> Vec<OutputFrame> {
        vec![
            OutputFrame::blank(),
            OutputFrame::line(format!("{username} left the chat")),
        ]
    }

    /// A private message as seen by its recipient
    pub fn private_message(channel: Channel, from: &str, message: &str) -> Vec<OutputFrame> {
        vec![
            OutputFrame::blank(),
            OutputFrame::line(format!("P[T{channel}:{from}] ( {message} )")),
        ]
    }

    /// The `/s` listing
    pub fn roster(entries: &[RosterEntry]) -> Vec<OutputFrame> {
        let mut frames = vec![
            OutputFrame::blank(),
            OutputFrame::line("->."),
            OutputFrame::line("    Online"),
            OutputFrame::line("    ------------"),
        ];
        frames.extend(entries.iter().map(|e| {
            OutputFrame::line(format!("    #{}[T{}: {}]", e.line, e.channel, e.username))
        }));
        frames
    }

    /// The `/i` reply
    pub fn system_info(system_name: &str) -> Vec<OutputFrame> {
        vec![
            OutputFrame::blank(),
            OutputFrame::line("->."),
            OutputFrame::line(format!("    {system_name}")),
        ]
    }

    /// The `/?` reply
    pub fn help(channels_enabled: bool) -> Vec<OutputFrame> {
        let mut frames = vec![
            OutputFrame::blank(),
            OutputFrame::line("Commands:"),
            OutputFrame::line("  /q - Quit"),
            OutputFrame::line("  /s - show online users"),
            OutputFrame::line("  /p # message - Send private message"),
        ];
        if channels_enabled {
            frames.push(OutputFrame::line("  /t # - Change channel (1-4)"));
        }
        frames.push(OutputFrame::line("  /i - system info"));
        frames.push(OutputFrame::line("  /? - Help"));
        frames
    }

    /// Reply to a successful `/t`
    pub fn channel_changed(channel: Channel) -> OutputFrame {
        OutputFrame::line(format!("Changed to channel {channel}."))
    }
}
