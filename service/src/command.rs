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

//! Slash-command parsing and execution

use crate::{
    Broadcaster, Channel, ChatRegistry, CommandError, LineNumber, MessageFormatter, ServerConfig,
    ServerMetrics, SessionWriter,
};
use std::sync::Arc;
use tracing::{debug, instrument, trace};
use varidial_linecodec::OutputFrame;

/// A line split into its command token and the rest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandLine<'a> {
    /// Text between the `/` and the first space
    pub token: &'a str,
    /// Everything after the first space, verbatim
    pub args: &'a str,
}

impl<'a> CommandLine<'a> {
    /// Split a line starting with `/`
    ///
    /// Returns `None` for lines that are not commands.
    pub fn parse(line: &'a str) -> Option<Self> {
        let body = line.strip_prefix('/')?;
        let (token, args) = body.split_once(' ').unwrap_or((body, ""));
        Some(Self { token, args })
    }
}

/// What the session should do after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Keep reading lines
    Continue,
    /// Leave the chat
    Quit,
}

/// Result of a successful command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Frames for the issuing session
    Frames(Vec<OutputFrame>),
    /// Nothing to show
    Silent,
    /// End the session
    Quit,
}

/// Who issued a command
#[derive(Debug, Clone, Copy)]
pub struct CommandContext<'a> {
    /// Issuing username
    pub username: &'a str,
    /// Issuer's line number
    pub line: LineNumber,
    /// Issuer's outbound queue
    pub writer: &'a SessionWriter,
}

/// Executes slash-commands against the registry
///
/// Output goes to the issuing session only; `/p` is the one command that
/// reaches another session.
#[derive(Debug, Clone)]
pub struct CommandProcessor {
    registry: Arc<ChatRegistry>,
    broadcaster: Broadcaster,
    config: Arc<ServerConfig>,
    metrics: Arc<ServerMetrics>,
}

impl CommandProcessor {
    /// Create a command processor
    pub fn new(
        registry: Arc<ChatRegistry>,
        broadcaster: Broadcaster,
        config: Arc<ServerConfig>,
        metrics: Arc<ServerMetrics>,
    ) -> Self {
        Self {
            registry,
            broadcaster,
            config,
            metrics,
        }
    }

    /// Run a command and write its reply or error to the issuer
    #[instrument(skip(self, ctx, command), fields(username = %ctx.username, token = command.token))]
    pub async fn execute(&self, ctx: CommandContext<'_>, command: CommandLine<'_>) -> CommandOutcome {
        let frames = match self.dispatch(&ctx, command).await {
            Ok(Reply::Quit) => return CommandOutcome::Quit,
            Ok(Reply::Silent) => return CommandOutcome::Continue,
            Ok(Reply::Frames(frames)) => frames,
            Err(e) => {
                debug!(error = %e, "Command rejected");
                vec![OutputFrame::line(e.to_string())]
            }
        };
        // A closed writer means the session is already on its way out
        let _ = ctx.writer.send(frames).await;
        CommandOutcome::Continue
    }

    /// Run a command and return its reply
    pub async fn dispatch(
        &self,
        ctx: &CommandContext<'_>,
        command: CommandLine<'_>,
    ) -> Result<Reply, CommandError> {
        self.metrics.command();
        match command.token {
            "q" => Ok(Reply::Quit),
            "s" => Ok(Reply::Frames(MessageFormatter::roster(&self.registry.snapshot()))),
            "p" => self.private_message(ctx, command.args).await,
            "t" => self.change_channel(ctx, command.args),
            "i" => Ok(Reply::Frames(MessageFormatter::system_info(
                &self.config.system_name,
            ))),
            "?" => Ok(Reply::Frames(MessageFormatter::help(
                self.config.channels_enabled,
            ))),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    async fn private_message(
        &self,
        ctx: &CommandContext<'_>,
        args: &str,
    ) -> Result<Reply, CommandError> {
        let (target, message) = args.split_once(' ').ok_or(CommandError::PrivateUsage)?;
        if message.is_empty() {
            return Err(CommandError::PrivateUsage);
        }
        let number: i64 = target
            .parse()
            .map_err(|_| CommandError::InvalidLineNumber(target.to_string()))?;
        let channel = self
            .registry
            .channel_of(ctx.username)
            .ok_or(CommandError::NotRegistered)?;

        // Numeric but unheld targets are dropped without a word
        let Some(line) = u8::try_from(number).ok().and_then(LineNumber::new) else {
            trace!(target = number, "Private message to out-of-range line dropped");
            return Ok(Reply::Silent);
        };
        let frames = MessageFormatter::private_message(channel, ctx.username, message);
        if self.broadcaster.send_to(line, frames).await {
            self.metrics.private_message();
        }
        Ok(Reply::Silent)
    }

    fn change_channel(&self, ctx: &CommandContext<'_>, args: &str) -> Result<Reply, CommandError> {
        if !self.config.channels_enabled {
            return Err(CommandError::ChannelsDisabled);
        }
        let channel = args
            .trim()
            .parse::<u8>()
            .ok()
            .and_then(Channel::new)
            .ok_or(CommandError::InvalidChannel)?;
        self.registry
            .update_channel(ctx.username, channel)
            .ok_or(CommandError::NotRegistered)?;
        debug!(channel = %channel, "Channel changed");
        Ok(Reply::Frames(vec![MessageFormatter::channel_changed(channel)]))
    }
}
